#![allow(dead_code)]

use powershop_nz::config::Config;
use powershop_nz::error::{PowershopError, Result};
use powershop_nz::transport::{HttpRequest, HttpResponse, Transport};
use powershop_nz::PowershopClient;
use reqwest::cookie::Jar;
use reqwest::{Method, Url};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const API_PREFIX: &str = "/external_api/v4";

/// Scripted outcome for one request
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    Timeout,
    Refused,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply::Status(200, body.into())
    }
}

/// In-memory transport keyed by method and URL path
///
/// Replies for a route are consumed in order and the last one repeats.
/// Unscripted routes answer 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && path_of(&r.url) == path)
            .count()
    }

    pub fn last_to(&self, path: &str) -> Option<HttpRequest> {
        self.requests()
            .into_iter()
            .rev()
            .find(|r| path_of(&r.url) == path)
    }
}

pub fn path_of(url: &str) -> String {
    Url::parse(url).map(|u| u.path().to_string()).unwrap_or_default()
}

pub fn query_value(url: &str, key: &str) -> Option<String> {
    Url::parse(url).ok()?.query_pairs().find_map(|(k, v)| (k == key).then(|| v.into_owned()))
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        let key = (req.method.clone(), path_of(&req.url));
        self.requests.lock().unwrap().push(req);

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match reply {
            Some(Reply::Status(status, body)) => Ok(HttpResponse::new(status, body)),
            Some(Reply::Timeout) => Err(PowershopError::timeout("request timed out")),
            Some(Reply::Refused) => Err(PowershopError::communication("connection refused")),
            None => Ok(HttpResponse::new(404, "not found")),
        }
    }
}

pub fn api_path(path: &str) -> String {
    format!("{}/{}", API_PREFIX, path)
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.credentials.username = "user@example.com".into();
    config.credentials.password = "hunter2".into();
    config.api.base_url = format!("https://powershop.test{}/", API_PREFIX);
    config.web.base_url = "https://powershop.test".into();
    config
}

pub fn client(transport: &Arc<FakeTransport>, config: &Config) -> PowershopClient {
    let transport: Arc<dyn Transport> = Arc::clone(transport) as Arc<dyn Transport>;
    PowershopClient::new(transport, config, Arc::new(Jar::default()))
}

pub const TOKEN_BODY: &str = r#"{"data":{"token":"tok-1","secret":"sec-1"}}"#;

pub const LOGIN_PAGE: &str = r#"<html><body><form action="/customer/login" method="post">
<input type="hidden" name="authenticity_token" value="csrf-abc" />
<input type="email" name="email" /><input type="password" name="password" />
</form></body></html>"#;

pub fn usage_body(day: &str, values: &[f64]) -> String {
    serde_json::json!({
        "data": {"usages": [{"date": day, "iso8601_date": day, "usage": values}]}
    })
    .to_string()
}

pub fn rates_body(meter: &str, month: &str, cents: f64) -> String {
    serde_json::json!({
        "data": {"rates": {"special": [
            {"meter_number": meter, "rates": [{"month": month, "incl": [cents]}]}
        ]}}
    })
    .to_string()
}

/// Token login plus web login, both succeeding
pub fn script_logins(fake: &FakeTransport) {
    fake.on(Method::POST, &api_path("tokens"), Reply::ok(TOKEN_BODY));
    fake.on(Method::GET, "/", Reply::ok(LOGIN_PAGE));
    fake.on(Method::POST, "/customer/login", Reply::ok("<html>Welcome</html>"));
}
