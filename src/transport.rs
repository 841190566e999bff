//! HTTP transport boundary
//!
//! The collector talks to the provider only through [`Transport`], which
//! issues one request with its own timeout and classifies failures as
//! timeout, connection failure or HTTP status. [`ReqwestTransport`] is the
//! production implementation; tests substitute scripted doubles.

use crate::error::{PowershopError, Result};
use crate::logging::get_logger;
use reqwest::Method;
use reqwest::cookie::Jar;
use std::sync::Arc;
use std::time::Duration;

/// Request body variants used by the provider endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded` pairs
    Form(Vec<(String, String)>),
}

/// A single outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self::new(Method::GET, url, timeout)
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>, timeout: Duration) -> Self {
        let mut req = Self::new(Method::POST, url, timeout);
        req.body = Some(RequestBody::Form(form));
        req
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Form pairs carried by the body, if any
    pub fn form_pairs(&self) -> &[(String, String)] {
        match &self.body {
            Some(RequestBody::Form(pairs)) => pairs,
            None => &[],
        }
    }
}

/// Status and decoded text body of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Map 401/403 to an authentication error and other non-2xx to an HTTP error
    pub fn error_for_status(self) -> Result<Self> {
        match self.status {
            401 | 403 => Err(PowershopError::authentication("Invalid credentials")),
            s if (200..300).contains(&s) => Ok(self),
            s => {
                let snippet: String = self.body.chars().take(200).collect();
                Err(PowershopError::http_status(s, snippet))
            }
        }
    }
}

/// Issues HTTP requests on behalf of the collector
///
/// Implementations return `Ok` for every completed exchange regardless of
/// status; only timeouts and connection failures are errors at this layer.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse>;
}

/// `reqwest` transport sharing one cookie jar with the web session
pub struct ReqwestTransport {
    client: reqwest::Client,
    logger: crate::logging::StructuredLogger,
}

impl ReqwestTransport {
    /// Build a client whose cookies land in `jar`
    pub fn new(jar: Arc<Jar>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_provider(jar)
            .user_agent(concat!("powershop-nz/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PowershopError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            logger: get_logger("transport"),
        })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        self.logger
            .trace(&format!("{} {}", req.method, redact_query(&req.url)));

        let mut builder = self
            .client
            .request(req.method.clone(), &req.url)
            .timeout(req.timeout);
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(RequestBody::Form(pairs)) = &req.body {
            builder = builder.form(pairs);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(HttpResponse { status, body })
    }
}

/// Strip the query string for logging; it may carry signatures
fn redact_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
