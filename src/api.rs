//! Powershop provider client
//!
//! Wraps the signed JSON API (accounts, usage, rates) and the web-session
//! report download behind one client. Every JSON call carries the fixed
//! `client_version` query parameter and is signed with the cached token
//! session; an authentication failure drops that session so the next call
//! logs in again.

pub mod types;

use crate::config::{ApiConfig, Config, WebConfig};
use crate::error::{PowershopError, Result};
use crate::logging::get_logger;
use crate::session::{SessionKind, SessionManager};
use crate::signer::Signer;
use crate::transport::{HttpRequest, Transport};
use chrono::{Days, NaiveDate, NaiveDateTime};
use reqwest::Url;
use reqwest::cookie::Jar;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use types::{
    Account, AccountProperty, AccountsEnvelope, MonthlyRate, RatesEnvelope, SpecialRate,
    UsageDay, UsageEnvelope, UsageRecord,
};

const USAGE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const REPORT_DATE_FORMAT: &str = "%d/%m/%Y";

/// Build `<base_url>/<segments..>?client_version=..&<params>`
///
/// Each segment is percent-encoded as a single path segment.
pub(crate) fn api_url(api: &ApiConfig, segments: &[&str], params: &[(&str, String)]) -> Result<String> {
    let invalid = || PowershopError::config(format!("Invalid API URL {}", api.base_url));
    let mut url = Url::parse(&api.base_url).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .extend(segments);
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("client_version", &api.client_version);
        for (k, v) in params {
            q.append_pair(k, v);
        }
    }
    Ok(url.into())
}

/// Time range for the usage endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageWindow {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl UsageWindow {
    /// `days` days up to the start of tomorrow
    pub fn ending_tomorrow(today: NaiveDate, days: u32) -> Self {
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        let to = tomorrow.and_time(chrono::NaiveTime::MIN);
        let from = to
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(to);
        Self { from, to }
    }

    fn params(&self) -> [(&'static str, String); 2] {
        [
            ("from", self.from.format(USAGE_DATETIME_FORMAT).to_string()),
            ("to", self.to.format(USAGE_DATETIME_FORMAT).to_string()),
        ]
    }
}

/// Date range for the report download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ReportWindow {
    /// `days` days back from today, ending today
    pub fn trailing(today: NaiveDate, days: u32) -> Self {
        let from = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(today);
        Self { from, to: today }
    }
}

/// Client for every provider endpoint the collector uses
pub struct PowershopClient {
    transport: Arc<dyn Transport>,
    session: Mutex<SessionManager>,
    api: ApiConfig,
    web: WebConfig,
    logger: crate::logging::StructuredLogger,
}

impl PowershopClient {
    pub fn new(transport: Arc<dyn Transport>, config: &Config, cookie_jar: Arc<Jar>) -> Self {
        let session = SessionManager::new(
            Arc::clone(&transport),
            config.credentials.clone(),
            config.api.clone(),
            config.web.clone(),
            cookie_jar,
        );
        Self {
            transport,
            session: Mutex::new(session),
            api: config.api.clone(),
            web: config.web.clone(),
            logger: get_logger("api"),
        }
    }

    /// Establish a session up front (used to fail fast on bad credentials)
    pub async fn ensure_session(&self, kind: SessionKind) -> Result<()> {
        self.session.lock().await.ensure(kind).await
    }

    pub async fn has_token_session(&self) -> bool {
        self.session.lock().await.has_token_session()
    }

    pub async fn is_web_logged_in(&self) -> bool {
        self.session.lock().await.is_web_logged_in()
    }

    /// `GET accounts`
    pub async fn get_accounts(&self) -> Result<AccountsEnvelope> {
        self.signed_get(&["accounts"], &[]).await
    }

    /// `GET properties/{consumer_id}/usages?from&to`
    pub async fn get_usage(&self, consumer_id: &str, window: &UsageWindow) -> Result<UsageRecord> {
        let envelope: UsageEnvelope = self
            .signed_get(&["properties", consumer_id, "usages"], &window.params())
            .await?;
        Ok(envelope.data)
    }

    /// `GET properties/{consumer_id}/rates`
    pub async fn get_rates(&self, consumer_id: &str) -> Result<RatesEnvelope> {
        self.signed_get(&["properties", consumer_id, "rates"], &[])
            .await
    }

    /// Download the interval report text, logging into the web session first
    pub async fn get_usage_report(&self, window: &ReportWindow) -> Result<String> {
        if !self.session.lock().await.ensure_web_session().await {
            return Err(PowershopError::authentication("Web login failed"));
        }

        let base = self.web.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/usage_report/download", base))
            .map_err(|e| PowershopError::config(format!("Invalid web URL {}: {}", base, e)))?;
        url.query_pairs_mut()
            .append_pair("from", &window.from.format(REPORT_DATE_FORMAT).to_string())
            .append_pair("to", &window.to.format(REPORT_DATE_FORMAT).to_string())
            .append_pair("download", "download");

        let req = HttpRequest::get(String::from(url), self.web.timeout());
        match self.transport.request(req).await?.error_for_status() {
            Ok(resp) => Ok(resp.body),
            Err(e) => {
                if e.is_authentication() {
                    self.session.lock().await.invalidate(SessionKind::Web);
                }
                Err(e)
            }
        }
    }

    async fn signed_get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &[(&str, String)],
    ) -> Result<T> {
        let path = segments.join("/");
        let credentials = self.session.lock().await.oauth_credentials().await?;
        let signed_with = credentials.token.clone();
        let url = api_url(&self.api, segments, params)?;
        let signed = Signer::new(credentials).sign(
            "GET",
            &url,
            Vec::new(),
            vec![("Accept".to_string(), "application/json".to_string())],
        )?;

        let mut req = HttpRequest::get(signed.uri, self.api.timeout());
        req.headers = signed.headers;

        let resp = match self.transport.request(req).await?.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_authentication() {
                    self.logger
                        .warn(&format!("{} rejected the token session", path));
                    self.session.lock().await.invalidate_token(&signed_with);
                }
                return Err(e);
            }
        };

        serde_json::from_str(&resp.body).map_err(|e| {
            PowershopError::general(format!("Unexpected response from {}: {}", path, e))
        })
    }
}
