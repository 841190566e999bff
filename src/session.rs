//! Authenticated session management
//!
//! The provider exposes two unrelated login mechanisms that share one
//! credential pair:
//!
//! - a token API session (`POST tokens`) yielding a token/secret pair used to
//!   sign every later JSON call; it is cached until an authentication failure
//!   is observed and then replaced by a fresh login
//! - a cookie/form web session used only for the report download; it stays
//!   logged in until explicitly invalidated
//!
//! [`SessionManager::ensure`] is the single entry point call sites use.

use crate::api::api_url;
use crate::config::{ApiConfig, Credentials, WebConfig};
use crate::error::{PowershopError, Result};
use crate::logging::get_logger;
use crate::signer::OAuthCredentials;
use crate::transport::{HttpRequest, Transport};
use chrono::{DateTime, Utc};
use reqwest::cookie::Jar;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::Arc;

/// Form field names the login page may use for its CSRF token
pub const CSRF_FIELD_NAMES: [&str; 2] = ["authenticity_token", "csrf-token"];

/// CSRF token found in the login form, with the field it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    pub field: &'static str,
    pub value: String,
}

/// Which of the two sessions an operation depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Token,
    Web,
}

/// Token API session state
#[derive(Clone)]
pub struct TokenSession {
    pub token: String,
    pub secret: String,
    pub issued_at: DateTime<Utc>,
}

impl std::fmt::Debug for TokenSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSession")
            .field("token", &self.token)
            .field("issued_at", &self.issued_at)
            .finish_non_exhaustive()
    }
}

/// Cookie-based web session state
#[derive(Debug, Clone)]
pub struct WebSession {
    pub cookie_jar: Arc<Jar>,
    pub logged_in: bool,
}

/// Snapshot of one of the two sessions
#[derive(Debug, Clone)]
pub enum Session {
    Token(TokenSession),
    Web(WebSession),
}

#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    data: TokenData,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    token: String,
    secret: String,
}

/// Owner of both authenticated sessions
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    api: ApiConfig,
    web: WebConfig,
    token: Option<TokenSession>,
    web_session: WebSession,
    logger: crate::logging::StructuredLogger,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        api: ApiConfig,
        web: WebConfig,
        cookie_jar: Arc<Jar>,
    ) -> Self {
        Self {
            transport,
            credentials,
            api,
            web,
            token: None,
            web_session: WebSession {
                cookie_jar,
                logged_in: false,
            },
            logger: get_logger("session"),
        }
    }

    /// Establish the requested session if it is not already valid
    ///
    /// A failed web login is reported as an authentication error here; use
    /// [`SessionManager::ensure_web_session`] directly for the boolean form.
    pub async fn ensure(&mut self, kind: SessionKind) -> Result<()> {
        match kind {
            SessionKind::Token => self.ensure_token_session().await.map(|_| ()),
            SessionKind::Web => {
                if self.ensure_web_session().await {
                    Ok(())
                } else {
                    Err(PowershopError::authentication("Web login failed"))
                }
            }
        }
    }

    /// Drop the cached state of one session so the next use logs in again
    pub fn invalidate(&mut self, kind: SessionKind) {
        match kind {
            SessionKind::Token => {
                if self.token.take().is_some() {
                    self.logger.info("Token session invalidated");
                }
            }
            SessionKind::Web => {
                if self.web_session.logged_in {
                    self.logger.info("Web session invalidated");
                }
                self.web_session.logged_in = false;
            }
        }
    }

    /// Drop the token session only if it is still the one `token` came from
    ///
    /// A rejection observed with an older token must not discard a session
    /// obtained since. Returns whether the session was dropped.
    pub fn invalidate_token(&mut self, token: &str) -> bool {
        if self.token.as_ref().is_some_and(|s| s.token == token) {
            self.invalidate(SessionKind::Token);
            true
        } else {
            false
        }
    }

    pub fn current(&self, kind: SessionKind) -> Option<Session> {
        match kind {
            SessionKind::Token => self.token.clone().map(Session::Token),
            SessionKind::Web => Some(Session::Web(self.web_session.clone())),
        }
    }

    pub fn has_token_session(&self) -> bool {
        self.token.is_some()
    }

    pub fn is_web_logged_in(&self) -> bool {
        self.web_session.logged_in
    }

    /// OAuth credentials for signing, logging in first if needed
    pub async fn oauth_credentials(&mut self) -> Result<OAuthCredentials> {
        let session = self.ensure_token_session().await?;
        Ok(OAuthCredentials {
            client_key: self.api.consumer_key.clone(),
            client_secret: self.api.consumer_secret.clone(),
            token: session.token,
            token_secret: session.secret,
        })
    }

    /// Return the cached token session or perform the (unsigned) token login
    pub async fn ensure_token_session(&mut self) -> Result<TokenSession> {
        if let Some(session) = &self.token {
            return Ok(session.clone());
        }

        self.logger.debug("Logging in to token API");
        let url = api_url(&self.api, &["tokens"], &[])?;
        let form = vec![
            ("api_key".to_string(), self.api.consumer_key.clone()),
            ("secret".to_string(), self.api.consumer_secret.clone()),
            ("email".to_string(), self.credentials.username.clone()),
            ("password".to_string(), self.credentials.password.clone()),
            ("device_type".to_string(), self.api.device_type.clone()),
            ("device_name".to_string(), self.api.device_name.clone()),
        ];
        let req = HttpRequest::post_form(url, form, self.api.timeout())
            .with_header("Accept", "application/json");

        let resp = self.transport.request(req).await?.error_for_status()?;
        let envelope: TokenEnvelope = serde_json::from_str(&resp.body).map_err(|e| {
            PowershopError::general(format!("Unexpected token login response: {}", e))
        })?;

        let session = TokenSession {
            token: envelope.data.token,
            secret: envelope.data.secret,
            issued_at: Utc::now(),
        };
        self.logger.info("Token session established");
        self.token = Some(session.clone());
        Ok(session)
    }

    /// Log into the web site unless already logged in; never fails hard
    pub async fn ensure_web_session(&mut self) -> bool {
        if self.web_session.logged_in {
            return true;
        }

        let base = self.web.base_url.trim_end_matches('/');
        let timeout = self.web.timeout();

        let csrf = match self
            .transport
            .request(HttpRequest::get(format!("{}/", base), timeout))
            .await
        {
            Ok(resp) if resp.is_success() => extract_csrf_token(&resp.body),
            Ok(resp) => {
                self.logger.warn(&format!(
                    "Login page returned HTTP {}; continuing without CSRF token",
                    resp.status
                ));
                None
            }
            Err(e) => {
                self.logger.warn(&format!(
                    "Login page fetch failed: {}; continuing without CSRF token",
                    e
                ));
                None
            }
        };

        let mut form = vec![
            ("email".to_string(), self.credentials.username.clone()),
            ("password".to_string(), self.credentials.password.clone()),
            ("commit".to_string(), "Login".to_string()),
        ];
        if let Some(csrf) = csrf {
            form.push((csrf.field.to_string(), csrf.value));
        }

        let req = HttpRequest::post_form(format!("{}/customer/login", base), form, timeout);
        match self.transport.request(req).await {
            Ok(resp) if resp.is_success() => {
                self.web_session.logged_in = true;
                self.logger.info("Web session established");
                true
            }
            Ok(resp) => {
                self.logger
                    .warn(&format!("Web login rejected with HTTP {}", resp.status));
                false
            }
            Err(e) => {
                self.logger.warn(&format!("Web login failed: {}", e));
                false
            }
        }
    }
}

/// Find the CSRF token in the login form, accepting either field name
pub fn extract_csrf_token(html: &str) -> Option<CsrfToken> {
    let document = Html::parse_document(html);
    CSRF_FIELD_NAMES.iter().find_map(|&field| {
        let selector = Selector::parse(&format!("input[name=\"{}\"]", field)).ok()?;
        let value = document
            .select(&selector)
            .filter_map(|el| el.value().attr("value"))
            .map(str::trim)
            .find(|v| !v.is_empty())?;
        Some(CsrfToken {
            field,
            value: value.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csrf_from_authenticity_token_input() {
        let html = r#"<html><body><form action="/customer/login">
            <input type="hidden" name="authenticity_token" value="abc123==" />
            <input name="email" /></form></body></html>"#;
        let csrf = extract_csrf_token(html).unwrap();
        assert_eq!(csrf.field, "authenticity_token");
        assert_eq!(csrf.value, "abc123==");
    }

    #[test]
    fn csrf_from_alternate_field_name() {
        let html = r#"<form><input type="hidden" name="csrf-token" value="xyz"></form>"#;
        let csrf = extract_csrf_token(html).unwrap();
        assert_eq!(csrf.field, "csrf-token");
        assert_eq!(csrf.value, "xyz");
    }

    #[test]
    fn csrf_missing_is_none() {
        assert_eq!(extract_csrf_token("<html><body>No form</body></html>"), None);
        assert_eq!(
            extract_csrf_token(r#"<input name="authenticity_token" value="">"#),
            None
        );
    }
}
