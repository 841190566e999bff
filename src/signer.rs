//! OAuth1 request signing (HMAC-SHA1, query signature type)
//!
//! Every token-API call except the login itself is signed with the
//! application consumer key/secret and the per-session token/secret. The
//! signature and the other protocol parameters are appended to the query
//! string; headers and body are passed through untouched.

use crate::error::{PowershopError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Url;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// RFC 5849 section 3.6: everything except unreserved characters
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";

fn encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

/// Application and resource-owner credentials
#[derive(Clone)]
pub struct OAuthCredentials {
    pub client_key: String,
    pub client_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_key", &self.client_key)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Output of signing: the URI to request plus unchanged headers and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<(String, String)>,
}

/// Stateless signer over a fixed credential set
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: OAuthCredentials,
}

impl Signer {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self { credentials }
    }

    /// Sign with a fresh nonce and the current timestamp
    pub fn sign(
        &self,
        method: &str,
        uri: &str,
        body: Vec<(String, String)>,
        headers: Vec<(String, String)>,
    ) -> Result<SignedRequest> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        self.sign_with(method, uri, body, headers, &nonce, timestamp)
    }

    /// Deterministic signing for a given nonce and timestamp
    ///
    /// `body` holds decoded form pairs; they take part in the signature base
    /// string as RFC 5849 requires for form-encoded bodies.
    pub fn sign_with(
        &self,
        method: &str,
        uri: &str,
        body: Vec<(String, String)>,
        headers: Vec<(String, String)>,
        nonce: &str,
        timestamp: i64,
    ) -> Result<SignedRequest> {
        let url = Url::parse(uri)
            .map_err(|e| PowershopError::general(format!("Invalid URI {}: {}", uri, e)))?;

        let oauth_params: Vec<(String, String)> = vec![
            ("oauth_nonce".into(), nonce.to_string()),
            ("oauth_timestamp".into(), timestamp.to_string()),
            ("oauth_version".into(), "1.0".into()),
            ("oauth_signature_method".into(), SIGNATURE_METHOD.into()),
            (
                "oauth_consumer_key".into(),
                self.credentials.client_key.clone(),
            ),
            ("oauth_token".into(), self.credentials.token.clone()),
        ];

        let base = signature_base_string(method, &url, &oauth_params, &body);
        let signature = self.hmac(&base)?;

        let mut appended: Vec<String> = oauth_params
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect();
        appended.push(format!("oauth_signature={}", encode(&signature)));

        let (without_fragment, fragment) = match uri.split_once('#') {
            Some((u, f)) => (u, Some(f)),
            None => (uri, None),
        };
        let sep = if url.query().is_some_and(|q| !q.is_empty()) {
            "&"
        } else if without_fragment.ends_with('?') {
            ""
        } else {
            "?"
        };
        let mut signed_uri = format!("{}{}{}", without_fragment, sep, appended.join("&"));
        if let Some(f) = fragment {
            signed_uri.push('#');
            signed_uri.push_str(f);
        }

        Ok(SignedRequest {
            uri: signed_uri,
            headers,
            body,
        })
    }

    fn hmac(&self, base: &str) -> Result<String> {
        let key = format!(
            "{}&{}",
            encode(&self.credentials.client_secret),
            encode(&self.credentials.token_secret)
        );
        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| PowershopError::general(format!("HMAC key error: {}", e)))?;
        mac.update(base.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// `METHOD&base-uri&normalized-params`, each part percent-encoded
pub fn signature_base_string(
    method: &str,
    url: &Url,
    oauth_params: &[(String, String)],
    body: &[(String, String)],
) -> String {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode(&k), encode(&v)))
        .collect();
    params.extend(
        oauth_params
            .iter()
            .chain(body.iter())
            .map(|(k, v)| (encode(k), encode(v))),
    );
    params.sort();

    let normalized = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(&base_string_uri(url)),
        encode(&normalized)
    )
}

/// Scheme, host, non-default port and path; no query or fragment
fn base_string_uri(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}
