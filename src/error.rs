//! Error types and handling for the Powershop collector
//!
//! This module defines the error types used throughout the crate and the
//! three-way classification (authentication, communication, general) that
//! decides whether a failure aborts a refresh cycle or only marks one item.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for collector operations
pub type Result<T> = std::result::Result<T, PowershopError>;

/// Main error type for the collector
#[derive(Debug, Error)]
pub enum PowershopError {
    /// Provider rejected the credentials or the session (HTTP 401/403)
    #[error("Authentication error: {message}")]
    Authentication { message: String },

    /// Connection, DNS or transport-level failures
    #[error("Communication error: {message}")]
    Communication { message: String },

    /// A single request exceeded its time budget
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Non-success HTTP status other than 401/403
    #[error("HTTP error {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// Malformed provider content (report header, HTML, payload shape)
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Unexpected errors with context
    #[error("Error: {message}")]
    General { message: String },
}

/// Coarse failure classes surfaced to callers and stored in error markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Communication,
    General,
}

impl PowershopError {
    /// Create a new authentication error
    pub fn authentication<S: Into<String>>(message: S) -> Self {
        PowershopError::Authentication {
            message: message.into(),
        }
    }

    /// Create a new communication error
    pub fn communication<S: Into<String>>(message: S) -> Self {
        PowershopError::Communication {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        PowershopError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new HTTP status error
    pub fn http_status<S: Into<String>>(status: u16, message: S) -> Self {
        PowershopError::HttpStatus {
            status,
            message: message.into(),
        }
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        PowershopError::Parse {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        PowershopError::Config {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        PowershopError::Io {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        PowershopError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        PowershopError::General {
            message: message.into(),
        }
    }

    /// Classify this error for propagation and error markers
    pub fn kind(&self) -> ErrorKind {
        match self {
            PowershopError::Authentication { .. } => ErrorKind::Authentication,
            PowershopError::Communication { .. }
            | PowershopError::Timeout { .. }
            | PowershopError::HttpStatus { .. } => ErrorKind::Communication,
            _ => ErrorKind::General,
        }
    }

    pub fn is_authentication(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }
}

/// Error marker stored in place of a per-property result
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct FetchFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&PowershopError> for FetchFailure {
    fn from(err: &PowershopError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<PowershopError> for FetchFailure {
    fn from(err: PowershopError) -> Self {
        Self::from(&err)
    }
}

impl From<std::io::Error> for PowershopError {
    fn from(err: std::io::Error) -> Self {
        PowershopError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for PowershopError {
    fn from(err: serde_yaml::Error) -> Self {
        PowershopError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PowershopError {
    fn from(err: serde_json::Error) -> Self {
        PowershopError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for PowershopError {
    fn from(err: csv::Error) -> Self {
        PowershopError::parse(err.to_string())
    }
}

impl From<reqwest::Error> for PowershopError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PowershopError::timeout(format!("Timeout error fetching information - {}", err))
        } else if err.is_connect() || err.is_request() || err.is_body() {
            PowershopError::communication(format!("Error fetching information - {}", err))
        } else if err.is_decode() {
            PowershopError::Serialization {
                message: err.to_string(),
            }
        } else {
            PowershopError::general(format!("Something really wrong happened! - {}", err))
        }
    }
}

impl From<chrono::ParseError> for PowershopError {
    fn from(err: chrono::ParseError) -> Self {
        PowershopError::validation("datetime".to_string(), err.to_string())
    }
}
