//! # Powershop NZ - electricity data collector
//!
//! Periodically collects electricity data for every property on a Powershop
//! (New Zealand) account and reduces it to one normalized [`Aggregate`] per
//! refresh cycle.
//!
//! ## Features
//!
//! - **Signed token API**: OAuth1 query-signed JSON calls for accounts,
//!   half-hourly usage and rates
//! - **Web session**: cookie/CSRF login and interval report download
//! - **Report parsing**: tab or comma delimited per-element interval exports
//! - **Failure isolation**: one property's failure never hides another's data
//! - **Statistics**: hourly cumulative kWh series for long-term recorders
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `error`: Error types and failure classification
//! - `transport`: HTTP transport abstraction and reqwest adapter
//! - `signer`: OAuth1 HMAC-SHA1 query signing
//! - `session`: Token and web session lifecycle
//! - `api`: Provider client and payload models
//! - `report`: Interval report parser
//! - `reconcile`: Per-cycle joining of all sources
//! - `aggregate`: Normalized cycle output
//! - `statistics`: Hourly consumption statistics
//! - `publish`: Delivery of results to downstream sinks

pub mod aggregate;
pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod publish;
pub mod reconcile;
pub mod report;
pub mod session;
pub mod signer;
pub mod statistics;
pub mod transport;

// Re-export commonly used types
pub use aggregate::Aggregate;
pub use api::PowershopClient;
pub use config::Config;
pub use error::{PowershopError, Result};
pub use reconcile::Reconciler;
pub use transport::{ReqwestTransport, Transport};
