//! Error types for the tracking client.
//!
//! These never cross into the hosting application: every call site inside
//! the tracker catches, logs, and moves on. Analytics must not break the
//! page it rides on.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BeaconError>;

#[derive(Debug, Error)]
pub enum BeaconError {
    /// The request never completed (DNS, TLS, connection reset, ...).
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{path} returned status {status}")]
    Status { path: String, status: u16 },

    /// A response body did not match the expected shape.
    #[error("malformed response from {path}: {source}")]
    MalformedResponse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
