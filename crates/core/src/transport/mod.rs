//! HTTP transport to the analytics service.
//!
//! The tracker talks through the [`Transport`] trait so the lifecycle can
//! be exercised against [`fake::FakeTransport`] without a network. The
//! production implementation is a thin `reqwest` wrapper.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{BeaconError, Result};

pub mod fake;

pub use fake::{FakeTransport, FakeTransportController};

/// One-shot JSON requests against the analytics service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `path`, returning the decoded response body
    /// (`Value::Null` for empty ack responses).
    async fn post(&self, path: &str, body: Value) -> Result<Value>;

    /// PUT `body` to `path`.
    async fn put(&self, path: &str, body: Value) -> Result<Value>;
}

/// `reqwest`-backed [`Transport`].
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// `base_url` is the service origin, or empty for same-origin
    /// relative requests (local development).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn request(&self, method: reqwest::Method, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .request(method, &url)
            .json(&body)
            .send()
            .await
            .map_err(|source| BeaconError::Transport {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BeaconError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|source| BeaconError::Transport {
                path: path.to_string(),
                source,
            })?;
        if raw.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&raw).map_err(|source| BeaconError::MalformedResponse {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.request(reqwest::Method::POST, path, body).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value> {
        self.request(reqwest::Method::PUT, path, body).await
    }
}
