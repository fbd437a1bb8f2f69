//! Fake transport for unit testing the session lifecycle.
//!
//! Provides an in-memory transport for exercising the tracker without a
//! network. A [`FakeTransportController`] scripts per-path outcomes and
//! inspects every request the tracker sent.
//!
//! # Example
//!
//! ```ignore
//! let (transport, controller) = FakeTransport::new();
//! controller.respond_with(endpoints::SESSION_START, json!({"sessionId": "s1"}));
//!
//! // ... drive the tracker ...
//!
//! assert_eq!(controller.requests_to(endpoints::SESSION_START).len(), 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{BeaconError, Result};

use super::Transport;

/// A request recorded by the fake.
#[derive(Debug, Clone)]
pub struct SentRequest {
    /// `"POST"` or `"PUT"`.
    pub method: &'static str,
    pub path: String,
    pub body: Value,
}

#[derive(Clone)]
enum Outcome {
    Ok(Value),
    Status(u16),
}

#[derive(Default)]
struct Shared {
    sent: Mutex<Vec<SentRequest>>,
    outcomes: Mutex<HashMap<String, Outcome>>,
    latency: Mutex<Option<Duration>>,
}

/// In-memory [`Transport`] that records requests and replays scripted
/// outcomes. Unscripted paths ack with `Value::Null`.
pub struct FakeTransport {
    shared: Arc<Shared>,
}

impl FakeTransport {
    /// Build the fake and its controller.
    pub fn new() -> (Arc<Self>, FakeTransportController) {
        let shared = Arc::new(Shared::default());
        let transport = Arc::new(Self {
            shared: Arc::clone(&shared),
        });
        (transport, FakeTransportController { shared })
    }

    async fn handle(&self, method: &'static str, path: &str, body: Value) -> Result<Value> {
        self.shared.sent.lock().push(SentRequest {
            method,
            path: path.to_string(),
            body,
        });

        let latency = *self.shared.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let outcome = self.shared.outcomes.lock().get(path).cloned();
        match outcome {
            Some(Outcome::Ok(value)) => Ok(value),
            Some(Outcome::Status(status)) => Err(BeaconError::Status {
                path: path.to_string(),
                status,
            }),
            None => Ok(Value::Null),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.handle("POST", path, body).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value> {
        self.handle("PUT", path, body).await
    }
}

/// Scripts outcomes and inspects requests sent through a [`FakeTransport`].
pub struct FakeTransportController {
    shared: Arc<Shared>,
}

impl FakeTransportController {
    /// Respond to every request on `path` with `value`.
    pub fn respond_with(&self, path: &str, value: Value) {
        self.shared
            .outcomes
            .lock()
            .insert(path.to_string(), Outcome::Ok(value));
    }

    /// Fail every request on `path` with the given HTTP status.
    pub fn fail_with(&self, path: &str, status: u16) {
        self.shared
            .outcomes
            .lock()
            .insert(path.to_string(), Outcome::Status(status));
    }

    /// Delay every response by `latency` (interacts with paused tokio time,
    /// letting a test observe an in-flight request).
    pub fn set_latency(&self, latency: Duration) {
        *self.shared.latency.lock() = Some(latency);
    }

    /// Every request sent so far.
    pub fn requests(&self) -> Vec<SentRequest> {
        self.shared.sent.lock().clone()
    }

    /// Requests sent to `path`.
    pub fn requests_to(&self, path: &str) -> Vec<SentRequest> {
        self.shared
            .sent
            .lock()
            .iter()
            .filter(|req| req.path == path)
            .cloned()
            .collect()
    }
}
