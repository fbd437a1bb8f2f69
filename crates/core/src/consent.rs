//! Consent record persistence.
//!
//! Consent gates the whole session lifecycle: no session is ever created
//! or resumed without an analytics-allowing record in local storage. A
//! malformed record is treated as "no consent" rather than propagating a
//! parse failure into the host page.

use std::sync::Arc;

use beacon_protocol::ConsentRecord;
use tracing::warn;

use crate::storage::LocalStorage;

/// Reads and writes the consent record under a fixed local-storage key.
#[derive(Clone)]
pub struct ConsentStore {
    storage: Arc<dyn LocalStorage>,
    key: String,
}

impl ConsentStore {
    pub fn new(storage: Arc<dyn LocalStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// The stored record, or `None` when absent or unreadable.
    pub fn load(&self) -> Option<ConsentRecord> {
        let raw = self.storage.get(&self.key)?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(target: "beacon.consent", error = %err, "malformed consent record, treating as no consent");
                None
            }
        }
    }

    /// Whether analytics tracking is currently allowed.
    pub fn analytics_allowed(&self) -> bool {
        self.load().is_some_and(|record| record.analytics)
    }

    /// Persist a consent decision.
    pub fn store(&self, record: &ConsentRecord) {
        match serde_json::to_string(record) {
            Ok(raw) => self.storage.set(&self.key, &raw),
            Err(err) => {
                warn!(target: "beacon.consent", error = %err, "failed to serialize consent record");
            }
        }
    }
}
