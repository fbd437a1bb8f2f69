//! Consent record and consent-change request body.

use serde::{Deserialize, Serialize};

/// Consent decision persisted in browser local storage (no expiry).
///
/// `necessary` is always true once a decision exists; `analytics` is the
/// gate for the tracking session lifecycle. Fields default to `false` so a
/// partially-written record reads as a denial rather than failing to parse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    #[serde(default)]
    pub necessary: bool,
    #[serde(default)]
    pub analytics: bool,
    /// Unix millis of the decision.
    #[serde(default)]
    pub timestamp: u64,
}

/// Body for `PUT /api/analytics/consent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentBody {
    pub session_id: String,
    pub consent_given: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_default_to_denied() {
        let record: ConsentRecord = serde_json::from_value(json!({ "necessary": true })).unwrap();
        assert!(record.necessary);
        assert!(!record.analytics);
        assert_eq!(record.timestamp, 0);
    }

    #[test]
    fn round_trips_camel_case() {
        let record: ConsentRecord = serde_json::from_value(json!({
            "necessary": true,
            "analytics": true,
            "timestamp": 1_724_000_000_000u64,
        }))
        .unwrap();
        assert!(record.analytics);
    }
}
