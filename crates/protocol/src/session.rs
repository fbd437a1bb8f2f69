//! Session lifecycle and page-view request/response bodies.

use serde::{Deserialize, Serialize};

/// Visitor classification carried on session start and keep-alive updates.
///
/// Re-derived by the client on every update, since a visitor can navigate
/// into or out of the admin area mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    #[default]
    User,
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserType::Admin => f.write_str("admin"),
            UserType::User => f.write_str("user"),
        }
    }
}

/// Body for `POST /api/analytics/session/start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionBody {
    pub consent_given: bool,
    pub user_type: UserType,
}

/// Response to a session start: the server-issued opaque session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartedResponse {
    pub session_id: String,
}

/// Body for `POST /api/analytics/session/update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionBody {
    pub session_id: String,
    pub user_type: UserType,
}

/// Body for `POST /api/analytics/session/end`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionBody {
    pub session_id: String,
}

/// Body for `POST /api/analytics/pageview`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewBody {
    pub session_id: String,
    pub url: String,
    pub title: String,
    pub page_name: String,
}
