//! Endpoint paths for the analytics service.
//!
//! All paths are relative; `beacon-core` prefixes the configured base URL
//! (empty on local development hosts, so requests stay same-origin).

/// POST - open a new session, returns [`SessionStartedResponse`].
///
/// [`SessionStartedResponse`]: crate::session::SessionStartedResponse
pub const SESSION_START: &str = "/api/analytics/session/start";

/// POST - keep-alive update for an open session (ack only).
pub const SESSION_UPDATE: &str = "/api/analytics/session/update";

/// POST - close a session (ack only).
pub const SESSION_END: &str = "/api/analytics/session/end";

/// POST - record a page view against a session (ack only).
pub const PAGEVIEW: &str = "/api/analytics/pageview";

/// PUT - record a consent decision against a session (ack only).
pub const CONSENT: &str = "/api/analytics/consent";
