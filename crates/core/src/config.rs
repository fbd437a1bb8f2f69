//! Runtime configuration for the tracking client.

use std::time::Duration;

/// Local storage key holding the visitor's consent record.
pub const CONSENT_STORAGE_KEY: &str = "cookieConsent";

/// Cookie mirroring the active session id across full page reloads.
pub const SESSION_COOKIE_NAME: &str = "beacon_session_id";

/// Hosts that talk to the analytics service same-origin (relative URLs).
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0", "[::1]"];

/// Knobs for the session lifecycle. [`Default`] matches production.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Analytics service origin for non-local hosts, e.g.
    /// `https://shop.example.com`. Ignored on local development hosts.
    pub base_url: String,
    /// Cookie carrying the session id.
    pub cookie_name: String,
    /// Local storage key for the consent record.
    pub consent_key: String,
    /// Suffix stripped from document titles when falling back to them as
    /// page names, e.g. `" | Storefront"`.
    pub site_suffix: String,
    /// Lifetime of the session cookie.
    pub cookie_ttl: Duration,
    /// Cadence of best-effort session updates while tracking.
    pub keepalive_interval: Duration,
    /// Quiet period before a burst of page-view triggers produces one report.
    pub pageview_debounce: Duration,
    /// How long the page may stay hidden before the session is ended.
    pub hidden_timeout: Duration,
    /// Delay after a client-side route change before reading title/DOM for
    /// the page-view report, so the new view has rendered.
    pub route_settle_delay: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            cookie_name: SESSION_COOKIE_NAME.to_string(),
            consent_key: CONSENT_STORAGE_KEY.to_string(),
            site_suffix: " | Storefront".to_string(),
            cookie_ttl: Duration::from_secs(24 * 60 * 60),
            keepalive_interval: Duration::from_secs(30),
            pageview_debounce: Duration::from_millis(500),
            hidden_timeout: Duration::from_secs(30 * 60),
            route_settle_delay: Duration::from_millis(150),
        }
    }
}

impl TrackerConfig {
    /// Base URL to prefix endpoint paths with for the given page host.
    ///
    /// Empty (relative, same-origin) on local development hosts, otherwise
    /// the configured `base_url` with any trailing slash trimmed.
    pub fn resolved_base_url(&self, host: &str) -> String {
        if LOCAL_HOSTS.contains(&strip_port(host)) {
            String::new()
        } else {
            self.base_url.trim_end_matches('/').to_string()
        }
    }
}

/// Drop a trailing `:port`. Bracketed IPv6 hosts keep their brackets, so
/// `[::1]:8080` yields `[::1]`, not `[`.
fn strip_port(host: &str) -> &str {
    if let Some(end) = host.rfind(']') {
        return &host[..=end];
    }
    host.split(':').next().unwrap_or(host)
}
