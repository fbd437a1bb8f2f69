//! Client-side analytics session tracking for the storefront.
//!
//! One [`SessionTracker`] instance owns the analytics session lifecycle for
//! a browsing context: consent-gated activation, resumption across page
//! loads, keep-alive updates, debounced page-view reporting, and
//! idle-timeout expiry while the page is hidden.
//!
//! Browser ambient state (cookies, local storage, the current page, the
//! network) is injected as capabilities so the lifecycle is testable
//! without a real browser. The hosting application forwards DOM signals
//! (visibility, history traversal, client-side route changes, unload)
//! through a [`TrackerHandle`]; nothing here touches globals.
//!
//! Analytics is strictly best-effort: every network failure is logged and
//! swallowed, never surfaced to the host application.

pub mod config;
pub mod consent;
pub mod error;
pub mod pages;
pub mod storage;
pub mod tracker;
pub mod transport;

pub use beacon_protocol as protocol;

pub use config::TrackerConfig;
pub use consent::ConsentStore;
pub use error::{BeaconError, Result};
pub use pages::{FakePageContext, PageContext, classify_user, page_name};
pub use storage::{CookieJar, LocalStorage, MemoryCookieJar, MemoryLocalStorage};
pub use tracker::{SessionTracker, TrackerHandle, TrackerState, TrackerStatus};
pub use transport::{FakeTransport, FakeTransportController, HttpTransport, Transport};
