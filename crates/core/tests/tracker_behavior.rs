//! End-to-end behavior of the session tracker loop, driven through a
//! [`TrackerHandle`] against the fake transport with paused tokio time.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use beacon::protocol::endpoints;
use beacon::transport::{FakeTransport, FakeTransportController};
use beacon::{
    CookieJar, FakePageContext, LocalStorage, MemoryCookieJar, MemoryLocalStorage, SessionTracker,
    TrackerConfig, TrackerHandle, TrackerState,
};

const COOKIE: &str = "beacon_session_id";
const CONSENT_KEY: &str = "cookieConsent";

struct Harness {
    handle: TrackerHandle,
    controller: FakeTransportController,
    cookies: Arc<MemoryCookieJar>,
    storage: Arc<MemoryLocalStorage>,
    page: Arc<FakePageContext>,
}

fn consent_json(analytics: bool) -> String {
    format!(r#"{{"necessary":true,"analytics":{analytics},"timestamp":1}}"#)
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Let the spawned tracker loop and its fire-and-forget tasks drain.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Drain queued events first, so deadlines armed by them are measured from
/// the pre-jump clock, then advance and drain the timer fallout.
async fn advance(duration: Duration) {
    settle().await;
    tokio::time::advance(duration).await;
    settle().await;
}

/// Spawn a tracker with seeded browser state. The fake start endpoint
/// answers `sess-1` unless a test rescripts it.
async fn start_harness(
    seed: impl FnOnce(&MemoryCookieJar, &MemoryLocalStorage, &FakePageContext),
) -> Harness {
    init_tracing();
    let (transport, controller) = FakeTransport::new();
    controller.respond_with(endpoints::SESSION_START, json!({ "sessionId": "sess-1" }));

    let cookies = Arc::new(MemoryCookieJar::new());
    let storage = Arc::new(MemoryLocalStorage::new());
    let page = Arc::new(FakePageContext::new("/", "Home | Storefront"));
    seed(&cookies, &storage, &page);

    let (tracker, handle) = SessionTracker::new(
        TrackerConfig::default(),
        transport,
        cookies.clone(),
        storage.clone(),
        page.clone(),
    );
    tokio::spawn(tracker.run());
    settle().await;

    Harness {
        handle,
        controller,
        cookies,
        storage,
        page,
    }
}

#[tokio::test(start_paused = true)]
async fn stays_idle_without_cookie_or_consent() {
    let harness = start_harness(|_, _, _| {}).await;

    assert!(harness.controller.requests().is_empty());
    assert_eq!(harness.handle.status().state, TrackerState::Idle);
    assert_eq!(harness.handle.status().session_id, None);
}

#[tokio::test(start_paused = true)]
async fn malformed_consent_record_is_treated_as_no_consent() {
    let harness = start_harness(|cookies, storage, _| {
        cookies.insert(COOKIE, "sess-old");
        storage.set(CONSENT_KEY, "{definitely not json");
    })
    .await;

    assert!(harness.controller.requests().is_empty());
    assert_eq!(harness.handle.status().state, TrackerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn stored_consent_activates_exactly_one_session() {
    let harness = start_harness(|_, storage, _| {
        storage.set(CONSENT_KEY, &consent_json(true));
    })
    .await;

    let starts = harness.controller.requests_to(endpoints::SESSION_START);
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].body["consentGiven"], json!(true));
    assert_eq!(starts[0].body["userType"], json!("user"));

    let status = harness.handle.status();
    assert_eq!(status.state, TrackerState::Tracking);
    assert_eq!(status.session_id.as_deref(), Some("sess-1"));
    assert_eq!(harness.cookies.get(COOKIE).as_deref(), Some("sess-1"));
}

#[tokio::test(start_paused = true)]
async fn denied_consent_never_activates() {
    let harness = start_harness(|_, storage, _| {
        storage.set(CONSENT_KEY, &consent_json(false));
    })
    .await;

    assert!(harness.controller.requests().is_empty());
    assert_eq!(harness.handle.status().state, TrackerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn cookie_plus_consent_resumes_without_a_start_request() {
    let harness = start_harness(|cookies, storage, _| {
        cookies.insert(COOKIE, "sess-9");
        storage.set(CONSENT_KEY, &consent_json(true));
    })
    .await;

    let status = harness.handle.status();
    assert_eq!(status.state, TrackerState::Tracking);
    assert_eq!(status.session_id.as_deref(), Some("sess-9"));
    assert!(harness.controller.requests_to(endpoints::SESSION_START).is_empty());

    // The resumed session reports the current page once the debounce
    // window closes.
    advance(Duration::from_millis(600)).await;
    let views = harness.controller.requests_to(endpoints::PAGEVIEW);
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].body["sessionId"], json!("sess-9"));
    assert_eq!(views[0].body["pageName"], json!("Home"));
}

#[tokio::test(start_paused = true)]
async fn activate_is_single_flight_while_a_start_is_outstanding() {
    let harness = start_harness(|_, _, _| {}).await;

    // Grant consent in storage directly so activation is allowed without
    // going through the consent-change path (which itself activates).
    harness.storage.set(CONSENT_KEY, &consent_json(true));
    harness.controller.set_latency(Duration::from_millis(50));

    harness.handle.activate();
    harness.handle.activate();
    settle().await;

    // First request is parked on the fake's latency; the second call has
    // already observed the in-flight guard and returned.
    assert_eq!(harness.controller.requests_to(endpoints::SESSION_START).len(), 1);

    advance(Duration::from_millis(60)).await;
    assert_eq!(harness.controller.requests_to(endpoints::SESSION_START).len(), 1);
    assert_eq!(harness.handle.status().state, TrackerState::Tracking);
}

#[tokio::test(start_paused = true)]
async fn failed_start_returns_to_idle() {
    let harness = start_harness(|_, storage, _| {
        storage.set(CONSENT_KEY, &consent_json(true));
    })
    .await;

    // Default harness succeeds; rescript and retry through a fresh cycle.
    harness.controller.fail_with(endpoints::SESSION_START, 503);
    harness.handle.unload();
    settle().await;
    assert_eq!(harness.handle.status().state, TrackerState::Idle);

    harness.handle.activate();
    settle().await;
    assert_eq!(harness.handle.status().state, TrackerState::Idle);
    assert_eq!(harness.handle.status().session_id, None);
}

#[tokio::test(start_paused = true)]
async fn end_session_clears_local_state_even_when_the_request_fails() {
    let harness = start_harness(|_, storage, _| {
        storage.set(CONSENT_KEY, &consent_json(true));
    })
    .await;
    assert_eq!(harness.handle.status().state, TrackerState::Tracking);

    harness.controller.fail_with(endpoints::SESSION_END, 500);
    harness.handle.unload();
    settle().await;

    let status = harness.handle.status();
    assert_eq!(status.state, TrackerState::Idle);
    assert_eq!(status.session_id, None);
    assert_eq!(status.started_at, None);
    assert!(harness.cookies.get(COOKIE).is_none());
    assert_eq!(harness.controller.requests_to(endpoints::SESSION_END).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn page_view_burst_coalesces_into_one_report_with_last_data() {
    let harness = start_harness(|cookies, storage, _| {
        cookies.insert(COOKIE, "sess-9");
        storage.set(CONSENT_KEY, &consent_json(true));
    })
    .await;

    let stops = [
        ("/products", "Products | Storefront"),
        ("/products/123", "Widget | Storefront"),
        ("/cart", "Cart | Storefront"),
        ("/checkout", "Checkout | Storefront"),
        ("/blog/my-post", "My Post | Storefront"),
    ];
    for (path, title) in stops {
        harness.page.navigate(path, title);
        harness.handle.page_view();
        advance(Duration::from_millis(20)).await;
    }

    advance(Duration::from_millis(600)).await;

    let views = harness.controller.requests_to(endpoints::PAGEVIEW);
    assert_eq!(views.len(), 1, "burst must coalesce into a single report");
    assert_eq!(views[0].body["pageName"], json!("Blog Post"));
    assert_eq!(views[0].body["url"], json!("https://localhost/blog/my-post"));
}

#[tokio::test(start_paused = true)]
async fn route_change_reports_after_the_settle_delay() {
    let harness = start_harness(|cookies, storage, _| {
        cookies.insert(COOKIE, "sess-9");
        storage.set(CONSENT_KEY, &consent_json(true));
    })
    .await;
    // Drain the resumption page view first.
    advance(Duration::from_millis(600)).await;

    harness.page.navigate("/admin/orders", "Admin | Storefront");
    harness.handle.route_changed();
    advance(Duration::from_millis(200)).await;

    let views = harness.controller.requests_to(endpoints::PAGEVIEW);
    assert_eq!(views.len(), 2);
    assert_eq!(views[1].body["pageName"], json!("Admin - Orders"));
}

#[tokio::test(start_paused = true)]
async fn hidden_past_the_timeout_ends_the_session() {
    let harness = start_harness(|_, storage, _| {
        storage.set(CONSENT_KEY, &consent_json(true));
    })
    .await;
    assert_eq!(harness.handle.status().state, TrackerState::Tracking);

    harness.handle.visibility_changed(true);
    advance(Duration::from_secs(30 * 60 + 1)).await;

    assert_eq!(harness.handle.status().state, TrackerState::Idle);
    assert_eq!(harness.controller.requests_to(endpoints::SESSION_END).len(), 1);

    // Coming back to a torn-down session reactivates.
    harness.handle.visibility_changed(false);
    settle().await;
    assert_eq!(harness.handle.status().state, TrackerState::Tracking);
    assert_eq!(harness.controller.requests_to(endpoints::SESSION_START).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn becoming_visible_before_the_timeout_keeps_the_session() {
    let harness = start_harness(|_, storage, _| {
        storage.set(CONSENT_KEY, &consent_json(true));
    })
    .await;

    harness.handle.visibility_changed(true);
    advance(Duration::from_secs(10 * 60)).await;
    harness.handle.visibility_changed(false);
    advance(Duration::from_secs(40 * 60)).await;

    assert_eq!(harness.handle.status().state, TrackerState::Tracking);
    assert!(harness.controller.requests_to(endpoints::SESSION_END).is_empty());
}

#[tokio::test(start_paused = true)]
async fn revoking_consent_ends_and_granting_restarts() {
    let harness = start_harness(|_, storage, _| {
        storage.set(CONSENT_KEY, &consent_json(true));
    })
    .await;
    assert_eq!(harness.handle.status().state, TrackerState::Tracking);

    harness.handle.set_consent(false);
    settle().await;

    assert_eq!(harness.handle.status().state, TrackerState::Idle);
    assert_eq!(harness.controller.requests_to(endpoints::SESSION_END).len(), 1);
    let consents = harness.controller.requests_to(endpoints::CONSENT);
    assert_eq!(consents.len(), 1);
    assert_eq!(consents[0].method, "PUT");
    assert_eq!(consents[0].body["consentGiven"], json!(false));
    let stored = harness.storage.get(CONSENT_KEY).expect("record persisted");
    assert!(stored.contains("\"analytics\":false"));

    harness.handle.set_consent(true);
    settle().await;

    assert_eq!(harness.handle.status().state, TrackerState::Tracking);
    assert_eq!(harness.controller.requests_to(endpoints::SESSION_START).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn keepalive_re_derives_the_user_type() {
    let harness = start_harness(|cookies, storage, _| {
        cookies.insert(COOKIE, "sess-9");
        storage.set(CONSENT_KEY, &consent_json(true));
    })
    .await;

    advance(Duration::from_secs(31)).await;
    let updates = harness.controller.requests_to(endpoints::SESSION_UPDATE);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].body["sessionId"], json!("sess-9"));
    assert_eq!(updates[0].body["userType"], json!("user"));

    harness.page.navigate("/admin/orders", "Admin | Storefront");
    advance(Duration::from_secs(31)).await;
    let updates = harness.controller.requests_to(endpoints::SESSION_UPDATE);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1].body["userType"], json!("admin"));
}

#[tokio::test(start_paused = true)]
async fn activate_while_tracking_is_a_no_op() {
    let harness = start_harness(|_, storage, _| {
        storage.set(CONSENT_KEY, &consent_json(true));
    })
    .await;
    assert_eq!(harness.controller.requests_to(endpoints::SESSION_START).len(), 1);

    harness.handle.activate();
    settle().await;
    assert_eq!(harness.controller.requests_to(endpoints::SESSION_START).len(), 1);
}
