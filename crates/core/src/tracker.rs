//! Analytics session lifecycle: activation, resumption, keep-alive,
//! debounced page views, and idle expiry.
//!
//! One [`SessionTracker`] is constructed per browsing context and consumed
//! by [`SessionTracker::run`], which owns all mutable state on a single
//! event loop. The hosting application keeps a [`TrackerHandle`] and
//! forwards browser signals through it; the loop multiplexes those signals
//! with its own timers via `tokio::select!`.
//!
//! The session start request is the only guarded operation: it is spawned
//! off the loop and its completion posted back as an event, with the
//! `Activating` state acting as the single-flight flag. Everything else is
//! fire-and-forget; failures are logged and the next timer tick retries
//! implicitly.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use beacon_protocol::{
    ConsentBody, ConsentRecord, EndSessionBody, PageViewBody, SessionStartedResponse,
    StartSessionBody, UpdateSessionBody, endpoints,
};

use crate::config::TrackerConfig;
use crate::consent::ConsentStore;
use crate::pages::{PageContext, classify_user, page_name};
use crate::storage::{CookieJar, LocalStorage};
use crate::transport::{HttpTransport, Transport};

/// Lifecycle states of the tracking client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No session; waiting for consent or a visibility resume.
    Idle,
    /// A session start request is in flight (single-flight guard).
    Activating,
    /// A session is believed active on the server.
    Tracking,
}

/// Observable snapshot of the tracker, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerStatus {
    pub state: TrackerState,
    pub session_id: Option<String>,
    /// Unix millis of the most recent activation or resumption.
    pub started_at: Option<u64>,
}

#[derive(Debug)]
enum TrackerEvent {
    Activate,
    ConsentChanged(bool),
    PageView,
    RouteChanged,
    HistoryTraversed,
    VisibilityChanged { hidden: bool },
    Unload,
    /// Completion of a spawned session start request.
    SessionStarted(Option<String>),
}

/// Host-facing handle feeding browser signals into the tracker loop.
///
/// Every method is non-blocking; signals sent after the loop has exited
/// are silently dropped, since a torn-down tracker has nothing to report.
#[derive(Clone)]
pub struct TrackerHandle {
    tx: mpsc::UnboundedSender<TrackerEvent>,
    status_rx: watch::Receiver<TrackerStatus>,
}

impl TrackerHandle {
    /// Request session activation (idempotent, single-flight).
    pub fn activate(&self) {
        self.send(TrackerEvent::Activate);
    }

    /// Apply a consent decision. Granting activates, revoking ends the
    /// session; the only sanctioned mutation path for consent UI.
    pub fn set_consent(&self, analytics: bool) {
        self.send(TrackerEvent::ConsentChanged(analytics));
    }

    /// Report the current page as a view (debounced).
    pub fn page_view(&self) {
        self.send(TrackerEvent::PageView);
    }

    /// Notify a client-side route change; the report is delayed so the new
    /// view can render before title/DOM are read.
    pub fn route_changed(&self) {
        self.send(TrackerEvent::RouteChanged);
    }

    /// Notify a back/forward history traversal.
    pub fn history_traversed(&self) {
        self.send(TrackerEvent::HistoryTraversed);
    }

    /// Notify a document visibility change.
    pub fn visibility_changed(&self, hidden: bool) {
        self.send(TrackerEvent::VisibilityChanged { hidden });
    }

    /// Notify that the page is unloading; ends the session best-effort.
    pub fn unload(&self) {
        self.send(TrackerEvent::Unload);
    }

    /// Current lifecycle snapshot.
    pub fn status(&self) -> TrackerStatus {
        self.status_rx.borrow().clone()
    }

    /// Watch lifecycle transitions.
    pub fn watch_status(&self) -> watch::Receiver<TrackerStatus> {
        self.status_rx.clone()
    }

    fn send(&self, event: TrackerEvent) {
        let _ = self.tx.send(event);
    }
}

/// The session tracking client. See the module docs for the event model.
pub struct SessionTracker {
    config: TrackerConfig,
    transport: Arc<dyn Transport>,
    cookies: Arc<dyn CookieJar>,
    page: Arc<dyn PageContext>,
    consent: ConsentStore,

    state: TrackerState,
    session_id: Option<String>,
    started_at: Option<u64>,

    rx: mpsc::UnboundedReceiver<TrackerEvent>,
    tx: mpsc::UnboundedSender<TrackerEvent>,
    status_tx: watch::Sender<TrackerStatus>,

    /// Debounced page-view deadline; replaced, not queued, on each trigger.
    pending_view_at: Option<Instant>,
    /// Inactivity deadline armed while the page is hidden.
    hidden_at: Option<Instant>,
    /// Next keep-alive tick; armed only while tracking.
    keepalive_at: Option<Instant>,
}

impl SessionTracker {
    /// Build a tracker with explicit capabilities.
    pub fn new(
        config: TrackerConfig,
        transport: Arc<dyn Transport>,
        cookies: Arc<dyn CookieJar>,
        storage: Arc<dyn LocalStorage>,
        page: Arc<dyn PageContext>,
    ) -> (Self, TrackerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(TrackerStatus {
            state: TrackerState::Idle,
            session_id: None,
            started_at: None,
        });
        let consent = ConsentStore::new(storage, config.consent_key.clone());
        let tracker = Self {
            config,
            transport,
            cookies,
            page,
            consent,
            state: TrackerState::Idle,
            session_id: None,
            started_at: None,
            rx,
            tx: tx.clone(),
            status_tx,
            pending_view_at: None,
            hidden_at: None,
            keepalive_at: None,
        };
        (tracker, TrackerHandle { tx, status_rx })
    }

    /// Build a tracker on [`HttpTransport`], resolving the base URL from
    /// the page host (relative on local development hosts).
    pub fn with_http(
        config: TrackerConfig,
        cookies: Arc<dyn CookieJar>,
        storage: Arc<dyn LocalStorage>,
        page: Arc<dyn PageContext>,
    ) -> (Self, TrackerHandle) {
        let transport = Arc::new(HttpTransport::new(config.resolved_base_url(&page.host())));
        Self::new(config, transport, cookies, storage, page)
    }

    /// Run the tracker: the initialization sequence, then the event loop,
    /// until every [`TrackerHandle`] is dropped.
    pub async fn run(mut self) {
        self.initialize();
        loop {
            let view_at = self.pending_view_at;
            let hidden_at = self.hidden_at;
            let keepalive_at = self.keepalive_at;
            tokio::select! {
                maybe = self.rx.recv() => match maybe {
                    Some(event) => self.handle_event(event),
                    None => {
                        debug!(target: "beacon.session", "all handles dropped, tracker loop exiting");
                        break;
                    }
                },
                _ = time::sleep_until(view_at.unwrap_or_else(Instant::now)), if view_at.is_some() => {
                    self.flush_page_view();
                }
                _ = time::sleep_until(hidden_at.unwrap_or_else(Instant::now)), if hidden_at.is_some() => {
                    self.hidden_deadline_reached();
                }
                _ = time::sleep_until(keepalive_at.unwrap_or_else(Instant::now)), if keepalive_at.is_some() => {
                    self.keepalive_tick();
                }
            }
        }
    }

    /// Once-per-page-load startup: resume from the session cookie when
    /// consent allows, else activate fresh on stored consent, else idle.
    fn initialize(&mut self) {
        if let Some(id) = self.cookies.get(&self.config.cookie_name) {
            if self.consent.analytics_allowed() {
                // The server already knows this identifier; no start request.
                info!(target: "beacon.session", session = %id, "resuming session from cookie");
                self.session_id = Some(id);
                self.started_at = Some(unix_millis());
                self.keepalive_at = Some(Instant::now() + self.config.keepalive_interval);
                self.set_state(TrackerState::Tracking);
                self.schedule_page_view(self.config.pageview_debounce);
                return;
            }
        }
        if self.consent.analytics_allowed() {
            self.activate();
        }
    }

    fn handle_event(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::Activate => self.activate(),
            TrackerEvent::ConsentChanged(granted) => self.consent_changed(granted),
            TrackerEvent::PageView => self.schedule_page_view(self.config.pageview_debounce),
            TrackerEvent::RouteChanged => self.schedule_page_view(self.config.route_settle_delay),
            TrackerEvent::HistoryTraversed => {
                self.schedule_page_view(self.config.pageview_debounce)
            }
            TrackerEvent::VisibilityChanged { hidden } => self.visibility_changed(hidden),
            TrackerEvent::Unload => self.end_session(),
            TrackerEvent::SessionStarted(result) => self.session_started(result),
        }
    }

    /// Start a new session unless one is active or a start is in flight.
    fn activate(&mut self) {
        if self.state == TrackerState::Tracking && self.session_id.is_some() {
            return;
        }
        if self.state == TrackerState::Activating {
            debug!(target: "beacon.session", "session start already in flight");
            return;
        }
        if !self.consent.analytics_allowed() {
            debug!(target: "beacon.session", "activation skipped, no analytics consent");
            return;
        }

        self.set_state(TrackerState::Activating);
        let body = StartSessionBody {
            consent_given: true,
            user_type: classify_user(self.page.as_ref()),
        };
        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let started = start_session(transport.as_ref(), body).await;
            let _ = tx.send(TrackerEvent::SessionStarted(started));
        });
    }

    fn session_started(&mut self, result: Option<String>) {
        if self.state != TrackerState::Activating {
            // Activation was abandoned (consent revoked) while the request
            // was in flight; close the orphan session on the server.
            if let Some(id) = result {
                debug!(target: "beacon.session", session = %id, "discarding session started after teardown");
                self.fire_post(endpoints::SESSION_END, &EndSessionBody { session_id: id });
            }
            return;
        }
        match result {
            Some(id) => {
                self.cookies
                    .set(&self.config.cookie_name, &id, self.config.cookie_ttl);
                info!(target: "beacon.session", session = %id, "session started");
                self.session_id = Some(id);
                self.started_at = Some(unix_millis());
                // Arming here, on the Idle->Tracking transition, is what
                // keeps a repeated activate from double-arming the timer.
                self.keepalive_at = Some(Instant::now() + self.config.keepalive_interval);
                self.set_state(TrackerState::Tracking);
                self.schedule_page_view(self.config.pageview_debounce);
            }
            None => self.set_state(TrackerState::Idle),
        }
    }

    /// End the current session. The end request is best-effort; local
    /// teardown is unconditional so the client can never stay stuck in
    /// `Tracking` over a session the server may already have dropped.
    fn end_session(&mut self) {
        if self.state != TrackerState::Tracking {
            return;
        }
        if let Some(id) = self.session_id.clone() {
            self.fire_post(endpoints::SESSION_END, &EndSessionBody { session_id: id });
        }
        self.cookies.expire(&self.config.cookie_name);
        self.session_id = None;
        self.started_at = None;
        self.keepalive_at = None;
        self.pending_view_at = None;
        self.set_state(TrackerState::Idle);
        info!(target: "beacon.session", "session ended");
    }

    fn consent_changed(&mut self, granted: bool) {
        let record = ConsentRecord {
            necessary: true,
            analytics: granted,
            timestamp: unix_millis(),
        };
        self.consent.store(&record);
        if let Some(id) = self.session_id.clone() {
            self.fire_put(
                endpoints::CONSENT,
                &ConsentBody {
                    session_id: id,
                    consent_given: granted,
                },
            );
        }
        if granted {
            self.activate();
        } else {
            if self.state == TrackerState::Activating {
                // Abandon the in-flight start; its completion is discarded.
                self.set_state(TrackerState::Idle);
            }
            self.end_session();
        }
    }

    fn visibility_changed(&mut self, hidden: bool) {
        if hidden {
            if self.hidden_at.is_none() {
                self.hidden_at = Some(Instant::now() + self.config.hidden_timeout);
            }
        } else {
            self.hidden_at = None;
            if self.state == TrackerState::Idle {
                self.activate();
            }
        }
    }

    fn hidden_deadline_reached(&mut self) {
        self.hidden_at = None;
        if self.state == TrackerState::Tracking {
            info!(target: "beacon.session", "page hidden past inactivity timeout, ending session");
            self.end_session();
        }
    }

    fn keepalive_tick(&mut self) {
        self.keepalive_at = None;
        if self.state != TrackerState::Tracking {
            return;
        }
        let Some(id) = self.session_id.clone() else {
            return;
        };
        // User type can change mid-session as the visitor navigates into
        // or out of the admin area.
        self.fire_post(
            endpoints::SESSION_UPDATE,
            &UpdateSessionBody {
                session_id: id,
                user_type: classify_user(self.page.as_ref()),
            },
        );
        self.keepalive_at = Some(Instant::now() + self.config.keepalive_interval);
    }

    /// Arm (or re-arm) the page-view deadline: replacement, not queuing,
    /// so a burst of triggers collapses into one report.
    fn schedule_page_view(&mut self, delay: Duration) {
        self.pending_view_at = Some(Instant::now() + delay);
    }

    /// Read the page at flush time so the report reflects the newest view.
    fn flush_page_view(&mut self) {
        self.pending_view_at = None;
        let Some(id) = self.session_id.clone() else {
            return;
        };
        let path = self.page.path();
        let title = self.page.title();
        let body = PageViewBody {
            session_id: id,
            url: self.page.url(),
            page_name: page_name(&path, &title, &self.config.site_suffix),
            title,
        };
        self.fire_post(endpoints::PAGEVIEW, &body);
    }

    fn set_state(&mut self, state: TrackerState) {
        self.state = state;
        self.status_tx.send_replace(TrackerStatus {
            state: self.state,
            session_id: self.session_id.clone(),
            started_at: self.started_at,
        });
    }

    fn fire_post(&self, path: &'static str, body: &impl Serialize) {
        self.fire(path, body, false);
    }

    fn fire_put(&self, path: &'static str, body: &impl Serialize) {
        self.fire(path, body, true);
    }

    /// Fire-and-forget request; analytics failures never reach the host.
    fn fire(&self, path: &'static str, body: &impl Serialize, put: bool) {
        let body = match serde_json::to_value(body) {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "beacon.session", error = %err, path, "failed to encode request body");
                return;
            }
        };
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            let result = if put {
                transport.put(path, body).await
            } else {
                transport.post(path, body).await
            };
            if let Err(err) = result {
                warn!(target: "beacon.session", error = %err, path, "analytics request failed");
            }
        });
    }
}

async fn start_session(transport: &dyn Transport, body: StartSessionBody) -> Option<String> {
    let body = match serde_json::to_value(&body) {
        Ok(value) => value,
        Err(err) => {
            warn!(target: "beacon.session", error = %err, "failed to encode session start body");
            return None;
        }
    };
    match transport.post(endpoints::SESSION_START, body).await {
        Ok(value) => match serde_json::from_value::<SessionStartedResponse>(value) {
            Ok(response) => Some(response.session_id),
            Err(err) => {
                warn!(target: "beacon.session", error = %err, "session start returned an unexpected body");
                None
            }
        },
        Err(err) => {
            warn!(target: "beacon.session", error = %err, "session start failed");
            None
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
