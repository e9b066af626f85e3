//! Hand-driven location source

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::debug;

use crate::bridge::{EventBridge, EventRegistration, EventSink};
use crate::source::{LocationSource, SourceEvent};
use crate::types::{AuthorizationStatus, Position};

/// A call made into a [`ManualSource`]
///
/// Status queries are not recorded; only commands and registrations are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCall {
    RequestAuthorization,
    BeginUpdates,
    Subscribe,
}

struct Shared {
    status: Mutex<AuthorizationStatus>,
    calls: watch::Sender<Vec<SourceCall>>,
}

impl Shared {
    fn record(&self, call: SourceCall) {
        self.calls.send_modify(|calls| calls.push(call));
    }

    fn status(&self) -> AuthorizationStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Location source whose events are pushed through a [`ManualSourceHandle`]
///
/// Commands have no effect beyond being recorded; the handle decides what the
/// "platform" answers.
pub struct ManualSource {
    bridge: EventBridge,
    shared: Arc<Shared>,
}

/// Controls a [`ManualSource`] after it has been moved into a tracker
#[derive(Clone)]
pub struct ManualSourceHandle {
    bridge: EventBridge,
    shared: Arc<Shared>,
}

impl ManualSource {
    pub fn new(initial: AuthorizationStatus) -> (Self, ManualSourceHandle) {
        let (calls, _) = watch::channel(Vec::new());
        let shared = Arc::new(Shared { status: Mutex::new(initial), calls });
        let bridge = EventBridge::new();

        let handle = ManualSourceHandle { bridge: bridge.clone(), shared: Arc::clone(&shared) };
        (Self { bridge, shared }, handle)
    }
}

impl LocationSource for ManualSource {
    fn current_authorization(&self) -> AuthorizationStatus {
        self.shared.status()
    }

    fn request_authorization(&self) {
        debug!("Manual source: authorization requested");
        self.shared.record(SourceCall::RequestAuthorization);
    }

    fn begin_updates(&self) {
        debug!("Manual source: updates requested");
        self.shared.record(SourceCall::BeginUpdates);
    }

    fn attach(&self, sink: EventSink) -> EventRegistration {
        self.shared.record(SourceCall::Subscribe);
        self.bridge.attach(sink)
    }
}

impl ManualSourceHandle {
    /// Change the permission state and notify the observer
    ///
    /// Returns whether an observer received the event.
    pub fn set_authorization(&self, status: AuthorizationStatus) -> bool {
        *self.shared.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
        self.bridge.emit(SourceEvent::AuthorizationChanged(status))
    }

    /// Deliver a batch of fixes
    pub fn deliver(&self, batch: Vec<Position>) -> bool {
        self.bridge.emit(SourceEvent::PositionsUpdated(batch))
    }

    /// Deliver an arbitrary event
    pub fn emit(&self, event: SourceEvent) -> bool {
        self.bridge.emit(event)
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.shared.calls.borrow().clone()
    }

    pub fn call_count(&self, call: SourceCall) -> usize {
        self.shared.calls.borrow().iter().filter(|c| **c == call).count()
    }

    /// Wait until `call` has been made at least `count` times
    pub async fn wait_for_calls(&self, call: SourceCall, count: usize) {
        let mut calls = self.shared.calls.subscribe();
        // The sender lives in `shared`, which this handle keeps alive
        let _ = calls.wait_for(|calls| calls.iter().filter(|c| **c == call).count() >= count).await;
    }

    pub fn is_subscribed(&self) -> bool {
        self.bridge.is_subscribed()
    }

    /// Wait until the observer is registered (`true`) or released (`false`)
    pub async fn wait_for_subscribed(&self, subscribed: bool) {
        let mut state = self.bridge.subscription_state();
        let _ = state.wait_for(|s| *s == subscribed).await;
    }
}
