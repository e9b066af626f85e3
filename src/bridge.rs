//! Bridges callback-style producers to a single registered observer
//!
//! A sensor backend holds an [`EventBridge`] and calls [`EventBridge::emit`]
//! from whatever context its callbacks run on. The observer is an
//! [`EventSink`] invoked synchronously inside `emit`, so a sink that pushes
//! into a queue preserves emission order relative to anything else pushed
//! into the same queue. [`EventBridge::subscribe`] wraps a channel-backed sink
//! as an [`EventSubscription`] stream.
//!
//! Registering happens on attach, deregistering happens when the returned
//! [`EventRegistration`] (or the subscription holding it) is dropped. Emits
//! after that are discarded.

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, trace, warn};

use crate::source::SourceEvent;

/// Observer callback; returns `false` when the event could not be delivered
pub type EventSink = Box<dyn Fn(SourceEvent) -> bool + Send + Sync>;

struct Registration {
    sink: Option<EventSink>,
    generation: u64,
}

struct BridgeInner {
    registration: Mutex<Registration>,
    subscribed: watch::Sender<bool>,
}

impl BridgeInner {
    fn lock(&self) -> MutexGuard<'_, Registration> {
        self.registration.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared emitter side of a source's event stream
#[derive(Clone)]
pub struct EventBridge {
    inner: Arc<BridgeInner>,
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBridge {
    pub fn new() -> Self {
        let (subscribed, _) = watch::channel(false);
        Self {
            inner: Arc::new(BridgeInner {
                registration: Mutex::new(Registration { sink: None, generation: 0 }),
                subscribed,
            }),
        }
    }

    /// Register `sink` as the observer, replacing any previous one
    ///
    /// The sink runs on the emitting thread while the bridge is locked; it
    /// must not block or emit back into the bridge.
    pub fn attach(&self, sink: EventSink) -> EventRegistration {
        let (generation, replaced) = {
            let mut registration = self.inner.lock();
            registration.generation += 1;
            let replaced = registration.sink.replace(sink);
            (registration.generation, replaced)
        };

        if replaced.is_some() {
            warn!("Replacing active location event observer");
        }
        // Dropped outside the lock; a channel-backed sink closes its stream here
        drop(replaced);

        self.inner.subscribed.send_replace(true);
        debug!(generation, "Location event observer registered");

        EventRegistration { bridge: Arc::downgrade(&self.inner), generation }
    }

    /// Register a channel-backed observer and return its stream
    ///
    /// A replaced subscription ends (yields `None`) rather than silently
    /// sharing events with the new one.
    pub fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let registration = self.attach(Box::new(move |event| tx.send(event).is_ok()));
        EventSubscription::new(rx, registration)
    }

    /// Deliver an event to the current observer
    ///
    /// Returns `false` when nobody is subscribed and the event was dropped.
    pub fn emit(&self, event: SourceEvent) -> bool {
        let registration = self.inner.lock();
        match &registration.sink {
            Some(sink) => sink(event),
            None => {
                trace!(?event, "No location observer registered, dropping event");
                false
            }
        }
    }

    pub fn is_subscribed(&self) -> bool {
        *self.inner.subscribed.borrow()
    }

    /// Watch observer presence, e.g. to await deregistration
    pub fn subscription_state(&self) -> watch::Receiver<bool> {
        self.inner.subscribed.subscribe()
    }
}

/// Keeps an observer registered until dropped
#[must_use = "dropping the registration deregisters the observer"]
pub struct EventRegistration {
    bridge: Weak<BridgeInner>,
    generation: u64,
}

impl std::fmt::Debug for EventRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistration").field("generation", &self.generation).finish()
    }
}

impl Drop for EventRegistration {
    fn drop(&mut self) {
        let Some(inner) = self.bridge.upgrade() else {
            return;
        };

        let released = {
            let mut registration = inner.lock();
            // A newer observer owns the slot now
            if registration.generation == self.generation {
                registration.sink.take()
            } else {
                None
            }
        };

        if let Some(sink) = released {
            drop(sink);
            inner.subscribed.send_replace(false);
            debug!(generation = self.generation, "Location event observer deregistered");
        }
    }
}

pin_project! {
    /// Receiving side of a source's event stream
    ///
    /// Never yields an error. Ends only when a newer subscription replaces it
    /// or the source is dropped.
    pub struct EventSubscription {
        #[pin]
        events: UnboundedReceiverStream<SourceEvent>,
        registration: EventRegistration,
    }
}

impl EventSubscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<SourceEvent>, registration: EventRegistration) -> Self {
        Self { events: UnboundedReceiverStream::new(rx), registration }
    }
}

impl Stream for EventSubscription {
    type Item = SourceEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().events.poll_next(cx)
    }
}
