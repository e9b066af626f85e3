//! Location source contract

use tokio::sync::mpsc;

use crate::bridge::{EventRegistration, EventSink, EventSubscription};
use crate::types::{AuthorizationStatus, Position};

/// Event pushed by a location source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Permission state changed (including the answer to a prompt)
    AuthorizationChanged(AuthorizationStatus),
    /// One or more fixes, oldest first
    PositionsUpdated(Vec<Position>),
}

/// Trait for location sensing backends
///
/// Sources are a pure I/O boundary: they know nothing about sessions. The two
/// commands are fire-and-forget; their outcome is observed later on the event
/// registered observer (see [`LocationSource::attach`]).
///
/// Implementations must tolerate repeated calls to both commands. Calling
/// [`LocationSource::begin_updates`] twice must not duplicate deliveries.
pub trait LocationSource: Send + 'static {
    /// Current permission state, without side effects
    fn current_authorization(&self) -> AuthorizationStatus;

    /// Ask for permission; the answer arrives as `AuthorizationChanged`
    fn request_authorization(&self);

    /// Start producing `PositionsUpdated` events at the source's own cadence
    fn begin_updates(&self);

    /// Register the single event observer
    ///
    /// `sink` is called synchronously for every event, in emission order.
    /// Dropping the returned registration deregisters it. It does not stop
    /// the underlying sensor.
    fn attach(&self, sink: EventSink) -> EventRegistration;

    /// Register the single event observer as a stream
    fn events(&self) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let registration = self.attach(Box::new(move |event| tx.send(event).is_ok()));
        EventSubscription::new(rx, registration)
    }
}
