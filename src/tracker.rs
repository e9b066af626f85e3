//! Tracker handle: inputs and output streams for one movement session at a time

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::driver::{Input, Outputs, SessionDriver};
use crate::session::SessionSnapshot;
use crate::source::LocationSource;
use crate::types::{AuthorizationStatus, Coordinate, Phase, Position, TravelSummary};
use crate::{BeelineError, Result};

/// Session tracker
///
/// All session state lives in a driver task spawned by [`Tracker::start`].
/// User actions and source events enter one queue and are processed in the
/// order they arrived. The handle only sends actions and hands out streams.
///
/// Current-value outputs ([`Tracker::phase`], [`Tracker::points`], ...) yield
/// the latest value immediately and then every change. [`Tracker::travel_summaries`]
/// is fire-once: only subscribers present when a session finishes see its
/// summary.
///
/// Dropping the tracker (or calling [`Tracker::shutdown`]) stops the driver,
/// which deregisters from the source. No source call or output emission
/// happens afterwards; output streams end.
pub struct Tracker {
    pending: Option<SessionDriver>,
    inputs: mpsc::UnboundedSender<Input>,
    phase: watch::Receiver<Phase>,
    points: watch::Receiver<Arc<[Position]>>,
    start_coordinate: watch::Receiver<Option<Coordinate>>,
    end_coordinate: watch::Receiver<Option<Coordinate>>,
    current_position: watch::Receiver<Option<Position>>,
    authorization: watch::Receiver<AuthorizationStatus>,
    summaries: broadcast::Receiver<TravelSummary>,
    cancel: CancellationToken,
}

impl Tracker {
    /// Create a tracker with default configuration and the system clock
    pub fn new<S: LocationSource>(source: S) -> Self {
        let config = TrackerConfig::default();
        Self::build(Box::new(source), &config, Arc::new(SystemClock))
    }

    /// Create a tracker with explicit configuration and clock
    pub fn with_config<S: LocationSource>(
        source: S,
        config: TrackerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(Box::new(source), &config, clock))
    }

    fn build(source: Box<dyn LocationSource>, config: &TrackerConfig, clock: Arc<dyn Clock>) -> Self {
        let outputs = Outputs::new(config.summary_capacity);
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();

        let phase = outputs.phase.subscribe();
        let points = outputs.points.subscribe();
        let start_coordinate = outputs.start_coordinate.subscribe();
        let end_coordinate = outputs.end_coordinate.subscribe();
        let current_position = outputs.current_position.subscribe();
        let authorization = outputs.authorization.subscribe();
        let summaries = outputs.summaries.subscribe();

        let driver = SessionDriver {
            source,
            inputs: inputs_rx,
            events: inputs_tx.clone(),
            outputs,
            clock,
            reauthorization_limit: config.reauthorization_limit,
        };

        Self {
            pending: Some(driver),
            inputs: inputs_tx,
            phase,
            points,
            start_coordinate,
            end_coordinate,
            current_position,
            authorization,
            summaries,
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to the source and start processing
    ///
    /// Requests authorization if it is undetermined. Must be called once,
    /// from within a tokio runtime. Actions triggered before this are queued.
    pub fn start(&mut self) -> Result<()> {
        let driver = self.pending.take().ok_or(BeelineError::AlreadyStarted)?;
        info!("Starting tracker");
        driver.spawn(self.cancel.clone());
        Ok(())
    }

    /// The single user action; its meaning depends on the current phase
    ///
    /// Never blocks. Fails only once the tracker has been shut down.
    pub fn action_triggered(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(BeelineError::TrackerStopped);
        }
        self.inputs.send(Input::Action).map_err(|_| BeelineError::TrackerStopped)
    }

    /// Stop the driver and release the source subscription
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            debug!("Shutting down tracker");
            self.cancel.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_none() && !self.inputs.is_closed()
    }

    /// Current phase, then every change
    pub fn phase(&self) -> impl Stream<Item = Phase> + 'static {
        WatchStream::new(self.phase.clone())
    }

    pub fn current_phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// `true` while the phase is [`Phase::Tracking`]
    pub fn is_tracking(&self) -> impl Stream<Item = bool> + 'static {
        self.phase().map(Phase::is_tracking)
    }

    /// Label for the action control: START, STOP or RESET
    pub fn button_label(&self) -> impl Stream<Item = &'static str> + 'static {
        self.phase().map(Phase::button_label)
    }

    /// Points recorded in the active or just-finished session
    pub fn points(&self) -> impl Stream<Item = Arc<[Position]>> + 'static {
        WatchStream::new(self.points.clone())
    }

    /// Last recorded point, for re-centering a map view
    pub fn latest_point(&self) -> impl Stream<Item = Position> + 'static {
        self.points().filter_map(|points| async move { points.last().copied() })
    }

    /// Start coordinate; `None` means no marker
    pub fn start_coordinate(&self) -> impl Stream<Item = Option<Coordinate>> + 'static {
        WatchStream::new(self.start_coordinate.clone())
    }

    /// End coordinate; `None` means no marker
    pub fn end_coordinate(&self) -> impl Stream<Item = Option<Coordinate>> + 'static {
        WatchStream::new(self.end_coordinate.clone())
    }

    /// Most recent fix in any phase
    pub fn current_position(&self) -> impl Stream<Item = Option<Position>> + 'static {
        WatchStream::new(self.current_position.clone())
    }

    /// Whether a location is known yet
    ///
    /// The action is still accepted without one; start and end coordinates
    /// then stay absent.
    pub fn action_enabled(&self) -> impl Stream<Item = bool> + 'static {
        self.current_position().map(|position| position.is_some())
    }

    /// Latest authorization status
    pub fn authorization(&self) -> impl Stream<Item = AuthorizationStatus> + 'static {
        WatchStream::new(self.authorization.clone())
    }

    pub fn current_authorization(&self) -> AuthorizationStatus {
        *self.authorization.borrow()
    }

    /// The permission problem to surface to the user, if any
    pub fn permission_error(&self) -> Option<BeelineError> {
        let status = self.current_authorization();
        status.is_blocked().then(|| BeelineError::permission_denied(status))
    }

    /// One summary per finished session, for subscribers present at the time
    pub fn travel_summaries(&self) -> impl Stream<Item = TravelSummary> + 'static {
        BroadcastStream::new(self.summaries.resubscribe()).filter_map(|result| async move {
            match result {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!("Travel summary subscriber lagged: {}", e);
                    None
                }
            }
        })
    }

    /// Latest published session state
    ///
    /// Fields are read from the individual outputs one after another.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: *self.phase.borrow(),
            points: Arc::clone(&self.points.borrow()),
            start_coordinate: *self.start_coordinate.borrow(),
            end_coordinate: *self.end_coordinate.borrow(),
            last_position: *self.current_position.borrow(),
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        debug!("Dropping tracker");
        self.cancel.cancel();
    }
}
