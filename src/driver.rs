//! Driver task that owns the location source and the session

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::clock::Clock;
use crate::session::{Observation, Session, Transition};
use crate::source::{LocationSource, SourceEvent};
use crate::types::{AuthorizationStatus, Coordinate, Phase, Position, TravelSummary};

/// Everything the driver task reacts to, in arrival order
///
/// User actions and source events share one queue: the tracker handle pushes
/// actions, the source's observer sink pushes events from inside `emit`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Input {
    Action,
    Event(SourceEvent),
}

/// Publishing side of every tracker output
pub(crate) struct Outputs {
    pub phase: watch::Sender<Phase>,
    pub points: watch::Sender<Arc<[Position]>>,
    pub start_coordinate: watch::Sender<Option<Coordinate>>,
    pub end_coordinate: watch::Sender<Option<Coordinate>>,
    pub current_position: watch::Sender<Option<Position>>,
    pub authorization: watch::Sender<AuthorizationStatus>,
    pub summaries: broadcast::Sender<TravelSummary>,
}

impl Outputs {
    pub fn new(summary_capacity: usize) -> Self {
        Self {
            phase: watch::channel(Phase::Idle).0,
            points: watch::channel(Arc::<[Position]>::from(Vec::new())).0,
            start_coordinate: watch::channel(None).0,
            end_coordinate: watch::channel(None).0,
            current_position: watch::channel(None).0,
            authorization: watch::channel(AuthorizationStatus::NotDetermined).0,
            summaries: broadcast::channel(summary_capacity).0,
        }
    }
}

/// Everything the driver task takes ownership of
pub(crate) struct SessionDriver {
    pub source: Box<dyn LocationSource>,
    pub inputs: mpsc::UnboundedReceiver<Input>,
    /// Sender half handed to the source as its observer
    pub events: mpsc::UnboundedSender<Input>,
    pub outputs: Outputs,
    pub clock: Arc<dyn Clock>,
    pub reauthorization_limit: u32,
}

impl SessionDriver {
    /// Spawn the driver onto the current runtime
    pub fn spawn(self, cancel: CancellationToken) {
        tokio::spawn(self.run(cancel));
    }

    async fn run(self, cancel: CancellationToken) {
        let SessionDriver { source, mut inputs, events, outputs, clock, reauthorization_limit } = self;
        let mut state = DriverState {
            source,
            outputs,
            clock,
            session: Session::new(),
            reauthorization_limit,
            reauthorizations: 0,
        };

        info!("Tracker driver started");
        let registration = state
            .source
            .attach(Box::new(move |event| events.send(Input::Event(event)).is_ok()));
        state.begin();

        let mut processed = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Tracker driver cancelled");
                    break;
                }
                input = inputs.recv() => match input {
                    Some(Input::Action) => state.handle_action(),
                    Some(Input::Event(event)) => {
                        processed += 1;
                        state.handle_event(event);
                    }
                    None => {
                        debug!("Input queue closed, shutting down");
                        break;
                    }
                },
            }
        }

        // Deregister before the source goes away
        drop(registration);
        info!("Tracker driver ended (processed {} source events)", processed);
    }
}

struct DriverState {
    source: Box<dyn LocationSource>,
    outputs: Outputs,
    clock: Arc<dyn Clock>,
    session: Session,
    reauthorization_limit: u32,
    reauthorizations: u32,
}

impl DriverState {
    fn begin(&mut self) {
        let status = self.source.current_authorization();
        self.outputs.authorization.send_replace(status);
        debug!(%status, "Initial location authorization");

        match status {
            AuthorizationStatus::NotDetermined => {
                info!("Requesting location authorization");
                self.source.request_authorization();
            }
            AuthorizationStatus::Authorized => self.source.begin_updates(),
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
                warn!(%status, "Location permission unavailable");
            }
        }
    }

    fn handle_action(&mut self) {
        let now = self.clock.now();
        let from = self.session.phase();

        match self.session.trigger(now) {
            Transition::Started { start_coordinate } => {
                info!(?start_coordinate, "Tracking started");
                self.outputs.phase.send_replace(Phase::Tracking);
                self.outputs.start_coordinate.send_replace(start_coordinate);
            }
            Transition::Stopped { end_coordinate, summary } => {
                info!(
                    ?end_coordinate,
                    points = self.session.points().len(),
                    distance_m = summary.total_distance_meters,
                    "Tracking finished"
                );
                self.outputs.end_coordinate.send_replace(end_coordinate);
                self.outputs.phase.send_replace(Phase::Finished);
                if self.outputs.summaries.send(summary).is_err() {
                    debug!("No summary subscribers");
                }
            }
            Transition::Reset => {
                info!("Session reset");
                self.outputs.points.send_replace(Arc::<[Position]>::from(Vec::new()));
                self.outputs.start_coordinate.send_replace(None);
                self.outputs.end_coordinate.send_replace(None);
                self.outputs.phase.send_replace(Phase::Idle);
            }
        }

        debug!(?from, to = ?self.session.phase(), "Phase transition");
    }

    fn handle_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::AuthorizationChanged(status) => self.handle_authorization(status),
            SourceEvent::PositionsUpdated(batch) => match self.session.observe(&batch) {
                Observation::Ignored => warn!("Ignoring empty position batch"),
                Observation::Observed(position) => {
                    trace!(?position, "Position observed");
                    self.outputs.current_position.send_replace(Some(position));
                }
                Observation::Appended(position) => {
                    trace!(?position, points = self.session.points().len(), "Position recorded");
                    self.outputs.current_position.send_replace(Some(position));
                    self.outputs.points.send_replace(self.session.points().into());
                }
            },
        }
    }

    fn handle_authorization(&mut self, status: AuthorizationStatus) {
        self.outputs.authorization.send_replace(status);

        match status {
            AuthorizationStatus::NotDetermined => {
                if self.reauthorizations < self.reauthorization_limit {
                    self.reauthorizations += 1;
                    debug!(attempt = self.reauthorizations, "Authorization undetermined, requesting again");
                    self.source.request_authorization();
                } else {
                    warn!(
                        limit = self.reauthorization_limit,
                        "Authorization still undetermined, not requesting again"
                    );
                }
            }
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
                self.reauthorizations = 0;
                warn!(%status, "Location permission unavailable");
            }
            AuthorizationStatus::Authorized => {
                self.reauthorizations = 0;
                info!("Location authorized, beginning updates");
                self.source.begin_updates();
            }
        }
    }
}
