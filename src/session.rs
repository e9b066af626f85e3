//! Session state machine
//!
//! [`Session`] holds every piece of per-session state and applies the two
//! kinds of input the tracker receives: the user action and position
//! batches from the source. It is synchronous and owns no channels, so the
//! tracker task can confine it to a single context and publish the results.
//!
//! | Phase    | Action result | Side effects                                     |
//! |----------|---------------|--------------------------------------------------|
//! | Idle     | Tracking      | start time = now, start coordinate = last fix    |
//! | Tracking | Finished      | end coordinate = last fix, summary emitted       |
//! | Finished | Idle          | points and both coordinates cleared              |

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::types::{Coordinate, Phase, Position, TravelSummary};

/// Outcome of triggering the action
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Idle -> Tracking
    Started { start_coordinate: Option<Coordinate> },
    /// Tracking -> Finished
    Stopped { end_coordinate: Option<Coordinate>, summary: TravelSummary },
    /// Finished -> Idle
    Reset,
}

/// Outcome of observing a position batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// Empty batch, nothing changed
    Ignored,
    /// Last position refreshed, points untouched
    Observed(Position),
    /// Last position refreshed and appended to points
    Appended(Position),
}

/// Immutable view of a session handed to consumers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub points: Arc<[Position]>,
    pub start_coordinate: Option<Coordinate>,
    pub end_coordinate: Option<Coordinate>,
    pub last_position: Option<Position>,
}

/// Per-session state
#[derive(Debug, Clone, Default)]
pub struct Session {
    phase: Phase,
    points: Vec<Position>,
    start_time: Option<DateTime<Utc>>,
    start_coordinate: Option<Coordinate>,
    end_coordinate: Option<Coordinate>,
    last_position: Option<Position>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Positions recorded while tracking, in arrival order
    pub fn points(&self) -> &[Position] {
        &self.points
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn start_coordinate(&self) -> Option<Coordinate> {
        self.start_coordinate
    }

    pub fn end_coordinate(&self) -> Option<Coordinate> {
        self.end_coordinate
    }

    /// Most recent fix, whatever the phase was when it arrived
    pub fn last_position(&self) -> Option<Position> {
        self.last_position
    }

    /// Apply the user action at time `now`
    pub fn trigger(&mut self, now: DateTime<Utc>) -> Transition {
        let transition = match self.phase {
            Phase::Idle => {
                self.start_time = Some(now);
                self.start_coordinate = self.last_position.map(|p| p.coordinate);
                Transition::Started { start_coordinate: self.start_coordinate }
            }
            Phase::Tracking => {
                self.end_coordinate = self.last_position.map(|p| p.coordinate);
                // start_time is always set on entering Tracking
                let start_time = self.start_time.unwrap_or(now);
                let summary = TravelSummary::from_points(&self.points, start_time, now);
                Transition::Stopped { end_coordinate: self.end_coordinate, summary }
            }
            Phase::Finished => {
                self.points.clear();
                self.start_time = None;
                self.start_coordinate = None;
                self.end_coordinate = None;
                Transition::Reset
            }
        };

        self.phase = self.phase.next();
        transition
    }

    /// Fold a position batch into the session
    ///
    /// Only the batch's last element is kept.
    pub fn observe(&mut self, batch: &[Position]) -> Observation {
        let Some(&last) = batch.last() else {
            return Observation::Ignored;
        };

        self.last_position = Some(last);
        if self.phase.is_tracking() {
            self.points.push(last);
            Observation::Appended(last)
        } else {
            Observation::Observed(last)
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            points: self.points.as_slice().into(),
            start_coordinate: self.start_coordinate,
            end_coordinate: self.end_coordinate,
            last_position: self.last_position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use proptest::prelude::*;

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + TimeDelta::seconds(seconds)
    }

    fn fix(lat: f64, lon: f64, seconds: i64) -> Position {
        Position::new(Coordinate::new(lat, lon), t(seconds))
    }

    #[test]
    fn full_session_captures_start_end_and_points() {
        let mut session = Session::new();
        let a = fix(0.0, 0.0, 0);
        let b = fix(0.0, 0.001, 10);
        let c = fix(0.0, 0.002, 20);

        session.observe(&[a]);
        assert_eq!(
            session.trigger(t(0)),
            Transition::Started { start_coordinate: Some(a.coordinate) }
        );

        assert_eq!(session.observe(&[b]), Observation::Appended(b));
        assert_eq!(session.observe(&[c]), Observation::Appended(c));

        match session.trigger(t(20)) {
            Transition::Stopped { end_coordinate, summary } => {
                assert_eq!(end_coordinate, Some(c.coordinate));
                assert_eq!(summary.start_time, t(0));
                assert_eq!(summary.end_time, t(20));
                assert!((summary.total_distance_meters - 111.19).abs() < 0.1);
            }
            other => panic!("expected Stopped, got {other:?}"),
        }

        assert_eq!(session.phase(), Phase::Finished);
        assert_eq!(session.points(), &[b, c]);
        assert_eq!(session.start_coordinate(), Some(a.coordinate));
        assert_eq!(session.end_coordinate(), Some(c.coordinate));
    }

    #[test]
    fn same_point_batch_yields_zero_distance() {
        let mut session = Session::new();
        session.trigger(t(0));
        session.observe(&[fix(0.0, 0.0, 0), fix(0.0, 0.0, 0)]);

        match session.trigger(t(5)) {
            Transition::Stopped { summary, .. } => assert_eq!(summary.total_distance_meters, 0.0),
            other => panic!("expected Stopped, got {other:?}"),
        }
    }

    #[test]
    fn batch_contributes_only_its_last_element() {
        let mut session = Session::new();
        session.trigger(t(0));
        let last = fix(1.0, 1.0, 2);
        session.observe(&[fix(0.0, 0.0, 1), last]);

        assert_eq!(session.points(), &[last]);
        assert_eq!(session.last_position(), Some(last));
    }

    #[test]
    fn no_position_leaves_coordinates_absent() {
        let mut session = Session::new();
        assert_eq!(session.trigger(t(0)), Transition::Started { start_coordinate: None });

        match session.trigger(t(1)) {
            Transition::Stopped { end_coordinate, summary } => {
                assert_eq!(end_coordinate, None);
                assert_eq!(summary.total_distance_meters, 0.0);
            }
            other => panic!("expected Stopped, got {other:?}"),
        }
        assert_eq!(session.start_coordinate(), None);
    }

    #[test]
    fn updates_outside_tracking_refresh_last_position_only() {
        let mut session = Session::new();
        let idle_fix = fix(3.0, 3.0, 0);
        assert_eq!(session.observe(&[idle_fix]), Observation::Observed(idle_fix));

        session.trigger(t(0));
        session.trigger(t(1));
        let finished_fix = fix(4.0, 4.0, 2);
        assert_eq!(session.observe(&[finished_fix]), Observation::Observed(finished_fix));

        assert!(session.points().is_empty());
        assert_eq!(session.last_position(), Some(finished_fix));
    }

    #[test]
    fn empty_batch_is_ignored() {
        let mut session = Session::new();
        session.trigger(t(0));
        assert_eq!(session.observe(&[]), Observation::Ignored);
        assert_eq!(session.last_position(), None);
    }

    #[test]
    fn reset_clears_session_but_keeps_last_position() {
        let mut session = Session::new();
        let p = fix(1.0, 2.0, 0);
        session.observe(&[p]);
        session.trigger(t(0));
        session.observe(&[p]);
        session.trigger(t(1));

        assert_eq!(session.trigger(t(2)), Transition::Reset);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert!(snapshot.points.is_empty());
        assert_eq!(snapshot.start_coordinate, None);
        assert_eq!(snapshot.end_coordinate, None);
        assert_eq!(snapshot.last_position, Some(p));
        assert_eq!(session.start_time(), None);
    }

    #[derive(Debug, Clone)]
    enum Input {
        Action,
        Batch(Vec<Position>),
    }

    prop_compose! {
        fn arb_fix()(lat in -80.0f64..80.0, lon in -170.0f64..170.0, s in 0i64..10_000) -> Position {
            fix(lat, lon, s)
        }
    }

    fn arb_input() -> impl Strategy<Value = Input> {
        prop_oneof![
            1 => Just(Input::Action),
            3 => prop::collection::vec(arb_fix(), 0..4).prop_map(Input::Batch),
        ]
    }

    proptest! {
        #[test]
        fn idle_updates_never_record_points(batches in prop::collection::vec(prop::collection::vec(arb_fix(), 0..4), 0..30)) {
            let mut session = Session::new();
            for batch in &batches {
                session.observe(batch);
            }
            prop_assert_eq!(session.phase(), Phase::Idle);
            prop_assert!(session.points().is_empty());
        }

        #[test]
        fn three_actions_return_to_idle_with_no_points(
            before in prop::collection::vec(arb_fix(), 0..5),
            during in prop::collection::vec(arb_fix(), 0..10),
        ) {
            let mut session = Session::new();
            session.observe(&before);
            session.trigger(t(0));
            for p in &during {
                session.observe(&[*p]);
            }
            session.trigger(t(60));
            session.trigger(t(61));

            prop_assert_eq!(session.phase(), Phase::Idle);
            prop_assert!(session.points().is_empty());
            prop_assert_eq!(session.start_coordinate(), None);
            prop_assert_eq!(session.end_coordinate(), None);
        }

        #[test]
        fn points_grow_only_while_tracking(inputs in prop::collection::vec(arb_input(), 0..60)) {
            let mut session = Session::new();
            let mut now = 0;
            for input in inputs {
                let before = session.points().len();
                let phase = session.phase();
                match input {
                    Input::Action => {
                        now += 1;
                        session.trigger(t(now));
                        if phase == Phase::Finished {
                            prop_assert!(session.points().is_empty());
                        } else {
                            prop_assert_eq!(session.points().len(), before);
                        }
                    }
                    Input::Batch(batch) => {
                        session.observe(&batch);
                        let grew = usize::from(phase.is_tracking() && !batch.is_empty());
                        prop_assert_eq!(session.points().len(), before + grew);
                    }
                }
                if session.phase() == Phase::Idle {
                    prop_assert_eq!(session.start_coordinate(), None);
                    prop_assert_eq!(session.end_coordinate(), None);
                }
            }
        }
    }
}
