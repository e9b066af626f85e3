//! Session phase

use serde::{Deserialize, Serialize};

/// Coarse session state
///
/// Transitions are strictly cyclic: `Idle -> Tracking -> Finished -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    /// No active session
    #[default]
    Idle,
    /// Session active, points accumulate
    Tracking,
    /// Session ended, points kept for display until reset
    Finished,
}

impl Phase {
    /// The phase entered when the action is triggered in this phase
    pub fn next(self) -> Phase {
        match self {
            Phase::Idle => Phase::Tracking,
            Phase::Tracking => Phase::Finished,
            Phase::Finished => Phase::Idle,
        }
    }

    pub fn is_tracking(self) -> bool {
        self == Phase::Tracking
    }

    /// Label for the single action control
    pub fn button_label(self) -> &'static str {
        match self {
            Phase::Idle => "START",
            Phase::Tracking => "STOP",
            Phase::Finished => "RESET",
        }
    }
}
