//! Travel summary for a finished session

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::coordinate::{Position, path_distance_meters};
use crate::{BeelineError, Result};

/// Summary of one completed session, emitted once when tracking stops
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Sum of great-circle distances between consecutive tracked points
    pub total_distance_meters: f64,
}

impl TravelSummary {
    /// Build a summary from the points recorded while tracking
    pub fn from_points(
        points: &[Position],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self { start_time, end_time, total_distance_meters: path_distance_meters(points) }
    }

    pub fn elapsed(&self) -> TimeDelta {
        self.end_time - self.start_time
    }

    /// Elapsed time in (possibly fractional) seconds, at nanosecond precision
    pub fn elapsed_seconds(&self) -> f64 {
        let elapsed = self.elapsed();
        match elapsed.num_nanoseconds() {
            Some(nanos) => nanos as f64 / 1e9,
            // Beyond ~292 years nanoseconds overflow; milliseconds are plenty there
            None => elapsed.num_milliseconds() as f64 / 1000.0,
        }
    }

    /// Average speed over the session in km/h
    ///
    /// Fails with [`BeelineError::ZeroDurationSummary`] when no time elapsed
    /// (or the clock went backwards) instead of producing NaN or infinity.
    pub fn average_speed_kmh(&self) -> Result<f64> {
        let hours = self.elapsed_seconds() / 3600.0;
        if hours <= 0.0 {
            return Err(BeelineError::ZeroDurationSummary { elapsed: self.elapsed() });
        }

        Ok((self.total_distance_meters / 1000.0) / hours)
    }
}
