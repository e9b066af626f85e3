//! Core value types for location tracking.
//!
//! - [`Coordinate`] and [`Position`] describe a single fix
//! - [`AuthorizationStatus`] mirrors the sensor permission state
//! - [`Phase`] is the coarse session state driving the action control
//! - [`TravelSummary`] is the per-session result with distance and speed
//!
//! ```rust
//! use beeline::types::{Coordinate, Position, TravelSummary};
//! use chrono::{TimeDelta, TimeZone, Utc};
//!
//! let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
//! let points = vec![
//!     Position::new(Coordinate::new(0.0, 0.0), start),
//!     Position::new(Coordinate::new(0.0, 0.001), start),
//! ];
//!
//! let summary = TravelSummary::from_points(&points, start, start + TimeDelta::hours(1));
//! let speed = summary.average_speed_kmh().unwrap();
//! assert!((speed - summary.total_distance_meters / 1000.0).abs() < 1e-9);
//! ```

mod authorization;
mod coordinate;
mod phase;
mod summary;

pub use authorization::AuthorizationStatus;
pub use coordinate::{Coordinate, EARTH_RADIUS_METERS, Position, path_distance_meters};
pub use phase::Phase;
pub use summary::TravelSummary;
