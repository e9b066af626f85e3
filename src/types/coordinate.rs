//! Coordinates, fixes and great-circle distance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distance, in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A 2D geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new coordinate
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle (haversine) distance to another coordinate, in meters
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_METERS * c
    }
}

/// One location fix as reported by a source
///
/// Positions are immutable once received; the tracker only ever clones them
/// into its point list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// Create a new position
    pub fn new(coordinate: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self { coordinate, timestamp }
    }
}

/// Sum of great-circle distances between consecutive positions, in meters
///
/// Zero or one position yields `0.0`.
pub fn path_distance_meters(points: &[Position]) -> f64 {
    points.windows(2).map(|pair| pair[0].coordinate.distance_to(&pair[1].coordinate)).sum()
}
