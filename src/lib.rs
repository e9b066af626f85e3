//! Beeline session tracking from a stream of location fixes.
//!
//! A [`Tracker`] consumes authorization changes and position batches from a
//! [`LocationSource`] and turns a start/stop pair of user actions into a
//! session: start and end coordinates, the recorded path, and a
//! [`TravelSummary`] with distance, duration and average speed.
//!
//! # Features
//!
//! - **Single-writer session state**: source events and user actions are
//!   serialized onto one driver task
//! - **Reactive outputs**: current-value streams for phase, points and
//!   coordinates, a fire-once stream for summaries
//! - **Pluggable sources**: recorded-track replay and a hand-driven source
//!
//! ## Example (track replay)
//!
//! ```rust,no_run
//! use beeline::{Beeline, ReplayConfig};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> beeline::Result<()> {
//!     let mut tracker = Beeline::replay("commute.yaml", ReplayConfig::default())?;
//!     tracker.start()?;
//!
//!     let mut summaries = Box::pin(tracker.travel_summaries());
//!     tracker.action_triggered()?; // START
//!     tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//!     tracker.action_triggered()?; // STOP
//!
//!     if let Some(summary) = summaries.next().await {
//!         println!("{:.0} m in {:.0} s", summary.total_distance_meters, summary.elapsed_seconds());
//!         match summary.average_speed_kmh() {
//!             Ok(speed) => println!("{speed:.1} km/h"),
//!             Err(e) => println!("no speed: {e}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod error;
pub mod types;

// Source side
pub mod bridge;
pub mod source;
pub mod sources;

// Session side
pub mod clock;
pub mod config;
mod driver;
pub mod session;
pub mod tracker;

pub use error::*;
pub use types::*;

pub use bridge::{EventBridge, EventRegistration, EventSink, EventSubscription};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ReplayConfig, TrackerConfig};
pub use session::{Session, SessionSnapshot};
pub use source::{LocationSource, SourceEvent};
pub use sources::{ManualSource, ManualSourceHandle, ReplaySource, SourceCall};
pub use tracker::Tracker;

/// Convenience constructors for common tracker setups.
pub struct Beeline;

impl Beeline {
    /// Track a recorded YAML track file played back as a live sensor.
    ///
    /// The returned tracker is not started yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a valid track, or
    /// contains no fixes, or if `config` is invalid.
    pub fn replay<P: AsRef<std::path::Path>>(path: P, config: ReplayConfig) -> Result<Tracker> {
        let source = ReplaySource::open(path, config)?;
        Ok(Tracker::new(source))
    }

    /// Track a hand-driven source, returning the handle that drives it.
    pub fn manual(initial: AuthorizationStatus) -> (Tracker, ManualSourceHandle) {
        let (source, handle) = ManualSource::new(initial);
        (Tracker::new(source), handle)
    }
}
