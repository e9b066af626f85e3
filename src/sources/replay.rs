//! Replay source for recorded tracks
//!
//! Track files are YAML:
//!
//! ```yaml
//! fixes:
//!   - { latitude: 25.0330, longitude: 121.5654, timestamp: "2024-05-01T08:00:00Z" }
//!   - { latitude: 25.0335, longitude: 121.5660, timestamp: "2024-05-01T08:00:05Z" }
//! ```

use chrono::TimeDelta;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::bridge::{EventBridge, EventRegistration, EventSink};
use crate::config::{ReplayConfig, parse_yaml, read_file};
use crate::source::{LocationSource, SourceEvent};
use crate::types::{AuthorizationStatus, Position};
use crate::{BeelineError, Result};

#[derive(Deserialize)]
struct TrackFile {
    fixes: Vec<Position>,
}

/// Location source that plays a recorded track at its recorded pace
///
/// The permission prompt is simulated: a request made while the status is
/// `NotDetermined` is answered from a spawned task, resolving to `Authorized`
/// or `Denied` depending on [`ReplayConfig::grant_on_request`].
pub struct ReplaySource {
    fixes: Arc<[Position]>,
    config: ReplayConfig,
    bridge: EventBridge,
    status: Arc<Mutex<AuthorizationStatus>>,
    prompting: AtomicBool,
    started: AtomicBool,
    cancel: CancellationToken,
}

impl ReplaySource {
    /// Load a track file
    pub fn open<P: AsRef<Path>>(path: P, config: ReplayConfig) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening track file: {}", path.display());

        let track: TrackFile = parse_yaml(&read_file(path)?, "track file")?;
        if track.fixes.is_empty() {
            return Err(BeelineError::EmptyTrack { path: path.to_path_buf() });
        }
        Self::from_fixes(track.fixes, config)
    }

    /// Replay fixes already in memory
    pub fn from_fixes(fixes: Vec<Position>, config: ReplayConfig) -> Result<Self> {
        config.validate()?;
        if fixes.is_empty() {
            return Err(BeelineError::EmptyTrack { path: PathBuf::from("<memory>") });
        }

        debug!(fixes = fixes.len(), speed = config.effective_speed(), "Replay source ready");

        Ok(Self {
            fixes: fixes.into(),
            status: Arc::new(Mutex::new(config.initial_authorization)),
            prompting: AtomicBool::new(false),
            config,
            bridge: EventBridge::new(),
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    /// Recorded time span between the first and last fix
    pub fn duration(&self) -> TimeDelta {
        match (self.fixes.first(), self.fixes.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => TimeDelta::zero(),
        }
    }

    async fn answer_prompt(
        answer: AuthorizationStatus,
        status: Arc<Mutex<AuthorizationStatus>>,
        bridge: EventBridge,
        cancel: CancellationToken,
    ) {
        if cancel.is_cancelled() {
            return;
        }
        *status.lock().unwrap_or_else(PoisonError::into_inner) = answer;
        info!(%answer, "Simulated permission prompt answered");
        bridge.emit(SourceEvent::AuthorizationChanged(answer));
    }

    async fn play(
        fixes: Arc<[Position]>,
        batch_size: usize,
        speed: f64,
        bridge: EventBridge,
        cancel: CancellationToken,
    ) {
        info!("Replay started ({} fixes at {}x)", fixes.len(), speed);
        let mut previous = None;

        for batch in fixes.chunks(batch_size) {
            let Some(last) = batch.last() else {
                continue;
            };

            if let Some(previous) = previous {
                let wait = pacing_delay(previous, last, speed);
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Replay cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
            }
            previous = Some(*last);

            trace!(len = batch.len(), timestamp = %last.timestamp, "Replaying fixes");
            bridge.emit(SourceEvent::PositionsUpdated(batch.to_vec()));
        }

        info!("Replay finished");
    }
}

/// Real-time wait between two fixes at the given speed multiplier
///
/// Out-of-order timestamps replay immediately.
fn pacing_delay(previous: Position, next: &Position, speed: f64) -> Duration {
    let gap = (next.timestamp - previous.timestamp).to_std().unwrap_or(Duration::ZERO);
    gap.div_f64(speed)
}

impl LocationSource for ReplaySource {
    fn current_authorization(&self) -> AuthorizationStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_authorization(&self) {
        if self.current_authorization() != AuthorizationStatus::NotDetermined {
            debug!("Authorization already determined, ignoring request");
            return;
        }
        if self.prompting.swap(true, Ordering::SeqCst) {
            debug!("Permission prompt already showing");
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Cannot show permission prompt outside a tokio runtime: {}", e);
                self.prompting.store(false, Ordering::SeqCst);
                return;
            }
        };

        let answer = if self.config.grant_on_request {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        };
        runtime.spawn(Self::answer_prompt(
            answer,
            Arc::clone(&self.status),
            self.bridge.clone(),
            self.cancel.clone(),
        ));
    }

    fn begin_updates(&self) {
        if !self.current_authorization().is_authorized() {
            warn!("Updates requested without authorization, ignoring");
            return;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Replay already running");
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Cannot start replay outside a tokio runtime: {}", e);
                self.started.store(false, Ordering::SeqCst);
                return;
            }
        };

        runtime.spawn(Self::play(
            Arc::clone(&self.fixes),
            self.config.batch_size,
            self.config.effective_speed(),
            self.bridge.clone(),
            self.cancel.clone(),
        ));
    }

    fn attach(&self, sink: EventSink) -> EventRegistration {
        self.bridge.attach(sink)
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        debug!("Dropping replay source");
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinate;
    use chrono::{DateTime, TimeZone, Utc};
    use futures::StreamExt;
    use std::io::Write;

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + TimeDelta::seconds(seconds)
    }

    fn track() -> Vec<Position> {
        (0..4).map(|i| Position::new(Coordinate::new(0.0, i as f64 * 0.001), t(i * 5))).collect()
    }

    fn authorized_config() -> ReplayConfig {
        ReplayConfig { initial_authorization: AuthorizationStatus::Authorized, ..Default::default() }
    }

    #[test]
    fn open_reads_yaml_track() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "fixes:\n  - {{ latitude: 25.0, longitude: 121.0, timestamp: \"2024-05-01T08:00:00Z\" }}\n  - {{ latitude: 25.001, longitude: 121.0, timestamp: \"2024-05-01T08:00:30Z\" }}"
        )
        .unwrap();

        let source = ReplaySource::open(file.path(), ReplayConfig::default()).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.duration(), TimeDelta::seconds(30));
    }

    #[test]
    fn empty_track_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fixes: []").unwrap();

        let result = ReplaySource::open(file.path(), ReplayConfig::default());
        assert!(matches!(result, Err(BeelineError::EmptyTrack { .. })));
    }

    #[test]
    fn pacing_scales_with_speed_and_ignores_reordering() {
        let a = Position::new(Coordinate::new(0.0, 0.0), t(0));
        let b = Position::new(Coordinate::new(0.0, 0.0), t(10));
        assert_eq!(pacing_delay(a, &b, 2.0), Duration::from_secs(5));
        assert_eq!(pacing_delay(b, &a, 1.0), Duration::ZERO);
    }

    #[tokio::test]
    async fn request_resolves_prompt_once() {
        let source = ReplaySource::from_fixes(track(), ReplayConfig::default()).unwrap();
        let mut events = source.events();

        source.request_authorization();
        source.request_authorization();
        assert_eq!(source.current_authorization(), AuthorizationStatus::NotDetermined);

        assert_eq!(
            events.next().await,
            Some(SourceEvent::AuthorizationChanged(AuthorizationStatus::Authorized))
        );
        assert_eq!(source.current_authorization(), AuthorizationStatus::Authorized);

        source.request_authorization();
        let extra = tokio::time::timeout(Duration::from_millis(50), events.next()).await;
        assert!(extra.is_err(), "prompt answered more than once");

        drop(source);
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn denied_prompt_blocks_updates() {
        let config = ReplayConfig { grant_on_request: false, ..Default::default() };
        let source = ReplaySource::from_fixes(track(), config).unwrap();
        let mut events = source.events();

        source.request_authorization();
        assert_eq!(
            events.next().await,
            Some(SourceEvent::AuthorizationChanged(AuthorizationStatus::Denied))
        );
        source.begin_updates();

        assert_eq!(source.current_authorization(), AuthorizationStatus::Denied);
        assert!(!source.started.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn replays_all_fixes_in_batches_once() {
        let config = ReplayConfig { batch_size: 3, ..authorized_config() };
        let source = ReplaySource::from_fixes(track(), config).unwrap();
        let mut events = source.events();

        source.begin_updates();
        source.begin_updates();

        let fixes = track();
        assert_eq!(events.next().await, Some(SourceEvent::PositionsUpdated(fixes[..3].to_vec())));
        assert_eq!(events.next().await, Some(SourceEvent::PositionsUpdated(fixes[3..].to_vec())));

        // A second start would have replayed the first batch again
        let extra = tokio::time::timeout(Duration::from_secs(60), events.next()).await;
        assert!(extra.is_err());
    }
}
