//! Error types for session tracking.
//!
//! Every fallible operation in the crate returns [`BeelineError`]. Domain
//! conditions that occur while a session is running (a denied permission, a
//! summary with no elapsed time) are never raised through the output streams;
//! they are carried as data and converted into a [`BeelineError`] only when a
//! caller asks for the derived value.
//!
//! ## Error Categories
//!
//! - **Domain Errors**: zero-duration summaries, denied location permission
//! - **Lifecycle Errors**: starting twice, commanding a tracker that is gone
//! - **Input Errors**: unreadable or malformed config and track files
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use beeline::{AuthorizationStatus, BeelineError};
//!
//! let error = BeelineError::permission_denied(AuthorizationStatus::Denied);
//! assert!(!error.is_retryable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;

use chrono::TimeDelta;
use thiserror::Error;

use crate::types::AuthorizationStatus;

/// Result type alias for tracker operations.
pub type Result<T, E = BeelineError> = std::result::Result<T, E>;

/// Main error type for tracker operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BeelineError {
    #[error("Cannot derive average speed: session elapsed {elapsed}")]
    ZeroDurationSummary { elapsed: TimeDelta },

    #[error("Location permission unavailable: {status}")]
    PermissionDenied { status: AuthorizationStatus },

    #[error("Tracker already started")]
    AlreadyStarted,

    #[error("Tracker is no longer running")]
    TrackerStopped,

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Track file contains no fixes: {path}")]
    EmptyTrack { path: PathBuf },
}

impl BeelineError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            BeelineError::ZeroDurationSummary { .. } => false,
            BeelineError::PermissionDenied { .. } => false,
            BeelineError::AlreadyStarted => false,
            BeelineError::TrackerStopped => false,
            BeelineError::File { .. } => true,
            BeelineError::Parse { .. } => false,
            BeelineError::InvalidConfig { .. } => false,
            BeelineError::EmptyTrack { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            BeelineError::ZeroDurationSummary { .. } => vec![
                "Let the session run before stopping it",
                "Check that the clock is monotonic",
            ],
            BeelineError::PermissionDenied { .. } => vec![
                "Grant location access in the platform settings",
                "Check for parental or device management restrictions",
            ],
            BeelineError::AlreadyStarted => {
                vec!["Call start() exactly once per tracker", "Create a new tracker instead"]
            }
            BeelineError::TrackerStopped => {
                vec!["Create a new tracker", "Avoid using a tracker after shutdown()"]
            }
            BeelineError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
                "Retry once the file is available",
            ],
            BeelineError::Parse { .. } => vec![
                "Check the YAML syntax",
                "Verify field names and timestamp formats",
            ],
            BeelineError::InvalidConfig { .. } => {
                vec!["Check the configured value range", "Remove the field to use its default"]
            }
            BeelineError::EmptyTrack { .. } => {
                vec!["Record at least one fix in the track file", "Check the file path"]
            }
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        BeelineError::File { path, source }
    }

    /// Helper constructor for parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        BeelineError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BeelineError::InvalidConfig { field: field.into(), reason: reason.into() }
    }

    /// Helper constructor for permission errors.
    pub fn permission_denied(status: AuthorizationStatus) -> Self {
        BeelineError::PermissionDenied { status }
    }
}

impl From<std::io::Error> for BeelineError {
    fn from(err: std::io::Error) -> Self {
        BeelineError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_carry_their_context(
                field in "\\w+",
                reason in ".*",
                details in ".*",
                seconds in -3600i64..3600i64,
            ) {
                let config_msg = BeelineError::invalid_config(field.clone(), reason.clone()).to_string();
                prop_assert!(config_msg.contains(&field));
                prop_assert!(config_msg.contains(&reason));

                let parse_msg = BeelineError::parse_error("track file", details.clone()).to_string();
                prop_assert!(parse_msg.contains(&details));

                let elapsed = TimeDelta::seconds(seconds);
                let zero_msg = BeelineError::ZeroDurationSummary { elapsed }.to_string();
                prop_assert!(zero_msg.contains(&elapsed.to_string()));
            }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<BeelineError>();

        let error = BeelineError::TrackerStopped;
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_methods_work() {
        let file_error = BeelineError::file_error(
            PathBuf::from("/track.yaml"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let permission_error = BeelineError::permission_denied(AuthorizationStatus::Restricted);

        assert!(file_error.is_retryable());
        assert!(!permission_error.is_retryable());
        assert!(!BeelineError::AlreadyStarted.is_retryable());

        for suggestion in permission_error.recovery_suggestions() {
            assert!(suggestion.len() > 5);
        }
        assert!(permission_error.to_string().contains("Restricted"));
    }

    #[test]
    fn from_io_error_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "track file");
        match BeelineError::from(io_err) {
            BeelineError::File { source, .. } => assert_eq!(source.to_string(), "track file"),
            other => panic!("Expected File error variant, got {other:?}"),
        }
    }
}
