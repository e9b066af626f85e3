//! Location source implementations
//!
//! - [`replay::ReplaySource`] plays a recorded track back as a paced sensor
//! - [`manual::ManualSource`] is driven by hand, for tests and embedding

pub mod manual;
pub mod replay;

pub use manual::{ManualSource, ManualSourceHandle, SourceCall};
pub use replay::ReplaySource;
