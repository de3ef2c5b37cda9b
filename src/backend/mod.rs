//! Video Driver abstraction layer
//!
//! Provides the trait and types every graphics API binding implements, plus
//! an in-memory recording driver.

pub mod traits;
pub mod types;

#[cfg(feature = "recording")]
pub mod recording;

pub use traits::*;
pub use types::*;

#[cfg(feature = "recording")]
pub use recording::{CommandLog, DriverCommand, RecordingDriver};
