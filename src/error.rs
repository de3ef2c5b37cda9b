//! Error types for the frame pipeline.
//!
//! Only configuration problems and Video Driver resource failures are errors.
//! Full tables and a saturated frame pool are reported through `Option`
//! results at the call site and never surface here.

use thiserror::Error;

use crate::backend::DriverError;

/// Errors surfaced by the frame pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RendererError {
    /// The Video Driver failed to create or update a resource.
    #[error("video driver error: {0}")]
    Driver(#[from] DriverError),
    /// The renderer configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// An argument was rejected.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type alias for frame pipeline operations.
pub type Result<T> = std::result::Result<T, RendererError>;
