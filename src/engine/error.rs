//! Error definitions for the translation engine.

use thiserror::Error;

/// Engine pump errors.
///
/// Nothing inside the translation core itself is fatal; these cover the
/// plumbing around it (channels, task lifecycle).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to initialize engine: {0}")]
    InitializationError(String),

    #[error("Failed to receive events: {0}")]
    EventReceiveError(String),

    #[error("Failed to publish state: {0}")]
    StateUpdateError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

/// Calibration commit failures. The previous region stays in effect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("captured region is degenerate (zero width or height)")]
    DegenerateRegion,
}
