//! Controller-side input types and leaf components
//!
//! Everything upstream of the translation engine lives here:
//!
//! 1. [`types`] - raw sample and button event types produced by device backends
//! 2. [`button_timers`] - press/release timing and quick/long classification
//! 3. [`pose_filter`] - region normalization and moving-average filtering
//!
//! # Architecture
//!
//! ```text
//! Tracker ──► RawControllerEvent ──► PoseFilter / ButtonTimers ──► SessionState
//!             (device units)         (normalized, classified)
//! ```

pub mod button_timers;
pub mod pose_filter;
pub mod types;

pub use button_timers::{ButtonTimers, PressClass};
pub use pose_filter::{ControlRegion, NormalizedPosition, PoseFilter};
pub use types::{ButtonState, ControllerSample, MoveButton, Quat, RawControllerEvent, Vec3};
