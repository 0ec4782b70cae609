//! # Translation Engine - gesture events in, OS actions out
//!
//! ```text
//! RawControllerEvent --> [TranslationEngine pump] --> Action
//!                              |
//!                        [SessionState]
//!                         /    |     \
//!                  GestureD  Calibration  ButtonTimers/PoseFilter
//!                  ebouncer  Sequencer    (crate::controller)
//! ```
//!
//! The pump ([`engine_handle`]) is a statum typestate machine cycling
//! collect -> apply -> publish on a short interval. All translation
//! semantics live in [`session`]; the pump only moves data. Elapsed-time
//! decisions are made against event timestamps, never against the wall
//! clock, so a recorded event stream replays deterministically.

pub mod calibration;
pub mod engine_handle;
pub mod error;
pub mod gesture;
pub mod session;

pub use calibration::{CalibrationSequencer, CalibrationStep};
pub use engine_handle::{EngineHandle, EngineSettings, EngineSnapshot, TranslationEngine};
pub use error::{CalibrationError, EngineError};
pub use gesture::{GestureDebouncer, GestureDirection, GestureFire, SnapLatch};
pub use session::{Overlay, PrimaryMode, SessionState};
