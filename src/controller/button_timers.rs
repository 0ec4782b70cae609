//! Per-button press/release timing and click classification.
//!
//! Every stateful button handler needs to know two things at release time: how
//! long the button was held, and which other buttons are currently down. Both
//! live here so the per-button logic in the session never duplicates timer
//! bookkeeping.

use chrono::{DateTime, Duration, Local};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::controller::types::MoveButton;

/// Classification of a completed press/release pair.
///
/// The boundary is inclusive: a hold of exactly the threshold still counts as
/// a quick click.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PressClass {
    Quick,
    Long,
}

/// Press timestamps for all buttons of one controller session.
#[derive(Debug, Clone)]
pub struct ButtonTimers {
    /// Press time of buttons currently held down.
    held: HashMap<MoveButton, DateTime<Local>>,
    /// Press time of the most recent press, kept past release. Used for
    /// movement-delay gating after a button press.
    last_press: HashMap<MoveButton, DateTime<Local>>,
    long_press: Duration,
}

impl ButtonTimers {
    /// `long_press_ms` is derived from the configured move delay, see
    /// [`crate::persistence::Settings::scroll_delay_ms`].
    pub fn new(long_press_ms: i64) -> Self {
        Self {
            held: HashMap::new(),
            last_press: HashMap::new(),
            long_press: Duration::milliseconds(long_press_ms),
        }
    }

    pub fn set_long_press_ms(&mut self, long_press_ms: i64) {
        self.long_press = Duration::milliseconds(long_press_ms);
    }

    pub fn on_press(&mut self, button: MoveButton, now: DateTime<Local>) {
        debug!("Button {:?} pressed at {}", button, now.format("%H:%M:%S%.3f"));
        self.held.insert(button, now);
        self.last_press.insert(button, now);
    }

    /// Classifies the completed press. A release with no recorded press (a
    /// dropped press event) classifies as a long press, the less disruptive
    /// interpretation.
    pub fn on_release(&mut self, button: MoveButton, now: DateTime<Local>) -> PressClass {
        match self.held.remove(&button) {
            Some(pressed_at) => {
                let elapsed = now - pressed_at;
                debug!(
                    "Button {:?} released after {}ms",
                    button,
                    elapsed.num_milliseconds()
                );
                if elapsed <= self.long_press {
                    PressClass::Quick
                } else {
                    PressClass::Long
                }
            }
            None => {
                warn!("Release for {:?} without a recorded press", button);
                PressClass::Long
            }
        }
    }

    pub fn is_pressed(&self, button: MoveButton) -> bool {
        self.held.contains_key(&button)
    }

    /// Most recent press time, surviving release. `None` until the button has
    /// been pressed once this session.
    pub fn last_press(&self, button: MoveButton) -> Option<DateTime<Local>> {
        self.last_press.get(&button).copied()
    }
}
