//! Five-step interactive calibration of the control region.
//!
//! The sequencer captures the four edges of the controller's working volume
//! into a scratch draft and only commits on the final step, so cancelling at
//! any point leaves the active [`ControlRegion`] untouched. While a
//! calibration is running it pre-empts all other pose processing.
//!
//! Flow: PS long-press starts the sequence at step 1. Each Move quick-click
//! arms capture of one edge (top, bottom, left, right in that order); the
//! next incoming pose sample is written into the draft and the sequencer
//! advances. The fifth click validates and commits the draft.

use tracing::{debug, info, warn};

use crate::controller::pose_filter::ControlRegion;
use crate::controller::types::ControllerSample;
use crate::engine::error::CalibrationError;

/// Step 0 is "not calibrating"; steps 1-5 mirror the user-visible prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationStep {
    #[default]
    Inactive,
    Step1,
    Step2,
    Step3,
    Step4,
    Step5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

/// Outcome of a Move quick-click while calibrating.
#[derive(Debug)]
pub enum CalibrationAdvance {
    /// Capture armed; the caller should surface the prompt for the step just
    /// completed once the sample arrives (see [`CalibrationSequencer::observe`]).
    Armed,
    /// A previous capture is still waiting for a pose sample; click ignored.
    AwaitingSample,
    /// Fifth click: the draft was validated and the sequence ended.
    Commit(Result<ControlRegion, CalibrationError>),
    /// No calibration running.
    Inactive,
}

#[derive(Debug, Clone)]
pub struct CalibrationSequencer {
    step: CalibrationStep,
    pending: Option<Edge>,
    draft: ControlRegion,
}

impl CalibrationSequencer {
    pub fn new() -> Self {
        Self {
            step: CalibrationStep::Inactive,
            pending: None,
            draft: ControlRegion::default(),
        }
    }

    pub fn step(&self) -> CalibrationStep {
        self.step
    }

    pub fn is_active(&self) -> bool {
        self.step != CalibrationStep::Inactive
    }

    /// Starts the sequence. The draft is seeded from the current region so a
    /// commit after fewer captures than expected still yields a usable value
    /// set, and returns the first user prompt.
    pub fn begin(&mut self, current: ControlRegion) -> &'static str {
        info!("Calibration started");
        self.step = CalibrationStep::Step1;
        self.pending = None;
        self.draft = current;
        "Point the controller towards the top of your screen and click the Move button. \
         Quick-click Cross to cancel at any time."
    }

    /// Aborts without touching the active region.
    pub fn cancel(&mut self) {
        if self.is_active() {
            info!("Calibration canceled at {:?}", self.step);
        }
        self.step = CalibrationStep::Inactive;
        self.pending = None;
    }

    /// Handles one Move quick-click.
    pub fn advance(&mut self) -> CalibrationAdvance {
        if self.pending.is_some() {
            debug!("Calibration click ignored, capture still pending");
            return CalibrationAdvance::AwaitingSample;
        }
        match self.step {
            CalibrationStep::Inactive => CalibrationAdvance::Inactive,
            CalibrationStep::Step1 => {
                self.pending = Some(Edge::Top);
                CalibrationAdvance::Armed
            }
            CalibrationStep::Step2 => {
                self.pending = Some(Edge::Bottom);
                CalibrationAdvance::Armed
            }
            CalibrationStep::Step3 => {
                self.pending = Some(Edge::Left);
                CalibrationAdvance::Armed
            }
            CalibrationStep::Step4 => {
                self.pending = Some(Edge::Right);
                CalibrationAdvance::Armed
            }
            CalibrationStep::Step5 => {
                self.step = CalibrationStep::Inactive;
                self.pending = None;
                CalibrationAdvance::Commit(self.commit())
            }
        }
    }

    /// Feeds one pose sample. Returns the next user prompt when this sample
    /// completed an armed capture.
    pub fn observe(&mut self, sample: &ControllerSample) -> Option<&'static str> {
        let edge = self.pending.take()?;
        match edge {
            Edge::Top => self.draft.top = sample.position.y,
            Edge::Bottom => self.draft.bottom = sample.position.y,
            Edge::Left => self.draft.left = sample.position.x,
            Edge::Right => self.draft.right = sample.position.x,
        }
        debug!("Calibration captured {:?}: {:?}", edge, self.draft);

        let (next, prompt) = match self.step {
            CalibrationStep::Step1 => (
                CalibrationStep::Step2,
                "Point the controller towards the bottom of your screen and click the Move button.",
            ),
            CalibrationStep::Step2 => (
                CalibrationStep::Step3,
                "Point the controller towards the left side of your screen and click the Move button.",
            ),
            CalibrationStep::Step3 => (
                CalibrationStep::Step4,
                "Point the controller towards the right side of your screen and click the Move button.",
            ),
            CalibrationStep::Step4 => (
                CalibrationStep::Step5,
                "All edges captured. Click the Move button to save the calibration.",
            ),
            // No capture can be armed outside steps 1-4.
            _ => return None,
        };
        self.step = next;
        Some(prompt)
    }

    fn commit(&self) -> Result<ControlRegion, CalibrationError> {
        if self.draft.is_degenerate() {
            warn!("Calibration rejected, degenerate draft {:?}", self.draft);
            return Err(CalibrationError::DegenerateRegion);
        }
        info!(
            "Calibration completed: top {:.2} bottom {:.2} left {:.2} right {:.2}",
            self.draft.top, self.draft.bottom, self.draft.left, self.draft.right
        );
        Ok(self.draft)
    }
}

impl Default for CalibrationSequencer {
    fn default() -> Self {
        Self::new()
    }
}
