//! Pose normalization and jitter filtering.
//!
//! Raw tracking positions arrive in device units inside an arbitrary working
//! volume. [`ControlRegion`] maps that volume to normalized screen space, and
//! [`PoseFilter`] keeps exponential moving averages of position and
//! orientation that the session uses as its jitter reference.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::controller::types::{ControllerSample, Quat, Vec3};

/// Weight of the current sample in the orientation average. Deliberately slow
/// so the average tracks the resting orientation, letting tilt gestures show
/// up as deltas against it.
pub const ORIENT_WEIGHT: f32 = 0.01;

/// The controller's working volume, in device position units.
///
/// `top > bottom` and `right > left` in a usable region (device Y grows
/// upward). Calibration must never commit a degenerate region; normalization
/// divides by the spans.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlRegion {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl ControlRegion {
    /// Compiled-in default, sized for the given screen width/height ratio so
    /// that cursor gain is comparable on both axes. The vertical half-span is
    /// clamped to [10, 20] units.
    pub fn default_for_ratio(screen_wh_ratio: f32) -> Self {
        let half_height = (30.0 / screen_wh_ratio.max(0.1)).clamp(10.0, 20.0);
        Self {
            top: half_height,
            bottom: -half_height,
            left: -30.0,
            right: 30.0,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// A degenerate region would make [`PoseFilter::normalize`] divide by
    /// zero; calibration rejects these at commit time.
    pub fn is_degenerate(&self) -> bool {
        self.width() == 0.0 || self.height() == 0.0
    }
}

impl Default for ControlRegion {
    fn default() -> Self {
        // 16:9 screen assumed when no ratio is known.
        Self::default_for_ratio(16.0 / 9.0)
    }
}

/// Position mapped through the control region.
///
/// `x` and `y` are clamped to [0, 1]; a value of exactly 0 or 1 means the
/// controller is at or beyond the region edge. `y` is inverted because
/// screen-space Y grows downward while device-space Y grows upward. `z` is
/// the raw depth, passed through.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Exponential-moving-average state for one controller.
#[derive(Debug, Clone)]
pub struct PoseFilter {
    avg_pos: Vec3,
    avg_orient: Quat,
    pos_weight: f32,
    /// True until the first sample seeds the orientation average, and set
    /// again when the user requests an orientation re-reference (PS long
    /// press).
    reseed_orientation: bool,
}

impl PoseFilter {
    /// `pos_weight` is the weight of the current sample; must be in (0, 1].
    /// At 1.0 the filter degenerates to raw passthrough.
    pub fn new(pos_weight: f32) -> Self {
        debug_assert!(pos_weight > 0.0 && pos_weight <= 1.0);
        Self {
            avg_pos: Vec3::default(),
            avg_orient: Quat::default(),
            pos_weight: pos_weight.clamp(f32::EPSILON, 1.0),
            reseed_orientation: true,
        }
    }

    pub fn set_pos_weight(&mut self, pos_weight: f32) {
        self.pos_weight = pos_weight.clamp(f32::EPSILON, 1.0);
    }

    /// Maps a raw position into normalized screen space.
    pub fn normalize(position: Vec3, region: &ControlRegion) -> NormalizedPosition {
        NormalizedPosition {
            x: ((position.x - region.left) / region.width()).clamp(0.0, 1.0),
            y: 1.0 - ((position.y - region.bottom) / region.height()).clamp(0.0, 1.0),
            z: position.z,
        }
    }

    /// Folds one sample into the position and orientation averages.
    pub fn update(&mut self, sample: &ControllerSample) {
        let w = self.pos_weight;
        self.avg_pos.x = w * sample.position.x + (1.0 - w) * self.avg_pos.x;
        self.avg_pos.y = w * sample.position.y + (1.0 - w) * self.avg_pos.y;
        self.avg_pos.z = w * sample.position.z + (1.0 - w) * self.avg_pos.z;

        if self.reseed_orientation {
            debug!("Seeding orientation reference: {:?}", sample.orientation);
            self.avg_orient = sample.orientation;
            self.reseed_orientation = false;
        } else {
            let ow = ORIENT_WEIGHT;
            self.avg_orient.w = ow * sample.orientation.w + (1.0 - ow) * self.avg_orient.w;
            self.avg_orient.x = ow * sample.orientation.x + (1.0 - ow) * self.avg_orient.x;
            self.avg_orient.y = ow * sample.orientation.y + (1.0 - ow) * self.avg_orient.y;
            self.avg_orient.z = ow * sample.orientation.z + (1.0 - ow) * self.avg_orient.z;
        }
    }

    /// Snap the orientation average to the next incoming sample. Keyboard
    /// mode needs a fresh reference because the resting orientation drifts
    /// between sessions.
    pub fn request_orientation_reseed(&mut self) {
        self.reseed_orientation = true;
    }

    pub fn avg_pos(&self) -> Vec3 {
        self.avg_pos
    }

    pub fn avg_orient(&self) -> Quat {
        self.avg_orient
    }
}
