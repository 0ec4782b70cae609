//! Directional gesture debouncing.
//!
//! A gesture "excursion" is a continuous movement of the controller away from
//! the last committed position. [`GestureDebouncer`] decides when such an
//! excursion has crossed a threshold (or reached the edge of the control
//! region) and should fire; [`SnapLatch`] remembers the direction of the last
//! latch-guarded fire so one excursion produces exactly one action.

use tracing::trace;

/// Direction of a discrete gesture fire, in device space (up = +y).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Result of evaluating one axis against the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureFire {
    None,
    /// Value moved past the positive threshold or the high region edge.
    Positive,
    /// Value moved past the negative threshold or the low region edge.
    Negative,
}

/// One-shot memory of the last latch-guarded action.
///
/// `Failed` records a snap attempt with no resolvable target window, and
/// `Closed` a desktop close issued through the Square+Cross chord; both
/// suppress repeats the same way a direction does. The latch resets on mode
/// or overlay exit; a fire in a *different* direction simply overwrites it,
/// which is what makes direction reversal re-arm the gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapLatch {
    #[default]
    None,
    Up,
    Down,
    Left,
    Right,
    Failed,
    Closed,
}

impl SnapLatch {
    pub fn from_direction(direction: GestureDirection) -> Self {
        match direction {
            GestureDirection::Up => SnapLatch::Up,
            GestureDirection::Down => SnapLatch::Down,
            GestureDirection::Left => SnapLatch::Left,
            GestureDirection::Right => SnapLatch::Right,
        }
    }

    /// True when the latch already recorded a fire in this direction.
    pub fn matches(&self, direction: GestureDirection) -> bool {
        *self == Self::from_direction(direction)
    }
}

/// Threshold-crossing detector with an edge-hold rate limiter.
///
/// The debouncer itself is stateless; the caller owns the committed
/// reference position and the [`SnapLatch`], and commits the current value
/// after every fire so the next fire needs a fresh excursion.
#[derive(Debug, Clone, Copy)]
pub struct GestureDebouncer {
    /// Base interval (ms) of the logistic rate limiter for held-at-edge
    /// positions.
    auto_repeat_ms: f64,
}

impl GestureDebouncer {
    pub fn new(auto_repeat_ms: i64) -> Self {
        Self {
            auto_repeat_ms: auto_repeat_ms as f64,
        }
    }

    /// Evaluates one axis.
    ///
    /// Fires positive when `current > committed + threshold`, or when
    /// `current` sits at or beyond `edge_high`; negative symmetric against
    /// `edge_low`. A value held at an edge would fire on every sample, so
    /// edge fires are additionally rate limited: the elapsed time since the
    /// last commit must exceed `auto_repeat_ms / (1 + e^(overshoot - 3))`,
    /// i.e. the further past the edge the controller is, the faster the
    /// repeat.
    pub fn evaluate(
        &self,
        current: f32,
        committed: f32,
        threshold: f32,
        edge_low: f32,
        edge_high: f32,
        elapsed_ms: f64,
    ) -> GestureFire {
        if current >= edge_high {
            let overshoot = (current - edge_high) as f64;
            if self.edge_suppressed(overshoot, elapsed_ms) {
                trace!("positive edge fire suppressed (elapsed {}ms)", elapsed_ms);
                return GestureFire::None;
            }
            return GestureFire::Positive;
        }
        if current <= edge_low {
            let overshoot = (edge_low - current) as f64;
            if self.edge_suppressed(overshoot, elapsed_ms) {
                trace!("negative edge fire suppressed (elapsed {}ms)", elapsed_ms);
                return GestureFire::None;
            }
            return GestureFire::Negative;
        }
        if current > committed + threshold {
            return GestureFire::Positive;
        }
        if current < committed - threshold {
            return GestureFire::Negative;
        }
        GestureFire::None
    }

    fn edge_suppressed(&self, overshoot: f64, elapsed_ms: f64) -> bool {
        elapsed_ms <= self.auto_repeat_ms / (1.0 + (overshoot - 3.0).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debouncer() -> GestureDebouncer {
        GestureDebouncer::new(25)
    }

    const EDGES: (f32, f32) = (-20.0, 20.0);

    #[test]
    fn fires_once_per_excursion_with_committed_updates() {
        let d = debouncer();
        let mut committed = 0.0_f32;
        let mut fires = Vec::new();

        // Continuous upward excursion: [0.2, 0.6, 1.2, 1.4, 1.1] with
        // threshold 1.0 must fire exactly once, at 1.2.
        for value in [0.2_f32, 0.6, 1.2, 1.4, 1.1] {
            let fire = d.evaluate(value, committed, 1.0, EDGES.0, EDGES.1, 1000.0);
            if fire != GestureFire::None {
                fires.push((value, fire));
                committed = value;
            }
        }
        assert_eq!(fires, vec![(1.2, GestureFire::Positive)]);
    }

    #[test]
    fn reversal_past_the_opposite_threshold_fires_again() {
        let d = debouncer();
        let mut committed = 0.0_f32;

        assert_eq!(
            d.evaluate(1.2, committed, 1.0, EDGES.0, EDGES.1, 1000.0),
            GestureFire::Positive
        );
        committed = 1.2;

        assert_eq!(
            d.evaluate(0.5, committed, 1.0, EDGES.0, EDGES.1, 1000.0),
            GestureFire::None
        );
        assert_eq!(
            d.evaluate(0.1, committed, 1.0, EDGES.0, EDGES.1, 1000.0),
            GestureFire::Negative
        );
    }

    #[test]
    fn region_edge_fires_without_threshold_crossing() {
        let d = debouncer();
        // committed right next to the edge; no threshold crossing possible
        assert_eq!(
            d.evaluate(20.0, 19.9, 5.0, EDGES.0, EDGES.1, 1000.0),
            GestureFire::Positive
        );
        assert_eq!(
            d.evaluate(-20.5, -19.9, 5.0, EDGES.0, EDGES.1, 1000.0),
            GestureFire::Negative
        );
    }

    #[test]
    fn held_at_edge_is_rate_limited() {
        let d = debouncer();
        // At zero overshoot the limit is ~25/(1+e^-3) ≈ 23.8ms.
        assert_eq!(
            d.evaluate(20.0, 0.0, 1.0, EDGES.0, EDGES.1, 0.0),
            GestureFire::None
        );
        assert_eq!(
            d.evaluate(20.0, 0.0, 1.0, EDGES.0, EDGES.1, 10.0),
            GestureFire::None
        );
        assert_eq!(
            d.evaluate(20.0, 0.0, 1.0, EDGES.0, EDGES.1, 30.0),
            GestureFire::Positive
        );
    }

    #[test]
    fn deeper_overshoot_repeats_faster() {
        let d = debouncer();
        // Far past the edge the logistic limit collapses toward zero.
        assert_eq!(
            d.evaluate(30.0, 0.0, 1.0, EDGES.0, EDGES.1, 1.0),
            GestureFire::Positive
        );
    }

    #[test]
    fn latch_suppresses_same_direction_only() {
        let mut latch = SnapLatch::None;
        assert!(!latch.matches(GestureDirection::Up));

        latch = SnapLatch::from_direction(GestureDirection::Up);
        assert!(latch.matches(GestureDirection::Up));
        assert!(!latch.matches(GestureDirection::Down));

        // A fire in another direction overwrites the latch.
        latch = SnapLatch::from_direction(GestureDirection::Down);
        assert!(latch.matches(GestureDirection::Down));
        assert!(!latch.matches(GestureDirection::Up));
    }
}
