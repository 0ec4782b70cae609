//! Device backends feeding the translation engine.
//!
//! ## Feed contract
//! A backend owns one controller and pushes [`RawControllerEvent`]s into the
//! engine's mpsc queue: pose samples at the tracker's native rate plus one
//! event per button edge, each stamped at capture time. Timestamps must be
//! monotonic per controller; all gesture timing derives from them, so a
//! backend that stamps late introduces latency but never corruption.
//!
//! The tracker integration itself is platform specific and lives out of
//! tree. [`ReplaySource`] is the in-tree backend: it feeds a recorded event
//! stream, preserving the recorded timestamps, and is what the integration
//! tests drive the engine with.

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::controller::types::RawControllerEvent;

/// Replays a recorded event stream into an engine queue.
///
/// Events are delivered in order with their original timestamps. `time_scale`
/// compresses (or stretches) the real delays between events; the timestamps
/// themselves are untouched, so the engine's gesture timing sees the
/// recording as it happened.
pub struct ReplaySource {
    events: Vec<RawControllerEvent>,
    time_scale: f64,
}

impl ReplaySource {
    pub fn new(events: Vec<RawControllerEvent>) -> Self {
        Self {
            events,
            time_scale: 1.0,
        }
    }

    /// `0.0` replays as fast as the queue accepts.
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale.max(0.0);
        self
    }

    /// Spawns the replay task. The task ends (and drops its sender) after
    /// the last event.
    pub fn spawn(self, sender: mpsc::Sender<RawControllerEvent>) -> JoinHandle<()> {
        info!(
            "Replaying {} events at {}x speed",
            self.events.len(),
            self.time_scale
        );
        tokio::spawn(async move {
            let mut previous: Option<DateTime<Local>> = None;
            for event in self.events {
                let timestamp = event.timestamp();
                if let Some(previous) = previous {
                    let gap_ms = (timestamp - previous).num_milliseconds().max(0) as f64;
                    let scaled = gap_ms * self.time_scale;
                    if scaled >= 1.0 {
                        tokio::time::sleep(std::time::Duration::from_millis(scaled as u64)).await;
                    }
                }
                previous = Some(timestamp);

                debug!("Replaying {:?}", event);
                if sender.send(event).await.is_err() {
                    warn!("Replay receiver dropped, stopping playback");
                    return;
                }
            }
            debug!("Replay finished");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::types::{ButtonState, ControllerSample, MoveButton, Vec3};
    use chrono::{Duration, Local};

    #[tokio::test]
    async fn replay_preserves_order_and_closes_the_channel() {
        let t0 = Local::now();
        let events = vec![
            RawControllerEvent::Sample(ControllerSample::at(Vec3::default(), t0)),
            RawControllerEvent::ButtonEvent {
                button: MoveButton::Move,
                state: ButtonState::Pressed,
                timestamp: t0 + Duration::milliseconds(100),
            },
            RawControllerEvent::ButtonEvent {
                button: MoveButton::Move,
                state: ButtonState::Released,
                timestamp: t0 + Duration::milliseconds(150),
            },
        ];

        let (tx, mut rx) = mpsc::channel(10);
        ReplaySource::new(events).with_time_scale(0.0).spawn(tx);

        let mut received = Vec::new();
        while let Some(event) = rx.recv().await {
            received.push(event.timestamp());
        }
        assert_eq!(received.len(), 3);
        assert!(received.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
