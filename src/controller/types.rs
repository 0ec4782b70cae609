use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// 3D position in device units, as reported by the tracking backend.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Controller orientation as a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

// One pose reading from the controller. Produced by the device backend at its
// native rate, consumed synchronously, never retained.
#[derive(Debug, Clone, Copy)]
pub struct ControllerSample {
    pub position: Vec3,
    pub orientation: Quat,
    /// Analog trigger value in [0, 1].
    pub trigger: f32,
    pub timestamp: DateTime<Local>,
}

impl ControllerSample {
    pub fn at(position: Vec3, timestamp: DateTime<Local>) -> Self {
        Self {
            position,
            orientation: Quat::default(),
            trigger: 0.0,
            timestamp,
        }
    }
}

// Button state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

// Physical buttons on the motion controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveButton {
    Triangle,
    Circle,
    Cross,
    Square,
    Select,
    Start,
    Ps,
    /// The large action button on the face of the controller.
    Move,
    /// The analog trigger treated as a digital button (T/L).
    Trigger,
}

// Raw controller event with precise chrono timestamps
#[derive(Debug, Clone)]
pub enum RawControllerEvent {
    Sample(ControllerSample),
    ButtonEvent {
        button: MoveButton,
        state: ButtonState,
        timestamp: DateTime<Local>,
    },
}

impl RawControllerEvent {
    pub fn timestamp(&self) -> DateTime<Local> {
        match self {
            RawControllerEvent::Sample(sample) => sample.timestamp,
            RawControllerEvent::ButtonEvent { timestamp, .. } => *timestamp,
        }
    }
}
