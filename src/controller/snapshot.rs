//! Per-tick input snapshot and the sampling seam used by the actuator session.

use serde::{Deserialize, Serialize};

/// Direction reported by the D-pad (hat switch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DpadDirection {
    N,
    S,
    E,
    W,
    NE,
    NW,
    SE,
    SW,
    Center,
}

impl DpadDirection {
    /// Resolves four D-pad button states into a single direction.
    ///
    /// Opposing buttons cancel each other, so `up + down` reads as no vertical
    /// component.
    pub fn from_buttons(up: bool, down: bool, left: bool, right: bool) -> Self {
        let vertical = (up as i8) - (down as i8);
        let horizontal = (right as i8) - (left as i8);

        match (vertical, horizontal) {
            (1, 0) => DpadDirection::N,
            (-1, 0) => DpadDirection::S,
            (0, 1) => DpadDirection::E,
            (0, -1) => DpadDirection::W,
            (1, 1) => DpadDirection::NE,
            (1, -1) => DpadDirection::NW,
            (-1, 1) => DpadDirection::SE,
            (-1, -1) => DpadDirection::SW,
            _ => DpadDirection::Center,
        }
    }
}

/// One reading of the device, taken once per control tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisSnapshot {
    /// Steering axis in [-1, 1]
    pub turn: f32,
    /// Analog forward axis in [-1, 1]; positive is forward
    pub throttle_axis: f32,
    pub accelerate: bool,
    pub reverse: bool,
    /// `None` when the device exposes no D-pad
    pub dpad: Option<DpadDirection>,
}

impl AxisSnapshot {
    /// Neutral snapshot: sticks centred, nothing pressed.
    pub fn neutral() -> Self {
        Self::default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Input device was lost")]
    DeviceLost,
}

/// Source of [`AxisSnapshot`]s. Must not block.
pub trait InputSampler: Send {
    fn sample(&mut self) -> Result<AxisSnapshot, InputError>;
}
