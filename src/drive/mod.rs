//! Drive pipeline: from a gamepad snapshot to smoothed differential motor values.
//!
//! ```text
//! AxisSnapshot ──► CommandShaper ──► MotorTarget ──► MotionSmoother ──► MotorOutput
//!                  (deadzone, curve,                 (first-order lag)
//!                   override, mixing)
//! ```

pub mod shaper;
pub mod smoother;

pub use shaper::{CommandShaper, MixMode, MotorTarget, ShaperConfig};
pub use smoother::{MotionSmoother, MotorOutput};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Invalid drive parameter: {0}")]
    InvalidParameter(String),
}
