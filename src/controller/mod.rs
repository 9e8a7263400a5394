//! Controller subsystem for gamepad input sampling
//!
//! 1. [`event_collector`] - gilrs polling thread that keeps the latest device state
//! 2. [`controller_handle`] - lifecycle and the [`InputSampler`] implementation
//! 3. [`snapshot`] - the per-tick [`AxisSnapshot`] value and the sampling trait
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Collector thread ──► watch<AxisSnapshot> ──► ActuatorSession
//! ```

pub mod controller_handle;
pub mod event_collector;
pub mod snapshot;

pub use controller_handle::{ControllerError, ControllerHandle, ControllerSettings};
pub use event_collector::{ButtonType, StickAxis};
pub use snapshot::{AxisSnapshot, DpadDirection, InputError, InputSampler};
