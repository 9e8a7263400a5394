//! Controller Handle - Unified API for gamepad input sampling
//!
//! Owns the gamepad polling thread and exposes the latest device state as an
//! [`InputSampler`]. The actuator session pulls one snapshot per control tick;
//! the polling thread keeps the snapshot fresh in between.
//!

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub use super::event_collector::{
    ButtonType, CollectorError, CollectorHandle, CollectorSettings, StickAxis,
};
use super::snapshot::{AxisSnapshot, InputError, InputSampler};

/// Configuration settings for the controller subsystem
///
/// Assigns the physical stick axes and face buttons to their drive roles.
/// The defaults follow the usual Xbox layout: left stick steers, A drives
/// forward, B drives backward.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// How often the polling thread reads the device, in milliseconds
    pub poll_interval_ms: u64,

    /// Axis used for steering
    pub turn_axis: StickAxis,

    /// Axis used as analog throttle (only consulted when analog throttle is enabled)
    pub throttle_axis: StickAxis,

    /// Flip the throttle axis sign for pads that report "up" as negative
    pub invert_throttle_axis: bool,

    /// Button that forces full forward throttle
    pub accelerate_button: ButtonType,

    /// Button that forces full reverse throttle
    pub reverse_button: ButtonType,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5,
            turn_axis: StickAxis::LeftStickX,
            throttle_axis: StickAxis::LeftStickY,
            invert_throttle_axis: false,
            accelerate_button: ButtonType::A,
            reverse_button: ButtonType::B,
        }
    }
}

impl From<&ControllerSettings> for CollectorSettings {
    fn from(settings: &ControllerSettings) -> Self {
        Self {
            poll_interval_ms: settings.poll_interval_ms,
            turn_axis: settings.turn_axis,
            throttle_axis: settings.throttle_axis,
            invert_throttle_axis: settings.invert_throttle_axis,
            accelerate_button: settings.accelerate_button,
            reverse_button: settings.reverse_button,
        }
    }
}

/// Errors that can occur during controller initialization
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Gamepad detection or driver problems, including "no gamepad connected"
    #[error("Collector error: {0}")]
    CollectorError(#[from] CollectorError),

    /// Settings that cannot work, e.g. one button bound to both throttle roles
    #[error("Invalid controller settings: {0}")]
    InvalidSettings(String),
}

/// Handle for the gamepad subsystem
///
/// # Threading Model
///
/// ```text
/// gilrs ──► collector thread ─[watch<AxisSnapshot>]→ ControllerHandle::sample()
/// ```
///
/// The collector thread ends when the active gamepad disconnects; from then on
/// [`InputSampler::sample`] reports [`InputError::DeviceLost`].
pub struct ControllerHandle {
    state_receiver: watch::Receiver<AxisSnapshot>,
    _collector: CollectorHandle,
}

impl ControllerHandle {
    /// Spawns the collector and blocks until a gamepad has been selected.
    ///
    /// # Errors
    ///
    /// * [`ControllerError::CollectorError`] - gilrs failed or no gamepad is present
    /// * [`ControllerError::InvalidSettings`] - conflicting button roles
    pub fn spawn(settings: Option<ControllerSettings>) -> Result<Self, ControllerError> {
        info!(
            "Initializing Controller system with settings: {:?}",
            settings
        );

        let settings = settings.unwrap_or_default();
        if settings.accelerate_button == settings.reverse_button {
            return Err(ControllerError::InvalidSettings(format!(
                "{:?} is bound to both accelerate and reverse",
                settings.accelerate_button
            )));
        }

        let (state_sender, state_receiver) = watch::channel(AxisSnapshot::neutral());
        debug!("Created watch channel for controller snapshots");

        let collector = CollectorHandle::spawn(Some(CollectorSettings::from(&settings)), state_sender)?;

        info!("Controller system initialized successfully");
        Ok(Self {
            state_receiver,
            _collector: collector,
        })
    }
}

impl InputSampler for ControllerHandle {
    fn sample(&mut self) -> Result<AxisSnapshot, InputError> {
        sample_watch(&mut self.state_receiver)
    }
}

/// Reads the latest value; a dropped sender means the device thread is gone.
pub(crate) fn sample_watch(
    receiver: &mut watch::Receiver<AxisSnapshot>,
) -> Result<AxisSnapshot, InputError> {
    match receiver.has_changed() {
        Ok(_) => Ok(*receiver.borrow_and_update()),
        Err(_) => {
            warn!("Controller snapshot channel closed");
            Err(InputError::DeviceLost)
        }
    }
}
