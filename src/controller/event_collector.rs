use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use serde::{Deserialize, Serialize};
use statum::{machine, state};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::controller::snapshot::{AxisSnapshot, DpadDirection};

// Stick axis that can be assigned to the turn or throttle role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StickAxis {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
}

impl StickAxis {
    fn to_gilrs(self) -> Axis {
        match self {
            StickAxis::LeftStickX => Axis::LeftStickX,
            StickAxis::LeftStickY => Axis::LeftStickY,
            StickAxis::RightStickX => Axis::RightStickX,
            StickAxis::RightStickY => Axis::RightStickY,
        }
    }
}

// Button type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonType {
    A,
    B,
    X,
    Y,
    Start,
    Select,
    LeftBumper,
    RightBumper,
    LeftStick,
    RightStick,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    Guide,
}

impl ButtonType {
    fn to_gilrs(self) -> Button {
        match self {
            ButtonType::A => Button::South,
            ButtonType::B => Button::East,
            ButtonType::Y => Button::West,
            ButtonType::X => Button::North,
            ButtonType::Start => Button::Start,
            ButtonType::Select => Button::Select,
            ButtonType::LeftBumper => Button::LeftTrigger,
            ButtonType::RightBumper => Button::RightTrigger,
            ButtonType::LeftStick => Button::LeftThumb,
            ButtonType::RightStick => Button::RightThumb,
            ButtonType::DPadUp => Button::DPadUp,
            ButtonType::DPadDown => Button::DPadDown,
            ButtonType::DPadLeft => Button::DPadLeft,
            ButtonType::DPadRight => Button::DPadRight,
            ButtonType::Guide => Button::Mode,
        }
    }
}

// Collector settings
#[derive(Clone, Debug)]
pub struct CollectorSettings {
    pub poll_interval_ms: u64,
    pub turn_axis: StickAxis,
    pub throttle_axis: StickAxis,
    pub invert_throttle_axis: bool,
    pub accelerate_button: ButtonType,
    pub reverse_button: ButtonType,
}

impl Default for CollectorSettings {
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

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("No gamepad connected")]
    NoGamepadError,

    #[error("Active gamepad disconnected: {0}")]
    DeviceLost(String),
}

// Define collector states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
#[derive(Debug)]
pub struct EventCollector<S: CollectionState> {
    // Gilrs context
    gilrs: Gilrs,

    // Active gamepad
    active_gamepad: Option<GamepadId>,

    // Collector settings
    settings: CollectorSettings,

    // Latest snapshot for the sampler side
    snapshot_sender: watch::Sender<AxisSnapshot>,
}

impl EventCollector<Initializing> {
    pub fn create(
        settings: Option<CollectorSettings>,
        snapshot_sender: watch::Sender<AxisSnapshot>,
    ) -> Result<Self, CollectorError> {
        let settings = settings.unwrap_or_default();
        debug!("Creating Event Collector with settings: {:?}", settings);

        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, None, settings, snapshot_sender))
    }

    // Select the gamepad and transition to Collecting state
    pub fn initialize(mut self) -> Result<EventCollector<Collecting>, CollectorError> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            error!("No gamepad connected");
            return Err(CollectorError::NoGamepadError);
        }

        info!("Found {} gamepads:", gamepads.len());
        for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
            info!(
                "  [{}] ID: {}, Name: {}, UUID: {:?}",
                idx,
                id,
                gamepad.name(),
                gamepad.uuid()
            );
        }

        // Only one device is driven; extra pads are ignored
        let (id, gamepad) = &gamepads[0];
        if gamepads.len() > 1 {
            warn!(
                "{} gamepads connected, only {} will be used",
                gamepads.len(),
                gamepad.name()
            );
        }
        self.active_gamepad = Some(*id);
        info!("Selected gamepad: {} ({})", gamepad.name(), id);

        info!("Event Collector initialized, transitioning to Collecting state");
        Ok(self.transition())
    }
}

impl EventCollector<Collecting> {
    // Drain pending gilrs events and read the cached device state
    pub fn collect_snapshot(&mut self) -> Result<AxisSnapshot, CollectorError> {
        let active_id = self
            .active_gamepad
            .ok_or_else(|| CollectorError::DeviceLost("no active gamepad".to_string()))?;

        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            if id != active_id {
                trace!("Skipping event from non-active gamepad: {:?}", id);
                continue;
            }

            match event {
                EventType::Disconnected => {
                    warn!("Controller disconnected event detected");
                    return Err(CollectorError::DeviceLost(id.to_string()));
                }
                EventType::ButtonPressed(button, _) => {
                    debug!("Button pressed: {:?} ({:?})", button, map_button(button));
                }
                EventType::ButtonReleased(button, _) => {
                    debug!("Button released: {:?} ({:?})", button, map_button(button));
                }
                other => trace!("Gilrs event: {:?}", other),
            }
        }

        let gamepad = self
            .gilrs
            .connected_gamepad(active_id)
            .ok_or_else(|| CollectorError::DeviceLost(active_id.to_string()))?;

        Ok(read_snapshot(&gamepad, &self.settings))
    }

    // Poll until the device is lost or nobody listens any more
    pub fn run_collection_loop(&mut self) -> Result<(), CollectorError> {
        info!("Starting Event Collector loop");
        let poll_interval = Duration::from_millis(self.settings.poll_interval_ms.max(1));

        loop {
            let snapshot = self.collect_snapshot()?;

            self.snapshot_sender.send_if_modified(|current| {
                if *current != snapshot {
                    *current = snapshot;
                    true
                } else {
                    false
                }
            });

            if self.snapshot_sender.is_closed() {
                info!("All snapshot receivers dropped, stopping collector");
                return Ok(());
            }

            std::thread::sleep(poll_interval);
        }
    }
}

fn read_snapshot(gamepad: &Gamepad<'_>, settings: &CollectorSettings) -> AxisSnapshot {
    let throttle_axis = gamepad.value(settings.throttle_axis.to_gilrs());
    let throttle_axis = if settings.invert_throttle_axis {
        -throttle_axis
    } else {
        throttle_axis
    };

    let dpad = gamepad.button_code(Button::DPadUp).map(|_| {
        DpadDirection::from_buttons(
            gamepad.is_pressed(Button::DPadUp),
            gamepad.is_pressed(Button::DPadDown),
            gamepad.is_pressed(Button::DPadLeft),
            gamepad.is_pressed(Button::DPadRight),
        )
    });

    AxisSnapshot {
        turn: gamepad.value(settings.turn_axis.to_gilrs()).clamp(-1.0, 1.0),
        throttle_axis: throttle_axis.clamp(-1.0, 1.0),
        accelerate: gamepad.is_pressed(settings.accelerate_button.to_gilrs()),
        reverse: gamepad.is_pressed(settings.reverse_button.to_gilrs()),
        dpad,
    }
}

// Public interface for spawning and running the collector
pub struct CollectorHandle {
    _thread: std::thread::JoinHandle<()>,
}

impl CollectorHandle {
    /// Starts the polling thread and waits until the gamepad has been selected.
    ///
    /// The gilrs context is created inside the thread and never leaves it.
    pub fn spawn(
        settings: Option<CollectorSettings>,
        snapshot_sender: watch::Sender<AxisSnapshot>,
    ) -> Result<Self, CollectorError> {
        info!("Spawning Event Collector with settings: {:?}", settings);

        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<(), CollectorError>>(1);

        let thread = std::thread::Builder::new()
            .name("gamepad-collector".to_string())
            .spawn(move || {
                let collector = match EventCollector::create(settings, snapshot_sender) {
                    Ok(collector) => collector,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let mut collecting = match collector.initialize() {
                    Ok(collecting) => collecting,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let _ = ready_tx.send(Ok(()));

                match collecting.run_collection_loop() {
                    Ok(()) => info!("Event Collector finished"),
                    Err(e) => error!("Collector terminated with error: {}", e),
                }
            })
            .map_err(|e| CollectorError::InitializationError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Event Collector successfully started");
                Ok(Self { _thread: thread })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CollectorError::InitializationError(
                "collector thread exited during startup".to_string(),
            )),
        }
    }
}

// Helper function to map gilrs Button to our ButtonType
fn map_button(button: Button) -> Option<ButtonType> {
    match button {
        Button::South => Some(ButtonType::A),
        Button::East => Some(ButtonType::B),
        Button::West => Some(ButtonType::Y),
        Button::North => Some(ButtonType::X),
        Button::Start => Some(ButtonType::Start),
        Button::Select => Some(ButtonType::Select),
        Button::LeftTrigger => Some(ButtonType::LeftBumper),
        Button::RightTrigger => Some(ButtonType::RightBumper),
        Button::LeftThumb => Some(ButtonType::LeftStick),
        Button::RightThumb => Some(ButtonType::RightStick),
        Button::DPadUp => Some(ButtonType::DPadUp),
        Button::DPadDown => Some(ButtonType::DPadDown),
        Button::DPadLeft => Some(ButtonType::DPadLeft),
        Button::DPadRight => Some(ButtonType::DPadRight),
        Button::Mode => Some(ButtonType::Guide),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_mapping_is_symmetric() {
        let all = [
            ButtonType::A,
            ButtonType::B,
            ButtonType::X,
            ButtonType::Y,
            ButtonType::Start,
            ButtonType::Select,
            ButtonType::LeftBumper,
            ButtonType::RightBumper,
            ButtonType::LeftStick,
            ButtonType::RightStick,
            ButtonType::DPadUp,
            ButtonType::DPadDown,
            ButtonType::DPadLeft,
            ButtonType::DPadRight,
            ButtonType::Guide,
        ];

        for button in all {
            assert_eq!(map_button(button.to_gilrs()), Some(button));
        }
    }

    #[test]
    fn default_roles_match_face_buttons() {
        let settings = CollectorSettings::default();
        assert_eq!(settings.accelerate_button.to_gilrs(), Button::South);
        assert_eq!(settings.reverse_button.to_gilrs(), Button::East);
        assert_eq!(settings.turn_axis.to_gilrs(), Axis::LeftStickX);
    }
}
