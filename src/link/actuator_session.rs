//! Actuator Session - streams motor commands to the robot
//!
//! One session owns the input sampler, the shaper and the smoother. It runs a
//! fixed-period loop while connected and falls back to a short backoff and a
//! fresh connection whenever the link fails.
//!
//! ```text
//! ┌────────────┐  connect ok   ┌───────────┐  send/recv error  ┌──────────────┐
//! │ Connecting │ ────────────► │ Connected │ ────────────────► │ Reconnecting │
//! └────────────┘               └───────────┘                   └──────────────┘
//!       ▲                                                             │
//!       └──────────────────────── backoff elapsed ────────────────────┘
//! ```
//!
//! While the control state is halted, every tick sends a stop command instead
//! of the shaped output.

use chrono::Local;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::wire::MotorCommand;
use super::{backoff, ConnectionState, Connector, LinkError, MessageLink, SessionError};
use crate::control_state::{ControlState, SharedControlState};
use crate::controller::{InputError, InputSampler};
use crate::drive::{CommandShaper, MotionSmoother};

/// Largest catch-up step after an overrun, in send periods
const MAX_TICK_CATCH_UP: f32 = 5.0;

#[derive(Clone, Debug)]
pub struct ActuatorSettings {
    /// Period between commands while driving
    pub send_period: Duration,
    /// Period between stop commands once halted
    pub halt_period: Duration,
    /// Wait before reconnecting after a link failure
    pub retry_backoff: Duration,
    pub smoothing_factor: f32,
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        Self {
            send_period: Duration::from_millis(50),
            halt_period: Duration::from_millis(500),
            retry_backoff: Duration::from_millis(300),
            smoothing_factor: 0.3,
        }
    }
}

enum DriveFault {
    Link(LinkError),
    Input(InputError),
}

impl From<LinkError> for DriveFault {
    fn from(error: LinkError) -> Self {
        DriveFault::Link(error)
    }
}

impl From<InputError> for DriveFault {
    fn from(error: InputError) -> Self {
        DriveFault::Input(error)
    }
}

#[derive(Debug, Default)]
struct SessionStats {
    commands_sent: u64,
    reconnects: u64,
}

pub struct ActuatorSession<C: Connector, S: InputSampler> {
    connector: C,
    sampler: S,
    shaper: CommandShaper,
    smoother: MotionSmoother,
    control: SharedControlState,
    settings: ActuatorSettings,
    cancel: CancellationToken,
    state: ConnectionState,
    stats: SessionStats,
}

impl<C: Connector, S: InputSampler> ActuatorSession<C, S> {
    pub fn new(
        connector: C,
        sampler: S,
        shaper: CommandShaper,
        control: SharedControlState,
        settings: ActuatorSettings,
        cancel: CancellationToken,
    ) -> Self {
        let smoother = MotionSmoother::new(settings.smoothing_factor);
        Self {
            connector,
            sampler,
            shaper,
            smoother,
            control,
            settings,
            cancel,
            state: ConnectionState::Disconnected,
            stats: SessionStats::default(),
        }
    }

    /// Runs until cancelled (`Ok`) or until the input device is lost (`Err`).
    pub async fn run(mut self) -> Result<(), SessionError> {
        info!(
            "Actuator session starting, endpoint {}, smoothing factor {}",
            self.connector.endpoint(),
            self.smoother.factor()
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.state.advance("Robot", ConnectionState::Connecting);
            let connected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.connector.connect() => result,
            };

            let mut link = match connected {
                Ok(link) => link,
                Err(e) => {
                    warn!(
                        "Robot link unavailable ({}), retrying in {:?}",
                        e, self.settings.retry_backoff
                    );
                    self.state.advance("Robot", ConnectionState::Reconnecting);
                    if !backoff(&self.cancel, self.settings.retry_backoff).await {
                        break;
                    }
                    continue;
                }
            };

            self.state.advance("Robot", ConnectionState::Connected);
            self.smoother.reset();
            info!("Connected to robot at {}, control active", self.connector.endpoint());

            match self.drive(&mut link).await {
                Ok(()) => {
                    link.close().await;
                    break;
                }
                Err(DriveFault::Link(e)) => {
                    warn!(
                        "Robot link lost ({}), reconnecting in {:?}",
                        e, self.settings.retry_backoff
                    );
                    link.close().await;
                    self.state.advance("Robot", ConnectionState::Reconnecting);
                    self.stats.reconnects += 1;
                    if !backoff(&self.cancel, self.settings.retry_backoff).await {
                        break;
                    }
                }
                Err(DriveFault::Input(e)) => {
                    error!("Input device lost, stopping robot: {}", e);
                    if let Ok(stop) = MotorCommand::stop().encode() {
                        let _ = link.send_text(stop).await;
                    }
                    link.close().await;
                    self.state.advance("Robot", ConnectionState::Disconnected);
                    return Err(SessionError::Input(e));
                }
            }
        }

        self.state.advance("Robot", ConnectionState::Disconnected);
        info!(
            "Actuator session stopped after {} commands, {} reconnects",
            self.stats.commands_sent, self.stats.reconnects
        );
        Ok(())
    }

    // Fixed-period command loop on one established link
    async fn drive(&mut self, link: &mut C::Link) -> Result<(), DriveFault> {
        let mut last_advance: Option<Instant> = None;
        let mut window_start = Local::now();
        let mut window_commands = 0u64;
        let stats_interval = chrono::Duration::seconds(30);

        loop {
            let tick_start = Instant::now();
            let control = self.control.snapshot().await;

            let (command, period) = if control.halted {
                (MotorCommand::stop(), self.settings.halt_period)
            } else {
                let dt_fraction = dt_fraction(self.settings.send_period, last_advance, tick_start);
                last_advance = Some(tick_start);
                (self.next_command(&control, dt_fraction)?, self.settings.send_period)
            };

            let payload = command
                .encode()
                .map_err(|e| LinkError::Protocol(e.to_string()))?;
            link.send_text(payload).await?;
            window_commands += 1;
            self.stats.commands_sent += 1;

            let now = Local::now();
            if now - window_start > stats_interval {
                let last_change = control
                    .last_transition
                    .map(|at| at.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".to_string());
                info!(
                    "Actuator stats: {} commands in last {} seconds, ceiling {}, last game event {}",
                    window_commands,
                    (now - window_start).num_seconds(),
                    control.speed_ceiling,
                    last_change
                );
                window_commands = 0;
                window_start = now;
            }

            let deadline = tick_start + period;
            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep_until(deadline) => break,
                    inbound = link.recv_text() => match inbound {
                        Ok(Some(text)) => debug!("Ignoring inbound robot message: {}", text),
                        Ok(None) => return Err(LinkError::Closed.into()),
                        Err(e) => return Err(e.into()),
                    },
                }
            }
        }
    }

    fn next_command(
        &mut self,
        control: &ControlState,
        dt_fraction: f32,
    ) -> Result<MotorCommand, InputError> {
        let snapshot = self.sampler.sample()?;
        let target = self.shaper.shape(&snapshot, control.speed_ceiling);
        let output = self.smoother.advance(target, dt_fraction);
        let command = MotorCommand::from_output(output);

        debug!(
            "[{}] M1: {:4} | M2: {:4} | dpad: {:?}",
            if control.boost_active { "BOOST" } else { "NORMAL" },
            command.motor1_vel,
            command.motor2_vel,
            snapshot.dpad
        );
        Ok(command)
    }
}

// Whole send periods since the last advance; the first tick counts as one
fn dt_fraction(send_period: Duration, last_advance: Option<Instant>, now: Instant) -> f32 {
    let Some(last) = last_advance else {
        return 1.0;
    };
    let period = send_period.as_secs_f32();
    if period <= 0.0 {
        return 1.0;
    }
    let ticks = (now.duration_since(last).as_secs_f32() / period).round();
    ticks.clamp(1.0, MAX_TICK_CATCH_UP)
}
