//! # Configuration
//!
//! All tunables live in one TOML file under the user's config directory
//! (`~/.config/teledrive/config.toml` on Linux). A missing file is created with
//! the defaults on first start, so the file doubles as documentation of every
//! knob. Unknown or missing keys fall back to defaults section by section.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::control_state::SpeedLevels;
use crate::controller::ControllerSettings;
use crate::drive::ShaperConfig;
use crate::link::{ActuatorSettings, StatusSettings};

const CONFIG_DIR: &str = "teledrive";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Endpoints and retry policy for both links.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    /// Robot firmware WebSocket, receives motor commands
    pub actuator_uri: String,
    /// Game server WebSocket, sends power-up / game-over status
    pub status_uri: String,
    pub actuator_retry_ms: u64,
    pub status_retry_ms: u64,
    pub status_fault_backoff_ms: u64,
    /// Time the sessions get to stop after Ctrl-C before they are aborted
    pub shutdown_grace_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            actuator_uri: "ws://192.168.1.116:81".to_string(),
            status_uri: "ws://127.0.0.1:8765".to_string(),
            actuator_retry_ms: 300,
            status_retry_ms: 3000,
            status_fault_backoff_ms: 1000,
            shutdown_grace_ms: 1000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DriveConfig {
    /// Command period while driving (50 ms = 20 Hz)
    pub send_period_ms: u64,
    /// Command period once the game is over
    pub halt_period_ms: u64,
    pub speed_normal: f32,
    pub speed_boost: f32,
    /// Share of the remaining distance covered per tick, in (0, 1]
    pub smoothing_factor: f32,
    pub shaper: ShaperConfig,
}

impl Default for DriveConfig {
    fn default() -> Self {
        let levels = SpeedLevels::default();
        Self {
            send_period_ms: 50,
            halt_period_ms: 500,
            speed_normal: levels.normal,
            speed_boost: levels.boost,
            smoothing_factor: 0.3,
            shaper: ShaperConfig::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct TeleopConfig {
    pub links: LinkConfig,
    pub drive: DriveConfig,
    pub controller: ControllerSettings,
}

impl TeleopConfig {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Loads the config at the default location, writing defaults if absent.
    pub async fn load_or_create() -> Result<Self> {
        Self::load_or_create_at(&Self::default_path()).await
    }

    pub async fn load_or_create_at(path: &Path) -> Result<Self> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?;

        let config = if exists {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
            let config: TeleopConfig = toml::from_str(&content)
                .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;
            info!("Loaded configuration from {}", path.display());
            config
        } else {
            warn!(
                "No config file at {}, writing defaults",
                path.display()
            );
            let config = TeleopConfig::default();
            config.save_to(path).await?;
            config
        };

        config
            .validate()
            .map_err(|e| eyre!("Invalid configuration in {}: {}", path.display(), e))?;
        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let drive = &self.drive;

        if drive.send_period_ms == 0 {
            return Err(invalid("drive.send_period_ms", "must be greater than 0"));
        }
        if drive.halt_period_ms == 0 {
            return Err(invalid("drive.halt_period_ms", "must be greater than 0"));
        }
        if !(drive.smoothing_factor > 0.0 && drive.smoothing_factor <= 1.0) {
            return Err(invalid(
                "drive.smoothing_factor",
                format!("must be in (0, 1], got {}", drive.smoothing_factor),
            ));
        }
        if !(drive.speed_normal.is_finite() && drive.speed_normal > 0.0) {
            return Err(invalid("drive.speed_normal", "must be positive"));
        }
        if !(drive.speed_boost.is_finite() && drive.speed_boost > 0.0) {
            return Err(invalid("drive.speed_boost", "must be positive"));
        }
        drive
            .shaper
            .validate()
            .map_err(|e| invalid("drive.shaper", e.to_string()))?;

        if self.controller.accelerate_button == self.controller.reverse_button {
            return Err(invalid(
                "controller.reverse_button",
                "must differ from accelerate_button",
            ));
        }
        for (field, uri) in [
            ("links.actuator_uri", &self.links.actuator_uri),
            ("links.status_uri", &self.links.status_uri),
        ] {
            if !(uri.starts_with("ws://") || uri.starts_with("wss://")) {
                return Err(invalid(field, format!("expected a ws:// URI, got {}", uri)));
            }
        }
        Ok(())
    }

    pub fn speed_levels(&self) -> SpeedLevels {
        SpeedLevels {
            normal: self.drive.speed_normal,
            boost: self.drive.speed_boost,
        }
    }

    pub fn actuator_settings(&self) -> ActuatorSettings {
        ActuatorSettings {
            send_period: Duration::from_millis(self.drive.send_period_ms),
            halt_period: Duration::from_millis(self.drive.halt_period_ms),
            retry_backoff: Duration::from_millis(self.links.actuator_retry_ms),
            smoothing_factor: self.drive.smoothing_factor,
        }
    }

    pub fn status_settings(&self) -> StatusSettings {
        StatusSettings {
            retry_backoff: Duration::from_millis(self.links.status_retry_ms),
            fault_backoff: Duration::from_millis(self.links.status_fault_backoff_ms),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.links.shutdown_grace_ms)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}
