//! Shared control record written by the status link and read by the actuator link.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::link::wire::StatusMessage;

/// The two named speed tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedLevels {
    pub normal: f32,
    pub boost: f32,
}

impl Default for SpeedLevels {
    fn default() -> Self {
        Self {
            normal: 150.0,
            boost: 255.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlTransition {
    BoostEngaged { ceiling: f32 },
    BoostReleased { ceiling: f32 },
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlState {
    pub speed_ceiling: f32,
    pub boost_active: bool,
    /// Terminal for the process run once set
    pub halted: bool,
    pub last_transition: Option<DateTime<Local>>,
}

impl ControlState {
    pub fn new(levels: &SpeedLevels) -> Self {
        Self {
            speed_ceiling: levels.normal,
            boost_active: false,
            halted: false,
            last_transition: None,
        }
    }

    /// Applies one status message, acting on edges only.
    pub fn apply(&mut self, msg: &StatusMessage, levels: &SpeedLevels) -> Vec<ControlTransition> {
        let mut transitions = Vec::new();

        if msg.power_active && !self.boost_active {
            self.boost_active = true;
            self.speed_ceiling = levels.boost;
            transitions.push(ControlTransition::BoostEngaged {
                ceiling: levels.boost,
            });
        } else if !msg.power_active && self.boost_active {
            self.boost_active = false;
            self.speed_ceiling = levels.normal;
            transitions.push(ControlTransition::BoostReleased {
                ceiling: levels.normal,
            });
        }

        if msg.game_over && !self.halted {
            self.halted = true;
            transitions.push(ControlTransition::Halted);
        }

        if !transitions.is_empty() {
            self.last_transition = Some(Local::now());
        }
        transitions
    }
}

/// Cloneable handle around the single lock guarding [`ControlState`].
#[derive(Debug, Clone)]
pub struct SharedControlState {
    inner: Arc<Mutex<ControlState>>,
    levels: SpeedLevels,
}

impl SharedControlState {
    pub fn new(levels: SpeedLevels) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ControlState::new(&levels))),
            levels,
        }
    }

    pub async fn snapshot(&self) -> ControlState {
        *self.inner.lock().await
    }

    pub async fn apply_status(&self, msg: &StatusMessage) -> Vec<ControlTransition> {
        let transitions = self.inner.lock().await.apply(msg, &self.levels);

        for transition in &transitions {
            match transition {
                ControlTransition::BoostEngaged { ceiling } => {
                    info!("Power-up active, speed ceiling raised to {}", ceiling)
                }
                ControlTransition::BoostReleased { ceiling } => {
                    info!("Power-up ended, speed ceiling back to {}", ceiling)
                }
                ControlTransition::Halted => warn!("Game over received, stopping motors"),
            }
        }
        transitions
    }
}
