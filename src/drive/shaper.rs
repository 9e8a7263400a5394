//! Conversion of a raw [`AxisSnapshot`] into left/right motor targets.
//!
//! The shaper is a pure function of the snapshot, the current speed ceiling and
//! a [`ShaperConfig`]. It never looks at the D-pad.

use serde::{Deserialize, Serialize};

use crate::controller::AxisSnapshot;
use crate::drive::DriveError;

/// How throttle and turn are combined into the two motor sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MixMode {
    /// Turn scales down the inner side while driving; pure rotation at zero throttle.
    Arcade,
    /// Throttle and turn are summed per side, then normalized back under the ceiling.
    Summed,
}

/// Tuning of the shaping pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaperConfig {
    /// Axis magnitudes below this are treated as exactly zero
    pub deadzone: f32,

    /// Exponent of the sign-preserving turn curve; 2.0 is `x * |x|`
    pub curve_exponent: f32,

    /// Scale applied to the curved turn value
    pub turn_authority: f32,

    pub mix_mode: MixMode,

    /// Flips the rotation sense of positive turn
    pub invert_turn: bool,

    /// Use the analog throttle axis when neither throttle button is held
    pub analog_throttle: bool,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            deadzone: 0.15,
            curve_exponent: 2.0,
            turn_authority: 1.0,
            mix_mode: MixMode::Arcade,
            invert_turn: false,
            analog_throttle: false,
        }
    }
}

impl ShaperConfig {
    pub fn validate(&self) -> Result<(), DriveError> {
        if !(0.0..1.0).contains(&self.deadzone) {
            return Err(DriveError::InvalidParameter(format!(
                "deadzone must be in [0, 1), got {}",
                self.deadzone
            )));
        }
        if !(self.curve_exponent.is_finite() && self.curve_exponent > 0.0) {
            return Err(DriveError::InvalidParameter(format!(
                "curve_exponent must be positive, got {}",
                self.curve_exponent
            )));
        }
        if !(self.turn_authority.is_finite() && self.turn_authority >= 0.0) {
            return Err(DriveError::InvalidParameter(format!(
                "turn_authority must be non-negative, got {}",
                self.turn_authority
            )));
        }
        Ok(())
    }
}

/// Instantaneous per-side target, already within `[-ceiling, ceiling]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorTarget {
    pub left: f32,
    pub right: f32,
    pub ceiling: f32,
}

#[derive(Debug, Clone)]
pub struct CommandShaper {
    config: ShaperConfig,
}

impl CommandShaper {
    pub fn new(config: ShaperConfig) -> Self {
        Self { config }
    }

    /// Maps one snapshot to motor targets under `ceiling`.
    pub fn shape(&self, snapshot: &AxisSnapshot, ceiling: f32) -> MotorTarget {
        let ceiling = if ceiling.is_finite() { ceiling.abs() } else { 0.0 };

        let turn = self.shaped_turn(snapshot.turn);
        let throttle = self.resolve_throttle(snapshot);

        let (left, right) = match self.config.mix_mode {
            MixMode::Arcade => {
                if throttle == 0.0 {
                    (-turn * ceiling, turn * ceiling)
                } else {
                    (
                        throttle * ceiling * (1.0 - turn.max(0.0)),
                        throttle * ceiling * (1.0 + turn.min(0.0)),
                    )
                }
            }
            MixMode::Summed => ((throttle - turn) * ceiling, (throttle + turn) * ceiling),
        };

        let (left, right) = normalize(left, right, ceiling);

        MotorTarget {
            left: left.clamp(-ceiling, ceiling),
            right: right.clamp(-ceiling, ceiling),
            ceiling,
        }
    }

    pub fn apply_deadzone(&self, value: f32) -> f32 {
        let value = if value.is_finite() {
            value.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        if value.abs() < self.config.deadzone {
            0.0
        } else {
            value
        }
    }

    /// Sign-preserving power curve; `curve(0) == 0`.
    pub fn curve(&self, value: f32) -> f32 {
        if value == 0.0 {
            return 0.0;
        }
        value.signum() * value.abs().powf(self.config.curve_exponent)
    }

    fn shaped_turn(&self, raw: f32) -> f32 {
        let turn = (self.curve(self.apply_deadzone(raw)) * self.config.turn_authority)
            .clamp(-1.0, 1.0);
        if self.config.invert_turn {
            -turn
        } else {
            turn
        }
    }

    /// Accelerate wins over reverse when both are held.
    pub fn resolve_throttle(&self, snapshot: &AxisSnapshot) -> f32 {
        if snapshot.accelerate {
            1.0
        } else if snapshot.reverse {
            -1.0
        } else if self.config.analog_throttle {
            self.apply_deadzone(snapshot.throttle_axis)
        } else {
            0.0
        }
    }
}

fn normalize(left: f32, right: f32, ceiling: f32) -> (f32, f32) {
    let peak = left.abs().max(right.abs());
    if peak > ceiling && peak > 0.0 {
        let scale = ceiling / peak;
        (left * scale, right * scale)
    } else {
        (left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(turn: f32, accelerate: bool, reverse: bool) -> AxisSnapshot {
        AxisSnapshot {
            turn,
            accelerate,
            reverse,
            ..AxisSnapshot::neutral()
        }
    }

    fn sweep() -> impl Iterator<Item = f32> {
        (-100..=100).map(|i| i as f32 / 100.0)
    }

    #[test]
    fn values_inside_deadzone_are_zero() {
        let shaper = CommandShaper::new(ShaperConfig::default());
        for x in sweep().filter(|x| x.abs() < 0.15) {
            assert_eq!(shaper.apply_deadzone(x), 0.0, "x = {}", x);
            let target = shaper.shape(&snapshot(x, false, false), 150.0);
            assert_eq!(target.left, 0.0);
            assert_eq!(target.right, 0.0);
        }
        assert_eq!(shaper.apply_deadzone(0.5), 0.5);
    }

    #[test]
    fn curve_preserves_sign() {
        let shaper = CommandShaper::new(ShaperConfig::default());
        assert_eq!(shaper.curve(0.0), 0.0);
        assert_eq!(shaper.curve(0.5), 0.25);
        assert_eq!(shaper.curve(-0.5), -0.25);
        for x in sweep().filter(|x| *x != 0.0) {
            assert_eq!(shaper.curve(x).signum(), x.signum(), "x = {}", x);
        }
    }

    #[test]
    fn outputs_never_exceed_ceiling() {
        for mix_mode in [MixMode::Arcade, MixMode::Summed] {
            let shaper = CommandShaper::new(ShaperConfig {
                mix_mode,
                turn_authority: 1.5,
                ..ShaperConfig::default()
            });
            for ceiling in [0.0, 150.0, 255.0] {
                for turn in sweep() {
                    for (accelerate, reverse) in
                        [(false, false), (true, false), (false, true), (true, true)]
                    {
                        let t = shaper.shape(&snapshot(turn, accelerate, reverse), ceiling);
                        assert!(t.left.abs() <= ceiling, "{:?} {:?}", mix_mode, t);
                        assert!(t.right.abs() <= ceiling, "{:?} {:?}", mix_mode, t);
                    }
                }
            }
        }
    }

    #[test]
    fn accelerate_wins_over_reverse() {
        let shaper = CommandShaper::new(ShaperConfig::default());
        assert_eq!(shaper.resolve_throttle(&snapshot(0.0, true, true)), 1.0);
        assert_eq!(shaper.resolve_throttle(&snapshot(0.0, false, true)), -1.0);
        assert_eq!(shaper.resolve_throttle(&snapshot(0.0, false, false)), 0.0);
    }

    #[test]
    fn full_forward_reaches_ceiling() {
        let shaper = CommandShaper::new(ShaperConfig::default());
        let target = shaper.shape(&snapshot(0.0, true, false), 150.0);
        assert_eq!(target.left, 150.0);
        assert_eq!(target.right, 150.0);
        assert_eq!(target.ceiling, 150.0);
    }

    #[test]
    fn turn_without_throttle_rotates_in_place() {
        let shaper = CommandShaper::new(ShaperConfig::default());
        let target = shaper.shape(&snapshot(0.5, false, false), 150.0);
        assert_eq!(target.left, -37.5);
        assert_eq!(target.right, 37.5);
        assert_eq!(target.left as i32, -37);
        assert_eq!(target.right as i32, 37);
    }

    #[test]
    fn arcade_turn_slows_the_inner_side() {
        let shaper = CommandShaper::new(ShaperConfig::default());

        // Positive turn slows the left side, same rotation sense as pure rotation
        let target = shaper.shape(&snapshot(0.5, true, false), 100.0);
        assert_eq!(target.left, 75.0);
        assert_eq!(target.right, 100.0);

        let target = shaper.shape(&snapshot(-0.5, true, false), 100.0);
        assert_eq!(target.left, 100.0);
        assert_eq!(target.right, 75.0);
    }

    #[test]
    fn invert_turn_flips_rotation() {
        let shaper = CommandShaper::new(ShaperConfig {
            invert_turn: true,
            ..ShaperConfig::default()
        });
        let target = shaper.shape(&snapshot(0.5, false, false), 150.0);
        assert_eq!(target.left, 37.5);
        assert_eq!(target.right, -37.5);
    }

    #[test]
    fn summed_mode_normalizes_preserving_ratio() {
        let shaper = CommandShaper::new(ShaperConfig {
            mix_mode: MixMode::Summed,
            ..ShaperConfig::default()
        });
        // throttle 1, turn curve(1.0) = 1 -> raw (0, 2) -> scaled (0, 1)
        let target = shaper.shape(&snapshot(-1.0, true, false), 150.0);
        assert_eq!(target.left, 150.0);
        assert_eq!(target.right, 0.0);

        // throttle 1, turn 0.25 -> raw (0.75, 1.25) -> ratio 0.6 kept
        let target = shaper.shape(&snapshot(0.5, true, false), 100.0);
        assert!((target.left - 60.0).abs() < 1e-4, "{:?}", target);
        assert!((target.right - 100.0).abs() < 1e-4, "{:?}", target);
    }

    #[test]
    fn analog_throttle_only_when_enabled() {
        let axis_forward = AxisSnapshot {
            throttle_axis: 0.5,
            ..AxisSnapshot::neutral()
        };

        let shaper = CommandShaper::new(ShaperConfig::default());
        assert_eq!(shaper.resolve_throttle(&axis_forward), 0.0);

        let shaper = CommandShaper::new(ShaperConfig {
            analog_throttle: true,
            ..ShaperConfig::default()
        });
        assert_eq!(shaper.resolve_throttle(&axis_forward), 0.5);
        let target = shaper.shape(&axis_forward, 200.0);
        assert_eq!(target.left, 100.0);
        assert_eq!(target.right, 100.0);
    }

    #[test]
    fn dpad_does_not_affect_target() {
        let shaper = CommandShaper::new(ShaperConfig::default());
        let plain = snapshot(0.3, true, false);
        let with_dpad = AxisSnapshot {
            dpad: Some(crate::controller::DpadDirection::NE),
            ..plain
        };
        assert_eq!(shaper.shape(&plain, 150.0), shaper.shape(&with_dpad, 150.0));
    }

    #[test]
    fn validate_rejects_bad_deadzone() {
        let config = ShaperConfig {
            deadzone: 1.0,
            ..ShaperConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(ShaperConfig::default().validate().is_ok());
    }
}
