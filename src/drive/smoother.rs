use crate::drive::shaper::MotorTarget;

/// Smoothed motor output carried from tick to tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorOutput {
    pub left: f32,
    pub right: f32,
}

/// First-order lag between the shaped target and what is sent to the motors.
///
/// `factor` is the share of the remaining distance covered per tick: 1.0 jumps
/// straight to the target, small values feel heavy.
#[derive(Debug, Clone)]
pub struct MotionSmoother {
    factor: f32,
    output: MotorOutput,
}

impl MotionSmoother {
    pub fn new(factor: f32) -> Self {
        let factor = if factor.is_finite() {
            factor.clamp(f32::EPSILON, 1.0)
        } else {
            1.0
        };
        Self {
            factor,
            output: MotorOutput::default(),
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    #[cfg(test)]
    pub fn output(&self) -> MotorOutput {
        self.output
    }

    /// Back to standstill, used whenever a link session (re)starts.
    pub fn reset(&mut self) {
        self.output = MotorOutput::default();
    }

    /// Moves the output toward `target` by `dt_fraction` ticks worth of blending.
    ///
    /// The result is clamped to the target's ceiling so a lowered speed limit
    /// applies on the same tick.
    pub fn advance(&mut self, target: MotorTarget, dt_fraction: f32) -> MotorOutput {
        let blend = self.blend(dt_fraction);
        let ceiling = target.ceiling.abs();

        let left = self.output.left + (target.left - self.output.left) * blend;
        let right = self.output.right + (target.right - self.output.right) * blend;

        self.output = MotorOutput {
            left: left.clamp(-ceiling, ceiling),
            right: right.clamp(-ceiling, ceiling),
        };
        self.output
    }

    fn blend(&self, dt_fraction: f32) -> f32 {
        if !dt_fraction.is_finite() || dt_fraction <= 0.0 {
            return 0.0;
        }
        if dt_fraction == 1.0 {
            return self.factor;
        }
        1.0 - (1.0 - self.factor).powf(dt_fraction)
    }
}
