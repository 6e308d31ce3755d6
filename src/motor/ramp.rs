// Per-wheel rate limiter
//
// Runs every tick, not only when a frame arrives, so the approach curve does
// not depend on how often the joystick sends.

use super::WheelState;
use crate::config::DriveConfig;

#[derive(Debug, Clone, Copy)]
pub struct RampLimiter {
    up_step: i16,
    down_step: i16,
}

impl RampLimiter {
    pub fn new(config: &DriveConfig) -> Self {
        Self::with_steps(config.ramp_up_step, config.ramp_down_step)
    }

    pub fn with_steps(up_step: i16, down_step: i16) -> Self {
        Self { up_step, down_step }
    }

    /// Next value of `current` on its way to `target`
    pub fn step(&self, current: i16, target: i16) -> i16 {
        if current == target {
            return current;
        }

        // Speeding up away from zero (or from standstill) ramps gently;
        // slowing, stopping and reversing all brake.
        let same_side = current.signum() * target.signum() >= 0;
        let accelerating = same_side && target.unsigned_abs() > current.unsigned_abs();
        let max_step = if accelerating {
            self.up_step
        } else {
            self.down_step
        };

        let delta = i32::from(target) - i32::from(current);
        let step = delta.clamp(-i32::from(max_step), i32::from(max_step));
        // Lands between current and target, both of which fit in i16
        (i32::from(current) + step) as i16
    }

    /// Advance every wheel's current velocity one tick
    pub fn apply(&self, wheels: &mut [WheelState; 4]) {
        for wheel in wheels.iter_mut() {
            wheel.current = self.step(wheel.current, wheel.target);
        }
    }
}
