// Timing, limits, topics and wheel wiring
//
// The constants are the defaults; `DriveConfig` is what the control loop
// actually reads, so a JSON file can override any of them at startup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::motor::Wheel;

// Control loop period (50 Hz, same rate the joystick producer sends at)
pub const TICK_PERIOD_MS: u64 = 20;

// No valid frame for this long -> failsafe stop
pub const COMMS_TIMEOUT_MS: u64 = 500;

// Velocity scale is the joystick scale: -255..=255
pub const MAX_SPEED: i16 = 255;
pub const DEADZONE: i16 = 20;

// Per-tick ramp steps; braking is snappier than accelerating
pub const RAMP_UP_STEP: i16 = 5;
pub const RAMP_DOWN_STEP: i16 = 15;

// Self-test drive pattern
pub const SELF_TEST_SPEED: i16 = 150;
pub const SELF_TEST_DRIVE_MS: u64 = 1000;
pub const SELF_TEST_PAUSE_MS: u64 = 300;

// Serial link
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";
pub const DEFAULT_BAUDRATE: u32 = 115_200;

// Zenoh topics
pub const TOPIC_RT_WHEELS: &str = "mecanum/rt/wheels"; // actuation
pub const TOPIC_HEALTH: &str = "mecanum/state/health"; // health status
pub const TOPIC_TICK: &str = "mecanum/state/tick"; // full per-tick report

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// How rotation combines with translation in the kinematics resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixingPolicy {
    /// Any rotation input wins outright; the vehicle spins in place
    #[default]
    RotatePriority,
    /// Rotation is added on top of the translation mix for every wheel
    Additive,
}

/// Output mapping for one wheel: direction flip and full-scale output value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelOutput {
    pub invert: bool,
    /// Magnitude emitted to the sink when the wheel runs at `max_speed`
    pub full_scale: u16,
}

impl Default for WheelOutput {
    fn default() -> Self {
        Self {
            invert: false,
            full_scale: MAX_SPEED as u16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelMap {
    pub left_front: WheelOutput,
    pub left_back: WheelOutput,
    pub right_front: WheelOutput,
    pub right_back: WheelOutput,
}

impl WheelMap {
    pub fn get(&self, wheel: Wheel) -> &WheelOutput {
        match wheel {
            Wheel::LeftFront => &self.left_front,
            Wheel::LeftBack => &self.left_back,
            Wheel::RightFront => &self.right_front,
            Wheel::RightBack => &self.right_back,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfTestConfig {
    pub speed: i16,
    pub drive_ms: u64,
    pub pause_ms: u64,
}

impl Default for SelfTestConfig {
    fn default() -> Self {
        Self {
            speed: SELF_TEST_SPEED,
            drive_ms: SELF_TEST_DRIVE_MS,
            pause_ms: SELF_TEST_PAUSE_MS,
        }
    }
}

/// Everything the control loop needs to know, fixed for the life of the process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriveConfig {
    pub max_speed: i16,
    pub deadzone: i16,
    pub ramp_up_step: i16,
    pub ramp_down_step: i16,
    pub tick_period_ms: u64,
    pub comms_timeout_ms: u64,
    pub mixing: MixingPolicy,
    pub self_test: SelfTestConfig,
    pub wheels: WheelMap,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_speed: MAX_SPEED,
            deadzone: DEADZONE,
            ramp_up_step: RAMP_UP_STEP,
            ramp_down_step: RAMP_DOWN_STEP,
            tick_period_ms: TICK_PERIOD_MS,
            comms_timeout_ms: COMMS_TIMEOUT_MS,
            mixing: MixingPolicy::default(),
            self_test: SelfTestConfig::default(),
            wheels: WheelMap::default(),
        }
    }
}

impl DriveConfig {
    /// Load a JSON config file; missing fields fall back to the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: DriveConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.max_speed <= 0 {
            return Err(invalid("max_speed", "must be positive"));
        }
        if self.deadzone < 0 || self.deadzone > self.max_speed {
            return Err(invalid("deadzone", "must be within 0..=max_speed"));
        }
        if self.ramp_up_step <= 0 {
            return Err(invalid("ramp_up_step", "must be positive"));
        }
        if self.ramp_down_step <= 0 {
            return Err(invalid("ramp_down_step", "must be positive"));
        }
        if self.tick_period_ms == 0 {
            return Err(invalid("tick_period_ms", "must be non-zero"));
        }
        if self.comms_timeout_ms < self.tick_period_ms {
            return Err(invalid(
                "comms_timeout_ms",
                format!("must be at least one tick ({} ms)", self.tick_period_ms),
            ));
        }
        if self.self_test.speed <= 0 || self.self_test.speed > self.max_speed {
            return Err(invalid("self_test.speed", "must be within 1..=max_speed"));
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn comms_timeout(&self) -> Duration {
        Duration::from_millis(self.comms_timeout_ms)
    }

    /// Whole number of ticks covering `ms`, never less than one
    pub fn ticks_for(&self, ms: u64) -> u32 {
        let ticks = ms.div_ceil(self.tick_period_ms).max(1);
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }
}
