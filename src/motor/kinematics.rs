// Mecanum inverse kinematics for a 4-wheel base
// Converts joystick axes (lateral, forward, rotation) to per-wheel target velocities.

use serde::{Deserialize, Serialize};

use super::{Wheel, WheelState};
use crate::config::{DriveConfig, MixingPolicy};
use crate::messages::{DriveMode, JoystickSample};

/// Target velocities for the four wheels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelSpeeds {
    pub left_front: i16,
    pub left_back: i16,
    pub right_front: i16,
    pub right_back: i16,
}

impl WheelSpeeds {
    pub fn new(left_front: i16, left_back: i16, right_front: i16, right_back: i16) -> Self {
        Self {
            left_front,
            left_back,
            right_front,
            right_back,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn get(&self, wheel: Wheel) -> i16 {
        self.as_array()[wheel.index()]
    }

    /// Returns velocities as array [left_front, left_back, right_front, right_back]
    pub fn as_array(&self) -> [i16; 4] {
        [
            self.left_front,
            self.left_back,
            self.right_front,
            self.right_back,
        ]
    }

    pub fn from_array(values: [i16; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub fn targets(wheels: &[WheelState; 4]) -> Self {
        Self::from_array(wheels.map(|w| w.target))
    }

    pub fn currents(wheels: &[WheelState; 4]) -> Self {
        Self::from_array(wheels.map(|w| w.current))
    }
}

pub struct KinematicsResolver {
    max_speed: i16,
    deadzone: i16,
    mixing: MixingPolicy,
}

impl KinematicsResolver {
    pub fn new(config: &DriveConfig) -> Self {
        Self {
            max_speed: config.max_speed,
            deadzone: config.deadzone,
            mixing: config.mixing,
        }
    }

    /// Deadzone then clamp a single joystick axis
    fn condition_axis(&self, value: i32) -> i32 {
        let max = i32::from(self.max_speed);
        if value.unsigned_abs() < u32::from(self.deadzone.unsigned_abs()) {
            0
        } else {
            value.clamp(-max, max)
        }
    }

    fn clamp_wheel(&self, value: i32) -> i16 {
        let max = i32::from(self.max_speed);
        // Fits in i16 once clamped to a positive i16 bound
        value.clamp(-max, max) as i16
    }

    /// Compute wheel targets for a sample without touching any state
    pub fn resolve(&self, sample: JoystickSample) -> (DriveMode, WheelSpeeds) {
        let lateral = self.condition_axis(sample.lateral);
        let forward = self.condition_axis(sample.forward);
        let rotation = self.condition_axis(sample.rotation);
        let translating = lateral != 0 || forward != 0;

        let (mode, raw) = match self.mixing {
            MixingPolicy::RotatePriority => {
                if rotation != 0 {
                    (
                        DriveMode::Rotate,
                        [rotation, rotation, -rotation, -rotation],
                    )
                } else if translating {
                    (
                        DriveMode::Translate,
                        [
                            forward + lateral,
                            forward - lateral,
                            forward - lateral,
                            forward + lateral,
                        ],
                    )
                } else {
                    (DriveMode::Stop, [0; 4])
                }
            }
            MixingPolicy::Additive => {
                let mode = match (translating, rotation != 0) {
                    (true, true) => DriveMode::Blend,
                    (true, false) => DriveMode::Translate,
                    (false, true) => DriveMode::Rotate,
                    (false, false) => DriveMode::Stop,
                };
                (
                    mode,
                    [
                        forward + lateral + rotation,
                        forward - lateral + rotation,
                        forward - lateral - rotation,
                        forward + lateral - rotation,
                    ],
                )
            }
        };

        (mode, WheelSpeeds::from_array(raw.map(|v| self.clamp_wheel(v))))
    }

    /// Resolve a sample and write the four wheel targets
    pub fn apply(&self, sample: JoystickSample, wheels: &mut [WheelState; 4]) -> DriveMode {
        let (mode, targets) = self.resolve(sample);
        for wheel in Wheel::ALL {
            wheels[wheel.index()].target = targets.get(wheel);
        }
        mode
    }
}
