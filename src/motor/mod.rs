// Motor side of the control core
//
// Provides:
// - Mecanum kinematics (joystick axes -> wheel targets)
// - Per-wheel ramp limiting (target -> current)
// - The motor output sink interface and a latched sink for publishing

pub mod kinematics;
pub mod output;
pub mod ramp;

use serde::{Deserialize, Serialize};

pub use kinematics::{KinematicsResolver, WheelSpeeds};
pub use output::{Direction, LatchedOutputs, MotorOutput, WheelCommand, WheelOutputs};
pub use ramp::RampLimiter;

/// The four mecanum wheels, in self-test order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheel {
    LeftFront,
    LeftBack,
    RightFront,
    RightBack,
}

impl Wheel {
    pub const ALL: [Wheel; 4] = [
        Wheel::LeftFront,
        Wheel::LeftBack,
        Wheel::RightFront,
        Wheel::RightBack,
    ];

    pub fn index(self) -> usize {
        match self {
            Wheel::LeftFront => 0,
            Wheel::LeftBack => 1,
            Wheel::RightFront => 2,
            Wheel::RightBack => 3,
        }
    }

    /// Following wheel in self-test order
    pub fn next(self) -> Option<Wheel> {
        Wheel::ALL.get(self.index() + 1).copied()
    }
}

/// Commanded and ramped velocity of one wheel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelState {
    pub target: i16,
    pub current: i16,
}
