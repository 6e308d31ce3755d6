// Motor output sink interface
//
// The control core only produces a signed velocity per wheel. Turning that
// into direction pins and PWM duty is the sink's job; the conversion to
// direction + magnitude (with per-wheel invert and scaling) lives here so
// every sink gets the same mapping.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Wheel;
use crate::config::WheelOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Stop,
    Forward,
    Reverse,
}

/// What a single wheel's driver should do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WheelCommand {
    pub direction: Direction,
    pub magnitude: u16,
}

impl WheelCommand {
    pub fn stop() -> Self {
        Self::default()
    }

    /// Map a signed velocity in `-max_speed..=max_speed` onto the wheel's output range
    pub fn from_velocity(velocity: i16, max_speed: i16, output: &WheelOutput) -> Self {
        if velocity == 0 || max_speed <= 0 {
            return Self::stop();
        }

        let forward = (velocity > 0) != output.invert;
        let speed = u32::from(velocity.unsigned_abs()).min(u32::from(max_speed.unsigned_abs()));
        let magnitude = speed * u32::from(output.full_scale) / u32::from(max_speed.unsigned_abs());

        Self {
            direction: if forward {
                Direction::Forward
            } else {
                Direction::Reverse
            },
            // magnitude <= full_scale, which is a u16
            magnitude: magnitude as u16,
        }
    }

    /// Signed view of the command, mostly for logs and tests
    pub fn signed(&self) -> i32 {
        match self.direction {
            Direction::Stop => 0,
            Direction::Forward => i32::from(self.magnitude),
            Direction::Reverse => -i32::from(self.magnitude),
        }
    }
}

/// Anything that can drive the four wheels
///
/// Implementations must not block; they are called from inside the control tick.
pub trait MotorOutput {
    fn write(&mut self, wheel: Wheel, command: WheelCommand);

    /// Stop all wheels immediately
    fn stop_all(&mut self) {
        for wheel in Wheel::ALL {
            self.write(wheel, WheelCommand::stop());
        }
    }
}

/// Sink that holds the latest command per wheel so the runtime can publish it
/// to the hardware process once per tick
#[derive(Debug, Clone, Default)]
pub struct LatchedOutputs {
    commands: [WheelCommand; 4],
}

impl LatchedOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, wheel: Wheel) -> WheelCommand {
        self.commands[wheel.index()]
    }

    pub fn snapshot(&self) -> WheelOutputs {
        WheelOutputs {
            left_front: self.get(Wheel::LeftFront),
            left_back: self.get(Wheel::LeftBack),
            right_front: self.get(Wheel::RightFront),
            right_back: self.get(Wheel::RightBack),
        }
    }
}

impl MotorOutput for LatchedOutputs {
    fn write(&mut self, wheel: Wheel, command: WheelCommand) {
        let slot = &mut self.commands[wheel.index()];
        if *slot != command {
            debug!(
                "Wheel {:?}: {:?} {}",
                wheel, command.direction, command.magnitude
            );
        }
        *slot = command;
    }
}

/// Actuation published per tick: one command per wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelOutputs {
    pub left_front: WheelCommand,
    pub left_back: WheelCommand,
    pub right_front: WheelCommand,
    pub right_back: WheelCommand,
}
