// Message types flowing through the control loop and out to the status reporter

use serde::{Deserialize, Serialize};

use crate::link::{DecodeError, DecoderStats};
use crate::motor::WheelSpeeds;
use crate::self_test::SelfTestPhase;

/// One decoded joystick frame: `<lateral,forward,rotation>`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoystickSample {
    pub lateral: i32,
    pub forward: i32,
    /// Positive = clockwise as viewed from above
    pub rotation: i32,
}

impl JoystickSample {
    pub fn new(lateral: i32, forward: i32, rotation: i32) -> Self {
        Self {
            lateral,
            forward,
            rotation,
        }
    }
}

/// Text commands recognised on the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelfTest,
    Ping,
}

impl Command {
    /// Exact, case-sensitive match; anything else is not a command
    pub fn parse(text: &[u8]) -> Option<Self> {
        match text {
            b"TEST" => Some(Command::SelfTest),
            b"PING" => Some(Command::Ping),
            _ => None,
        }
    }
}

/// Replies the runtime writes back on the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Pong,
}

impl Reply {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Reply::Pong => b"PONG\n",
        }
    }
}

/// What the drive is doing this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    #[default]
    Stop,
    Translate,
    Rotate,
    /// Rotation and translation mixed together (additive mixing only)
    Blend,
    Failsafe,
    SelfTest,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    SelfTest,
}

/// Everything the status reporter needs from one control loop tick
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub mode: DriveMode,
    pub health: RuntimeHealth,
    pub targets: WheelSpeeds,
    pub currents: WheelSpeeds,
    pub decode_failures: Vec<DecodeError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Reply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_test: Option<SelfTestPhase>,
    pub decoder: DecoderStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse_is_exact() {
        assert_eq!(Command::parse(b"TEST"), Some(Command::SelfTest));
        assert_eq!(Command::parse(b"PING"), Some(Command::Ping));
        assert_eq!(Command::parse(b"test"), None);
        assert_eq!(Command::parse(b"PING "), None);
        assert_eq!(Command::parse(b"TESTS"), None);
        assert_eq!(Command::parse(b""), None);
    }

    #[test]
    fn test_health_serializes_snake_case() {
        let json = serde_json::to_string(&RuntimeHealth::CmdStale).unwrap();
        assert_eq!(json, "\"cmd_stale\"");
        let json = serde_json::to_string(&DriveMode::SelfTest).unwrap();
        assert_eq!(json, "\"self_test\"");
    }
}
