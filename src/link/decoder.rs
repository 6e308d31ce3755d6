// Byte-stream decoder for the joystick link
//
// Two kinds of messages share one stream:
// - joystick frames, `<lateral,forward,rotation>`, no terminator needed
// - text commands (`TEST`, `PING`), terminated by `\n` or `\r`
//
// Both buffers are bounded at BUFFER_CAPACITY bytes. Bytes past the capacity
// are dropped and counted; the message is still delivered (possibly
// truncated) when its terminator arrives, and parsing carries on normally.

use heapless::Vec;
use serde::Serialize;

use crate::messages::JoystickSample;

/// Maximum frame or command length (bytes)
pub const BUFFER_CAPACITY: usize = 32;

pub const FRAME_START: u8 = b'<';
pub const FRAME_END: u8 = b'>';

pub type Payload = Vec<u8, BUFFER_CAPACITY>;

/// Result of feeding one byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEvent {
    None,
    Frame(Payload),
    Command(Payload),
}

/// Decoder statistics for the status reporter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    /// Complete frames delimited (parsed or not)
    pub frames: u32,
    /// Complete command lines delimited (known or not)
    pub commands: u32,
    /// Bytes dropped because a buffer was full
    pub bytes_dropped: u32,
}

/// Why a frame payload did not produce a sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeError {
    #[error("Frame is not ASCII text")]
    NotText,

    #[error("Expected 3 fields, got {found}")]
    FieldCount { found: usize },

    #[error("Field {index} is not an integer: {text:?}")]
    InvalidField { index: usize, text: String },
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    frame: Payload,
    command: Payload,
    in_frame: bool,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Drop any partial frame or command; stats are kept
    pub fn reset(&mut self) {
        self.frame.clear();
        self.command.clear();
        self.in_frame = false;
    }

    /// Feed a single byte from the link
    pub fn push(&mut self, byte: u8) -> DecoderEvent {
        if byte == FRAME_START {
            // A new frame always wins over whatever was pending
            self.command.clear();
            self.frame.clear();
            self.in_frame = true;
            return DecoderEvent::None;
        }

        if self.in_frame {
            if byte == FRAME_END {
                self.in_frame = false;
                self.stats.frames = self.stats.frames.wrapping_add(1);
                return DecoderEvent::Frame(core::mem::take(&mut self.frame));
            }
            Self::append(&mut self.frame, byte, &mut self.stats);
            return DecoderEvent::None;
        }

        match byte {
            b'\n' | b'\r' if self.command.is_empty() => DecoderEvent::None,
            b'\n' | b'\r' => {
                self.stats.commands = self.stats.commands.wrapping_add(1);
                DecoderEvent::Command(core::mem::take(&mut self.command))
            }
            _ => {
                Self::append(&mut self.command, byte, &mut self.stats);
                DecoderEvent::None
            }
        }
    }

    fn append(buffer: &mut Payload, byte: u8, stats: &mut DecoderStats) {
        if buffer.push(byte).is_err() {
            stats.bytes_dropped = stats.bytes_dropped.wrapping_add(1);
        }
    }
}

/// Parse a frame payload (without the angle brackets) into a sample
pub fn parse_frame(payload: &[u8]) -> Result<JoystickSample, DecodeError> {
    let text = core::str::from_utf8(payload).map_err(|_| DecodeError::NotText)?;

    let fields: std::vec::Vec<&str> = text.split(',').collect();
    if fields.len() != 3 {
        return Err(DecodeError::FieldCount {
            found: fields.len(),
        });
    }

    let mut values = [0i32; 3];
    for (index, field) in fields.iter().enumerate() {
        let field = field.trim_matches(|c: char| c.is_ascii_whitespace());
        values[index] = field.parse().map_err(|_| DecodeError::InvalidField {
            index,
            text: field.to_string(),
        })?;
    }

    Ok(JoystickSample::new(values[0], values[1], values[2]))
}
