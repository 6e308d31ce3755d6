// Joystick link: byte transport and frame/command decoding

pub mod decoder;
pub mod serial;

pub use decoder::{parse_frame, DecodeError, DecoderEvent, DecoderStats, FrameDecoder};
pub use serial::{Link, LinkError};
