// Control core for a four-wheel mecanum vehicle driven by joystick frames
// arriving over a byte stream.
//
// Per tick: link bytes are decoded into joystick samples or text commands,
// samples are resolved into wheel targets, the watchdog zeroes targets when
// input goes stale, the ramp limiter moves each wheel toward its target, and
// the result is written to a `MotorOutput` sink.

pub mod config;
pub mod control;
pub mod link;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod safety;
