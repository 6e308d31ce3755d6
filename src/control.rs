// Fixed-period control loop
//
// One tick: decode queued bytes -> kinematics -> watchdog -> ramp -> outputs.
// While a self-test runs, the tick only advances the test. Link input from
// before or during the test is discarded, so only frames received after it
// finishes can move the wheels or feed the watchdog.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{ConfigError, DriveConfig};
use crate::link::{parse_frame, DecodeError, DecoderEvent, FrameDecoder};
use crate::messages::{Command, DriveMode, Reply, RuntimeHealth, TickReport};
use crate::motor::{
    KinematicsResolver, MotorOutput, RampLimiter, Wheel, WheelCommand, WheelSpeeds, WheelState,
};
use crate::safety::SafetySupervisor;
use crate::self_test::{SelfTest, SelfTestStatus};

/// Inbound bytes held between ticks
pub const PENDING_CAPACITY: usize = 4096;

/// Process-wide drive state, owned by the control loop
#[derive(Debug, Clone)]
pub struct ControlState {
    pub wheels: [WheelState; 4],
    pub last_sample_at: Instant,
    pub motors_enabled: bool,
}

impl ControlState {
    pub fn new(now: Instant) -> Self {
        Self {
            wheels: [WheelState::default(); 4],
            last_sample_at: now,
            motors_enabled: true,
        }
    }

    pub fn wheel(&self, wheel: Wheel) -> WheelState {
        self.wheels[wheel.index()]
    }

    fn zero(&mut self) {
        self.wheels = [WheelState::default(); 4];
    }
}

pub struct ControlLoop<M: MotorOutput> {
    config: DriveConfig,
    state: ControlState,
    decoder: FrameDecoder,
    resolver: KinematicsResolver,
    ramp: RampLimiter,
    supervisor: SafetySupervisor,
    self_test: Option<SelfTest>,
    pending: VecDeque<u8>,
    pending_dropped: u64,
    mode: DriveMode,
    sink: M,
}

impl<M: MotorOutput> ControlLoop<M> {
    /// Rejects configs that fail [`DriveConfig::validate`]
    pub fn new(config: DriveConfig, sink: M, now: Instant) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: ControlState::new(now),
            decoder: FrameDecoder::new(),
            resolver: KinematicsResolver::new(&config),
            ramp: RampLimiter::new(&config),
            supervisor: SafetySupervisor::new(&config),
            self_test: None,
            pending: VecDeque::with_capacity(PENDING_CAPACITY),
            pending_dropped: 0,
            mode: DriveMode::Stop,
            config,
            sink,
        })
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn sink(&self) -> &M {
        &self.sink
    }

    pub fn is_self_testing(&self) -> bool {
        self.self_test.is_some()
    }

    /// Bytes discarded because the pending queue was full (oldest first)
    pub fn pending_dropped(&self) -> u64 {
        self.pending_dropped
    }

    /// Queue inbound link bytes for the next tick
    ///
    /// Bytes arriving while the self-test runs are thrown away. When the queue
    /// is full the oldest bytes go first, so the newest frame survives.
    pub fn ingest(&mut self, bytes: &[u8]) {
        if self.self_test.is_some() {
            return;
        }

        let bytes = if bytes.len() > PENDING_CAPACITY {
            let (skipped, tail) = bytes.split_at(bytes.len() - PENDING_CAPACITY);
            self.count_dropped(skipped.len());
            tail
        } else {
            bytes
        };

        let overflow = (self.pending.len() + bytes.len()).saturating_sub(PENDING_CAPACITY);
        if overflow > 0 {
            self.pending.drain(..overflow);
            self.count_dropped(overflow);
        }
        self.pending.extend(bytes);
    }

    fn count_dropped(&mut self, count: usize) {
        if self.pending_dropped == 0 {
            warn!("Inbound queue full, dropping oldest bytes");
        }
        self.pending_dropped += count as u64;
    }

    /// Run one control period
    pub fn tick(&mut self, now: Instant) -> TickReport {
        if let Some(test) = self.self_test.as_mut() {
            match test.tick(&mut self.sink) {
                SelfTestStatus::Running => {
                    return self.report(
                        DriveMode::SelfTest,
                        RuntimeHealth::SelfTest,
                        Vec::new(),
                        Vec::new(),
                    );
                }
                SelfTestStatus::Finished => {
                    self.finish_self_test(now);
                    return self.report(
                        DriveMode::Stop,
                        RuntimeHealth::Ok,
                        Vec::new(),
                        Vec::new(),
                    );
                }
            }
        }

        let mut failures = Vec::new();
        let mut replies = Vec::new();

        while let Some(byte) = self.pending.pop_front() {
            match self.decoder.push(byte) {
                DecoderEvent::None => {}
                DecoderEvent::Frame(payload) => match parse_frame(&payload) {
                    Ok(sample) => {
                        debug!("Received sample: {:?}", sample);
                        self.mode = self.resolver.apply(sample, &mut self.state.wheels);
                        self.state.last_sample_at = now;
                    }
                    Err(e) => {
                        warn!("Failed to parse frame: {}", e);
                        failures.push(e);
                    }
                },
                DecoderEvent::Command(text) => match Command::parse(&text) {
                    Some(Command::Ping) => replies.push(Reply::Pong),
                    Some(Command::SelfTest) => {
                        self.begin_self_test();
                        return self.report(
                            DriveMode::SelfTest,
                            RuntimeHealth::SelfTest,
                            failures,
                            replies,
                        );
                    }
                    None => debug!("Ignoring unknown command {:?}", String::from_utf8_lossy(&text)),
                },
            }
        }

        let health = self.supervisor.check(now, &mut self.state);
        self.ramp.apply(&mut self.state.wheels);
        self.write_outputs();

        let mode = match health {
            RuntimeHealth::CmdStale => DriveMode::Failsafe,
            _ => self.mode,
        };
        self.report(mode, health, failures, replies)
    }

    /// Zero everything and stop the motors right away (shutdown path)
    pub fn halt(&mut self) {
        info!("Stopping all motors");
        self.self_test = None;
        self.state.zero();
        self.state.motors_enabled = true;
        self.sink.stop_all();
    }

    fn begin_self_test(&mut self) {
        // Anything queued behind TEST is stale by the time the test ends
        let discarded = self.pending.len();
        self.pending.clear();
        self.decoder.reset();
        if discarded > 0 {
            debug!("Discarding {} queued bytes for self-test", discarded);
        }
        self.state.motors_enabled = false;
        self.self_test = Some(SelfTest::start(&self.config, &mut self.sink));
    }

    fn finish_self_test(&mut self, now: Instant) {
        self.self_test = None;
        self.pending.clear();
        self.decoder.reset();
        self.state.zero();
        self.state.last_sample_at = now;
        self.state.motors_enabled = true;
        self.supervisor.reset();
        self.mode = DriveMode::Stop;
    }

    fn write_outputs(&mut self) {
        for wheel in Wheel::ALL {
            let command = WheelCommand::from_velocity(
                self.state.wheel(wheel).current,
                self.config.max_speed,
                self.config.wheels.get(wheel),
            );
            self.sink.write(wheel, command);
        }
    }

    fn report(
        &self,
        mode: DriveMode,
        health: RuntimeHealth,
        decode_failures: Vec<DecodeError>,
        replies: Vec<Reply>,
    ) -> TickReport {
        TickReport {
            mode,
            health,
            targets: WheelSpeeds::targets(&self.state.wheels),
            currents: WheelSpeeds::currents(&self.state.wheels),
            decode_failures,
            replies,
            self_test: self.self_test.as_ref().map(|t| t.phase()),
            decoder: self.decoder.stats(),
        }
    }
}

impl<M: MotorOutput> Drop for ControlLoop<M> {
    fn drop(&mut self) {
        // Never leave the wheels spinning when the loop goes away
        self.sink.stop_all();
    }
}
