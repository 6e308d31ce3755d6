// Communications watchdog
// Note: without it, if the joystick host crashes or the cable is pulled, the
// vehicle would keep driving at the last commanded velocity forever.

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::DriveConfig;
use crate::control::ControlState;
use crate::messages::RuntimeHealth;

pub struct SafetySupervisor {
    timeout: Duration,
    stale: bool,
}

impl SafetySupervisor {
    pub fn new(config: &DriveConfig) -> Self {
        Self::with_timeout(config.comms_timeout())
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            stale: false,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Forget a previous comms loss, e.g. after the self-test refreshed the timestamp
    pub fn reset(&mut self) {
        self.stale = false;
    }

    /// Zero every target once the last sample is too old
    ///
    /// Only targets are touched; the ramp limiter brings currents down at the
    /// normal braking rate.
    pub fn check(&mut self, now: Instant, state: &mut ControlState) -> RuntimeHealth {
        let age = now.saturating_duration_since(state.last_sample_at);

        if age >= self.timeout {
            // Watchdog triggered - stop the vehicle
            if !self.stale {
                warn!("Commands stale ({:?} old), stopping vehicle", age);
            }
            self.stale = true;
            for wheel in state.wheels.iter_mut() {
                wheel.target = 0;
            }
            RuntimeHealth::CmdStale
        } else {
            if self.stale {
                info!("Commands resumed");
            }
            self.stale = false;
            RuntimeHealth::Ok
        }
    }
}
