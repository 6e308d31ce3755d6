// 50 Hz loop around the control core
// Note: the control loop itself never fails; only startup (link, zenoh) can
// abort. Per-tick publish and reply errors are logged and the loop keeps going.

use std::io::Write;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

// local imports
use crate::config::{DriveConfig, TOPIC_HEALTH, TOPIC_RT_WHEELS, TOPIC_TICK};
use crate::control::ControlLoop;
use crate::link::Link;
use crate::messages::TickReport;
use crate::motor::LatchedOutputs;

/// Chunks buffered between the reader thread and the control loop
const LINK_CHANNEL_DEPTH: usize = 256;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where the joystick bytes come from
#[derive(Debug, Clone)]
pub enum LinkSource {
    Serial { port: String, baudrate: u32 },
    Stdio,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub link: LinkSource,
    pub config: DriveConfig,
    /// Publish wheel outputs, health and tick reports over zenoh
    pub telemetry: bool,
}

struct Telemetry {
    // Keep the session alive as long as its publishers
    _session: zenoh::Session,
    wheels: zenoh::pubsub::Publisher<'static>,
    health: zenoh::pubsub::Publisher<'static>,
    tick: zenoh::pubsub::Publisher<'static>,
}

impl Telemetry {
    async fn open() -> Result<Self, BoxError> {
        info!("Opening Zenoh session...");
        let session = zenoh::open(zenoh::Config::default()).await?;

        info!("Setting up publishers...");
        let wheels = session.declare_publisher(TOPIC_RT_WHEELS).await?;
        let health = session.declare_publisher(TOPIC_HEALTH).await?;
        let tick = session.declare_publisher(TOPIC_TICK).await?;
        info!(
            "Publishing to: {}, {}, {}",
            TOPIC_RT_WHEELS, TOPIC_HEALTH, TOPIC_TICK
        );

        Ok(Self {
            _session: session,
            wheels,
            health,
            tick,
        })
    }

    async fn publish_wheels(&self, outputs: &LatchedOutputs) -> Result<(), BoxError> {
        let wheels_json = serde_json::to_string(&outputs.snapshot())?;
        self.wheels.put(wheels_json).await?;
        Ok(())
    }

    async fn publish(&self, outputs: &LatchedOutputs, report: &TickReport) -> Result<(), BoxError> {
        self.publish_wheels(outputs).await?;

        let health_json = serde_json::to_string(&report.health)?;
        self.health.put(health_json).await?;

        let tick_json = serde_json::to_string(report)?;
        self.tick.put(tick_json).await?;
        Ok(())
    }
}

fn send_replies(writer: &mut dyn Write, report: &TickReport) {
    for reply in &report.replies {
        let result = writer.write_all(reply.as_bytes()).and_then(|_| writer.flush());
        if let Err(e) = result {
            warn!("Failed to send {:?} reply: {}", reply, e);
        }
    }
}

pub async fn run(options: RunOptions) -> Result<(), BoxError> {
    options.config.validate()?;

    let link = match &options.link {
        LinkSource::Serial { port, baudrate } => Link::open_serial(port, *baudrate)?,
        LinkSource::Stdio => Link::stdio(),
    };

    let telemetry = if options.telemetry {
        Some(Telemetry::open().await?)
    } else {
        info!("Telemetry disabled");
        None
    };

    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(LINK_CHANNEL_DEPTH);
    let (_reader, mut writer) = link.spawn_reader(tx)?;

    let config = options.config;
    let mut tick = interval(config.tick_period());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        "Runtime started: {}ms tick, {}ms watchdog timeout",
        config.tick_period_ms, config.comms_timeout_ms
    );

    let mut control = ControlLoop::new(config, LatchedOutputs::new(), Instant::now())?;
    let mut link_open = true;

    // Registered once so a Ctrl-C during tick work or publishing is not lost
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                break;
            }
        }

        // 1. Drain everything the reader delivered since last tick
        while link_open {
            match rx.try_recv() {
                Ok(chunk) => control.ingest(&chunk),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    // Keep ticking: the watchdog brings the vehicle to a stop
                    warn!("Link reader stopped, no more input");
                    link_open = false;
                }
            }
        }

        // 2. Run one control period (decode, kinematics, watchdog, ramp, outputs)
        let report = control.tick(Instant::now());

        // 3. Answer commands on the link
        send_replies(&mut *writer, &report);

        debug!(
            "mode={:?} targets={:?} currents={:?}",
            report.mode,
            report.targets.as_array(),
            report.currents.as_array()
        );

        // 4. Publish actuation, health and the full report
        if let Some(telemetry) = &telemetry {
            if let Err(e) = telemetry.publish(control.sink(), &report).await {
                warn!("Failed to publish telemetry: {}", e);
            }
        }
    }

    control.halt();
    if let Some(telemetry) = &telemetry {
        if let Err(e) = telemetry.publish_wheels(control.sink()).await {
            warn!("Failed to publish final stop: {}", e);
        }
    }
    Ok(())
}
