use std::time::{Duration, Instant};

use mecanum_drive_core::config::{DriveConfig, SelfTestConfig};
use mecanum_drive_core::control::ControlLoop;
use mecanum_drive_core::messages::{DriveMode, Reply, RuntimeHealth, TickReport};
use mecanum_drive_core::motor::{MotorOutput, Wheel, WheelCommand, WheelSpeeds};
use mecanum_drive_core::self_test::SelfTestPhase;

/// Sink that remembers every write, in order
#[derive(Default)]
struct Recorder {
    writes: Vec<(Wheel, i32)>,
}

impl MotorOutput for Recorder {
    fn write(&mut self, wheel: Wheel, command: WheelCommand) {
        self.writes.push((wheel, command.signed()));
    }
}

const TICK: Duration = Duration::from_millis(10);

fn test_config() -> DriveConfig {
    DriveConfig {
        tick_period_ms: 10,
        comms_timeout_ms: 100,
        self_test: SelfTestConfig {
            speed: 120,
            drive_ms: 30,
            pause_ms: 10,
        },
        ..DriveConfig::default()
    }
}

/// Control loop plus a synthetic clock
struct Harness {
    control: ControlLoop<Recorder>,
    now: Instant,
}

impl Harness {
    fn new(config: DriveConfig) -> Self {
        let now = Instant::now();
        Self {
            control: ControlLoop::new(config, Recorder::default(), now).unwrap(),
            now,
        }
    }

    fn tick(&mut self) -> TickReport {
        self.now += TICK;
        self.control.tick(self.now)
    }

    fn send(&mut self, bytes: &[u8]) -> TickReport {
        self.control.ingest(bytes);
        self.tick()
    }

    fn writes(&self) -> &[(Wheel, i32)] {
        &self.control.sink().writes
    }
}

#[test]
fn test_uniform_forward_and_strafe() {
    let mut h = Harness::new(test_config());
    let report = h.send(b"<0,60,0>");
    assert_eq!(report.targets, WheelSpeeds::new(60, 60, 60, 60));

    let report = h.send(b"<60,0,0>");
    assert_eq!(report.targets, WheelSpeeds::new(60, -60, -60, 60));
    assert_eq!(report.mode, DriveMode::Translate);
}

#[test]
fn test_rotate_priority_through_loop() {
    let mut h = Harness::new(test_config());
    let report = h.send(b"<100,100,50>\n");
    assert_eq!(report.mode, DriveMode::Rotate);
    assert_eq!(report.targets, WheelSpeeds::new(50, 50, -50, -50));
}

#[test]
fn test_last_frame_in_tick_wins() {
    let mut h = Harness::new(test_config());
    let report = h.send(b"<0,200,0>\n<0,-40,0>\n");
    assert_eq!(report.targets, WheelSpeeds::new(-40, -40, -40, -40));
    assert_eq!(report.decoder.frames, 2);
}

#[test]
fn test_repeated_sample_converges_and_holds() {
    let mut h = Harness::new(test_config());
    let mut converged_at = None;
    let mut previous = WheelSpeeds::zero();
    for i in 0..80 {
        let report = h.send(b"<30,200,0>");
        for wheel in Wheel::ALL {
            let (before, after, target) = (
                previous.get(wheel),
                report.currents.get(wheel),
                report.targets.get(wheel),
            );
            assert!(after.abs() <= 255);
            assert!((before <= after && after <= target) || (target <= after && after <= before));
        }
        if converged_at.is_none() && report.currents == report.targets {
            converged_at = Some(i);
        }
        previous = report.currents;
    }
    // 230 at 5 per tick is 46 ticks; the slower wheels get there sooner
    assert_eq!(converged_at, Some(45));
    assert_eq!(previous, WheelSpeeds::new(230, 170, 170, 230));
}

#[test]
fn test_timeout_zeroes_targets_then_brakes() {
    let mut h = Harness::new(test_config());
    for _ in 0..60 {
        h.send(b"<0,255,0>");
    }
    let report = h.tick();
    assert_eq!(report.health, RuntimeHealth::Ok);
    assert_eq!(report.currents, WheelSpeeds::new(255, 255, 255, 255));

    // Silence: 100 ms timeout at 10 ms ticks
    let mut stale_reports = Vec::new();
    for _ in 0..12 {
        stale_reports.push(h.tick());
    }
    let first_stale = stale_reports
        .iter()
        .position(|r| r.health == RuntimeHealth::CmdStale)
        .unwrap();
    // Last frame was 1 tick before the silence started: 100 ms later is tick 9
    assert_eq!(first_stale, 8);
    let report = &stale_reports[first_stale];
    assert_eq!(report.mode, DriveMode::Failsafe);
    assert_eq!(report.targets, WheelSpeeds::zero());
    // Controlled stop, not a cut
    assert_eq!(report.currents, WheelSpeeds::new(240, 240, 240, 240));

    for _ in 0..20 {
        h.tick();
    }
    let report = h.tick();
    assert_eq!(report.currents, WheelSpeeds::zero());
}

#[test]
fn test_valid_frame_recovers_from_failsafe() {
    let mut h = Harness::new(test_config());
    for _ in 0..20 {
        h.tick();
    }
    assert_eq!(h.tick().health, RuntimeHealth::CmdStale);

    let report = h.send(b"<0,80,0>");
    assert_eq!(report.health, RuntimeHealth::Ok);
    assert_eq!(report.mode, DriveMode::Translate);
    assert_eq!(report.targets, WheelSpeeds::new(80, 80, 80, 80));
}

#[test]
fn test_malformed_frame_does_not_refresh_watchdog() {
    let mut h = Harness::new(test_config());
    h.send(b"<0,80,0>");
    let mut report = h.tick();
    for _ in 0..15 {
        report = h.send(b"<a,b,c>");
        assert_eq!(report.decode_failures.len(), 1);
    }
    assert_eq!(report.health, RuntimeHealth::CmdStale);
    assert_eq!(report.targets, WheelSpeeds::zero());
}

#[test]
fn test_ping_pong() {
    let mut h = Harness::new(test_config());
    let report = h.send(b"PING\r");
    assert_eq!(report.replies, vec![Reply::Pong]);
    assert_eq!(Reply::Pong.as_bytes(), b"PONG\n");
}

#[test]
fn test_self_test_sequence() {
    let mut h = Harness::new(test_config());
    for _ in 0..30 {
        h.send(b"<0,150,0>");
    }
    let writes_before = h.writes().len();

    let report = h.send(b"TEST\n");
    assert_eq!(report.mode, DriveMode::SelfTest);
    assert_eq!(report.health, RuntimeHealth::SelfTest);
    assert_eq!(report.self_test, Some(SelfTestPhase::Forward(Wheel::LeftFront)));
    assert!(h.control.is_self_testing());
    assert!(!h.control.state().motors_enabled);

    let mut ticks = 1;
    loop {
        let report = h.tick();
        if !h.control.is_self_testing() {
            assert_eq!(report.health, RuntimeHealth::Ok);
            break;
        }
        // Targets and currents are frozen while the test drives the wheels
        assert_eq!(report.targets, WheelSpeeds::new(150, 150, 150, 150));
        ticks += 1;
        assert!(ticks < 100);
    }
    assert_eq!(ticks, 28);

    let drives: Vec<(Wheel, i32)> = h.writes()[writes_before..]
        .iter()
        .copied()
        .filter(|w| w.1 != 0)
        .collect();
    let mut expected = Vec::new();
    for wheel in Wheel::ALL {
        expected.push((wheel, 120));
        expected.push((wheel, -120));
    }
    assert_eq!(drives, expected);

    let state = h.control.state();
    assert!(state.motors_enabled);
    assert!(state.wheels.iter().all(|w| w.target == 0 && w.current == 0));

    // The test ran ~280 ms, well past the 100 ms timeout, yet the watchdog
    // timing was refreshed at completion.
    let report = h.tick();
    assert_eq!(report.health, RuntimeHealth::Ok);
    assert_eq!(report.mode, DriveMode::Stop);
}

#[test]
fn test_self_test_discards_input_until_done() {
    let mut h = Harness::new(test_config());
    h.send(b"TEST\n<0,90,0>");
    // Input arriving mid-test is dropped, not held for later
    let report = h.send(b"PING\n<0,90,0>");
    assert!(report.replies.is_empty());
    assert_eq!(report.targets, WheelSpeeds::zero());

    while h.control.is_self_testing() {
        h.send(b"<0,90");
    }

    // Neither the frame queued behind TEST nor the half frame sent during the
    // test moves the wheels afterwards
    let report = h.send(b",0>\n");
    assert_eq!(report.targets, WheelSpeeds::zero());
    assert_eq!(report.decoder.frames, 0);

    let report = h.send(b"<0,90,0>PING\n");
    assert_eq!(report.targets, WheelSpeeds::new(90, 90, 90, 90));
    assert_eq!(report.replies, vec![Reply::Pong]);
}

#[test]
fn test_input_stopping_mid_test_stays_stopped() {
    let mut config = test_config();
    config.self_test.drive_ms = 200;
    let mut h = Harness::new(config);
    h.send(b"TEST\n");
    for _ in 0..20 {
        h.send(b"<0,200,0>\n");
    }
    while h.control.is_self_testing() {
        h.tick();
    }

    // Silence from here on: no stale frame may drive the wheels, and the
    // watchdog runs out one timeout after the test finished
    let mut reports = Vec::new();
    for _ in 0..15 {
        reports.push(h.tick());
    }
    assert!(reports.iter().all(|r| r.currents == WheelSpeeds::zero()));
    assert!(reports.iter().all(|r| r.targets == WheelSpeeds::zero()));
    assert_eq!(reports[0].health, RuntimeHealth::Ok);
    assert_eq!(reports[14].health, RuntimeHealth::CmdStale);
}

#[test]
fn test_replies_before_test_command_are_kept() {
    let mut h = Harness::new(test_config());
    let report = h.send(b"PING\nTEST\n");
    assert_eq!(report.replies, vec![Reply::Pong]);
    assert!(h.control.is_self_testing());
}

#[test]
fn test_inverted_wheel_output() {
    let mut config = test_config();
    config.wheels.left_back.invert = true;
    let mut h = Harness::new(config);
    h.send(b"<0,100,0>");
    let last: Vec<(Wheel, i32)> = h.writes()[h.writes().len() - 4..].to_vec();
    assert_eq!(
        last,
        vec![
            (Wheel::LeftFront, 5),
            (Wheel::LeftBack, -5),
            (Wheel::RightFront, 5),
            (Wheel::RightBack, 5),
        ]
    );
}

#[test]
fn test_report_serializes_for_status_reporter() {
    let mut h = Harness::new(test_config());
    let report = h.send(b"<1,2>");
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["mode"], "stop");
    assert_eq!(json["health"], "ok");
    assert_eq!(json["decode_failures"][0]["kind"], "field_count");
    assert_eq!(json["decode_failures"][0]["found"], 2);
    assert_eq!(json["targets"]["left_front"], 0);
    assert!(json.get("self_test").is_none());
}
