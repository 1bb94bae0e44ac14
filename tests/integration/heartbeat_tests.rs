//! Integration tests: heartbeat ramp timing against the simulated PWM.

use std::time::Duration;

use loopback::app::events::AppEvent;
use loopback::error::PeripheralError;

use crate::mock_hw::{WAIT, config_with_period, make_service};

#[test]
fn ramp_climbs_to_100_then_wraps() {
    let (mut svc, mut sim, sink) = make_service(config_with_period(5));
    svc.start(&mut sim, sink).unwrap();

    // Initial 0 % at start, then twelve ticks.
    assert!(sim.pwm().wait_for_duties(13, WAIT));
    svc.stop();

    let duties = sim.pwm().duties();
    assert_eq!(
        duties[..13],
        [0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0, 0.0, 10.0]
    );
    assert!(duties.iter().all(|d| (0.0..=100.0).contains(d)));
}

#[test]
fn ticks_are_at_least_one_period_apart() {
    let period = Duration::from_millis(20);
    let (mut svc, mut sim, sink) = make_service(config_with_period(20));
    svc.start(&mut sim, sink).unwrap();

    assert!(sim.pwm().wait_for_writes(5, WAIT));
    svc.stop();

    // Skip the start-up write; tick 1 fires immediately after it.
    let ticks: Vec<_> = sim.pwm().writes().into_iter().skip(1).collect();
    for pair in ticks.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) >= period);
    }
}

#[test]
fn failed_duty_write_does_not_stop_the_ramp() {
    let period = Duration::from_millis(200);
    let (mut svc, mut sim, sink) = make_service(config_with_period(200));
    svc.start(&mut sim, sink.clone()).unwrap();

    // Start-up 0 % and the immediate first tick (10 %).
    assert!(sim.pwm().wait_for_writes(2, WAIT));
    sim.pwm().fail_next_duty();

    assert!(sim.pwm().wait_for_writes(4, WAIT));
    svc.stop();

    let writes = sim.pwm().writes();
    let seen: Vec<_> = writes.iter().map(|w| (w.percent, w.accepted)).collect();
    assert_eq!(
        seen[..4],
        [(0.0, true), (10.0, true), (20.0, false), (30.0, true)]
    );
    assert!(writes[3].at.duration_since(writes[2].at) >= period);

    assert!(sink.events().iter().any(|e| matches!(
        e,
        AppEvent::HeartbeatWriteFailed { tick: 2, cause: PeripheralError::IoFailure, .. }
    )));
    let stats = svc.last_stats().unwrap();
    assert_eq!(stats.failed_duty_writes, 1);
    assert!(stats.heartbeat_ticks >= 3);
}

#[test]
fn no_ticks_after_stop() {
    let (mut svc, mut sim, sink) = make_service(config_with_period(5));
    svc.start(&mut sim, sink).unwrap();
    assert!(sim.pwm().wait_for_duties(3, WAIT));

    svc.stop();
    let writes = sim.pwm().writes().len();
    std::thread::sleep(Duration::from_millis(30));

    assert_eq!(sim.pwm().writes().len(), writes);
    assert!(!sim.pwm().is_enabled());
    assert!(!sim.pwm().is_open());
}
