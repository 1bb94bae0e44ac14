//! Integration tests: LoopbackService → Worker → simulated UART/LEDs.

use std::time::Duration;

use loopback::app::events::{AppEvent, LedColour, PeripheralRole};
use loopback::error::PeripheralError;

use crate::mock_hw::{WAIT, make_service, started};

// ── Echo ──────────────────────────────────────────────────────

#[test]
fn notified_bytes_are_echoed_in_order() {
    let (mut svc, sim, sink) = started();

    sim.serial().deliver(&[0x41, 0x42, 0x43]);
    assert!(sim.serial().wait_for_tx(3, WAIT));
    assert!(sink.wait_for(|e| matches!(e, AppEvent::Transferred { bytes: 3, chunks: 1 })));

    svc.stop();
    assert_eq!(sim.serial().tx(), [0x41, 0x42, 0x43]);
    assert_eq!(sim.serial().rx_pending(), 0);
}

#[test]
fn bytes_buffered_before_start_are_drained_without_notification() {
    let (mut svc, mut sim, sink) = make_service(Default::default());
    sim.serial().push_rx(b"early");

    svc.start(&mut sim, sink.clone()).unwrap();
    assert!(sim.serial().wait_for_tx(5, WAIT));
    svc.stop();

    assert_eq!(sim.serial().tx(), b"early");
}

#[test]
fn empty_notification_writes_nothing() {
    let (mut svc, sim, _sink) = started();

    sim.serial().notify();
    sim.serial().deliver(b"x");
    assert!(sim.serial().wait_for_tx(1, WAIT));
    svc.stop();

    assert_eq!(sim.serial().writes(), [1]);
    let stats = svc.last_stats().unwrap();
    // eager drain + empty notify + delivery
    assert_eq!(stats.transfer_passes, 3);
    assert_eq!(stats.bytes_echoed, 1);
}

#[test]
fn large_burst_survives_short_writes() {
    let (mut svc, sim, _sink) = started();
    sim.serial().limit_writes(100);

    let data: Vec<u8> = (0..1300u32).map(|i| (i % 251) as u8).collect();
    sim.serial().deliver(&data);
    assert!(sim.serial().wait_for_tx(data.len(), WAIT));
    svc.stop();

    assert_eq!(sim.serial().tx(), data);
    assert!(sim.serial().writes().iter().all(|&n| n <= 100));
}

#[test]
fn write_failure_aborts_pass_but_not_service() {
    let (mut svc, sim, sink) = started();

    sim.serial().fail_next_write();
    sim.serial().deliver(b"lost");
    assert!(sink.wait_for(|e| matches!(
        e,
        AppEvent::TransferAborted { echoed: 0, cause: PeripheralError::IoFailure }
    )));

    sim.serial().deliver(b"ok");
    assert!(sim.serial().wait_for_tx(2, WAIT));
    svc.stop();

    assert_eq!(sim.serial().tx(), b"ok");
    assert_eq!(svc.last_stats().unwrap().aborted_passes, 1);
}

#[test]
fn driver_errors_are_reported() {
    let (mut svc, sim, sink) = started();

    sim.serial().raise_error(5);
    assert!(sink.wait_for(|e| matches!(e, AppEvent::SerialError(5))));
    svc.stop();
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn start_opens_configures_and_listens() {
    let (mut svc, sim, sink) = started();

    assert!(svc.is_running());
    assert!(sim.serial().is_listening());
    assert_eq!(sim.serial().settings(), Some(Default::default()));
    assert_eq!(sim.pwm().frequency_hz(), Some(0.5));
    assert!(sim.pwm().is_enabled());

    let report = svc.report();
    assert!(report.serial_ready && report.pwm_ready);
    assert_eq!(report.status_leds, 3);
    assert!(sink.wait_for(|e| matches!(e, AppEvent::Started(_))));
    svc.stop();
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Started(_))), 1);
}

#[test]
fn nothing_happens_after_stop() {
    let (mut svc, sim, sink) = started();
    assert!(sim.pwm().wait_for_writes(2, WAIT));

    svc.stop();
    assert!(!svc.is_running());
    assert!(sim.serial().is_closed());
    assert!(!sim.serial().is_listening());
    assert!(!sim.pwm().is_open());

    let duty_writes = sim.pwm().writes().len();
    sim.serial().deliver(b"too late");
    std::thread::sleep(Duration::from_millis(50));

    assert!(sim.serial().tx().is_empty());
    assert_eq!(sim.pwm().writes().len(), duty_writes);
    assert!(matches!(sink.events().last(), Some(AppEvent::Stopped(_))));
}

#[test]
fn stop_is_idempotent() {
    let (mut svc, sim, sink) = started();
    svc.stop();
    svc.stop();

    assert_eq!(sim.serial().closes(), 1);
    assert_eq!(sim.pwm().closes(), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Stopped(_))), 1);
}

#[test]
fn stop_without_start_is_harmless() {
    let (mut svc, sim, sink) = make_service(Default::default());
    svc.stop();

    assert_eq!(sim.serial().opens(), 0);
    assert!(sink.events().is_empty());
}

#[test]
fn service_restarts_after_stop() {
    let (mut svc, mut sim, sink) = started();
    svc.stop();

    svc.start(&mut sim, sink.clone()).unwrap();
    sim.serial().deliver(b"again");
    assert!(sim.serial().wait_for_tx(5, WAIT));
    svc.stop();

    assert_eq!(sim.serial().opens(), 2);
    assert_eq!(sim.serial().tx(), b"again");
}

// ── Degraded starts ───────────────────────────────────────────

#[test]
fn missing_uart_leaves_heartbeat_running() {
    let (mut svc, mut sim, sink) = make_service(Default::default());
    sim.set_unavailable("UART1");

    let report = svc.start(&mut sim, sink.clone()).unwrap();
    assert!(!report.serial_ready);
    assert!(report.pwm_ready);
    assert!(report.is_degraded());
    assert!(sim.pwm().wait_for_duties(2, WAIT));
    svc.stop();

    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::PeripheralUnavailable {
                role: PeripheralRole::Serial,
                error: PeripheralError::PeripheralUnavailable,
            }
        )),
        1
    );
}

#[test]
fn rejected_serial_config_closes_the_port() {
    let (mut svc, mut sim, sink) = make_service(Default::default());
    sim.serial().reject_config();

    let report = svc.start(&mut sim, sink.clone()).unwrap();
    assert!(!report.serial_ready);
    assert!(sim.serial().is_closed());
    assert_eq!(sim.serial().closes(), 1);
    svc.stop();

    assert!(sink.events().iter().any(|e| matches!(
        e,
        AppEvent::PeripheralUnavailable {
            role: PeripheralRole::Serial,
            error: PeripheralError::InvalidConfig(_),
        }
    )));
}

#[test]
fn missing_pwm_leaves_echo_running() {
    let (mut svc, mut sim, sink) = make_service(Default::default());
    sim.set_unavailable("LEDC0");

    let report = svc.start(&mut sim, sink.clone()).unwrap();
    assert!(report.serial_ready);
    assert!(!report.pwm_ready);

    sim.serial().deliver(b"echo");
    assert!(sim.serial().wait_for_tx(4, WAIT));
    svc.stop();

    assert!(sim.pwm().writes().is_empty());
    assert_eq!(svc.last_stats().unwrap().heartbeat_ticks, 0);
}

#[test]
fn missing_led_is_reported_and_skipped() {
    let (mut svc, mut sim, sink) = make_service(Default::default());
    sim.set_unavailable("GPIO12");

    let report = svc.start(&mut sim, sink.clone()).unwrap();
    assert_eq!(report.status_leds, 2);
    assert!(sink.events().iter().any(|e| matches!(
        e,
        AppEvent::PeripheralUnavailable {
            role: PeripheralRole::StatusLed(LedColour::Green),
            ..
        }
    )));
    svc.stop();
}

#[test]
fn started_follows_unavailable_reports() {
    let (mut svc, mut sim, sink) = make_service(Default::default());
    sim.set_unavailable("LEDC0");

    let report = svc.start(&mut sim, sink.clone()).unwrap();
    assert!(sink.wait_for(|e| matches!(e, AppEvent::Started(_))));
    svc.stop();

    let events = sink.events();
    let started = events
        .iter()
        .position(|e| matches!(e, AppEvent::Started(_)))
        .unwrap();
    let unavailable = events
        .iter()
        .position(|e| matches!(e, AppEvent::PeripheralUnavailable { role: PeripheralRole::Pwm, .. }))
        .unwrap();
    assert!(unavailable < started);
    assert!(matches!(events[started], AppEvent::Started(r) if r == report));
    assert!(matches!(events.last(), Some(AppEvent::Stopped(_))));
}

#[test]
fn status_leds_are_low_while_running_and_released_on_stop() {
    let (mut svc, sim, _sink) = started();

    for name in ["GPIO11", "GPIO12", "GPIO13"] {
        let led = sim.gpio(name).unwrap();
        assert!(led.is_open());
        assert_eq!(led.level(), Some(false));
    }

    svc.stop();
    for name in ["GPIO11", "GPIO12", "GPIO13"] {
        let led = sim.gpio(name).unwrap();
        assert!(!led.is_open());
        assert_eq!(led.level(), Some(false));
    }
}
