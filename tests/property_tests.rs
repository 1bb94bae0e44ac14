//! Property tests for the echo loop and the duty ramp.
//!
//! Runs on host (x86_64) only: proptest is not available for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use loopback::adapters::sim::SimPeripherals;
use loopback::app::heartbeat::DutyCounter;
use loopback::app::ports::PeripheralManager;
use loopback::app::transfer::TransferEngine;
use loopback::config::TRANSFER_CHUNK_SIZE;
use proptest::prelude::*;

// ── Transfer engine ───────────────────────────────────────────

proptest! {
    /// Whatever sits in the RX buffer comes back out of TX unchanged, no
    /// matter how short the driver's writes are.
    #[test]
    fn echo_is_exact(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
        write_limit in 1usize..=1024,
    ) {
        let mut sim = SimPeripherals::new();
        let mut port = sim.open_serial("UART1").unwrap();
        let bus = sim.serial();
        bus.limit_writes(write_limit);
        bus.push_rx(&data);

        let report = TransferEngine::new().transfer_all(port.as_mut()).unwrap();

        prop_assert_eq!(report.bytes, data.len());
        prop_assert_eq!(report.chunks, data.len().div_ceil(TRANSFER_CHUNK_SIZE));
        prop_assert_eq!(bus.tx(), data);
        prop_assert_eq!(bus.rx_pending(), 0);
        prop_assert!(bus.writes().iter().all(|&n| n <= write_limit.min(TRANSFER_CHUNK_SIZE)));
    }
}

// ── Duty ramp ─────────────────────────────────────────────────

proptest! {
    /// The counter never leaves `[0, ceiling]` and only ever wraps to 0.
    #[test]
    fn duty_stays_in_range(
        step in 0.5f32..=50.0,
        ceiling in 1.0f32..=100.0,
        ticks in 1usize..500,
    ) {
        let mut counter = DutyCounter::new(step, ceiling);
        let mut prev = counter.value();
        for _ in 0..ticks {
            let next = counter.advance();
            prop_assert!((0.0..=ceiling).contains(&next));
            prop_assert!(next == 0.0 || next > prev);
            prev = next;
        }
    }
}

#[test]
fn default_ramp_has_period_of_eleven_ticks() {
    let mut counter = DutyCounter::new(10.0, 100.0);
    let first: Vec<f32> = (0..11).map(|_| counter.advance()).collect();
    let second: Vec<f32> = (0..11).map(|_| counter.advance()).collect();
    assert_eq!(first, second);
    assert_eq!(first.last(), Some(&0.0));
}
