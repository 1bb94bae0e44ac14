//! Fuzz target: `TransferEngine` echo
//!
//! Feeds arbitrary RX contents through one drain pass with a fuzz-chosen
//! per-write limit and one optional injected fault, and verifies:
//! - No panics
//! - Without a fault, TX equals RX exactly and the buffer is drained
//! - With a fault, TX is a prefix of RX and the reported count matches TX
//!
//! cargo fuzz run fuzz_transfer_echo

#![no_main]

use libfuzzer_sys::fuzz_target;
use loopback::adapters::sim::SimPeripherals;
use loopback::app::ports::PeripheralManager;
use loopback::app::transfer::TransferEngine;

fuzz_target!(|data: &[u8]| {
    let Some((&control, payload)) = data.split_first() else {
        return;
    };

    let mut sim = SimPeripherals::new();
    let Ok(mut port) = sim.open_serial("UART1") else {
        return;
    };
    let bus = sim.serial();

    // Low 6 bits: write limit (0 = unlimited).  Top two bits: fault.
    let limit = (control & 0x3f) as usize;
    if limit > 0 {
        bus.limit_writes(limit);
    }
    match control >> 6 {
        1 => bus.fail_next_read(),
        2 => bus.fail_next_write(),
        _ => {}
    }
    bus.push_rx(payload);

    match TransferEngine::new().transfer_all(port.as_mut()) {
        Ok(report) => {
            assert_eq!(report.bytes, payload.len());
            assert_eq!(bus.tx(), payload);
            assert_eq!(bus.rx_pending(), 0);
        }
        Err(aborted) => {
            let tx = bus.tx();
            assert!(payload.starts_with(&tx), "TX is not a prefix of RX");
            assert_eq!(aborted.echoed, tx.len());
        }
    }
});
