//! UART loopback firmware: main entry point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  Adapters (outer ring)                    │
//! │  EspPeripheralManager (EspUart · EspLedc · EspGpioOutput) │
//! │  LogEventSink                                             │
//! │  ─────────────── Port Trait Boundary ───────────────      │
//! │  ┌─────────────────────────────────────────────────────┐  │
//! │  │  LoopbackService → Worker                           │  │
//! │  │  TransferEngine · HeartbeatController               │  │
//! │  └─────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Context, Result};
use log::info;

use loopback::adapters::log_sink::LogEventSink;
use loopback::adapters::peripherals::{EspPeripheralManager, PinMap};
use loopback::app::service::LoopbackService;
use loopback::board::{BoardDefaults, Esp32S3DevKit};
use loopback::config::LoopbackConfig;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("loopback v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration ──────────────────────────────────────
    let config = LoopbackConfig::default();
    config.validate().context("default config rejected")?;
    let names = Esp32S3DevKit.names();

    // ── 3. Start the service ──────────────────────────────────
    let mut peripherals = EspPeripheralManager::new(PinMap::default());
    let mut service = LoopbackService::new(config, names);
    let report = service
        .start(&mut peripherals, LogEventSink::new())
        .context("loopback service failed to start")?;
    info!(
        "Ready: serial={} pwm={} leds={}",
        report.serial_ready, report.pwm_ready, report.status_leds
    );

    // ── 4. Idle ───────────────────────────────────────────────
    // The worker owns all I/O; the main task has nothing left to do.
    loop {
        std::thread::park();
    }
}
