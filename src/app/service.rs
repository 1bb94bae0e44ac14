//! Loopback service: lifecycle owner of the echo and heartbeat.
//!
//! [`LoopbackService`] opens the peripherals named by the board, hands the
//! serial port and PWM output to a dedicated [`Worker`], and tears it all
//! down again.  Peripherals that fail to open are logged and left out; the
//! echo and the heartbeat are independent, so either keeps running without
//! the other.
//!
//! ```text
//!  PeripheralManager ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                        │     LoopbackService       │
//!     BoardNames ──────▶ │  start() · stop()         │
//!                        └────────────┬─────────────┘
//!                                     ▼
//!                        Worker: TransferEngine · HeartbeatController
//! ```

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::board::BoardNames;
use crate::config::{LoopbackConfig, SerialSettings};
use crate::drivers::status_led::StatusLeds;
use crate::error::{Error, PeripheralError, Result};
use crate::worker::{Job, JobQueue, TransferTrigger, WORKER_TASK, Worker, WorkerState};

use super::events::{AppEvent, LedColour, PeripheralRole, ServiceStats, StartReport};
use super::heartbeat::HeartbeatController;
use super::ports::{DataAvailableNotifier, EventSink, PeripheralManager, PwmOutput, SerialPort};
use super::transfer::TransferEngine;

// ───────────────────────────────────────────────────────────────
// LoopbackService
// ───────────────────────────────────────────────────────────────

pub struct LoopbackService {
    config: LoopbackConfig,
    names: BoardNames,
    worker: Option<Worker>,
    leds: StatusLeds,
    report: StartReport,
    last_stats: Option<ServiceStats>,
}

impl LoopbackService {
    /// Construct the service.  Nothing is opened until [`start`](Self::start).
    pub fn new(config: LoopbackConfig, names: BoardNames) -> Self {
        Self {
            config,
            names,
            worker: None,
            leds: StatusLeds::new(),
            report: StartReport::default(),
            last_stats: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Open peripherals, start the worker, drain anything already buffered,
    /// and arm the first heartbeat tick.
    ///
    /// Peripheral failures degrade the service and are reported through
    /// `sink`; only an invalid config or a failure to create the worker is
    /// an error.  Calling
    /// `start` on a running service returns the existing report.
    pub fn start(
        &mut self,
        peripherals: &mut impl PeripheralManager,
        mut sink: impl EventSink + 'static,
    ) -> Result<StartReport> {
        if self.worker.is_some() {
            warn!("loopback: start ignored, already running");
            return Ok(self.report);
        }
        self.config.validate()?;

        match serde_json::to_string(&self.config) {
            Ok(json) => info!("loopback: config {}", json),
            Err(e) => debug!("loopback: config not printable: {}", e),
        }

        let mut report = StartReport::default();

        // ── Status LEDs ──────────────────────────────────────
        let colours = [LedColour::Red, LedColour::Green, LedColour::Blue];
        for (colour, name) in colours.into_iter().zip(self.names.leds()) {
            let attached = peripherals
                .open_gpio(name)
                .and_then(|pin| self.leds.attach(colour, pin));
            if let Err(error) = attached {
                sink.emit(&AppEvent::PeripheralUnavailable {
                    role: PeripheralRole::StatusLed(colour),
                    error,
                });
            }
        }
        report.status_leds = self.leds.count();

        // ── Heartbeat PWM ────────────────────────────────────
        let mut heartbeat = HeartbeatController::new(&self.config);
        let pwm = match open_pwm(peripherals, &self.names.pwm, &self.config) {
            Ok(pwm) => {
                heartbeat.schedule();
                Some(pwm)
            }
            Err(error) => {
                sink.emit(&AppEvent::PeripheralUnavailable {
                    role: PeripheralRole::Pwm,
                    error,
                });
                None
            }
        };
        report.pwm_ready = pwm.is_some();

        // ── Serial ───────────────────────────────────────────
        let jobs = Arc::new(JobQueue::new());
        let trigger: DataAvailableNotifier = Arc::new(TransferTrigger::new(Arc::clone(&jobs)));
        let serial = match open_serial(peripherals, &self.names.uart, &self.config.serial, trigger)
        {
            Ok(serial) => Some(serial),
            Err(error) => {
                sink.emit(&AppEvent::PeripheralUnavailable {
                    role: PeripheralRole::Serial,
                    error,
                });
                None
            }
        };
        report.serial_ready = serial.is_some();
        if report.serial_ready {
            // Eager drain of anything buffered before we started listening.
            let _ = jobs.try_send(Job::Transfer);
        }

        // ── Worker ───────────────────────────────────────────
        // `Started` is the worker's first event, so it is never announced
        // for a service that failed to come up.
        let state = WorkerState {
            serial,
            pwm,
            engine: TransferEngine::new(),
            heartbeat,
            sink: Box::new(sink),
            stats: ServiceStats::default(),
        };
        let period = self.config.heartbeat_period();
        match Worker::spawn(WORKER_TASK, state, jobs, period, report) {
            Ok(worker) => self.worker = Some(worker),
            Err(failed) => {
                error!("loopback: worker spawn failed: {}", failed.error);
                if let Some(mut state) = failed.state {
                    state.release();
                }
                self.leds.release();
                return Err(Error::Worker("spawn failed"));
            }
        }

        self.report = report;
        info!(
            "loopback: started on {} / {}{}",
            self.names.uart,
            self.names.pwm,
            if report.is_degraded() { " (degraded)" } else { "" }
        );
        Ok(report)
    }

    /// Stop notifications and the heartbeat, then release every peripheral.
    ///
    /// Once this returns no transfer pass or heartbeat tick will run.
    /// Stopping a service that is not running is a no-op.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            debug!("loopback: stop ignored, not running");
            return;
        };

        // The worker unregisters and closes the serial port on its own
        // context before exiting; the pending heartbeat tick is discarded.
        if let Some(mut state) = worker.shutdown() {
            state.close_pwm();
            state.sink.emit(&AppEvent::Stopped(state.stats));
            self.last_stats = Some(state.stats);
        }
        self.leds.release();
        info!("loopback: stopped");
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Report from the most recent successful start.
    pub fn report(&self) -> StartReport {
        self.report
    }

    /// Counters from the most recent stop.
    pub fn last_stats(&self) -> Option<ServiceStats> {
        self.last_stats
    }
}

impl Drop for LoopbackService {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Peripheral bring-up ──────────────────────────────────────
//
// A handle that fails part-way through setup is closed before the error is
// returned, so a half-configured peripheral never escapes.

fn open_pwm(
    peripherals: &mut impl PeripheralManager,
    name: &str,
    config: &LoopbackConfig,
) -> core::result::Result<Box<dyn PwmOutput>, PeripheralError> {
    let mut pwm = peripherals.open_pwm(name)?;
    if let Err(e) = init_pwm(pwm.as_mut(), config) {
        let _ = pwm.close();
        return Err(e);
    }
    Ok(pwm)
}

fn init_pwm(
    pwm: &mut dyn PwmOutput,
    config: &LoopbackConfig,
) -> core::result::Result<(), PeripheralError> {
    pwm.set_frequency_hz(config.pwm_frequency_hz)?;
    pwm.set_duty_cycle(0.0)?;
    pwm.set_enabled(true)
}

fn open_serial(
    peripherals: &mut impl PeripheralManager,
    name: &str,
    settings: &SerialSettings,
    notifier: DataAvailableNotifier,
) -> core::result::Result<Box<dyn SerialPort>, PeripheralError> {
    let mut serial = peripherals.open_serial(name)?;
    let setup = serial
        .configure(settings)
        .and_then(|()| serial.register_data_available(notifier));
    if let Err(e) = setup {
        let _ = serial.close();
        return Err(e);
    }
    Ok(serial)
}
