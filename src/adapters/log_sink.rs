//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (the ESP-IDF logger on the device, which goes to the
//! USB-CDC console).  Heartbeat ticks are `debug` so a running ramp does
//! not flood the console.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(r) => {
                info!(
                    "START | serial={} pwm={} leds={}/3{}",
                    if r.serial_ready { "OK" } else { "DOWN" },
                    if r.pwm_ready { "OK" } else { "DOWN" },
                    r.status_leds,
                    if r.is_degraded() { " | degraded" } else { "" },
                );
            }
            AppEvent::PeripheralUnavailable { role, error } => {
                warn!("PERIPH | {:?} unavailable: {}", role, error);
            }
            AppEvent::Transferred { bytes, chunks } => {
                debug!("ECHO | bytes={} chunks={}", bytes, chunks);
            }
            AppEvent::TransferAborted { echoed, cause } => {
                warn!("ECHO | aborted after {} bytes: {}", echoed, cause);
            }
            AppEvent::SerialError(code) => {
                warn!("UART | driver error event {}", code);
            }
            AppEvent::HeartbeatTick { tick, duty } => {
                debug!("BEAT | tick={} duty={:.0}%", tick, duty);
            }
            AppEvent::HeartbeatWriteFailed { tick, duty, cause } => {
                warn!("BEAT | tick={} duty={:.0}% failed: {}", tick, duty, cause);
            }
            AppEvent::Stopped(s) => {
                info!(
                    "STOP | echoed={}B passes={} aborted={} | ticks={} failed_duty={} last_duty={:.0}%",
                    s.bytes_echoed,
                    s.transfer_passes,
                    s.aborted_passes,
                    s.heartbeat_ticks,
                    s.failed_duty_writes,
                    s.last_duty,
                );
            }
        }
    }
}
