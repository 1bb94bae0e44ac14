//! Outbound application events.
//!
//! The service and its worker emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them: log to the console, count them in a test.

use crate::error::PeripheralError;

/// Which peripheral role an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralRole {
    Serial,
    Pwm,
    StatusLed(LedColour),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColour {
    Red,
    Green,
    Blue,
}

/// What came up during [`start`](super::service::LoopbackService::start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartReport {
    /// Serial port is open, configured, and listening.
    pub serial_ready: bool,
    /// PWM output is open and the heartbeat is scheduled.
    pub pwm_ready: bool,
    /// Number of status LEDs opened and driven low (0–3).
    pub status_leds: u8,
}

impl StartReport {
    /// `true` if any peripheral failed to come up.
    pub fn is_degraded(&self) -> bool {
        !self.serial_ready || !self.pwm_ready || self.status_leds < 3
    }
}

/// Counters accumulated over one start/stop cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ServiceStats {
    pub bytes_echoed: u64,
    pub transfer_passes: u64,
    pub aborted_passes: u64,
    pub heartbeat_ticks: u64,
    pub failed_duty_writes: u64,
    pub last_duty: f32,
}

/// Structured events emitted by the loopback core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service has started (possibly degraded).
    Started(StartReport),

    /// A peripheral could not be opened or configured and will not take part.
    PeripheralUnavailable {
        role: PeripheralRole,
        error: PeripheralError,
    },

    /// A drain pass echoed at least one byte.
    Transferred { bytes: usize, chunks: usize },

    /// A drain pass stopped on an I/O error.
    TransferAborted {
        echoed: usize,
        cause: PeripheralError,
    },

    /// The serial driver reported an asynchronous error.
    SerialError(i32),

    /// A heartbeat tick applied a new duty cycle.
    HeartbeatTick { tick: u64, duty: f32 },

    /// A heartbeat tick could not apply its duty cycle; the ramp continues.
    HeartbeatWriteFailed {
        tick: u64,
        duty: f32,
        cause: PeripheralError,
    },

    /// The service has stopped.
    Stopped(ServiceStats),
}
