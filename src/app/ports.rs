//! Port traits: the hexagonal boundary between the loopback core and the
//! host platform.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ TransferEngine / HeartbeatController
//! ```
//!
//! Driven adapters (ESP-IDF UART/LEDC/GPIO, host simulation) implement
//! these traits.  Handles are not assumed thread-safe for interleaved
//! read/write: the service only ever touches a serial handle from its
//! worker context.  Every failure is surfaced as a typed
//! [`PeripheralError`]; no adapter retries.

use std::sync::Arc;

use crate::config::SerialSettings;
use crate::error::PeripheralError;

// ───────────────────────────────────────────────────────────────
// Data-available notification
// ───────────────────────────────────────────────────────────────

/// Receiver of serial "data available" notifications.
///
/// Adapters call this from whatever context their driver signals on
/// (UART event task, ISR bridge, test thread).  Implementations must only
/// hand off to the worker context, never touch the port directly.
pub trait DataAvailableSink: Send + Sync {
    /// The receive buffer has unread bytes.
    fn on_data_available(&self);

    /// The transport reported an asynchronous error (driver-specific code).
    fn on_error(&self, code: i32) {
        let _ = code;
    }
}

/// Shared handle a serial adapter keeps while registered.
pub type DataAvailableNotifier = Arc<dyn DataAvailableSink>;

// ───────────────────────────────────────────────────────────────
// Serial port
// ───────────────────────────────────────────────────────────────

/// A byte-oriented UART handle.
pub trait SerialPort: Send {
    /// Apply framing and baud rate.
    fn configure(&mut self, settings: &SerialSettings) -> Result<(), PeripheralError>;

    /// Read up to `buf.len()` bytes.  Returns 0 when the receive buffer is
    /// empty; blocks only if the underlying transport blocks.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, PeripheralError>;

    /// Queue `data` for transmission.  Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, PeripheralError>;

    /// Start delivering data-available notifications to `notifier`.
    fn register_data_available(
        &mut self,
        notifier: DataAvailableNotifier,
    ) -> Result<(), PeripheralError>;

    /// Stop delivering notifications.  No-op if none is registered.
    fn unregister_data_available(&mut self);

    /// Release the port.  Closing an already-closed port is a no-op.
    fn close(&mut self) -> Result<(), PeripheralError>;
}

// ───────────────────────────────────────────────────────────────
// PWM output
// ───────────────────────────────────────────────────────────────

/// A single PWM channel.
pub trait PwmOutput: Send {
    fn set_frequency_hz(&mut self, hz: f32) -> Result<(), PeripheralError>;

    /// Set duty in percent.  Fails with [`PeripheralError::OutOfRange`]
    /// outside 0–100.
    fn set_duty_cycle(&mut self, percent: f32) -> Result<(), PeripheralError>;

    fn set_enabled(&mut self, enabled: bool) -> Result<(), PeripheralError>;

    /// Release the channel.  Idempotent.
    fn close(&mut self) -> Result<(), PeripheralError>;
}

/// Shared range check for [`PwmOutput::set_duty_cycle`] implementations.
pub fn check_duty(percent: f32) -> Result<(), PeripheralError> {
    if (0.0..=100.0).contains(&percent) {
        Ok(())
    } else {
        Err(PeripheralError::OutOfRange)
    }
}

// ───────────────────────────────────────────────────────────────
// GPIO output
// ───────────────────────────────────────────────────────────────

/// A digital output.  Anything implementing
/// [`embedded_hal::digital::OutputPin`] is one.
pub trait GpioOutput: Send {
    fn set_level(&mut self, high: bool) -> Result<(), PeripheralError>;
}

impl<P> GpioOutput for P
where
    P: embedded_hal::digital::OutputPin + Send,
{
    fn set_level(&mut self, high: bool) -> Result<(), PeripheralError> {
        let res = if high { self.set_high() } else { self.set_low() };
        res.map_err(|_| PeripheralError::IoFailure)
    }
}

// ───────────────────────────────────────────────────────────────
// Peripheral manager
// ───────────────────────────────────────────────────────────────

/// Opens peripherals by name.  Names come from the board description.
pub trait PeripheralManager {
    fn open_serial(&mut self, name: &str) -> Result<Box<dyn SerialPort>, PeripheralError>;

    fn open_pwm(&mut self, name: &str) -> Result<Box<dyn PwmOutput>, PeripheralError>;

    fn open_gpio(&mut self, name: &str) -> Result<Box<dyn GpioOutput>, PeripheralError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink: Send {
    fn emit(&mut self, event: &super::events::AppEvent);
}
