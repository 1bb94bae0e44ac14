//! Unified error types for the loopback firmware.
//!
//! Peripheral adapters report failures as [`PeripheralError`]; nothing at
//! that layer retries.  The service absorbs or logs every variant, so no
//! error here is fatal to the process.  All variants are `Copy` so they can
//! ride along in [`AppEvent`](crate::app::events::AppEvent)s without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Peripheral errors
// ---------------------------------------------------------------------------

/// Failure surfaced by a serial, PWM, or GPIO handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralError {
    /// Open failed: the peripheral is missing or already in use.
    PeripheralUnavailable,
    /// Rejected configuration (baud, parity, frequency, ...).
    InvalidConfig(&'static str),
    /// Transient read/write failure on an open handle.
    IoFailure,
    /// Duty-cycle value outside 0–100 %.
    OutOfRange,
}

impl fmt::Display for PeripheralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeripheralUnavailable => write!(f, "peripheral unavailable"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::IoFailure => write!(f, "I/O failure"),
            Self::OutOfRange => write!(f, "value out of range"),
        }
    }
}

impl std::error::Error for PeripheralError {}

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Errors that prevent the service from running at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A peripheral operation failed.
    Peripheral(PeripheralError),
    /// Configuration is invalid.
    Config(&'static str),
    /// The worker context could not be created.
    Worker(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Peripheral(e) => write!(f, "peripheral: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Worker(msg) => write!(f, "worker: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<PeripheralError> for Error {
    fn from(e: PeripheralError) -> Self {
        Self::Peripheral(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let e = PeripheralError::InvalidConfig("data bits");
        assert_eq!(e.to_string(), "invalid config: data bits");

        let top: Error = PeripheralError::IoFailure.into();
        assert_eq!(top.to_string(), "peripheral: I/O failure");
    }
}
