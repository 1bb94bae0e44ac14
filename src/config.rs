//! Service configuration parameters.
//!
//! The loopback runs with fixed values (115200 8-N-1, 0.5 Hz heartbeat PWM
//! ramped in 10 % steps every 500 ms).  They live in one struct so the
//! service, the adapters, and the tests all read them from the same place.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Capacity of the transfer chunk the echo loop reads into.
pub const TRANSFER_CHUNK_SIZE: usize = 512;

/// UART parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// UART framing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
        }
    }
}

/// Core service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopbackConfig {
    // --- Serial ---
    pub serial: SerialSettings,

    // --- Heartbeat PWM ---
    /// PWM base frequency (Hz).
    pub pwm_frequency_hz: f32,
    /// Duty increment per heartbeat tick (percent).
    pub duty_step_percent: f32,
    /// Duty above this wraps back to 0 (percent).
    pub duty_ceiling_percent: f32,
    /// Delay between heartbeat ticks (milliseconds).
    pub heartbeat_period_ms: u32,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings::default(),

            pwm_frequency_hz: 0.5,
            duty_step_percent: 10.0,
            duty_ceiling_percent: 100.0,
            heartbeat_period_ms: 500,
        }
    }
}

impl LoopbackConfig {
    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.serial;
        if s.baud_rate == 0 {
            return Err(ConfigError::ValidationFailed("baud_rate must be non-zero"));
        }
        if !(5..=8).contains(&s.data_bits) {
            return Err(ConfigError::ValidationFailed("data_bits must be 5..=8"));
        }
        if !(1..=2).contains(&s.stop_bits) {
            return Err(ConfigError::ValidationFailed("stop_bits must be 1 or 2"));
        }
        if !(self.pwm_frequency_hz > 0.0) {
            return Err(ConfigError::ValidationFailed("pwm_frequency_hz must be positive"));
        }
        if !(self.duty_ceiling_percent > 0.0 && self.duty_ceiling_percent <= 100.0) {
            return Err(ConfigError::ValidationFailed("duty_ceiling_percent must be in (0, 100]"));
        }
        if !(self.duty_step_percent > 0.0 && self.duty_step_percent <= self.duty_ceiling_percent) {
            return Err(ConfigError::ValidationFailed("duty_step_percent must be in (0, ceiling]"));
        }
        if self.heartbeat_period_ms == 0 {
            return Err(ConfigError::ValidationFailed("heartbeat_period_ms must be non-zero"));
        }
        Ok(())
    }

    /// Heartbeat period as a [`Duration`](core::time::Duration).
    pub fn heartbeat_period(&self) -> core::time::Duration {
        core::time::Duration::from_millis(u64::from(self.heartbeat_period_ms))
    }
}

/// Errors from configuration checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_8n1_at_115200() {
        let c = LoopbackConfig::default();
        assert_eq!(c.serial.baud_rate, 115_200);
        assert_eq!(c.serial.data_bits, 8);
        assert_eq!(c.serial.stop_bits, 1);
        assert_eq!(c.serial.parity, Parity::None);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn default_heartbeat_ramp() {
        let c = LoopbackConfig::default();
        assert!((c.pwm_frequency_hz - 0.5).abs() < f32::EPSILON);
        assert!((c.duty_step_percent - 10.0).abs() < f32::EPSILON);
        assert!((c.duty_ceiling_percent - 100.0).abs() < f32::EPSILON);
        assert_eq!(c.heartbeat_period().as_millis(), 500);
        assert_eq!(TRANSFER_CHUNK_SIZE, 512);
    }

    #[test]
    fn rejects_bad_framing() {
        let mut c = LoopbackConfig::default();
        c.serial.data_bits = 9;
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));

        let mut c = LoopbackConfig::default();
        c.serial.stop_bits = 0;
        assert!(c.validate().is_err());

        let mut c = LoopbackConfig::default();
        c.serial.baud_rate = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_bad_ramp() {
        let mut c = LoopbackConfig::default();
        c.duty_step_percent = 0.0;
        assert!(c.validate().is_err());

        let mut c = LoopbackConfig::default();
        c.duty_ceiling_percent = 120.0;
        assert!(c.validate().is_err());

        let mut c = LoopbackConfig::default();
        c.pwm_frequency_hz = f32::NAN;
        assert!(c.validate().is_err());

        let mut c = LoopbackConfig::default();
        c.heartbeat_period_ms = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn postcard_roundtrip() {
        let c = LoopbackConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: LoopbackConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c.serial, c2.serial);
        assert_eq!(c.heartbeat_period_ms, c2.heartbeat_period_ms);
    }
}
