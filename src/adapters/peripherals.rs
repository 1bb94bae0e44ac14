//! ESP-IDF peripheral manager.
//!
//! Resolves board names to drivers:
//!
//! | Name      | Opens                                   |
//! |-----------|-----------------------------------------|
//! | `UART<n>` | [`EspUart`] on port n, board TX/RX pins |
//! | `LEDC<n>` | [`EspLedc`] channel n on timer n % 4    |
//! | `GPIO<n>` | [`EspGpioOutput`] on pin n              |

use log::warn;

use crate::app::ports::{GpioOutput, PeripheralManager, PwmOutput, SerialPort};
use crate::board;
use crate::error::PeripheralError;

use super::gpio::EspGpioOutput;
use super::ledc::EspLedc;
use super::uart::EspUart;

const UART_PORTS: u32 = 3;
const LEDC_CHANNELS: u32 = 8;
const LEDC_TIMERS: u32 = 4;
const GPIO_MAX: u32 = 48;

/// Pin routing for the serial port and PWM output.
#[derive(Debug, Clone, Copy)]
pub struct PinMap {
    pub uart_tx: i32,
    pub uart_rx: i32,
    pub pwm: i32,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            uart_tx: board::UART_TX_GPIO,
            uart_rx: board::UART_RX_GPIO,
            pwm: board::PWM_GPIO,
        }
    }
}

#[derive(Debug, Default)]
pub struct EspPeripheralManager {
    pins: PinMap,
}

impl EspPeripheralManager {
    pub fn new(pins: PinMap) -> Self {
        Self { pins }
    }
}

/// Parse `"<prefix><index>"` with `index < limit`.
fn index(name: &str, prefix: &str, limit: u32) -> Result<u32, PeripheralError> {
    name.strip_prefix(prefix)
        .and_then(|n| n.parse::<u32>().ok())
        .filter(|&n| n < limit)
        .ok_or_else(|| {
            warn!("peripherals: unknown name '{}'", name);
            PeripheralError::PeripheralUnavailable
        })
}

impl PeripheralManager for EspPeripheralManager {
    fn open_serial(&mut self, name: &str) -> Result<Box<dyn SerialPort>, PeripheralError> {
        let port = index(name, "UART", UART_PORTS)?;
        let uart = EspUart::open(port as i32, self.pins.uart_tx, self.pins.uart_rx)?;
        Ok(Box::new(uart))
    }

    fn open_pwm(&mut self, name: &str) -> Result<Box<dyn PwmOutput>, PeripheralError> {
        let channel = index(name, "LEDC", LEDC_CHANNELS)?;
        let pwm = EspLedc::open(channel, channel % LEDC_TIMERS, self.pins.pwm)?;
        Ok(Box::new(pwm))
    }

    fn open_gpio(&mut self, name: &str) -> Result<Box<dyn GpioOutput>, PeripheralError> {
        let pin = index(name, "GPIO", GPIO_MAX)?;
        let out = EspGpioOutput::open(pin as i32).map_err(|e| {
            warn!("peripherals: {} config failed: {}", name, e);
            PeripheralError::PeripheralUnavailable
        })?;
        Ok(Box::new(out))
    }
}
