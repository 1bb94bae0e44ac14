//! Board description: logical peripheral roles to physical names.
//!
//! Single source of truth for which UART, PWM channel, and GPIOs the
//! service opens.  The service never hard-codes a name; it asks a
//! [`BoardDefaults`] implementation and passes the resolved
//! [`BoardNames`] to the peripheral manager.

use heapless::String;
use serde::{Deserialize, Serialize};

/// Longest peripheral name a board may use.
pub const MAX_NAME_LEN: usize = 16;

/// Bounded peripheral name.
pub type PeripheralName = String<MAX_NAME_LEN>;

/// Resolved peripheral names for one board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardNames {
    /// Serial port echoed by the loopback.
    pub uart: PeripheralName,
    /// PWM output ramped by the heartbeat.
    pub pwm: PeripheralName,
    /// Status LED outputs, driven low at start.
    pub led_red: PeripheralName,
    pub led_green: PeripheralName,
    pub led_blue: PeripheralName,
}

impl BoardNames {
    /// LED names in red, green, blue order.
    pub fn leds(&self) -> [&str; 3] {
        [
            self.led_red.as_str(),
            self.led_green.as_str(),
            self.led_blue.as_str(),
        ]
    }
}

/// Board-description provider.
pub trait BoardDefaults {
    /// Resolve every logical role to a peripheral name.
    fn names(&self) -> BoardNames;
}

// ---------------------------------------------------------------------------
// ESP32-S3 DevKitC
// ---------------------------------------------------------------------------

/// UART1 routed to the header pins.
pub const UART_PORT: &str = "UART1";
pub const UART_TX_GPIO: i32 = 17;
pub const UART_RX_GPIO: i32 = 18;

/// LEDC channel 0 on GPIO 4.
pub const PWM_CHANNEL: &str = "LEDC0";
pub const PWM_GPIO: i32 = 4;

pub const LED_R: &str = "GPIO11";
pub const LED_G: &str = "GPIO12";
pub const LED_B: &str = "GPIO13";

/// Default pin-out for the ESP32-S3 DevKitC carrier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Esp32S3DevKit;

impl BoardDefaults for Esp32S3DevKit {
    fn names(&self) -> BoardNames {
        BoardNames {
            uart: fixed(UART_PORT),
            pwm: fixed(PWM_CHANNEL),
            led_red: fixed(LED_R),
            led_green: fixed(LED_G),
            led_blue: fixed(LED_B),
        }
    }
}

// Board constants above are all shorter than MAX_NAME_LEN.
fn fixed(raw: &'static str) -> PeripheralName {
    let mut s = PeripheralName::new();
    let _ = s.push_str(raw);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devkit_names_resolve() {
        let names = Esp32S3DevKit.names();
        assert_eq!(names.uart.as_str(), "UART1");
        assert_eq!(names.pwm.as_str(), "LEDC0");
        assert_eq!(names.leds(), ["GPIO11", "GPIO12", "GPIO13"]);
    }

    #[test]
    fn leds_are_distinct() {
        let names = Esp32S3DevKit.names();
        let [r, g, b] = names.leds();
        assert!(r != g && g != b && r != b);
    }
}
