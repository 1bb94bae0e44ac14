//! Status LED outputs.
//!
//! Three discrete GPIO outputs (R/G/B) named by the board.  The loopback
//! only needs them parked low while it runs; any LED that fails to open is
//! simply absent.

use log::warn;

use crate::app::events::LedColour;
use crate::app::ports::GpioOutput;
use crate::error::PeripheralError;

pub struct StatusLeds {
    red: Option<Box<dyn GpioOutput>>,
    green: Option<Box<dyn GpioOutput>>,
    blue: Option<Box<dyn GpioOutput>>,
}

impl Default for StatusLeds {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusLeds {
    pub fn new() -> Self {
        Self {
            red: None,
            green: None,
            blue: None,
        }
    }

    /// Take ownership of `pin` for `colour` and drive it low.  On failure the
    /// pin is dropped and the slot stays empty.
    pub fn attach(
        &mut self,
        colour: LedColour,
        mut pin: Box<dyn GpioOutput>,
    ) -> Result<(), PeripheralError> {
        pin.set_level(false)?;
        *self.slot(colour) = Some(pin);
        Ok(())
    }

    /// Number of LEDs attached.
    pub fn count(&self) -> u8 {
        [&self.red, &self.green, &self.blue]
            .iter()
            .filter(|s| s.is_some())
            .count() as u8
    }

    /// Drive all attached LEDs low and release them.
    pub fn release(&mut self) {
        for colour in [LedColour::Red, LedColour::Green, LedColour::Blue] {
            if let Some(mut pin) = self.slot(colour).take() {
                if let Err(e) = pin.set_level(false) {
                    warn!("status_led: {:?} release failed: {}", colour, e);
                }
            }
        }
    }

    fn slot(&mut self, colour: LedColour) -> &mut Option<Box<dyn GpioOutput>> {
        match colour {
            LedColour::Red => &mut self.red,
            LedColour::Green => &mut self.green,
            LedColour::Blue => &mut self.blue,
        }
    }
}
