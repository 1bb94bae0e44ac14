//! ESP-IDF push-pull GPIO output.
//!
//! Implements [`embedded_hal::digital::OutputPin`], which makes it a
//! [`GpioOutput`](crate::app::ports::GpioOutput) through the blanket impl.

use esp_idf_svc::sys::*;
use esp_idf_svc::sys::{EspError, esp};

/// Error from the GPIO driver.
#[derive(Debug)]
pub struct GpioError(EspError);

impl embedded_hal::digital::Error for GpioError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

pub struct EspGpioOutput {
    pin: i32,
}

impl EspGpioOutput {
    /// Configure `pin` as an output, initially low.
    pub fn open(pin: i32) -> Result<Self, EspError> {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            ..Default::default()
        };
        // SAFETY: plain config struct for a pin this adapter now owns.
        esp!(unsafe { gpio_config(&cfg) })?;
        esp!(unsafe { gpio_set_level(pin, 0) })?;
        Ok(Self { pin })
    }
}

impl embedded_hal::digital::ErrorType for EspGpioOutput {
    type Error = GpioError;
}

impl embedded_hal::digital::OutputPin for EspGpioOutput {
    fn set_low(&mut self) -> Result<(), GpioError> {
        // SAFETY: pin configured as output in `open`.
        esp!(unsafe { gpio_set_level(self.pin, 0) }).map_err(GpioError)
    }

    fn set_high(&mut self) -> Result<(), GpioError> {
        // SAFETY: pin configured as output in `open`.
        esp!(unsafe { gpio_set_level(self.pin, 1) }).map_err(GpioError)
    }
}

impl Drop for EspGpioOutput {
    fn drop(&mut self) {
        // SAFETY: returns the pin to its reset state; nothing else holds it.
        unsafe { gpio_reset_pin(self.pin) };
    }
}
