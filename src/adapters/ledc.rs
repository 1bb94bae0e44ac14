//! ESP-IDF LEDC adapter for the heartbeat PWM.
//!
//! One LEDC timer drives one channel.  Duty is kept in percent and
//! converted to timer counts on every write; disabling stops the channel
//! with its output held low.

use esp_idf_svc::sys::*;
use log::{info, warn};

use crate::app::ports::{PwmOutput, check_duty};
use crate::drivers::ledc_timing::{frequency_range_hz, reachable_frequency_hz};
use crate::error::PeripheralError;

const SPEED_MODE: ledc_mode_t = ledc_mode_t_LEDC_LOW_SPEED_MODE;
const RESOLUTION: ledc_timer_bit_t = ledc_timer_bit_t_LEDC_TIMER_14_BIT;
const RESOLUTION_BITS: u32 = RESOLUTION as u32;

/// Timers run from the 40 MHz crystal so the reachable range is fixed.
const CLK_SRC: soc_periph_ledc_clk_src_legacy_t = soc_periph_ledc_clk_src_legacy_t_LEDC_USE_XTAL_CLK;
const CLK_SRC_HZ: u32 = 40_000_000;

pub struct EspLedc {
    channel: ledc_channel_t,
    timer: ledc_timer_t,
    gpio: i32,
    duty_percent: f32,
    enabled: bool,
    open: bool,
}

impl EspLedc {
    /// Claim `channel` on `timer`, routed to `gpio`, with the output at 0 %.
    pub fn open(channel: ledc_channel_t, timer: ledc_timer_t, gpio: i32) -> Result<Self, PeripheralError> {
        let mut pwm = Self {
            channel,
            timer,
            gpio,
            duty_percent: 0.0,
            enabled: false,
            open: true,
        };
        let (floor_hz, _) = frequency_range_hz(CLK_SRC_HZ, RESOLUTION_BITS);
        pwm.configure_timer(floor_hz)?;

        let cfg = ledc_channel_config_t {
            speed_mode: SPEED_MODE,
            channel,
            timer_sel: timer,
            gpio_num: gpio,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        };
        // SAFETY: plain config struct; the channel is owned by this adapter.
        let ret = unsafe { ledc_channel_config(&cfg) };
        if ret != ESP_OK as i32 {
            warn!("ledc{}: channel config failed (rc={})", channel, ret);
            return Err(PeripheralError::PeripheralUnavailable);
        }
        // Hold the output low until enabled.
        // SAFETY: channel configured above.
        unsafe { ledc_stop(SPEED_MODE, channel, 0) };

        info!("ledc{}: open on GPIO{}", channel, gpio);
        Ok(pwm)
    }

    fn configure_timer(&mut self, freq_hz: u32) -> Result<(), PeripheralError> {
        let cfg = ledc_timer_config_t {
            speed_mode: SPEED_MODE,
            timer_num: self.timer,
            duty_resolution: RESOLUTION,
            freq_hz,
            clk_cfg: CLK_SRC,
            ..Default::default()
        };
        // SAFETY: plain config struct; the timer is owned by this adapter.
        let ret = unsafe { ledc_timer_config(&cfg) };
        if ret != ESP_OK as i32 {
            warn!("ledc{}: timer config at {} Hz failed (rc={})", self.channel, freq_hz, ret);
            return Err(PeripheralError::InvalidConfig("ledc frequency"));
        }
        Ok(())
    }

    fn apply_duty(&self) -> Result<(), PeripheralError> {
        let max = (1u32 << RESOLUTION_BITS) - 1;
        let counts = (self.duty_percent / 100.0 * max as f32).round() as u32;
        // SAFETY: channel configured in `open`.
        let ret = unsafe {
            let r = ledc_set_duty(SPEED_MODE, self.channel, counts);
            if r == ESP_OK as i32 {
                ledc_update_duty(SPEED_MODE, self.channel)
            } else {
                r
            }
        };
        if ret != ESP_OK as i32 {
            return Err(PeripheralError::IoFailure);
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), PeripheralError> {
        if self.open {
            Ok(())
        } else {
            Err(PeripheralError::IoFailure)
        }
    }
}

impl PwmOutput for EspLedc {
    fn set_frequency_hz(&mut self, hz: f32) -> Result<(), PeripheralError> {
        self.ensure_open()?;
        if !(hz > 0.0) {
            return Err(PeripheralError::InvalidConfig("frequency"));
        }
        let whole = reachable_frequency_hz(hz, CLK_SRC_HZ, RESOLUTION_BITS);
        if whole as f32 != hz {
            warn!("ledc{}: {} Hz not reachable, running at {} Hz", self.channel, hz, whole);
        }
        self.configure_timer(whole)
    }

    fn set_duty_cycle(&mut self, percent: f32) -> Result<(), PeripheralError> {
        check_duty(percent)?;
        self.ensure_open()?;
        self.duty_percent = percent;
        if self.enabled {
            self.apply_duty()?;
        }
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), PeripheralError> {
        self.ensure_open()?;
        if enabled {
            self.apply_duty()?;
        } else {
            // SAFETY: channel configured in `open`.
            let ret = unsafe { ledc_stop(SPEED_MODE, self.channel, 0) };
            if ret != ESP_OK as i32 {
                return Err(PeripheralError::IoFailure);
            }
        }
        self.enabled = enabled;
        Ok(())
    }

    fn close(&mut self) -> Result<(), PeripheralError> {
        if !self.open {
            return Ok(());
        }
        // SAFETY: channel configured in `open`; the pin is returned to its
        // reset state afterwards.
        unsafe {
            ledc_stop(SPEED_MODE, self.channel, 0);
            gpio_reset_pin(self.gpio);
        }
        self.open = false;
        self.enabled = false;
        info!("ledc{}: closed", self.channel);
        Ok(())
    }
}

impl Drop for EspLedc {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
