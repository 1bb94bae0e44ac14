//! In-memory peripherals for host runs and integration tests.
//!
//! [`SimPeripherals`] implements [`PeripheralManager`] with one UART, one
//! PWM channel, and any number of GPIOs.  Every handle shares its state with
//! a probe ([`SimSerialBus`], [`SimPwmProbe`], [`SimGpioProbe`]) so the far
//! side of the wire can inject RX bytes, read back TX bytes, and arm
//! one-shot faults while the service owns the handle.
//!
//! Nothing here blocks: a read on an empty RX buffer returns 0.

use core::convert::Infallible;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::app::ports::{
    DataAvailableNotifier, GpioOutput, PeripheralManager, PwmOutput, SerialPort, check_duty,
};
use crate::config::SerialSettings;
use crate::error::PeripheralError;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Poll `cond` every millisecond until it holds or `timeout` elapses.
fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

// ═══════════════════════════════════════════════════════════════
//  Serial
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct SerialState {
    open: bool,
    opens: usize,
    closes: usize,
    settings: Option<SerialSettings>,
    notifier: Option<DataAvailableNotifier>,
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    writes: Vec<usize>,
    write_limit: Option<usize>,
    reject_config: bool,
    fail_next_read: bool,
    fail_next_write: bool,
}

/// Service-side UART handle.
pub struct SimSerialPort {
    state: Arc<Mutex<SerialState>>,
}

impl SerialPort for SimSerialPort {
    fn configure(&mut self, settings: &SerialSettings) -> Result<(), PeripheralError> {
        let mut s = lock(&self.state);
        if !s.open {
            return Err(PeripheralError::IoFailure);
        }
        if s.reject_config {
            return Err(PeripheralError::InvalidConfig("rejected by driver"));
        }
        if settings.baud_rate == 0 {
            return Err(PeripheralError::InvalidConfig("baud rate"));
        }
        if !(5..=8).contains(&settings.data_bits) {
            return Err(PeripheralError::InvalidConfig("data bits"));
        }
        if !(1..=2).contains(&settings.stop_bits) {
            return Err(PeripheralError::InvalidConfig("stop bits"));
        }
        s.settings = Some(*settings);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, PeripheralError> {
        let mut s = lock(&self.state);
        if !s.open || core::mem::take(&mut s.fail_next_read) {
            return Err(PeripheralError::IoFailure);
        }
        let n = buf.len().min(s.rx.len());
        for (slot, byte) in buf.iter_mut().zip(s.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, PeripheralError> {
        let mut s = lock(&self.state);
        if !s.open || core::mem::take(&mut s.fail_next_write) {
            return Err(PeripheralError::IoFailure);
        }
        let n = data.len().min(s.write_limit.unwrap_or(usize::MAX));
        s.tx.extend_from_slice(&data[..n]);
        s.writes.push(n);
        Ok(n)
    }

    fn register_data_available(
        &mut self,
        notifier: DataAvailableNotifier,
    ) -> Result<(), PeripheralError> {
        let mut s = lock(&self.state);
        if !s.open {
            return Err(PeripheralError::IoFailure);
        }
        s.notifier = Some(notifier);
        Ok(())
    }

    fn unregister_data_available(&mut self) {
        lock(&self.state).notifier = None;
    }

    fn close(&mut self) -> Result<(), PeripheralError> {
        let mut s = lock(&self.state);
        if s.open {
            s.open = false;
            s.notifier = None;
            s.closes += 1;
        }
        Ok(())
    }
}

impl Drop for SimSerialPort {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Far side of the simulated UART.
#[derive(Clone)]
pub struct SimSerialBus {
    state: Arc<Mutex<SerialState>>,
}

impl SimSerialBus {
    /// Put bytes in the RX buffer without signalling.
    pub fn push_rx(&self, bytes: &[u8]) {
        lock(&self.state).rx.extend(bytes.iter().copied());
    }

    /// Put bytes in the RX buffer and fire the data-available notification.
    pub fn deliver(&self, bytes: &[u8]) {
        self.push_rx(bytes);
        self.notify();
    }

    /// Fire the data-available notification if one is registered.
    pub fn notify(&self) {
        let notifier = lock(&self.state).notifier.clone();
        if let Some(n) = notifier {
            n.on_data_available();
        }
    }

    /// Report an asynchronous driver error through the notifier.
    pub fn raise_error(&self, code: i32) {
        let notifier = lock(&self.state).notifier.clone();
        if let Some(n) = notifier {
            n.on_error(code);
        }
    }

    pub fn tx(&self) -> Vec<u8> {
        lock(&self.state).tx.clone()
    }

    /// Size of every accepted write, in order.
    pub fn writes(&self) -> Vec<usize> {
        lock(&self.state).writes.clone()
    }

    pub fn rx_pending(&self) -> usize {
        lock(&self.state).rx.len()
    }

    pub fn settings(&self) -> Option<SerialSettings> {
        lock(&self.state).settings
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }

    pub fn is_listening(&self) -> bool {
        let s = lock(&self.state);
        s.open && s.notifier.is_some()
    }

    pub fn opens(&self) -> usize {
        lock(&self.state).opens
    }

    pub fn closes(&self) -> usize {
        lock(&self.state).closes
    }

    /// Accept at most `limit` bytes per write call.
    pub fn limit_writes(&self, limit: usize) {
        lock(&self.state).write_limit = Some(limit);
    }

    pub fn reject_config(&self) {
        lock(&self.state).reject_config = true;
    }

    pub fn fail_next_read(&self) {
        lock(&self.state).fail_next_read = true;
    }

    pub fn fail_next_write(&self) {
        lock(&self.state).fail_next_write = true;
    }

    /// Wait until at least `len` bytes have been transmitted.
    pub fn wait_for_tx(&self, len: usize, timeout: Duration) -> bool {
        wait_until(timeout, || lock(&self.state).tx.len() >= len)
    }
}

// ═══════════════════════════════════════════════════════════════
//  PWM
// ═══════════════════════════════════════════════════════════════

/// One `set_duty_cycle` call as seen by the PWM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyWrite {
    pub at: Instant,
    pub percent: f32,
    pub accepted: bool,
}

#[derive(Default)]
struct PwmState {
    open: bool,
    closes: usize,
    frequency_hz: Option<f32>,
    enabled: bool,
    writes: Vec<DutyWrite>,
    fail_next_duty: bool,
}

/// Service-side PWM handle.
pub struct SimPwm {
    state: Arc<Mutex<PwmState>>,
}

impl PwmOutput for SimPwm {
    fn set_frequency_hz(&mut self, hz: f32) -> Result<(), PeripheralError> {
        let mut s = lock(&self.state);
        if !s.open {
            return Err(PeripheralError::IoFailure);
        }
        if !(hz > 0.0) {
            return Err(PeripheralError::InvalidConfig("frequency"));
        }
        s.frequency_hz = Some(hz);
        Ok(())
    }

    fn set_duty_cycle(&mut self, percent: f32) -> Result<(), PeripheralError> {
        check_duty(percent)?;
        let mut s = lock(&self.state);
        let accepted = s.open && !core::mem::take(&mut s.fail_next_duty);
        s.writes.push(DutyWrite {
            at: Instant::now(),
            percent,
            accepted,
        });
        if accepted {
            Ok(())
        } else {
            Err(PeripheralError::IoFailure)
        }
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), PeripheralError> {
        let mut s = lock(&self.state);
        if !s.open {
            return Err(PeripheralError::IoFailure);
        }
        s.enabled = enabled;
        Ok(())
    }

    fn close(&mut self) -> Result<(), PeripheralError> {
        let mut s = lock(&self.state);
        if s.open {
            s.open = false;
            s.enabled = false;
            s.closes += 1;
        }
        Ok(())
    }
}

impl Drop for SimPwm {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Observer for the simulated PWM channel.
#[derive(Clone)]
pub struct SimPwmProbe {
    state: Arc<Mutex<PwmState>>,
}

impl SimPwmProbe {
    /// Accepted duty values, in order.
    pub fn duties(&self) -> Vec<f32> {
        lock(&self.state)
            .writes
            .iter()
            .filter(|w| w.accepted)
            .map(|w| w.percent)
            .collect()
    }

    /// Every duty write, accepted or not.
    pub fn writes(&self) -> Vec<DutyWrite> {
        lock(&self.state).writes.clone()
    }

    pub fn frequency_hz(&self) -> Option<f32> {
        lock(&self.state).frequency_hz
    }

    pub fn is_enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    pub fn closes(&self) -> usize {
        lock(&self.state).closes
    }

    /// Make the next duty write fail with `IoFailure`.
    pub fn fail_next_duty(&self) {
        lock(&self.state).fail_next_duty = true;
    }

    /// Wait until at least `count` duty writes were accepted.
    pub fn wait_for_duties(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || {
            lock(&self.state).writes.iter().filter(|w| w.accepted).count() >= count
        })
    }

    /// Wait until at least `count` duty writes were attempted.
    pub fn wait_for_writes(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || lock(&self.state).writes.len() >= count)
    }
}

// ═══════════════════════════════════════════════════════════════
//  GPIO
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct GpioState {
    open: bool,
    levels: Vec<bool>,
}

/// Service-side GPIO output.
pub struct SimGpio {
    state: Arc<Mutex<GpioState>>,
}

impl embedded_hal::digital::ErrorType for SimGpio {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for SimGpio {
    fn set_low(&mut self) -> Result<(), Infallible> {
        lock(&self.state).levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        lock(&self.state).levels.push(true);
        Ok(())
    }
}

impl Drop for SimGpio {
    fn drop(&mut self) {
        lock(&self.state).open = false;
    }
}

/// Observer for one simulated GPIO.
#[derive(Clone)]
pub struct SimGpioProbe {
    state: Arc<Mutex<GpioState>>,
}

impl SimGpioProbe {
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Last level written, if any.
    pub fn level(&self) -> Option<bool> {
        lock(&self.state).levels.last().copied()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Manager
// ═══════════════════════════════════════════════════════════════

/// Host peripheral manager.  Any name opens unless marked unavailable.
#[derive(Default)]
pub struct SimPeripherals {
    serial: Arc<Mutex<SerialState>>,
    pwm: Arc<Mutex<PwmState>>,
    gpios: HashMap<String, Arc<Mutex<GpioState>>>,
    unavailable: HashSet<String>,
}

impl SimPeripherals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `open_*(name)` fail with `PeripheralUnavailable`.
    pub fn set_unavailable(&mut self, name: &str) {
        self.unavailable.insert(name.to_owned());
    }

    pub fn serial(&self) -> SimSerialBus {
        SimSerialBus {
            state: self.serial.clone(),
        }
    }

    pub fn pwm(&self) -> SimPwmProbe {
        SimPwmProbe {
            state: self.pwm.clone(),
        }
    }

    /// Probe for the GPIO called `name`; `None` if it was never opened.
    pub fn gpio(&self, name: &str) -> Option<SimGpioProbe> {
        self.gpios.get(name).map(|state| SimGpioProbe {
            state: state.clone(),
        })
    }

    fn check(&self, name: &str) -> Result<(), PeripheralError> {
        if self.unavailable.contains(name) {
            Err(PeripheralError::PeripheralUnavailable)
        } else {
            Ok(())
        }
    }
}

impl PeripheralManager for SimPeripherals {
    fn open_serial(&mut self, name: &str) -> Result<Box<dyn SerialPort>, PeripheralError> {
        self.check(name)?;
        let mut s = lock(&self.serial);
        if s.open {
            return Err(PeripheralError::PeripheralUnavailable);
        }
        s.open = true;
        s.opens += 1;
        s.settings = None;
        drop(s);
        Ok(Box::new(SimSerialPort {
            state: self.serial.clone(),
        }))
    }

    fn open_pwm(&mut self, name: &str) -> Result<Box<dyn PwmOutput>, PeripheralError> {
        self.check(name)?;
        let mut s = lock(&self.pwm);
        if s.open {
            return Err(PeripheralError::PeripheralUnavailable);
        }
        s.open = true;
        drop(s);
        Ok(Box::new(SimPwm {
            state: self.pwm.clone(),
        }))
    }

    fn open_gpio(&mut self, name: &str) -> Result<Box<dyn GpioOutput>, PeripheralError> {
        self.check(name)?;
        let state = self.gpios.entry(name.to_owned()).or_default();
        let mut s = lock(state);
        if s.open {
            return Err(PeripheralError::PeripheralUnavailable);
        }
        s.open = true;
        drop(s);
        Ok(Box::new(SimGpio {
            state: state.clone(),
        }))
    }
}
