//! ESP-IDF UART adapter.
//!
//! Installs the UART driver with an event queue and implements
//! [`SerialPort`] on top of it.  While a notifier is registered, a watcher
//! thread drains the event queue and forwards `UART_DATA` as a
//! data-available notification and overflow/framing events as errors.
//! The watcher never reads the port; all reads happen on the caller's
//! context with a zero-tick timeout, so an empty buffer returns 0.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use esp_idf_hal::delay::TickType;
use esp_idf_svc::sys::*;
use log::{debug, info, warn};

use crate::app::ports::{DataAvailableNotifier, SerialPort};
use crate::config::{Parity, SerialSettings};
use crate::drivers::task_pin::{Core, TaskSpec, spawn_on_core};
use crate::error::PeripheralError;

const RX_BUFFER_LEN: i32 = 2048;
const TX_BUFFER_LEN: i32 = 2048;
const EVENT_QUEUE_LEN: i32 = 20;

/// How long the watcher blocks on the queue before rechecking its stop flag.
const WATCH_PERIOD_MS: u64 = 100;

const WATCHER_TASK: TaskSpec = TaskSpec {
    core: Core::Pro,
    priority: 6,
    stack_kb: 4,
    name: "uart-events\0",
};

/// FreeRTOS queue handle owned by the installed driver.
#[derive(Clone, Copy)]
struct EventQueue(QueueHandle_t);

// SAFETY: FreeRTOS queues are designed for cross-task use; the handle is
// only dereferenced by xQueueReceive.
unsafe impl Send for EventQueue {}

struct Watcher {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct EspUart {
    port: uart_port_t,
    queue: EventQueue,
    open: bool,
    watcher: Option<Watcher>,
}

impl EspUart {
    /// Install the driver on `port` and route it to `tx_gpio`/`rx_gpio`.
    pub fn open(port: uart_port_t, tx_gpio: i32, rx_gpio: i32) -> Result<Self, PeripheralError> {
        let mut queue: QueueHandle_t = core::ptr::null_mut();
        // SAFETY: `queue` outlives the call; the driver writes the handle once.
        let ret = unsafe {
            uart_driver_install(
                port,
                RX_BUFFER_LEN,
                TX_BUFFER_LEN,
                EVENT_QUEUE_LEN,
                &mut queue,
                0,
            )
        };
        if ret != ESP_OK as i32 {
            warn!("uart{}: driver install failed (rc={})", port, ret);
            return Err(PeripheralError::PeripheralUnavailable);
        }

        // SAFETY: driver installed above.
        let ret = unsafe { uart_set_pin(port, tx_gpio, rx_gpio, -1, -1) };
        if ret != ESP_OK as i32 {
            // SAFETY: undo the install on the same port.
            unsafe { uart_driver_delete(port) };
            warn!("uart{}: pin routing failed (rc={})", port, ret);
            return Err(PeripheralError::InvalidConfig("uart pins"));
        }

        info!("uart{}: open (tx={}, rx={})", port, tx_gpio, rx_gpio);
        Ok(Self {
            port,
            queue: EventQueue(queue),
            open: true,
            watcher: None,
        })
    }

    fn ensure_open(&self) -> Result<(), PeripheralError> {
        if self.open {
            Ok(())
        } else {
            Err(PeripheralError::IoFailure)
        }
    }
}

fn word_length(bits: u8) -> Result<uart_word_length_t, PeripheralError> {
    match bits {
        5 => Ok(uart_word_length_t_UART_DATA_5_BITS),
        6 => Ok(uart_word_length_t_UART_DATA_6_BITS),
        7 => Ok(uart_word_length_t_UART_DATA_7_BITS),
        8 => Ok(uart_word_length_t_UART_DATA_8_BITS),
        _ => Err(PeripheralError::InvalidConfig("data bits")),
    }
}

fn stop_bits(bits: u8) -> Result<uart_stop_bits_t, PeripheralError> {
    match bits {
        1 => Ok(uart_stop_bits_t_UART_STOP_BITS_1),
        2 => Ok(uart_stop_bits_t_UART_STOP_BITS_2),
        _ => Err(PeripheralError::InvalidConfig("stop bits")),
    }
}

fn parity(p: Parity) -> uart_parity_t {
    match p {
        Parity::None => uart_parity_t_UART_PARITY_DISABLE,
        Parity::Even => uart_parity_t_UART_PARITY_EVEN,
        Parity::Odd => uart_parity_t_UART_PARITY_ODD,
    }
}

impl SerialPort for EspUart {
    fn configure(&mut self, settings: &SerialSettings) -> Result<(), PeripheralError> {
        self.ensure_open()?;
        if settings.baud_rate == 0 {
            return Err(PeripheralError::InvalidConfig("baud rate"));
        }
        let cfg = uart_config_t {
            baud_rate: settings.baud_rate as i32,
            data_bits: word_length(settings.data_bits)?,
            parity: parity(settings.parity),
            stop_bits: stop_bits(settings.stop_bits)?,
            flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
            ..Default::default()
        };
        // SAFETY: driver is installed while `open` holds.
        let ret = unsafe { uart_param_config(self.port, &cfg) };
        if ret != ESP_OK as i32 {
            return Err(PeripheralError::InvalidConfig("uart params"));
        }
        debug!(
            "uart{}: {} {}{:?}{}",
            self.port, settings.baud_rate, settings.data_bits, settings.parity, settings.stop_bits
        );
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, PeripheralError> {
        self.ensure_open()?;
        // SAFETY: `buf` is valid for `buf.len()` bytes; zero-tick timeout.
        let n = unsafe { uart_read_bytes(self.port, buf.as_mut_ptr().cast(), buf.len() as u32, 0) };
        if n < 0 {
            return Err(PeripheralError::IoFailure);
        }
        Ok(n as usize)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, PeripheralError> {
        self.ensure_open()?;
        // SAFETY: `data` is valid for `data.len()` bytes; the driver copies it
        // into its TX ring before returning.
        let n = unsafe { uart_write_bytes(self.port, data.as_ptr().cast(), data.len()) };
        if n < 0 {
            return Err(PeripheralError::IoFailure);
        }
        Ok(n as usize)
    }

    fn register_data_available(
        &mut self,
        notifier: DataAvailableNotifier,
    ) -> Result<(), PeripheralError> {
        self.ensure_open()?;
        self.unregister_data_available();

        let stop = Arc::new(AtomicBool::new(false));
        let queue = self.queue;
        let port = self.port;
        let flag = stop.clone();
        let handle = spawn_on_core(WATCHER_TASK, move || watch(port, queue, &flag, &notifier))
            .map_err(|e| {
                warn!("uart{}: watcher spawn failed: {}", port, e);
                PeripheralError::IoFailure
            })?;
        self.watcher = Some(Watcher { stop, handle });
        Ok(())
    }

    fn unregister_data_available(&mut self) {
        if let Some(w) = self.watcher.take() {
            w.stop.store(true, Ordering::Release);
            if w.handle.join().is_err() {
                warn!("uart{}: watcher panicked", self.port);
            }
        }
    }

    fn close(&mut self) -> Result<(), PeripheralError> {
        if !self.open {
            return Ok(());
        }
        self.unregister_data_available();
        // SAFETY: watcher joined; nothing else touches the driver.
        let ret = unsafe { uart_driver_delete(self.port) };
        self.open = false;
        if ret != ESP_OK as i32 {
            return Err(PeripheralError::IoFailure);
        }
        info!("uart{}: closed", self.port);
        Ok(())
    }
}

impl Drop for EspUart {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Event-queue loop.  Runs until `stop` is set.
fn watch(port: uart_port_t, queue: EventQueue, stop: &AtomicBool, notifier: &DataAvailableNotifier) {
    let ticks = TickType::new_millis(WATCH_PERIOD_MS).ticks();
    while !stop.load(Ordering::Acquire) {
        let mut event = uart_event_t::default();
        // SAFETY: `event` is a valid uart_event_t-sized buffer; the queue
        // stays alive until the driver is deleted, which happens only after
        // this thread is joined.
        let got = unsafe { xQueueReceive(queue.0, (&raw mut event).cast(), ticks) };
        if got == 0 {
            continue;
        }

        #[allow(non_upper_case_globals)]
        match event.type_ {
            uart_event_type_t_UART_DATA => notifier.on_data_available(),
            uart_event_type_t_UART_FIFO_OVF | uart_event_type_t_UART_BUFFER_FULL => {
                // SAFETY: flushing RX is safe while the driver is installed.
                unsafe { uart_flush_input(port) };
                notifier.on_error(event.type_ as i32);
            }
            uart_event_type_t_UART_PARITY_ERR | uart_event_type_t_UART_FRAME_ERR => {
                notifier.on_error(event.type_ as i32);
            }
            _ => {}
        }
    }
}
