//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements          | Connects to                 |
//! |---------------|---------------------|-----------------------------|
//! | `log_sink`    | EventSink           | Serial log output           |
//! | `sim`         | PeripheralManager   | In-memory UART/PWM/GPIO     |
//! | `uart`        | SerialPort          | ESP-IDF UART driver + queue |
//! | `ledc`        | PwmOutput           | ESP-IDF LEDC timer/channel  |
//! | `gpio`        | GpioOutput          | ESP-IDF GPIO output         |
//! | `peripherals` | PeripheralManager   | Board names → the above     |

pub mod log_sink;
pub mod sim;

#[cfg(target_os = "espidf")]
pub mod gpio;
#[cfg(target_os = "espidf")]
pub mod ledc;
#[cfg(target_os = "espidf")]
pub mod peripherals;
#[cfg(target_os = "espidf")]
pub mod uart;
