//! Application core: echo and heartbeat logic, zero I/O.
//!
//! All interaction with hardware happens through the **port traits** in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod events;
pub mod heartbeat;
pub mod ports;
pub mod service;
pub mod transfer;
