//! UART loopback firmware library.
//!
//! Exposes the echo/heartbeat core, its port traits, and the host
//! simulation adapters for integration testing.  All ESP-IDF-specific code
//! is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod board;
pub mod config;
pub mod drivers;
pub mod error;
pub mod worker;
