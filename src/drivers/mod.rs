//! Peripheral helpers shared by the service and its worker.

pub mod ledc_timing;
pub mod status_led;
pub mod task_pin;
