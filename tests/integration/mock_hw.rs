//! Shared fixtures for integration tests.
//!
//! Wraps the simulated peripherals with a recording event sink so tests can
//! assert on everything the service reported, in order.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use loopback::adapters::sim::SimPeripherals;
use loopback::app::events::AppEvent;
use loopback::app::ports::EventSink;
use loopback::app::service::LoopbackService;
use loopback::board::{BoardDefaults, Esp32S3DevKit};
use loopback::config::LoopbackConfig;

/// Upper bound on any wait for the worker thread.
pub const WAIT: Duration = Duration::from_secs(5);

// ── Recording sink ────────────────────────────────────────────

/// Event sink that keeps every event.  Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<AppEvent>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }

    /// Poll until an event matching `pred` has been recorded.
    pub fn wait_for(&self, pred: impl Fn(&AppEvent) -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if self.count(&pred) > 0 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── Fixtures ──────────────────────────────────────────────────

/// Default configuration with the heartbeat period shortened to `ms`.
pub fn config_with_period(ms: u32) -> LoopbackConfig {
    LoopbackConfig {
        heartbeat_period_ms: ms,
        ..LoopbackConfig::default()
    }
}

/// A not-yet-started service on the DevKit names, its simulated board, and
/// a sink to hand to `start`.
pub fn make_service(config: LoopbackConfig) -> (LoopbackService, SimPeripherals, RecordingSink) {
    let svc = LoopbackService::new(config, Esp32S3DevKit.names());
    (svc, SimPeripherals::new(), RecordingSink::new())
}

/// Start a service with a heartbeat slow enough to stay out of the way.
pub fn started() -> (LoopbackService, SimPeripherals, RecordingSink) {
    let (mut svc, mut sim, sink) = make_service(config_with_period(60_000));
    svc.start(&mut sim, sink.clone()).unwrap();
    (svc, sim, sink)
}
