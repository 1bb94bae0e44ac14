//! Worker context: the single thread every loopback callback runs on.
//!
//! The eager startup drain, every data-available notification, and every
//! heartbeat tick are serialized here, so the transfer engine and the
//! heartbeat never interleave their steps and neither needs a lock.
//!
//! ```text
//!  ┌──────────────┐  try_send(Job)   ┌──────────────────────────────────┐
//!  │ UART driver  │────────────────▶│  Worker thread                    │
//!  │ (notifier)   │    JobQueue      │  futures_lite::block_on           │
//!  └──────────────┘                  │  ┌────────────────────────────┐  │
//!  ┌──────────────┐   stop signal    │  │ edge_executor::LocalExecutor│  │
//!  │ Service stop │────────────────▶│  │  job_loop ── TransferEngine │  │
//!  └──────────────┘                  │  │  heartbeat_loop ── Timer    │  │
//!                                    │  └────────────────────────────┘  │
//!                                    └──────────────────────────────────┘
//! ```
//!
//! The worker owns the serial port and PWM output while it runs.  On
//! shutdown the executor is dropped with both loops inside it, so the
//! pending heartbeat timer never fires.  The worker then unregisters and
//! closes the serial port itself and hands the rest of its state back to
//! the caller through the join handle.

use core::cell::RefCell;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::{debug, error, info, warn};

use crate::app::events::{AppEvent, ServiceStats, StartReport};
use crate::app::heartbeat::{HeartbeatController, HeartbeatState};
use crate::app::ports::{DataAvailableSink, EventSink, PwmOutput, SerialPort};
use crate::app::transfer::TransferEngine;
use crate::drivers::task_pin::{Core, TaskSpec, spawn_on_core};

/// Worker thread placement.  Core 1 keeps the echo path away from the
/// protocol stacks on core 0.
pub const WORKER_TASK: TaskSpec = TaskSpec {
    core: Core::App,
    priority: 5,
    stack_kb: 32,
    name: "loopback-io\0",
};

/// Depth of the job queue.  A queued [`Job::Transfer`] drains everything
/// buffered, so a full queue loses nothing but duplicate passes.
pub const JOB_DEPTH: usize = 8;

/// Units of work posted to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Run one drain pass.
    Transfer,
    /// The serial driver reported an error code.
    SerialError(i32),
}

/// Queue between the notification sink and the worker.
pub type JobQueue = Channel<CriticalSectionRawMutex, Job, JOB_DEPTH>;

type StopSignal = Signal<CriticalSectionRawMutex, ()>;

// ── Notification sink ────────────────────────────────────────

/// The data-available sink registered with the serial port.  Posts a
/// [`Job::Transfer`] to the worker; never touches the port itself.
///
/// Never blocks the caller.  Once the worker has exited, posts sit in the
/// queue unread.
pub struct TransferTrigger {
    jobs: Arc<JobQueue>,
}

impl TransferTrigger {
    pub fn new(jobs: Arc<JobQueue>) -> Self {
        Self { jobs }
    }
}

impl DataAvailableSink for TransferTrigger {
    fn on_data_available(&self) {
        if self.jobs.try_send(Job::Transfer).is_err() {
            debug!("worker: queue full, drain already pending");
        }
    }

    fn on_error(&self, code: i32) {
        if self.jobs.try_send(Job::SerialError(code)).is_err() {
            warn!("worker: queue full, serial error {} dropped", code);
        }
    }
}

// ── Worker state ─────────────────────────────────────────────

/// Everything the worker owns while running.
pub struct WorkerState {
    pub serial: Option<Box<dyn SerialPort>>,
    pub pwm: Option<Box<dyn PwmOutput>>,
    pub engine: TransferEngine,
    pub heartbeat: HeartbeatController,
    pub sink: Box<dyn EventSink>,
    pub stats: ServiceStats,
}

impl WorkerState {
    fn handle(&mut self, job: Job) {
        match job {
            Job::Transfer => self.transfer(),
            Job::SerialError(code) => self.sink.emit(&AppEvent::SerialError(code)),
        }
    }

    fn transfer(&mut self) {
        let Some(serial) = self.serial.as_mut() else {
            return;
        };

        self.stats.transfer_passes += 1;
        match self.engine.transfer_all(&mut **serial) {
            Ok(report) => {
                self.stats.bytes_echoed += report.bytes as u64;
                if report.bytes > 0 {
                    self.sink.emit(&AppEvent::Transferred {
                        bytes: report.bytes,
                        chunks: report.chunks,
                    });
                }
            }
            Err(aborted) => {
                self.stats.bytes_echoed += aborted.echoed as u64;
                self.stats.aborted_passes += 1;
                self.sink.emit(&AppEvent::TransferAborted {
                    echoed: aborted.echoed,
                    cause: aborted.cause,
                });
            }
        }
    }

    /// Fire one heartbeat tick.  Returns `true` if the next tick should be
    /// scheduled.
    fn heartbeat_tick(&mut self) -> bool {
        let Some(pwm) = self.pwm.as_mut() else {
            return false;
        };
        let Some(outcome) = self.heartbeat.tick(&mut **pwm) else {
            return false;
        };

        self.stats.heartbeat_ticks = self.heartbeat.ticks();
        self.stats.failed_duty_writes = self.heartbeat.failed_writes();
        self.stats.last_duty = outcome.duty;
        match outcome.error {
            None => self.sink.emit(&AppEvent::HeartbeatTick {
                tick: outcome.tick,
                duty: outcome.duty,
            }),
            Some(cause) => self.sink.emit(&AppEvent::HeartbeatWriteFailed {
                tick: outcome.tick,
                duty: outcome.duty,
                cause,
            }),
        }
        true
    }

    fn close_serial(&mut self) {
        if let Some(mut serial) = self.serial.take() {
            serial.unregister_data_available();
            if let Err(e) = serial.close() {
                warn!("worker: serial close failed: {}", e);
            }
        }
    }

    /// Disable and close the PWM output, if one is held.
    pub fn close_pwm(&mut self) {
        if let Some(mut pwm) = self.pwm.take() {
            if let Err(e) = pwm.close() {
                warn!("worker: PWM close failed: {}", e);
            }
        }
    }

    /// Close every handle the worker would have owned.  Used when the
    /// worker never got to run.
    pub fn release(&mut self) {
        self.close_serial();
        self.close_pwm();
        self.heartbeat.cancel();
    }
}

// ── Tasks ────────────────────────────────────────────────────

async fn job_loop(state: &RefCell<WorkerState>, jobs: &JobQueue) {
    loop {
        let job = jobs.receive().await;
        state.borrow_mut().handle(job);
    }
}

async fn heartbeat_loop(state: &RefCell<WorkerState>, period: Duration) {
    while state.borrow_mut().heartbeat_tick() {
        async_io_mini::Timer::after(period).await;
    }
}

/// Body of the worker thread.  Returns once `stop` is signalled.
fn run(
    state: WorkerState,
    jobs: &JobQueue,
    stop: &StopSignal,
    period: Duration,
    report: StartReport,
) -> WorkerState {
    let state = RefCell::new(state);
    state.borrow_mut().sink.emit(&AppEvent::Started(report));
    let beating = state.borrow().heartbeat.state() == HeartbeatState::Scheduled;

    {
        let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
        executor.spawn(job_loop(&state, jobs)).detach();
        if beating {
            executor.spawn(heartbeat_loop(&state, period)).detach();
        }
        futures_lite::future::block_on(executor.run(stop.wait()));
        // Dropping the executor drops both loops and the pending timer.
    }

    let mut state = state.into_inner();
    // Jobs posted before the stop still run.
    while let Ok(job) = jobs.try_receive() {
        state.handle(job);
    }
    state.close_serial();
    state.heartbeat.cancel();
    debug!("worker: exited");
    state
}

/// Returned when the worker thread could not be created.  Carries the
/// state back so its handles can be closed.
pub struct SpawnFailed {
    pub error: io::Error,
    pub state: Option<WorkerState>,
}

/// Handle to a running worker thread.
pub struct Worker {
    stop: Arc<StopSignal>,
    handle: JoinHandle<Option<WorkerState>>,
}

impl Worker {
    /// Start the worker on its own thread.  Jobs already in `jobs` run
    /// first, in order.  [`AppEvent::Started`] carrying `report` is the
    /// first event the worker emits.
    pub fn spawn(
        task: TaskSpec,
        state: WorkerState,
        jobs: Arc<JobQueue>,
        period: Duration,
        report: StartReport,
    ) -> Result<Self, SpawnFailed> {
        let stop = Arc::new(StopSignal::new());
        let slot = Arc::new(Mutex::new(Some(state)));

        let handoff = Arc::clone(&slot);
        let worker_stop = Arc::clone(&stop);
        let spawned = spawn_on_core(task, move || {
            let state = handoff.lock().ok().and_then(|mut slot| slot.take())?;
            Some(run(state, &jobs, &worker_stop, period, report))
        });

        match spawned {
            Ok(handle) => {
                info!("worker: started (heartbeat every {}ms)", period.as_millis());
                Ok(Self { stop, handle })
            }
            Err(error) => {
                let state = slot.lock().ok().and_then(|mut slot| slot.take());
                Err(SpawnFailed { error, state })
            }
        }
    }

    /// Stop the worker and wait for it.  Jobs queued before the shutdown
    /// still run; the pending heartbeat tick does not.  Returns `None` if the
    /// worker thread panicked.
    pub fn shutdown(self) -> Option<WorkerState> {
        self.stop.signal(());
        match self.handle.join() {
            Ok(state) => state,
            Err(_) => {
                error!("worker: thread panicked; peripherals dropped without close");
                None
            }
        }
    }
}
