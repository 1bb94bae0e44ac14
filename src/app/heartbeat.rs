//! Heartbeat controller: a PWM duty ramp that shows the service is alive.
//!
//! Every tick adds the configured step to a duty counter, wraps it to 0 once
//! it passes the ceiling, and applies it to the PWM output.  The worker
//! reschedules the next tick unconditionally: a failed duty write is logged
//! and counted, never a reason to stop the ramp.
//!
//! ```text
//!   Idle ──schedule──▶ Scheduled ──fire──▶ Running ──reschedule──┐
//!    ▲                     ▲                                      │
//!    └──────cancel─────────┴──────────────────────────────────────┘
//! ```

use log::warn;

use crate::config::LoopbackConfig;
use crate::error::PeripheralError;

use super::ports::PwmOutput;

/// Duty-cycle accumulator, always within `[0, ceiling]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyCounter {
    value: f32,
    step: f32,
    ceiling: f32,
}

impl DutyCounter {
    pub fn new(step: f32, ceiling: f32) -> Self {
        Self {
            value: 0.0,
            step,
            ceiling,
        }
    }

    /// Step forward, wrapping to 0 once the ceiling is exceeded.
    pub fn advance(&mut self) -> f32 {
        self.value += self.step;
        if self.value > self.ceiling {
            self.value = 0.0;
        }
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

/// Scheduling state of the heartbeat task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatState {
    Idle,
    Scheduled,
    Running,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    /// 1-based tick number.
    pub tick: u64,
    /// Duty the tick tried to apply.
    pub duty: f32,
    /// Set if the PWM rejected the write.
    pub error: Option<PeripheralError>,
}

/// Self-rescheduling duty ramp.  Owns the [`DutyCounter`].
pub struct HeartbeatController {
    counter: DutyCounter,
    state: HeartbeatState,
    ticks: u64,
    failed_writes: u64,
}

impl HeartbeatController {
    pub fn new(config: &LoopbackConfig) -> Self {
        Self {
            counter: DutyCounter::new(config.duty_step_percent, config.duty_ceiling_percent),
            state: HeartbeatState::Idle,
            ticks: 0,
            failed_writes: 0,
        }
    }

    /// Arm the first tick.  No-op unless idle.
    pub fn schedule(&mut self) {
        if self.state == HeartbeatState::Idle {
            self.state = HeartbeatState::Scheduled;
        }
    }

    /// Drop back to idle; a pending tick will not fire.
    pub fn cancel(&mut self) {
        self.state = HeartbeatState::Idle;
    }

    /// Fire one tick against `pwm`.  Returns `None` if the task is idle
    /// (cancelled), otherwise the tick outcome with the task rescheduled.
    pub fn tick(&mut self, pwm: &mut dyn PwmOutput) -> Option<TickOutcome> {
        if self.state == HeartbeatState::Idle {
            return None;
        }
        self.state = HeartbeatState::Running;
        self.ticks += 1;

        let duty = self.counter.advance();
        let error = pwm.set_duty_cycle(duty).err();
        if let Some(e) = error {
            self.failed_writes += 1;
            warn!("heartbeat: tick {} duty {:.0}% not applied: {}", self.ticks, duty, e);
        }

        self.state = HeartbeatState::Scheduled;
        Some(TickOutcome {
            tick: self.ticks,
            duty,
            error,
        })
    }

    pub fn state(&self) -> HeartbeatState {
        self.state
    }

    pub fn duty(&self) -> f32 {
        self.counter.value()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn failed_writes(&self) -> u64 {
        self.failed_writes
    }
}
