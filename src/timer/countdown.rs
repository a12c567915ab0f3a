//! Single countdown driven by an anchor instant.
//!
//! Remaining time is never decremented in place: it is derived from the
//! remaining value frozen at the last start/pause plus the time elapsed
//! since then, so a late or skipped tick does not accumulate drift.

use std::time::Duration;

use tokio::time::Instant;

use super::{TimerError, TimerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Idle,
    Running { remaining_secs: u64 },
    /// Reported once, on the tick that observes zero.
    Completed,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    status: TimerStatus,
    duration_ms: u64,
    /// Remaining time when `running_anchor` was taken; the frozen value
    /// while idle or paused.
    remaining_ms_baseline: u64,
    running_anchor: Option<Instant>,
}

impl Countdown {
    pub fn new(duration_secs: u64) -> Self {
        let duration_ms = duration_secs.saturating_mul(1000);
        Self {
            status: TimerStatus::Idle,
            duration_ms,
            remaining_ms_baseline: duration_ms,
            running_anchor: None,
        }
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_ms / 1000
    }

    pub fn remaining_ms(&self, now: Instant) -> u64 {
        match (self.status, self.running_anchor) {
            (TimerStatus::Running, Some(anchor)) => {
                let elapsed = now.saturating_duration_since(anchor);
                self.remaining_ms_baseline
                    .saturating_sub(elapsed.as_millis() as u64)
            }
            _ => self.remaining_ms_baseline,
        }
    }

    /// Whole seconds left, rounded up so a fresh 25:00 countdown reads
    /// 1500 until a full second has passed.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        self.remaining_ms(now).div_ceil(1000)
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        Duration::from_millis(self.remaining_ms(now))
    }

    /// Returns `Ok(false)` when already running.
    pub fn start(&mut self, now: Instant) -> Result<bool, TimerError> {
        if self.status == TimerStatus::Running {
            return Ok(false);
        }
        if self.remaining_ms_baseline == 0 {
            return Err(TimerError::Exhausted);
        }
        self.status = TimerStatus::Running;
        self.running_anchor = Some(now);
        Ok(true)
    }

    pub fn pause(&mut self, now: Instant) -> bool {
        if self.status != TimerStatus::Running {
            return false;
        }
        self.remaining_ms_baseline = self.remaining_ms(now);
        self.running_anchor = None;
        self.status = TimerStatus::Paused;
        true
    }

    pub fn reset(&mut self, duration_secs: u64) {
        *self = Self::new(duration_secs);
    }

    pub fn tick(&mut self, now: Instant) -> Tick {
        if self.status != TimerStatus::Running {
            return Tick::Idle;
        }

        let remaining = self.remaining_ms(now);
        if remaining == 0 {
            self.status = TimerStatus::Idle;
            self.remaining_ms_baseline = 0;
            self.running_anchor = None;
            return Tick::Completed;
        }

        Tick::Running {
            remaining_secs: remaining.div_ceil(1000),
        }
    }
}
