use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};

use super::countdown::Countdown;
use super::cycle::CycleTracker;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    #[default]
    Focus,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    pub fn is_break(self) -> bool {
        matches!(self, TimerMode::ShortBreak | TimerMode::LongBreak)
    }

    pub fn label(self) -> &'static str {
        match self {
            TimerMode::Focus => "focus",
            TimerMode::ShortBreak => "short break",
            TimerMode::LongBreak => "long break",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimerMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "focus" | "pomodoro" | "work" => Ok(TimerMode::Focus),
            "short" | "short-break" | "shortbreak" => Ok(TimerMode::ShortBreak),
            "long" | "long-break" | "longbreak" => Ok(TimerMode::LongBreak),
            other => Err(anyhow!("unknown timer mode '{other}'")),
        }
    }
}

/// A focus session whose record is still `in_progress` on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSession {
    pub id: String,
    pub planned_secs: u64,
}

/// Ephemeral runtime state. Rebuilt on every launch; nothing here is
/// persisted directly.
#[derive(Debug)]
pub struct TimerState {
    pub mode: TimerMode,
    pub countdown: Countdown,
    pub cycles: CycleTracker,
    pub open_session: Option<OpenSession>,
}

impl TimerState {
    pub fn new(focus_secs: u64) -> Self {
        Self {
            mode: TimerMode::Focus,
            countdown: Countdown::new(focus_secs),
            cycles: CycleTracker::default(),
            open_session: None,
        }
    }

    pub fn status(&self) -> TimerStatus {
        self.countdown.status()
    }

    pub fn is_active(&self) -> bool {
        self.status() != TimerStatus::Idle
    }

    /// Put the machine in `Idle(mode, full)`.
    pub fn load_mode(&mut self, mode: TimerMode, duration_secs: u64) {
        self.mode = mode;
        self.countdown.reset(duration_secs);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub status: TimerStatus,
    pub mode: TimerMode,
    pub remaining_secs: u64,
    pub duration_secs: u64,
    pub completed_cycles: u32,
    pub cycle_position: u32,
    pub long_break_interval: u32,
    pub session_id: Option<String>,
}
