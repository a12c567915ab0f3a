use crate::settings::TimerSettings;

use super::TimerMode;

/// Counts completed focus intervals and picks what comes after each one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleTracker {
    completed_focus: u32,
}

impl CycleTracker {
    /// Seeded from persisted history, since the in-memory count does not
    /// survive a restart.
    pub fn with_completed(completed_focus: u32) -> Self {
        Self { completed_focus }
    }

    pub fn completed(&self) -> u32 {
        self.completed_focus
    }

    pub fn position(&self, long_break_interval: u32) -> u32 {
        self.completed_focus % long_break_interval.max(1)
    }

    /// Record that `finished` ran out (or was skipped) and return the mode
    /// that follows it.
    pub fn complete(&mut self, finished: TimerMode, settings: &TimerSettings) -> TimerMode {
        match finished {
            TimerMode::Focus => {
                self.completed_focus = self.completed_focus.saturating_add(1);
                if self.completed_focus % settings.long_break_interval.max(1) == 0 {
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                }
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => TimerMode::Focus,
        }
    }
}

pub fn should_auto_start(next: TimerMode, settings: &TimerSettings) -> bool {
    if next.is_break() {
        settings.auto_start_breaks
    } else {
        settings.auto_start_focus
    }
}
