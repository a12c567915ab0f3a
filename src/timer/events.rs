use serde::Serialize;

use crate::session::SessionStatus;

use super::{TimerMode, TimerSnapshot};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Everything a front end needs to render the timer. Delivered over a
/// broadcast channel; slow receivers may lag and should resync from the
/// next `StateChanged`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimerEvent {
    StateChanged(TimerSnapshot),
    #[serde(rename_all = "camelCase")]
    Tick {
        mode: TimerMode,
        remaining_secs: u64,
    },
    #[serde(rename_all = "camelCase")]
    IntervalFinished {
        finished: TimerMode,
        next: TimerMode,
        skipped: bool,
        auto_start: bool,
    },
    #[serde(rename_all = "camelCase")]
    SessionRecorded {
        session_id: String,
        status: SessionStatus,
        duration_seconds: u64,
    },
    Notification {
        level: NoticeLevel,
        message: String,
    },
}
