//! Focus-session records as exchanged with the session backend.
//!
//! Field names are snake_case to match the REST payloads
//! (`user_id`, `start_time`, `duration_seconds`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::timer::TimerMode;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an open session is closed. Only terminal statuses can be written
/// by `end_session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Cancelled,
}

impl From<SessionOutcome> for SessionStatus {
    fn from(outcome: SessionOutcome) -> Self {
        match outcome {
            SessionOutcome::Completed => SessionStatus::Completed,
            SessionOutcome::Cancelled => SessionStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Focus,
    Break,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Focus => "focus",
            SessionType::Break => "break",
        }
    }
}

impl From<TimerMode> for SessionType {
    fn from(mode: TimerMode) -> Self {
        if mode.is_break() {
            SessionType::Break
        } else {
            SessionType::Focus
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FocusSession {
    pub id: String,
    pub user_id: String,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub planned_seconds: u64,
    pub duration_seconds: u64,
}

/// Create payload. The record starts `in_progress` with no end time.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewSession {
    pub id: String,
    pub user_id: String,
    pub session_type: SessionType,
    pub start_time: DateTime<Utc>,
    pub planned_seconds: u64,
}

impl NewSession {
    pub fn into_record(self) -> FocusSession {
        FocusSession {
            id: self.id,
            user_id: self.user_id,
            session_type: self.session_type,
            status: SessionStatus::InProgress,
            start_time: self.start_time,
            end_time: None,
            planned_seconds: self.planned_seconds,
            duration_seconds: 0,
        }
    }
}

/// Update payload; applied once, when the session reaches a terminal status.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionPatch {
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionQuery {
    pub user_id: String,
    pub since: Option<DateTime<Utc>>,
    pub status: Option<SessionStatus>,
    pub limit: Option<usize>,
}

impl SessionQuery {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            since: None,
            status: None,
            limit: None,
        }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, session: &FocusSession) -> bool {
        session.user_id == self.user_id
            && self.since.map_or(true, |since| session.start_time >= since)
            && self.status.map_or(true, |status| session.status == status)
    }
}
