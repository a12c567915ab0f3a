use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use super::models::{FocusSession, SessionStatus, SessionType};

/// Today's completed focus work measured against the daily goal.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyProgress {
    pub date: NaiveDate,
    pub completed_sessions: u32,
    pub focus_seconds: u64,
    pub goal: u32,
}

impl DailyProgress {
    pub fn from_sessions(date: NaiveDate, sessions: &[FocusSession], goal: u32) -> Self {
        let completed: Vec<&FocusSession> = sessions
            .iter()
            .filter(|s| counts_as_completed_focus(s))
            .collect();

        Self {
            date,
            completed_sessions: completed.len() as u32,
            focus_seconds: completed.iter().map(|s| s.duration_seconds).sum(),
            goal,
        }
    }

    pub fn goal_reached(&self) -> bool {
        self.completed_sessions >= self.goal
    }

    pub fn percent(&self) -> u32 {
        if self.goal == 0 {
            return 100;
        }
        (self.completed_sessions.saturating_mul(100) / self.goal).min(100)
    }
}

pub fn counts_as_completed_focus(session: &FocusSession) -> bool {
    session.session_type == SessionType::Focus && session.status == SessionStatus::Completed
}

/// Local midnight of the day containing `now`, as UTC.
pub fn start_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let local_date = now.with_timezone(&Local).date_naive();
    local_date
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        // Midnight skipped by a DST jump; fall back to the UTC day.
        .unwrap_or_else(|| {
            now.date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc())
                .unwrap_or(now)
        })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn session(status: SessionStatus, session_type: SessionType, secs: u64) -> FocusSession {
        FocusSession {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: "u".into(),
            session_type,
            status,
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            planned_seconds: 1_500,
            duration_seconds: secs,
        }
    }

    #[test]
    fn only_completed_focus_sessions_count() {
        let sessions = vec![
            session(SessionStatus::Completed, SessionType::Focus, 1_500),
            session(SessionStatus::Completed, SessionType::Focus, 1_200),
            session(SessionStatus::Cancelled, SessionType::Focus, 900),
            session(SessionStatus::InProgress, SessionType::Focus, 0),
            session(SessionStatus::Completed, SessionType::Break, 300),
        ];

        let today = Local::now().date_naive();
        let progress = DailyProgress::from_sessions(today, &sessions, 4);

        assert_eq!(progress.completed_sessions, 2);
        assert_eq!(progress.focus_seconds, 2_700);
        assert_eq!(progress.percent(), 50);
        assert!(!progress.goal_reached());
    }

    #[test]
    fn percent_caps_at_one_hundred() {
        let sessions: Vec<_> = (0..5)
            .map(|_| session(SessionStatus::Completed, SessionType::Focus, 60))
            .collect();
        let progress = DailyProgress::from_sessions(Local::now().date_naive(), &sessions, 3);

        assert!(progress.goal_reached());
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn day_start_is_not_after_now() {
        let now = Utc::now();
        let start = start_of_local_day(now);

        assert!(start <= now);
        assert!(now - start < Duration::hours(25));
    }
}
