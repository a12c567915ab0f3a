use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::timer::{NoticeLevel, OpenSession, TimerEvent, TimerMode};

use super::{
    backend::SessionBackend,
    models::{FocusSession, NewSession, SessionOutcome, SessionPatch, SessionQuery, SessionStatus},
    stats::{counts_as_completed_focus, start_of_local_day, DailyProgress},
};

const ENABLE_LOGS: bool = true;

/// How long past its planned end an `in_progress` record must be before
/// startup recovery treats it as abandoned. Covers long pauses.
pub const ORPHAN_GRACE_SECS: u64 = 12 * 60 * 60;

use crate::{log_debug, log_error, log_info, log_warn};

/// Creates and closes focus-session records for one user.
///
/// Creation is awaited so a failed start can be rolled back. Closing runs
/// in the background: the countdown never waits on the network, and
/// failures only surface as `Notification` events.
pub struct SessionRecorder<B: SessionBackend> {
    backend: B,
    user_id: String,
    events: broadcast::Sender<TimerEvent>,
    writes: TaskTracker,
}

impl<B: SessionBackend> SessionRecorder<B> {
    pub fn new(backend: B, user_id: impl Into<String>, events: broadcast::Sender<TimerEvent>) -> Self {
        Self {
            backend,
            user_id: user_id.into(),
            events,
            writes: TaskTracker::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn start_session(&self, mode: TimerMode, planned_secs: u64) -> Result<OpenSession> {
        let new_session = NewSession {
            id: Uuid::new_v4().to_string(),
            user_id: self.user_id.clone(),
            session_type: mode.into(),
            start_time: Utc::now(),
            planned_seconds: planned_secs,
        };

        let record = self
            .backend
            .create_session(new_session)
            .await
            .context("failed to create focus session")?;

        log_info!("Session {} started ({} planned seconds)", record.id, planned_secs);

        Ok(OpenSession {
            id: record.id,
            planned_secs,
        })
    }

    /// Close `open` without blocking the caller. `duration_seconds` is the
    /// planned length minus what was left on the clock.
    pub fn end_session(
        &self,
        open: OpenSession,
        outcome: SessionOutcome,
        remaining_secs: u64,
    ) -> JoinHandle<()> {
        let patch = SessionPatch {
            end_time: Utc::now(),
            status: outcome.into(),
            duration_seconds: open.planned_secs.saturating_sub(remaining_secs),
        };
        let backend = self.backend.clone();
        let events = self.events.clone();

        self.writes.spawn(async move {
            match backend.update_session(&open.id, patch).await {
                Ok(record) => {
                    log_info!(
                        "Session {} closed as {} after {}s",
                        record.id,
                        record.status,
                        record.duration_seconds
                    );
                    let _ = events.send(TimerEvent::SessionRecorded {
                        session_id: record.id,
                        status: record.status,
                        duration_seconds: record.duration_seconds,
                    });
                }
                Err(err) => {
                    // The record stays in_progress until the next startup sweep.
                    log_error!("Failed to close session {}: {err:#}", open.id);
                    let _ = events.send(TimerEvent::Notification {
                        level: NoticeLevel::Error,
                        message: format!("Could not save session result: {err}"),
                    });
                }
            }
        })
    }

    /// Wait for every pending `end_session` write.
    pub async fn flush(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<FocusSession>> {
        self.backend
            .list_sessions(SessionQuery::for_user(self.user_id.clone()).limit(limit))
            .await
            .context("failed to load session history")
    }

    pub async fn completed_focus_since(&self, since: DateTime<Utc>) -> Result<u32> {
        let sessions = self
            .backend
            .list_sessions(
                SessionQuery::for_user(self.user_id.clone())
                    .since(since)
                    .with_status(SessionStatus::Completed),
            )
            .await
            .context("failed to count completed sessions")?;

        Ok(sessions.iter().filter(|s| counts_as_completed_focus(s)).count() as u32)
    }

    pub async fn completed_focus_today(&self) -> Result<u32> {
        self.completed_focus_since(start_of_local_day(Utc::now()))
            .await
    }

    pub async fn today_progress(&self, goal: u32) -> Result<DailyProgress> {
        let now = Utc::now();
        let sessions = self
            .backend
            .list_sessions(SessionQuery::for_user(self.user_id.clone()).since(start_of_local_day(now)))
            .await
            .context("failed to load today's sessions")?;

        Ok(DailyProgress::from_sessions(
            now.with_timezone(&chrono::Local).date_naive(),
            &sessions,
            goal,
        ))
    }

    /// Close records left `in_progress` by a previous run that never got
    /// to patch them. They are marked cancelled with the planned length as
    /// duration.
    ///
    /// Another client of the same user may still be running a session, so
    /// only records older than their planned length plus
    /// [`ORPHAN_GRACE_SECS`] are touched.
    pub async fn recover_orphans(&self, now: DateTime<Utc>) -> Result<usize> {
        let orphans = self
            .backend
            .list_sessions(
                SessionQuery::for_user(self.user_id.clone()).with_status(SessionStatus::InProgress),
            )
            .await
            .context("failed to look up unfinished sessions")?;

        let mut recovered = 0;
        for session in orphans {
            let elapsed = (now - session.start_time).num_seconds().max(0) as u64;
            if elapsed < session.planned_seconds.saturating_add(ORPHAN_GRACE_SECS) {
                log_debug!("Session {} may still be live; leaving it open", session.id);
                continue;
            }
            let patch = SessionPatch {
                end_time: now,
                status: SessionStatus::Cancelled,
                duration_seconds: elapsed.min(session.planned_seconds),
            };
            match self.backend.update_session(&session.id, patch).await {
                Ok(_) => {
                    log_warn!("Recovered unfinished session {}; marked cancelled", session.id);
                    recovered += 1;
                }
                Err(err) => log_error!("Failed to recover session {}: {err:#}", session.id),
            }
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::session::MemorySessions;

    fn recorder(store: &MemorySessions) -> (SessionRecorder<MemorySessions>, broadcast::Receiver<TimerEvent>) {
        let (tx, rx) = broadcast::channel(16);
        (SessionRecorder::new(store.clone(), "user-1", tx), rx)
    }

    #[tokio::test]
    async fn start_creates_in_progress_record() {
        let store = MemorySessions::new();
        let (recorder, _rx) = recorder(&store);

        let open = recorder.start_session(TimerMode::Focus, 1_500).await.unwrap();
        let record = store.get(&open.id).unwrap();

        assert_eq!(record.status, SessionStatus::InProgress);
        assert_eq!(record.user_id, "user-1");
        assert_eq!(record.planned_seconds, 1_500);
        assert!(record.end_time.is_none());
    }

    #[tokio::test]
    async fn end_writes_elapsed_duration() {
        let store = MemorySessions::new();
        let (recorder, mut rx) = recorder(&store);

        let open = recorder.start_session(TimerMode::Focus, 1_500).await.unwrap();
        let id = open.id.clone();
        recorder
            .end_session(open, SessionOutcome::Cancelled, 600)
            .await
            .unwrap();

        let record = store.get(&id).unwrap();
        assert_eq!(record.status, SessionStatus::Cancelled);
        assert_eq!(record.duration_seconds, 900);
        assert!(record.end_time.is_some());

        match rx.recv().await.unwrap() {
            TimerEvent::SessionRecorded { session_id, status, duration_seconds } => {
                assert_eq!(session_id, id);
                assert_eq!(status, SessionStatus::Cancelled);
                assert_eq!(duration_seconds, 900);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_end_is_reported_not_raised() {
        let store = MemorySessions::new();
        let (recorder, mut rx) = recorder(&store);

        let missing = OpenSession {
            id: "missing".into(),
            planned_secs: 60,
        };
        recorder.end_session(missing, SessionOutcome::Completed, 0);
        recorder.flush().await;

        match rx.recv().await.unwrap() {
            TimerEvent::Notification { level, .. } => assert_eq!(level, NoticeLevel::Error),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn duration_is_floored_at_zero() {
        let store = MemorySessions::new();
        let (recorder, _rx) = recorder(&store);

        let open = recorder.start_session(TimerMode::Focus, 60).await.unwrap();
        let id = open.id.clone();
        recorder.end_session(open, SessionOutcome::Completed, 90);
        recorder.flush().await;

        assert_eq!(store.get(&id).unwrap().duration_seconds, 0);
    }

    #[tokio::test]
    async fn orphans_are_cancelled_with_capped_duration() {
        let store = MemorySessions::new();
        let (recorder, _rx) = recorder(&store);

        store
            .create_session(NewSession {
                id: "stale".into(),
                user_id: "user-1".into(),
                session_type: TimerMode::Focus.into(),
                start_time: Utc::now() - Duration::hours(13),
                planned_seconds: 1_500,
            })
            .await
            .unwrap();
        store
            .create_session(NewSession {
                id: "recent".into(),
                user_id: "user-1".into(),
                session_type: TimerMode::Focus.into(),
                start_time: Utc::now() - Duration::minutes(10),
                planned_seconds: 1_500,
            })
            .await
            .unwrap();

        let recovered = recorder.recover_orphans(Utc::now()).await.unwrap();
        assert_eq!(recovered, 1);

        let stale = store.get("stale").unwrap();
        assert_eq!(stale.status, SessionStatus::Cancelled);
        assert_eq!(stale.duration_seconds, 1_500);

        // Could belong to another running client.
        let recent = store.get("recent").unwrap();
        assert_eq!(recent.status, SessionStatus::InProgress);
        assert!(recent.end_time.is_none());
    }

    #[tokio::test]
    async fn orphan_grace_covers_long_pauses() {
        let store = MemorySessions::new();
        let (recorder, _rx) = recorder(&store);
        let start = Utc::now() - Duration::hours(6);

        store
            .create_session(NewSession {
                id: "paused".into(),
                user_id: "user-1".into(),
                session_type: TimerMode::Focus.into(),
                start_time: start,
                planned_seconds: 1_500,
            })
            .await
            .unwrap();

        assert_eq!(recorder.recover_orphans(Utc::now()).await.unwrap(), 0);

        let grace = Duration::seconds((1_500 + ORPHAN_GRACE_SECS) as i64);
        assert_eq!(recorder.recover_orphans(start + grace).await.unwrap(), 1);
        assert_eq!(store.get("paused").unwrap().status, SessionStatus::Cancelled);
    }

    #[tokio::test]
    async fn today_counts_completed_focus_only() {
        let store = MemorySessions::new();
        let (recorder, _rx) = recorder(&store);

        for outcome in [SessionOutcome::Completed, SessionOutcome::Completed, SessionOutcome::Cancelled] {
            let open = recorder.start_session(TimerMode::Focus, 1_500).await.unwrap();
            recorder.end_session(open, outcome, 0);
        }
        recorder.flush().await;

        assert_eq!(recorder.completed_focus_today().await.unwrap(), 2);

        let progress = recorder.today_progress(4).await.unwrap();
        assert_eq!(progress.completed_sessions, 2);
        assert_eq!(progress.focus_seconds, 3_000);
        assert_eq!(recorder.history(10).await.unwrap().len(), 3);
    }
}
