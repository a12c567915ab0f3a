use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};

use super::backend::SessionBackend;
use super::models::{FocusSession, NewSession, SessionPatch, SessionQuery};

/// In-process session store, used for `FOCUSCYCLE_EPHEMERAL` runs.
#[derive(Clone, Default)]
pub struct MemorySessions {
    records: Arc<Mutex<Vec<FocusSession>>>,
}

impl MemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<FocusSession> {
        self.lock().clone()
    }

    pub fn get(&self, session_id: &str) -> Option<FocusSession> {
        self.lock().iter().find(|s| s.id == session_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FocusSession>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SessionBackend for MemorySessions {
    async fn create_session(&self, session: NewSession) -> Result<FocusSession> {
        let mut records = self.lock();
        if records.iter().any(|s| s.id == session.id) {
            bail!("session {} already exists", session.id);
        }
        let record = session.into_record();
        records.push(record.clone());
        Ok(record)
    }

    async fn update_session(&self, session_id: &str, patch: SessionPatch) -> Result<FocusSession> {
        let mut records = self.lock();
        let record = records
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| anyhow!("session {session_id} not found"))?;

        if record.status.is_terminal() {
            bail!("session {session_id} is already {}", record.status);
        }

        record.status = patch.status;
        record.end_time = Some(patch.end_time);
        record.duration_seconds = patch.duration_seconds;
        Ok(record.clone())
    }

    async fn list_sessions(&self, query: SessionQuery) -> Result<Vec<FocusSession>> {
        let mut sessions: Vec<FocusSession> = self
            .lock()
            .iter()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();

        // Stable sort keeps insertion order for equal start times; reverse
        // so the newest insert wins ties.
        sessions.reverse();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        if let Some(limit) = query.limit {
            sessions.truncate(limit);
        }
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::session::models::{SessionStatus, SessionType};

    fn new_session(id: &str, user: &str, minutes_ago: i64) -> NewSession {
        NewSession {
            id: id.into(),
            user_id: user.into(),
            session_type: SessionType::Focus,
            start_time: Utc::now() - Duration::minutes(minutes_ago),
            planned_seconds: 1_500,
        }
    }

    #[tokio::test]
    async fn terminal_sessions_are_immutable() {
        let store = MemorySessions::new();
        store.create_session(new_session("a", "u", 0)).await.unwrap();

        let patch = SessionPatch {
            end_time: Utc::now(),
            status: SessionStatus::Completed,
            duration_seconds: 1_500,
        };
        let updated = store.update_session("a", patch.clone()).await.unwrap();
        assert_eq!(updated.status, SessionStatus::Completed);

        let second = SessionPatch {
            status: SessionStatus::Cancelled,
            ..patch
        };
        assert!(store.update_session("a", second).await.is_err());
        assert_eq!(store.get("a").unwrap().status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn listing_is_scoped_and_newest_first() {
        let store = MemorySessions::new();
        store.create_session(new_session("old", "u", 90)).await.unwrap();
        store.create_session(new_session("new", "u", 5)).await.unwrap();
        store.create_session(new_session("other", "v", 1)).await.unwrap();

        let all = store
            .list_sessions(SessionQuery::for_user("u"))
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["new", "old"]);

        let recent = store
            .list_sessions(SessionQuery::for_user("u").since(Utc::now() - Duration::minutes(30)))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);

        let limited = store
            .list_sessions(SessionQuery::for_user("u").limit(1))
            .await
            .unwrap();
        assert_eq!(limited[0].id, "new");
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = MemorySessions::new();
        store.create_session(new_session("a", "u", 0)).await.unwrap();
        assert!(store.create_session(new_session("a", "u", 0)).await.is_err());
    }
}
