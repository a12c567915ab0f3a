use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};

use crate::db::{
    helpers::{
        format_datetime, parse_datetime, parse_optional_datetime, parse_session_type, parse_status,
        to_i64, to_u64,
    },
    Database,
};
use crate::session::{
    FocusSession, NewSession, SessionBackend, SessionPatch, SessionQuery, SessionStatus,
};

const SESSION_COLUMNS: &str =
    "id, user_id, session_type, status, start_time, end_time, planned_seconds, duration_seconds";

fn row_to_session(row: &Row) -> Result<FocusSession> {
    let session_type: String = row.get("session_type")?;
    let status: String = row.get("status")?;
    let start_time: String = row.get("start_time")?;
    let end_time: Option<String> = row.get("end_time")?;
    let planned_seconds: i64 = row.get("planned_seconds")?;
    let duration_seconds: i64 = row.get("duration_seconds")?;

    Ok(FocusSession {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        session_type: parse_session_type(&session_type)?,
        status: parse_status(&status)?,
        start_time: parse_datetime(&start_time, "start_time")?,
        end_time: parse_optional_datetime(end_time, "end_time")?,
        planned_seconds: to_u64(planned_seconds, "planned_seconds")?,
        duration_seconds: to_u64(duration_seconds, "duration_seconds")?,
    })
}

fn load_session(conn: &Connection, session_id: &str) -> Result<Option<FocusSession>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM focus_sessions WHERE id = ?1"
    ))?;

    let mut rows = stmt.query(params![session_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_session(row)?)),
        None => Ok(None),
    }
}

impl SessionBackend for Database {
    async fn create_session(&self, session: NewSession) -> Result<FocusSession> {
        self.execute(move |conn| {
            let now = format_datetime(&Utc::now());
            conn.execute(
                "INSERT INTO focus_sessions
                    (id, user_id, session_type, status, start_time, end_time, planned_seconds, duration_seconds, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, 0, ?7, ?7)",
                params![
                    session.id,
                    session.user_id,
                    session.session_type.as_str(),
                    SessionStatus::InProgress.as_str(),
                    format_datetime(&session.start_time),
                    to_i64(session.planned_seconds)?,
                    now,
                ],
            )?;

            load_session(conn, &session.id)?
                .ok_or_else(|| anyhow!("session {} vanished after insert", session.id))
        })
        .await
    }

    async fn update_session(&self, session_id: &str, patch: SessionPatch) -> Result<FocusSession> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE focus_sessions
                 SET status = ?1,
                     end_time = ?2,
                     duration_seconds = ?3,
                     updated_at = ?4
                 WHERE id = ?5 AND status = 'in_progress'",
                params![
                    patch.status.as_str(),
                    format_datetime(&patch.end_time),
                    to_i64(patch.duration_seconds)?,
                    format_datetime(&Utc::now()),
                    session_id,
                ],
            )?;

            if rows_affected == 0 {
                let current: Option<String> = conn
                    .query_row(
                        "SELECT status FROM focus_sessions WHERE id = ?1",
                        params![session_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                match current {
                    Some(status) => bail!("session {session_id} is already {status}"),
                    None => bail!("session {session_id} not found"),
                }
            }

            load_session(conn, &session_id)?
                .ok_or_else(|| anyhow!("session {session_id} not found"))
        })
        .await
    }

    async fn list_sessions(&self, query: SessionQuery) -> Result<Vec<FocusSession>> {
        self.execute(move |conn| {
            let mut sql = format!("SELECT {SESSION_COLUMNS} FROM focus_sessions WHERE user_id = ?");
            let mut values = vec![Value::Text(query.user_id.clone())];

            if let Some(since) = query.since {
                sql.push_str(" AND start_time >= ?");
                values.push(Value::Text(format_datetime(&since)));
            }
            if let Some(status) = query.status {
                sql.push_str(" AND status = ?");
                values.push(Value::Text(status.as_str().to_string()));
            }
            sql.push_str(" ORDER BY start_time DESC, rowid DESC");
            if let Some(limit) = query.limit {
                sql.push_str(" LIMIT ?");
                values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
            }

            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(values))?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::session::SessionType;

    fn open_db(dir: &tempfile::TempDir) -> Database {
        Database::new(dir.path().join("sessions.sqlite3")).unwrap()
    }

    fn new_session(id: &str, user: &str, minutes_ago: i64) -> NewSession {
        NewSession {
            id: id.into(),
            user_id: user.into(),
            session_type: SessionType::Focus,
            start_time: Utc::now() - Duration::minutes(minutes_ago),
            planned_seconds: 1_500,
        }
    }

    fn patch(status: SessionStatus, duration_seconds: u64) -> SessionPatch {
        SessionPatch {
            end_time: Utc::now(),
            status,
            duration_seconds,
        }
    }

    #[tokio::test]
    async fn create_then_close_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        let created = db.create_session(new_session("s1", "u", 0)).await.unwrap();
        assert_eq!(created.status, SessionStatus::InProgress);
        assert_eq!(created.duration_seconds, 0);
        assert!(created.end_time.is_none());

        let closed = db
            .update_session("s1", patch(SessionStatus::Cancelled, 900))
            .await
            .unwrap();
        assert_eq!(closed.status, SessionStatus::Cancelled);
        assert_eq!(closed.duration_seconds, 900);
        assert!(closed.end_time.is_some());

        let again = db
            .update_session("s1", patch(SessionStatus::Completed, 1_500))
            .await;
        assert!(again.unwrap_err().to_string().contains("already cancelled"));

        let missing = db
            .update_session("nope", patch(SessionStatus::Completed, 1))
            .await;
        assert!(missing.unwrap_err().to_string().contains("not found"));
    }

    #[tokio::test]
    async fn list_filters_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        db.create_session(new_session("old", "u", 120)).await.unwrap();
        db.create_session(new_session("mid", "u", 60)).await.unwrap();
        db.create_session(new_session("new", "u", 1)).await.unwrap();
        db.create_session(new_session("foreign", "v", 1)).await.unwrap();
        db.update_session("mid", patch(SessionStatus::Completed, 1_500))
            .await
            .unwrap();

        let all = db.list_sessions(SessionQuery::for_user("u")).await.unwrap();
        let ids: Vec<_> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["new", "mid", "old"]);

        let recent = db
            .list_sessions(SessionQuery::for_user("u").since(Utc::now() - Duration::minutes(90)))
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);

        let completed = db
            .list_sessions(SessionQuery::for_user("u").with_status(SessionStatus::Completed))
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, "mid");

        let limited = db
            .list_sessions(SessionQuery::for_user("u").limit(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = open_db(&dir);
            db.create_session(new_session("kept", "u", 0)).await.unwrap();
        }

        let db = open_db(&dir);
        let sessions = db.list_sessions(SessionQuery::for_user("u")).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].planned_seconds, 1_500);
        assert!(db.path().ends_with("sessions.sqlite3"));
    }
}
