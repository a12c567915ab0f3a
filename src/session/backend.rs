use std::future::Future;

use anyhow::Result;

use super::models::{FocusSession, NewSession, SessionPatch, SessionQuery};

/// The three calls the timer makes against its session store: create
/// (POST), patch by id (PATCH) and list newest-first (GET).
///
/// `update_session` must refuse to touch a record that already has a
/// terminal status.
pub trait SessionBackend: Clone + Send + Sync + 'static {
    fn create_session(
        &self,
        session: NewSession,
    ) -> impl Future<Output = Result<FocusSession>> + Send;

    fn update_session(
        &self,
        session_id: &str,
        patch: SessionPatch,
    ) -> impl Future<Output = Result<FocusSession>> + Send;

    fn list_sessions(
        &self,
        query: SessionQuery,
    ) -> impl Future<Output = Result<Vec<FocusSession>>> + Send;
}
