use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::{
    error::{IntakeError, Result},
    session::ChatId,
    session::IntakeSession,
};

/// How long a snapshot waits for an in-flight transition by default
pub const DEFAULT_SNAPSHOT_WAIT: Duration = Duration::from_secs(2);

/// Exclusive handle on one chat's session; released on drop
pub type SessionGuard = OwnedMutexGuard<IntakeSession>;

/// Trait for storing intake sessions with per-chat mutual exclusion
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get-or-create the session for `chat_id` and hold it exclusively.
    ///
    /// A second `lock` for the same chat waits until the first guard drops;
    /// other chats are unaffected.
    async fn lock(&self, chat_id: ChatId) -> Result<SessionGuard>;

    /// Copy of the current session, `None` if the chat never sent an event.
    ///
    /// Fails with [`IntakeError::SessionUnavailable`] when a transition keeps
    /// the session locked for longer than the store is willing to wait.
    async fn snapshot(&self, chat_id: ChatId) -> Result<Option<IntakeSession>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory implementation of SessionStore
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<ChatId, Arc<Mutex<IntakeSession>>>>,
    snapshot_wait: Duration,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_snapshot_wait(DEFAULT_SNAPSHOT_WAIT)
    }

    pub fn with_snapshot_wait(snapshot_wait: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            snapshot_wait,
        }
    }

    fn slot(&self, chat_id: ChatId) -> Arc<Mutex<IntakeSession>> {
        // The map shard lock is released at the end of this statement,
        // before anyone awaits the per-chat mutex.
        self.sessions
            .entry(chat_id)
            .or_insert_with(|| {
                debug!(%chat_id, "creating intake session");
                Arc::new(Mutex::new(IntakeSession::new()))
            })
            .clone()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn lock(&self, chat_id: ChatId) -> Result<SessionGuard> {
        Ok(self.slot(chat_id).lock_owned().await)
    }

    async fn snapshot(&self, chat_id: ChatId) -> Result<Option<IntakeSession>> {
        let slot = self.sessions.get(&chat_id).map(|entry| entry.clone());
        let Some(slot) = slot else {
            return Ok(None);
        };
        match tokio::time::timeout(self.snapshot_wait, slot.lock()).await {
            Ok(session) => Ok(Some(session.clone())),
            Err(_) => Err(IntakeError::SessionUnavailable(chat_id)),
        }
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}
