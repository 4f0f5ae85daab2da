//! Keyed session storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::model::{UserId, UserSession};

/// Storage for in-progress form sessions, keyed by user.
///
/// At most one session exists per user; `set` replaces it wholesale.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session, or `None` when the user is not filling the form.
    async fn get(&self, user_id: UserId) -> Option<UserSession>;

    /// Replace the session for `session.user_id`.
    async fn set(&self, session: UserSession);

    /// Remove the session, returning the user to menu mode.
    async fn clear(&self, user_id: UserId);

    /// Number of open sessions.
    async fn len(&self) -> usize;
}

/// Process-local session store. Sessions are lost on restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<UserId, UserSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user_id: UserId) -> Option<UserSession> {
        self.sessions.read().await.get(&user_id).cloned()
    }

    async fn set(&self, session: UserSession) {
        self.sessions.write().await.insert(session.user_id, session);
    }

    async fn clear(&self, user_id: UserId) {
        self.sessions.write().await.remove(&user_id);
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
