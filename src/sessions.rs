//! In-memory session registry for the HTTP server.
//!
//! Each [`Session`] sits behind its own async mutex, so requests against one
//! session are serialized while different sessions proceed independently.
//! Nothing is persisted; a session lives until it is deleted or the process
//! exits.

use std::collections::HashMap;
use std::sync::Arc;

use docchat_core::Session;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub type SharedSession = Arc<Mutex<Session>>;

#[derive(Default, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` and return its id.
    pub async fn insert(&self, session: Session) -> Uuid {
        let id = session.id();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Drop a session. Returns `false` if it did not exist.
    pub async fn remove(&self, id: &Uuid) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
