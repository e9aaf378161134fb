//! DashMap-based process session storage implementation.
//!
//! Provides lock-free concurrent access to process sessions using `DashMap`.
//! Sessions are stored behind `Arc` so a lookup hands out a cheap clone that
//! stays valid even if the entry is evicted while the caller still reads it.

use std::sync::Arc;

use dashmap::DashMap;

use crate::mcp::process::ProcessSession;

use super::traits::SessionStorage;

/// DashMap-based implementation of `SessionStorage`.
pub struct DashMapSessionStorage {
    sessions: DashMap<String, Arc<ProcessSession>>,
}

impl DashMapSessionStorage {
    /// Create a new session storage instance.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

impl Default for DashMapSessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStorage for DashMapSessionStorage {
    fn insert(&self, session: Arc<ProcessSession>) {
        self.sessions.insert(session.id().to_string(), session);
    }

    fn get(&self, session_id: &str) -> Option<Arc<ProcessSession>> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    fn remove_if(
        &self,
        session_id: &str,
        predicate: &dyn Fn(&ProcessSession) -> bool,
    ) -> Option<Arc<ProcessSession>> {
        self.sessions
            .remove_if(session_id, |_, session| predicate(session))
            .map(|(_, session)| session)
    }

    fn list(&self) -> Vec<Arc<ProcessSession>> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}
