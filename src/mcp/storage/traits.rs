//! Storage trait definitions for process sessions and search jobs.
//!
//! The registries own the existence and indexing of their entities through
//! these traits; the entities themselves carry their own synchronized state.

use std::sync::Arc;

use crate::mcp::process::ProcessSession;
use crate::mcp::search::SearchJob;

/// Trait for process session storage operations.
///
/// Implementations must be thread-safe (`Send + Sync`) for use across
/// async tasks. The default implementation uses `DashMap` for lock-free
/// concurrent access.
pub trait SessionStorage: Send + Sync {
    /// Insert a session under its own ID.
    fn insert(&self, session: Arc<ProcessSession>);

    /// Get a session by ID.
    fn get(&self, session_id: &str) -> Option<Arc<ProcessSession>>;

    /// Remove a session only if `predicate` holds, atomically with respect to
    /// concurrent lookups of the same ID.
    fn remove_if(
        &self,
        session_id: &str,
        predicate: &dyn Fn(&ProcessSession) -> bool,
    ) -> Option<Arc<ProcessSession>>;

    /// Snapshot of all tracked sessions.
    fn list(&self) -> Vec<Arc<ProcessSession>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trait for search job storage operations.
///
/// Same contract as [`SessionStorage`], keyed by search ID.
pub trait SearchStorage: Send + Sync {
    fn insert(&self, job: Arc<SearchJob>);

    fn get(&self, search_id: &str) -> Option<Arc<SearchJob>>;

    fn remove_if(
        &self,
        search_id: &str,
        predicate: &dyn Fn(&SearchJob) -> bool,
    ) -> Option<Arc<SearchJob>>;

    fn list(&self) -> Vec<Arc<SearchJob>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
