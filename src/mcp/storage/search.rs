//! DashMap-based search job storage implementation.

use std::sync::Arc;

use dashmap::DashMap;

use crate::mcp::search::SearchJob;

use super::traits::SearchStorage;

/// DashMap-based implementation of `SearchStorage`.
pub struct DashMapSearchStorage {
    jobs: DashMap<String, Arc<SearchJob>>,
}

impl DashMapSearchStorage {
    /// Create a new search storage instance.
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
        }
    }
}

impl Default for DashMapSearchStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStorage for DashMapSearchStorage {
    fn insert(&self, job: Arc<SearchJob>) {
        self.jobs.insert(job.id().to_string(), job);
    }

    fn get(&self, search_id: &str) -> Option<Arc<SearchJob>> {
        self.jobs.get(search_id).map(|entry| entry.value().clone())
    }

    fn remove_if(
        &self,
        search_id: &str,
        predicate: &dyn Fn(&SearchJob) -> bool,
    ) -> Option<Arc<SearchJob>> {
        self.jobs
            .remove_if(search_id, |_, job| predicate(job))
            .map(|(_, job)| job)
    }

    fn list(&self) -> Vec<Arc<SearchJob>> {
        self.jobs.iter().map(|entry| entry.value().clone()).collect()
    }

    fn len(&self) -> usize {
        self.jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::SearchStatus;

    fn create_test_job() -> Arc<SearchJob> {
        let id = format!("test-search-{}", uuid::Uuid::new_v4());
        Arc::new(SearchJob::detached(&id, std::env::temp_dir()))
    }

    #[test]
    fn test_insert_get_evict() {
        let storage = DashMapSearchStorage::new();
        let job = create_test_job();
        let id = job.id().to_string();

        storage.insert(job);
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get(&id).unwrap().state(), SearchStatus::Running);

        assert!(storage.remove_if(&id, &|_| true).is_some());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_remove_if_only_terminal() {
        let storage = DashMapSearchStorage::new();
        let job = create_test_job();
        let id = job.id().to_string();
        storage.insert(job);

        assert!(storage.remove_if(&id, &|j| j.state().is_terminal()).is_none());
        assert_eq!(storage.list().len(), 1);
    }
}
