//! Shared state handed to every tool handler.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use super::config::{ProcessSettings, SearchSettings};
use super::guard::AllowedPathGuard;
use super::process::SessionRegistry;
use super::search::SearchRegistry;

/// The registries and the path guard, built once at startup.
///
/// Cloning is cheap; every MCP connection gets a clone so sessions and
/// searches started on one connection are visible from any other.
#[derive(Clone)]
pub struct AgentContext {
    pub sessions: Arc<SessionRegistry>,
    pub searches: Arc<SearchRegistry>,
    pub guard: Arc<AllowedPathGuard>,
}

impl AgentContext {
    pub fn new(
        process_settings: ProcessSettings,
        search_settings: SearchSettings,
        guard: AllowedPathGuard,
    ) -> Self {
        let guard = Arc::new(guard);
        Self {
            sessions: Arc::new(SessionRegistry::new(process_settings, guard.clone())),
            searches: Arc::new(SearchRegistry::new(search_settings, guard.clone())),
            guard,
        }
    }

    /// Build the context from environment variables.
    pub fn from_env() -> Self {
        let guard = AllowedPathGuard::from_env();
        if guard.is_unrestricted() {
            info!("No allowed directories configured; paths are unrestricted");
        } else {
            info!(
                "Allowed directories: {}",
                guard
                    .roots()
                    .iter()
                    .map(|r| r.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Self::new(ProcessSettings::from_env(), SearchSettings::from_env(), guard)
    }

    /// Start the background janitors of both registries.
    pub fn spawn_reapers(&self, interval: Duration) -> Vec<JoinHandle<()>> {
        vec![
            self.sessions.spawn_reaper(interval),
            self.searches.spawn_reaper(interval),
        ]
    }

    /// Stop every search and terminate every live session.
    pub async fn shutdown(&self) {
        self.searches.stop_all();
        self.sessions.shutdown().await;
    }
}
