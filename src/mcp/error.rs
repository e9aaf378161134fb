//! Error taxonomy for the agent tools.
//!
//! Every externally visible failure is a [`ToolError`]. Tool handlers return
//! `Result<_, String>` as required by the MCP layer, so `ToolError` converts
//! into its display text, which always carries the error kind as a prefix:
//!
//! ```text
//! NotFound: No process session with ID: 4f1c...
//! ValidationError: Invalid regex pattern '(': unclosed group
//! ```
//!
//! # Kinds
//!
//! | Kind | Raised when |
//! |------|-------------|
//! | `NotFound` | Unknown or already evicted session/job id, or no such OS process |
//! | `ValidationError` | Malformed pattern or argument, rejected before any background work |
//! | `PermissionError` | Path outside the allowed directories, or the OS denied a signal |
//! | `SpawnError` | The process could not be started |
//! | `InvalidState` | The operation does not apply to the current state |
//!
//! Errors raised inside a running background task are recorded on the
//! session or job instead and never surface through this type.

use std::io;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable error kind carried next to the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ValidationError,
    PermissionError,
    SpawnError,
    InvalidState,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "NotFound"),
            ErrorKind::ValidationError => write!(f, "ValidationError"),
            ErrorKind::PermissionError => write!(f, "PermissionError"),
            ErrorKind::SpawnError => write!(f, "SpawnError"),
            ErrorKind::InvalidState => write!(f, "InvalidState"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("NotFound: {0}")]
    NotFound(String),
    #[error("ValidationError: {0}")]
    Validation(String),
    #[error("PermissionError: {0}")]
    Permission(String),
    #[error("SpawnError: {0}")]
    Spawn(String),
    #[error("InvalidState: {0}")]
    InvalidState(String),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::NotFound(_) => ErrorKind::NotFound,
            ToolError::Validation(_) => ErrorKind::ValidationError,
            ToolError::Permission(_) => ErrorKind::PermissionError,
            ToolError::Spawn(_) => ErrorKind::SpawnError,
            ToolError::InvalidState(_) => ErrorKind::InvalidState,
        }
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            ToolError::NotFound(m)
            | ToolError::Validation(m)
            | ToolError::Permission(m)
            | ToolError::Spawn(m)
            | ToolError::InvalidState(m) => m,
        }
    }

    pub(crate) fn session_not_found(session_id: &str) -> Self {
        ToolError::NotFound(format!(
            "No process session with ID: {}. Use list_sessions to see tracked sessions.",
            session_id
        ))
    }

    pub(crate) fn search_not_found(search_id: &str) -> Self {
        ToolError::NotFound(format!(
            "No search with ID: {}. Use list_searches to see tracked searches.",
            search_id
        ))
    }
}

impl From<ToolError> for String {
    fn from(err: ToolError) -> Self {
        err.to_string()
    }
}

/// Classify an I/O error raised while spawning a child process.
///
/// All spawn failures are terminal for that attempt, so every branch yields a
/// [`ToolError::Spawn`]; only the wording differs so the caller can tell a
/// missing shell from a permission problem.
pub(crate) fn classify_spawn_error(program: &str, err: &io::Error) -> ToolError {
    match err.kind() {
        io::ErrorKind::NotFound => {
            ToolError::Spawn(format!("Executable '{}' could not be found: {}", program, err))
        }
        io::ErrorKind::PermissionDenied => ToolError::Spawn(format!(
            "Permission denied while starting '{}': {}",
            program, err
        )),
        _ => ToolError::Spawn(format!("Failed to start '{}': {}", program, err)),
    }
}

/// Classify a failed signal delivery to a raw process id.
#[cfg(unix)]
pub(crate) fn classify_signal_error(pid: i32, errno: nix::errno::Errno) -> ToolError {
    use nix::errno::Errno;

    match errno {
        Errno::ESRCH => ToolError::NotFound(format!("No process with PID {}", pid)),
        Errno::EPERM => ToolError::Permission(format!(
            "Not permitted to signal process with PID {}",
            pid
        )),
        other => ToolError::InvalidState(format!(
            "Failed to signal process with PID {}: {}",
            pid, other
        )),
    }
}
