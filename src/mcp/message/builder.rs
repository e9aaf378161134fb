//! Builder patterns for constructing MCP response messages.
//!
//! These builders follow the fluent API pattern to construct human-readable
//! messages that help LLMs remember important identifiers and the tools to
//! call next.

use std::time::Duration;

use crate::mcp::types::SearchType;

/// Builder for process start messages.
///
/// # Example
///
/// ```ignore
/// let message = ProcessStartMessageBuilder::new("session-123", "npm run build")
///     .with_pid(Some(4242))
///     .with_working_directory("/srv/app")
///     .with_max_lifetime(Some(Duration::from_secs(600)))
///     .build();
/// ```
pub struct ProcessStartMessageBuilder {
    session_id: String,
    command: String,
    pid: Option<u32>,
    working_directory: Option<String>,
    max_lifetime: Option<Duration>,
}

impl ProcessStartMessageBuilder {
    /// Create a new process start message builder with required fields.
    pub fn new(session_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            command: command.into(),
            pid: None,
            working_directory: None,
            max_lifetime: None,
        }
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Set the maximum lifetime; `None` means unlimited and is not shown.
    pub fn with_max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Build the message string.
    pub fn build(&self) -> String {
        let mut lines = vec![
            "PROCESS STARTED. REMEMBER THIS IDENTIFIER:".to_string(),
            format!("• session_id: '{}'", self.session_id),
            format!("• command: '{}'", truncate_command(&self.command, 50)),
        ];

        if let Some(pid) = self.pid {
            lines.push(format!("• pid: {}", pid));
        }
        if let Some(ref dir) = self.working_directory {
            lines.push(format!("• working_directory: {}", dir));
        }
        if let Some(lifetime) = self.max_lifetime {
            lines.push(format!("• max_lifetime_ms: {}", lifetime.as_millis()));
        }

        lines.push(String::new()); // empty line
        lines.push(format!(
            "Use read_process_output with session_id '{}' to read output.",
            self.session_id
        ));
        lines.push(format!(
            "Use interact_with_process with session_id '{}' to send input, force_terminate to stop it.",
            self.session_id
        ));

        lines.join("\n")
    }
}

/// Builder for search start messages.
///
/// # Example
///
/// ```ignore
/// let message = SearchStartMessageBuilder::new("search-123", SearchType::Content, "TODO", "/repo")
///     .with_file_pattern(Some("*.rs"))
///     .with_early_termination(false)
///     .build();
/// ```
pub struct SearchStartMessageBuilder {
    search_id: String,
    search_type: SearchType,
    pattern: String,
    root_path: String,
    file_pattern: Option<String>,
    early_termination: bool,
}

impl SearchStartMessageBuilder {
    pub fn new(
        search_id: impl Into<String>,
        search_type: SearchType,
        pattern: impl Into<String>,
        root_path: impl Into<String>,
    ) -> Self {
        Self {
            search_id: search_id.into(),
            search_type,
            pattern: pattern.into(),
            root_path: root_path.into(),
            file_pattern: None,
            early_termination: search_type.default_early_termination(),
        }
    }

    pub fn with_file_pattern(mut self, file_pattern: Option<impl Into<String>>) -> Self {
        self.file_pattern = file_pattern.map(Into::into);
        self
    }

    pub fn with_early_termination(mut self, early_termination: bool) -> Self {
        self.early_termination = early_termination;
        self
    }

    /// Build the message string.
    pub fn build(&self) -> String {
        let mut lines = vec![
            "SEARCH STARTED. REMEMBER THIS IDENTIFIER:".to_string(),
            format!("• search_id: '{}'", self.search_id),
            format!("• {} search for '{}' in {}", self.search_type, self.pattern, self.root_path),
        ];

        if let Some(ref fp) = self.file_pattern {
            lines.push(format!("• file_pattern: '{}'", fp));
        }
        if self.early_termination {
            lines.push("• stops at the first exact match".to_string());
        }

        lines.push(String::new()); // empty line
        lines.push(format!(
            "Use get_more_search_results with search_id '{}' to fetch results as they arrive.",
            self.search_id
        ));
        lines.push(format!(
            "Use stop_search with search_id '{}' to cancel.",
            self.search_id
        ));

        lines.join("\n")
    }
}

/// Truncate a command string for display purposes, on a char boundary.
fn truncate_command(command: &str, max_len: usize) -> String {
    if command.chars().count() > max_len {
        let kept: String = command.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        command.to_string()
    }
}
