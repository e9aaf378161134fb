//! Serializable request and response types for the agent MCP tools.
//!
//! All types implement `Serialize`, `Deserialize`, and `JsonSchema` for proper
//! MCP protocol compatibility. Unsigned fields use the helpers in
//! [`crate::mcp::schema`] so the published schema carries plain integers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a process session.
///
/// `WaitingForInput` is a sub-state of `Running`: the process is alive but has
/// been silent for the quiet period. It is a hint, not a guarantee that the
/// process is blocked on its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Spawned, supervisor not yet running
    Starting,
    /// Alive and producing (or recently produced) output
    Running,
    /// Alive but silent for the quiet period; interactive input may be expected
    WaitingForInput,
    /// Exited on its own (check exit_code)
    Exited,
    /// Killed after exceeding its maximum lifetime
    TimedOut,
    /// Killed on request
    Terminated,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessState::Exited | ProcessState::TimedOut | ProcessState::Terminated
        )
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessState::Starting => write!(f, "starting"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::WaitingForInput => write!(f, "waiting_for_input"),
            ProcessState::Exited => write!(f, "exited"),
            ProcessState::TimedOut => write!(f, "timed_out"),
            ProcessState::Terminated => write!(f, "terminated"),
        }
    }
}

/// What a search matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// Match entry names
    Files,
    /// Match file contents line by line
    Content,
}

impl SearchType {
    /// Name searches usually look for one specific file; content searches
    /// usually want every occurrence.
    pub fn default_early_termination(self) -> bool {
        matches!(self, SearchType::Files)
    }
}

impl std::fmt::Display for SearchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchType::Files => write!(f, "files"),
            SearchType::Content => write!(f, "content"),
        }
    }
}

/// Lifecycle state of a search job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// Traversal in progress
    Running,
    /// Traversal finished (or terminated early on an exact match)
    Completed,
    /// Stopped on request or after its time limit
    Stopped,
    /// Could not continue at all (check error)
    Failed,
}

impl SearchStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SearchStatus::Running)
    }
}

impl std::fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchStatus::Running => write!(f, "running"),
            SearchStatus::Completed => write!(f, "completed"),
            SearchStatus::Stopped => write!(f, "stopped"),
            SearchStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Response from start_process
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StartProcessResponse {
    /// Unique identifier for this session
    pub session_id: String,
    /// OS process id of the spawned shell
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::mcp::schema::optional_uint")]
    pub pid: Option<u32>,
    pub command: String,
    pub working_directory: String,
    pub shell: String,
    pub state: ProcessState,
    /// When the process was started (RFC3339 format)
    pub started_at: String,
    pub message: String,
}

/// Response from read_process_output
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ProcessOutputResponse {
    pub session_id: String,
    /// Output lines in arrival order (stdout and stderr interleaved)
    pub lines: Vec<String>,
    /// Absolute line index of the first returned line
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub offset: usize,
    /// Lines captured so far
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub total_lines: usize,
    pub state: ProcessState,
    /// Exit code (only present once exited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// I/O error recorded by the session supervisor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response from interact_with_process
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InteractResponse {
    pub session_id: String,
    /// Output produced after the input was sent
    pub lines: Vec<String>,
    /// Absolute line index of the first returned line
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub offset: usize,
    pub state: ProcessState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// True when the wait ended without any new output
    #[serde(default)]
    pub timed_out: bool,
}

/// Response from force_terminate
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ForceTerminateResponse {
    pub session_id: String,
    pub state: ProcessState,
    /// True when the session had already finished before the request
    #[serde(default)]
    pub already_finished: bool,
    pub message: String,
}

/// Summary of a tracked process session
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessSessionInfo {
    pub session_id: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::mcp::schema::optional_uint")]
    pub pid: Option<u32>,
    pub state: ProcessState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// When the process was started (RFC3339 format)
    pub started_at: String,
    /// Milliseconds since start
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub elapsed_ms: u64,
    /// Milliseconds since the last output or input
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub idle_ms: u64,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub output_lines: usize,
}

/// Response from list_sessions
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionListResponse {
    pub sessions: Vec<ProcessSessionInfo>,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub count: usize,
}

/// Response from kill_process
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct KillProcessResponse {
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub pid: u32,
    pub message: String,
}

/// Response from start_search
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StartSearchResponse {
    pub search_id: String,
    pub search_type: SearchType,
    pub pattern: String,
    /// Resolved search root
    pub root_path: String,
    pub early_termination: bool,
    /// When the search was started (RFC3339 format)
    pub started_at: String,
    pub message: String,
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchMatch {
    pub path: String,
    /// 1-based line number (content searches only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::mcp::schema::optional_uint")]
    pub line_number: Option<u64>,
    /// The matching line, or the entry name for file searches
    pub matched_text: String,
}

/// Response from get_more_search_results
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchResultsResponse {
    pub search_id: String,
    /// Results in discovery order
    pub results: Vec<SearchMatch>,
    /// Absolute index of the first returned result
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub offset: usize,
    /// Results produced so far
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub total_results: usize,
    pub state: SearchStatus,
    /// Entries visited so far
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub scanned_count: u64,
    /// Matches found so far
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub match_count: u64,
    /// Per-entry errors (unreadable files, denied directories)
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub error_count: u64,
    /// The most recent per-entry errors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_errors: Vec<String>,
    /// Fatal error (only present when failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the search hit its time limit
    #[serde(default)]
    pub timed_out: bool,
}

/// Response from stop_search
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StopSearchResponse {
    pub search_id: String,
    /// State at the time of the request; `running` until the traversal notices
    pub state: SearchStatus,
    pub message: String,
}

/// Summary of a tracked search job
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchJobInfo {
    pub search_id: String,
    pub search_type: SearchType,
    pub pattern: String,
    pub root_path: String,
    pub state: SearchStatus,
    /// When the search was started (RFC3339 format)
    pub started_at: String,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub elapsed_ms: u64,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub match_count: u64,
}

/// Response from list_searches
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchListResponse {
    pub searches: Vec<SearchJobInfo>,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub count: usize,
}

#[cfg(test)]
mod response_serialization {
    use super::*;

    mod process_state {
        use super::*;

        #[test]
        fn test_serialize_snake_case() {
            assert_eq!(
                serde_json::to_string(&ProcessState::WaitingForInput).unwrap(),
                "\"waiting_for_input\""
            );
            assert_eq!(
                serde_json::to_string(&ProcessState::TimedOut).unwrap(),
                "\"timed_out\""
            );
        }

        #[test]
        fn test_display_matches_serde() {
            for state in [
                ProcessState::Starting,
                ProcessState::Running,
                ProcessState::WaitingForInput,
                ProcessState::Exited,
                ProcessState::TimedOut,
                ProcessState::Terminated,
            ] {
                let json = serde_json::to_string(&state).unwrap();
                assert_eq!(json, format!("\"{}\"", state));
            }
        }

        #[test]
        fn test_terminal_states() {
            assert!(!ProcessState::Starting.is_terminal());
            assert!(!ProcessState::Running.is_terminal());
            assert!(!ProcessState::WaitingForInput.is_terminal());
            assert!(ProcessState::Exited.is_terminal());
            assert!(ProcessState::TimedOut.is_terminal());
            assert!(ProcessState::Terminated.is_terminal());
        }
    }

    mod search_enums {
        use super::*;

        #[test]
        fn test_search_type_round_trip() {
            assert_eq!(
                serde_json::from_str::<SearchType>("\"files\"").unwrap(),
                SearchType::Files
            );
            assert_eq!(
                serde_json::from_str::<SearchType>("\"content\"").unwrap(),
                SearchType::Content
            );
            assert!(serde_json::from_str::<SearchType>("\"Files\"").is_err());
        }

        #[test]
        fn test_early_termination_defaults_differ_by_type() {
            assert!(SearchType::Files.default_early_termination());
            assert!(!SearchType::Content.default_early_termination());
        }

        #[test]
        fn test_search_status_terminal() {
            assert!(!SearchStatus::Running.is_terminal());
            assert!(SearchStatus::Completed.is_terminal());
            assert!(SearchStatus::Stopped.is_terminal());
            assert!(SearchStatus::Failed.is_terminal());
            assert_eq!(format!("{}", SearchStatus::Stopped), "stopped");
        }
    }

    mod process_output_response {
        use super::*;

        #[test]
        fn test_optional_fields_omitted_when_none() {
            let response = ProcessOutputResponse {
                session_id: "s-1".to_string(),
                lines: vec!["hello".to_string()],
                offset: 0,
                total_lines: 1,
                state: ProcessState::Running,
                exit_code: None,
                error: None,
            };

            let json = serde_json::to_string(&response).unwrap();
            assert!(!json.contains("exit_code"));
            assert!(!json.contains("\"error\""));
            assert!(json.contains("\"state\":\"running\""));
        }

        #[test]
        fn test_exited_response() {
            let response = ProcessOutputResponse {
                session_id: "s-1".to_string(),
                lines: vec!["hello".to_string()],
                offset: 0,
                total_lines: 1,
                state: ProcessState::Exited,
                exit_code: Some(0),
                error: None,
            };

            let json = serde_json::to_string(&response).unwrap();
            let deserialized: ProcessOutputResponse = serde_json::from_str(&json).unwrap();
            assert_eq!(deserialized.state, ProcessState::Exited);
            assert_eq!(deserialized.exit_code, Some(0));
            assert_eq!(deserialized.lines, vec!["hello".to_string()]);
        }
    }

    mod interact_response {
        use super::*;

        #[test]
        fn test_timed_out_defaults_to_false() {
            let json = r#"{"session_id":"s","lines":[],"offset":0,"state":"waiting_for_input"}"#;
            let deserialized: InteractResponse = serde_json::from_str(json).unwrap();
            assert!(!deserialized.timed_out);
            assert_eq!(deserialized.state, ProcessState::WaitingForInput);
        }
    }

    mod search_match {
        use super::*;

        #[test]
        fn test_file_match_omits_line_number() {
            let hit = SearchMatch {
                path: "/repo/a.md".to_string(),
                line_number: None,
                matched_text: "a.md".to_string(),
            };
            let json = serde_json::to_value(&hit).unwrap();
            assert!(json.get("line_number").is_none());
            assert_eq!(json["path"], "/repo/a.md");
        }

        #[test]
        fn test_content_match_has_line_number() {
            let hit = SearchMatch {
                path: "/repo/main.rs".to_string(),
                line_number: Some(12),
                matched_text: "// TODO: fix".to_string(),
            };
            let json = serde_json::to_value(&hit).unwrap();
            assert_eq!(json["line_number"], 12);
        }
    }

    mod search_results_response {
        use super::*;

        #[test]
        fn test_failed_response() {
            let response = SearchResultsResponse {
                search_id: "q-1".to_string(),
                results: vec![],
                offset: 0,
                total_results: 0,
                state: SearchStatus::Failed,
                scanned_count: 0,
                match_count: 0,
                error_count: 0,
                recent_errors: vec![],
                error: Some("Search root disappeared".to_string()),
                timed_out: false,
            };

            let json = serde_json::to_value(&response).unwrap();
            assert_eq!(json["state"], "failed");
            assert_eq!(json["error"], "Search root disappeared");
            assert!(json.get("recent_errors").is_none());
        }
    }

    mod list_responses {
        use super::*;

        #[test]
        fn test_session_list() {
            let info = ProcessSessionInfo {
                session_id: "s-1".to_string(),
                command: "sleep 10".to_string(),
                pid: Some(4242),
                state: ProcessState::Running,
                exit_code: None,
                started_at: "2024-01-15T10:30:00Z".to_string(),
                elapsed_ms: 1_500,
                idle_ms: 1_500,
                output_lines: 0,
            };
            let response = SessionListResponse {
                sessions: vec![info],
                count: 1,
            };

            let json = serde_json::to_string(&response).unwrap();
            let deserialized: SessionListResponse = serde_json::from_str(&json).unwrap();
            assert_eq!(deserialized.count, 1);
            assert_eq!(deserialized.sessions[0].pid, Some(4242));
            assert_eq!(deserialized.sessions[0].state, ProcessState::Running);
        }

        #[test]
        fn test_empty_search_list() {
            let response = SearchListResponse {
                searches: vec![],
                count: 0,
            };
            let json = serde_json::to_string(&response).unwrap();
            assert_eq!(json, r#"{"searches":[],"count":0}"#);
        }
    }
}
