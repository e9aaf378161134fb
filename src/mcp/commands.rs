//! MCP Agent Commands implementation.
//!
//! This module exposes the agent's tools over MCP:
//!
//! - `start_process`: Run a shell command as a background session (returns session_id)
//! - `read_process_output`: Page through a session's output
//! - `interact_with_process`: Send a line of input and collect the response
//! - `force_terminate`: Stop a session (interrupt, then kill)
//! - `list_sessions`: List all tracked sessions
//! - `kill_process`: Signal an arbitrary process by PID
//! - `start_search`: Start a streaming file or content search (returns search_id)
//! - `get_more_search_results`: Page through a search's results
//! - `stop_search`: Cancel a running search
//! - `list_searches`: List all tracked searches

use poem_mcpserver::{Tools, tool::StructuredContent};
use tracing::info;

use super::context::AgentContext;
use super::process::StartProcessRequest;
use super::search::SearchRequest;
use super::types::{
    ForceTerminateResponse, InteractResponse, KillProcessResponse, ProcessOutputResponse,
    SearchListResponse, SearchResultsResponse, SearchType, SessionListResponse,
    StartProcessResponse, StartSearchResponse, StopSearchResponse,
};

/// MCP Agent Commands tool implementation.
///
/// Holds a clone of the shared [`AgentContext`], so every connection sees the
/// same sessions and searches.
pub struct McpAgentCommands {
    context: AgentContext,
}

impl McpAgentCommands {
    pub fn new(context: AgentContext) -> Self {
        Self { context }
    }
}

#[Tools]
impl McpAgentCommands {
    /// Start a shell command as a background process session.
    ///
    /// Returns immediately with a session_id. The command keeps running; use
    /// `read_process_output` to follow its output, `interact_with_process` to
    /// answer prompts and `force_terminate` to stop it. Sessions report
    /// `waiting_for_input` once they have been silent for a short while.
    async fn start_process(
        &self,
        /// Command line to run through the shell (e.g., "npm run build")
        command: String,
        /// Working directory; must be inside the allowed directories (default: first allowed directory or the server's directory)
        working_directory: Option<String>,
        /// Maximum lifetime in milliseconds; the session ends as timed_out when exceeded (default: none, env: AGENT_PROCESS_TIMEOUT_MS, 0 = unlimited)
        timeout_ms: Option<u64>,
        /// Shell used to run the command (default: /bin/sh, env: AGENT_DEFAULT_SHELL)
        shell: Option<String>,
    ) -> Result<StructuredContent<StartProcessResponse>, String> {
        let response = self.context.sessions.start(StartProcessRequest {
            command,
            working_directory,
            timeout_ms,
            shell,
        })?;
        Ok(StructuredContent(response))
    }

    /// Read output lines of a process session.
    ///
    /// Without `offset`, returns the lines produced since the previous read
    /// without offset. With `offset`, returns `length` lines starting there; a
    /// negative offset returns the last |offset| lines. Output stays readable
    /// for a while after the process exits.
    async fn read_process_output(
        &self,
        /// Session ID returned by start_process
        session_id: String,
        /// Line offset; negative values read from the end (default: continue after the last read)
        offset: Option<i64>,
        /// Maximum number of lines to return (default: 1000)
        length: Option<usize>,
    ) -> Result<StructuredContent<ProcessOutputResponse>, String> {
        let response = self
            .context
            .sessions
            .read_output(&session_id, offset, length)?;
        Ok(StructuredContent(response))
    }

    /// Send one line of input to a running process and return the output it produces.
    ///
    /// Waits until the process goes quiet, exits or the timeout expires. A
    /// newline is appended to the input.
    async fn interact_with_process(
        &self,
        /// Session ID returned by start_process
        session_id: String,
        /// Text to send to the process's standard input
        input: String,
        /// Maximum wait for output in milliseconds (default: 8000, max: 300000, env: AGENT_INTERACT_TIMEOUT_MS)
        timeout_ms: Option<u64>,
    ) -> Result<StructuredContent<InteractResponse>, String> {
        let response = self
            .context
            .sessions
            .interact(&session_id, &input, timeout_ms)
            .await?;
        Ok(StructuredContent(response))
    }

    /// Terminate a process session.
    ///
    /// Sends an interrupt to the process group, then kills it after a grace
    /// period. Calling it on a finished session is harmless.
    async fn force_terminate(
        &self,
        /// Session ID returned by start_process
        session_id: String,
    ) -> Result<StructuredContent<ForceTerminateResponse>, String> {
        let response = self.context.sessions.force_terminate(&session_id).await?;
        Ok(StructuredContent(response))
    }

    /// List all process sessions, including recently finished ones.
    async fn list_sessions(&self) -> StructuredContent<SessionListResponse> {
        let sessions = self.context.sessions.list();
        let count = sessions.len();
        info!("Listing {} process session(s)", count);
        StructuredContent(SessionListResponse { sessions, count })
    }

    /// Send a termination signal to any process by PID.
    ///
    /// For sessions started by this server, prefer `force_terminate`.
    async fn kill_process(
        &self,
        /// Process ID to signal
        pid: u32,
    ) -> Result<StructuredContent<KillProcessResponse>, String> {
        let response = self.context.sessions.kill_pid(pid)?;
        Ok(StructuredContent(response))
    }

    /// Start a streaming search in the background.
    ///
    /// Returns immediately with a search_id; results accumulate while you
    /// poll `get_more_search_results`. `files` searches match entry names
    /// (globs like "*.md" or regexes); `content` searches match file lines.
    #[allow(clippy::too_many_arguments)]
    async fn start_search(
        &self,
        /// "files" to match names, "content" to match lines inside files
        search_type: SearchType,
        /// Regex, glob (files search only) or literal text to find
        pattern: String,
        /// Directory (or file) to search; must be inside the allowed directories
        root_path: String,
        /// Only consider entries whose name matches these globs, separated by "|" or "," (e.g., "*.rs|*.toml")
        file_pattern: Option<String>,
        /// Case-insensitive matching (default: true)
        ignore_case: Option<bool>,
        /// Treat the pattern as plain text instead of a regex (default: false)
        literal_search: Option<bool>,
        /// Stop at the first exact name match (files) or first matching line (content) (default: true for files, false for content)
        early_termination: Option<bool>,
        /// Complete once this many matches were found (default: unlimited)
        max_results: Option<u64>,
        /// Stop the search after this many milliseconds (default: none, env: AGENT_SEARCH_TIMEOUT_MS, 0 = unlimited)
        timeout_ms: Option<u64>,
        /// Include hidden (dot) files and directories (default: false)
        include_hidden: Option<bool>,
    ) -> Result<StructuredContent<StartSearchResponse>, String> {
        let response = self.context.searches.start(SearchRequest {
            search_type,
            pattern,
            root_path,
            file_pattern,
            ignore_case,
            literal_search,
            early_termination,
            max_results,
            timeout_ms,
            include_hidden,
        })?;
        Ok(StructuredContent(response))
    }

    /// Fetch results of a search, finished or still running.
    ///
    /// Poll until `state` is no longer "running". A negative offset returns
    /// the last |offset| results.
    async fn get_more_search_results(
        &self,
        /// Search ID returned by start_search
        search_id: String,
        /// Result offset; negative values read from the end (default: 0)
        offset: Option<i64>,
        /// Maximum number of results to return (default: 100)
        length: Option<usize>,
    ) -> Result<StructuredContent<SearchResultsResponse>, String> {
        let response = self.context.searches.poll(&search_id, offset, length)?;
        Ok(StructuredContent(response))
    }

    /// Request a running search to stop.
    ///
    /// The search reports "stopped" shortly after; results found so far
    /// remain readable.
    async fn stop_search(
        &self,
        /// Search ID returned by start_search
        search_id: String,
    ) -> Result<StructuredContent<StopSearchResponse>, String> {
        let response = self.context.searches.stop(&search_id)?;
        Ok(StructuredContent(response))
    }

    /// List all searches, including recently finished ones.
    async fn list_searches(&self) -> StructuredContent<SearchListResponse> {
        let response = self.context.searches.list();
        info!("Listing {} search(es)", response.count);
        StructuredContent(response)
    }
}
