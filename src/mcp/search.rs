//! Streaming filesystem search.
//!
//! A search runs as a background traversal that appends matches to a
//! [`PaginatedBuffer`] while callers page through whatever has been found so
//! far. Traversal is depth-first in file-name order and never follows
//! symbolic links, so it cannot leave the validated root.
//!
//! # Matching
//!
//! - `content`: every line of every regular file is matched against the
//!   pattern (a regex, or an escaped literal with `literal_search`). Files
//!   whose first block contains a NUL byte are treated as binary and skipped.
//! - `files`: entry names are matched. A non-literal pattern containing `*`,
//!   `?` or `[` is a glob (`*.md`); anything else is a regex searched within
//!   the name.
//!
//! `file_pattern` restricts both modes to entries whose name matches one of
//! its globs (separated by `|` or `,`).
//!
//! # Cancellation
//!
//! `stop` only sets a flag. The traversal checks it before every entry and
//! every 1024 lines inside a file, and reports `stopped` once it notices.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use regex::{Regex, RegexBuilder};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::{DirEntry, WalkDir};

use super::buffer::PaginatedBuffer;
use super::config::{DEFAULT_SEARCH_READ_LENGTH, SearchSettings};
use super::error::ToolError;
use super::guard::AllowedPathGuard;
use super::message::SearchStartMessageBuilder;
use super::storage::{DashMapSearchStorage, SearchStorage};
use super::types::{
    SearchJobInfo, SearchListResponse, SearchMatch, SearchResultsResponse, SearchStatus,
    SearchType, StartSearchResponse, StopSearchResponse,
};

/// Maximum number of search jobs tracked at once
pub const MAX_TRACKED_SEARCHES: usize = 50;

/// Lines scanned between cancellation checks inside one file
const CANCEL_CHECK_LINES: u64 = 1024;

/// Matched lines longer than this are cut
const MAX_MATCHED_TEXT_CHARS: usize = 500;

/// Per-entry errors echoed back on each poll
const RECENT_ERRORS: i64 = 5;

/// Read buffer of content scans; also the block sniffed for binary content
const SCAN_BUFFER_SIZE: usize = 64 * 1024;

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Parameters of a new search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub search_type: SearchType,
    pub pattern: String,
    pub root_path: String,
    pub file_pattern: Option<String>,
    /// Defaults to true
    pub ignore_case: Option<bool>,
    pub literal_search: Option<bool>,
    /// Defaults to true for file searches, false for content searches
    pub early_termination: Option<bool>,
    /// `0` means unlimited
    pub max_results: Option<u64>,
    /// `0` means unlimited
    pub timeout_ms: Option<u64>,
    pub include_hidden: Option<bool>,
}

impl SearchRequest {
    pub fn new(
        search_type: SearchType,
        pattern: impl Into<String>,
        root_path: impl Into<String>,
    ) -> Self {
        Self {
            search_type,
            pattern: pattern.into(),
            root_path: root_path.into(),
            file_pattern: None,
            ignore_case: None,
            literal_search: None,
            early_termination: None,
            max_results: None,
            timeout_ms: None,
            include_hidden: None,
        }
    }
}

enum Matcher {
    Regex(Regex),
    Glob(GlobMatcher),
}

/// Compiled search pattern.
struct PatternMatcher {
    matcher: Matcher,
    pattern: String,
    ignore_case: bool,
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

impl PatternMatcher {
    fn new(
        search_type: SearchType,
        pattern: &str,
        ignore_case: bool,
        literal: bool,
    ) -> Result<Self, ToolError> {
        let matcher = if search_type == SearchType::Files && !literal && is_glob(pattern) {
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(ignore_case)
                .build()
                .map_err(|e| {
                    ToolError::Validation(format!("Invalid glob pattern '{}': {}", pattern, e))
                })?;
            Matcher::Glob(glob.compile_matcher())
        } else {
            let source = if literal {
                regex::escape(pattern)
            } else {
                pattern.to_string()
            };
            let regex = RegexBuilder::new(&source)
                .case_insensitive(ignore_case)
                .build()
                .map_err(|e| {
                    ToolError::Validation(format!(
                        "Invalid regex pattern '{}': {}. Use literal_search=true to match it as plain text.",
                        pattern, e
                    ))
                })?;
            Matcher::Regex(regex)
        };

        Ok(Self {
            matcher,
            pattern: pattern.to_string(),
            ignore_case,
        })
    }

    fn is_match(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(regex) => regex.is_match(text),
            Matcher::Glob(glob) => glob.is_match(text),
        }
    }

    /// Whether `name` is exactly the pattern text.
    fn is_exact(&self, name: &str) -> bool {
        if self.ignore_case {
            name.to_lowercase() == self.pattern.to_lowercase()
        } else {
            name == self.pattern
        }
    }
}

fn build_file_filter(
    file_pattern: Option<&str>,
    ignore_case: bool,
) -> Result<Option<GlobSet>, ToolError> {
    let Some(raw) = file_pattern else {
        return Ok(None);
    };
    let globs: Vec<&str> = raw
        .split(['|', ','])
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .collect();
    if globs.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(
            GlobBuilder::new(glob)
                .case_insensitive(ignore_case)
                .build()
                .map_err(|e| {
                    ToolError::Validation(format!("Invalid file pattern '{}': {}", glob, e))
                })?,
        );
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| ToolError::Validation(format!("Invalid file pattern '{}': {}", raw, e)))
}

/// Everything the traversal needs, fixed at start.
struct SearchPlan {
    search_type: SearchType,
    matcher: PatternMatcher,
    filter: Option<GlobSet>,
    early_termination: bool,
    include_hidden: bool,
    max_results: Option<u64>,
    deadline: Option<Instant>,
}

impl SearchPlan {
    fn limit_reached(&self, job: &SearchJob) -> bool {
        self.max_results
            .is_some_and(|max| job.matches.load(Ordering::Relaxed) >= max)
    }
}

/// How a traversal ended.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Completed,
    Stopped,
    Failed(String),
}

/// State for one background search
pub struct SearchJob {
    id: String,
    search_type: SearchType,
    pattern: String,
    root_path: PathBuf,
    /// Wall-clock start time (RFC3339)
    started_at: String,
    started: Instant,
    results: PaginatedBuffer<SearchMatch>,
    /// Per-entry errors; they never abort the search
    errors: PaginatedBuffer<String>,
    scanned: AtomicU64,
    matches: AtomicU64,
    state_tx: watch::Sender<SearchStatus>,
    finished_at: OnceLock<Instant>,
    /// Why the search failed, set before the `failed` state
    failure: OnceLock<String>,
    timed_out: AtomicBool,
    cancel_token: CancellationToken,
}

impl SearchJob {
    fn new(search_type: SearchType, pattern: &str, root_path: PathBuf) -> Self {
        let (state_tx, _) = watch::channel(SearchStatus::Running);
        Self {
            id: Uuid::new_v4().to_string(),
            search_type,
            pattern: pattern.to_string(),
            root_path,
            started_at: chrono::Utc::now().to_rfc3339(),
            started: Instant::now(),
            results: PaginatedBuffer::with_capacity(128),
            errors: PaginatedBuffer::new(),
            scanned: AtomicU64::new(0),
            matches: AtomicU64::new(0),
            state_tx,
            finished_at: OnceLock::new(),
            failure: OnceLock::new(),
            timed_out: AtomicBool::new(false),
            cancel_token: CancellationToken::new(),
        }
    }

    /// A job that is never run, for storage tests.
    #[cfg(test)]
    pub(crate) fn detached(id: &str, root_path: PathBuf) -> Self {
        let mut job = Self::new(SearchType::Files, "*", root_path);
        job.id = id.to_string();
        job
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SearchStatus {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchStatus> {
        self.state_tx.subscribe()
    }

    pub fn match_count(&self) -> u64 {
        self.matches.load(Ordering::Relaxed)
    }

    pub fn is_expired(&self, retention: Duration, now: Instant) -> bool {
        self.finished_at
            .get()
            .is_some_and(|finished| now.saturating_duration_since(*finished) >= retention)
    }

    pub fn info(&self) -> SearchJobInfo {
        SearchJobInfo {
            search_id: self.id.clone(),
            search_type: self.search_type,
            pattern: self.pattern.clone(),
            root_path: self.root_path.display().to_string(),
            state: self.state(),
            started_at: self.started_at.clone(),
            elapsed_ms: millis(self.started.elapsed()),
            match_count: self.match_count(),
        }
    }

    fn push(&self, hit: SearchMatch) {
        self.results.append(hit);
        self.matches.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, message: String) {
        debug!("Search {}: {}", self.id, message);
        self.errors.append(message);
    }

    fn finish(&self, outcome: Outcome) {
        let status = match outcome {
            Outcome::Completed => SearchStatus::Completed,
            Outcome::Stopped => SearchStatus::Stopped,
            Outcome::Failed(message) => {
                warn!("Search {} failed: {}", self.id, message);
                let _ = self.failure.set(message);
                SearchStatus::Failed
            }
        };
        let _ = self.finished_at.set(Instant::now());
        self.state_tx.send_replace(status);
        info!(
            "Search {} {} after {:?}: {} match(es), {} entries scanned",
            self.id,
            status,
            self.started.elapsed(),
            self.match_count(),
            self.scanned.load(Ordering::Relaxed)
        );
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn truncate_line(text: &str) -> String {
    if text.chars().count() > MAX_MATCHED_TEXT_CHARS {
        let kept: String = text.chars().take(MAX_MATCHED_TEXT_CHARS).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

/// Walk the tree under the job's root. Runs on a blocking thread.
fn traverse(job: &SearchJob, plan: &SearchPlan) -> Outcome {
    let walker = WalkDir::new(&job.root_path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| plan.include_hidden || entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        if job.cancel_token.is_cancelled() {
            return Outcome::Stopped;
        }
        if plan.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            job.timed_out.store(true, Ordering::SeqCst);
            return Outcome::Stopped;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Outcome::Failed(format!(
                    "Cannot read search root '{}': {}",
                    job.root_path.display(),
                    err
                ));
            }
            Err(err) => {
                job.record_error(err.to_string());
                continue;
            }
        };
        if entry.depth() == 0 && entry.file_type().is_dir() {
            continue;
        }
        job.scanned.fetch_add(1, Ordering::Relaxed);

        if let Some(filter) = &plan.filter
            && !filter.is_match(entry.file_name())
        {
            continue;
        }

        let flow = match plan.search_type {
            SearchType::Files => match_name(job, plan, &entry),
            SearchType::Content if entry.file_type().is_file() => {
                scan_file(job, plan, entry.path())
            }
            SearchType::Content => None,
        };
        if let Some(outcome) = flow {
            return outcome;
        }
    }

    Outcome::Completed
}

fn match_name(job: &SearchJob, plan: &SearchPlan, entry: &DirEntry) -> Option<Outcome> {
    let name = entry.file_name().to_string_lossy();
    if !plan.matcher.is_match(&name) {
        return None;
    }

    job.push(SearchMatch {
        path: entry.path().display().to_string(),
        line_number: None,
        matched_text: name.to_string(),
    });

    if plan.early_termination && plan.matcher.is_exact(&name) {
        debug!("Search {} found exact match {}", job.id, entry.path().display());
        return Some(Outcome::Completed);
    }
    plan.limit_reached(job).then_some(Outcome::Completed)
}

fn scan_file(job: &SearchJob, plan: &SearchPlan, path: &Path) -> Option<Outcome> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            job.record_error(format!("{}: {}", path.display(), e));
            return None;
        }
    };

    let mut reader = BufReader::with_capacity(SCAN_BUFFER_SIZE, file);
    match reader.fill_buf() {
        Ok(head) if head.contains(&0) => return None,
        Ok(_) => {}
        Err(e) => {
            job.record_error(format!("{}: {}", path.display(), e));
            return None;
        }
    }

    let mut line = Vec::new();
    let mut line_number = 0u64;
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => return None,
            Ok(_) => {}
            Err(e) => {
                job.record_error(format!("{}: {}", path.display(), e));
                return None;
            }
        }
        line_number += 1;

        if line_number % CANCEL_CHECK_LINES == 0 && job.cancel_token.is_cancelled() {
            return Some(Outcome::Stopped);
        }

        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end_matches(['\n', '\r']);
        if plan.matcher.is_match(text) {
            job.push(SearchMatch {
                path: path.display().to_string(),
                line_number: Some(line_number),
                matched_text: truncate_line(text),
            });
            if plan.early_termination || plan.limit_reached(job) {
                return Some(Outcome::Completed);
            }
        }
    }
}

/// Owns every search job of the server.
pub struct SearchRegistry {
    storage: Box<dyn SearchStorage>,
    settings: SearchSettings,
    guard: Arc<AllowedPathGuard>,
}

impl SearchRegistry {
    pub fn new(settings: SearchSettings, guard: Arc<AllowedPathGuard>) -> Self {
        Self::with_storage(Box::new(DashMapSearchStorage::new()), settings, guard)
    }

    pub fn with_storage(
        storage: Box<dyn SearchStorage>,
        settings: SearchSettings,
        guard: Arc<AllowedPathGuard>,
    ) -> Self {
        Self {
            storage,
            settings,
            guard,
        }
    }

    fn lookup(&self, search_id: &str) -> Result<Arc<SearchJob>, ToolError> {
        let retention = self.settings.retention;
        let now = Instant::now();
        if self
            .storage
            .remove_if(search_id, &|job| job.is_expired(retention, now))
            .is_some()
        {
            debug!("Evicted expired search {} on lookup", search_id);
            return Err(ToolError::search_not_found(search_id));
        }
        self.storage
            .get(search_id)
            .ok_or_else(|| ToolError::search_not_found(search_id))
    }

    /// Validate the request and launch the traversal in the background.
    pub fn start(&self, request: SearchRequest) -> Result<StartSearchResponse, ToolError> {
        if request.pattern.is_empty() {
            return Err(ToolError::Validation("Search pattern must not be empty".to_string()));
        }

        let root = self.guard.validate(&request.root_path)?;
        if !root.exists() {
            return Err(ToolError::Validation(format!(
                "Search root '{}' does not exist",
                root.display()
            )));
        }

        let ignore_case = request.ignore_case.unwrap_or(true);
        let literal = request.literal_search.unwrap_or(false);
        let early_termination = request
            .early_termination
            .unwrap_or_else(|| request.search_type.default_early_termination());
        let matcher =
            PatternMatcher::new(request.search_type, &request.pattern, ignore_case, literal)?;
        let filter = build_file_filter(request.file_pattern.as_deref(), ignore_case)?;

        if self.storage.len() >= MAX_TRACKED_SEARCHES {
            self.reap();
            if self.storage.len() >= MAX_TRACKED_SEARCHES {
                return Err(ToolError::InvalidState(format!(
                    "Maximum tracked searches reached ({}). Stop searches or wait for finished ones to be evicted.",
                    MAX_TRACKED_SEARCHES
                )));
            }
        }

        let timeout = self.settings.timeout_for(request.timeout_ms);
        let plan = SearchPlan {
            search_type: request.search_type,
            matcher,
            filter,
            early_termination,
            include_hidden: request.include_hidden.unwrap_or(false),
            max_results: request.max_results.filter(|max| *max > 0),
            deadline: timeout.map(|timeout| Instant::now() + timeout),
        };

        let job = Arc::new(SearchJob::new(request.search_type, &request.pattern, root));
        self.storage.insert(job.clone());
        info!(
            "Starting {} search {} for '{}' in {}",
            job.search_type,
            job.id,
            job.pattern,
            job.root_path.display()
        );

        let worker = job.clone();
        tokio::spawn(async move {
            let traversal = worker.clone();
            let outcome = tokio::task::spawn_blocking(move || traverse(&traversal, &plan))
                .await
                .unwrap_or_else(|e| Outcome::Failed(format!("Search task aborted: {}", e)));
            worker.finish(outcome);
        });

        let root_path = job.root_path.display().to_string();
        let message =
            SearchStartMessageBuilder::new(&job.id, job.search_type, &job.pattern, &root_path)
                .with_file_pattern(request.file_pattern.as_deref())
                .with_early_termination(early_termination)
                .build();

        Ok(StartSearchResponse {
            search_id: job.id.clone(),
            search_type: job.search_type,
            pattern: job.pattern.clone(),
            root_path,
            early_termination,
            started_at: job.started_at.clone(),
            message,
        })
    }

    /// Non-blocking read of the results produced so far.
    pub fn poll(
        &self,
        search_id: &str,
        offset: Option<i64>,
        length: Option<usize>,
    ) -> Result<SearchResultsResponse, ToolError> {
        let job = self.lookup(search_id)?;

        // State first: a terminal state guarantees the results are complete.
        let state = job.state();
        let page = job.results.read(
            offset.unwrap_or(0),
            length.unwrap_or(DEFAULT_SEARCH_READ_LENGTH),
        );

        Ok(SearchResultsResponse {
            search_id: job.id.clone(),
            results: page.items,
            offset: page.offset,
            total_results: page.total,
            state,
            scanned_count: job.scanned.load(Ordering::Relaxed),
            match_count: job.match_count(),
            error_count: job.errors.len() as u64,
            recent_errors: job.errors.read(-RECENT_ERRORS, 0).items,
            error: job.failure.get().cloned(),
            timed_out: job.timed_out.load(Ordering::SeqCst),
        })
    }

    /// Ask the traversal to stop at its next check.
    pub fn stop(&self, search_id: &str) -> Result<StopSearchResponse, ToolError> {
        let job = self.lookup(search_id)?;
        let state = job.state();

        let message = if state.is_terminal() {
            format!("Search {} had already finished ({})", job.id, state)
        } else {
            job.cancel_token.cancel();
            info!("Stop requested for search {}", job.id);
            format!(
                "Stop requested for search {}. It reports 'stopped' once the traversal notices; poll get_more_search_results to confirm.",
                job.id
            )
        };

        Ok(StopSearchResponse {
            search_id: job.id.clone(),
            state,
            message,
        })
    }

    /// Summaries of all tracked searches, oldest first.
    pub fn list(&self) -> SearchListResponse {
        self.reap();
        let mut jobs = self.storage.list();
        jobs.sort_by_key(|job| job.started);
        let searches: Vec<SearchJobInfo> = jobs.iter().map(|job| job.info()).collect();
        let count = searches.len();
        SearchListResponse { searches, count }
    }

    /// Evict searches whose retention window is over.
    pub fn reap(&self) -> usize {
        let retention = self.settings.retention;
        let now = Instant::now();
        let mut evicted = 0;
        for job in self.storage.list() {
            if job.is_expired(retention, now)
                && self
                    .storage
                    .remove_if(&job.id, &|j| j.is_expired(retention, now))
                    .is_some()
            {
                debug!("Evicted finished search {}", job.id);
                evicted += 1;
            }
        }
        evicted
    }

    /// Run [`reap`](Self::reap) periodically until the registry is dropped.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.reap();
                if evicted > 0 {
                    info!("Reaped {} finished search(es)", evicted);
                }
            }
        })
    }

    /// Stop every running search.
    pub fn stop_all(&self) {
        for job in self.storage.list() {
            if !job.state().is_terminal() {
                job.cancel_token.cancel();
            }
        }
    }
}
