//! Process sessions: spawned shell commands with captured, paginated output.
//!
//! # Architecture
//!
//! - [`ProcessSession`]: all state of one spawned process. Its output buffer,
//!   state channel and exit record are written only by the session's
//!   supervisor task; request handlers read them.
//! - [`SessionRegistry`]: owns the id -> session map, validates and spawns new
//!   sessions, and reclaims finished ones after the retention window.
//!
//! Each session runs two reader tasks (stdout, stderr) feeding one channel, so
//! lines from both streams land in the buffer in arrival order. The supervisor
//! drains that channel and watches for exit, cancellation, the lifetime limit
//! and the quiet period that marks a session as `waiting_for_input`.
//!
//! # Limits
//!
//! - At most 50 sessions are tracked at once (finished ones included)
//! - Finished sessions are evicted after the retention window (default 5 minutes)

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::future::join_all;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::buffer::{Page, PaginatedBuffer};
use super::config::{DEFAULT_OUTPUT_READ_LENGTH, ProcessSettings, find_blocked_command};
#[cfg(unix)]
use super::error::classify_signal_error;
use super::error::{ToolError, classify_spawn_error};
use super::guard::AllowedPathGuard;
use super::message::ProcessStartMessageBuilder;
use super::storage::{DashMapSessionStorage, SessionStorage};
use super::types::{
    ForceTerminateResponse, InteractResponse, KillProcessResponse, ProcessOutputResponse,
    ProcessSessionInfo, ProcessState, StartProcessResponse,
};

/// Maximum number of sessions tracked at once
pub const MAX_TRACKED_SESSIONS: usize = 50;

/// Read size of the stdout/stderr reader tasks
const READ_CHUNK_SIZE: usize = 8192;

/// Chunks buffered between the reader tasks and the supervisor
const READER_CHANNEL_CAPACITY: usize = 256;

/// How long the supervisor keeps draining pipes after the process exited.
///
/// Background grandchildren may hold the pipes open indefinitely.
const EXIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Extra wait on top of the grace period before force_terminate returns
const TERMINATE_SETTLE: Duration = Duration::from_secs(1);

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Parameters of a new process session.
#[derive(Debug, Clone, Default)]
pub struct StartProcessRequest {
    pub command: String,
    pub working_directory: Option<String>,
    /// Maximum lifetime in milliseconds; `0` means unlimited
    pub timeout_ms: Option<u64>,
    pub shell: Option<String>,
}

impl StartProcessRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }
}

/// State for one spawned process
pub struct ProcessSession {
    id: String,
    command: String,
    working_directory: PathBuf,
    shell: String,
    pid: Option<u32>,
    /// Wall-clock start time (RFC3339)
    started_at: String,
    started: Instant,
    /// Milliseconds after `started` of the last output or input
    last_activity_ms: AtomicU64,
    /// Captured output lines, stdout and stderr interleaved
    output: PaginatedBuffer<String>,
    /// Next line index for offset-less reads
    read_cursor: AtomicUsize,
    state_tx: watch::Sender<ProcessState>,
    /// Exit code, set once on transition to `Exited`
    exit_code: OnceLock<i32>,
    finished_at: OnceLock<Instant>,
    /// First I/O error seen by the supervisor
    error: OnceLock<String>,
    stdin: Mutex<Option<ChildStdin>>,
    cancel_token: CancellationToken,
    /// Woken on every append and on the transition to a terminal state
    activity: Notify,
}

impl ProcessSession {
    fn new(
        command: &str,
        working_directory: PathBuf,
        shell: String,
        pid: Option<u32>,
        stdin: Option<ChildStdin>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ProcessState::Starting);
        Self {
            id: Uuid::new_v4().to_string(),
            command: command.to_string(),
            working_directory,
            shell,
            pid,
            started_at: chrono::Utc::now().to_rfc3339(),
            started: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            output: PaginatedBuffer::with_capacity(256),
            read_cursor: AtomicUsize::new(0),
            state_tx,
            exit_code: OnceLock::new(),
            finished_at: OnceLock::new(),
            error: OnceLock::new(),
            stdin: Mutex::new(stdin),
            cancel_token: CancellationToken::new(),
            activity: Notify::new(),
        }
    }

    /// A session with no process behind it, for storage tests.
    #[cfg(test)]
    pub(crate) fn detached(id: &str, command: &str) -> Self {
        let mut session = Self::new(command, std::env::temp_dir(), "sh".to_string(), None, None);
        session.id = id.to_string();
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        *self.state_tx.borrow()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code.get().copied()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.state_tx.subscribe()
    }

    pub fn idle(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed));
        self.started.elapsed().saturating_sub(last)
    }

    /// Whether the session finished more than `retention` before `now`.
    pub fn is_expired(&self, retention: Duration, now: Instant) -> bool {
        self.finished_at
            .get()
            .is_some_and(|finished| now.saturating_duration_since(*finished) >= retention)
    }

    /// Run time so far, or the full run time once finished.
    pub fn elapsed(&self) -> Duration {
        let end = self.finished_at.get().copied().unwrap_or_else(Instant::now);
        end.saturating_duration_since(self.started)
    }

    pub fn info(&self) -> ProcessSessionInfo {
        ProcessSessionInfo {
            session_id: self.id.clone(),
            command: self.command.clone(),
            pid: self.pid,
            state: self.state(),
            exit_code: self.exit_code(),
            started_at: self.started_at.clone(),
            elapsed_ms: millis(self.elapsed()),
            idle_ms: millis(self.idle()),
            output_lines: self.output.len(),
        }
    }

    fn touch(&self) {
        self.last_activity_ms
            .store(millis(self.started.elapsed()), Ordering::Relaxed);
    }

    fn append_lines(&self, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        self.output.extend(lines);
        self.touch();
        self.activity.notify_waiters();
    }

    fn record_error(&self, message: String) {
        if self.error.set(message).is_err() {
            debug!("Session {} already has an error recorded", self.id);
        }
    }

    /// Move to a non-terminal state. Terminal states are final.
    fn transition(&self, next: ProcessState) -> bool {
        self.state_tx.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            *current = next;
            true
        })
    }

    /// Record the terminal state. The exit record is written before the state
    /// so anyone observing the terminal state also sees the exit code.
    fn finish(&self, state: ProcessState, exit_code: Option<i32>) {
        if self.state().is_terminal() {
            return;
        }
        if let Some(code) = exit_code {
            let _ = self.exit_code.set(code);
        }
        let _ = self.finished_at.set(Instant::now());
        self.transition(state);
        self.activity.notify_waiters();
    }

    /// Take up to `length` lines past the read cursor and advance it.
    ///
    /// Concurrent callers never receive the same line.
    fn read_unseen(&self, length: usize) -> Page<String> {
        loop {
            let cursor = self.read_cursor.load(Ordering::Acquire);
            let page = self
                .output
                .read(i64::try_from(cursor).unwrap_or(i64::MAX), length);
            if self
                .read_cursor
                .compare_exchange(cursor, page.end(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return page;
            }
        }
    }

    /// Write one line to stdin, giving up at `deadline`.
    ///
    /// Returns false when the deadline passed first, for example because the
    /// child stopped reading and the pipe is full.
    async fn write_input(&self, input: &str, deadline: Instant) -> Result<bool, ToolError> {
        let mut data = input.to_string();
        if !data.ends_with('\n') {
            data.push('\n');
        }

        let write = async {
            let mut guard = self.stdin.lock().await;
            let stdin = guard.as_mut().ok_or_else(|| {
                ToolError::InvalidState(format!(
                    "Input stream of session {} is closed",
                    self.id
                ))
            })?;

            let written = match stdin.write_all(data.as_bytes()).await {
                Ok(()) => stdin.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                guard.take();
                return Err(ToolError::InvalidState(format!(
                    "Failed to write to session {}: {}",
                    self.id, e
                )));
            }
            Ok::<(), ToolError>(())
        };

        match tokio::time::timeout_at(deadline, write).await {
            Ok(result) => {
                result?;
                self.touch();
                Ok(true)
            }
            Err(_) => {
                warn!(
                    "Writing {} bytes to session {} did not finish in time",
                    data.len(),
                    self.id
                );
                Ok(false)
            }
        }
    }

    /// Wait until output beyond line `start` has arrived and then stayed quiet
    /// for `quiet`, the session finished, or `deadline` passed.
    ///
    /// Returns true when nothing new arrived at all.
    async fn wait_for_output(&self, start: usize, deadline: Instant, quiet: Duration) -> bool {
        loop {
            // Registered before the checks so an append in between still wakes us.
            let notified = self.activity.notified();

            if self.state().is_terminal() {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let grown = self.output.len() > start;
            let wake_at = if grown {
                (now + quiet).min(deadline)
            } else {
                deadline
            };

            if tokio::time::timeout_at(wake_at, notified).await.is_err() {
                break;
            }
        }
        self.output.len() <= start
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

enum ReaderEvent {
    Data(Stream, Vec<u8>),
    Failed(Stream, String),
}

/// Splits a byte stream into lines, keeping the unterminated tail.
#[derive(Debug, Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            lines.push(decode_line(line));
        }
        lines
    }

    /// Emit the unterminated tail as a line of its own.
    fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        Some(decode_line(std::mem::take(&mut self.pending)))
    }
}

fn decode_line(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8_lossy(&line).into_owned()
}

/// Feeds reader events into a session's buffer.
struct OutputCollector {
    session: Arc<ProcessSession>,
    stdout: LineSplitter,
    stderr: LineSplitter,
}

impl OutputCollector {
    fn new(session: Arc<ProcessSession>) -> Self {
        Self {
            session,
            stdout: LineSplitter::default(),
            stderr: LineSplitter::default(),
        }
    }

    fn handle(&mut self, event: ReaderEvent) {
        match event {
            ReaderEvent::Data(stream, bytes) => {
                let splitter = match stream {
                    Stream::Stdout => &mut self.stdout,
                    Stream::Stderr => &mut self.stderr,
                };
                let lines = splitter.push(&bytes);
                self.session.touch();
                self.session.append_lines(lines);
            }
            ReaderEvent::Failed(stream, message) => {
                warn!(
                    "Session {} failed reading {}: {}",
                    self.session.id, stream, message
                );
                self.session
                    .record_error(format!("Failed reading {}: {}", stream, message));
            }
        }
    }

    fn flush(&mut self) {
        let pending: Vec<String> = [self.stdout.flush(), self.stderr.flush()]
            .into_iter()
            .flatten()
            .collect();
        self.session.append_lines(pending);
    }

    async fn drain(&mut self, events: &mut mpsc::Receiver<ReaderEvent>, limit: Duration) {
        let drained = tokio::time::timeout(limit, async {
            while let Some(event) = events.recv().await {
                self.handle(event);
            }
        })
        .await;
        if drained.is_err() {
            debug!(
                "Session {} output pipes still open after exit, stopped draining",
                self.session.id
            );
        }
        self.flush();
    }
}

fn spawn_reader<R>(stream: Stream, mut reader: R, tx: mpsc::Sender<ReaderEvent>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(ReaderEvent::Data(stream, buf[..n].to_vec())).await.is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = tx.send(ReaderEvent::Failed(stream, e.to_string())).await;
                    break;
                }
            }
        }
    });
}

fn spawn_shell(shell: &str, command: &str, working_directory: &Path) -> std::io::Result<Child> {
    let mut cmd = Command::new(shell);
    #[cfg(windows)]
    cmd.arg("/C");
    #[cfg(not(windows))]
    cmd.arg("-c");

    cmd.arg(command)
        .current_dir(working_directory)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so termination reaches the whole pipeline.
    #[cfg(unix)]
    cmd.process_group(0);

    cmd.spawn()
}

/// Exit code of a finished process; death by signal N reports 128 + N.
fn exit_code_of(status: ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(128 + signal);
        }
    }
    None
}

/// Interrupt the process group, then kill it if it outlives `grace`.
async fn terminate_child(session_id: &str, child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            let group = Pid::from_raw(pid as i32);
            if let Err(e) = killpg(group, Signal::SIGTERM) {
                debug!("SIGTERM to process group {} failed: {}", pid, e);
            }
            if let Ok(Ok(_)) = tokio::time::timeout(grace, child.wait()).await {
                return;
            }
            warn!(
                "Session {} ignored SIGTERM for {:?}, sending SIGKILL",
                session_id, grace
            );
            if let Err(e) = killpg(group, Signal::SIGKILL) {
                debug!("SIGKILL to process group {} failed: {}", pid, e);
            }
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    if let Err(e) = child.kill().await {
        debug!("Kill of session {} returned: {}", session_id, e);
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> Result<(), ToolError> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .map_err(|_| ToolError::Validation(format!("PID {} is out of range", pid)))?;
    kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|errno| classify_signal_error(raw, errno))
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> Result<(), ToolError> {
    Err(ToolError::InvalidState(
        "Killing processes by PID is only supported on Unix".to_string(),
    ))
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[derive(Debug, Clone, Copy)]
struct SupervisorLimits {
    quiet_period: Duration,
    max_lifetime: Option<Duration>,
    terminate_grace: Duration,
}

/// Background task owning the child process of one session.
async fn supervise(
    session: Arc<ProcessSession>,
    mut child: Child,
    mut events: mpsc::Receiver<ReaderEvent>,
    limits: SupervisorLimits,
) {
    session.transition(ProcessState::Running);

    let mut collector = OutputCollector::new(session.clone());
    let deadline = limits.max_lifetime.map(|lifetime| Instant::now() + lifetime);
    let mut streams_open = true;
    let mut quiet_armed = true;

    loop {
        tokio::select! {
            biased;

            _ = session.cancel_token.cancelled() => {
                info!("Terminating session {}", session.id);
                terminate_child(&session.id, &mut child, limits.terminate_grace).await;
                collector.drain(&mut events, EXIT_DRAIN_TIMEOUT).await;
                session.finish(ProcessState::Terminated, None);
                break;
            }

            _ = sleep_until_deadline(deadline) => {
                warn!(
                    "Session {} exceeded its lifetime of {:?}: {}",
                    session.id, limits.max_lifetime, session.command
                );
                terminate_child(&session.id, &mut child, limits.terminate_grace).await;
                collector.drain(&mut events, EXIT_DRAIN_TIMEOUT).await;
                session.finish(ProcessState::TimedOut, None);
                break;
            }

            event = events.recv(), if streams_open => {
                match event {
                    Some(event) => {
                        collector.handle(event);
                        quiet_armed = true;
                        if session.state() == ProcessState::WaitingForInput {
                            session.transition(ProcessState::Running);
                        }
                    }
                    None => streams_open = false,
                }
            }

            status = child.wait() => {
                collector.drain(&mut events, EXIT_DRAIN_TIMEOUT).await;
                match status {
                    Ok(status) => {
                        let code = exit_code_of(status);
                        info!("Session {} exited with {:?}", session.id, code);
                        session.finish(ProcessState::Exited, code);
                    }
                    Err(e) => {
                        warn!("Failed to wait on session {}: {}", session.id, e);
                        session.record_error(format!("Failed to wait on process: {}", e));
                        session.finish(ProcessState::Exited, None);
                    }
                }
                break;
            }

            _ = tokio::time::sleep(limits.quiet_period), if quiet_armed => {
                quiet_armed = false;
                collector.flush();
                if session.state() == ProcessState::Running {
                    session.transition(ProcessState::WaitingForInput);
                }
            }
        }
    }

    session.stdin.lock().await.take();
}

/// Owns every process session of the server.
pub struct SessionRegistry {
    storage: Box<dyn SessionStorage>,
    settings: ProcessSettings,
    guard: Arc<AllowedPathGuard>,
}

impl SessionRegistry {
    pub fn new(settings: ProcessSettings, guard: Arc<AllowedPathGuard>) -> Self {
        Self::with_storage(Box::new(DashMapSessionStorage::new()), settings, guard)
    }

    pub fn with_storage(
        storage: Box<dyn SessionStorage>,
        settings: ProcessSettings,
        guard: Arc<AllowedPathGuard>,
    ) -> Self {
        Self {
            storage,
            settings,
            guard,
        }
    }

    pub fn settings(&self) -> &ProcessSettings {
        &self.settings
    }

    /// Look up a session, evicting it first if its retention window is over.
    fn lookup(&self, session_id: &str) -> Result<Arc<ProcessSession>, ToolError> {
        let retention = self.settings.retention;
        let now = Instant::now();
        if self
            .storage
            .remove_if(session_id, &|s| s.is_expired(retention, now))
            .is_some()
        {
            debug!("Evicted expired session {} on lookup", session_id);
            return Err(ToolError::session_not_found(session_id));
        }
        self.storage
            .get(session_id)
            .ok_or_else(|| ToolError::session_not_found(session_id))
    }

    /// Spawn a command and start supervising it. Returns as soon as the
    /// process is running in the background.
    pub fn start(&self, request: StartProcessRequest) -> Result<StartProcessResponse, ToolError> {
        let command = request.command.trim();
        if command.is_empty() {
            return Err(ToolError::Validation("Command must not be empty".to_string()));
        }

        if let Some(word) = find_blocked_command(command, &self.settings.blocked_commands) {
            warn!("Rejected blocked command '{}': {}", word, command);
            return Err(ToolError::Validation(format!(
                "Command '{}' is blocked by the server configuration",
                word
            )));
        }

        let working_directory = match request
            .working_directory
            .as_deref()
            .filter(|dir| !dir.trim().is_empty())
        {
            Some(dir) => self.guard.validate(dir)?,
            None => self.guard.default_directory(),
        };
        if !working_directory.is_dir() {
            return Err(ToolError::Spawn(format!(
                "Working directory '{}' does not exist or is not a directory",
                working_directory.display()
            )));
        }

        if self.storage.len() >= MAX_TRACKED_SESSIONS {
            self.reap();
            if self.storage.len() >= MAX_TRACKED_SESSIONS {
                return Err(ToolError::InvalidState(format!(
                    "Maximum tracked sessions reached ({}). Terminate sessions or wait for finished ones to be evicted.",
                    MAX_TRACKED_SESSIONS
                )));
            }
        }

        let shell = self.settings.shell_for(request.shell);
        let max_lifetime = self.settings.lifetime_for(request.timeout_ms);

        let mut child = spawn_shell(&shell, command, &working_directory)
            .map_err(|e| classify_spawn_error(&shell, &e))?;
        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = child.stdin.take();

        let session = Arc::new(ProcessSession::new(
            command,
            working_directory,
            shell,
            pid,
            stdin,
        ));

        let (tx, rx) = mpsc::channel(READER_CHANNEL_CAPACITY);
        if let Some(stdout) = stdout {
            spawn_reader(Stream::Stdout, stdout, tx.clone());
        }
        if let Some(stderr) = stderr {
            spawn_reader(Stream::Stderr, stderr, tx);
        }

        self.storage.insert(session.clone());
        info!(
            "Started session {} (pid {:?}) in {}: {}",
            session.id,
            pid,
            session.working_directory.display(),
            session.command
        );

        tokio::spawn(supervise(
            session.clone(),
            child,
            rx,
            SupervisorLimits {
                quiet_period: self.settings.quiet_period,
                max_lifetime,
                terminate_grace: self.settings.terminate_grace,
            },
        ));

        let working_directory = session.working_directory.display().to_string();
        let message = ProcessStartMessageBuilder::new(&session.id, &session.command)
            .with_pid(pid)
            .with_working_directory(&working_directory)
            .with_max_lifetime(max_lifetime)
            .build();

        Ok(StartProcessResponse {
            session_id: session.id.clone(),
            pid,
            command: session.command.clone(),
            working_directory,
            shell: session.shell.clone(),
            state: session.state(),
            started_at: session.started_at.clone(),
            message,
        })
    }

    /// Read captured output.
    ///
    /// With an explicit `offset` the usual pagination rules apply. Without
    /// one, reading continues where the previous offset-less read stopped.
    pub fn read_output(
        &self,
        session_id: &str,
        offset: Option<i64>,
        length: Option<usize>,
    ) -> Result<ProcessOutputResponse, ToolError> {
        let session = self.lookup(session_id)?;
        let length = length.unwrap_or(DEFAULT_OUTPUT_READ_LENGTH);

        // State first: a terminal state guarantees the buffer is complete.
        let state = session.state();
        let page = match offset {
            Some(offset) => session.output.read(offset, length),
            None => session.read_unseen(length),
        };

        Ok(ProcessOutputResponse {
            session_id: session.id.clone(),
            lines: page.items,
            offset: page.offset,
            total_lines: page.total,
            state,
            exit_code: session.exit_code(),
            error: session.error.get().cloned(),
        })
    }

    /// Send a line of input and collect the output it produces.
    pub async fn interact(
        &self,
        session_id: &str,
        input: &str,
        timeout_ms: Option<u64>,
    ) -> Result<InteractResponse, ToolError> {
        let session = self.lookup(session_id)?;
        let state = session.state();
        if state.is_terminal() {
            return Err(ToolError::InvalidState(format!(
                "Session {} has already finished (state: {})",
                session_id, state
            )));
        }

        let deadline = Instant::now() + self.settings.interact_timeout_for(timeout_ms);

        let start = session.output.len();
        let timed_out = if session.write_input(input, deadline).await? {
            debug!("Sent {} bytes to session {}", input.len(), session_id);
            session
                .wait_for_output(start, deadline, self.settings.quiet_period)
                .await
        } else {
            true
        };

        let state = session.state();
        let page = session.output.read_from(start);
        Ok(InteractResponse {
            session_id: session.id.clone(),
            lines: page.items,
            offset: page.offset,
            state,
            exit_code: session.exit_code(),
            timed_out,
        })
    }

    /// Request termination and wait for the supervisor to confirm it.
    pub async fn force_terminate(
        &self,
        session_id: &str,
    ) -> Result<ForceTerminateResponse, ToolError> {
        let session = self.lookup(session_id)?;
        let before = session.state();
        if before.is_terminal() {
            return Ok(ForceTerminateResponse {
                session_id: session.id.clone(),
                state: before,
                already_finished: true,
                message: format!("Session {} had already finished ({})", session.id, before),
            });
        }

        session.cancel_token.cancel();
        let mut rx = session.subscribe();
        let settled = matches!(
            tokio::time::timeout(
                self.settings.terminate_grace + TERMINATE_SETTLE,
                rx.wait_for(|state| state.is_terminal()),
            )
            .await,
            Ok(Ok(_))
        );

        let state = session.state();
        let message = if settled {
            format!("Session {} terminated ({})", session.id, state)
        } else {
            format!(
                "Termination of session {} requested; still {}. Check list_sessions shortly.",
                session.id, state
            )
        };

        Ok(ForceTerminateResponse {
            session_id: session.id.clone(),
            state,
            already_finished: false,
            message,
        })
    }

    /// Summaries of all tracked sessions, oldest first.
    pub fn list(&self) -> Vec<ProcessSessionInfo> {
        self.evict_expired();
        let mut sessions = self.storage.list();
        sessions.sort_by_key(|s| s.started);
        sessions.iter().map(|s| s.info()).collect()
    }

    /// Send SIGTERM to an arbitrary process by PID.
    pub fn kill_pid(&self, pid: u32) -> Result<KillProcessResponse, ToolError> {
        if pid <= 1 || pid == std::process::id() {
            return Err(ToolError::Validation(format!(
                "Refusing to signal PID {}",
                pid
            )));
        }

        send_sigterm(pid)?;

        let tracked = self
            .storage
            .list()
            .into_iter()
            .find(|s| s.pid == Some(pid))
            .map(|s| format!(" (session {})", s.id))
            .unwrap_or_default();
        info!("Sent SIGTERM to PID {}{}", pid, tracked);

        Ok(KillProcessResponse {
            pid,
            message: format!("Sent SIGTERM to PID {}{}", pid, tracked),
        })
    }

    fn evict_expired(&self) -> usize {
        let retention = self.settings.retention;
        let now = Instant::now();
        let mut evicted = 0;
        for session in self.storage.list() {
            if session.is_expired(retention, now)
                && self
                    .storage
                    .remove_if(&session.id, &|s| s.is_expired(retention, now))
                    .is_some()
            {
                debug!("Evicted finished session {}", session.id);
                evicted += 1;
            }
        }
        evicted
    }

    /// Evict expired sessions and terminate idle running ones.
    /// Returns the number of evicted sessions.
    pub fn reap(&self) -> usize {
        let evicted = self.evict_expired();

        if let Some(idle_limit) = self.settings.idle_timeout {
            for session in self.storage.list() {
                if !session.state().is_terminal()
                    && session.idle() >= idle_limit
                    && !session.cancel_token.is_cancelled()
                {
                    warn!(
                        "Terminating session {} after {:?} without activity",
                        session.id, idle_limit
                    );
                    session.cancel_token.cancel();
                }
            }
        }

        if evicted > 0 {
            info!("Reaped {} finished session(s)", evicted);
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
                registry.reap();
            }
        })
    }

    /// Terminate every live session concurrently.
    pub async fn shutdown(&self) {
        let live: Vec<_> = self
            .storage
            .list()
            .into_iter()
            .filter(|s| !s.state().is_terminal())
            .collect();
        if live.is_empty() {
            return;
        }

        info!("Terminating {} live session(s)", live.len());
        let limit = self.settings.terminate_grace + TERMINATE_SETTLE;
        join_all(live.iter().map(|session| async move {
            session.cancel_token.cancel();
            let mut rx = session.subscribe();
            if tokio::time::timeout(limit, rx.wait_for(|s| s.is_terminal()))
                .await
                .is_err()
            {
                warn!("Session {} did not terminate in time", session.id);
            }
        }))
        .await;
    }
}
