//! Configuration resolution for the agent MCP server.
//!
//! This module handles configuration values with a three-tier priority system:
//!
//! 1. **Parameter** - Explicitly provided tool parameter (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AGENT_ALLOWED_DIRECTORIES` | unrestricted | Comma-separated allowed roots |
//! | `AGENT_DEFAULT_SHELL` | `/bin/sh` | Shell used to run commands |
//! | `AGENT_BLOCKED_COMMANDS` | built-in list | Comma-separated blocked commands |
//! | `AGENT_QUIET_PERIOD_MS` | 300ms | Silence before `waiting_for_input` |
//! | `AGENT_INTERACT_TIMEOUT_MS` | 8000ms | Default wait for process interaction |
//! | `AGENT_PROCESS_TIMEOUT_MS` | 0 (none) | Default maximum process lifetime |
//! | `AGENT_TERMINATE_GRACE_MS` | 2000ms | Interrupt-to-kill escalation delay |
//! | `AGENT_SESSION_RETENTION_SECS` | 300s | Retention of finished sessions |
//! | `AGENT_SESSION_IDLE_TIMEOUT_SECS` | 1800s | Idle sessions are terminated after this |
//! | `AGENT_SEARCH_TIMEOUT_MS` | 0 (none) | Default wall-clock limit of a search |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

/// Default quiet period before a session reports it may be waiting for input
pub(crate) const DEFAULT_QUIET_PERIOD_MS: u64 = 300;

/// Default wait for output after sending input to a process
pub(crate) const DEFAULT_INTERACT_TIMEOUT_MS: u64 = 8_000;

/// Upper bound for any interaction wait
pub(crate) const MAX_INTERACT_TIMEOUT_MS: u64 = 300_000;

/// Default delay between the interrupt signal and the unconditional kill
pub(crate) const DEFAULT_TERMINATE_GRACE_MS: u64 = 2_000;

/// Default retention of finished sessions
pub(crate) const DEFAULT_SESSION_RETENTION_SECS: u64 = 300;

/// Default idle timeout for running sessions
pub(crate) const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 1_800;

/// Retention of finished search jobs (fixed)
pub(crate) const SEARCH_RETENTION_SECS: u64 = 300;

/// Default page length for process output reads (lines)
pub(crate) const DEFAULT_OUTPUT_READ_LENGTH: usize = 1_000;

/// Default page length for search result reads (records)
pub(crate) const DEFAULT_SEARCH_READ_LENGTH: usize = 100;

/// Interval of the background reaper
pub const REAPER_INTERVAL: Duration = Duration::from_secs(10);

#[cfg(unix)]
pub(crate) const DEFAULT_SHELL: &str = "/bin/sh";
#[cfg(windows)]
pub(crate) const DEFAULT_SHELL: &str = "cmd.exe";

/// Commands refused unless `AGENT_BLOCKED_COMMANDS` overrides the list
pub(crate) const DEFAULT_BLOCKED_COMMANDS: &[&str] = &[
    "mkfs", "format", "mount", "umount", "fdisk", "dd", "parted", "diskpart", "sudo", "su",
    "passwd", "adduser", "useradd", "usermod", "groupadd", "chsh", "visudo", "shutdown", "reboot",
    "halt", "poweroff", "init", "iptables", "firewall", "netsh",
];

pub(crate) const ALLOWED_DIRECTORIES_ENV_VAR: &str = "AGENT_ALLOWED_DIRECTORIES";
pub(crate) const DEFAULT_SHELL_ENV_VAR: &str = "AGENT_DEFAULT_SHELL";
pub(crate) const BLOCKED_COMMANDS_ENV_VAR: &str = "AGENT_BLOCKED_COMMANDS";
pub(crate) const QUIET_PERIOD_ENV_VAR: &str = "AGENT_QUIET_PERIOD_MS";
pub(crate) const INTERACT_TIMEOUT_ENV_VAR: &str = "AGENT_INTERACT_TIMEOUT_MS";
pub(crate) const PROCESS_TIMEOUT_ENV_VAR: &str = "AGENT_PROCESS_TIMEOUT_MS";
pub(crate) const TERMINATE_GRACE_ENV_VAR: &str = "AGENT_TERMINATE_GRACE_MS";
pub(crate) const SESSION_RETENTION_ENV_VAR: &str = "AGENT_SESSION_RETENTION_SECS";
pub(crate) const SESSION_IDLE_TIMEOUT_ENV_VAR: &str = "AGENT_SESSION_IDLE_TIMEOUT_SECS";
pub(crate) const SEARCH_TIMEOUT_ENV_VAR: &str = "AGENT_SEARCH_TIMEOUT_MS";

/// Separators between chained shell commands.
static COMMAND_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\|\||&&|[;|&\n]").expect("valid separator regex"));

/// Resolve a parsed value with priority: env var -> default
fn resolve_parsed<T: FromStr>(env_var: &str, default: T) -> T {
    if let Ok(raw) = env::var(env_var)
        && let Ok(value) = raw.trim().parse::<T>()
    {
        return value;
    }

    default
}

/// `0` disables a limit.
fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Split a comma-separated list, dropping empty entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve the allowed directories: env var -> unrestricted (empty)
pub(crate) fn resolve_allowed_directories() -> Vec<PathBuf> {
    env::var(ALLOWED_DIRECTORIES_ENV_VAR)
        .map(|v| split_list(&v))
        .unwrap_or_default()
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

/// Resolve the shell: env var -> platform default
pub(crate) fn resolve_shell() -> String {
    if let Ok(shell) = env::var(DEFAULT_SHELL_ENV_VAR)
        && !shell.trim().is_empty()
    {
        return shell;
    }

    DEFAULT_SHELL.to_string()
}

/// Resolve the blocked command list: env var -> built-in list.
///
/// An empty env var disables blocking entirely.
pub(crate) fn resolve_blocked_commands() -> Vec<String> {
    match env::var(BLOCKED_COMMANDS_ENV_VAR) {
        Ok(raw) => split_list(&raw),
        Err(_) => DEFAULT_BLOCKED_COMMANDS
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

/// Resolve the quiet period: env var -> default
pub(crate) fn resolve_quiet_period() -> Duration {
    Duration::from_millis(resolve_parsed(QUIET_PERIOD_ENV_VAR, DEFAULT_QUIET_PERIOD_MS))
}

/// Resolve the interaction wait: env var -> default, capped at
/// [`MAX_INTERACT_TIMEOUT_MS`]
pub(crate) fn resolve_interact_timeout() -> Duration {
    capped_interact_timeout(resolve_parsed(
        INTERACT_TIMEOUT_ENV_VAR,
        DEFAULT_INTERACT_TIMEOUT_MS,
    ))
}

fn capped_interact_timeout(ms: u64) -> Duration {
    Duration::from_millis(ms.min(MAX_INTERACT_TIMEOUT_MS))
}

/// Resolve the maximum process lifetime: env var -> unlimited
pub(crate) fn resolve_process_timeout() -> Option<Duration> {
    non_zero_millis(resolve_parsed(PROCESS_TIMEOUT_ENV_VAR, 0))
}

/// Resolve the terminate grace period: env var -> default
pub(crate) fn resolve_terminate_grace() -> Duration {
    Duration::from_millis(resolve_parsed(
        TERMINATE_GRACE_ENV_VAR,
        DEFAULT_TERMINATE_GRACE_MS,
    ))
}

/// Resolve the retention of finished sessions: env var -> default
pub(crate) fn resolve_session_retention() -> Duration {
    Duration::from_secs(resolve_parsed(
        SESSION_RETENTION_ENV_VAR,
        DEFAULT_SESSION_RETENTION_SECS,
    ))
}

/// Resolve the idle timeout of running sessions: env var -> default (`0` disables)
pub(crate) fn resolve_session_idle_timeout() -> Option<Duration> {
    let secs = resolve_parsed(
        SESSION_IDLE_TIMEOUT_ENV_VAR,
        DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
    );
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Resolve the search wall-clock limit: env var -> unlimited
pub(crate) fn resolve_search_timeout() -> Option<Duration> {
    non_zero_millis(resolve_parsed(SEARCH_TIMEOUT_ENV_VAR, 0))
}

/// Check a command line against the blocked list.
///
/// Every chained segment (`;`, `&&`, `||`, `|`, `&`, newline) is checked by its
/// first word, with any leading path stripped (`/usr/bin/sudo` counts as `sudo`).
/// Returns the first blocked word found.
pub(crate) fn find_blocked_command<'a>(command: &'a str, blocked: &[String]) -> Option<&'a str> {
    COMMAND_SEPARATORS
        .split(command)
        .filter_map(|segment| segment.split_whitespace().next())
        .find(|word| {
            let base = word.rsplit(['/', '\\']).next().unwrap_or(word);
            blocked.iter().any(|b| b.eq_ignore_ascii_case(base))
        })
}

/// Tunables of the process session subsystem.
#[derive(Debug, Clone)]
pub struct ProcessSettings {
    pub default_shell: String,
    pub blocked_commands: Vec<String>,
    pub quiet_period: Duration,
    pub interact_timeout: Duration,
    pub max_lifetime: Option<Duration>,
    pub terminate_grace: Duration,
    pub retention: Duration,
    pub idle_timeout: Option<Duration>,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            default_shell: DEFAULT_SHELL.to_string(),
            blocked_commands: DEFAULT_BLOCKED_COMMANDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            quiet_period: Duration::from_millis(DEFAULT_QUIET_PERIOD_MS),
            interact_timeout: Duration::from_millis(DEFAULT_INTERACT_TIMEOUT_MS),
            max_lifetime: None,
            terminate_grace: Duration::from_millis(DEFAULT_TERMINATE_GRACE_MS),
            retention: Duration::from_secs(DEFAULT_SESSION_RETENTION_SECS),
            idle_timeout: Some(Duration::from_secs(DEFAULT_SESSION_IDLE_TIMEOUT_SECS)),
        }
    }
}

impl ProcessSettings {
    pub fn from_env() -> Self {
        Self {
            default_shell: resolve_shell(),
            blocked_commands: resolve_blocked_commands(),
            quiet_period: resolve_quiet_period(),
            interact_timeout: resolve_interact_timeout(),
            max_lifetime: resolve_process_timeout(),
            terminate_grace: resolve_terminate_grace(),
            retention: resolve_session_retention(),
            idle_timeout: resolve_session_idle_timeout(),
        }
    }

    /// Shell for one session: parameter -> configured default. Blank
    /// parameters fall through.
    pub fn shell_for(&self, param: Option<String>) -> String {
        param
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.default_shell.clone())
    }

    /// Maximum lifetime of one session: parameter -> configured default.
    /// `0` means unlimited.
    pub fn lifetime_for(&self, param_ms: Option<u64>) -> Option<Duration> {
        match param_ms {
            Some(ms) => non_zero_millis(ms),
            None => self.max_lifetime,
        }
    }

    /// Wait of one interaction: parameter -> configured default, capped at
    /// [`MAX_INTERACT_TIMEOUT_MS`].
    pub fn interact_timeout_for(&self, param_ms: Option<u64>) -> Duration {
        param_ms
            .map(capped_interact_timeout)
            .unwrap_or(self.interact_timeout)
    }
}

/// Tunables of the search subsystem.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub retention: Duration,
    pub default_timeout: Option<Duration>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(SEARCH_RETENTION_SECS),
            default_timeout: None,
        }
    }
}

impl SearchSettings {
    pub fn from_env() -> Self {
        Self {
            retention: Duration::from_secs(SEARCH_RETENTION_SECS),
            default_timeout: resolve_search_timeout(),
        }
    }

    /// Wall-clock limit of one search: parameter -> configured default.
    /// `0` means unlimited.
    pub fn timeout_for(&self, param_ms: Option<u64>) -> Option<Duration> {
        match param_ms {
            Some(ms) => non_zero_millis(ms),
            None => self.default_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    // Use a mutex to serialize env var tests to avoid race conditions
    // SAFETY: Tests are serialized via ENV_TEST_MUTEX to prevent data races
    static ENV_TEST_MUTEX: Lazy<StdMutex<()>> = Lazy::new(|| StdMutex::new(()));

    /// Helper to set an environment variable safely within tests.
    /// SAFETY: Must be called while holding ENV_TEST_MUTEX to prevent data races.
    unsafe fn set_env(key: &str, value: &str) {
        // SAFETY: Caller ensures ENV_TEST_MUTEX is held
        unsafe { env::set_var(key, value) };
    }

    /// Helper to remove an environment variable safely within tests.
    /// SAFETY: Must be called while holding ENV_TEST_MUTEX to prevent data races.
    unsafe fn remove_env(key: &str) {
        // SAFETY: Caller ensures ENV_TEST_MUTEX is held
        unsafe { env::remove_var(key) };
    }

    mod config_resolution {
        use super::*;

        mod quiet_period {
            use super::*;

            #[test]
            fn test_uses_env_var() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(QUIET_PERIOD_ENV_VAR, "750");
                }
                let result = resolve_quiet_period();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(QUIET_PERIOD_ENV_VAR);
                }
                assert_eq!(result, Duration::from_millis(750));
            }

            #[test]
            fn test_ignores_invalid_env_var() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(QUIET_PERIOD_ENV_VAR, "soon");
                }
                let result = resolve_quiet_period();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(QUIET_PERIOD_ENV_VAR);
                }
                assert_eq!(result, Duration::from_millis(DEFAULT_QUIET_PERIOD_MS));
            }
        }

        mod interact_timeout {
            use super::*;

            #[test]
            fn test_env_var_is_capped() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(INTERACT_TIMEOUT_ENV_VAR, "10000000");
                }
                let result = resolve_interact_timeout();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(INTERACT_TIMEOUT_ENV_VAR);
                }
                assert_eq!(result, Duration::from_millis(MAX_INTERACT_TIMEOUT_MS));
            }

            #[test]
            fn test_uses_default_without_env() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(INTERACT_TIMEOUT_ENV_VAR);
                }
                assert_eq!(
                    resolve_interact_timeout(),
                    Duration::from_millis(DEFAULT_INTERACT_TIMEOUT_MS)
                );
            }
        }

        mod process_timeout {
            use super::*;

            #[test]
            fn test_env_var_sets_limit() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(PROCESS_TIMEOUT_ENV_VAR, "60000");
                }
                let result = resolve_process_timeout();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(PROCESS_TIMEOUT_ENV_VAR);
                }
                assert_eq!(result, Some(Duration::from_secs(60)));
            }

            #[test]
            fn test_zero_env_var_means_unlimited() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(PROCESS_TIMEOUT_ENV_VAR, "0");
                }
                let result = resolve_process_timeout();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(PROCESS_TIMEOUT_ENV_VAR);
                }
                assert_eq!(result, None);
            }

            #[test]
            fn test_default_is_unlimited() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(PROCESS_TIMEOUT_ENV_VAR);
                }
                assert_eq!(resolve_process_timeout(), None);
            }
        }

        mod shell {
            use super::*;

            #[test]
            fn test_uses_env_var() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(DEFAULT_SHELL_ENV_VAR, "/bin/zsh");
                }
                let result = resolve_shell();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(DEFAULT_SHELL_ENV_VAR);
                }
                assert_eq!(result, "/bin/zsh");
            }

            #[test]
            fn test_blank_env_var_falls_through() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(DEFAULT_SHELL_ENV_VAR, "  ");
                }
                let result = resolve_shell();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(DEFAULT_SHELL_ENV_VAR);
                }
                assert_eq!(result, DEFAULT_SHELL);
            }
        }

        mod allowed_directories {
            use super::*;

            #[test]
            fn test_env_var_is_comma_separated() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(ALLOWED_DIRECTORIES_ENV_VAR, "/srv/a, /srv/b,,");
                }
                let result = resolve_allowed_directories();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(ALLOWED_DIRECTORIES_ENV_VAR);
                }
                assert_eq!(
                    result,
                    vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/b")]
                );
            }

            #[test]
            fn test_default_is_unrestricted() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(ALLOWED_DIRECTORIES_ENV_VAR);
                }
                assert!(resolve_allowed_directories().is_empty());
            }
        }

        mod blocked_commands {
            use super::*;

            #[test]
            fn test_default_list() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(BLOCKED_COMMANDS_ENV_VAR);
                }
                let blocked = resolve_blocked_commands();
                assert!(blocked.contains(&"sudo".to_string()));
                assert_eq!(blocked.len(), DEFAULT_BLOCKED_COMMANDS.len());
            }

            #[test]
            fn test_empty_env_var_disables_blocking() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(BLOCKED_COMMANDS_ENV_VAR, "");
                }
                let result = resolve_blocked_commands();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(BLOCKED_COMMANDS_ENV_VAR);
                }
                assert!(result.is_empty());
            }
        }

        mod session_idle_timeout {
            use super::*;

            #[test]
            fn test_zero_disables() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(SESSION_IDLE_TIMEOUT_ENV_VAR, "0");
                }
                let result = resolve_session_idle_timeout();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(SESSION_IDLE_TIMEOUT_ENV_VAR);
                }
                assert_eq!(result, None);
            }
        }
    }

    mod tool_parameters {
        use super::*;

        fn process_settings() -> ProcessSettings {
            ProcessSettings {
                default_shell: "/bin/configured".to_string(),
                interact_timeout: Duration::from_millis(4_000),
                max_lifetime: Some(Duration::from_secs(30)),
                ..ProcessSettings::default()
            }
        }

        #[test]
        fn test_shell_param_takes_priority() {
            let settings = process_settings();
            assert_eq!(settings.shell_for(Some("/bin/bash".to_string())), "/bin/bash");
            assert_eq!(settings.shell_for(Some("  ".to_string())), "/bin/configured");
            assert_eq!(settings.shell_for(None), "/bin/configured");
        }

        #[test]
        fn test_lifetime_param_takes_priority() {
            let settings = process_settings();
            assert_eq!(
                settings.lifetime_for(Some(2_000)),
                Some(Duration::from_millis(2_000))
            );
            assert_eq!(settings.lifetime_for(Some(0)), None);
            assert_eq!(settings.lifetime_for(None), Some(Duration::from_secs(30)));
        }

        #[test]
        fn test_interact_timeout_param_is_capped() {
            let settings = process_settings();
            assert_eq!(
                settings.interact_timeout_for(Some(1_500)),
                Duration::from_millis(1_500)
            );
            assert_eq!(
                settings.interact_timeout_for(Some(10_000_000)),
                Duration::from_millis(MAX_INTERACT_TIMEOUT_MS)
            );
            assert_eq!(
                settings.interact_timeout_for(None),
                Duration::from_millis(4_000)
            );
        }

        #[test]
        fn test_search_timeout_param_takes_priority() {
            let settings = SearchSettings {
                default_timeout: Some(Duration::from_secs(5)),
                ..SearchSettings::default()
            };
            assert_eq!(
                settings.timeout_for(Some(250)),
                Some(Duration::from_millis(250))
            );
            assert_eq!(settings.timeout_for(Some(0)), None);
            assert_eq!(settings.timeout_for(None), Some(Duration::from_secs(5)));
        }
    }

    mod blocked_command_detection {
        use super::*;

        fn blocked() -> Vec<String> {
            vec!["sudo".to_string(), "rm".to_string()]
        }

        #[test]
        fn test_first_word_blocked() {
            assert_eq!(find_blocked_command("sudo ls", &blocked()), Some("sudo"));
        }

        #[test]
        fn test_argument_is_not_blocked() {
            assert_eq!(find_blocked_command("echo sudo", &blocked()), None);
        }

        #[test]
        fn test_chained_segments_are_checked() {
            assert_eq!(
                find_blocked_command("ls && sudo reboot", &blocked()),
                Some("sudo")
            );
            assert_eq!(
                find_blocked_command("echo hi; rm -rf x", &blocked()),
                Some("rm")
            );
            assert_eq!(
                find_blocked_command("cat f | sudo tee x", &blocked()),
                Some("sudo")
            );
            assert_eq!(
                find_blocked_command("false || rm x", &blocked()),
                Some("rm")
            );
        }

        #[test]
        fn test_path_prefix_is_stripped() {
            assert_eq!(
                find_blocked_command("/usr/bin/sudo id", &blocked()),
                Some("/usr/bin/sudo")
            );
        }

        #[test]
        fn test_empty_block_list() {
            assert_eq!(find_blocked_command("sudo ls", &[]), None);
        }
    }

    mod settings {
        use super::*;

        #[test]
        fn test_process_defaults() {
            let settings = ProcessSettings::default();
            assert_eq!(settings.default_shell, DEFAULT_SHELL);
            assert_eq!(settings.quiet_period, Duration::from_millis(300));
            assert_eq!(settings.terminate_grace, Duration::from_secs(2));
            assert_eq!(settings.retention, Duration::from_secs(300));
            assert!(settings.max_lifetime.is_none());
        }

        #[test]
        fn test_search_retention_is_five_minutes() {
            assert_eq!(SearchSettings::default().retention, Duration::from_secs(300));
            assert_eq!(
                SearchSettings::from_env().retention,
                Duration::from_secs(300)
            );
        }

        #[test]
        fn test_read_lengths_are_distinct() {
            assert_ne!(DEFAULT_OUTPUT_READ_LENGTH, DEFAULT_SEARCH_READ_LENGTH);
            assert_eq!(DEFAULT_SEARCH_READ_LENGTH, 100);
        }
    }
}
