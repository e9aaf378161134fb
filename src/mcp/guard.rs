//! Allowed-directory enforcement.
//!
//! Every spawn working directory and every search root passes through
//! [`AllowedPathGuard::validate`] before the filesystem is touched. Paths are
//! resolved first (home expansion, relative segments, symbolic links) so that
//! `..` tricks and links pointing outside a root are rejected.
//!
//! An empty root set means unrestricted access.

use std::env;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::config::resolve_allowed_directories;
use super::error::ToolError;

#[derive(Debug, Clone, Default)]
pub struct AllowedPathGuard {
    roots: Vec<PathBuf>,
}

impl AllowedPathGuard {
    /// Build a guard over the given roots. Roots are resolved the same way
    /// candidate paths are.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = roots
            .into_iter()
            .map(|root| resolve_path(root.as_ref()))
            .collect();
        Self { roots }
    }

    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Build the guard from `AGENT_ALLOWED_DIRECTORIES`.
    pub fn from_env() -> Self {
        Self::new(resolve_allowed_directories())
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn is_unrestricted(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn is_allowed(&self, path: &Path) -> bool {
        if self.is_unrestricted() {
            return true;
        }
        let resolved = resolve_path(path);
        self.roots.iter().any(|root| resolved.starts_with(root))
    }

    /// Resolve `path` and check it against the roots.
    ///
    /// Returns the resolved path on success so callers operate on exactly
    /// what was checked.
    pub fn validate(&self, path: &str) -> Result<PathBuf, ToolError> {
        if path.trim().is_empty() {
            return Err(ToolError::Validation("Path must not be empty".to_string()));
        }

        let resolved = resolve_path(Path::new(path));
        if self.is_unrestricted() || self.roots.iter().any(|root| resolved.starts_with(root)) {
            return Ok(resolved);
        }

        debug!("Rejected path outside allowed directories: {}", resolved.display());
        Err(ToolError::Permission(format!(
            "Path '{}' is outside the allowed directories: {}",
            path,
            self.roots
                .iter()
                .map(|r| r.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    /// Default working directory for new processes: the first root, or the
    /// server's current directory when unrestricted.
    pub fn default_directory(&self) -> PathBuf {
        self.roots
            .first()
            .cloned()
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    if let Some(Component::Normal(first)) = components.next()
        && first == "~"
        && let Some(home) = env::var_os("HOME").or_else(|| env::var_os("USERPROFILE"))
    {
        return PathBuf::from(home).join(components.as_path());
    }
    path.to_path_buf()
}

/// Remove `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve a path to an absolute, symlink-free form.
///
/// The longest existing ancestor is canonicalized and the non-existent
/// remainder appended, so paths that do not exist yet still resolve
/// consistently with their parents.
pub(crate) fn resolve_path(path: &Path) -> PathBuf {
    let expanded = expand_home(path);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    };
    let normalized = normalize_lexically(&absolute);

    let mut existing = normalized.as_path();
    let mut remainder = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            for part in remainder.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                remainder.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}
