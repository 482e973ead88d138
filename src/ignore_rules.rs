//! Gitignore-style exclusion rules for the watched tree.
//!
//! Rules are read once per session from `.fimignore` at the watched root.
//! Matching happens against paths relative to that root, always with `/` as
//! the separator, so the same ignore file behaves identically on every
//! platform. Later lines take precedence over earlier ones, and a leading `!`
//! re-includes a path excluded by an earlier line.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

pub const IGNORE_FILENAME: &str = ".fimignore";

#[derive(Debug, thiserror::Error)]
pub enum IgnoreRulesError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
}

#[derive(Debug, Clone)]
pub struct IgnoreRules {
    matcher: Option<Gitignore>,
    skipped_lines: Vec<usize>,
}

impl IgnoreRules {
    /// A rule set that excludes nothing.
    pub fn empty() -> Self {
        IgnoreRules {
            matcher: None,
            skipped_lines: Vec::new(),
        }
    }

    /// Load the ignore file from `root`. A missing file yields an empty rule set.
    pub fn load(root: &Path) -> Result<Self, IgnoreRulesError> {
        let path = root.join(IGNORE_FILENAME);
        match std::fs::read(&path) {
            Ok(content) => {
                debug!("Loading ignore rules from {}", path.display());
                Ok(Self::from_bytes(root, &content))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::empty()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(IgnoreRulesError::PermissionDenied(path))
            }
            Err(e) => Err(IgnoreRulesError::Io { path, source: e }),
        }
    }

    #[cfg(test)]
    pub fn from_lines(root: &Path, content: &str) -> Self {
        Self::from_bytes(root, content.as_bytes())
    }

    /// Compile rules from raw ignore file content.
    ///
    /// Lines that are not valid UTF-8 or fail to compile are skipped
    /// individually with a warning; the remaining lines still apply.
    pub fn from_bytes(root: &Path, content: &[u8]) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        let mut skipped_lines = Vec::new();

        for (index, raw) in content.split(|&b| b == b'\n').enumerate() {
            let line_number = index + 1;
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = match std::str::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    warn!(
                        "Skipping line {} of {}: not valid UTF-8 ({})",
                        line_number, IGNORE_FILENAME, e
                    );
                    skipped_lines.push(line_number);
                    continue;
                }
            };
            if let Err(e) = builder.add_line(None, line) {
                warn!(
                    "Skipping malformed pattern on line {} of {}: {}",
                    line_number, IGNORE_FILENAME, e
                );
                skipped_lines.push(line_number);
            }
        }

        let matcher = match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                warn!("Failed to compile {}: {}; excluding nothing", IGNORE_FILENAME, e);
                None
            }
        };

        IgnoreRules {
            matcher,
            skipped_lines,
        }
    }

    /// Whether `relative` (relative to the watched root) is excluded.
    ///
    /// `is_dir` must be true for directories so that patterns with a trailing
    /// `/` apply to them. Callers prune excluded directories, so nothing below
    /// one is ever consulted here.
    pub fn should_exclude(&self, relative: &Path, is_dir: bool) -> bool {
        let Some(matcher) = &self.matcher else {
            return false;
        };
        let normalized = normalize_relative(relative);
        if normalized.is_empty() {
            return false;
        }
        matcher.matched(Path::new(&normalized), is_dir).is_ignore()
    }

    /// One-based line numbers that were skipped as malformed.
    pub fn skipped_lines(&self) -> &[usize] {
        &self.skipped_lines
    }

    pub fn len(&self) -> usize {
        self.matcher.as_ref().map_or(0, Gitignore::num_ignores) as usize
            + self.matcher.as_ref().map_or(0, Gitignore::num_whitelists) as usize
    }
}

/// Render a relative path with `/` separators, dropping `.` components.
pub fn normalize_relative(relative: &Path) -> String {
    let mut out = String::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                if !out.is_empty() {
                    out.push('/');
                }
                out.push_str(&name.to_string_lossy().replace('\\', "/"));
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.is_empty() {
                    out.push('/');
                }
                out.push_str("..");
            }
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}
