use crate::algorithm::HashAlgorithm;
use crate::checksum::{ChecksumError, SpecialKind, checksum_file};
use crate::dir_list::{DirListError, EntryKind, list_directory};
use crate::ignore_rules::{IGNORE_FILENAME, IgnoreRules};
use crate::snapshot::Snapshot;
use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How often a file whose mtime moved while it was being read is retried
/// before it is left out of the snapshot.
const MAX_CHECKSUM_ATTEMPTS: usize = 3;

/// Why a path found during traversal is absent from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    PermissionDenied,
    Vanished,
    Symlink,
    SpecialFile,
    ModifiedDuringRead,
    UnreadableDirectory,
    Io(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::PermissionDenied => f.write_str("permission denied"),
            SkipReason::Vanished => f.write_str("vanished during scan"),
            SkipReason::Symlink => f.write_str("symbolic link"),
            SkipReason::SpecialFile => f.write_str("not a regular file"),
            SkipReason::ModifiedDuringRead => f.write_str("kept changing while being read"),
            SkipReason::UnreadableDirectory => f.write_str("directory could not be listed"),
            SkipReason::Io(message) => write!(f, "I/O error: {message}"),
        }
    }
}

impl From<ChecksumError> for SkipReason {
    fn from(e: ChecksumError) -> Self {
        match e {
            ChecksumError::PermissionDenied(_) => SkipReason::PermissionDenied,
            ChecksumError::Vanished(_) => SkipReason::Vanished,
            ChecksumError::NotRegularFile {
                kind: SpecialKind::Symlink,
                ..
            } => SkipReason::Symlink,
            ChecksumError::NotRegularFile {
                kind: SpecialKind::Other,
                ..
            } => SkipReason::SpecialFile,
            ChecksumError::ConcurrentModification(_) => SkipReason::ModifiedDuringRead,
            ChecksumError::Io(e) => SkipReason::Io(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPath {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct ScanResult {
    pub snapshot: Snapshot,
    pub skipped: Vec<SkippedPath>,
}

/// Walks a watched tree and hashes every regular, non-excluded file.
///
/// A scan always completes: per-file and per-directory failures are recorded
/// in [`ScanResult::skipped`] and the affected paths are simply left out of
/// the snapshot.
pub struct Scanner<'a> {
    root: PathBuf,
    rules: &'a IgnoreRules,
    algorithm: HashAlgorithm,
    internal_files: Vec<PathBuf>,
}

impl<'a> Scanner<'a> {
    pub fn new(root: &Path, rules: &'a IgnoreRules, algorithm: HashAlgorithm) -> Self {
        Scanner {
            root: root.to_path_buf(),
            rules,
            algorithm,
            internal_files: Vec::new(),
        }
    }

    /// Never hash `path`, e.g. the baseline file when it lives inside the tree.
    pub fn skip_internal_file(mut self, path: PathBuf) -> Self {
        self.internal_files.push(path);
        self
    }

    pub fn scan(&self) -> ScanResult {
        let mut entries = BTreeMap::new();
        let mut skipped = Vec::new();

        match self.root.canonicalize() {
            Ok(root) => self.walk(&root, Path::new(""), &mut entries, &mut skipped),
            Err(e) => {
                warn!("Cannot resolve watched root {}: {}", self.root.display(), e);
                skipped.push(SkippedPath {
                    path: self.root.clone(),
                    reason: dir_skip_reason(&e),
                });
            }
        }

        debug!(
            "Scanned {} files under {} ({} skipped)",
            entries.len(),
            self.root.display(),
            skipped.len()
        );

        ScanResult {
            snapshot: Snapshot::new(self.algorithm, entries),
            skipped,
        }
    }

    fn walk(
        &self,
        tree_root: &Path,
        relative_dir: &Path,
        entries: &mut BTreeMap<String, String>,
        skipped: &mut Vec<SkippedPath>,
    ) {
        let current_dir = tree_root.join(relative_dir);

        let children = match list_directory(&current_dir) {
            Ok(children) => children,
            Err(DirListError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                debug!("{} vanished during scan", current_dir.display());
                skipped.push(SkippedPath {
                    path: current_dir,
                    reason: SkipReason::Vanished,
                });
                return;
            }
            Err(e) => {
                warn!("Skipping {}: {}", current_dir.display(), e);
                skipped.push(SkippedPath {
                    path: current_dir,
                    reason: match e {
                        DirListError::PermissionDenied(_) => SkipReason::PermissionDenied,
                        DirListError::Io(_) => SkipReason::UnreadableDirectory,
                    },
                });
                return;
            }
        };

        for child in children {
            let relative = relative_dir.join(&child.name);
            let absolute = tree_root.join(&relative);

            if child.kind != EntryKind::Dir && child.name == IGNORE_FILENAME {
                continue;
            }
            if self.internal_files.iter().any(|p| p == &absolute) {
                continue;
            }

            match child.kind {
                EntryKind::Dir => {
                    if self.rules.should_exclude(&relative, true) {
                        debug!("Ignoring directory {}", relative.display());
                        continue;
                    }
                    self.walk(tree_root, &relative, entries, skipped);
                }
                EntryKind::File => {
                    if self.rules.should_exclude(&relative, false) {
                        debug!("Ignoring {}", relative.display());
                        continue;
                    }
                    match self.checksum_with_retry(&absolute) {
                        Ok(digest) => {
                            entries.insert(absolute.to_string_lossy().into_owned(), digest);
                        }
                        Err(reason) => record_skip(skipped, absolute, reason),
                    }
                }
                EntryKind::Symlink | EntryKind::Special => {
                    if self.rules.should_exclude(&relative, false) {
                        continue;
                    }
                    let reason = if child.kind == EntryKind::Symlink {
                        SkipReason::Symlink
                    } else {
                        SkipReason::SpecialFile
                    };
                    record_skip(skipped, absolute, reason);
                }
            }
        }
    }

    fn checksum_with_retry(&self, path: &Path) -> Result<String, SkipReason> {
        let mut attempt = 1;
        loop {
            match checksum_file(path, self.algorithm) {
                Ok(digest) => return Ok(digest),
                Err(ChecksumError::ConcurrentModification(_)) if attempt < MAX_CHECKSUM_ATTEMPTS => {
                    debug!("{} changed while being read, retrying", path.display());
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn record_skip(skipped: &mut Vec<SkippedPath>, path: PathBuf, reason: SkipReason) {
    match reason {
        SkipReason::Symlink | SkipReason::Vanished => {
            debug!("Skipping {}: {}", path.display(), reason);
        }
        _ => warn!("Skipping {}: {}", path.display(), reason),
    }
    skipped.push(SkippedPath { path, reason });
}

fn dir_skip_reason(e: &std::io::Error) -> SkipReason {
    match e.kind() {
        ErrorKind::NotFound => SkipReason::Vanished,
        ErrorKind::PermissionDenied => SkipReason::PermissionDenied,
        _ => SkipReason::Io(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn key(root: &Path, relative: &str) -> String {
        root.canonicalize()
            .unwrap()
            .join(relative)
            .to_string_lossy()
            .into_owned()
    }

    fn scan(root: &Path, rules: &IgnoreRules, algorithm: HashAlgorithm) -> ScanResult {
        Scanner::new(root, rules, algorithm).scan()
    }

    fn scan_plain(root: &Path) -> ScanResult {
        scan(root, &IgnoreRules::empty(), HashAlgorithm::Sha256)
    }

    #[test]
    fn test_scan_hashes_nested_files_with_absolute_keys() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("a.txt"), "A").unwrap();
        fs::create_dir_all(root.join("dir1/dir2")).unwrap();
        fs::write(root.join("dir1/dir2/b.txt"), "B").unwrap();

        let result = scan_plain(root);

        let snapshot = &result.snapshot;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.algorithm(), HashAlgorithm::Sha256);
        assert_eq!(
            snapshot.digest(&key(root, "a.txt")),
            Some(HashAlgorithm::Sha256.compute_digest(b"A").as_str())
        );
        assert_eq!(
            snapshot.digest(&key(root, "dir1/dir2/b.txt")),
            Some(HashAlgorithm::Sha256.compute_digest(b"B").as_str())
        );
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_scan_uses_requested_algorithm() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "A").unwrap();

        let result = scan(temp.path(), &IgnoreRules::empty(), HashAlgorithm::Sha512);

        assert_eq!(result.snapshot.algorithm(), HashAlgorithm::Sha512);
        assert_eq!(
            result.snapshot.digest(&key(temp.path(), "a.txt")),
            Some(HashAlgorithm::Sha512.compute_digest(b"A").as_str())
        );
    }

    #[test]
    fn test_scan_is_stable_when_nothing_changes() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "A").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/b.txt"), "B").unwrap();

        let first = scan_plain(temp.path());
        let second = scan_plain(temp.path());

        assert_eq!(first.snapshot, second.snapshot);
    }

    #[test]
    fn test_scan_detects_same_size_content_change() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "AAAA").unwrap();
        let before = scan_plain(temp.path());

        fs::write(temp.path().join("a.txt"), "AAAB").unwrap();
        let after = scan_plain(temp.path());

        let k = key(temp.path(), "a.txt");
        assert_ne!(before.snapshot.digest(&k), after.snapshot.digest(&k));
    }

    #[test]
    fn test_scan_honors_ignore_patterns() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join(IGNORE_FILENAME), "*.log\n").unwrap();
        fs::write(root.join("a.txt"), "A").unwrap();
        fs::write(root.join("b.log"), "B").unwrap();

        let rules = IgnoreRules::load(root).unwrap();
        let result = scan(root, &rules, HashAlgorithm::Sha256);

        let paths: Vec<_> = result.snapshot.paths().collect();
        assert_eq!(paths, vec![key(root, "a.txt").as_str()]);
    }

    #[test]
    fn test_scan_prunes_excluded_directories() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join(IGNORE_FILENAME), ".git/\n").unwrap();
        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::write(root.join(".git/objects/pack"), "x").unwrap();
        fs::write(root.join("kept.txt"), "k").unwrap();

        let rules = IgnoreRules::load(root).unwrap();
        let result = scan(root, &rules, HashAlgorithm::Sha256);

        assert_eq!(result.snapshot.len(), 1);
        assert!(result.snapshot.contains(&key(root, "kept.txt")));
    }

    #[test]
    #[cfg(unix)]
    fn test_scan_never_enters_excluded_unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join(IGNORE_FILENAME), "private/\n").unwrap();
        fs::create_dir(root.join("private")).unwrap();
        fs::set_permissions(root.join("private"), fs::Permissions::from_mode(0o000)).unwrap();

        let rules = IgnoreRules::load(root).unwrap();
        let result = scan(root, &rules, HashAlgorithm::Sha256);

        fs::set_permissions(root.join("private"), fs::Permissions::from_mode(0o755)).unwrap();

        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_scan_negation_reincludes_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join(IGNORE_FILENAME), "*.log\n!keep.log\n").unwrap();
        fs::write(root.join("drop.log"), "d").unwrap();
        fs::write(root.join("keep.log"), "k").unwrap();

        let rules = IgnoreRules::load(root).unwrap();
        let result = scan(root, &rules, HashAlgorithm::Sha256);

        let paths: Vec<_> = result.snapshot.paths().collect();
        assert_eq!(paths, vec![key(root, "keep.log").as_str()]);
    }

    #[test]
    fn test_scan_never_hashes_root_ignore_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join(IGNORE_FILENAME), "# nothing\n").unwrap();
        fs::write(root.join("a.txt"), "A").unwrap();

        let result = scan_plain(root);

        assert_eq!(result.snapshot.len(), 1);
        assert!(!result.snapshot.contains(&key(root, IGNORE_FILENAME)));
    }

    #[test]
    fn test_scan_never_hashes_nested_ignore_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("sub").join(IGNORE_FILENAME), "*.txt\n").unwrap();
        fs::write(root.join("sub/deeper").join(IGNORE_FILENAME), "").unwrap();
        fs::write(root.join("sub/a.txt"), "A").unwrap();

        let result = scan_plain(root);

        let paths: Vec<&str> = result.snapshot.paths().collect();
        assert_eq!(paths, vec![key(root, "sub/a.txt").as_str()]);
    }

    #[test]
    fn test_scan_skips_internal_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("a.txt"), "A").unwrap();
        fs::write(root.join("baseline.toml"), "state").unwrap();

        let rules = IgnoreRules::empty();
        let result = Scanner::new(root, &rules, HashAlgorithm::Sha256)
            .skip_internal_file(root.canonicalize().unwrap().join("baseline.toml"))
            .scan();

        assert_eq!(result.snapshot.len(), 1);
        assert!(result.snapshot.contains(&key(root, "a.txt")));
    }

    #[test]
    fn test_scan_of_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let gone = temp.path().join("gone");

        let result = scan_plain(&gone);

        assert!(result.snapshot.is_empty());
        assert_eq!(
            result.skipped,
            vec![SkippedPath {
                path: gone,
                reason: SkipReason::Vanished
            }]
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_scan_skips_symlinks_and_fifos() {
        use nix::sys::stat::Mode;
        use nix::unistd::mkfifo;

        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("target.txt"), "t").unwrap();
        std::os::unix::fs::symlink(root.join("target.txt"), root.join("link")).unwrap();
        fs::create_dir(root.join("real_dir")).unwrap();
        fs::write(root.join("real_dir/inner.txt"), "i").unwrap();
        std::os::unix::fs::symlink(root.join("real_dir"), root.join("dir_link")).unwrap();
        mkfifo(&root.join("pipe"), Mode::S_IRWXU).unwrap();

        let result = scan_plain(root);

        assert_eq!(result.snapshot.len(), 2);
        assert!(result.snapshot.contains(&key(root, "target.txt")));
        assert!(result.snapshot.contains(&key(root, "real_dir/inner.txt")));

        let mut reasons: Vec<_> = result
            .skipped
            .iter()
            .map(|s| (s.path.file_name().unwrap().to_str().unwrap(), s.reason.clone()))
            .collect();
        reasons.sort_by(|a, b| a.0.cmp(b.0));
        assert_eq!(
            reasons,
            vec![
                ("dir_link", SkipReason::Symlink),
                ("link", SkipReason::Symlink),
                ("pipe", SkipReason::SpecialFile),
            ]
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_scan_continues_past_unreadable_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("open.txt"), "o").unwrap();
        fs::write(root.join("locked.txt"), "l").unwrap();
        fs::set_permissions(root.join("locked.txt"), fs::Permissions::from_mode(0o000)).unwrap();

        if fs::File::open(root.join("locked.txt")).is_ok() {
            // Running as root; mode bits are not enforced.
            return;
        }

        let result = scan_plain(root);

        assert_eq!(result.snapshot.len(), 1);
        assert!(result.snapshot.contains(&key(root, "open.txt")));
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason, SkipReason::PermissionDenied);
    }
}
