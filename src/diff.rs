use crate::snapshot::Snapshot;
use crate::util::hashing::FieldHasher;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    Unchanged,
}

impl ChangeKind {
    pub fn code(self) -> &'static str {
        match self {
            ChangeKind::Added => "A",
            ChangeKind::Removed => "R",
            ChangeKind::Modified => "M",
            ChangeKind::Unchanged => ".",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::Added => "Added",
            ChangeKind::Removed => "Removed",
            ChangeKind::Modified => "Modified",
            ChangeKind::Unchanged => "Unchanged",
        }
    }
}

/// Classification of every path seen in either of two snapshots.
///
/// The four sets are disjoint and together cover the union of both key sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub unchanged: BTreeSet<String>,
}

/// Compare `current` against `baseline`.
///
/// Without a baseline (first run) every current path is `Added`. Digests are
/// compared by exact string equality.
pub fn diff(baseline: Option<&Snapshot>, current: &Snapshot) -> DiffReport {
    let mut report = DiffReport::default();

    let Some(baseline) = baseline else {
        report.added = current.paths().map(str::to_string).collect();
        return report;
    };

    for (path, digest) in current.entries() {
        match baseline.digest(path) {
            None => report.added.insert(path.clone()),
            Some(old) if old == digest => report.unchanged.insert(path.clone()),
            Some(_) => report.modified.insert(path.clone()),
        };
    }

    for path in baseline.paths() {
        if !current.contains(path) {
            report.removed.insert(path.to_string());
        }
    }

    report
}

impl DiffReport {
    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }

    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    #[cfg(test)]
    pub fn total(&self) -> usize {
        self.change_count() + self.unchanged.len()
    }

    #[cfg(test)]
    pub fn classify(&self, path: &str) -> Option<ChangeKind> {
        if self.added.contains(path) {
            Some(ChangeKind::Added)
        } else if self.removed.contains(path) {
            Some(ChangeKind::Removed)
        } else if self.modified.contains(path) {
            Some(ChangeKind::Modified)
        } else if self.unchanged.contains(path) {
            Some(ChangeKind::Unchanged)
        } else {
            None
        }
    }

    /// All classified paths, sorted by path.
    pub fn entries(&self) -> Vec<(ChangeKind, &str)> {
        let mut entries: Vec<(ChangeKind, &str)> = self
            .added
            .iter()
            .map(|p| (ChangeKind::Added, p.as_str()))
            .chain(self.removed.iter().map(|p| (ChangeKind::Removed, p.as_str())))
            .chain(self.modified.iter().map(|p| (ChangeKind::Modified, p.as_str())))
            .chain(self.unchanged.iter().map(|p| (ChangeKind::Unchanged, p.as_str())))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(b.1));
        entries
    }

    /// A unique fingerprint of the change set, ignoring unchanged paths.
    ///
    /// Two cycles that observe exactly the same additions, removals and
    /// modifications produce the same fingerprint. This is currently a
    /// Base64-encoded SHA-256.
    pub fn fingerprint(&self) -> String {
        let changes: Vec<_> = self
            .entries()
            .into_iter()
            .filter(|(kind, _)| *kind != ChangeKind::Unchanged)
            .collect();

        let mut hasher = FieldHasher::new();
        hasher.count(changes.len() as u64);
        for (kind, path) in changes {
            hasher.field(path.as_bytes()).field(kind.code().as_bytes());
        }

        hasher.finish_base64()
    }
}
