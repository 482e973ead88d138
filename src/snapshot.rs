use crate::algorithm::HashAlgorithm;
use std::collections::BTreeMap;

/// Content digests of every watched file at one point in time.
///
/// Keys are canonical absolute paths, values are hex digests. All digests in
/// one snapshot come from the same algorithm. A snapshot is never mutated
/// after construction; each scan builds a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    algorithm: HashAlgorithm,
    entries: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn new(algorithm: HashAlgorithm, entries: BTreeMap<String, String>) -> Self {
        Snapshot { algorithm, entries }
    }

    #[cfg(test)]
    pub fn empty(algorithm: HashAlgorithm) -> Self {
        Snapshot::new(algorithm, BTreeMap::new())
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn digest(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
