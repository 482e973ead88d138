use crate::algorithm::HashAlgorithm;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_BASELINE_FILENAME: &str = "file_hashes.toml";

#[derive(Debug, thiserror::Error)]
pub enum BaselineError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Unsupported baseline file version: {0}")]
    UnsupportedVersion(u32),
    #[error("Digest for {path} is not a valid {algorithm} digest")]
    MalformedDigest {
        path: String,
        algorithm: HashAlgorithm,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Metadata {
    version: u32,
    algorithm: HashAlgorithm,
}

/// Extracts only the version so it can be checked before anything else is
/// parsed; a future version may well be unparseable as the current one.
#[derive(Debug, Deserialize)]
struct VersionOnly {
    metadata: VersionField,
}

#[derive(Debug, Deserialize)]
struct VersionField {
    version: u32,
}

/// On-disk representation of a snapshot.
///
/// Unknown fields are tolerated so that later additive format changes remain
/// readable by this version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineFile {
    metadata: Metadata,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

impl BaselineFile {
    const SUPPORTED_VERSION: u32 = 1;

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        BaselineFile {
            metadata: Metadata {
                version: Self::SUPPORTED_VERSION,
                algorithm: snapshot.algorithm(),
            },
            entries: snapshot.entries().clone(),
        }
    }

    pub fn into_snapshot(self) -> Snapshot {
        Snapshot::new(self.metadata.algorithm, self.entries)
    }

    /// Parse a TOML string into a BaselineFile structure
    pub fn from_toml(content: &str) -> Result<Self, BaselineError> {
        let version_only: VersionOnly = toml::from_str(content)?;

        if version_only.metadata.version != Self::SUPPORTED_VERSION {
            return Err(BaselineError::UnsupportedVersion(
                version_only.metadata.version,
            ));
        }

        let baseline: BaselineFile = toml::from_str(content)?;
        baseline.validate()?;
        Ok(baseline)
    }

    /// Serialize a BaselineFile structure to TOML string
    pub fn to_toml(&self) -> Result<String, BaselineError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), BaselineError> {
        let algorithm = self.metadata.algorithm;
        for (path, digest) in &self.entries {
            if digest.len() != algorithm.hex_len()
                || !digest.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(BaselineError::MalformedDigest {
                    path: path.clone(),
                    algorithm,
                });
            }
        }
        Ok(())
    }
}

/// Persists the last known state of the watched tree.
///
/// The store only knows its file location; callers pass snapshots in and get
/// snapshots out, so tests can point it at a temporary directory.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        BaselineStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absolute form of the baseline location, resolved through its parent
    /// directory since the file itself may not exist yet.
    pub fn absolute_path(&self) -> Option<PathBuf> {
        let file_name = self.path.file_name()?;
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        Some(parent.canonicalize().ok()?.join(file_name))
    }

    /// Load the baseline, distinguishing "no baseline yet" (`Ok(None)`) from
    /// a baseline that exists but cannot be used.
    pub fn try_load(&self) -> Result<Option<Snapshot>, BaselineError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(BaselineError::PermissionDenied(self.path.clone()));
            }
            Err(e) => return Err(BaselineError::Io(e)),
        };

        let snapshot = BaselineFile::from_toml(&content)?.into_snapshot();
        debug!(
            "Loaded baseline of {} files from {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(Some(snapshot))
    }

    /// Load the baseline, treating an unusable file the same as a missing one.
    ///
    /// Monitoring must proceed even if the baseline is corrupt; the next save
    /// replaces it.
    pub fn load(&self) -> Option<Snapshot> {
        match self.try_load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "Ignoring unusable baseline {}: {}; starting from scratch",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    /// Save a snapshot atomically.
    ///
    /// Writes to a temporary file in the same directory, fsyncs it, then
    /// renames it into place, so a crash never leaves a half-written baseline.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), BaselineError> {
        use std::io::Write;

        let content = BaselineFile::from_snapshot(snapshot).to_toml()?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
            if e.kind() == ErrorKind::PermissionDenied {
                BaselineError::PermissionDenied(parent.to_path_buf())
            } else {
                BaselineError::Io(e)
            }
        })?;

        temp_file.write_all(content.as_bytes()).map_err(|e| {
            if e.kind() == ErrorKind::PermissionDenied {
                BaselineError::PermissionDenied(self.path.clone())
            } else {
                BaselineError::Io(e)
            }
        })?;

        temp_file.as_file().sync_all().map_err(BaselineError::Io)?;

        temp_file.persist(&self.path).map_err(|e| {
            if e.error.kind() == ErrorKind::PermissionDenied {
                BaselineError::PermissionDenied(self.path.clone())
            } else {
                BaselineError::Io(e.error)
            }
        })?;

        debug!(
            "Saved baseline of {} files to {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }
}
