//! Non-recursive directory listing used by the scanner.
//!
//! Lists the immediate children of one directory and classifies each without
//! following symlinks. Entries that disappear between `read_dir` and the
//! metadata lookup are dropped, since the tree may be changing underneath us.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum DirListError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    /// Devices, sockets, FIFOs.
    Special,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    pub kind: EntryKind,
}

pub fn list_directory(dir: &Path) -> Result<Vec<DirEntry>, DirListError> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| {
        if e.kind() == ErrorKind::PermissionDenied {
            DirListError::PermissionDenied(dir.to_path_buf())
        } else {
            DirListError::Io(e)
        }
    })?;

    let mut entries = Vec::new();

    for entry in read_dir {
        let entry = entry.map_err(DirListError::Io)?;
        let path = entry.path();

        let metadata = match std::fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} vanished while listing", path.display());
                continue;
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(DirListError::PermissionDenied(path));
            }
            Err(e) => return Err(DirListError::Io(e)),
        };

        let file_type = metadata.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Special
        };

        entries.push(DirEntry {
            name: entry.file_name(),
            kind,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(entries)
}
