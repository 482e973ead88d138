use crate::algorithm::HashAlgorithm;
use std::fs::{File, Metadata, OpenOptions};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKind {
    Symlink,
    /// Device, socket, FIFO or anything else that is not a regular file.
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("File vanished before it could be read: {0}")]
    Vanished(PathBuf),
    #[error("Not a regular file: {path}")]
    NotRegularFile { path: PathBuf, kind: SpecialKind },
    #[error("File modified during checksumming: {0}")]
    ConcurrentModification(PathBuf),
}

fn classify_io_error(path: &Path, e: std::io::Error) -> ChecksumError {
    match e.kind() {
        ErrorKind::PermissionDenied => ChecksumError::PermissionDenied(path.to_path_buf()),
        ErrorKind::NotFound => ChecksumError::Vanished(path.to_path_buf()),
        _ => ChecksumError::Io(e),
    }
}

/// Computes the hex digest of a regular file with concurrent modification detection.
///
/// # Behavior
/// - Refuses symlinks and special files, re-checking after a non-blocking open
///   so a FIFO or device can never block or stream forever
/// - Records the file's modification time before reading
/// - Reads the file in fixed-size chunks, so memory use does not depend on file size
/// - Verifies the modification time hasn't changed after reading
///
/// # Errors
/// - `ChecksumError::Vanished`: The file no longer exists
/// - `ChecksumError::PermissionDenied`: Insufficient permissions to read the file
/// - `ChecksumError::NotRegularFile`: The path is a symlink or special file
/// - `ChecksumError::ConcurrentModification`: File was detected as being modified while
///   checksumming. Note that the absence of this error is *not* a guarantee that the
///   file was *not* modified.
/// - `ChecksumError::Io`: Any other I/O error
pub fn checksum_file(path: &Path, algorithm: HashAlgorithm) -> Result<String, ChecksumError> {
    trace!("Checksumming {}", path.display());

    let metadata_before =
        std::fs::symlink_metadata(path).map_err(|e| classify_io_error(path, e))?;
    let file_type = metadata_before.file_type();
    if file_type.is_symlink() {
        return Err(ChecksumError::NotRegularFile {
            path: path.to_path_buf(),
            kind: SpecialKind::Symlink,
        });
    }
    if !file_type.is_file() {
        return Err(ChecksumError::NotRegularFile {
            path: path.to_path_buf(),
            kind: SpecialKind::Other,
        });
    }
    let mtime_before = metadata_before.modified().map_err(ChecksumError::Io)?;

    let mut file = open_verified(path, &metadata_before)?;
    let mut hasher = algorithm.hasher();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(ChecksumError::Io)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let metadata_after = std::fs::metadata(path).map_err(|e| classify_io_error(path, e))?;
    let mtime_after = metadata_after.modified().map_err(ChecksumError::Io)?;

    if mtime_before != mtime_after || metadata_before.len() != metadata_after.len() {
        return Err(ChecksumError::ConcurrentModification(path.to_path_buf()));
    }

    let digest = hasher.finalize_hex();

    debug!("Checksum of {} is {}", path.display(), digest);

    Ok(digest)
}

/// Open `path` for reading and confirm it is still the regular file described
/// by `expected`.
///
/// The path may have been replaced between the type check and the open. On
/// Unix the open is non-blocking, so a FIFO swapped in cannot stall the scan.
fn open_verified(path: &Path, expected: &Metadata) -> Result<File, ChecksumError> {
    let mut options = OpenOptions::new();
    options.read(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.custom_flags(libc::O_NONBLOCK | libc::O_NOFOLLOW);
    }

    let file = options.open(path).map_err(|e| classify_io_error(path, e))?;
    let opened = file.metadata().map_err(ChecksumError::Io)?;

    if !opened.file_type().is_file() {
        return Err(ChecksumError::NotRegularFile {
            path: path.to_path_buf(),
            kind: SpecialKind::Other,
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if opened.dev() != expected.dev() || opened.ino() != expected.ino() {
            return Err(ChecksumError::ConcurrentModification(path.to_path_buf()));
        }
    }
    #[cfg(not(unix))]
    let _ = expected;

    Ok(file)
}
