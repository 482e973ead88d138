//! Length-prefixed field encoding for change-set fingerprints.

use base64::Engine;
use sha2::{Digest, Sha256};

/// Accumulates typed fields into a SHA-256 so that distinct field sequences
/// never produce the same byte stream.
#[derive(Default)]
pub(crate) struct FieldHasher {
    inner: Sha256,
}

impl FieldHasher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Byte field, prefixed with its length as a big-endian `u64`.
    pub(crate) fn field(&mut self, bytes: &[u8]) -> &mut Self {
        let len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        self.inner.update(len.to_be_bytes());
        self.inner.update(bytes);
        self
    }

    pub(crate) fn count(&mut self, value: u64) -> &mut Self {
        self.inner.update(value.to_be_bytes());
        self
    }

    pub(crate) fn finish_base64(self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.inner.finalize())
    }
}
