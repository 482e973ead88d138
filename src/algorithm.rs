//! Named digest strategies.
//!
//! The set of algorithms is closed: a name is resolved once at startup and an
//! unknown name is rejected there, never per file.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown hash algorithm '{name}' (supported: {})", HashAlgorithm::NAMES.join(", "))]
pub struct UnknownAlgorithm {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 4] = [
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    pub const NAMES: [&'static str; 4] = ["sha224", "sha256", "sha384", "sha512"];

    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Length of a hex encoded digest produced by this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            HashAlgorithm::Sha224 => 56,
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha384 => 96,
            HashAlgorithm::Sha512 => 128,
        }
    }

    /// Start an incremental digest for streaming input.
    pub fn hasher(self) -> StreamingDigest {
        match self {
            HashAlgorithm::Sha224 => StreamingDigest::Sha224(Sha224::new()),
            HashAlgorithm::Sha256 => StreamingDigest::Sha256(Sha256::new()),
            HashAlgorithm::Sha384 => StreamingDigest::Sha384(Sha384::new()),
            HashAlgorithm::Sha512 => StreamingDigest::Sha512(Sha512::new()),
        }
    }

    /// Hex digest of an in-memory byte slice.
    #[cfg(test)]
    pub fn compute_digest(self, bytes: &[u8]) -> String {
        let mut hasher = self.hasher();
        hasher.update(bytes);
        hasher.finalize_hex()
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        HashAlgorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == wanted)
            .ok_or_else(|| UnknownAlgorithm {
                name: s.to_string(),
            })
    }
}

pub enum StreamingDigest {
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl StreamingDigest {
    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            StreamingDigest::Sha224(h) => h.update(bytes),
            StreamingDigest::Sha256(h) => h.update(bytes),
            StreamingDigest::Sha384(h) => h.update(bytes),
            StreamingDigest::Sha512(h) => h.update(bytes),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            StreamingDigest::Sha224(h) => format!("{:x}", h.finalize()),
            StreamingDigest::Sha256(h) => format!("{:x}", h.finalize()),
            StreamingDigest::Sha384(h) => format!("{:x}", h.finalize()),
            StreamingDigest::Sha512(h) => format!("{:x}", h.finalize()),
        }
    }
}
