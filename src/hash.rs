//! Content hash for the blob store.
//!
//! Screenshots are addressed by the first 16 hex characters of their
//! SHA-256 digest (64 bits of collision resistance — sufficient for the
//! small, per-document blob sets this system deals with; see
//! `SPEC_FULL.md` §4.1). `BlobHash` is a small value type around that hex
//! string so callers don't pass bare `String`s around for something with
//! format invariants.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::DocsError;

/// Number of hex characters retained from the full SHA-256 digest.
pub const HASH_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobHash([u8; HASH_LEN / 2]);

impl BlobHash {
    /// Hash the full contents of `path`, streaming it in chunks so large
    /// screenshots don't need to be fully buffered up front.
    pub fn of_file(path: &Path) -> Result<Self, DocsError> {
        use std::io::Read;
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self::of_digest(&hasher.finalize()))
    }

    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self::of_digest(&hasher.finalize())
    }

    fn of_digest(digest: &[u8]) -> Self {
        let mut truncated = [0u8; HASH_LEN / 2];
        truncated.copy_from_slice(&digest[..HASH_LEN / 2]);
        Self(truncated)
    }
}

impl Display for BlobHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for BlobHash {
    type Err = DocsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_LEN {
            return Err(DocsError::InvalidInput(format!(
                "`{s}` is not a valid blob hash (expected {HASH_LEN} hex chars)"
            )));
        }
        let bytes = hex::decode(s)
            .map_err(|e| DocsError::InvalidInput(format!("`{s}` is not valid hex: {e}")))?;
        let mut out = [0u8; HASH_LEN / 2];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl TryFrom<String> for BlobHash {
    type Error = DocsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlobHash> for String {
    fn from(value: BlobHash) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_fromstr() {
        let hash = BlobHash::of_bytes(b"hello world");
        let text = hash.to_string();
        assert_eq!(text.len(), HASH_LEN);
        assert_eq!(text.parse::<BlobHash>().unwrap(), hash);
    }

    #[test]
    fn same_content_same_hash() {
        assert_eq!(BlobHash::of_bytes(b"abc"), BlobHash::of_bytes(b"abc"));
        assert_ne!(BlobHash::of_bytes(b"abc"), BlobHash::of_bytes(b"abd"));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("deadbeef".parse::<BlobHash>().is_err());
    }
}
