//! Content checksums for once-per-content actions.
//!
//! Sentinel files record the SHA-256 of the source that caused the last
//! successful run; comparing against the current source decides whether a
//! provision action needs to run again.

use sha2::{Digest as _, Sha256};
use std::path::Path;

use crate::fsys::Fs;

/// Hex-encoded SHA-256 of a byte slice.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Hex-encoded SHA-256 of a file's contents.
///
/// A missing file yields an empty checksum rather than an error; the
/// payload action fails later at run time, which keeps scanning pure.
#[must_use]
pub fn file_checksum(fs: &dyn Fs, path: &Path) -> String {
    fs.read_file(path).map_or_else(|_| String::new(), |bytes| sha256_hex(&bytes))
}
