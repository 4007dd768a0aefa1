//! Conflict detection at public targets.
//!
//! Before touching a public path the executor classifies what currently
//! occupies it. Store-owned symlinks are silently replaceable; a regular
//! file with byte-identical content is adopted automatically; anything
//! else needs `--force`.

use std::io;
use std::path::Path;

use crate::fsys::{FileKind, Fs, is_not_found};
use crate::store::DataStore;

/// What occupies a public target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState {
    /// Nothing there; safe to create.
    Vacant,
    /// A symlink whose target resolves into the store, ours to replace.
    OwnedSymlink,
    /// A regular file with byte-identical content to the source, safe to
    /// adopt as a link.
    IdenticalFile,
    /// A regular file with different content; requires force.
    DifferingFile,
    /// A symlink pointing outside the store; requires force.
    ForeignSymlink,
    /// A directory; always requires force.
    Directory,
}

impl TargetState {
    /// `true` when the executor may replace the entry without `--force`.
    #[must_use]
    pub const fn replaceable(&self) -> bool {
        matches!(self, Self::Vacant | Self::OwnedSymlink | Self::IdenticalFile)
    }

    /// Human-readable description of the obstruction.
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Vacant => "vacant",
            Self::OwnedSymlink => "dodot-owned symlink",
            Self::IdenticalFile => "identical regular file",
            Self::DifferingFile => "regular file with different content",
            Self::ForeignSymlink => "symlink pointing elsewhere",
            Self::Directory => "directory",
        }
    }
}

/// Classify the entry at `target`, comparing file content against
/// `source` when both are regular files.
///
/// # Errors
///
/// Propagates I/O failures other than not-found.
pub fn inspect_target(
    fs: &dyn Fs,
    store: &DataStore,
    target: &Path,
    source: &Path,
) -> io::Result<TargetState> {
    let info = match fs.lstat(target) {
        Ok(info) => info,
        Err(err) if is_not_found(&err) => return Ok(TargetState::Vacant),
        Err(err) => return Err(err),
    };
    match info.kind {
        FileKind::Symlink => {
            let link_target = fs.read_link(target)?;
            if store.owns_link_target(&link_target) {
                Ok(TargetState::OwnedSymlink)
            } else {
                Ok(TargetState::ForeignSymlink)
            }
        }
        FileKind::Dir => Ok(TargetState::Directory),
        FileKind::File => {
            let source_is_file = fs.lstat(source).map(|i| i.kind == FileKind::File).unwrap_or(false);
            if source_is_file && fs.read_file(target)? == fs.read_file(source)? {
                Ok(TargetState::IdenticalFile)
            } else {
                Ok(TargetState::DifferingFile)
            }
        }
    }
}
