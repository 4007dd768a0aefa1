//! Filesystem abstraction.
//!
//! A single trait, [`Fs`], covers every filesystem operation the engine
//! performs so that the scanner, executor, and data store can run against
//! either the real OS filesystem ([`OsFs`]) or an in-memory tree
//! ([`MemFs`]) in tests.
//!
//! All paths are absolute. Errors are plain [`std::io::Error`] so callers
//! can distinguish not-found from other failures via
//! [`std::io::ErrorKind::NotFound`]; absent sentinels and links mean
//! "needs work", not failure.

mod memory;
mod real;

pub use memory::MemFs;
pub use real::OsFs;

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// What a directory entry or stat result is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
    /// Symbolic link (only reported by `lstat`/`read_dir`).
    Symlink,
}

/// Metadata subset the engine cares about.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Entry kind.
    pub kind: FileKind,
    /// Size in bytes (zero for directories).
    pub len: u64,
    /// Modification time, when the backing store tracks one.
    pub modified: Option<SystemTime>,
}

impl FileInfo {
    /// `true` for directories.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    /// `true` for symlinks (meaningful only from `lstat`).
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

/// One entry from [`Fs::read_dir`].
#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    /// Entry basename.
    pub name: String,
    /// Entry kind, from `lstat` semantics (symlinks are not followed).
    pub kind: FileKind,
}

/// Uniform interface over real and in-memory filesystems.
///
/// `symlink` fails if the link path already exists; replacing an entry is
/// the executor's job (remove first, then link).
pub trait Fs: Send + Sync + std::fmt::Debug {
    /// List the immediate children of a directory, sorted by name.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error; `NotFound` when the directory
    /// does not exist.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntryInfo>>;

    /// Stat a path, following symlinks.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    fn stat(&self, path: &Path) -> io::Result<FileInfo>;

    /// Stat a path without following symlinks.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    fn lstat(&self, path: &Path) -> io::Result<FileInfo>;

    /// Read a file's entire contents.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write a file, creating or truncating it, with the given Unix mode.
    ///
    /// Idempotent with respect to existence at equal content and mode.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error; `NotFound` when the parent
    /// directory does not exist.
    fn write_file(&self, path: &Path, contents: &[u8], mode: u32) -> io::Result<()>;

    /// Create a directory and all missing parents with the given Unix mode.
    ///
    /// Succeeds if the directory already exists.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Remove a file, symlink, or empty directory.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Remove a path recursively.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    fn remove_all(&self, path: &Path) -> io::Result<()>;

    /// Create a symlink at `link` pointing at `target`.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadyExists` if `link` exists.
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

    /// Read a symlink's target.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error; `InvalidInput` when the path is
    /// not a symlink.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Rename a file or directory.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// `true` if the path exists (without following a trailing symlink).
    fn exists(&self, path: &Path) -> bool {
        self.lstat(path).is_ok()
    }
}

/// `true` for I/O errors that mean the path simply is not there.
#[must_use]
pub fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

/// Write a file atomically: stage next to the target, then rename over it.
///
/// The temp file lives in the target's directory so the rename never
/// crosses a filesystem boundary; it is removed on any failure.
///
/// # Errors
///
/// Propagates the underlying I/O error from the staging write or rename.
pub fn write_file_atomic(
    fs: &dyn Fs,
    path: &Path,
    contents: &[u8],
    mode: u32,
) -> io::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = path.with_file_name(format!(".{}.dodot-tmp", file_name.to_string_lossy()));
    fs.write_file(&tmp, contents, mode)?;
    if let Err(err) = fs.rename(&tmp, path) {
        let _ = fs.remove(&tmp);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn is_not_found_matches_kind() {
        let nf = io::Error::new(io::ErrorKind::NotFound, "gone");
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "no");
        assert!(is_not_found(&nf));
        assert!(!is_not_found(&denied));
    }

    #[test]
    fn write_file_atomic_replaces_content() {
        let fs = MemFs::new();
        fs.mkdir_all(Path::new("/home/user"), 0o755).unwrap();
        write_file_atomic(&fs, Path::new("/home/user/.gitconfig"), b"one", 0o644).unwrap();
        write_file_atomic(&fs, Path::new("/home/user/.gitconfig"), b"two", 0o644).unwrap();
        assert_eq!(fs.read_file(Path::new("/home/user/.gitconfig")).unwrap(), b"two");
        // No staging files left behind.
        let entries = fs.read_dir(Path::new("/home/user")).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn write_file_atomic_cleans_up_on_rename_failure() {
        let fs = MemFs::new();
        fs.mkdir_all(Path::new("/home/user"), 0o755).unwrap();
        // Renaming over an existing directory fails in MemFs.
        fs.mkdir_all(Path::new("/home/user/blocked"), 0o755).unwrap();
        fs.write_file(Path::new("/home/user/blocked/x"), b"", 0o644)
            .unwrap();
        let err = write_file_atomic(&fs, Path::new("/home/user/blocked"), b"data", 0o644);
        assert!(err.is_err());
        let names: Vec<String> = fs
            .read_dir(Path::new("/home/user"))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["blocked".to_string()]);
    }
}
