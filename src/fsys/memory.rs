//! In-memory [`Fs`] implementation for tests.
//!
//! Stores a flat map of absolute paths to nodes. Semantics mirror the real
//! filesystem closely enough for the engine: symlink chains are followed by
//! `stat` but not `lstat`, `symlink` refuses existing link paths, `remove`
//! refuses non-empty directories, and `rename` refuses to clobber a
//! directory.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use super::{DirEntryInfo, FileInfo, FileKind, Fs};

/// Upper bound on symlink hops before reporting a loop.
const MAX_LINK_HOPS: usize = 16;

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File {
        data: Vec<u8>,
        modified: SystemTime,
    },
    Symlink {
        target: PathBuf,
    },
}

/// An in-memory filesystem rooted at `/`.
#[derive(Debug, Default)]
pub struct MemFs {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
}

impl MemFs {
    /// Create an empty in-memory filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, Node>> {
        self.nodes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such path: {}", path.display()),
        )
    }

    fn is_root(path: &Path) -> bool {
        path.parent().is_none()
    }

    fn node_info(node: &Node) -> FileInfo {
        match node {
            Node::Dir => FileInfo {
                kind: FileKind::Dir,
                len: 0,
                modified: None,
            },
            Node::File { data, modified } => FileInfo {
                kind: FileKind::File,
                len: data.len() as u64,
                modified: Some(*modified),
            },
            Node::Symlink { .. } => FileInfo {
                kind: FileKind::Symlink,
                len: 0,
                modified: None,
            },
        }
    }

    /// Resolve a path by following symlinks at its final component.
    fn resolve(
        nodes: &BTreeMap<PathBuf, Node>,
        path: &Path,
    ) -> io::Result<(PathBuf, FileInfo)> {
        let mut current = path.to_path_buf();
        for _ in 0..MAX_LINK_HOPS {
            if Self::is_root(&current) {
                return Ok((
                    current,
                    FileInfo {
                        kind: FileKind::Dir,
                        len: 0,
                        modified: None,
                    },
                ));
            }
            match nodes.get(&current) {
                None => return Err(Self::not_found(&current)),
                Some(Node::Symlink { target }) => {
                    current = Self::absolutize(&current, target);
                }
                Some(node) => return Ok((current, Self::node_info(node))),
            }
        }
        Err(io::Error::other(format!(
            "too many symlink hops at {}",
            path.display()
        )))
    }

    /// Resolve a (possibly relative) link target against the link's parent.
    fn absolutize(link: &Path, target: &Path) -> PathBuf {
        if target.is_absolute() {
            target.to_path_buf()
        } else {
            link.parent().map_or_else(|| target.to_path_buf(), |p| p.join(target))
        }
    }

    fn parent_must_exist(
        nodes: &BTreeMap<PathBuf, Node>,
        path: &Path,
    ) -> io::Result<()> {
        let Some(parent) = path.parent() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path has no parent",
            ));
        };
        if Self::is_root(parent) || matches!(nodes.get(parent), Some(Node::Dir)) {
            Ok(())
        } else {
            Err(Self::not_found(parent))
        }
    }

    fn has_children(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> bool {
        nodes.keys().any(|k| k.parent() == Some(path))
    }
}

impl Fs for MemFs {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntryInfo>> {
        let nodes = self.lock();
        if !Self::is_root(path) {
            match nodes.get(path) {
                Some(Node::Dir) => {}
                Some(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::NotADirectory,
                        format!("not a directory: {}", path.display()),
                    ));
                }
                None => return Err(Self::not_found(path)),
            }
        }
        let mut entries: Vec<DirEntryInfo> = nodes
            .iter()
            .filter(|(k, _)| k.parent() == Some(path))
            .map(|(k, node)| DirEntryInfo {
                name: k
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                kind: Self::node_info(node).kind,
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        let nodes = self.lock();
        Self::resolve(&nodes, path).map(|(_, info)| info)
    }

    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        let nodes = self.lock();
        if Self::is_root(path) {
            return Ok(FileInfo {
                kind: FileKind::Dir,
                len: 0,
                modified: None,
            });
        }
        nodes
            .get(path)
            .map(Self::node_info)
            .ok_or_else(|| Self::not_found(path))
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        let nodes = self.lock();
        let (resolved, _) = Self::resolve(&nodes, path)?;
        match nodes.get(&resolved) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            )),
            None => Err(Self::not_found(path)),
        }
    }

    fn write_file(&self, path: &Path, contents: &[u8], _mode: u32) -> io::Result<()> {
        let mut nodes = self.lock();
        Self::parent_must_exist(&nodes, path)?;
        if matches!(nodes.get(path), Some(Node::Dir)) {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            ));
        }
        nodes.insert(
            path.to_path_buf(),
            Node::File {
                data: contents.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn mkdir_all(&self, path: &Path, _mode: u32) -> io::Result<()> {
        let mut nodes = self.lock();
        let mut ancestors: Vec<&Path> = path.ancestors().collect();
        ancestors.reverse();
        for ancestor in ancestors {
            if Self::is_root(ancestor) {
                continue;
            }
            match nodes.get(ancestor) {
                Some(Node::Dir) => {}
                Some(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("not a directory: {}", ancestor.display()),
                    ));
                }
                None => {
                    nodes.insert(ancestor.to_path_buf(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let mut nodes = self.lock();
        match nodes.get(path) {
            None => return Err(Self::not_found(path)),
            Some(Node::Dir) => {
                if Self::has_children(&nodes, path) {
                    return Err(io::Error::new(
                        io::ErrorKind::DirectoryNotEmpty,
                        format!("directory not empty: {}", path.display()),
                    ));
                }
            }
            Some(_) => {}
        }
        nodes.remove(path);
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let mut nodes = self.lock();
        if !nodes.contains_key(path) {
            return Err(Self::not_found(path));
        }
        // A symlink is removed without following it.
        if matches!(nodes.get(path), Some(Node::Symlink { .. } | Node::File { .. })) {
            nodes.remove(path);
            return Ok(());
        }
        let doomed: Vec<PathBuf> = nodes
            .keys()
            .filter(|k| k.starts_with(path))
            .cloned()
            .collect();
        for key in doomed {
            nodes.remove(&key);
        }
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        let mut nodes = self.lock();
        Self::parent_must_exist(&nodes, link)?;
        if nodes.contains_key(link) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("link path exists: {}", link.display()),
            ));
        }
        nodes.insert(
            link.to_path_buf(),
            Node::Symlink {
                target: target.to_path_buf(),
            },
        );
        Ok(())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        let nodes = self.lock();
        match nodes.get(path) {
            Some(Node::Symlink { target }) => Ok(target.clone()),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a symlink: {}", path.display()),
            )),
            None => Err(Self::not_found(path)),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut nodes = self.lock();
        if !nodes.contains_key(from) {
            return Err(Self::not_found(from));
        }
        if matches!(nodes.get(to), Some(Node::Dir)) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("target is a directory: {}", to.display()),
            ));
        }
        Self::parent_must_exist(&nodes, to)?;
        let moved: Vec<(PathBuf, Node)> = nodes
            .iter()
            .filter(|(k, _)| k.starts_with(from))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, _) in &moved {
            nodes.remove(key);
        }
        for (key, node) in moved {
            let suffix = key.strip_prefix(from).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "rename prefix mismatch")
            })?;
            let new_key = if suffix.as_os_str().is_empty() {
                to.to_path_buf()
            } else {
                to.join(suffix)
            };
            nodes.insert(new_key, node);
        }
        Ok(())
    }
}
