//! The data store: persistent state under the data root.
//!
//! Everything dodot remembers between runs lives under one XDG-style base
//! directory:
//!
//! ```text
//! deployed/symlink/<pack>/<name>           intermediate symlink -> source
//! deployed/symlink/<pack>/<name>.target    public target path record
//! deployed/path/<pack>/<name>              contents = directory abs path
//! deployed/shell/<pack>/<name>             contents = script abs path
//! sentinels/install/<pack>/<name>          checksum of last successful run
//! sentinels/brew/<pack>                    checksum of last successful run
//! shell/init.sh                            generated shell init script
//! backups/                                 originals displaced by --force
//! ```
//!
//! The two-link indirection is load-bearing: intermediates always point
//! into the source tree and public symlinks always point at intermediates,
//! so any dodot-owned public link is recognisable by reading its target
//! once, re-targeting is atomic at the intermediate, and clear has a
//! stable procedure.

mod shell_init;

pub use shell_init::regenerate_shell_init;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::StoreError;
use crate::fsys::{Fs, is_not_found};

/// Directory name for symlink handler state.
const SYMLINK_DIR: &str = "symlink";
/// Directory name for PATH handler state.
const PATH_DIR: &str = "path";
/// Directory name for shell-profile handler state.
const SHELL_DIR: &str = "shell";

/// Sidecar suffix recording a link's public target.
const TARGET_SUFFIX: &str = ".target";

/// Deployment state of one store-tracked item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    /// On-disk state matches the store.
    Deployed,
    /// Not yet deployed, or the source content changed.
    Pending,
    /// The public location is occupied by something dodot does not own.
    Conflict,
}

/// State plus a human-readable detail line.
#[derive(Debug, Clone)]
pub struct EntryStatus {
    /// Classified state.
    pub state: EntryState,
    /// Detail for display.
    pub details: String,
}

/// One recorded link: intermediate name, source, and public target.
#[derive(Debug, Clone)]
pub struct LinkEntry {
    /// Intermediate file name (the source's pack-relative path).
    pub name: String,
    /// Absolute source path the intermediate points at.
    pub source: PathBuf,
    /// Recorded public target, when the sidecar exists.
    pub public: Option<PathBuf>,
}

/// Handle to the data store rooted at a fixed base directory.
#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    /// Create a handle rooted at `root`. Nothing is touched on disk.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve the default data root: `$DODOT_DATA_DIR`, then
    /// `$XDG_DATA_HOME/dodot`, then `~/.local/share/dodot`.
    #[must_use]
    pub fn default_root() -> PathBuf {
        if let Ok(dir) = std::env::var("DODOT_DATA_DIR") {
            return PathBuf::from(dir);
        }
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME")
            && !xdg.is_empty()
        {
            return PathBuf::from(xdg).join("dodot");
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("dodot")
    }

    /// The store's base directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the fixed directory skeleton.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RootUnavailable`] when a directory cannot be
    /// created; fatal for the run.
    pub fn ensure_layout(&self, fs: &dyn Fs) -> Result<(), StoreError> {
        for dir in [
            self.root.join("deployed").join(SYMLINK_DIR),
            self.root.join("deployed").join(PATH_DIR),
            self.root.join("deployed").join(SHELL_DIR),
            self.root.join("sentinels").join("install"),
            self.root.join("sentinels").join("brew"),
            self.root.join("shell"),
            self.root.join("backups"),
        ] {
            fs.mkdir_all(&dir, 0o755).map_err(|source| StoreError::RootUnavailable {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    // -- symlink state ------------------------------------------------------

    /// Directory holding a pack's intermediate links.
    #[must_use]
    pub fn link_dir(&self, pack: &str) -> PathBuf {
        self.root.join("deployed").join(SYMLINK_DIR).join(pack)
    }

    /// Path of one intermediate link.
    #[must_use]
    pub fn link_intermediate_path(&self, pack: &str, name: &str) -> PathBuf {
        self.link_dir(pack).join(name)
    }

    /// Record a link: replace the intermediate and its target sidecar.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the pack subtree cannot be created or
    /// written.
    pub fn record_link(
        &self,
        fs: &dyn Fs,
        pack: &str,
        name: &str,
        source: &Path,
        public: &Path,
    ) -> Result<(), StoreError> {
        let dir = self.link_dir(pack);
        fs.mkdir_all(&dir, 0o755)
            .map_err(|source| StoreError::RootUnavailable {
                path: dir.clone(),
                source,
            })?;
        let intermediate = self.link_intermediate_path(pack, name);
        if fs.exists(&intermediate) {
            fs.remove(&intermediate)
                .map_err(|err| StoreError::from_io(intermediate.clone(), err))?;
        }
        fs.symlink(source, &intermediate)
            .map_err(|err| StoreError::from_io(intermediate.clone(), err))?;
        let sidecar = dir.join(format!("{name}{TARGET_SUFFIX}"));
        fs.write_file(&sidecar, public.to_string_lossy().as_bytes(), 0o644)
            .map_err(|err| StoreError::from_io(sidecar, err))?;
        Ok(())
    }

    /// Enumerate a pack's recorded links. An absent subtree is empty.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] for I/O failures other than not-found.
    pub fn link_entries(&self, fs: &dyn Fs, pack: &str) -> Result<Vec<LinkEntry>, StoreError> {
        let dir = self.link_dir(pack);
        let entries = match fs.read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if is_not_found(&err) => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::from_io(dir, err)),
        };
        let mut links = Vec::new();
        for entry in entries {
            if entry.name.ends_with(TARGET_SUFFIX) {
                continue;
            }
            let intermediate = self.link_intermediate_path(pack, &entry.name);
            let source = fs
                .read_link(&intermediate)
                .map_err(|err| StoreError::from_io(intermediate.clone(), err))?;
            let sidecar = dir.join(format!("{}{TARGET_SUFFIX}", entry.name));
            let public = fs
                .read_file(&sidecar)
                .ok()
                .map(|bytes| PathBuf::from(String::from_utf8_lossy(&bytes).trim().to_string()));
            links.push(LinkEntry {
                name: entry.name,
                source,
                public,
            });
        }
        Ok(links)
    }

    /// `true` when a symlink target points into this store's intermediate
    /// tree, the ownership test for public links.
    #[must_use]
    pub fn owns_link_target(&self, target: &Path) -> bool {
        target.starts_with(self.root.join("deployed").join(SYMLINK_DIR))
    }

    /// Classify one link's on-disk state.
    #[must_use]
    pub fn symlink_status(
        &self,
        fs: &dyn Fs,
        pack: &str,
        name: &str,
        public: &Path,
    ) -> EntryStatus {
        let intermediate = self.link_intermediate_path(pack, name);
        match fs.read_link(public) {
            Ok(target) if target == intermediate => EntryStatus {
                state: EntryState::Deployed,
                details: format!("linked via {}", intermediate.display()),
            },
            Ok(target) if self.owns_link_target(&target) => EntryStatus {
                state: EntryState::Pending,
                details: "linked to a different store entry".to_string(),
            },
            Ok(target) => EntryStatus {
                state: EntryState::Conflict,
                details: format!("symlink points elsewhere: {}", target.display()),
            },
            Err(err) if is_not_found(&err) => EntryStatus {
                state: EntryState::Pending,
                details: "not linked".to_string(),
            },
            Err(_) => EntryStatus {
                state: EntryState::Conflict,
                details: "target exists and is not a symlink".to_string(),
            },
        }
    }

    // -- PATH and shell-profile state ---------------------------------------

    /// Directory holding a pack's PATH markers.
    #[must_use]
    pub fn path_dir(&self, pack: &str) -> PathBuf {
        self.root.join("deployed").join(PATH_DIR).join(pack)
    }

    /// Directory holding a pack's shell-profile markers.
    #[must_use]
    pub fn shell_dir(&self, pack: &str) -> PathBuf {
        self.root.join("deployed").join(SHELL_DIR).join(pack)
    }

    /// Record a PATH directory marker.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the subtree cannot be written.
    pub fn record_path(
        &self,
        fs: &dyn Fs,
        pack: &str,
        name: &str,
        dir: &Path,
    ) -> Result<(), StoreError> {
        Self::write_marker(fs, &self.path_dir(pack), name, dir)
    }

    /// Record a shell-profile script marker.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the subtree cannot be written.
    pub fn record_shell_profile(
        &self,
        fs: &dyn Fs,
        pack: &str,
        name: &str,
        script: &Path,
    ) -> Result<(), StoreError> {
        Self::write_marker(fs, &self.shell_dir(pack), name, script)
    }

    fn write_marker(
        fs: &dyn Fs,
        dir: &Path,
        name: &str,
        recorded: &Path,
    ) -> Result<(), StoreError> {
        fs.mkdir_all(dir, 0o755).map_err(|source| StoreError::RootUnavailable {
            path: dir.to_path_buf(),
            source,
        })?;
        let marker = dir.join(name);
        fs.write_file(&marker, recorded.to_string_lossy().as_bytes(), 0o644)
            .map_err(|err| StoreError::from_io(marker, err))?;
        Ok(())
    }

    /// Enumerate a pack's PATH markers as `(name, directory)` pairs.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] for I/O failures other than not-found.
    pub fn path_markers(
        &self,
        fs: &dyn Fs,
        pack: &str,
    ) -> Result<Vec<(String, PathBuf)>, StoreError> {
        Self::read_markers(fs, &self.path_dir(pack))
    }

    /// Enumerate a pack's shell-profile markers as `(name, script)` pairs.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] for I/O failures other than not-found.
    pub fn shell_markers(
        &self,
        fs: &dyn Fs,
        pack: &str,
    ) -> Result<Vec<(String, PathBuf)>, StoreError> {
        Self::read_markers(fs, &self.shell_dir(pack))
    }

    fn read_markers(fs: &dyn Fs, dir: &Path) -> Result<Vec<(String, PathBuf)>, StoreError> {
        let entries = match fs.read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if is_not_found(&err) => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::from_io(dir.to_path_buf(), err)),
        };
        let mut markers = Vec::new();
        for entry in entries {
            let marker = dir.join(&entry.name);
            let bytes = fs
                .read_file(&marker)
                .map_err(|err| StoreError::from_io(marker, err))?;
            markers.push((
                entry.name,
                PathBuf::from(String::from_utf8_lossy(&bytes).trim().to_string()),
            ));
        }
        Ok(markers)
    }

    /// Classify a PATH registration's state.
    #[must_use]
    pub fn path_status(&self, fs: &dyn Fs, pack: &str, name: &str, dir: &Path) -> EntryStatus {
        Self::marker_status(fs, &self.path_dir(pack).join(name), dir, "on PATH")
    }

    /// Classify a shell-profile registration's state.
    #[must_use]
    pub fn shell_profile_status(
        &self,
        fs: &dyn Fs,
        pack: &str,
        name: &str,
        script: &Path,
    ) -> EntryStatus {
        Self::marker_status(fs, &self.shell_dir(pack).join(name), script, "sourced")
    }

    fn marker_status(fs: &dyn Fs, marker: &Path, expected: &Path, verb: &str) -> EntryStatus {
        match fs.read_file(marker) {
            Ok(bytes) => {
                let recorded = String::from_utf8_lossy(&bytes);
                if recorded.trim() == expected.to_string_lossy() {
                    EntryStatus {
                        state: EntryState::Deployed,
                        details: verb.to_string(),
                    }
                } else {
                    EntryStatus {
                        state: EntryState::Pending,
                        details: format!("marker records {}", recorded.trim()),
                    }
                }
            }
            Err(_) => EntryStatus {
                state: EntryState::Pending,
                details: format!("not {verb}"),
            },
        }
    }

    // -- sentinels ----------------------------------------------------------

    /// Sentinel path for one install script.
    #[must_use]
    pub fn install_sentinel_path(&self, pack: &str, name: &str) -> PathBuf {
        self.root.join("sentinels").join("install").join(pack).join(name)
    }

    /// Sentinel path for a pack's Brewfile.
    #[must_use]
    pub fn brew_sentinel_path(&self, pack: &str) -> PathBuf {
        self.root.join("sentinels").join("brew").join(pack)
    }

    /// `true` when the once-action guarded by `sentinel` must run: the
    /// sentinel is missing or records a different checksum.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] for I/O failures other than not-found.
    pub fn needs_provisioning(
        &self,
        fs: &dyn Fs,
        sentinel: &Path,
        checksum: &str,
    ) -> Result<bool, StoreError> {
        match fs.read_file(sentinel) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).trim() != checksum),
            Err(err) if is_not_found(&err) => Ok(true),
            Err(err) => Err(StoreError::from_io(sentinel.to_path_buf(), err)),
        }
    }

    /// Write a sentinel after a successful once-action.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the sentinel cannot be written.
    pub fn write_sentinel(
        &self,
        fs: &dyn Fs,
        sentinel: &Path,
        checksum: &str,
    ) -> Result<(), StoreError> {
        if let Some(parent) = sentinel.parent() {
            fs.mkdir_all(parent, 0o755)
                .map_err(|source| StoreError::RootUnavailable {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        fs.write_file(sentinel, checksum.as_bytes(), 0o644)
            .map_err(|err| StoreError::from_io(sentinel.to_path_buf(), err))
    }

    /// Modification time of a sentinel, for "last executed" display.
    #[must_use]
    pub fn sentinel_mtime(&self, fs: &dyn Fs, sentinel: &Path) -> Option<SystemTime> {
        fs.lstat(sentinel).ok().and_then(|info| info.modified)
    }

    /// Enumerate a pack's install sentinels by name.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] for I/O failures other than not-found.
    pub fn install_sentinels(&self, fs: &dyn Fs, pack: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.root.join("sentinels").join("install").join(pack);
        match fs.read_dir(&dir) {
            Ok(entries) => Ok(entries.into_iter().map(|e| e.name).collect()),
            Err(err) if is_not_found(&err) => Ok(Vec::new()),
            Err(err) => Err(StoreError::from_io(dir, err)),
        }
    }

    // -- clear support ------------------------------------------------------

    /// Handlers that have persisted state for this pack.
    #[must_use]
    pub fn handlers_with_state(&self, fs: &dyn Fs, pack: &str) -> Vec<String> {
        let mut handlers = Vec::new();
        if fs.exists(&self.link_dir(pack)) {
            handlers.push("symlink".to_string());
        }
        if fs.exists(&self.path_dir(pack)) {
            handlers.push("shell_add_path".to_string());
        }
        if fs.exists(&self.shell_dir(pack)) {
            handlers.push("shell_profile".to_string());
        }
        if fs.exists(&self.brew_sentinel_path(pack)) {
            handlers.push("homebrew".to_string());
        }
        if fs.exists(&self.root.join("sentinels").join("install").join(pack)) {
            handlers.push("install".to_string());
        }
        handlers
    }

    /// Remove all persisted state one handler holds for one pack.
    ///
    /// Exactly the pack's subtree for that handler is removed; nothing
    /// else is touched.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] for I/O failures other than not-found.
    pub fn delete_provisioning_state(
        &self,
        fs: &dyn Fs,
        pack: &str,
        handler: &str,
    ) -> Result<(), StoreError> {
        let path = match handler {
            "symlink" => self.link_dir(pack),
            "shell_add_path" => self.path_dir(pack),
            "shell_profile" => self.shell_dir(pack),
            "homebrew" => self.brew_sentinel_path(pack),
            "install" => self.root.join("sentinels").join("install").join(pack),
            _ => return Ok(()),
        };
        match fs.remove_all(&path) {
            Ok(()) => Ok(()),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(StoreError::from_io(path, err)),
        }
    }

    // -- backups ------------------------------------------------------------

    /// Move a displaced file into `backups/` with a timestamped name.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the move fails.
    pub fn back_up(&self, fs: &dyn Fs, target: &Path) -> Result<PathBuf, StoreError> {
        let stamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let name = target
            .file_name()
            .map_or_else(|| "backup".to_string(), |n| n.to_string_lossy().to_string());
        let backups = self.root.join("backups");
        fs.mkdir_all(&backups, 0o755)
            .map_err(|source| StoreError::RootUnavailable {
                path: backups.clone(),
                source,
            })?;
        let mut backup = backups.join(format!("{name}.{stamp}"));
        // Same-second collisions get a numeric suffix.
        let mut counter = 1u32;
        while fs.exists(&backup) {
            backup = backups.join(format!("{name}.{stamp}.{counter}"));
            counter += 1;
        }
        fs.rename(target, &backup)
            .map_err(|err| StoreError::from_io(target.to_path_buf(), err))?;
        Ok(backup)
    }

    /// Path of the generated shell init script.
    #[must_use]
    pub fn shell_init_path(&self) -> PathBuf {
        self.root.join("shell").join("init.sh")
    }

    /// Base directory of the deployed trees, for iteration.
    #[must_use]
    pub(crate) fn deployed_dir(&self, kind: &str) -> PathBuf {
        self.root.join("deployed").join(kind)
    }
}
