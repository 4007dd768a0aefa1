// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed environment (dotfiles root, home,
// data dir) and a RunContext wired to the real filesystem, so each
// integration test exercises actual symlinks without repeating setup
// boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use dodot_cli::context::RunContext;
use dodot_cli::exec::SystemExecutor;
use dodot_cli::executor::RunOptions;
use dodot_cli::fsys::OsFs;
use dodot_cli::handlers::HandlerEnv;
use dodot_cli::logging::Logger;
use dodot_cli::registries;
use dodot_cli::store::DataStore;

/// An isolated environment: `dotfiles/`, `home/`, and `data/` under one
/// temp directory, deleted on drop.
pub struct TestBed {
    /// Keeps the directory alive.
    pub tmp: tempfile::TempDir,
    /// The dotfiles root.
    pub root: PathBuf,
    /// The fake home directory.
    pub home: PathBuf,
    /// The data store root.
    pub data: PathBuf,
}

impl TestBed {
    /// Create the three directories.
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let base = dunce::canonicalize(tmp.path()).expect("canonicalize temp dir");
        let root = base.join("dotfiles");
        let home = base.join("home");
        let data = base.join("data");
        for dir in [&root, &home, &data] {
            std::fs::create_dir_all(dir).expect("create test dirs");
        }
        Self {
            tmp,
            root,
            home,
            data,
        }
    }

    /// Create a pack directory and return its path.
    pub fn make_pack(&self, name: &str) -> PathBuf {
        let pack = self.root.join(name);
        std::fs::create_dir_all(&pack).expect("create pack dir");
        pack
    }

    /// Write a file inside a pack.
    pub fn pack_file(&self, pack: &str, name: &str, contents: &str) -> PathBuf {
        let path = self.root.join(pack).join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, contents).expect("write pack file");
        path
    }

    /// Write an executable file inside a pack.
    #[cfg(unix)]
    pub fn pack_script(&self, pack: &str, name: &str, contents: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt as _;
        let path = self.pack_file(pack, name, contents);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        path
    }

    /// Build a context over the real filesystem and system executor.
    pub fn context(&self, options: RunOptions) -> RunContext {
        RunContext {
            fs: Arc::new(OsFs),
            store: DataStore::new(self.data.clone()),
            registries: registries::builtin(),
            runner: Arc::new(SystemExecutor),
            log: Arc::new(Logger::new(options.dry_run)),
            env: HandlerEnv {
                home: self.home.clone(),
                user: "tester".to_string(),
                shell: "/bin/sh".to_string(),
                hostname: "testbed".to_string(),
            },
            root: self.root.clone(),
            options,
            parallel: false,
            cancel: Arc::new(AtomicBool::new(false)),
            global_matchers: Vec::new(),
        }
    }

    /// Context with default options.
    pub fn default_context(&self) -> RunContext {
        self.context(RunOptions::default())
    }

    /// Read a file under home as a string.
    pub fn home_contents(&self, name: &str) -> String {
        std::fs::read_to_string(self.home.join(name)).expect("read home file")
    }

    /// The store handle for direct assertions.
    pub fn store(&self) -> DataStore {
        DataStore::new(self.data.clone())
    }
}

/// Assert that `link` is a symlink resolving (via the intermediate) to
/// `source`.
pub fn assert_two_link_chain(link: &Path, data_root: &Path, source: &Path) {
    let meta = std::fs::symlink_metadata(link).expect("public link exists");
    assert!(meta.is_symlink(), "{} should be a symlink", link.display());
    let intermediate = std::fs::read_link(link).expect("read public link");
    assert!(
        intermediate.starts_with(data_root.join("deployed").join("symlink")),
        "public link must point into the store, got {}",
        intermediate.display()
    );
    let final_target = std::fs::read_link(&intermediate).expect("read intermediate link");
    assert_eq!(
        final_target,
        source,
        "intermediate must point at the pack source"
    );
}

/// Snapshot of every path under a directory with symlink targets and file
/// contents, for idempotence comparisons.
pub fn tree_snapshot(dir: &Path) -> Vec<(PathBuf, String)> {
    let mut entries = Vec::new();
    walk(dir, &mut entries);
    entries.sort();
    entries
}

fn walk(dir: &Path, out: &mut Vec<(PathBuf, String)>) {
    let Ok(read) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in read.flatten() {
        let path = entry.path();
        let meta = std::fs::symlink_metadata(&path).expect("lstat");
        if meta.is_symlink() {
            let target = std::fs::read_link(&path).expect("read link");
            out.push((path, format!("-> {}", target.display())));
        } else if meta.is_dir() {
            out.push((path.clone(), "dir".to_string()));
            walk(&path, out);
        } else {
            let contents = std::fs::read(&path).expect("read file");
            out.push((path, format!("file:{}", contents.len())));
        }
    }
}
