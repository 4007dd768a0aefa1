//! Generated shell init script.
//!
//! `shell/init.sh` is a pure function of the store's `deployed/path` and
//! `deployed/shell` trees: it prepends every registered directory to
//! `PATH`, sources every registered script, and exports two traceability
//! variables naming the packs that contributed entries. The executor
//! regenerates it after any change affecting either tree.

use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::fsys::{Fs, is_not_found};

use super::DataStore;

/// Rebuild `shell/init.sh` from the current store contents.
///
/// # Errors
///
/// Returns a [`StoreError`] when the store trees cannot be read or the
/// script cannot be written.
pub fn regenerate_shell_init(fs: &dyn Fs, store: &DataStore) -> Result<(), StoreError> {
    let path_entries = collect(fs, store, "path")?;
    let shell_entries = collect(fs, store, "shell")?;

    let mut script = String::from(
        "# Generated by dodot. Do not edit; regenerated on every deploy.\n\
         # Source this file from your shell profile.\n",
    );

    let path_packs = pack_names(&path_entries);
    script.push_str(&format!("DODOT_PATH_PACKS=\"{path_packs}\"\n"));
    script.push_str("export DODOT_PATH_PACKS\n");
    let shell_packs = pack_names(&shell_entries);
    script.push_str(&format!("DODOT_SHELL_PACKS=\"{shell_packs}\"\n"));
    script.push_str("export DODOT_SHELL_PACKS\n");

    if !path_entries.is_empty() {
        script.push('\n');
        for (_, dir) in &path_entries {
            script.push_str(&format!(
                "case \":$PATH:\" in\n  *\":{dir}:\"*) ;;\n  *) PATH=\"{dir}:$PATH\" ;;\nesac\n",
                dir = dir.display()
            ));
        }
        script.push_str("export PATH\n");
    }

    if !shell_entries.is_empty() {
        script.push('\n');
        for (_, source) in &shell_entries {
            script.push_str(&format!(
                "[ -r \"{path}\" ] && . \"{path}\"\n",
                path = source.display()
            ));
        }
    }

    let init = store.shell_init_path();
    if let Some(parent) = init.parent() {
        fs.mkdir_all(parent, 0o755)
            .map_err(|source| StoreError::RootUnavailable {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    fs.write_file(&init, script.as_bytes(), 0o644)
        .map_err(|err| StoreError::from_io(init, err))
}

/// Collect `(pack, recorded path)` pairs from one deployed tree, sorted by
/// pack then marker name for stable output.
fn collect(
    fs: &dyn Fs,
    store: &DataStore,
    kind: &str,
) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let base = store.deployed_dir(kind);
    let packs = match fs.read_dir(&base) {
        Ok(entries) => entries,
        Err(err) if is_not_found(&err) => return Ok(Vec::new()),
        Err(err) => return Err(StoreError::from_io(base, err)),
    };
    let mut out = Vec::new();
    for pack in packs {
        let dir = base.join(&pack.name);
        let markers = match fs.read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if is_not_found(&err) => continue,
            Err(err) => return Err(StoreError::from_io(dir, err)),
        };
        for marker in markers {
            let marker_path = dir.join(&marker.name);
            let bytes = fs
                .read_file(&marker_path)
                .map_err(|err| StoreError::from_io(marker_path, err))?;
            let recorded = PathBuf::from(String::from_utf8_lossy(&bytes).trim().to_string());
            out.push((pack.name.clone(), recorded));
        }
    }
    Ok(out)
}

/// Colon-separated, de-duplicated pack list.
fn pack_names(entries: &[(String, PathBuf)]) -> String {
    let mut names: Vec<&str> = Vec::new();
    for (pack, _) in entries {
        if !names.contains(&pack.as_str()) {
            names.push(pack);
        }
    }
    names.join(":")
}
