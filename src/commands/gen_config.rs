//! `gen-config`: write a commented config skeleton into a pack.

use anyhow::{Context as _, Result};

use crate::context::RunContext;
use crate::packs::{PACK_CONFIG_FILE, find_pack};

/// Commented skeleton showing the three config sections.
const SKELETON: &str = r#"# dodot pack configuration.
#
# Entries matched by `ignore` are skipped entirely:
# ignore = [{ path = "*.bak" }]
#
# `override` routes a file to a specific handler, beating every matcher:
# override = [{ path = "custom.conf", handler = "shell_profile" }]
# override = [{ path = "app.conf", handler = "symlink", with = { target_dir = "~/.config/app" } }]
#
# Extra matchers merge over the defaults by name:
# [[matchers]]
# name = "zsh-bits"
# trigger = "filename"
# handler = "shell_profile"
# pattern = "*.zsh"
# priority = 85
"#;

/// Write the skeleton `.dodot.toml` into a pack.
///
/// Refuses to overwrite an existing config file.
///
/// # Errors
///
/// Returns an error when the pack does not exist, a config file is
/// already present, or the write fails.
pub fn run(ctx: &RunContext, pack_name: &str) -> Result<bool> {
    let pack = find_pack(ctx.fs.as_ref(), &ctx.root, pack_name)?;
    let path = pack.path.join(PACK_CONFIG_FILE);
    anyhow::ensure!(
        !ctx.fs.exists(&path),
        "{} already exists; edit it instead",
        path.display()
    );
    if ctx.options.dry_run {
        ctx.log.dry_run(&format!("write {}", path.display()));
        return Ok(true);
    }
    ctx.fs
        .write_file(&path, SKELETON.as_bytes(), 0o644)
        .with_context(|| format!("writing {}", path.display()))?;
    ctx.log.info(&format!("wrote {}", path.display()));
    Ok(true)
}
