//! End-to-end tests for the `link` deploy path.

mod common;

use common::{TestBed, assert_two_link_chain, tree_snapshot};
use dodot_cli::commands::deploy::{self, DeployMode};
use dodot_cli::executor::RunOptions;

#[test]
fn pure_link_deploy_creates_chain_and_path_entry() {
    let bed = TestBed::new();
    bed.make_pack("vim");
    let vimrc = bed.pack_file("vim", ".vimrc", "set number\n");
    bed.pack_file("vim", "bin/tool", "#!/bin/sh\n");

    let ctx = bed.default_context();
    let clean = deploy::run(&ctx, "link", &[], DeployMode::EveryRun).expect("deploy");
    assert!(clean, "deploy should be clean");

    // <HOME>/.vimrc -> <DATA>/deployed/symlink/vim/.vimrc -> <pack>/.vimrc
    assert_two_link_chain(&bed.home.join(".vimrc"), &bed.data, &vimrc);

    // PATH marker records the bin directory.
    let marker = bed.data.join("deployed/path/vim/bin");
    let recorded = std::fs::read_to_string(&marker).expect("path marker");
    assert_eq!(recorded.trim(), bed.root.join("vim/bin").to_string_lossy());

    // The init script prepends the bin directory and names the pack.
    let init = std::fs::read_to_string(bed.data.join("shell/init.sh")).expect("init script");
    assert!(init.contains(&*bed.root.join("vim/bin").to_string_lossy()));
    assert!(init.contains("DODOT_PATH_PACKS=\"vim\""));
}

#[test]
fn deploy_is_idempotent_on_unchanged_pack() {
    let bed = TestBed::new();
    bed.make_pack("vim");
    bed.pack_file("vim", ".vimrc", "set number\n");
    bed.pack_file("vim", "bin/tool", "#!/bin/sh\n");

    let ctx = bed.default_context();
    assert!(deploy::run(&ctx, "link", &[], DeployMode::EveryRun).expect("first"));
    let first_home = tree_snapshot(&bed.home);
    let first_data = tree_snapshot(&bed.data);

    assert!(deploy::run(&ctx, "link", &[], DeployMode::EveryRun).expect("second"));
    assert_eq!(tree_snapshot(&bed.home), first_home);
    assert_eq!(tree_snapshot(&bed.data), first_data);
}

#[test]
fn catchall_links_unclaimed_files() {
    let bed = TestBed::new();
    bed.make_pack("misc");
    bed.pack_file("misc", "custom.conf", "a\n");
    bed.pack_file("misc", "random.txt", "b\n");
    bed.pack_file(
        "misc",
        ".dodot.toml",
        "ignore = [{ path = \"*.tmp\" }]\n",
    );
    bed.pack_file("misc", "scratch.tmp", "c\n");

    let ctx = bed.default_context();
    assert!(deploy::run(&ctx, "link", &[], DeployMode::EveryRun).expect("deploy"));

    assert!(bed.home.join("custom.conf").symlink_metadata().is_ok());
    assert!(bed.home.join("random.txt").symlink_metadata().is_ok());
    assert!(
        bed.home.join("scratch.tmp").symlink_metadata().is_err(),
        "ignored entries must not be linked"
    );
    assert!(
        bed.home.join(".dodot.toml").symlink_metadata().is_err(),
        "the pack config file must never be linked"
    );
}

#[test]
fn override_routes_file_to_declared_handler() {
    let bed = TestBed::new();
    bed.make_pack("misc");
    bed.pack_file("misc", "custom.conf", "export FOO=1\n");
    bed.pack_file(
        "misc",
        ".dodot.toml",
        "override = [{ path = \"custom.conf\", handler = \"shell_profile\" }]\n",
    );

    let ctx = bed.default_context();
    assert!(deploy::run(&ctx, "link", &[], DeployMode::EveryRun).expect("deploy"));

    // Routed to shell_profile: a shell marker, no symlink.
    let marker = bed.data.join("deployed/shell/misc/custom.conf");
    let recorded = std::fs::read_to_string(&marker).expect("shell marker");
    assert_eq!(
        recorded.trim(),
        bed.root.join("misc/custom.conf").to_string_lossy()
    );
    assert!(bed.home.join("custom.conf").symlink_metadata().is_err());

    let init = std::fs::read_to_string(bed.data.join("shell/init.sh")).expect("init");
    assert!(init.contains("DODOT_SHELL_PACKS=\"misc\""));
}

#[test]
fn conflict_without_force_blocks_and_mutates_nothing() {
    let bed = TestBed::new();
    bed.make_pack("vim");
    bed.pack_file("vim", ".vimrc", "set number\n");
    std::fs::write(bed.home.join(".vimrc"), "my own settings\n").expect("occupy target");

    let ctx = bed.default_context();
    let clean = deploy::run(&ctx, "link", &[], DeployMode::EveryRun).expect("deploy");
    assert!(!clean, "conflict must make the run unclean");

    // Target untouched, no backup, no intermediate recorded.
    assert_eq!(bed.home_contents(".vimrc"), "my own settings\n");
    assert_eq!(
        std::fs::read_dir(bed.data.join("backups")).map(Iterator::count).unwrap_or(0),
        0
    );
}

#[test]
fn conflict_with_force_backs_up_original() {
    let bed = TestBed::new();
    bed.make_pack("vim");
    let vimrc = bed.pack_file("vim", ".vimrc", "set number\n");
    std::fs::write(bed.home.join(".vimrc"), "my own settings\n").expect("occupy target");

    let ctx = bed.context(RunOptions {
        force: true,
        ..RunOptions::default()
    });
    let clean = deploy::run(&ctx, "link", &[], DeployMode::EveryRun).expect("deploy");
    assert!(clean);

    assert_two_link_chain(&bed.home.join(".vimrc"), &bed.data, &vimrc);
    let backups: Vec<_> = std::fs::read_dir(bed.data.join("backups"))
        .expect("backups dir")
        .flatten()
        .collect();
    assert_eq!(backups.len(), 1);
    let backed_up = std::fs::read_to_string(backups[0].path()).expect("backup content");
    assert_eq!(backed_up, "my own settings\n");
}

#[test]
fn identical_file_is_adopted_in_place() {
    let bed = TestBed::new();
    bed.make_pack("vim");
    let vimrc = bed.pack_file("vim", ".vimrc", "set number\n");
    std::fs::write(bed.home.join(".vimrc"), "set number\n").expect("identical target");

    let ctx = bed.default_context();
    assert!(deploy::run(&ctx, "link", &[], DeployMode::EveryRun).expect("deploy"));
    assert_two_link_chain(&bed.home.join(".vimrc"), &bed.data, &vimrc);
}

#[test]
fn dry_run_reports_but_leaves_no_trace() {
    let bed = TestBed::new();
    bed.make_pack("vim");
    bed.pack_file("vim", ".vimrc", "set number\n");

    let ctx = bed.context(RunOptions {
        dry_run: true,
        ..RunOptions::default()
    });
    assert!(deploy::run(&ctx, "link", &[], DeployMode::EveryRun).expect("deploy"));

    assert!(bed.home.join(".vimrc").symlink_metadata().is_err());
    assert!(!bed.data.join("deployed/symlink/vim").exists());
}

#[test]
fn pack_selection_limits_the_run() {
    let bed = TestBed::new();
    bed.make_pack("vim");
    bed.pack_file("vim", ".vimrc", "a\n");
    bed.make_pack("tmux");
    bed.pack_file("tmux", ".tmux.conf", "b\n");

    let ctx = bed.default_context();
    assert!(
        deploy::run(&ctx, "link", &["vim".to_string()], DeployMode::EveryRun).expect("deploy")
    );
    assert!(bed.home.join(".vimrc").symlink_metadata().is_ok());
    assert!(bed.home.join(".tmux.conf").symlink_metadata().is_err());
}

#[test]
fn unknown_pack_selection_is_an_error() {
    let bed = TestBed::new();
    bed.make_pack("vim");
    let ctx = bed.default_context();
    assert!(deploy::run(&ctx, "link", &["nope".to_string()], DeployMode::EveryRun).is_err());
}

#[test]
fn ignored_pack_is_skipped_by_deploy() {
    let bed = TestBed::new();
    bed.make_pack("old");
    bed.pack_file("old", ".profile", "x\n");
    bed.pack_file("old", ".dodotignore", "");

    let ctx = bed.default_context();
    assert!(deploy::run(&ctx, "link", &[], DeployMode::EveryRun).expect("deploy"));
    assert!(bed.home.join(".profile").symlink_metadata().is_err());
}

#[test]
fn template_renders_into_home() {
    let bed = TestBed::new();
    bed.make_pack("git");
    bed.pack_file(
        "git",
        "gitconfig.tmpl",
        "[user]\n  name = ${USER}\n  host = ${HOSTNAME}\n",
    );

    let ctx = bed.default_context();
    assert!(deploy::run(&ctx, "link", &[], DeployMode::EveryRun).expect("deploy"));
    assert_eq!(
        bed.home_contents("gitconfig"),
        "[user]\n  name = tester\n  host = testbed\n"
    );
}
