//! End-to-end tests for the `fill` template path.

mod common;

use common::TestBed;
use dodot_cli::commands::deploy::{self, DeployMode};
use dodot_cli::commands::fill;
use dodot_cli::executor::RunOptions;

#[test]
fn fill_renders_templates_and_nothing_else() {
    let bed = TestBed::new();
    bed.make_pack("git");
    bed.pack_file("git", "gitconfig.tmpl", "[user]\n  name = ${USER}\n");
    bed.pack_file("git", ".gitignore_global", "*.swp\n");

    let ctx = bed.default_context();
    assert!(fill::run(&ctx, &[]).expect("fill"));

    // Template rendered with the handler environment's variables.
    assert_eq!(bed.home_contents("gitconfig"), "[user]\n  name = tester\n");
    // The catch-all link for the other file must not run under fill.
    assert!(bed.home.join(".gitignore_global").symlink_metadata().is_err());
}

#[test]
fn rendered_output_is_a_regular_file() {
    let bed = TestBed::new();
    bed.make_pack("git");
    bed.pack_file("git", "gitconfig.tmpl", "name = ${USER}\n");

    let ctx = bed.default_context();
    assert!(fill::run(&ctx, &[]).expect("fill"));

    let meta = std::fs::symlink_metadata(bed.home.join("gitconfig")).expect("output");
    assert!(meta.is_file());
    assert!(!meta.is_symlink());
}

#[test]
fn refill_with_unchanged_output_is_clean() {
    let bed = TestBed::new();
    bed.make_pack("git");
    bed.pack_file("git", "gitconfig.tmpl", "name = ${USER}\n");

    let ctx = bed.default_context();
    assert!(fill::run(&ctx, &[]).expect("first"));
    assert!(fill::run(&ctx, &[]).expect("second"));
    assert_eq!(bed.home_contents("gitconfig"), "name = tester\n");
}

#[test]
fn existing_foreign_file_conflicts_without_force() {
    let bed = TestBed::new();
    bed.make_pack("git");
    bed.pack_file("git", "gitconfig.tmpl", "name = ${USER}\n");
    std::fs::write(bed.home.join("gitconfig"), "hand-written\n").expect("occupy");

    let ctx = bed.default_context();
    let clean = fill::run(&ctx, &[]).expect("fill");
    assert!(!clean);
    assert_eq!(bed.home_contents("gitconfig"), "hand-written\n");
}

#[test]
fn force_replaces_and_backs_up_foreign_file() {
    let bed = TestBed::new();
    bed.make_pack("git");
    bed.pack_file("git", "gitconfig.tmpl", "name = ${USER}\n");
    std::fs::write(bed.home.join("gitconfig"), "hand-written\n").expect("occupy");

    let ctx = bed.context(RunOptions {
        force: true,
        ..RunOptions::default()
    });
    assert!(fill::run(&ctx, &[]).expect("fill"));
    assert_eq!(bed.home_contents("gitconfig"), "name = tester\n");

    let backups: Vec<_> = std::fs::read_dir(bed.data.join("backups"))
        .expect("backups dir")
        .flatten()
        .collect();
    assert_eq!(backups.len(), 1);
    assert_eq!(
        std::fs::read_to_string(backups[0].path()).expect("backup"),
        "hand-written\n"
    );
}

#[test]
fn template_variables_come_from_pack_options() {
    let bed = TestBed::new();
    bed.make_pack("git");
    bed.pack_file("git", "gitconfig.tmpl", "email = ${EMAIL}\n");
    bed.pack_file(
        "git",
        ".dodot.toml",
        r#"override = [{ path = "gitconfig.tmpl", handler = "template", with = { vars = { EMAIL = "me@example.com" } } }]
"#,
    );

    let ctx = bed.default_context();
    assert!(fill::run(&ctx, &[]).expect("fill"));
    assert_eq!(bed.home_contents("gitconfig"), "email = me@example.com\n");
}

#[test]
fn link_deploy_also_renders_templates() {
    let bed = TestBed::new();
    bed.make_pack("git");
    bed.pack_file("git", "gitconfig.tmpl", "name = ${USER}\n");

    let ctx = bed.default_context();
    assert!(deploy::run(&ctx, "link", &[], DeployMode::EveryRun).expect("link"));
    assert_eq!(bed.home_contents("gitconfig"), "name = tester\n");
}
