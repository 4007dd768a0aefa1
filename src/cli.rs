//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top-level CLI entry point for the dodot dotfiles engine.
#[derive(Parser, Debug)]
#[command(
    name = "dodot",
    about = "Pack-based dotfiles deployment engine",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared across subcommands.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Override the dotfiles root directory (default: $DOTFILES_ROOT or cwd)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Override the data directory (default: $DODOT_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Replace foreign files at targets, backing up the originals
    #[arg(short, long, global = true)]
    pub force: bool,

    /// Timeout in seconds for external commands (install scripts, brew)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Disable parallel pack processing (parallel is enabled by default)
    #[arg(long = "no-parallel", global = true, action = clap::ArgAction::SetFalse)]
    pub parallel: bool,
}

/// Pack selection shared by deploy-style subcommands.
#[derive(Parser, Debug, Clone)]
pub struct PackArgs {
    /// Packs to operate on (default: all)
    pub packs: Vec<String>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Deploy links, PATH entries, shell profiles, and templates
    Link(PackArgs),
    /// Remove deployed links and registrations
    Unlink(PackArgs),
    /// Run once-per-content provisioning (install scripts, Brewfiles)
    Provision(PackArgs),
    /// Forget provisioning state so once-actions run again
    Unprovision(PackArgs),
    /// Show each pack's expected actions and their on-disk status
    Status(StatusOpts),
    /// Move a home file into a pack and deploy the link in its place
    Adopt(AdoptOpts),
    /// Render template files without touching other handlers
    Fill(PackArgs),
    /// Re-enable a pack by removing its ignore marker
    On(PackName),
    /// Disable a pack by writing its ignore marker
    Off(PackName),
    /// Write the ignore marker into a pack
    AddIgnore(PackName),
    /// Write a commented config skeleton into a pack
    GenConfig(PackName),
    /// Emit shell completions
    Completions(CompletionsOpts),
}

/// Options for the `status` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct StatusOpts {
    /// Packs to show (default: all)
    pub packs: Vec<String>,

    /// Emit the display model as JSON
    #[arg(long)]
    pub json: bool,
}

/// Options for the `adopt` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct AdoptOpts {
    /// Pack that should own the file
    pub pack: String,

    /// File in the home directory to adopt
    pub file: PathBuf,
}

/// A single pack-name argument.
#[derive(Parser, Debug, Clone)]
pub struct PackName {
    /// The pack to operate on
    pub pack: String,
}

/// Options for the `completions` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
