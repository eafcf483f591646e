//! Maintenance tasks for the pkgrel workspace.
//!
//! - `completions` - Generate shell completions
//! - `man` - Generate the man page
//!
//! Run `cargo xtask --help` to see available commands.

#![deny(unsafe_code)]

mod commands;

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Name of the installed binary, used for completion scripts and man pages.
const BIN_NAME: &str = "pkgrel";

#[derive(Parser, Debug)]
#[command(name = "xtask")]
#[command(about = "Project maintenance tasks")]
struct Xtask {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand, Debug)]
enum Task {
    /// Generate shell completions for the pkgrel CLI.
    Completions(commands::completions::CompletionsArgs),

    /// Generate the pkgrel man page.
    Man(commands::man::ManArgs),
}

fn main() -> Result<(), String> {
    match Xtask::parse().command {
        Task::Completions(args) => commands::completions::cmd_completions(args),
        Task::Man(args) => commands::man::cmd_man(args),
    }
}

/// Resolve `relative` against the workspace root and make sure it exists.
fn output_dir(relative: PathBuf) -> Result<PathBuf, String> {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let root = manifest_dir.parent().unwrap_or(&manifest_dir);
    let dir = root.join(relative);
    fs::create_dir_all(&dir).map_err(|e| format!("{}: {e}", dir.display()))?;
    Ok(dir)
}
