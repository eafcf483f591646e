//! Library interface for the `pkgrel` CLI.
//!
//! This crate exposes the CLI's argument parser as a library, primarily for
//! documentation generation and testing. The actual entry point is in
//! `main.rs`.
//!
//! # Structure
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`commands`] - The release command and its terminal display
//! - [`terminal`] - Operator prompts on a real terminal
//!
//! # Documentation Generation
//!
//! The [`command()`] function returns the clap `Command` for generating man pages
//! and shell completions via `xtask`.

pub mod commands;

pub mod terminal;

use clap::{ArgAction, CommandFactory, Parser};
use pkgrel_core::NpmClient;
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output based on this choice.
    ///
    /// Call this once at startup to set the color mode.
    pub fn apply(self) {
        match self {
            Self::Auto => {} // owo-colors auto-detects by default
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG           Log filter (e.g., debug, pkgrel_core=trace)
    PKGREL_LOG_PATH    Explicit log file path
    PKGREL_LOG_DIR     Log directory
";

/// Command-line interface definition for pkgrel.
///
/// Run from the root of an npm package. Boolean release switches come in
/// `--flag`/`--no-flag` pairs; the last one given wins, and an absent pair
/// falls back to the `[release]` table of the configuration file.
#[derive(Parser, Debug)]
#[command(name = "pkgrel")]
#[command(
    about = "Interactive release workflow for npm packages: bump, changelog, tag, publish",
    long_about = None
)]
#[command(version, disable_version_flag = true)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// Create a GitHub release with this token
    #[arg(long, value_name = "TOKEN")]
    pub create_release: Option<String>,

    /// Preview the release: nothing is committed, pushed or published
    #[arg(long, overrides_with = "no_dry_run")]
    pub dry_run: bool,

    /// Perform the release for real (default)
    #[arg(long, overrides_with = "dry_run", hide = true)]
    pub no_dry_run: bool,

    /// Package script to run before the changelog is written
    #[arg(long, value_name = "SCRIPT")]
    pub build_script: Option<String>,

    /// Package manager used for the lock file and publishing
    #[arg(long, value_enum, value_name = "CLIENT")]
    pub npm_client: Option<NpmClient>,

    /// Publish with provenance attestation
    #[arg(long, overrides_with = "no_provenance")]
    pub provenance: bool,

    /// Publish without provenance attestation
    #[arg(long, overrides_with = "provenance", hide = true)]
    pub no_provenance: bool,

    /// Release even when the working tree has uncommitted changes
    #[arg(long, overrides_with = "no_skip_checks")]
    pub skip_checks: bool,

    /// Require a clean working tree (default)
    #[arg(long, overrides_with = "skip_checks", hide = true)]
    pub no_skip_checks: bool,

    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    pub print_version: Option<bool>,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// More log detail (repeatable)
    #[arg(long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Print the release outcome as JSON (for scripting)
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Resolve a `--flag`/`--no-flag` pair against a configured fallback.
    const fn switch(on: bool, off: bool, configured: Option<bool>) -> bool {
        if on {
            true
        } else if off {
            false
        } else {
            matches!(configured, Some(true))
        }
    }

    /// Effective dry-run setting.
    pub const fn dry_run(&self) -> bool {
        Self::switch(self.dry_run, self.no_dry_run, None)
    }

    /// Effective provenance setting, given the configured default.
    pub const fn provenance(&self, configured: Option<bool>) -> bool {
        Self::switch(self.provenance, self.no_provenance, configured)
    }

    /// Effective skip-checks setting.
    pub const fn skip_checks(&self) -> bool {
        Self::switch(self.skip_checks, self.no_skip_checks, None)
    }
}

/// Returns the clap command for documentation generation
pub fn command() -> clap::Command {
    Cli::command()
}
