//! Core library for pkgrel.
//!
//! This crate provides the release pipeline and its collaborators used by
//! the `pkgrel` CLI.
//!
//! # Modules
//!
//! - [`changelog`] - Changelog entries from conventional commits
//! - [`config`] - Configuration loading and management
//! - [`git`] - Git operations for release workflows
//! - [`manifest`] - `package.json` access and the publish-time backup guard
//! - [`prompt`] - Operator menus, confirmations and OTP entry
//! - [`registry`] - npm/yarn/pnpm build, lock file and publish commands
//! - [`release`] - The release orchestrator
//! - [`remote_release`] - Hosted release notes through `gh`
//! - [`runner`] - External command execution
//! - [`version`] - Next-version computation
//!
//! # Quick Start
//!
//! ```no_run
//! use camino::Utf8Path;
//! use pkgrel_core::{ConfigLoader, ReleaseOptions, ReleaseOrchestrator, SystemRunner};
//! # use pkgrel_core::prompt::{Prompter, PromptResult};
//! # struct Stdin;
//! # impl Prompter for Stdin {
//! #     fn say(&mut self, line: &str) { println!("{line}"); }
//! #     fn read_line(&mut self, _: &str) -> PromptResult<String> { Ok(String::new()) }
//! # }
//!
//! let root = Utf8Path::new(".");
//! let config = ConfigLoader::new().with_project_search(root).load().unwrap();
//! let mut prompter = Stdin;
//! let outcome = ReleaseOrchestrator::for_project(
//!     ReleaseOptions { dry_run: true, ..ReleaseOptions::default() },
//!     config.release_settings(),
//!     root,
//!     &SystemRunner,
//!     &mut prompter,
//! )
//! .unwrap()
//! .run(|event| eprintln!("{event:?}"))
//! .unwrap();
//! println!("{:?}", outcome.status);
//! ```
#![deny(unsafe_code)]

pub mod changelog;

pub mod config;

pub mod git;

pub mod manifest;

pub mod prompt;

pub mod registry;

pub mod release;

pub mod remote_release;

pub mod runner;

pub mod version;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigError, ConfigLoader, ConfigResult, LogLevel, ReleaseSettings};

pub use registry::NpmClient;

pub use release::{
    ErrorKind, Gate, ReleaseError, ReleaseEvent, ReleaseOptions, ReleaseOrchestrator,
    ReleaseOutcome, ReleaseStage, ReleaseStatus, StageOutcome,
};

pub use runner::{CommandRunner, SystemRunner};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
