//! Package registry operations: build scripts, lock file sync and publish.
//!
//! Each supported client speaks a slightly different dialect; the
//! differences are kept in the argument builders so they can be tested
//! without spawning anything.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::runner::{CommandRunner, RunOptions, RunResult};
use crate::version::Channel;

/// Package manager used to talk to the registry.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum NpmClient {
    /// npm.
    #[default]
    Npm,
    /// Yarn (berry).
    Yarn,
    /// pnpm.
    Pnpm,
}

impl NpmClient {
    /// Executable name.
    pub const fn program(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }

    /// Command that regenerates the lock file without installing packages.
    ///
    /// Only pnpm syncs its own lock file. Yarn 1 has no lockfile-only mode,
    /// so yarn projects get a `package-lock.json` refresh from npm.
    pub const fn lock_sync_command(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Pnpm => ("pnpm", &["install", "--lockfile-only", "--ignore-scripts"]),
            Self::Npm | Self::Yarn => (
                "npm",
                &["install", "--package-lock-only", "--legacy-peer-deps"],
            ),
        }
    }
}

impl std::fmt::Display for NpmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.program())
    }
}

/// What to publish and how.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishRequest {
    /// Dist-tag to publish under; `None` means the registry default.
    pub channel: Option<Channel>,
    /// One-time password; empty or `None` means none.
    pub otp: Option<String>,
    /// Ask the client to simulate the publish.
    pub dry_run: bool,
    /// Request a provenance attestation.
    pub provenance: bool,
}

impl PublishRequest {
    /// Arguments for `<client> publish`.
    pub fn args(&self, client: NpmClient) -> Vec<String> {
        let mut args = vec!["publish".to_string()];
        if let Some(channel) = self.channel {
            args.extend(["--tag".to_string(), channel.to_string()]);
        }
        if let Some(otp) = self.otp.as_deref().filter(|otp| !otp.is_empty()) {
            args.extend(["--otp".to_string(), otp.to_string()]);
        }
        if self.dry_run {
            args.push("--dry-run".to_string());
        }
        if self.provenance {
            args.push("--provenance".to_string());
        }
        if client == NpmClient::Pnpm {
            // pnpm refuses to publish from a tree it considers dirty or off-branch.
            args.push("--no-git-checks".to_string());
        }
        args
    }
}

/// Run a package script, attached to the terminal.
#[instrument(skip(runner))]
pub fn run_script(
    runner: &impl CommandRunner,
    client: NpmClient,
    script: &str,
    opts: &RunOptions,
) -> RunResult<()> {
    runner.run_streamed(client.program(), &["run", script], opts)
}

/// Bring the lock file in line with the manifest without installing anything.
///
/// Skipped (only echoed) in dry-run.
#[instrument(skip(runner))]
pub fn sync_lock_file(
    runner: &impl CommandRunner,
    client: NpmClient,
    opts: &RunOptions,
    dry_run: bool,
) -> RunResult<()> {
    let (program, args) = client.lock_sync_command();
    if dry_run {
        runner.log_would_run(program, args);
        return Ok(());
    }
    runner.run_buffered(program, args, opts)?;
    debug!(%client, "lock file synchronized");
    Ok(())
}

/// Publish the package in the working directory.
///
/// In dry-run the client still runs, with its own `--dry-run`, so packing
/// and registry auth are exercised without uploading anything.
#[instrument(skip(runner, request), fields(channel = ?request.channel, dry_run = request.dry_run))]
pub fn publish(
    runner: &impl CommandRunner,
    client: NpmClient,
    request: &PublishRequest,
    opts: &RunOptions,
) -> RunResult<()> {
    let args = request.args(client);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    if request.dry_run {
        runner.log_would_run(client.program(), &args);
    }
    runner.run_streamed(client.program(), &args, opts)
}
