//! Git operations for the release workflow.
//!
//! Shells out to `git` through a [`CommandRunner`] so we inherit the user's
//! SSH keys, GPG signing and other configuration. Operations that rewrite
//! history or talk to the remote take a `dry_run` flag and are only echoed
//! when it is set; read-only queries always run.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::runner::{CommandRunner, RunError, RunOptions};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// The underlying `git` command failed.
    #[error(transparent)]
    Run(#[from] RunError),

    /// `HEAD` is not on a branch, so there is nothing to push.
    #[error("HEAD is detached; check out a branch before releasing")]
    DetachedHead,

    /// The remote URL does not look like `owner/name` on a hosting service.
    #[error("cannot tell owner/name from remote URL `{url}`")]
    UnrecognizedRemote {
        /// The remote's URL.
        url: String,
    },
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Owner and name of the hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoId {
    /// User or organization.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Whether the working tree has staged, unstaged or untracked changes.
#[instrument(skip(runner))]
pub fn has_uncommitted_changes(runner: &impl CommandRunner, opts: &RunOptions) -> GitResult<bool> {
    let output = runner.run_buffered("git", &["status", "--porcelain"], opts)?;
    let dirty = !output.trim().is_empty();
    debug!(dirty, "working tree status");
    Ok(dirty)
}

/// Name of the checked-out branch.
#[instrument(skip(runner))]
pub fn current_branch(runner: &impl CommandRunner, opts: &RunOptions) -> GitResult<String> {
    let output = runner.run_buffered("git", &["rev-parse", "--abbrev-ref", "HEAD"], opts)?;
    let branch = output.trim().to_string();
    if branch.is_empty() || branch == "HEAD" {
        return Err(GitError::DetachedHead);
    }
    debug!(%branch, "current branch");
    Ok(branch)
}

/// Resolve `owner/name` from the URL of `remote`.
#[instrument(skip(runner))]
pub fn identify_repo(
    runner: &impl CommandRunner,
    remote: &str,
    opts: &RunOptions,
) -> GitResult<RepoId> {
    let url = runner.run_buffered("git", &["remote", "get-url", remote], opts)?;
    let url = url.trim();
    let (owner, name) = parse_owner_repo(url).ok_or_else(|| GitError::UnrecognizedRemote {
        url: url.to_owned(),
    })?;
    debug!(%owner, %name, "identified repository");
    Ok(RepoId { owner, name })
}

/// Most recent tag reachable from `HEAD`, if any.
#[instrument(skip(runner))]
pub fn latest_tag(runner: &impl CommandRunner, opts: &RunOptions) -> GitResult<Option<String>> {
    match runner.run_buffered("git", &["describe", "--tags", "--abbrev=0"], opts) {
        Ok(output) => {
            let tag = output.trim();
            Ok((!tag.is_empty()).then(|| tag.to_owned()))
        }
        // No tags yet.
        Err(RunError::Failed { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Subjects of the commits after `since` (or all commits), newest first.
#[instrument(skip(runner))]
pub fn commit_subjects(
    runner: &impl CommandRunner,
    since: Option<&str>,
    opts: &RunOptions,
) -> GitResult<Vec<String>> {
    let range = since.map_or_else(|| "HEAD".to_string(), |tag| format!("{tag}..HEAD"));
    let output = runner.run_buffered("git", &["log", &range, "--format=%s"], opts)?;
    let subjects: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();
    debug!(count = subjects.len(), "commit subjects");
    Ok(subjects)
}

/// Stage every change in the working tree.
pub fn add_all(runner: &impl CommandRunner, opts: &RunOptions, dry_run: bool) -> GitResult<()> {
    mutate(runner, &["add", "."], opts, dry_run)
}

/// Create a lightweight tag on `HEAD`.
pub fn tag(runner: &impl CommandRunner, tag: &str, opts: &RunOptions, dry_run: bool) -> GitResult<()> {
    mutate(runner, &["tag", tag], opts, dry_run)
}

/// Commit the staged changes with local git hooks disabled.
pub fn commit(
    runner: &impl CommandRunner,
    message: &str,
    opts: &RunOptions,
    dry_run: bool,
) -> GitResult<()> {
    let opts = opts.clone().with_env("HUSKY", "0");
    mutate(runner, &["commit", "-m", message], &opts, dry_run)
}

/// Push a single tag to `remote`.
pub fn push_tag(
    runner: &impl CommandRunner,
    tag: &str,
    remote: &str,
    opts: &RunOptions,
    dry_run: bool,
) -> GitResult<()> {
    let refspec = format!("refs/tags/{tag}");
    mutate(runner, &["push", remote, &refspec], opts, dry_run)
}

/// Push the checked-out branch to `remote`.
pub fn push_current_branch(
    runner: &impl CommandRunner,
    remote: &str,
    opts: &RunOptions,
    dry_run: bool,
) -> GitResult<()> {
    let branch = current_branch(runner, opts)?;
    mutate(runner, &["push", remote, &branch], opts, dry_run)
}

/// Run a history- or remote-changing git command, or echo it in dry-run.
fn mutate(
    runner: &impl CommandRunner,
    args: &[&str],
    opts: &RunOptions,
    dry_run: bool,
) -> GitResult<()> {
    if dry_run {
        runner.log_would_run("git", args);
    } else {
        runner.run_buffered("git", args, opts)?;
    }
    Ok(())
}

/// Parse owner and repo from a git remote URL.
///
/// Handles both HTTPS and SSH formats:
/// - `https://github.com/owner/repo.git`
/// - `git@github.com:owner/repo.git`
///
/// Returns `None` if the URL cannot be parsed.
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let path = url.strip_prefix("git@").map_or_else(
        || {
            url.split("//")
                .nth(1)
                .and_then(|after_scheme| after_scheme.split_once('/').map(|(_, path)| path))
        },
        |rest| rest.split_once(':').map(|(_, path)| path),
    )?;

    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.split_once('/')?;

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }

    Some((owner.to_string(), repo.to_string()))
}
