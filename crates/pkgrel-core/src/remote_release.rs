//! Hosted release notes via the GitHub CLI.
//!
//! The token given on the command line is handed to `gh` through
//! `GH_TOKEN`; it never appears in arguments, logs or dry-run output.

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::git::RepoId;
use crate::runner::{CommandRunner, RunError, RunOptions};

/// Errors from creating a hosted release.
#[derive(Error, Debug)]
pub enum RemoteReleaseError {
    /// No token was supplied.
    #[error("a token is required to create a release")]
    MissingToken,

    /// `gh release create` failed.
    #[error(transparent)]
    Run(#[from] RunError),
}

/// Result alias for remote release operations.
pub type RemoteReleaseResult<T> = Result<T, RemoteReleaseError>;

/// Title and body of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseNote {
    /// Tag the release is attached to.
    pub tag: String,
    /// Release title.
    pub title: String,
    /// Markdown body.
    pub notes: String,
}

impl ReleaseNote {
    /// Note for `tag`, titled `<package> <tag>` when the package has a name.
    pub fn new(package: Option<&str>, tag: &str, notes: &str) -> Self {
        let title = package.map_or_else(|| tag.to_string(), |name| format!("{name} {tag}"));
        Self {
            tag: tag.to_string(),
            title,
            notes: notes.to_string(),
        }
    }
}

/// Authenticated handle on the release host.
pub struct ReleaseClient {
    token: String,
}

impl std::fmt::Debug for ReleaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseClient")
            .field("token", &"******")
            .finish()
    }
}

impl ReleaseClient {
    /// Build a client from a token.
    pub fn new(token: &str) -> RemoteReleaseResult<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(RemoteReleaseError::MissingToken);
        }
        Ok(Self {
            token: token.to_string(),
        })
    }

    /// Create the release for `note` on `repo`.
    ///
    /// Returns the release URL printed by `gh`, if any. In dry-run nothing
    /// is created and `None` is returned.
    #[instrument(skip(self, runner, note, repo, opts), fields(tag = %note.tag, repo = %repo))]
    pub fn create_release(
        &self,
        runner: &impl CommandRunner,
        note: &ReleaseNote,
        repo: &RepoId,
        opts: &RunOptions,
        dry_run: bool,
    ) -> RemoteReleaseResult<Option<String>> {
        let repo_arg = repo.to_string();
        let args = [
            "release",
            "create",
            note.tag.as_str(),
            "--repo",
            repo_arg.as_str(),
            "--title",
            note.title.as_str(),
            "--notes",
            note.notes.as_str(),
        ];
        if dry_run {
            runner.log_would_run("gh", &args);
            return Ok(None);
        }

        debug!("creating release");
        let opts = opts.clone().with_env("GH_TOKEN", self.token.as_str());
        let output = runner.run_buffered("gh", &args, &opts)?;
        let url = output.trim();
        let url = (!url.is_empty()).then(|| url.to_string());
        info!(?url, "release created");
        Ok(url)
    }
}
