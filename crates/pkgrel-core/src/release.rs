//! Release orchestrator: the interactive npm release workflow.
//!
//! Runs the sixteen [`ReleaseStage`]s in a fixed order: check the working
//! tree, pick the next version, rewrite the manifest, build, write the
//! changelog, commit/tag/push, publish and optionally cut a hosted release.
//! Two operator gates sit in the middle of the run; declining the first
//! cancels the release, declining the second skips publishing.
//!
//! Stages report through an `on_event` callback so the CLI can render
//! progress. A run ends in one of three ways:
//!
//! - `Ok` with [`ReleaseStatus::Completed`]
//! - `Ok` with [`ReleaseStatus::Cancelled`] (quit, `q`, a declined gate or
//!   an interrupted prompt)
//! - `Err(ReleaseError)`; nothing already done is rolled back except the
//!   manifest stripped for publishing.
//!
//! # Dry run
//!
//! Version control, the lock file and the release host are never touched:
//! those commands are only echoed. Local edits (build output, manifest
//! version, changelog) still happen, and the registry client runs with its
//! own `--dry-run`.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::changelog::{self, ChangelogEntry, ChangelogError};
use crate::config::ReleaseSettings;
use crate::git::{self, GitError, RepoId};
use crate::manifest::{MANIFEST_FILE, ManifestError, ManifestGuard, ProjectManifest};
use crate::prompt::{self, Choice, PromptError, Prompter};
use crate::registry::{self, NpmClient, PublishRequest};
use crate::remote_release::{ReleaseClient, ReleaseNote, RemoteReleaseError};
use crate::runner::{self, CommandRunner, RunError, RunOptions, RunResult};
use crate::version::{self, BumpType, VersionError};

const DRY_RUN_LABEL: &str = "[dry-run]";

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors that abort a release.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// The working tree is dirty and checks were not skipped.
    #[error("working tree has uncommitted changes; commit or stash them, or pass --skip-checks")]
    UncommittedChanges,

    /// A hosted release was requested but the repository is unknown.
    #[error("cannot create a release: {0}")]
    RepoUnavailable(#[source] GitError),

    /// The operator entered an empty version.
    #[error("no version entered")]
    EmptyVersion,

    /// Removing the build output failed.
    #[error("failed to remove {path}: {source}")]
    Artifacts {
        /// Directory being removed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Version error.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Prompt error.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Git error.
    #[error(transparent)]
    Git(#[from] GitError),

    /// External command error.
    #[error(transparent)]
    Run(#[from] RunError),

    /// Manifest error.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Changelog error.
    #[error(transparent)]
    Changelog(#[from] ChangelogError),

    /// Hosted release error.
    #[error(transparent)]
    RemoteRelease(#[from] RemoteReleaseError),
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Broad class of a [`ReleaseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad operator input or malformed data.
    Validation,
    /// The repository is not in a state that allows releasing.
    Precondition,
    /// A delegated command failed or could not be started.
    ExternalCommand,
    /// A local file operation failed.
    Io,
}

const fn git_kind(err: &GitError) -> ErrorKind {
    match err {
        GitError::Run(_) => ErrorKind::ExternalCommand,
        GitError::DetachedHead | GitError::UnrecognizedRemote { .. } => ErrorKind::Precondition,
    }
}

impl ReleaseError {
    /// Classify the error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UncommittedChanges | Self::RepoUnavailable(_) => ErrorKind::Precondition,
            Self::EmptyVersion | Self::Version(_) => ErrorKind::Validation,
            Self::Artifacts { .. } => ErrorKind::Io,
            Self::Prompt(PromptError::Io(_)) => ErrorKind::Io,
            Self::Prompt(_) => ErrorKind::Validation,
            Self::Git(err) | Self::Changelog(ChangelogError::Git(err)) => git_kind(err),
            Self::Run(_)
            | Self::Manifest(ManifestError::Strip(_))
            | Self::RemoteRelease(RemoteReleaseError::Run(_)) => ErrorKind::ExternalCommand,
            Self::Manifest(ManifestError::MissingVersion { .. } | ManifestError::NotAnObject { .. }) => {
                ErrorKind::Validation
            }
            Self::Manifest(_) | Self::Changelog(ChangelogError::Io { .. }) => ErrorKind::Io,
            Self::RemoteRelease(RemoteReleaseError::MissingToken) => ErrorKind::Validation,
        }
    }
}

// ──────────────────────────────────────────────
// Options
// ──────────────────────────────────────────────

/// Per-run switches, built once by the CLI.
#[derive(Clone, Default)]
pub struct ReleaseOptions {
    /// Simulate everything that leaves the machine.
    pub dry_run: bool,
    /// Release-host token; enables the hosted release stage.
    pub create_release: Option<String>,
    /// Package script run before the changelog is written.
    pub build_script: Option<String>,
    /// Registry tooling dialect.
    pub npm_client: NpmClient,
    /// Request provenance attestation when publishing.
    pub provenance: bool,
    /// Do not require a clean working tree.
    pub skip_checks: bool,
}

impl std::fmt::Debug for ReleaseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseOptions")
            .field("dry_run", &self.dry_run)
            .field("create_release", &self.create_release.as_ref().map(|_| "******"))
            .field("build_script", &self.build_script)
            .field("npm_client", &self.npm_client)
            .field("provenance", &self.provenance)
            .field("skip_checks", &self.skip_checks)
            .finish()
    }
}

// ──────────────────────────────────────────────
// Stages and events
// ──────────────────────────────────────────────

/// Stages of a release, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStage {
    /// Refuse to release from a dirty working tree.
    RepoCleanCheck,
    /// Resolve `owner/name` of the remote repository.
    IdentifyRepo,
    /// Operator picks a bump type.
    SelectBump,
    /// Turn the bump into a concrete version.
    ResolveVersion,
    /// Remove the build output directory.
    CleanBuildArtifacts,
    /// Write the new version into `package.json`.
    PersistManifestVersion,
    /// Run the configured build script.
    OptionalBuild,
    /// Prepend the release entry to the changelog.
    UpdateChangelog,
    /// Regenerate the lock file.
    SyncLockFile,
    /// `git add .`
    StageChanges,
    /// Operator confirms tagging and pushing.
    ConfirmRelease,
    /// Tag, commit, push the tag, push the branch.
    TagCommitPush,
    /// Operator confirms publishing.
    ConfirmPublish,
    /// Strip the manifest, publish, restore the manifest.
    PublishSequence,
    /// Create the hosted release note.
    OptionalRemoteRelease,
    /// Push the branch once more.
    FinalPush,
}

impl ReleaseStage {
    /// Every stage, in order.
    pub const ALL: [Self; 16] = [
        Self::RepoCleanCheck,
        Self::IdentifyRepo,
        Self::SelectBump,
        Self::ResolveVersion,
        Self::CleanBuildArtifacts,
        Self::PersistManifestVersion,
        Self::OptionalBuild,
        Self::UpdateChangelog,
        Self::SyncLockFile,
        Self::StageChanges,
        Self::ConfirmRelease,
        Self::TagCommitPush,
        Self::ConfirmPublish,
        Self::PublishSequence,
        Self::OptionalRemoteRelease,
        Self::FinalPush,
    ];

    /// Whether the stage may read from the operator or hand the terminal
    /// to a child process.
    pub const fn is_interactive(self) -> bool {
        matches!(
            self,
            Self::SelectBump
                | Self::ResolveVersion
                | Self::OptionalBuild
                | Self::ConfirmRelease
                | Self::ConfirmPublish
                | Self::PublishSequence
        )
    }
}

impl std::fmt::Display for ReleaseStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::RepoCleanCheck => "check working tree",
            Self::IdentifyRepo => "identify repository",
            Self::SelectBump => "select version bump",
            Self::ResolveVersion => "resolve version",
            Self::CleanBuildArtifacts => "clean build output",
            Self::PersistManifestVersion => "write package.json version",
            Self::OptionalBuild => "build",
            Self::UpdateChangelog => "update changelog",
            Self::SyncLockFile => "sync lock file",
            Self::StageChanges => "stage changes",
            Self::ConfirmRelease => "confirm release",
            Self::TagCommitPush => "tag, commit and push",
            Self::ConfirmPublish => "confirm publish",
            Self::PublishSequence => "publish",
            Self::OptionalRemoteRelease => "create hosted release",
            Self::FinalPush => "final push",
        };
        f.write_str(label)
    }
}

/// Answer of a confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Carry on with the next stage.
    Proceed,
    /// Skip the stages the gate guards, then carry on.
    Skip,
    /// Stop the release here.
    Cancel,
}

/// Events emitted during a release for progress reporting.
#[derive(Debug, Clone)]
pub enum ReleaseEvent {
    /// A stage has started.
    StageStarted(ReleaseStage),
    /// A stage has finished.
    StageCompleted(ReleaseStage, StageOutcome),
    /// A stage failed; the release stops here.
    StageFailed(ReleaseStage, String),
    /// The operator stopped the release at this stage.
    Cancelled(ReleaseStage),
    /// A command the stage would have run outside dry-run.
    WouldRun(ReleaseStage, String),
}

/// Outcome of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StageOutcome {
    /// Stage did its work.
    Success {
        /// Description of what happened.
        message: String,
    },
    /// Stage had nothing to do.
    Skipped {
        /// Why the stage was skipped.
        reason: String,
    },
}

impl StageOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

/// How the release ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ReleaseStatus {
    /// Every stage ran.
    Completed,
    /// The operator stopped the release.
    Cancelled {
        /// Stage at which it stopped.
        at: ReleaseStage,
    },
}

/// Summary of a release run.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    /// How the run ended.
    pub status: ReleaseStatus,
    /// Version found in the manifest.
    pub previous_version: String,
    /// Bump the operator picked.
    pub bump: Option<BumpType>,
    /// New version, once resolved.
    pub version: Option<String>,
    /// New tag, once resolved.
    pub tag: Option<String>,
    /// Hosted release URL, when one was created.
    pub release_url: Option<String>,
    /// Results of each stage that ran.
    pub stages: Vec<(ReleaseStage, StageOutcome)>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

// ──────────────────────────────────────────────
// Orchestrator
// ──────────────────────────────────────────────

/// Result of one stage body.
enum Step<T> {
    Done(T, StageOutcome),
    Cancel,
}

impl Step<()> {
    fn success(message: impl Into<String>) -> Self {
        Self::Done((), StageOutcome::success(message))
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self::Done((), StageOutcome::skipped(reason))
    }
}

/// Why the stage sequence stopped early.
enum Halt {
    Cancelled(ReleaseStage),
    Failed(ReleaseError),
}

impl From<ReleaseError> for Halt {
    fn from(err: ReleaseError) -> Self {
        Self::Failed(err)
    }
}

/// Commands echoed instead of run, waiting to be reported.
type Echoes = Rc<RefCell<Vec<String>>>;

/// Passes commands through to the real runner and keeps the dry-run
/// echoes so they can be reported as events of the current stage.
struct EchoingRunner<'a, R> {
    inner: &'a R,
    echoes: Echoes,
}

impl<R: CommandRunner> CommandRunner for EchoingRunner<'_, R> {
    fn run_buffered(&self, program: &str, args: &[&str], opts: &RunOptions) -> RunResult<String> {
        self.inner.run_buffered(program, args, opts)
    }

    fn run_streamed(&self, program: &str, args: &[&str], opts: &RunOptions) -> RunResult<()> {
        self.inner.run_streamed(program, args, opts)
    }

    fn log_would_run(&self, program: &str, args: &[&str]) {
        self.inner.log_would_run(program, args);
        self.echoes
            .borrow_mut()
            .push(runner::render_command(program, args));
    }
}

/// Emits events and records outcomes around each stage body.
struct Progress<F> {
    on_event: F,
    echoes: Echoes,
    stages: Vec<(ReleaseStage, StageOutcome)>,
}

impl<F: FnMut(ReleaseEvent)> Progress<F> {
    const fn new(on_event: F, echoes: Echoes) -> Self {
        Self {
            on_event,
            echoes,
            stages: Vec::new(),
        }
    }

    fn flush_echoes(&mut self, stage: ReleaseStage) {
        let echoed = std::mem::take(&mut *self.echoes.borrow_mut());
        for command in echoed {
            (self.on_event)(ReleaseEvent::WouldRun(stage, command));
        }
    }

    fn run<T>(
        &mut self,
        stage: ReleaseStage,
        body: impl FnOnce() -> ReleaseResult<Step<T>>,
    ) -> Result<T, Halt> {
        (self.on_event)(ReleaseEvent::StageStarted(stage));
        let result = body();
        self.flush_echoes(stage);
        match result {
            Ok(Step::Done(value, outcome)) => {
                info!(%stage, ?outcome, "stage finished");
                (self.on_event)(ReleaseEvent::StageCompleted(stage, outcome.clone()));
                self.stages.push((stage, outcome));
                Ok(value)
            }
            Ok(Step::Cancel) | Err(ReleaseError::Prompt(PromptError::Interrupted)) => {
                info!(%stage, "release cancelled");
                (self.on_event)(ReleaseEvent::Cancelled(stage));
                Err(Halt::Cancelled(stage))
            }
            Err(err) => {
                warn!(%stage, error = %err, "stage failed");
                (self.on_event)(ReleaseEvent::StageFailed(stage, err.to_string()));
                Err(Halt::Failed(err))
            }
        }
    }
}

/// What the run has settled so far.
#[derive(Debug, Default)]
struct Summary {
    bump: Option<BumpType>,
    version: Option<String>,
    tag: Option<String>,
    release_url: Option<String>,
}

/// Drives one release of the package in `project_root`.
pub struct ReleaseOrchestrator<'a, R, P> {
    options: ReleaseOptions,
    settings: ReleaseSettings,
    root: Utf8PathBuf,
    manifest: ProjectManifest,
    runner: EchoingRunner<'a, R>,
    prompter: &'a mut P,
    summary: Summary,
}

impl<'a, R: CommandRunner, P: Prompter> ReleaseOrchestrator<'a, R, P> {
    /// Prepare a release. `manifest` is the project's loaded `package.json`.
    pub fn new(
        options: ReleaseOptions,
        settings: ReleaseSettings,
        project_root: &Utf8Path,
        manifest: ProjectManifest,
        runner: &'a R,
        prompter: &'a mut P,
    ) -> Self {
        Self {
            options,
            settings,
            root: project_root.to_path_buf(),
            manifest,
            runner: EchoingRunner {
                inner: runner,
                echoes: Echoes::default(),
            },
            prompter,
            summary: Summary::default(),
        }
    }

    /// Load `package.json` from `project_root` and prepare a release.
    pub fn for_project(
        options: ReleaseOptions,
        settings: ReleaseSettings,
        project_root: &Utf8Path,
        runner: &'a R,
        prompter: &'a mut P,
    ) -> ReleaseResult<Self> {
        let manifest = ProjectManifest::load(&project_root.join(MANIFEST_FILE))?;
        Ok(Self::new(
            options,
            settings,
            project_root,
            manifest,
            runner,
            prompter,
        ))
    }

    /// Run every stage in order.
    ///
    /// Calls `on_event` at stage boundaries so the CLI can update its
    /// progress display.
    #[instrument(skip_all, fields(root = %self.root, dry_run = self.options.dry_run))]
    pub fn run(mut self, on_event: impl FnMut(ReleaseEvent)) -> ReleaseResult<ReleaseOutcome> {
        let previous_version = self.manifest.version()?.to_string();
        let mut progress = Progress::new(on_event, Rc::clone(&self.runner.echoes));

        let status = match self.drive(&mut progress) {
            Ok(()) => ReleaseStatus::Completed,
            Err(Halt::Cancelled(at)) => ReleaseStatus::Cancelled { at },
            Err(Halt::Failed(err)) => return Err(err),
        };
        info!(?status, version = ?self.summary.version, "release finished");

        Ok(ReleaseOutcome {
            status,
            previous_version,
            bump: self.summary.bump,
            version: self.summary.version,
            tag: self.summary.tag,
            release_url: self.summary.release_url,
            stages: progress.stages,
            dry_run: self.options.dry_run,
        })
    }

    fn drive<F: FnMut(ReleaseEvent)>(&mut self, progress: &mut Progress<F>) -> Result<(), Halt> {
        progress.run(ReleaseStage::RepoCleanCheck, || self.check_clean())?;
        let repo = progress.run(ReleaseStage::IdentifyRepo, || self.identify_repo())?;

        let current = version::parse_version(self.manifest.version().map_err(ReleaseError::from)?)
            .map_err(ReleaseError::from)?;
        let bump = progress.run(ReleaseStage::SelectBump, || self.select_bump(&current))?;
        self.summary.bump = Some(bump);

        let next = progress.run(ReleaseStage::ResolveVersion, || {
            self.resolve_version(&current, bump)
        })?;
        let tag = self.settings.tag_for(&next);
        self.summary.version = Some(next.clone());
        self.summary.tag = Some(tag.clone());

        progress.run(ReleaseStage::CleanBuildArtifacts, || self.clean_artifacts())?;
        progress.run(ReleaseStage::PersistManifestVersion, || {
            self.persist_version(&next)
        })?;
        progress.run(ReleaseStage::OptionalBuild, || self.build())?;
        let entry = progress.run(ReleaseStage::UpdateChangelog, || self.update_changelog(&tag))?;
        progress.run(ReleaseStage::SyncLockFile, || self.sync_lock_file())?;
        progress.run(ReleaseStage::StageChanges, || self.stage_changes())?;

        let message = format!(
            "{} Ready to release a version \"{tag}\" and push commits to remote? Choose No to cancel.",
            self.label()
        );
        progress.run(ReleaseStage::ConfirmRelease, || {
            self.gate(&message, Gate::Cancel)
        })?;
        progress.run(ReleaseStage::TagCommitPush, || {
            self.tag_commit_push(&next, &tag)
        })?;

        let message = format!("{} Are you ready to publish \"{tag}\" to npm?", self.label());
        let publish = progress.run(ReleaseStage::ConfirmPublish, || {
            self.gate(&message, Gate::Skip)
        })?;

        if publish == Gate::Proceed {
            progress.run(ReleaseStage::PublishSequence, || self.publish(bump))?;
            progress.run(ReleaseStage::OptionalRemoteRelease, || {
                self.remote_release(&tag, &entry, repo)
            })?;
        } else {
            let declined = || -> ReleaseResult<Step<()>> { Ok(Step::skipped("publish declined")) };
            progress.run(ReleaseStage::PublishSequence, declined)?;
            progress.run(ReleaseStage::OptionalRemoteRelease, declined)?;
        }

        progress.run(ReleaseStage::FinalPush, || self.final_push())?;
        Ok(())
    }

    // ── Stage bodies ──

    fn check_clean(&self) -> ReleaseResult<Step<()>> {
        if self.options.skip_checks {
            return Ok(Step::skipped("--skip-checks"));
        }
        if git::has_uncommitted_changes(&self.runner, &self.opts())? {
            return Err(ReleaseError::UncommittedChanges);
        }
        Ok(Step::success("working tree is clean"))
    }

    fn identify_repo(&self) -> ReleaseResult<Step<Result<RepoId, GitError>>> {
        let current = self.manifest.version()?;
        let repo = git::identify_repo(&self.runner, &self.settings.remote, &self.opts());
        let outcome = match &repo {
            Ok(id) => StageOutcome::success(format!(
                "releasing {id} (currently at {current})"
            )),
            Err(err) => {
                warn!(error = %err, "repository not identified");
                StageOutcome::skipped(format!("repository not identified: {err}"))
            }
        };
        Ok(Step::Done(repo, outcome))
    }

    fn select_bump(&mut self, current: &Version) -> ReleaseResult<Step<BumpType>> {
        let mut choices = Vec::with_capacity(BumpType::COMPUTABLE.len() + 2);
        for bump in BumpType::COMPUTABLE {
            let next = match version::compute_next_version(current, bump) {
                Ok(next) => next,
                Err(VersionError::Overflow(_)) => {
                    warn!(%bump, %current, "bump overflows; left out of the menu");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let name = match bump.hint() {
                "" => format!("{bump} ({next})"),
                hint => format!("{bump} ({next}) - {hint}"),
            };
            choices.push(Choice::new(name, bump));
        }
        choices.push(Choice::new("Other, please specify...", BumpType::Other));
        choices.push(Choice::new("QUIT", BumpType::Quit));

        let message = format!("{} Select increment to apply (next version)", self.label());
        let bump = prompt::select(&mut *self.prompter, &message, &choices, choices.len() - 1)?;
        if bump == BumpType::Quit {
            return Ok(Step::Cancel);
        }
        Ok(Step::Done(bump, StageOutcome::success(bump.to_string())))
    }

    fn resolve_version(&mut self, current: &Version, bump: BumpType) -> ReleaseResult<Step<String>> {
        let (next, note) = if bump == BumpType::Other {
            let input = self
                .prompter
                .read_line("Please enter a valid version number (or type \"q\" to quit):")?;
            let literal = input.trim();
            if literal == "q" {
                return Ok(Step::Cancel);
            }
            if literal.is_empty() {
                return Err(ReleaseError::EmptyVersion);
            }
            (literal.to_string(), " (entered by hand)")
        } else {
            (version::compute_next_version(current, bump)?.to_string(), "")
        };
        let tag = self.settings.tag_for(&next);
        let banner = format!("{} Bumping new version to \"{tag}\"", self.label());
        self.prompter.say(banner.trim_start());
        Ok(Step::Done(
            next,
            StageOutcome::success(format!("{current} → {tag}{note}")),
        ))
    }

    fn clean_artifacts(&self) -> ReleaseResult<Step<()>> {
        let dist = self.root.join(&self.settings.dist_dir);
        match fs::remove_dir_all(&dist) {
            Ok(()) => Ok(Step::success(format!("removed {}", self.settings.dist_dir))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Step::skipped(format!(
                "{} does not exist",
                self.settings.dist_dir
            ))),
            Err(source) => Err(ReleaseError::Artifacts { path: dist, source }),
        }
    }

    fn persist_version(&mut self, next: &str) -> ReleaseResult<Step<()>> {
        self.manifest.set_version(next);
        self.manifest.persist()?;
        let message = format!("{} {MANIFEST_FILE} version set to {next}", self.label());
        Ok(Step::success(message.trim_start()))
    }

    fn build(&self) -> ReleaseResult<Step<()>> {
        let Some(script) = self.options.build_script.as_deref() else {
            return Ok(Step::skipped("no build script"));
        };
        registry::run_script(&self.runner, self.options.npm_client, script, &self.opts())?;
        Ok(Step::success(format!(
            "{} run {script}",
            self.options.npm_client
        )))
    }

    fn update_changelog(&self, tag: &str) -> ReleaseResult<Step<ChangelogEntry>> {
        let path = self.root.join(&self.settings.changelog_file);
        let entry = changelog::update(&self.runner, &path, tag, &self.opts())?;
        let message = format!("{} updated", self.settings.changelog_file);
        Ok(Step::Done(entry, StageOutcome::success(message)))
    }

    fn sync_lock_file(&self) -> ReleaseResult<Step<()>> {
        let client = self.options.npm_client;
        registry::sync_lock_file(&self.runner, client, &self.opts(), self.options.dry_run)?;
        Ok(Step::success(self.would(format!("{client} lock file synchronized"))))
    }

    fn stage_changes(&self) -> ReleaseResult<Step<()>> {
        git::add_all(&self.runner, &self.opts(), self.options.dry_run)?;
        Ok(Step::success(self.would("all changes staged".to_string())))
    }

    fn gate(&mut self, message: &str, on_no: Gate) -> ReleaseResult<Step<Gate>> {
        let answer = if prompt::confirm(&mut *self.prompter, message)? {
            Gate::Proceed
        } else {
            on_no
        };
        match answer {
            Gate::Cancel => Ok(Step::Cancel),
            Gate::Proceed => Ok(Step::Done(answer, StageOutcome::success("confirmed"))),
            Gate::Skip => Ok(Step::Done(answer, StageOutcome::success("declined"))),
        }
    }

    fn tag_commit_push(&self, next: &str, tag: &str) -> ReleaseResult<Step<()>> {
        let opts = self.opts();
        let dry_run = self.options.dry_run;
        let remote = &self.settings.remote;
        git::tag(&self.runner, tag, &opts, dry_run)?;
        git::commit(
            &self.runner,
            &self.settings.commit_message_for(next),
            &opts,
            dry_run,
        )?;
        git::push_tag(&self.runner, tag, remote, &opts, dry_run)?;
        git::push_current_branch(&self.runner, remote, &opts, dry_run)?;
        Ok(Step::success(self.would(format!(
            "tagged {tag}, committed and pushed to {remote}"
        ))))
    }

    fn publish(&mut self, bump: BumpType) -> ReleaseResult<Step<()>> {
        let guard = ManifestGuard::backup(self.manifest.path())?;
        let published = self.strip_and_publish(&guard, bump);
        let restored = guard.restore();
        if let (Err(_), Err(err)) = (&published, &restored) {
            warn!(error = %err, "manifest not restored after the failed publish");
        }
        published?;
        restored?;

        let target = self.manifest.name().map_or_else(
            || "published to npm".to_string(),
            |name| format!("published to npm: https://www.npmjs.com/package/{name}"),
        );
        let message = format!("{} {target}", self.label());
        Ok(Step::success(message.trim_start()))
    }

    fn strip_and_publish(&mut self, guard: &ManifestGuard, bump: BumpType) -> ReleaseResult<()> {
        let opts = self.opts();
        guard.strip(&self.runner, &self.settings.publish_clean_fields, &opts)?;

        let label = self.label();
        let otp = prompt::collect_otp(&mut *self.prompter, label)?;
        let request = PublishRequest {
            channel: bump.channel(),
            otp: Some(otp).filter(|otp| !otp.is_empty()),
            dry_run: self.options.dry_run,
            provenance: self.options.provenance,
        };
        registry::publish(&self.runner, self.options.npm_client, &request, &opts)?;
        Ok(())
    }

    fn remote_release(
        &mut self,
        tag: &str,
        entry: &ChangelogEntry,
        repo: Result<RepoId, GitError>,
    ) -> ReleaseResult<Step<()>> {
        let Some(token) = self.options.create_release.as_deref() else {
            return Ok(Step::skipped("no release token given"));
        };
        let repo = repo.map_err(ReleaseError::RepoUnavailable)?;
        let client = ReleaseClient::new(token)?;
        let note = ReleaseNote::new(self.manifest.name(), tag, &entry.text);
        let url = client.create_release(
            &self.runner,
            &note,
            &repo,
            &self.opts(),
            self.options.dry_run,
        )?;
        let message = url.as_deref().map_or_else(
            || self.would(format!("release {tag} created on {repo}")),
            |url| format!("release created: {url}"),
        );
        self.summary.release_url = url;
        Ok(Step::success(message))
    }

    fn final_push(&self) -> ReleaseResult<Step<()>> {
        let remote = &self.settings.remote;
        git::push_current_branch(&self.runner, remote, &self.opts(), self.options.dry_run)?;
        Ok(Step::success(self.would(format!("pushed to {remote}"))))
    }

    // ── Helpers ──

    fn opts(&self) -> RunOptions {
        RunOptions::new(&self.root)
    }

    const fn label(&self) -> &'static str {
        if self.options.dry_run {
            DRY_RUN_LABEL
        } else {
            ""
        }
    }

    /// Prefix a message about a skipped-in-dry-run action.
    fn would(&self, message: String) -> String {
        if self.options.dry_run {
            format!("{DRY_RUN_LABEL} would have {message}")
        } else {
            message
        }
    }
}
