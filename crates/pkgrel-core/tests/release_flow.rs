//! End-to-end runs of the release orchestrator against a scratch project.
//!
//! External commands are answered by a scripted runner; `npm pkg delete` is
//! applied to the real `package.json` so the publish guard can be observed.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use pkgrel_core::prompt::{PromptError, PromptResult, Prompter};
use pkgrel_core::runner::{CommandRunner, RunError, RunOptions, RunResult};
use pkgrel_core::{
    ErrorKind, NpmClient, ReleaseError, ReleaseEvent, ReleaseOptions, ReleaseOrchestrator,
    ReleaseOutcome, ReleaseSettings, ReleaseStage, ReleaseStatus, StageOutcome,
};
use serde_json::Value;
use tempfile::TempDir;

// ──────────────────────────────────────────────
// Fakes
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Ran {
    Buffered(String),
    Streamed(String),
    WouldRun(String),
}

impl Ran {
    fn line(&self) -> &str {
        match self {
            Self::Buffered(l) | Self::Streamed(l) | Self::WouldRun(l) => l,
        }
    }

    const fn executed(&self) -> bool {
        !matches!(self, Self::WouldRun(_))
    }
}

struct FakeRunner {
    ran: RefCell<Vec<Ran>>,
    /// Manifest version on disk when a package script was started.
    version_at_script: RefCell<Option<String>>,
    replies: Vec<(&'static str, Result<&'static str, &'static str>)>,
}

impl FakeRunner {
    fn new(dirty: bool) -> Self {
        Self {
            ran: RefCell::new(Vec::new()),
            version_at_script: RefCell::new(None),
            replies: vec![
                ("git status", Ok(if dirty { " M src/index.js\n" } else { "" })),
                ("git remote get-url", Ok("git@github.com:acme/widget.git\n")),
                ("git rev-parse --abbrev-ref HEAD", Ok("main\n")),
                ("git describe", Err("fatal: No names found")),
                ("git log", Ok("feat: add gears\nfix: oil the hinges\n")),
            ],
        }
    }

    fn failing(mut self, prefix: &'static str) -> Self {
        self.replies.insert(0, (prefix, Err("boom")));
        self
    }

    fn executed(&self) -> Vec<String> {
        self.ran
            .borrow()
            .iter()
            .filter(|r| r.executed())
            .map(|r| r.line().to_string())
            .collect()
    }

    fn would_run(&self) -> Vec<String> {
        self.ran
            .borrow()
            .iter()
            .filter(|r| !r.executed())
            .map(|r| r.line().to_string())
            .collect()
    }

    fn answer(&self, line: String, opts: &RunOptions) -> RunResult<String> {
        if line.starts_with("npm run ") {
            let doc: Value =
                serde_json::from_str(&fs::read_to_string(opts.cwd.join("package.json")).unwrap())
                    .unwrap();
            *self.version_at_script.borrow_mut() = doc["version"].as_str().map(str::to_owned);
        }
        if let Some(field) = line.strip_prefix("npm pkg delete ") {
            strip_field(&opts.cwd.join("package.json"), field);
        }
        match self.replies.iter().find(|(prefix, _)| line.starts_with(prefix)) {
            Some((_, Ok(stdout))) => Ok((*stdout).to_string()),
            Some((_, Err(stderr))) => Err(RunError::Failed {
                command: line,
                code: Some(1),
                stderr: (*stderr).to_string(),
            }),
            None => Ok(String::new()),
        }
    }
}

fn render(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_field(path: &Utf8Path, field: &str) {
    let mut doc: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    doc.as_object_mut().unwrap().remove(field);
    fs::write(path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();
}

impl CommandRunner for FakeRunner {
    fn run_buffered(&self, program: &str, args: &[&str], opts: &RunOptions) -> RunResult<String> {
        let line = render(program, args);
        self.ran.borrow_mut().push(Ran::Buffered(line.clone()));
        self.answer(line, opts)
    }

    fn run_streamed(&self, program: &str, args: &[&str], opts: &RunOptions) -> RunResult<()> {
        let line = render(program, args);
        self.ran.borrow_mut().push(Ran::Streamed(line.clone()));
        self.answer(line, opts).map(|_| ())
    }

    fn log_would_run(&self, program: &str, args: &[&str]) {
        self.ran
            .borrow_mut()
            .push(Ran::WouldRun(render(program, args)));
    }
}

#[derive(Default)]
struct Operator {
    answers: VecDeque<String>,
    shown: Vec<String>,
}

impl Operator {
    fn answering(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| (*a).to_string()).collect(),
            shown: Vec::new(),
        }
    }
}

impl Prompter for Operator {
    fn say(&mut self, line: &str) {
        self.shown.push(line.to_string());
    }

    fn read_line(&mut self, prompt: &str) -> PromptResult<String> {
        self.shown.push(prompt.to_string());
        self.answers.pop_front().ok_or(PromptError::Interrupted)
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

const MANIFEST: &str = r#"{
  "name": "widget",
  "version": "1.0.0",
  "main": "dist/index.js",
  "scripts": {
    "build": "tsc"
  },
  "devDependencies": {
    "typescript": "^5.0.0"
  }
}
"#;

struct Project {
    _tmp: TempDir,
    root: Utf8PathBuf,
}

impl Project {
    fn new(version: &str) -> Self {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        fs::write(
            root.join("package.json"),
            MANIFEST.replace("1.0.0", version),
        )
        .unwrap();
        fs::create_dir_all(root.join("dist")).unwrap();
        fs::write(root.join("dist/index.js"), "stale").unwrap();
        Self { _tmp: tmp, root }
    }

    fn manifest(&self) -> String {
        fs::read_to_string(self.root.join("package.json")).unwrap()
    }

    fn version(&self) -> String {
        let doc: Value = serde_json::from_str(&self.manifest()).unwrap();
        doc["version"].as_str().unwrap().to_string()
    }

    fn backup_exists(&self) -> bool {
        self.root.join("package.json.backup").exists()
    }
}

fn release(
    project: &Project,
    options: ReleaseOptions,
    runner: &FakeRunner,
    operator: &mut Operator,
) -> (Result<ReleaseOutcome, ReleaseError>, Vec<ReleaseEvent>) {
    let mut events = Vec::new();
    let result = ReleaseOrchestrator::for_project(
        options,
        ReleaseSettings::default(),
        &project.root,
        runner,
        operator,
    )
    .and_then(|orchestrator| orchestrator.run(|event| events.push(event)));
    (result, events)
}

fn position(lines: &[String], needle: &str) -> usize {
    lines
        .iter()
        .position(|l| l == needle)
        .unwrap_or_else(|| panic!("`{needle}` not found in {lines:#?}"))
}

// ──────────────────────────────────────────────
// Scenarios
// ──────────────────────────────────────────────

#[test]
fn patch_release_publishes_and_pushes() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(false);
    // patch, confirm release, confirm publish, no OTP
    let mut operator = Operator::answering(&["1", "", "", ""]);

    let (result, _) = release(&project, ReleaseOptions::default(), &runner, &mut operator);
    let outcome = result.unwrap();

    assert_eq!(outcome.status, ReleaseStatus::Completed);
    assert_eq!(outcome.version.as_deref(), Some("1.0.1"));
    assert_eq!(outcome.tag.as_deref(), Some("1.0.1"));
    assert_eq!(outcome.stages.len(), ReleaseStage::ALL.len());
    assert_eq!(project.version(), "1.0.1");
    assert!(!project.root.join("dist").exists());
    assert!(!project.backup_exists());

    let lines = runner.executed();
    let tag = position(&lines, "git tag 1.0.1");
    let commit = position(&lines, "git commit -m chore(release): publish version 1.0.1");
    let push_tag = position(&lines, "git push origin refs/tags/1.0.1");
    let push_branch = position(&lines, "git push origin main");
    assert!(tag < commit && commit < push_tag && push_tag < push_branch);

    let commits = lines.iter().filter(|l| l.starts_with("git commit")).count();
    assert_eq!(commits, 1);
    assert!(lines.contains(&"npm publish".to_string()));
    assert!(!lines.iter().any(|l| l.starts_with("gh ")));

    // Stripped for publish, restored afterwards.
    assert!(project.manifest().contains("devDependencies"));
    assert!(project.manifest().contains("\"scripts\""));

    let changelog = fs::read_to_string(project.root.join("CHANGELOG.md")).unwrap();
    assert!(changelog.starts_with("# Changelog\n\n## 1.0.1 ("));
    assert!(changelog.contains("- add gears"));
}

#[test]
fn declining_publish_still_pushes() {
    let project = Project::new("2.0.0");
    let runner = FakeRunner::new(false);
    // premajor.beta, confirm release, decline publish
    let mut operator = Operator::answering(&["7", "1", "2"]);

    let (result, _) = release(&project, ReleaseOptions::default(), &runner, &mut operator);
    let outcome = result.unwrap();

    assert_eq!(outcome.status, ReleaseStatus::Completed);
    assert_eq!(project.version(), "3.0.0-beta.0");
    assert!(project.root.join("CHANGELOG.md").exists());

    let lines = runner.executed();
    assert!(lines.contains(&"npm install --package-lock-only --legacy-peer-deps".to_string()));
    assert!(lines.contains(&"git add .".to_string()));
    assert!(lines.contains(&"git tag 3.0.0-beta.0".to_string()));
    assert!(lines.contains(&"git push origin refs/tags/3.0.0-beta.0".to_string()));
    assert!(!lines.iter().any(|l| l.starts_with("npm publish")));
    assert!(!lines.iter().any(|l| l.starts_with("npm pkg delete")));
    assert!(!project.backup_exists());

    let (last_stage, last) = outcome.stages.last().unwrap();
    assert_eq!(*last_stage, ReleaseStage::FinalPush);
    assert!(matches!(last, StageOutcome::Success { .. }));
    let publish = outcome
        .stages
        .iter()
        .find(|(stage, _)| *stage == ReleaseStage::PublishSequence)
        .unwrap();
    assert!(matches!(publish.1, StageOutcome::Skipped { .. }));
}

#[test]
fn dirty_tree_fails_before_any_write() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(true);
    let mut operator = Operator::answering(&["1", "", "", ""]);

    let (result, events) = release(&project, ReleaseOptions::default(), &runner, &mut operator);
    let err = result.unwrap_err();

    assert!(matches!(err, ReleaseError::UncommittedChanges));
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(project.manifest(), MANIFEST);
    assert!(project.root.join("dist").exists());
    assert_eq!(runner.executed(), ["git status --porcelain"]);
    assert!(matches!(
        events.last(),
        Some(ReleaseEvent::StageFailed(ReleaseStage::RepoCleanCheck, _))
    ));
}

#[test]
fn skip_checks_ignores_dirty_tree() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(true);
    let mut operator = Operator::answering(&["", ""]);
    let options = ReleaseOptions {
        skip_checks: true,
        ..ReleaseOptions::default()
    };

    let (result, _) = release(&project, options, &runner, &mut operator);
    let outcome = result.unwrap();

    // Default menu entry is QUIT.
    assert_eq!(
        outcome.status,
        ReleaseStatus::Cancelled {
            at: ReleaseStage::SelectBump
        }
    );
    assert!(!runner.executed().iter().any(|l| l.starts_with("git status")));
    assert_eq!(project.manifest(), MANIFEST);
}

#[test]
fn other_version_is_used_verbatim() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(false);
    // Other..., literal, then cancel at the release gate
    let mut operator = Operator::answering(&["8", "0.9.0-hotfix", "2"]);

    let (result, _) = release(&project, ReleaseOptions::default(), &runner, &mut operator);
    let outcome = result.unwrap();

    assert_eq!(
        outcome.status,
        ReleaseStatus::Cancelled {
            at: ReleaseStage::ConfirmRelease
        }
    );
    assert_eq!(project.version(), "0.9.0-hotfix");
    assert!(!runner.executed().iter().any(|l| l.starts_with("git tag")));
}

#[test]
fn q_at_version_prompt_cancels() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(false);
    let mut operator = Operator::answering(&["8", "q"]);

    let (result, events) = release(&project, ReleaseOptions::default(), &runner, &mut operator);

    assert_eq!(
        result.unwrap().status,
        ReleaseStatus::Cancelled {
            at: ReleaseStage::ResolveVersion
        }
    );
    assert_eq!(project.manifest(), MANIFEST);
    assert!(matches!(
        events.last(),
        Some(ReleaseEvent::Cancelled(ReleaseStage::ResolveVersion))
    ));
}

#[test]
fn out_of_range_selection_is_a_validation_error() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(false);
    let mut operator = Operator::answering(&["42"]);

    let (result, _) = release(&project, ReleaseOptions::default(), &runner, &mut operator);

    assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
    assert_eq!(project.manifest(), MANIFEST);
}

#[test]
fn failed_publish_restores_manifest() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(false).failing("npm publish");
    let mut operator = Operator::answering(&["1", "", "", ""]);

    let (result, _) = release(&project, ReleaseOptions::default(), &runner, &mut operator);
    let err = result.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExternalCommand);
    assert!(!project.backup_exists());
    assert_eq!(project.manifest(), MANIFEST.replace("1.0.0", "1.0.1"));
    // The branch is not pushed a second time after a failure.
    let pushes = runner
        .executed()
        .iter()
        .filter(|l| l.as_str() == "git push origin main")
        .count();
    assert_eq!(pushes, 1);
}

#[test]
fn bad_otp_restores_manifest() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(false);
    let mut operator = Operator::answering(&["1", "", "", "123"]);

    let (result, _) = release(&project, ReleaseOptions::default(), &runner, &mut operator);

    assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
    assert!(!project.backup_exists());
    assert_eq!(project.manifest(), MANIFEST.replace("1.0.0", "1.0.1"));
    assert!(!runner.executed().iter().any(|l| l.starts_with("npm publish")));
}

#[test]
fn prerelease_publishes_on_its_channel() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(false);
    // preminor.alpha, confirm, confirm, OTP
    let mut operator = Operator::answering(&["4", "", "", "123456"]);
    let options = ReleaseOptions {
        npm_client: NpmClient::Pnpm,
        provenance: true,
        ..ReleaseOptions::default()
    };

    let (result, _) = release(&project, options, &runner, &mut operator);
    result.unwrap();

    assert_eq!(project.version(), "1.1.0-alpha.0");
    assert!(runner.executed().contains(
        &"pnpm publish --tag alpha --otp 123456 --provenance --no-git-checks".to_string()
    ));
    assert!(runner
        .executed()
        .contains(&"pnpm install --lockfile-only --ignore-scripts".to_string()));
}

#[test]
fn dry_run_touches_nothing_remote() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(false);
    let mut operator = Operator::answering(&["2", "", "", ""]);
    let options = ReleaseOptions {
        dry_run: true,
        create_release: Some("ghp_token".into()),
        ..ReleaseOptions::default()
    };

    let (result, events) = release(&project, options, &runner, &mut operator);
    let outcome = result.unwrap();

    assert!(outcome.dry_run);
    // The manifest version is still written.
    assert_eq!(project.version(), "1.1.0");
    assert!(!project.backup_exists());

    let executed = runner.executed();
    for forbidden in ["git add", "git tag", "git commit", "git push", "npm install", "gh "] {
        assert!(
            !executed.iter().any(|l| l.starts_with(forbidden)),
            "`{forbidden}` executed in dry-run: {executed:#?}"
        );
    }
    assert!(executed.contains(&"npm publish --dry-run".to_string()));

    let echoed = runner.would_run();
    assert!(echoed.contains(&"git tag 1.1.0".to_string()));
    assert!(echoed.iter().any(|l| l.starts_with("gh release create 1.1.0")));
    assert!(!echoed.iter().any(|l| l.contains("ghp_token")));

    // Echoes are reported under the stage that skipped them.
    let reported: Vec<(ReleaseStage, &str)> = events
        .iter()
        .filter_map(|e| match e {
            ReleaseEvent::WouldRun(stage, command) => Some((*stage, command.as_str())),
            _ => None,
        })
        .collect();
    assert!(reported.contains(&(ReleaseStage::TagCommitPush, "git tag 1.1.0")));
    assert!(reported.contains(&(ReleaseStage::StageChanges, "git add .")));
    assert_eq!(reported.len(), echoed.len());
    let tag_done = events
        .iter()
        .position(|e| {
            matches!(e, ReleaseEvent::StageCompleted(ReleaseStage::TagCommitPush, _))
        })
        .unwrap();
    let tag_echo = events
        .iter()
        .position(|e| matches!(e, ReleaseEvent::WouldRun(ReleaseStage::TagCommitPush, _)))
        .unwrap();
    assert!(tag_echo < tag_done);
}

#[test]
fn remote_release_needs_identified_repo() {
    let project = Project::new("1.0.0");
    let mut runner = FakeRunner::new(false);
    runner.replies[1] = ("git remote get-url", Ok("/srv/git/widget\n"));
    let mut operator = Operator::answering(&["1", "", "", ""]);
    let options = ReleaseOptions {
        create_release: Some("ghp_token".into()),
        ..ReleaseOptions::default()
    };

    let (result, _) = release(&project, options, &runner, &mut operator);
    let err = result.unwrap_err();

    assert!(matches!(err, ReleaseError::RepoUnavailable(_)));
    assert_eq!(err.kind(), ErrorKind::Precondition);
    // Everything up to publishing already happened.
    assert!(runner.executed().contains(&"npm publish".to_string()));
}

#[test]
fn remote_release_uses_changelog_entry() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(false);
    let mut operator = Operator::answering(&["1", "", "", ""]);
    let options = ReleaseOptions {
        create_release: Some("ghp_token".into()),
        ..ReleaseOptions::default()
    };

    let (result, _) = release(&project, options, &runner, &mut operator);
    result.unwrap();

    let gh = runner
        .executed()
        .into_iter()
        .find(|l| l.starts_with("gh release create"))
        .unwrap();
    assert!(gh.starts_with("gh release create 1.0.1 --repo acme/widget --title widget 1.0.1 --notes ## 1.0.1"));
    assert!(gh.contains("- oil the hinges"));
}

#[test]
fn events_bracket_every_stage() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(false);
    let mut operator = Operator::answering(&["1", "", "", ""]);

    let (result, events) = release(&project, ReleaseOptions::default(), &runner, &mut operator);
    result.unwrap();

    let started: Vec<ReleaseStage> = events
        .iter()
        .filter_map(|e| match e {
            ReleaseEvent::StageStarted(stage) => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(started, ReleaseStage::ALL);
    assert_eq!(events.len(), 2 * ReleaseStage::ALL.len());
}

#[test]
fn build_script_runs_between_version_write_and_changelog() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(false);
    let mut operator = Operator::answering(&["1", "", "", ""]);
    let options = ReleaseOptions {
        build_script: Some("build".into()),
        ..ReleaseOptions::default()
    };

    let (result, _) = release(&project, options, &runner, &mut operator);
    let outcome = result.unwrap();
    assert_eq!(outcome.status, ReleaseStatus::Completed);

    let ran = runner.ran.borrow();
    let build = ran
        .iter()
        .position(|r| *r == Ran::Streamed("npm run build".into()))
        .unwrap();
    let log = ran
        .iter()
        .position(|r| r.line().starts_with("git log"))
        .unwrap();
    assert!(build < log, "build ran after the changelog: {ran:#?}");
    assert_eq!(runner.version_at_script.borrow().as_deref(), Some("1.0.1"));

    let stage = outcome
        .stages
        .iter()
        .find(|(stage, _)| *stage == ReleaseStage::OptionalBuild)
        .unwrap();
    assert!(matches!(stage.1, StageOutcome::Success { .. }));
}

#[test]
fn failing_build_script_stops_the_release() {
    let project = Project::new("1.0.0");
    let runner = FakeRunner::new(false).failing("npm run");
    let mut operator = Operator::answering(&["1", "", "", ""]);
    let options = ReleaseOptions {
        build_script: Some("build".into()),
        ..ReleaseOptions::default()
    };

    let (result, events) = release(&project, options, &runner, &mut operator);
    let err = result.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExternalCommand);
    assert!(matches!(
        events.last(),
        Some(ReleaseEvent::StageFailed(ReleaseStage::OptionalBuild, _))
    ));
    assert_eq!(project.version(), "1.0.1");
    assert!(!project.root.join("CHANGELOG.md").exists());

    let executed = runner.executed();
    for forbidden in ["git log", "git add", "git tag", "git commit", "git push", "npm publish"] {
        assert!(
            !executed.iter().any(|l| l.starts_with(forbidden)),
            "`{forbidden}` ran after the build failed: {executed:#?}"
        );
    }
}

#[test]
fn overflowing_bumps_are_left_out_of_the_menu() {
    let project = Project::new("18446744073709551615.0.0");
    let runner = FakeRunner::new(false);
    // third entry is preminor.alpha once the major bumps drop out; then cancel
    let mut operator = Operator::answering(&["3", "2"]);

    let (result, _) = release(&project, ReleaseOptions::default(), &runner, &mut operator);

    assert_eq!(
        result.unwrap().status,
        ReleaseStatus::Cancelled {
            at: ReleaseStage::ConfirmRelease
        }
    );
    assert_eq!(project.version(), "18446744073709551615.1.0-alpha.0");
    assert!(operator.shown.contains(&" 6 - QUIT".to_string()));
    assert!(!operator.shown.iter().any(|l| l.contains("major")));
}
