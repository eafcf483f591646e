//! Release command: thin CLI layer over `pkgrel_core::release`.

use std::time::{Duration, Instant};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use pkgrel_core::config::Config;
use pkgrel_core::runner::SystemRunner;
use pkgrel_core::{
    ReleaseEvent, ReleaseOptions, ReleaseOrchestrator, ReleaseOutcome, ReleaseStatus,
    StageOutcome,
};

use crate::Cli;
use crate::terminal::ConsolePrompter;

/// Machine-readable result printed with `--json`.
#[derive(Debug, Serialize)]
struct ReleaseReport<'a> {
    #[serde(flatten)]
    outcome: &'a ReleaseOutcome,
    elapsed_secs: f64,
}

/// Merge command-line switches over the `[release]` configuration table.
pub fn release_options(cli: &Cli, config: &Config) -> ReleaseOptions {
    let release = config.release.clone().unwrap_or_default();
    ReleaseOptions {
        dry_run: cli.dry_run(),
        create_release: cli.create_release.clone(),
        build_script: cli.build_script.clone().or(release.build_script),
        npm_client: cli.npm_client.or(release.npm_client).unwrap_or_default(),
        provenance: cli.provenance(release.provenance),
        skip_checks: cli.skip_checks(),
    }
}

/// Execute the release workflow in `cwd`.
#[instrument(name = "cmd_release", skip_all)]
pub fn cmd_release(cli: &Cli, config: &Config, cwd: &camino::Utf8Path) -> anyhow::Result<()> {
    let options = release_options(cli, config);
    let json = cli.json;
    let dry_run = options.dry_run;
    debug!(?options, json_output = json, "executing release command");

    let started = Instant::now();
    let runner = SystemRunner;
    let mut prompter = ConsolePrompter::new(json);
    let orchestrator = ReleaseOrchestrator::for_project(
        options,
        config.release_settings(),
        cwd,
        &runner,
        &mut prompter,
    )
    .with_context(|| format!("cannot release from {cwd}"))?;

    if !json && dry_run {
        println!(
            "\n{}\n",
            "DRY RUN: nothing will be committed, pushed or published"
                .yellow()
                .bold()
        );
    }

    let mut display = StageDisplay::new(dry_run);
    let result = orchestrator.run(|event| {
        if !json {
            display.handle(event);
        }
    });
    display.clear();
    let outcome = result.context("release failed")?;
    let elapsed = started.elapsed();

    if json {
        let report = ReleaseReport {
            outcome: &outcome,
            elapsed_secs: elapsed.as_secs_f64(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&outcome, elapsed);
    }
    Ok(())
}

fn print_summary(outcome: &ReleaseOutcome, elapsed: Duration) {
    println!();
    match outcome.status {
        ReleaseStatus::Cancelled { at } => {
            println!("{} Release cancelled at {}.", "–".yellow(), at.bold());
            return;
        }
        ReleaseStatus::Completed => {}
    }

    let tag = outcome.tag.as_deref().unwrap_or_default();
    if outcome.dry_run {
        println!(
            "{} Dry run complete for {} ({} stages previewed)",
            "○".green(),
            tag.bold(),
            outcome.stages.len(),
        );
    } else {
        println!(
            "{} Released {} (was {})",
            "✓".green().bold(),
            tag.green().bold(),
            outcome.previous_version.dimmed(),
        );
    }
    if let Some(url) = &outcome.release_url {
        println!("  {}: {}", "Release".dimmed(), url.cyan());
    }
    println!("Done (in {}s)", elapsed.as_secs());
}

/// Renders stage events, with a spinner while a non-interactive stage runs.
struct StageDisplay {
    dry_run: bool,
    spinner: Option<ProgressBar>,
}

impl StageDisplay {
    const fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            spinner: None,
        }
    }

    fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn handle(&mut self, event: ReleaseEvent) {
        match event {
            ReleaseEvent::StageStarted(stage) => {
                self.clear();
                // Interactive stages own the terminal; a spinner would draw over prompts.
                if stage.is_interactive() {
                    return;
                }
                let spinner = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
                    spinner.set_style(
                        style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
                    );
                }
                spinner.set_message(format!("{stage}..."));
                spinner.enable_steady_tick(Duration::from_millis(80));
                self.spinner = Some(spinner);
            }
            ReleaseEvent::StageCompleted(stage, outcome) => {
                self.clear();
                match outcome {
                    StageOutcome::Success { message } => {
                        let prefix = if self.dry_run { "○" } else { "✓" };
                        println!(
                            "  {} {} {}",
                            prefix.green(),
                            stage.bold(),
                            message.dimmed(),
                        );
                    }
                    StageOutcome::Skipped { reason } => {
                        println!(
                            "  {} {} {}",
                            "–".yellow(),
                            stage.bold(),
                            format!("skipped: {reason}").dimmed(),
                        );
                    }
                }
            }
            ReleaseEvent::StageFailed(stage, error) => {
                self.clear();
                eprintln!("  {} {} {}", "✗".red().bold(), stage.bold(), error.red());
            }
            ReleaseEvent::Cancelled(stage) => {
                self.clear();
                debug!(%stage, "operator cancelled");
            }
            ReleaseEvent::WouldRun(_, command) => {
                let line = format!("    {} would run: {}", "[dry-run]".yellow(), command.dimmed());
                match &self.spinner {
                    Some(spinner) => spinner.suspend(|| println!("{line}")),
                    None => println!("{line}"),
                }
            }
        }
    }
}
