//! External command execution.
//!
//! Every collaborator (git, the npm client, `gh`) goes through a
//! [`CommandRunner`], which keeps the release pipeline testable and gives a
//! single place where commands are logged.

use std::process::{Command, Stdio};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from running external commands.
#[derive(Error, Debug)]
pub enum RunError {
    /// The program is not on `PATH`.
    #[error("`{program}` was not found on PATH")]
    NotFound {
        /// Program name.
        program: String,
    },

    /// The process could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The process exited unsuccessfully.
    #[error("`{command}` failed{}{}", exit_note(.code), stderr_note(.stderr))]
    Failed {
        /// Rendered command line.
        command: String,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured stderr (empty for streamed commands).
        stderr: String,
    },
}

fn exit_note(code: &Option<i32>) -> String {
    code.map(|c| format!(" with exit code {c}")).unwrap_or_default()
}

fn stderr_note(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Result alias for command execution.
pub type RunResult<T> = Result<T, RunError>;

/// Working directory and extra environment for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Directory the command runs in.
    pub cwd: Utf8PathBuf,
    /// Variables added to the inherited environment.
    pub env: Vec<(String, String)>,
}

impl RunOptions {
    /// Run in `cwd` with the inherited environment.
    pub fn new(cwd: impl AsRef<Utf8Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            env: Vec::new(),
        }
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Executes external commands.
pub trait CommandRunner {
    /// Run to completion with output captured; returns stdout.
    fn run_buffered(&self, program: &str, args: &[&str], opts: &RunOptions) -> RunResult<String>;

    /// Run to completion attached to the terminal.
    fn run_streamed(&self, program: &str, args: &[&str], opts: &RunOptions) -> RunResult<()>;

    /// Report a command that dry-run mode is not executing.
    fn log_would_run(&self, program: &str, args: &[&str]);
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(program: &str, args: &[&str], opts: &RunOptions) -> RunResult<Command> {
        let path = which::which(program).map_err(|_| RunError::NotFound {
            program: program.to_owned(),
        })?;
        let mut cmd = Command::new(path);
        cmd.args(args)
            .current_dir(opts.cwd.as_std_path())
            .envs(opts.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Ok(cmd)
    }
}

impl CommandRunner for SystemRunner {
    fn run_buffered(&self, program: &str, args: &[&str], opts: &RunOptions) -> RunResult<String> {
        let rendered = render_command(program, args);
        debug!(command = %rendered, cwd = %opts.cwd, "running");

        let output = Self::command(program, args, opts)?
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RunError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RunError::Failed {
                command: rendered,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_streamed(&self, program: &str, args: &[&str], opts: &RunOptions) -> RunResult<()> {
        let rendered = render_command(program, args);
        debug!(command = %rendered, cwd = %opts.cwd, "running (streamed)");

        let status = Self::command(program, args, opts)?
            .status()
            .map_err(|source| RunError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        if !status.success() {
            return Err(RunError::Failed {
                command: rendered,
                code: status.code(),
                stderr: String::new(),
            });
        }
        Ok(())
    }

    fn log_would_run(&self, program: &str, args: &[&str]) {
        let rendered = render_command(program, args);
        info!(command = %rendered, "dry-run: not executed");
    }
}

/// Render a command line for logs and error messages.
///
/// Arguments containing whitespace are quoted and the value following
/// `--otp` is masked.
pub fn render_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program.to_owned()];
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            parts.push("******".to_owned());
            mask_next = false;
            continue;
        }
        mask_next = *arg == "--otp";
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            parts.push(format!("{arg:?}"));
        } else {
            parts.push((*arg).to_owned());
        }
    }
    parts.join(" ")
}
