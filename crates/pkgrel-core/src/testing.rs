//! Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::prompt::{PromptError, PromptResult, Prompter};
use crate::runner::{CommandRunner, RunError, RunOptions, RunResult};

/// How a command was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Buffered,
    Streamed,
    WouldRun,
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub mode: Mode,
    pub line: String,
    pub env: Vec<(String, String)>,
}

/// Records every command and answers from a table of canned outputs.
#[derive(Default)]
pub struct RecordingRunner {
    pub calls: RefCell<Vec<Call>>,
    replies: Vec<(String, Result<String, String>)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to commands starting with `prefix` with `stdout`.
    pub fn reply(mut self, prefix: &str, stdout: &str) -> Self {
        self.replies.push((prefix.to_owned(), Ok(stdout.to_owned())));
        self
    }

    /// Make commands starting with `prefix` fail.
    pub fn fail(mut self, prefix: &str, stderr: &str) -> Self {
        self.replies.push((prefix.to_owned(), Err(stderr.to_owned())));
        self
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.line.clone()).collect()
    }

    pub fn lines_in(&self, mode: Mode) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.mode == mode)
            .map(|c| c.line.clone())
            .collect()
    }

    fn answer(&self, mode: Mode, program: &str, args: &[&str], opts: &RunOptions) -> RunResult<String> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.borrow_mut().push(Call {
            mode,
            line: line.clone(),
            env: opts.env.clone(),
        });
        match self.replies.iter().find(|(prefix, _)| line.starts_with(prefix)) {
            Some((_, Ok(stdout))) => Ok(stdout.clone()),
            Some((_, Err(stderr))) => Err(RunError::Failed {
                command: line,
                code: Some(1),
                stderr: stderr.clone(),
            }),
            None => Ok(String::new()),
        }
    }
}

impl CommandRunner for RecordingRunner {
    fn run_buffered(&self, program: &str, args: &[&str], opts: &RunOptions) -> RunResult<String> {
        self.answer(Mode::Buffered, program, args, opts)
    }

    fn run_streamed(&self, program: &str, args: &[&str], opts: &RunOptions) -> RunResult<()> {
        self.answer(Mode::Streamed, program, args, opts).map(|_| ())
    }

    fn log_would_run(&self, program: &str, args: &[&str]) {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.borrow_mut().push(Call {
            mode: Mode::WouldRun,
            line,
            env: Vec::new(),
        });
    }
}

/// Answers prompts from a fixed script.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub shown: Vec<String>,
}

impl ScriptedPrompter {
    pub fn answering(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|s| (*s).to_owned()).collect(),
            shown: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn say(&mut self, line: &str) {
        self.shown.push(line.to_owned());
    }

    fn read_line(&mut self, prompt: &str) -> PromptResult<String> {
        self.shown.push(prompt.to_owned());
        self.answers.pop_front().ok_or(PromptError::Interrupted)
    }
}
