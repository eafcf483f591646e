//! Operator prompts on the process's terminal.
//!
//! On an interactive terminal answers are read with `inquire`, which gives
//! line editing and Ctrl-C handling. When stdin is piped the prompter falls
//! back to plain line reads so scripted runs (and tests) can answer the
//! menus; end of input counts as an interrupt.

use std::io::{self, BufRead, IsTerminal, Write};

use inquire::InquireError;
use pkgrel_core::prompt::{PromptError, PromptResult, Prompter};

/// [`Prompter`] backed by stdin and stdout.
///
/// With `to_stderr` set, menu text goes to stderr so stdout stays free for
/// machine-readable output.
#[derive(Debug)]
pub struct ConsolePrompter {
    to_stderr: bool,
    interactive: bool,
}

impl ConsolePrompter {
    /// Create a prompter, detecting whether stdin is a terminal.
    pub fn new(to_stderr: bool) -> Self {
        Self {
            to_stderr,
            interactive: io::stdin().is_terminal(),
        }
    }

    fn write(&self, text: &str, newline: bool) -> io::Result<()> {
        let mut out: Box<dyn Write> = if self.to_stderr {
            Box::new(io::stderr().lock())
        } else {
            Box::new(io::stdout().lock())
        };
        if newline {
            writeln!(out, "{text}")?;
        } else {
            write!(out, "{text}")?;
        }
        out.flush()
    }

    fn read_piped(&self, prompt: &str) -> PromptResult<String> {
        self.write(prompt, false)?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(PromptError::Interrupted);
        }
        // Piped answers are not echoed; end the prompt line ourselves.
        self.write("", true)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Prompter for ConsolePrompter {
    fn say(&mut self, line: &str) {
        // A closed stdout is not worth aborting a half-done release for.
        let _ = self.write(line, true);
    }

    fn read_line(&mut self, prompt: &str) -> PromptResult<String> {
        if !self.interactive {
            return self.read_piped(prompt);
        }
        match inquire::Text::new(prompt.trim_end()).prompt() {
            Ok(answer) => Ok(answer),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                Err(PromptError::Interrupted)
            }
            Err(InquireError::NotTTY) => {
                self.interactive = false;
                self.read_piped(prompt)
            }
            Err(InquireError::IO(err)) => Err(PromptError::Io(err)),
            Err(other) => Err(PromptError::Io(io::Error::other(other.to_string()))),
        }
    }
}
