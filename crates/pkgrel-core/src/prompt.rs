//! Operator prompts: numbered menus, yes/no gates, free text and OTP entry.
//!
//! The menu logic lives here; reading and writing the terminal is behind the
//! [`Prompter`] trait so the release pipeline can be driven by a script in
//! tests and by `inquire` in the CLI.

use thiserror::Error;

/// Errors from operator prompts.
#[derive(Error, Debug)]
pub enum PromptError {
    /// A numeric reply that does not name a menu entry.
    #[error("the input {input} could not be matched to a selection")]
    InvalidSelection {
        /// The raw reply.
        input: String,
    },

    /// A non-empty OTP that is not six characters long.
    #[error("OTP must be exactly 6 characters")]
    InvalidOtp,

    /// Input ended or the operator interrupted the prompt.
    #[error("prompt interrupted")]
    Interrupted,

    /// Reading from or writing to the terminal failed.
    #[error("prompt I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for prompt operations.
pub type PromptResult<T> = Result<T, PromptError>;

/// Length every non-empty one-time password must have.
pub const OTP_LEN: usize = 6;

/// Source of operator input.
pub trait Prompter {
    /// Show one line of text to the operator.
    fn say(&mut self, line: &str);

    /// Show `prompt` and block until the operator answers one line.
    ///
    /// The returned text has no trailing newline.
    fn read_line(&mut self, prompt: &str) -> PromptResult<String>;
}

/// One entry of a numbered menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice<T> {
    /// Label shown to the operator.
    pub name: String,
    /// Value returned when the entry is picked.
    pub value: T,
}

impl<T> Choice<T> {
    /// Build a menu entry.
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Show a 1-based numbered menu and return the value of the picked entry.
///
/// A numeric reply picks that entry; anything else (including an empty
/// line) picks `default_index`. Numeric replies outside the menu are an
/// error rather than being clamped.
pub fn select<T: Clone>(
    prompter: &mut impl Prompter,
    message: &str,
    choices: &[Choice<T>],
    default_index: usize,
) -> PromptResult<T> {
    prompter.say(message.trim());
    for (i, choice) in choices.iter().enumerate() {
        prompter.say(&format!(" {} - {}", i + 1, choice.name));
    }

    let input = prompter.read_line(&format!("Enter value (default {}): ", default_index + 1))?;
    let index = resolve_index(&input, default_index)?;

    choices
        .get(index)
        .map(|choice| choice.value.clone())
        .ok_or(PromptError::InvalidSelection { input })
}

/// Yes/No gate. Yes is entry 1 and the default.
pub fn confirm(prompter: &mut impl Prompter, message: &str) -> PromptResult<bool> {
    let choices = [Choice::new("Yes", true), Choice::new("No", false)];
    select(prompter, message, &choices, 0)
}

/// Ask for a one-time password.
///
/// An empty reply means "no OTP" and is returned as an empty string.
pub fn collect_otp(prompter: &mut impl Prompter, dry_run_label: &str) -> PromptResult<String> {
    let prompt = format!(
        "{dry_run_label} If you have an OTP (One-Time-Password), type it now or press \"Enter\" to continue: "
    );
    let otp = prompter.read_line(prompt.trim_start())?;

    if otp.is_empty() {
        prompter.say("No OTP provided, continuing to next step...");
    } else if otp.chars().count() != OTP_LEN {
        return Err(PromptError::InvalidOtp);
    }
    Ok(otp)
}

/// Map a menu reply to a 0-based index.
fn resolve_index(input: &str, default_index: usize) -> PromptResult<usize> {
    let trimmed = input.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return n
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| PromptError::InvalidSelection {
                input: input.to_owned(),
            });
    }
    if trimmed.parse::<f64>().is_ok_and(f64::is_finite) {
        return Err(PromptError::InvalidSelection {
            input: input.to_owned(),
        });
    }
    Ok(default_index)
}
