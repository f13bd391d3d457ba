use regex::{Regex, RegexBuilder};

use herald_types::{HeraldError, Result};

// Horizontal whitespace only: a command never spans lines. `\r` is accepted so
// CRLF bodies behave like LF bodies under multi-line `$`.
const LEADING: &str = r"^[ \t]*";
const TRAILING: &str = r"[ \t\r]*$";

// ---------------------------------------------------------------------------
// CommandMatcher
// ---------------------------------------------------------------------------

/// Recognizes one slash-command form anywhere in a multi-line body.
#[derive(Debug, Clone)]
pub struct CommandMatcher {
    command: String,
    argument: Option<String>,
    re: Regex,
}

impl CommandMatcher {
    /// Matches `/<command>` with nothing else on the line.
    pub fn bare(command: &str) -> Result<Self> {
        let pattern = format!("{LEADING}/{}{TRAILING}", regex::escape(command));
        Self::build(command, None, &pattern)
    }

    /// Matches `/<command> <argument>` with nothing else on the line.
    pub fn with_argument(command: &str, argument: &str) -> Result<Self> {
        let pattern = format!(
            r"{LEADING}/{}[ \t]+{}{TRAILING}",
            regex::escape(command),
            regex::escape(argument)
        );
        Self::build(command, Some(argument), &pattern)
    }

    fn build(command: &str, argument: Option<&str>, pattern: &str) -> Result<Self> {
        if command.is_empty() || command.chars().any(char::is_whitespace) {
            return Err(HeraldError::InvalidCommand {
                command: command.to_string(),
                message: "command names must be non-empty and contain no whitespace".into(),
            });
        }
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .multi_line(true)
            .build()
            .map_err(|e| HeraldError::InvalidCommand {
                command: command.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            command: command.to_string(),
            argument: argument.map(String::from),
            re,
        })
    }

    pub fn is_match(&self, body: &str) -> bool {
        self.re.is_match(body)
    }

    /// Usage string as a user would type it, e.g. `/hold cancel`.
    pub fn usage(&self) -> String {
        match self.argument {
            Some(ref arg) => format!("/{} {}", self.command, arg),
            None => format!("/{}", self.command),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandPair
// ---------------------------------------------------------------------------

/// What a body asks a [`CommandPair`] to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Set,
    Cancel,
    None,
}

#[derive(Debug, Clone)]
pub struct CommandPair {
    set: CommandMatcher,
    cancel: CommandMatcher,
}

impl CommandPair {
    /// Pairs `/<command>` with `/<command> <cancel_word>`.
    pub fn with_cancel(command: &str, cancel_word: &str) -> Result<Self> {
        Ok(Self {
            set: CommandMatcher::bare(command)?,
            cancel: CommandMatcher::with_argument(command, cancel_word)?,
        })
    }

    /// Resolve a body to a directive. When both forms appear on separate
    /// lines the set form is reported.
    pub fn resolve(&self, body: &str) -> Directive {
        if self.set.is_match(body) {
            Directive::Set
        } else if self.cancel.is_match(body) {
            Directive::Cancel
        } else {
            Directive::None
        }
    }

    pub fn set(&self) -> &CommandMatcher {
        &self.set
    }

    pub fn cancel(&self) -> &CommandMatcher {
        &self.cancel
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
