//! ui::prompts
//!
//! Interactive prompts.
//!
//! # Design
//!
//! Prompts are only shown in interactive mode. In non-interactive mode,
//! anything requiring user input fails with [`PromptError::NotInteractive`].
//! An empty answer or end of input counts as the user declining.

use std::io::{self, BufRead, Write};

use thiserror::Error;

/// Errors from prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt cancelled by user")]
    Cancelled,

    #[error("not in interactive mode")]
    NotInteractive,

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<io::Error> for PromptError {
    fn from(err: io::Error) -> Self {
        PromptError::IoError(err.to_string())
    }
}

/// Prompt for text input on stderr, reading a line from stdin.
///
/// Returns `Ok(None)` when the user enters nothing or closes stdin.
pub fn input(message: &str, interactive: bool) -> Result<Option<String>, PromptError> {
    if !interactive {
        return Err(PromptError::NotInteractive);
    }

    let mut stderr = io::stderr();
    write!(stderr, "{}: ", message)?;
    stderr.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(non_empty(line))
}

/// Prompt for masked input (passwords). The input is not echoed.
///
/// Returns `Ok(None)` when the user enters nothing.
pub fn password(message: &str, interactive: bool) -> Result<Option<String>, PromptError> {
    if !interactive {
        return Err(PromptError::NotInteractive);
    }

    let value = rpassword::prompt_password(format!("{}: ", message))?;
    Ok(non_empty(value))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim_end_matches(['\r', '\n']);
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
