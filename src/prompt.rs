//! Interactive prompts: how many accounts to use, and restart-or-exit after
//! an interrupt.
//!
//! Functions take explicit reader/writer handles so they can be driven from
//! tests; `main` passes locked stdin/stdout.

use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Failed to read input: {0}")]
    Io(#[from] io::Error),
    #[error("Input closed before an answer was given")]
    Closed,
    #[error("Invalid number of accounts: {0:?} is not a number")]
    NotANumber(String),
    #[error("Invalid number of accounts. Please enter a number between 1 and {max}.")]
    OutOfRange { value: usize, max: usize },
}

/// Checks a pool count against the configured maximum.
pub fn validate_pool_count(value: usize, max: usize) -> Result<usize, PromptError> {
    if (1..=max).contains(&value) {
        Ok(value)
    } else {
        Err(PromptError::OutOfRange { value, max })
    }
}

/// Parses one line of user input as a pool count in `1..=max`.
pub fn parse_pool_count(input: &str, max: usize) -> Result<usize, PromptError> {
    let trimmed = input.trim();
    let value: usize = trimmed
        .parse()
        .map_err(|_| PromptError::NotANumber(trimmed.to_string()))?;
    validate_pool_count(value, max)
}

/// Asks how many accounts to use and reads one answer.
pub fn ask_pool_count<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    max: usize,
) -> Result<usize, PromptError> {
    write!(output, "How many accounts have you created (1-{max})? ")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(PromptError::Closed);
    }
    parse_pool_count(&line, max)
}

/// Blocks until the user presses Enter. Returns `false` if input is closed.
pub fn wait_for_enter<R: BufRead>(mut input: R) -> io::Result<bool> {
    let mut line = String::new();
    Ok(input.read_line(&mut line)? > 0)
}
