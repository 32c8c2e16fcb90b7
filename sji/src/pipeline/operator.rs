//! Operator prompts (manual break, failure replay)

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, warn};

/// Answers yes/no questions during the barrier
///
/// Called from the blocking pool, so implementations may block on stdin.
pub trait Operator: Send + Sync {
    fn confirm(&self, question: &str) -> Result<bool>;

    /// Whether a slow drain may be abandoned through a manual break prompt
    fn offers_break(&self) -> bool {
        true
    }
}

/// Parse a yes/no answer; `None` means ask again
pub fn parse_answer(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Interactive terminal prompt
#[derive(Debug, Default)]
pub struct TerminalOperator;

impl Operator for TerminalOperator {
    fn confirm(&self, question: &str) -> Result<bool> {
        debug!(%question, "TerminalOperator::confirm: called");
        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;
        println!("{} {}", question.bright_yellow().bold(), "(y/n)".dimmed());

        loop {
            match rl.readline(&format!("{} ", ">".bright_green())) {
                Ok(line) => match parse_answer(&line) {
                    Some(answer) => return Ok(answer),
                    None => println!("Please type yes or no and then press enter:"),
                },
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    warn!(%question, "No answer from terminal, treating as no");
                    return Ok(false);
                }
                Err(err) => return Err(eyre::eyre!("Readline error: {}", err)),
            }
        }
    }
}

/// Non-interactive operator that always gives the same answer
///
/// Never offered the manual break: an unattended run always waits for its
/// in-flight requests.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Operator for FixedAnswer {
    fn confirm(&self, question: &str) -> Result<bool> {
        let answer = if self.0 { "yes" } else { "no" };
        println!("{} {}", question.bright_yellow().bold(), answer.dimmed());
        Ok(self.0)
    }

    fn offers_break(&self) -> bool {
        false
    }
}
