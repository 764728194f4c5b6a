//! Interactive yes/no confirmation.

use crate::error::Result;
use std::io::{BufRead, Write};

/// A parsed response to a yes/no question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// An affirmative response.
    Yes,
    /// A negative response.
    No,
    /// Anything that is neither; the caller decides whether to re-ask.
    Unclear,
}

/// Asks the user yes/no questions.
pub trait Confirmer {
    /// Poses `question` and returns the parsed response.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the prompt cannot be written or the
    /// response cannot be read.
    fn confirm(&mut self, question: &str) -> Result<Answer>;
}

/// Confirmer reading responses from standard input.
///
/// The question goes to standard error so that piped standard output stays
/// clean.
#[derive(Debug, Default)]
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&mut self, question: &str) -> Result<Answer> {
        let mut stderr = std::io::stderr().lock();
        write!(stderr, "{question} [y/n] ")?;
        stderr.flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(parse_answer(&line))
    }
}

/// Interprets a raw response line.
///
/// `y`/`yes` and `n`/`no` are recognised case-insensitively; everything
/// else is [`Answer::Unclear`].
pub fn parse_answer(line: &str) -> Answer {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Answer::Yes,
        "n" | "no" => Answer::No,
        _ => Answer::Unclear,
    }
}
