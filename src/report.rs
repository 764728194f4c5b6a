//! Progress and status reporting.
//!
//! Components receive an explicit [`Reporter`] instead of printing through
//! process-wide state, so tests can capture output without ordering
//! dependencies between component lifetimes.

use std::io::Write;

/// Destination for user-facing status messages.
pub trait Reporter {
    /// Reports a neutral progress message.
    fn info(&mut self, message: &str);
    /// Reports the successful completion of an intermediate step.
    fn ok(&mut self, message: &str);
    /// Reports a non-fatal anomaly.
    fn warn(&mut self, message: &str);
    /// Reports a failure detail; the error itself still propagates.
    fn error(&mut self, message: &str);
    /// Reports the successful completion of a whole operation.
    fn success(&mut self, message: &str);
}

/// Writes prefixed messages to any [`Write`] sink, typically stderr.
pub struct WriteReporter<'a> {
    sink: &'a mut dyn Write,
    quiet: bool,
}

impl<'a> WriteReporter<'a> {
    /// Creates a reporter writing to `sink`.
    ///
    /// When `quiet` is set, only `warn` and `error` messages are emitted.
    pub fn new(sink: &'a mut dyn Write, quiet: bool) -> Self {
        Self { sink, quiet }
    }

    fn line(&mut self, prefix: &str, message: &str) {
        // Best-effort reporting; a broken pipe must not fail the operation.
        let _ = writeln!(self.sink, "[{prefix:^7}] {message}");
    }
}

impl Reporter for WriteReporter<'_> {
    fn info(&mut self, message: &str) {
        if !self.quiet {
            self.line("INFO", message);
        }
    }

    fn ok(&mut self, message: &str) {
        if !self.quiet {
            self.line("OK", message);
        }
    }

    fn warn(&mut self, message: &str) {
        self.line("WARNING", message);
    }

    fn error(&mut self, message: &str) {
        self.line("ERROR", message);
    }

    fn success(&mut self, message: &str) {
        if !self.quiet {
            self.line("SUCCESS", message);
        }
    }
}

/// Discards all messages. Useful for callers that only care about results.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn info(&mut self, _message: &str) {}
    fn ok(&mut self, _message: &str) {}
    fn warn(&mut self, _message: &str) {}
    fn error(&mut self, _message: &str) {}
    fn success(&mut self, _message: &str) {}
}
