//! Shared test utilities for stubbing external commands.

use crate::error::{DebseedError, Result};
use crate::exec::{CommandExecutor, CommandRequest};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a command `Output` with the given exit code, stdout, and stderr.
#[must_use]
pub fn output_with(code: i32, stdout: &str, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    output_with(0, "", "")
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    output_with(1, "", stderr)
}

/// Represents an expected command invocation for testing.
pub struct ExpectedCall {
    /// The program expected to be invoked (e.g. `gpg`).
    pub program: &'static str,
    /// The arguments expected to be passed.
    pub args: Vec<String>,
    /// The result to return when this invocation arrives.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Creates an expectation returning the given output.
    #[must_use]
    pub fn returning<S: Into<String>>(
        program: &'static str,
        args: impl IntoIterator<Item = S>,
        output: Output,
    ) -> Self {
        Self {
            program,
            args: args.into_iter().map(Into::into).collect(),
            result: Ok(output),
        }
    }
}

/// A stub implementation of `CommandExecutor`.
///
/// Consumes expected invocations in order and returns the predefined
/// results. A mismatched or surplus invocation yields
/// [`DebseedError::StubMismatch`] rather than panicking, so a failing
/// classification path surfaces as an error the code under test must
/// propagate.
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    seen: RefCell<Vec<CommandRequest>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            seen: RefCell::new(Vec::new()),
        }
    }

    /// Returns every request this stub has received, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandRequest> {
        self.seen.borrow().clone()
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, request: &CommandRequest) -> Result<Output> {
        self.seen.borrow_mut().push(request.clone());

        let Some(call) = self.expected.borrow_mut().pop_front() else {
            return Err(DebseedError::StubMismatch {
                message: format!("unexpected invocation of {}", request.program),
            });
        };

        if call.program != request.program || call.args != request.args {
            return Err(DebseedError::StubMismatch {
                message: format!(
                    "expected {} {:?}, got {} {:?}",
                    call.program, call.args, request.program, request.args
                ),
            });
        }

        call.result
    }
}
