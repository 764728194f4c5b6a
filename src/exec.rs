//! External command invocation.
//!
//! Every helper process the tool drives (`gpg`, `xorriso`, `cpio`,
//! `sha512sum`) is invoked through the [`CommandExecutor`] trait so that
//! protocol-classification logic can be tested against canned outputs
//! without spawning anything. The production implementation applies a
//! per-invocation timeout; none of the helpers are expected to run longer
//! than the repack step on a full installer image.

use crate::error::{DebseedError, Result};
use camino::Utf8Path;
use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default timeout for a single helper invocation (10 minutes).
const TOOL_TIMEOUT: Duration = Duration::from_secs(600);

/// A single command invocation: program, arguments, and optional working
/// directory and piped stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// The program to execute (e.g. `gpg`).
    pub program: &'static str,
    /// The arguments to pass to the program.
    pub args: Vec<String>,
    /// Working directory for the child process, if it matters.
    pub working_dir: Option<camino::Utf8PathBuf>,
    /// Bytes piped to the child's stdin, if any.
    pub stdin: Option<Vec<u8>>,
}

impl CommandRequest {
    /// Creates a request with no working directory and no stdin.
    #[must_use]
    pub fn new<S: Into<String>>(program: &'static str, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            program,
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            stdin: None,
        }
    }

    /// Sets the working directory for the child process.
    #[must_use]
    pub fn in_dir(mut self, dir: &Utf8Path) -> Self {
        self.working_dir = Some(dir.to_owned());
        self
    }

    /// Sets the bytes piped to the child's stdin.
    #[must_use]
    pub fn with_stdin(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(bytes.into());
        self
    }
}

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the
    /// command, or [`DebseedError::ToolTimeout`] if it does not complete
    /// within the invocation timeout.
    fn run(&self, request: &CommandRequest) -> Result<Output>;
}

/// Executes commands on the host system with a per-invocation timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, request: &CommandRequest) -> Result<Output> {
        log::trace!("running {} {:?}", request.program, request.args);

        let mut cmd = Command::new(request.program);
        cmd.args(&request.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.stdin(if request.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir.as_std_path());
        }

        let mut child = cmd.spawn()?;

        if let Some(bytes) = &request.stdin {
            if let Some(mut handle) = child.stdin.take() {
                handle.write_all(bytes)?;
                // Dropping the handle closes the pipe so the child sees EOF.
            }
        }

        match child.wait_timeout(TOOL_TIMEOUT)? {
            Some(status) => {
                let stdout = child
                    .stdout
                    .take()
                    .map(std::io::read_to_string)
                    .transpose()?
                    .unwrap_or_default();
                let stderr = child
                    .stderr
                    .take()
                    .map(std::io::read_to_string)
                    .transpose()?
                    .unwrap_or_default();

                Ok(Output {
                    status,
                    stdout: stdout.into_bytes(),
                    stderr: stderr.into_bytes(),
                })
            }
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(DebseedError::ToolTimeout {
                    tool: request.program,
                    seconds: TOOL_TIMEOUT.as_secs(),
                })
            }
        }
    }
}

/// Returns the combined textual output of a completed command, stdout first.
///
/// The gpg contract is specified over a merged stream, matching an
/// invocation with stderr redirected into stdout; gpg emits its status
/// lines on stderr, so in practice the merged text is the stderr text.
#[must_use]
pub fn merged_output_text(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_working_dir_and_stdin() {
        let request = CommandRequest::new("cpio", ["-o"])
            .in_dir(Utf8Path::new("/tmp/payload"))
            .with_stdin(b"preseed.cfg".to_vec());

        assert_eq!(request.program, "cpio");
        assert_eq!(request.args, vec!["-o".to_owned()]);
        assert_eq!(
            request.working_dir.as_deref(),
            Some(Utf8Path::new("/tmp/payload"))
        );
        assert_eq!(request.stdin.as_deref(), Some(b"preseed.cfg".as_slice()));
    }

    #[test]
    fn merged_output_puts_stdout_before_stderr() {
        let output = crate::test_utils::output_with(0, "out\n", "err\n");
        assert_eq!(merged_output_text(&output), "out\nerr\n");
    }

    #[test]
    fn system_executor_captures_output() {
        let executor = SystemCommandExecutor;
        let output = executor
            .run(&CommandRequest::new("sh", ["-c", "echo hello"]))
            .expect("sh should be available");
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[test]
    fn system_executor_pipes_stdin() {
        let executor = SystemCommandExecutor;
        let output = executor
            .run(&CommandRequest::new("cat", Vec::<String>::new()).with_stdin(b"ping".to_vec()))
            .expect("cat should be available");
        assert_eq!(String::from_utf8_lossy(&output.stdout), "ping");
    }
}
