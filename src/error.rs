//! Error types for the debseed acquisition and injection flows.
//!
//! The taxonomy mirrors the failure classes the tool distinguishes at its
//! boundaries: invalid state detected before any side effect, helper
//! processes exiting abnormally, helper output that matches no known shape,
//! integrity failures, and output targets that already exist. A helper whose
//! output cannot be classified must never be interpreted as success.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while acquiring or modifying an installer image.
#[derive(Debug, Error)]
pub enum DebseedError {
    /// Invalid paths or state detected before any side effect occurred.
    #[error("precondition failed: {reason}")]
    Precondition {
        /// Description of the violated precondition.
        reason: String,
    },

    /// The target output path already exists and would be overwritten.
    #[error("refusing to overwrite existing file: {path}")]
    ResourceConflict {
        /// The path that already exists.
        path: Utf8PathBuf,
    },

    /// A helper process exited with a non-zero or unexpected status.
    #[error("{tool} failed: {message}")]
    ExternalTool {
        /// Name of the helper program.
        tool: &'static str,
        /// Description of the failure, usually the trimmed stderr.
        message: String,
    },

    /// A helper process did not complete within the invocation timeout.
    #[error("{tool} timed out after {seconds} seconds")]
    ToolTimeout {
        /// Name of the helper program.
        tool: &'static str,
        /// The timeout that elapsed.
        seconds: u64,
    },

    /// A helper's output does not match any known shape.
    ///
    /// This is deliberately distinct from [`DebseedError::ExternalTool`]: the
    /// process may well have exited zero, but output we cannot classify must
    /// never be treated as success.
    #[error("unexpected output from {tool}:\n{output}")]
    ProtocolMismatch {
        /// Name of the helper program.
        tool: &'static str,
        /// The raw output that failed classification.
        output: String,
    },

    /// A manifest, signature, or hash check failed.
    #[error("integrity check failed: {reason}")]
    Integrity {
        /// Description of the mismatch.
        reason: String,
    },

    /// The requested volume label contains a character outside the allow-list.
    #[error("invalid character in volume label: '{offending}'")]
    InvalidLabel {
        /// The first character that failed validation.
        offending: char,
    },

    /// An HTTP download failed.
    #[error("download failed for {url}: {reason}")]
    Download {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// A required helper program is not installed or not in `$PATH`.
    #[error("program not installed or not in $PATH: '{tool}'")]
    MissingTool {
        /// Name of the missing program.
        tool: &'static str,
    },

    /// The user declined to continue at an interactive prompt.
    #[error("aborted: {reason}")]
    Aborted {
        /// Description of what was not done.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

/// Result type alias using [`DebseedError`].
pub type Result<T> = std::result::Result<T, DebseedError>;
