//! Whole-image extraction via xorriso.

use crate::error::{DebseedError, Result};
use crate::exec::{CommandExecutor, CommandRequest};
use camino::Utf8Path;

/// Extracts the entire contents of `image` into `dest_dir`.
///
/// # Errors
///
/// Returns [`DebseedError::Precondition`] if `image` is not a file or
/// `dest_dir` is not a directory, and [`DebseedError::ExternalTool`] if
/// the extraction tool fails.
pub fn extract_image(
    executor: &dyn CommandExecutor,
    image: &Utf8Path,
    dest_dir: &Utf8Path,
) -> Result<()> {
    if !image.is_file() {
        return Err(DebseedError::Precondition {
            reason: format!("no such file: '{image}'"),
        });
    }
    if !dest_dir.is_dir() {
        return Err(DebseedError::Precondition {
            reason: format!("no such directory: '{dest_dir}'"),
        });
    }

    let output = executor.run(&CommandRequest::new(
        "xorriso",
        [
            "-osirrox",
            "on",
            "-indev",
            image.as_str(),
            "-extract",
            "/",
            dest_dir.as_str(),
        ],
    ))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DebseedError::ExternalTool {
            tool: "xorriso",
            message: format!("extraction of '{image}' failed: {}", stderr.trim()),
        });
    }

    Ok(())
}
