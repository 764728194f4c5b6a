//! The injection state machine tying the image steps together.
//!
//! All intermediate artefacts live in temporary directories owned by a
//! [`PipelineSession`], so a failure at any step tears the scratch space
//! down on drop and leaves only the caller's inputs behind. The output
//! image appears at its final path only after the last step has succeeded.

use crate::checksum;
use crate::error::{DebseedError, Result};
use crate::exec::CommandExecutor;
use crate::image::{extract, initrd, mbr, repack};
use crate::report::Reporter;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Where Debian netinst images keep their initrd, relative to the tree
/// root.
pub const INITRD_RELATIVE_PATH: &str = "install.amd/initrd.gz";

/// Name the payload takes inside the initrd; the installer only looks for
/// this one.
const STAGED_PAYLOAD_NAME: &str = "preseed.cfg";

/// Inputs for one injection run.
#[derive(Debug, Clone)]
pub struct InjectRequest {
    /// Source image to modify.
    pub image: Utf8PathBuf,
    /// Payload file to embed in the initrd.
    pub payload: Utf8PathBuf,
    /// Where the modified image is written.
    pub output: Utf8PathBuf,
    /// Volume label for the repacked image.
    pub label: String,
}

/// Scratch space for one pipeline run.
///
/// Holds the temporary directories for the extracted tree, the captured
/// boot sector, and the staged payload. Dropping the session removes all
/// of them.
struct PipelineSession {
    tree: Utf8PathBuf,
    mbr_file: Utf8PathBuf,
    staged_payload: Utf8PathBuf,
    _tree_dir: tempfile::TempDir,
    _mbr_dir: tempfile::TempDir,
    _payload_dir: tempfile::TempDir,
}

impl PipelineSession {
    fn create(payload: &Utf8Path) -> Result<Self> {
        let tree_dir = tempfile::tempdir()?;
        let mbr_dir = tempfile::tempdir()?;
        let payload_dir = tempfile::tempdir()?;

        let tree = utf8_path_of(&tree_dir)?;
        let mbr_file = utf8_path_of(&mbr_dir)?.join("mbr.bin");
        let staged_payload = utf8_path_of(&payload_dir)?.join(STAGED_PAYLOAD_NAME);
        fs::copy(payload, &staged_payload)?;

        Ok(Self {
            tree,
            mbr_file,
            staged_payload,
            _tree_dir: tree_dir,
            _mbr_dir: mbr_dir,
            _payload_dir: payload_dir,
        })
    }
}

fn utf8_path_of(dir: &tempfile::TempDir) -> Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(dir.path().to_path_buf()).map_err(|e| DebseedError::Precondition {
        reason: format!("temporary directory is not valid UTF-8: {e}"),
    })
}

/// Runs the full injection pipeline for `request`.
///
/// Steps, in order: extract the image tree, capture the boot sector,
/// append the staged payload to the embedded initrd, regenerate the
/// internal hash manifest, and repack a hybrid-bootable image at the
/// requested output path.
///
/// # Errors
///
/// Fails eagerly on missing inputs, an occupied output path, or an unsafe
/// volume label, and propagates the first failing step's error. No output
/// image exists after a failure.
pub fn inject(
    executor: &dyn CommandExecutor,
    reporter: &mut dyn Reporter,
    request: &InjectRequest,
) -> Result<()> {
    if !request.image.is_file() {
        return Err(DebseedError::Precondition {
            reason: format!("no such file: '{}'", request.image),
        });
    }
    if !request.payload.is_file() {
        return Err(DebseedError::Precondition {
            reason: format!("no such file: '{}'", request.payload),
        });
    }
    if request.output.exists() {
        return Err(DebseedError::ResourceConflict {
            path: request.output.clone(),
        });
    }
    if !request.output.parent().is_some_and(Utf8Path::is_dir) {
        return Err(DebseedError::Precondition {
            reason: format!("no such directory: '{}'", request.output.parent().unwrap_or(&request.output)),
        });
    }
    repack::validate_volume_label(&request.label)?;

    let session = PipelineSession::create(&request.payload)?;

    reporter.info(&format!("Extracting '{}'...", request.image));
    extract::extract_image(executor, &request.image, &session.tree)?;
    reporter.ok("Extracted image contents.");

    reporter.info("Capturing the boot sector...");
    mbr::capture_mbr(&request.image, &session.mbr_file)?;
    reporter.ok("Captured the boot sector.");

    reporter.info("Appending the payload to the initrd...");
    let initrd_gz = session.tree.join(INITRD_RELATIVE_PATH);
    initrd::append_to_initrd(executor, &initrd_gz, &session.staged_payload)?;
    reporter.ok("Appended the payload.");

    reporter.info("Regenerating the hash manifest...");
    checksum::regenerate_manifest(&session.tree)?;
    reporter.ok("Regenerated the hash manifest.");

    reporter.info(&format!("Repacking into '{}'...", request.output));
    repack::repack_image(
        executor,
        &session.tree,
        &session.mbr_file,
        &request.output,
        &request.label,
    )?;
    reporter.success(&format!("Wrote modified image to '{}'.", request.output));

    Ok(())
}
