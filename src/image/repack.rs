//! Volume-label validation and hybrid-boot repacking.

use crate::error::{DebseedError, Result};
use crate::exec::{CommandExecutor, CommandRequest};
use camino::Utf8Path;

/// Relative path of the BIOS boot loader inside the extracted tree.
const BIOS_BOOT_IMAGE: &str = "isolinux/isolinux.bin";

/// Relative path of the El Torito boot catalogue inside the extracted tree.
const BOOT_CATALOGUE: &str = "isolinux/boot.cat";

/// Relative path of the EFI boot image inside the extracted tree.
const EFI_BOOT_IMAGE: &str = "boot/grub/efi.img";

/// Checks that `label` only contains characters safe to pass as a volume
/// identifier.
///
/// Alphanumerics, spaces, dots, underscores, and hyphens are allowed;
/// anything else is rejected before it can reach a shell-adjacent tool.
///
/// # Errors
///
/// Returns [`DebseedError::InvalidLabel`] naming the first offending
/// character.
pub fn validate_volume_label(label: &str) -> Result<()> {
    if let Some(offending) = label
        .chars()
        .find(|c| !c.is_alphanumeric() && !matches!(c, ' ' | '.' | '_' | '-'))
    {
        return Err(DebseedError::InvalidLabel { offending });
    }
    Ok(())
}

/// Builds a hybrid-bootable image at `output` from the extracted `tree`.
///
/// The boot-sector bytes captured from the original image are grafted back
/// via `mbr`, and the BIOS and EFI boot entries are wired up so the result
/// boots from both optical media and USB sticks.
///
/// # Errors
///
/// Returns [`DebseedError::ResourceConflict`] if `output` already exists,
/// [`DebseedError::Precondition`] if `mbr` or `tree` is missing,
/// [`DebseedError::InvalidLabel`] for an unsafe label, and
/// [`DebseedError::ExternalTool`] if the packing tool fails.
pub fn repack_image(
    executor: &dyn CommandExecutor,
    tree: &Utf8Path,
    mbr: &Utf8Path,
    output: &Utf8Path,
    label: &str,
) -> Result<()> {
    if output.exists() {
        return Err(DebseedError::ResourceConflict {
            path: output.to_owned(),
        });
    }
    if !mbr.is_file() {
        return Err(DebseedError::Precondition {
            reason: format!("no such file: '{mbr}'"),
        });
    }
    if !tree.is_dir() {
        return Err(DebseedError::Precondition {
            reason: format!("no such directory: '{tree}'"),
        });
    }
    validate_volume_label(label)?;

    let output_result = executor.run(&CommandRequest::new(
        "xorriso",
        [
            "-as",
            "mkisofs",
            "-r",
            "-V",
            label,
            "-o",
            output.as_str(),
            "-J",
            "-J",
            "-joliet-long",
            "-cache-inodes",
            "-isohybrid-mbr",
            mbr.as_str(),
            "-b",
            BIOS_BOOT_IMAGE,
            "-c",
            BOOT_CATALOGUE,
            "-boot-load-size",
            "4",
            "-boot-info-table",
            "-no-emul-boot",
            "-eltorito-alt-boot",
            "-e",
            EFI_BOOT_IMAGE,
            "-no-emul-boot",
            "-isohybrid-gpt-basdat",
            "-isohybrid-apm-hfsplus",
            tree.as_str(),
        ],
    ))?;

    if !output_result.status.success() {
        let stderr = String::from_utf8_lossy(&output_result.stderr);
        return Err(DebseedError::ExternalTool {
            tool: "xorriso",
            message: format!("repacking into '{output}' failed: {}", stderr.trim()),
        });
    }

    Ok(())
}
