//! Boot-sector capture.
//!
//! The repack step needs the boot-loader code from the original image, not
//! from the extracted tree. The block is read once from the source image
//! and is immutable from then on.

use crate::error::{DebseedError, Result};
use camino::Utf8Path;
use std::fs;
use std::io::Read;

/// Length in bytes of the boot-sector prefix preserved across repacking.
pub const MBR_LENGTH: usize = 432;

/// Reads the first [`MBR_LENGTH`] bytes of `image` into a new file at
/// `dest`.
///
/// # Errors
///
/// Returns [`DebseedError::ResourceConflict`] if `dest` already exists,
/// [`DebseedError::Precondition`] if `image` is missing or shorter than
/// the boot sector, or any other I/O error.
pub fn capture_mbr(image: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    if dest.exists() {
        return Err(DebseedError::ResourceConflict {
            path: dest.to_owned(),
        });
    }
    if !image.is_file() {
        return Err(DebseedError::Precondition {
            reason: format!("no such file: '{image}'"),
        });
    }

    let mut block = vec![0u8; MBR_LENGTH];
    fs::File::open(image)?
        .read_exact(&mut block)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                DebseedError::Precondition {
                    reason: format!("'{image}' is shorter than a boot sector"),
                }
            } else {
                DebseedError::Io(e)
            }
        })?;

    fs::write(dest, &block)?;
    Ok(())
}
