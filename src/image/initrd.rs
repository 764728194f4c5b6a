//! Payload append on the embedded initrd archive.
//!
//! The initrd inside an extracted installer tree is a gzip-compressed cpio
//! archive, read-only like the rest of the tree. Appending the payload
//! means: grant write permission, decompress in place, append one entry in
//! the newer portable (`newc`) format, recompress, and restore the
//! original permissions. Any failure in the sub-sequence aborts the whole
//! pipeline; there is no partial-append recovery.

use crate::error::{DebseedError, Result};
use crate::exec::{CommandExecutor, CommandRequest};
use crate::perm::WritableGuard;
use camino::Utf8Path;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs;

/// Expected file name of the embedded archive.
const INITRD_FILE_NAME: &str = "initrd.gz";

/// Appends the contents of `payload` to the gzipped cpio archive at
/// `initrd_gz`.
///
/// The archive entry is named after the payload's base filename; `cpio`
/// resolves that name against the payload's parent directory, which is why
/// it runs there with the name piped on stdin.
///
/// # Errors
///
/// Returns [`DebseedError::Precondition`] if either file is missing or the
/// archive is not named `initrd.gz`, [`DebseedError::ExternalTool`] if the
/// append tool fails, or I/O errors from the decompress/recompress steps.
pub fn append_to_initrd(
    executor: &dyn CommandExecutor,
    initrd_gz: &Utf8Path,
    payload: &Utf8Path,
) -> Result<()> {
    if !initrd_gz.is_file() {
        return Err(DebseedError::Precondition {
            reason: format!("no such file: '{initrd_gz}'"),
        });
    }
    if initrd_gz.file_name() != Some(INITRD_FILE_NAME) {
        return Err(DebseedError::Precondition {
            reason: format!("does not seem to be an initrd.gz archive: '{initrd_gz}'"),
        });
    }
    if !payload.is_file() {
        return Err(DebseedError::Precondition {
            reason: format!("no such file: '{payload}'"),
        });
    }
    let (Some(archive_dir), Some(payload_dir), Some(payload_name)) =
        (initrd_gz.parent(), payload.parent(), payload.file_name())
    else {
        return Err(DebseedError::Precondition {
            reason: format!("cannot resolve parent directories for '{initrd_gz}'"),
        });
    };

    let _guard = WritableGuard::new(&[archive_dir, initrd_gz])?;

    // "initrd.gz" -> "initrd"
    let decompressed = initrd_gz.with_extension("");

    gunzip_in_place(initrd_gz, &decompressed)?;

    let output = executor.run(
        &CommandRequest::new(
            "cpio",
            ["-H", "newc", "-o", "-A", "-F", decompressed.as_str()],
        )
        .in_dir(payload_dir)
        .with_stdin(payload_name.as_bytes().to_vec()),
    )?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DebseedError::ExternalTool {
            tool: "cpio",
            message: format!(
                "failed while appending '{payload_name}' to '{decompressed}': {}",
                stderr.trim()
            ),
        });
    }

    gzip_in_place(&decompressed, initrd_gz)?;

    Ok(())
}

/// Decompresses `source` to `dest` and removes `source`.
fn gunzip_in_place(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    let mut decoder = GzDecoder::new(fs::File::open(source)?);
    let mut raw = fs::File::create(dest)?;
    std::io::copy(&mut decoder, &mut raw)?;
    fs::remove_file(source)?;
    Ok(())
}

/// Compresses `source` to `dest` and removes `source`.
fn gzip_in_place(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    let mut raw = fs::File::open(source)?;
    let mut encoder = GzEncoder::new(fs::File::create(dest)?, Compression::default());
    std::io::copy(&mut raw, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(source)?;
    Ok(())
}
