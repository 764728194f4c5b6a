//! Hash-manifest handling.
//!
//! Covers the three manifest operations the tool needs: trimming a
//! downloaded `SHA512SUMS` file to the single line naming the image,
//! checking files against a manifest with the external hash tool, and
//! regenerating the `md5sum.txt` manifest embedded in an extracted image
//! tree after its contents change.

use crate::error::{DebseedError, Result};
use crate::exec::{CommandExecutor, CommandRequest};
use crate::perm::WritableGuard;
use crate::report::Reporter;
use camino::{Utf8Path, Utf8PathBuf};
use md5::{Digest, Md5};
use std::fs;
use std::io::{Read, Write};

/// Name of the manifest file at the root of a Debian installer image.
pub const MANIFEST_FILE_NAME: &str = "md5sum.txt";

/// Separator between hash and path in a manifest line: exactly two spaces.
const MANIFEST_SEPARATOR: &str = "  ";

/// Rewrites the manifest in place, keeping only lines containing `target`.
///
/// Returns the number of surviving lines. An empty `target`, or one
/// containing a line break, makes this a no-op returning the current line
/// count; the caller decides whether a surviving count other than one is
/// fatal.
///
/// # Errors
///
/// Returns an I/O error if the manifest cannot be read or rewritten.
pub fn trim_manifest_to_target(manifest_path: &Utf8Path, target: &str) -> Result<usize> {
    let contents = fs::read_to_string(manifest_path)?;

    if target.is_empty() || target.contains('\n') {
        return Ok(contents.lines().count());
    }

    let surviving: Vec<&str> = contents.lines().filter(|line| line.contains(target)).collect();
    let mut rewritten = surviving.join("\n");
    if !rewritten.is_empty() {
        rewritten.push('\n');
    }
    fs::write(manifest_path, rewritten)?;

    Ok(surviving.len())
}

/// Checks the files named in `manifest_path` with the external hash tool.
///
/// Runs `sha512sum --check` with `cwd` as the working directory so the
/// manifest's relative paths resolve. The tool's stdout lines are relayed
/// verbatim through the reporter; stderr lines are relayed on failure.
///
/// # Errors
///
/// Returns [`DebseedError::Integrity`] on any non-zero exit.
pub fn check_against_manifest(
    executor: &dyn CommandExecutor,
    manifest_path: &Utf8Path,
    cwd: &Utf8Path,
    reporter: &mut dyn Reporter,
) -> Result<()> {
    let output = executor.run(
        &CommandRequest::new("sha512sum", ["--check", manifest_path.as_str()]).in_dir(cwd),
    )?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        if !line.is_empty() {
            reporter.info(line);
        }
    }

    if !output.status.success() {
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            if !line.is_empty() {
                reporter.error(line);
            }
        }
        return Err(DebseedError::Integrity {
            reason: format!("hash check failed for '{manifest_path}'"),
        });
    }

    Ok(())
}

/// Recomputes and rewrites the `md5sum.txt` manifest for an extracted tree.
///
/// Every file anywhere under `tree_root` gets one line of the form
/// `<hex-hash>  <path-relative-to-root>`, in deterministic traversal order;
/// symbolic links are skipped, not followed. The manifest file and its
/// parent directory are made writable for the duration of the operation and
/// restored to their original permissions afterwards, success or failure.
///
/// # Errors
///
/// Returns [`DebseedError::Precondition`] if `tree_root` is not a
/// directory or the manifest file is absent, or any I/O error encountered
/// while hashing.
pub fn regenerate_manifest(tree_root: &Utf8Path) -> Result<()> {
    if !tree_root.is_dir() {
        return Err(DebseedError::Precondition {
            reason: format!("no such directory: '{tree_root}'"),
        });
    }

    let manifest_path = tree_root.join(MANIFEST_FILE_NAME);
    if !manifest_path.is_file() {
        return Err(DebseedError::Precondition {
            reason: format!("no manifest to regenerate at '{manifest_path}'"),
        });
    }

    let _guard = WritableGuard::new(&[tree_root, &manifest_path])?;

    // Remove the stale manifest first so it does not list itself.
    fs::remove_file(&manifest_path)?;

    let files = find_files_under(tree_root)?;
    let mut manifest = fs::File::create(&manifest_path)?;
    for file in &files {
        let digest = md5_of_file(file)?;
        let relative = file.strip_prefix(tree_root).unwrap_or(file);
        writeln!(manifest, "{digest}{MANIFEST_SEPARATOR}{relative}")?;
    }
    manifest.flush()?;

    Ok(())
}

/// Recursively finds all regular files under `parent`, in sorted order.
///
/// Symbolic links are skipped entirely: neither listed nor followed.
fn find_files_under(parent: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let mut entries: Vec<Utf8PathBuf> = Vec::new();
    for entry in parent.read_dir_utf8()? {
        entries.push(entry?.path().to_owned());
    }
    entries.sort();

    let mut files = Vec::new();
    for path in entries {
        if path.is_symlink() {
            continue;
        }
        if path.is_file() {
            files.push(path);
        } else if path.is_dir() {
            files.extend(find_files_under(&path)?);
        }
    }
    Ok(files)
}

/// Computes the lowercase hex MD5 digest of a file's contents.
fn md5_of_file(path: &Utf8Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
