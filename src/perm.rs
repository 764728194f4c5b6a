//! Temporary write-permission handling for read-only image contents.
//!
//! Files inside an extracted installer image are read-only, as is the
//! manifest at its root. Steps that must rewrite them take a
//! [`WritableGuard`] over the affected paths; the guard restores the
//! original permissions when dropped, on every exit path.

use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Grants write permission to a set of paths for the guard's lifetime.
///
/// Dropping the guard restores each path's original permissions in reverse
/// acquisition order. Restoration is best-effort: a path deleted while the
/// guard was held is skipped silently.
pub struct WritableGuard {
    entries: Vec<(Utf8PathBuf, fs::Permissions)>,
}

impl WritableGuard {
    /// Makes every path in `paths` writable, remembering original
    /// permissions.
    ///
    /// If any path fails partway, the permissions already changed are
    /// restored before the error returns.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a path's metadata cannot be read or its
    /// permissions cannot be changed.
    pub fn new(paths: &[&Utf8Path]) -> Result<Self> {
        let mut guard = Self {
            entries: Vec::with_capacity(paths.len()),
        };
        for path in paths {
            let metadata = fs::metadata(path)?;
            let original = metadata.permissions();
            fs::set_permissions(path, writable_permissions(&metadata))?;
            guard.entries.push(((*path).to_owned(), original));
        }
        Ok(guard)
    }
}

impl Drop for WritableGuard {
    fn drop(&mut self) {
        while let Some((path, original)) = self.entries.pop() {
            let _ = fs::set_permissions(&path, original);
        }
    }
}

#[cfg(unix)]
fn writable_permissions(metadata: &fs::Metadata) -> fs::Permissions {
    use std::os::unix::fs::PermissionsExt;

    let mode = if metadata.is_dir() { 0o755 } else { 0o644 };
    fs::Permissions::from_mode(mode)
}

#[cfg(not(unix))]
fn writable_permissions(metadata: &fs::Metadata) -> fs::Permissions {
    let mut permissions = metadata.permissions();
    permissions.set_readonly(false);
    permissions
}
