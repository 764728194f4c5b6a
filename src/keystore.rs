//! Local trust-store lookup and key import.
//!
//! Both operations drive gpg and hold its output to a fixed shape. The
//! lookup command exits zero whether or not the key is present, so presence
//! is decided entirely from the output; output matching neither the
//! present-key shape nor the absent-key shape is a protocol mismatch, never
//! "absent". Import succeeds only when the first output line is the exact
//! confirmation sentence, regardless of the exit code.

use crate::error::{DebseedError, Result};
use crate::exec::{CommandExecutor, CommandRequest, merged_output_text};

/// Key id of the Debian CD signing key.
pub const DEBIAN_CD_SIGNING_KEY_ID: &str = "DA87E80D6294BE9B";
/// Keyserver hosting the Debian signing keys.
pub const DEBIAN_KEYSERVER: &str = "keyring.debian.org";
/// The uid gpg prints for the Debian CD signing key.
pub const DEBIAN_CD_SIGNING_KEY_NAME: &str =
    "Debian CD signing key <debian-cd@lists.debian.org>";

/// Checks whether `key_id` exists in the invoking user's local key store.
///
/// # Errors
///
/// Returns [`DebseedError::ExternalTool`] if the lookup command fails, or
/// [`DebseedError::ProtocolMismatch`] if its output matches neither the
/// present-key nor the absent-key shape.
pub fn is_key_present(executor: &dyn CommandExecutor, key_id: &str) -> Result<bool> {
    let output = executor.run(&CommandRequest::new("gpg", ["--locate-keys", key_id]))?;

    if !output.status.success() {
        return Err(DebseedError::ExternalTool {
            tool: "gpg",
            message: "failed to search local keys".to_owned(),
        });
    }

    let text = merged_output_text(&output);
    if text.is_empty() {
        return Ok(false);
    }

    if present_key_shape_matches(&text) {
        Ok(true)
    } else {
        Err(DebseedError::ProtocolMismatch {
            tool: "gpg",
            output: text,
        })
    }
}

/// Imports `key_id` from `keyserver` into the local trust store.
///
/// Importing is idempotent: a key that is already present yields gpg's
/// "not changed" confirmation, which is accepted the same as a fresh
/// import.
///
/// # Errors
///
/// Returns [`DebseedError::ExternalTool`] on a non-zero exit, or
/// [`DebseedError::ProtocolMismatch`] if the first output line is not the
/// expected confirmation sentence, even when the exit code was zero.
pub fn import_key(executor: &dyn CommandExecutor, key_id: &str, keyserver: &str) -> Result<()> {
    let output = executor.run(&CommandRequest::new(
        "gpg",
        ["--keyserver", keyserver, "--recv-key", key_id],
    ))?;

    let text = merged_output_text(&output);
    if !output.status.success() {
        return Err(DebseedError::ExternalTool {
            tool: "gpg",
            message: if text.is_empty() {
                "failed to import key".to_owned()
            } else {
                text.trim().to_owned()
            },
        });
    }

    let imported =
        format!("gpg: key {key_id}: public key \"{DEBIAN_CD_SIGNING_KEY_NAME}\" imported");
    let unchanged = format!("gpg: key {key_id}: \"{DEBIAN_CD_SIGNING_KEY_NAME}\" not changed");

    let first_line = text.split('\n').next().unwrap_or_default();
    if first_line == imported || first_line == unchanged {
        Ok(())
    } else {
        Err(DebseedError::ProtocolMismatch {
            tool: "gpg",
            output: text,
        })
    }
}

/// A present key produces exactly six lines: `pub …`, the 40-hex
/// fingerprint (leading spaces allowed), `uid …`, `sub …`, and two blanks.
fn present_key_shape_matches(text: &str) -> bool {
    let lines: Vec<&str> = text.split('\n').collect();
    let [pub_line, fingerprint, uid_line, sub_line, blank_a, blank_b] = lines.as_slice() else {
        return false;
    };

    pub_line.starts_with("pub ")
        && is_fingerprint_line(fingerprint)
        && uid_line.starts_with("uid ")
        && sub_line.starts_with("sub ")
        && blank_a.is_empty()
        && blank_b.is_empty()
}

fn is_fingerprint_line(line: &str) -> bool {
    let token = line.trim_start_matches(' ');
    token.len() == 40
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase() && c.is_ascii_hexdigit())
}
