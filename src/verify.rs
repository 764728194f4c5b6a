//! Detached-signature verification.
//!
//! Runs `gpg --verify` once and classifies the result from the pair of
//! (exit code, specific output line). Classification never trusts the exit
//! code alone and never fuzzy-matches the full text: a misread here can turn
//! a bad signature into a false "verified" result. The classification itself
//! is a pure function over the captured output so it can be tested without
//! invoking gpg.

use crate::error::{DebseedError, Result};
use crate::exec::{CommandExecutor, CommandRequest, merged_output_text};
use camino::Utf8Path;

/// Line 3 (0-indexed 2) of a successful verification.
const GOOD_SIGNATURE_PREFIX: &str = "gpg: Good signature from ";
/// Line 3 of a failed verification, exit code 1.
const BAD_SIGNATURE_PREFIX: &str = "gpg: BAD signature from ";
/// Line 3 when the signing key is absent from the local store, exit code 2.
const MISSING_KEY_LINE: &str = "gpg: Can't check signature: No public key";
/// Line 0 when the signature file is not OpenPGP data at all, exit code 2.
const MALFORMED_DATA_LINE: &str = "gpg: no valid OpenPGP data found.";

/// Classified outcome of a detached-signature verification.
///
/// Only [`VerificationOutcome::Valid`] may cause downstream trust
/// decisions. `Unclassified` is fatal for callers: it must be treated as
/// neither success nor failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The signature verified against a key in the local trust store.
    Valid {
        /// The signer identity as printed by gpg, quotes and trust
        /// annotations included.
        signer: String,
    },
    /// The signature does not match the data.
    BadSignature,
    /// The signing key is not present in the local trust store.
    MissingKey {
        /// The 16-character key id, when the output named the key.
        key_id: Option<String>,
        /// The 40-character key fingerprint, when the output named it.
        fingerprint: Option<String>,
    },
    /// The signature file does not contain OpenPGP data.
    MalformedSignature,
    /// The (exit code, output) pair matched no known shape.
    Unclassified {
        /// The process exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// The raw merged output.
        output: String,
    },
}

/// Classifies a gpg verification run from its exit code and merged output.
///
/// This is a pure function of its inputs; see the module docs for the
/// (exit code, line) table it implements.
#[must_use]
pub fn classify(exit_code: Option<i32>, output: &str) -> VerificationOutcome {
    let lines: Vec<&str> = output.split('\n').collect();
    let line_0 = lines.first().copied().unwrap_or_default();
    let line_2 = lines.get(2).copied().unwrap_or_default();

    match exit_code {
        Some(0) => {
            if let Some(signer) = line_2.strip_prefix(GOOD_SIGNATURE_PREFIX) {
                return VerificationOutcome::Valid {
                    signer: signer.to_owned(),
                };
            }
        }
        Some(1) => {
            if line_2.starts_with(BAD_SIGNATURE_PREFIX) {
                return VerificationOutcome::BadSignature;
            }
        }
        Some(2) => {
            if line_2 == MISSING_KEY_LINE {
                let fingerprint = signing_key_fingerprint(&lines);
                let key_id = fingerprint.as_deref().map(key_id_of);
                return VerificationOutcome::MissingKey {
                    key_id,
                    fingerprint,
                };
            }
            if line_0 == MALFORMED_DATA_LINE {
                return VerificationOutcome::MalformedSignature;
            }
        }
        _ => {}
    }

    VerificationOutcome::Unclassified {
        exit_code,
        output: output.to_owned(),
    }
}

/// Verifies `data_file` against the detached signature in `signature_file`.
///
/// Runs the external verification tool exactly once; neither file is
/// mutated. The invoking user's local gpg key store provides the public
/// keys.
///
/// # Errors
///
/// Returns [`DebseedError::Precondition`] if either file does not exist,
/// or any error from spawning the helper process.
pub fn verify(
    executor: &dyn CommandExecutor,
    signature_file: &Utf8Path,
    data_file: &Utf8Path,
) -> Result<VerificationOutcome> {
    for path in [signature_file, data_file] {
        if !path.is_file() {
            return Err(DebseedError::Precondition {
                reason: format!("no such file: '{path}'"),
            });
        }
    }

    let output = executor.run(&CommandRequest::new(
        "gpg",
        ["--verify", signature_file.as_str(), data_file.as_str()],
    ))?;

    Ok(classify(
        output.status.code(),
        &merged_output_text(&output),
    ))
}

/// Extracts the signing key fingerprint from the `gpg: using ... key <fp>`
/// line, when present.
fn signing_key_fingerprint(lines: &[&str]) -> Option<String> {
    lines.iter().find_map(|line| {
        // gpg pads the line ("gpg:    using RSA key <fp>"), so the prefix
        // match tolerates any amount of whitespace after the tag.
        let rest = line.strip_prefix("gpg:")?.trim_start();
        let rest = rest.strip_prefix("using ")?;
        let token = rest.split_whitespace().last()?;
        is_hex_fingerprint(token).then(|| token.to_owned())
    })
}

/// The key id is the final 16 characters of the fingerprint.
fn key_id_of(fingerprint: &str) -> String {
    fingerprint.chars().skip(fingerprint.chars().count().saturating_sub(16)).collect()
}

fn is_hex_fingerprint(token: &str) -> bool {
    token.len() == 40
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase() && c.is_ascii_hexdigit())
}
