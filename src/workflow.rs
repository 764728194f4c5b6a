//! End-to-end workflows combining resolution, download, and verification.
//!
//! The image acquisition flow mirrors the published release process: the
//! checksum manifest and its detached signature are downloaded first, the
//! signature is verified (importing the CD signing key on request when it
//! is missing), and only then is the image itself downloaded and checked
//! against the manifest. The manifest and signature are removed once the
//! image has passed, leaving a single verified file behind.

use crate::checksum;
use crate::error::{DebseedError, Result};
use crate::exec::CommandExecutor;
use crate::fetch::{DownloadObserver, FileFetcher};
use crate::image::pipeline::{self, InjectRequest};
use crate::keystore;
use crate::prompt::{Answer, Confirmer};
use crate::report::Reporter;
use crate::resolve::{ArtifactKind, ArtifactResolver};
use crate::verify::{self, VerificationOutcome};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File extensions under which an injection source is accepted silently.
const IMAGE_EXTENSIONS: [&str; 2] = ["iso", "img"];

/// Downloads, verifies, and returns the path of the latest stable netinst
/// image.
///
/// All three artefacts land in `dest_dir`. On success only the image
/// remains; the manifest and signature are removed after the check. On
/// failure partially downloaded files may remain in `dest_dir` alongside
/// whatever was verified up to that point, but never an unverified image
/// presented as the result.
///
/// # Errors
///
/// Propagates resolution, download, verification, and integrity errors.
/// Returns [`DebseedError::Aborted`] if the user declines a key import.
pub fn acquire_image(
    executor: &dyn CommandExecutor,
    fetcher: &dyn FileFetcher,
    resolver: &dyn ArtifactResolver,
    confirmer: &mut dyn Confirmer,
    reporter: &mut dyn Reporter,
    dest_dir: &Utf8Path,
    observer: Option<&mut dyn DownloadObserver>,
) -> Result<Utf8PathBuf> {
    if !dest_dir.is_dir() {
        return Err(DebseedError::Precondition {
            reason: format!("no such directory: '{dest_dir}'"),
        });
    }

    reporter.info("Resolving the latest stable netinst image...");
    let image = resolver.resolve(ArtifactKind::Image)?;
    let hash_file = resolver.resolve(ArtifactKind::HashFile)?;
    let signature_file = resolver.resolve(ArtifactKind::SignatureFile)?;
    reporter.ok(&format!("Found '{}'.", image.name));

    let hash_path = dest_dir.join(&hash_file.name);
    let signature_path = dest_dir.join(&signature_file.name);
    let image_path = dest_dir.join(&image.name);

    reporter.info("Downloading the checksum manifest and its signature...");
    fetcher.fetch(&hash_file.url, &hash_path, None)?;
    fetcher.fetch(&signature_file.url, &signature_path, None)?;

    ensure_manifest_is_signed(executor, confirmer, reporter, &signature_path, &hash_path)?;

    reporter.info(&format!("Downloading '{}'...", image.name));
    fetcher.fetch(&image.url, &image_path, observer)?;

    let retained = checksum::trim_manifest_to_target(&hash_path, &image.name)?;
    if retained != 1 {
        return Err(DebseedError::Integrity {
            reason: format!(
                "the checksum manifest lists '{}' {retained} times instead of once",
                image.name
            ),
        });
    }
    reporter.info("Checking the image against the manifest...");
    checksum::check_against_manifest(executor, &hash_path, dest_dir, reporter)?;

    fs::remove_file(&hash_path)?;
    fs::remove_file(&signature_path)?;

    reporter.success(&format!("Obtained and verified '{}'.", image.name));
    Ok(image_path)
}

/// Verifies the manifest signature, importing the signing key on request.
///
/// The missing-key path asks once (re-asking on unclear responses), then
/// re-verifies a single time after the import. A second missing-key result
/// after importing is unexpected output, not a retry opportunity.
fn ensure_manifest_is_signed(
    executor: &dyn CommandExecutor,
    confirmer: &mut dyn Confirmer,
    reporter: &mut dyn Reporter,
    signature_path: &Utf8Path,
    hash_path: &Utf8Path,
) -> Result<()> {
    reporter.info("Verifying the manifest signature...");
    match verify::verify(executor, signature_path, hash_path)? {
        VerificationOutcome::Valid { signer } => {
            reporter.ok(&format!("Good signature from {signer}."));
            Ok(())
        }
        VerificationOutcome::BadSignature => Err(DebseedError::Integrity {
            reason: "the manifest signature does not match the manifest".to_owned(),
        }),
        VerificationOutcome::MalformedSignature => Err(DebseedError::Integrity {
            reason: format!("'{signature_path}' does not contain OpenPGP data"),
        }),
        VerificationOutcome::MissingKey { key_id, .. } => {
            let key_id = key_id.unwrap_or_else(|| keystore::DEBIAN_CD_SIGNING_KEY_ID.to_owned());
            reporter.warn(&format!(
                "The signing key {key_id} is not in the local gpg key store."
            ));
            if !confirmed(confirmer, "Import the Debian CD signing key and retry?")? {
                return Err(DebseedError::Aborted {
                    reason: "the signing key was not imported".to_owned(),
                });
            }
            if keystore::is_key_present(executor, keystore::DEBIAN_CD_SIGNING_KEY_ID)? {
                reporter.info("The key is already present; retrying the verification.");
            } else {
                reporter.info("Importing the Debian CD signing key...");
                keystore::import_key(
                    executor,
                    keystore::DEBIAN_CD_SIGNING_KEY_ID,
                    keystore::DEBIAN_KEYSERVER,
                )?;
                reporter.ok("Imported the Debian CD signing key.");
            }
            match verify::verify(executor, signature_path, hash_path)? {
                VerificationOutcome::Valid { signer } => {
                    reporter.ok(&format!("Good signature from {signer}."));
                    Ok(())
                }
                VerificationOutcome::BadSignature => Err(DebseedError::Integrity {
                    reason: "the manifest signature does not match the manifest".to_owned(),
                }),
                other => Err(DebseedError::ProtocolMismatch {
                    tool: "gpg",
                    output: format!("verification after key import returned {other:?}"),
                }),
            }
        }
        VerificationOutcome::Unclassified { output, .. } => Err(DebseedError::ProtocolMismatch {
            tool: "gpg",
            output,
        }),
    }
}

/// Runs the injection pipeline, confirming first when the source file does
/// not look like an image.
///
/// # Errors
///
/// Returns [`DebseedError::Aborted`] if the user declines to continue, and
/// otherwise propagates pipeline errors.
pub fn inject_into_image(
    executor: &dyn CommandExecutor,
    confirmer: &mut dyn Confirmer,
    reporter: &mut dyn Reporter,
    request: &InjectRequest,
) -> Result<()> {
    let extension = request.image.extension().unwrap_or_default();
    if !IMAGE_EXTENSIONS.contains(&extension) {
        reporter.warn(&format!(
            "'{}' does not have an image file extension.",
            request.image
        ));
        if !confirmed(confirmer, "Continue anyway?")? {
            return Err(DebseedError::Aborted {
                reason: format!("'{}' was not modified", request.image),
            });
        }
    }
    pipeline::inject(executor, reporter, request)
}

/// Asks until the answer is clear; `true` means yes.
fn confirmed(confirmer: &mut dyn Confirmer, question: &str) -> Result<bool> {
    loop {
        match confirmer.confirm(question)? {
            Answer::Yes => return Ok(true),
            Answer::No => return Ok(false),
            Answer::Unclear => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NullReporter;
    use crate::resolve::{MockArtifactResolver, RemoteArtifact};
    use crate::test_utils::{ExpectedCall, StubExecutor, output_with, success_output};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    const IMAGE_NAME: &str = "debian-12.5.0-amd64-netinst.iso";

    /// Fetcher that writes canned bodies instead of touching the network.
    struct CannedFetcher {
        bodies: RefCell<std::collections::HashMap<String, Vec<u8>>>,
    }

    impl CannedFetcher {
        fn new(bodies: &[(&str, &[u8])]) -> Self {
            Self {
                bodies: RefCell::new(
                    bodies
                        .iter()
                        .map(|(url, body)| ((*url).to_owned(), body.to_vec()))
                        .collect(),
                ),
            }
        }
    }

    impl FileFetcher for CannedFetcher {
        fn fetch(
            &self,
            url: &str,
            dest: &Utf8Path,
            _observer: Option<&mut dyn DownloadObserver>,
        ) -> Result<()> {
            let body = self
                .bodies
                .borrow_mut()
                .remove(url)
                .unwrap_or_else(|| panic!("unexpected fetch of {url}"));
            std::fs::write(dest, body)?;
            Ok(())
        }
    }

    struct ScriptedConfirmer {
        answers: VecDeque<Answer>,
    }

    impl ScriptedConfirmer {
        fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
            Self {
                answers: answers.into_iter().collect(),
            }
        }
    }

    impl Confirmer for ScriptedConfirmer {
        fn confirm(&mut self, _question: &str) -> Result<Answer> {
            Ok(self.answers.pop_front().expect("unscripted confirmation"))
        }
    }

    fn scripted_resolver() -> MockArtifactResolver {
        let mut resolver = MockArtifactResolver::new();
        resolver.expect_resolve().returning(|kind| {
            let (name, url) = match kind {
                ArtifactKind::Image => (IMAGE_NAME, format!("https://mirror.invalid/{IMAGE_NAME}")),
                ArtifactKind::HashFile => {
                    ("SHA512SUMS", "https://mirror.invalid/SHA512SUMS".to_owned())
                }
                ArtifactKind::SignatureFile => (
                    "SHA512SUMS.sign",
                    "https://mirror.invalid/SHA512SUMS.sign".to_owned(),
                ),
                _ => panic!("unexpected artefact kind"),
            };
            Ok(RemoteArtifact {
                name: name.to_owned(),
                url,
            })
        });
        resolver
    }

    fn good_signature_output() -> std::process::Output {
        output_with(
            0,
            "",
            concat!(
                "gpg: Signature made Sat 10 Feb 2024 10:02:48 GMT\n",
                "gpg:                using RSA key DF9B9C49EAA9298432589D76DA87E80D6294BE9B\n",
                "gpg: Good signature from \"Debian CD signing key <debian-cd@lists.debian.org>\" [unknown]\n",
            ),
        )
    }

    fn missing_key_output() -> std::process::Output {
        output_with(
            2,
            "",
            concat!(
                "gpg: Signature made Sat 10 Feb 2024 10:02:48 GMT\n",
                "gpg:                using RSA key DF9B9C49EAA9298432589D76DA87E80D6294BE9B\n",
                "gpg: Can't check signature: No public key\n",
            ),
        )
    }

    fn manifest_body() -> Vec<u8> {
        format!(
            "0a1b2c{sep}{IMAGE_NAME}\nffffff{sep}debian-12.5.0-amd64-DVD-1.iso\n",
            sep = "  "
        )
        .into_bytes()
    }

    fn canned_fetcher() -> CannedFetcher {
        CannedFetcher::new(&[
            ("https://mirror.invalid/SHA512SUMS", &manifest_body()),
            ("https://mirror.invalid/SHA512SUMS.sign", b"sig bytes"),
            (
                &format!("https://mirror.invalid/{IMAGE_NAME}"),
                b"image bytes",
            ),
        ])
    }

    fn temp_dest() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf-8");
        (dir, root)
    }

    fn verify_call(dest: &Utf8Path, result: std::process::Output) -> ExpectedCall {
        ExpectedCall::returning(
            "gpg",
            [
                "--verify".to_owned(),
                dest.join("SHA512SUMS.sign").into_string(),
                dest.join("SHA512SUMS").into_string(),
            ],
            result,
        )
    }

    fn manifest_check_call(dest: &Utf8Path) -> ExpectedCall {
        ExpectedCall::returning(
            "sha512sum",
            ["--check".to_owned(), dest.join("SHA512SUMS").into_string()],
            output_with(0, &format!("{IMAGE_NAME}: OK\n"), ""),
        )
    }

    #[test]
    fn acquires_and_verifies_the_image() {
        let (_dir, dest) = temp_dest();
        let executor = StubExecutor::new(vec![
            verify_call(&dest, good_signature_output()),
            manifest_check_call(&dest),
        ]);

        let image_path = acquire_image(
            &executor,
            &canned_fetcher(),
            &scripted_resolver(),
            &mut ScriptedConfirmer::new([]),
            &mut NullReporter,
            &dest,
            None,
        )
        .expect("acquisition should succeed");

        assert_eq!(image_path, dest.join(IMAGE_NAME));
        assert!(image_path.is_file());
        // Only the verified image remains.
        assert!(!dest.join("SHA512SUMS").exists());
        assert!(!dest.join("SHA512SUMS.sign").exists());
        executor.assert_finished();
    }

    #[test]
    fn declined_key_import_aborts() {
        let (_dir, dest) = temp_dest();
        let executor = StubExecutor::new(vec![verify_call(&dest, missing_key_output())]);

        let err = acquire_image(
            &executor,
            &canned_fetcher(),
            &scripted_resolver(),
            &mut ScriptedConfirmer::new([Answer::Unclear, Answer::No]),
            &mut NullReporter,
            &dest,
            None,
        )
        .expect_err("expected an abort");

        assert!(matches!(err, DebseedError::Aborted { .. }));
        // The image was never downloaded.
        assert!(!dest.join(IMAGE_NAME).exists());
    }

    #[test]
    fn missing_key_import_and_reverify_succeeds() {
        let (_dir, dest) = temp_dest();
        let executor = StubExecutor::new(vec![
            verify_call(&dest, missing_key_output()),
            // The key store is consulted before importing.
            ExpectedCall::returning(
                "gpg",
                ["--locate-keys", keystore::DEBIAN_CD_SIGNING_KEY_ID],
                success_output(),
            ),
            ExpectedCall::returning(
                "gpg",
                [
                    "--keyserver",
                    keystore::DEBIAN_KEYSERVER,
                    "--recv-key",
                    keystore::DEBIAN_CD_SIGNING_KEY_ID,
                ],
                output_with(
                    0,
                    "",
                    &format!(
                        "gpg: key {}: public key \"{}\" imported\n",
                        keystore::DEBIAN_CD_SIGNING_KEY_ID,
                        keystore::DEBIAN_CD_SIGNING_KEY_NAME,
                    ),
                ),
            ),
            verify_call(&dest, good_signature_output()),
            manifest_check_call(&dest),
        ]);

        let image_path = acquire_image(
            &executor,
            &canned_fetcher(),
            &scripted_resolver(),
            &mut ScriptedConfirmer::new([Answer::Yes]),
            &mut NullReporter,
            &dest,
            None,
        )
        .expect("acquisition should succeed after import");

        assert!(image_path.is_file());
        executor.assert_finished();
    }

    #[test]
    fn bad_signature_is_an_integrity_failure() {
        let (_dir, dest) = temp_dest();
        let executor = StubExecutor::new(vec![verify_call(
            &dest,
            output_with(
                1,
                "",
                concat!(
                    "gpg: Signature made Sat 10 Feb 2024 10:02:48 GMT\n",
                    "gpg:                using RSA key DF9B9C49EAA9298432589D76DA87E80D6294BE9B\n",
                    "gpg: BAD signature from \"Debian CD signing key <debian-cd@lists.debian.org>\" [unknown]\n",
                ),
            ),
        )]);

        let err = acquire_image(
            &executor,
            &canned_fetcher(),
            &scripted_resolver(),
            &mut ScriptedConfirmer::new([]),
            &mut NullReporter,
            &dest,
            None,
        )
        .expect_err("expected an integrity failure");

        assert!(matches!(err, DebseedError::Integrity { .. }));
        assert!(!dest.join(IMAGE_NAME).exists());
    }

    #[test]
    fn manifest_without_the_image_is_an_integrity_failure() {
        let (_dir, dest) = temp_dest();
        let fetcher = CannedFetcher::new(&[
            (
                "https://mirror.invalid/SHA512SUMS",
                b"ffffff  debian-12.5.0-amd64-DVD-1.iso\n".as_slice(),
            ),
            ("https://mirror.invalid/SHA512SUMS.sign", b"sig bytes"),
            (
                &format!("https://mirror.invalid/{IMAGE_NAME}"),
                b"image bytes",
            ),
        ]);
        let executor = StubExecutor::new(vec![verify_call(&dest, good_signature_output())]);

        let err = acquire_image(
            &executor,
            &fetcher,
            &scripted_resolver(),
            &mut ScriptedConfirmer::new([]),
            &mut NullReporter,
            &dest,
            None,
        )
        .expect_err("expected an integrity failure");

        assert!(matches!(err, DebseedError::Integrity { .. }));
    }

    #[test]
    fn unusual_extension_requires_confirmation() {
        let (_dir, dest) = temp_dest();
        let image = dest.join("backup.raw");
        std::fs::write(&image, b"bytes").expect("write");
        let payload = dest.join("preseed.cfg");
        std::fs::write(&payload, b"d-i").expect("write");
        let request = InjectRequest {
            image,
            payload,
            output: dest.join("out.iso"),
            label: "Debian".to_owned(),
        };

        let executor = StubExecutor::new(Vec::new());
        let err = inject_into_image(
            &executor,
            &mut ScriptedConfirmer::new([Answer::No]),
            &mut NullReporter,
            &request,
        )
        .expect_err("expected an abort");
        assert!(matches!(err, DebseedError::Aborted { .. }));
        assert!(executor.invocations().is_empty());
    }
}
