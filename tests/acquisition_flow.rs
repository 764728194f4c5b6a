//! End-to-end tests for the image acquisition workflow.
//!
//! Downloads are served from canned bodies and gpg/sha512sum are stubbed,
//! so the whole flow runs against a real destination directory: manifest
//! and signature arrive first, the signature is verified, the image is
//! fetched and checked, and the auxiliary files are removed again.

use camino::{Utf8Path, Utf8PathBuf};
use debseed::error::{DebseedError, Result};
use debseed::fetch::{DownloadObserver, FileFetcher};
use debseed::prompt::{Answer, Confirmer};
use debseed::report::NullReporter;
use debseed::resolve::{ArtifactKind, ArtifactResolver, RemoteArtifact};
use debseed::test_utils::{ExpectedCall, StubExecutor, output_with};
use debseed::workflow::acquire_image;
use std::cell::RefCell;
use std::collections::HashMap;

const IMAGE_NAME: &str = "debian-12.5.0-amd64-netinst.iso";
const MIRROR: &str = "https://mirror.invalid";

struct FixedResolver;

impl ArtifactResolver for FixedResolver {
    fn resolve(&self, kind: ArtifactKind) -> Result<RemoteArtifact> {
        let name = match kind {
            ArtifactKind::Image => IMAGE_NAME,
            ArtifactKind::HashFile => "SHA512SUMS",
            ArtifactKind::SignatureFile => "SHA512SUMS.sign",
            ArtifactKind::PreseedBasic | ArtifactKind::PreseedFull => "example-preseed.txt",
        };
        Ok(RemoteArtifact {
            name: name.to_owned(),
            url: format!("{MIRROR}/{name}"),
        })
    }
}

/// Serves canned bodies; a missing entry fails the download.
struct CannedFetcher {
    bodies: RefCell<HashMap<String, Vec<u8>>>,
}

impl CannedFetcher {
    fn new(bodies: &[(&str, &[u8])]) -> Self {
        Self {
            bodies: RefCell::new(
                bodies
                    .iter()
                    .map(|(name, body)| (format!("{MIRROR}/{name}"), body.to_vec()))
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
        let Some(body) = self.bodies.borrow_mut().remove(url) else {
            return Err(DebseedError::Download {
                url: url.to_owned(),
                reason: "connection refused".to_owned(),
            });
        };
        std::fs::write(dest, body)?;
        Ok(())
    }
}

struct Decliner;

impl Confirmer for Decliner {
    fn confirm(&mut self, _question: &str) -> Result<Answer> {
        Ok(Answer::No)
    }
}

struct Unprompted;

impl Confirmer for Unprompted {
    fn confirm(&mut self, question: &str) -> Result<Answer> {
        panic!("unexpected prompt: {question}");
    }
}

fn good_verify_call(dest: &Utf8Path) -> ExpectedCall {
    ExpectedCall::returning(
        "gpg",
        [
            "--verify".to_owned(),
            dest.join("SHA512SUMS.sign").into_string(),
            dest.join("SHA512SUMS").into_string(),
        ],
        output_with(
            0,
            "",
            concat!(
                "gpg: Signature made Sat 10 Feb 2024 10:02:48 GMT\n",
                "gpg:                using RSA key DF9B9C49EAA9298432589D76DA87E80D6294BE9B\n",
                "gpg: Good signature from \"Debian CD signing key <debian-cd@lists.debian.org>\" [unknown]\n",
            ),
        ),
    )
}

fn passing_check_call(dest: &Utf8Path) -> ExpectedCall {
    ExpectedCall::returning(
        "sha512sum",
        ["--check".to_owned(), dest.join("SHA512SUMS").into_string()],
        output_with(0, &format!("{IMAGE_NAME}: OK\n"), ""),
    )
}

fn manifest() -> Vec<u8> {
    format!(
        "aaaa  {IMAGE_NAME}\nbbbb  debian-12.5.0-amd64-DVD-1.iso\ncccc  debian-mac-12.5.0-amd64-netinst.iso\n"
    )
    .into_bytes()
}

fn temp_dest() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf-8");
    (dir, root)
}

#[test]
fn leaves_only_the_verified_image_behind() {
    let (_dir, dest) = temp_dest();
    let fetcher = CannedFetcher::new(&[
        ("SHA512SUMS", &manifest()),
        ("SHA512SUMS.sign", b"detached signature"),
        (IMAGE_NAME, b"image bytes"),
    ]);
    let executor = StubExecutor::new(vec![good_verify_call(&dest), passing_check_call(&dest)]);

    let image_path = acquire_image(
        &executor,
        &fetcher,
        &FixedResolver,
        &mut Unprompted,
        &mut NullReporter,
        &dest,
        None,
    )
    .expect("acquisition should succeed");

    assert_eq!(image_path, dest.join(IMAGE_NAME));
    assert_eq!(std::fs::read(&image_path).expect("read"), b"image bytes");

    let leftovers: Vec<_> = dest
        .read_dir_utf8()
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().to_owned())
        .collect();
    assert_eq!(leftovers, vec![IMAGE_NAME.to_owned()]);
    executor.assert_finished();
}

#[test]
fn failed_image_download_keeps_the_verified_manifest_but_no_image() {
    let (_dir, dest) = temp_dest();
    // No canned body for the image itself.
    let fetcher = CannedFetcher::new(&[
        ("SHA512SUMS", &manifest()),
        ("SHA512SUMS.sign", b"detached signature"),
    ]);
    let executor = StubExecutor::new(vec![good_verify_call(&dest)]);

    let err = acquire_image(
        &executor,
        &fetcher,
        &FixedResolver,
        &mut Unprompted,
        &mut NullReporter,
        &dest,
        None,
    )
    .expect_err("image download should fail");

    assert!(matches!(err, DebseedError::Download { .. }));
    assert!(!dest.join(IMAGE_NAME).exists());
}

#[test]
fn declining_a_key_import_downloads_nothing_further() {
    let (_dir, dest) = temp_dest();
    let fetcher = CannedFetcher::new(&[
        ("SHA512SUMS", &manifest()),
        ("SHA512SUMS.sign", b"detached signature"),
        (IMAGE_NAME, b"image bytes"),
    ]);
    let executor = StubExecutor::new(vec![ExpectedCall::returning(
        "gpg",
        [
            "--verify".to_owned(),
            dest.join("SHA512SUMS.sign").into_string(),
            dest.join("SHA512SUMS").into_string(),
        ],
        output_with(
            2,
            "",
            concat!(
                "gpg: Signature made Sat 10 Feb 2024 10:02:48 GMT\n",
                "gpg:                using RSA key DF9B9C49EAA9298432589D76DA87E80D6294BE9B\n",
                "gpg: Can't check signature: No public key\n",
            ),
        ),
    )]);

    let err = acquire_image(
        &executor,
        &fetcher,
        &FixedResolver,
        &mut Decliner,
        &mut NullReporter,
        &dest,
        None,
    )
    .expect_err("declining the import should abort");

    assert!(matches!(err, DebseedError::Aborted { .. }));
    assert!(!dest.join(IMAGE_NAME).exists());
    executor.assert_finished();
}
