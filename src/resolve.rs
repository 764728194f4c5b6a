//! Resolution of remote artefact URLs from the Debian mirror listing.
//!
//! The hash and signature files live at fixed names next to the images, so
//! only the image itself needs discovering. The release directory listing
//! is fetched once and scanned for exactly one link matching the stable
//! amd64 netinst naming scheme; zero or several matches mean the page
//! layout changed and the scan can no longer be trusted.

use crate::error::{DebseedError, Result};
use crate::fetch::http_agent;

/// Directory listing for the current stable amd64 CD images.
pub const RELEASES_URL: &str = "https://cdimage.debian.org/debian-cd/current/amd64/iso-cd/";

/// File name of the checksum manifest published next to the images.
pub const HASH_FILE_NAME: &str = "SHA512SUMS";

/// File name of the detached signature over the checksum manifest.
pub const SIGNATURE_FILE_NAME: &str = "SHA512SUMS.sign";

/// URL of the example preseed file for the current stable installer.
const PRESEED_BASIC_URL: &str = "https://www.debian.org/releases/stable/example-preseed.txt";

/// URL of the exhaustive preseed example from the installation manual.
const PRESEED_FULL_URL: &str = "https://d-i.debian.org/manual/example-preseed.txt";

/// A remote file the workflow may download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtifact {
    /// File name the artefact should be saved under.
    pub name: String,
    /// Fully qualified download URL.
    pub url: String,
}

/// The set of downloadable artefacts the tool knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// The installation image itself.
    Image,
    /// The checksum manifest covering the image.
    HashFile,
    /// The detached signature over the checksum manifest.
    SignatureFile,
    /// The short example preseed file.
    PreseedBasic,
    /// The exhaustive example preseed file.
    PreseedFull,
}

/// Maps artefact kinds to concrete names and URLs.
#[cfg_attr(test, mockall::automock)]
pub trait ArtifactResolver {
    /// Resolves `kind` to a downloadable artefact.
    ///
    /// # Errors
    ///
    /// Returns [`DebseedError::Download`] if the listing page cannot be
    /// fetched and [`DebseedError::ProtocolMismatch`] if it no longer
    /// contains exactly one matching image link.
    fn resolve(&self, kind: ArtifactKind) -> Result<RemoteArtifact>;
}

/// Resolver backed by the live Debian mirror.
#[derive(Debug, Default)]
pub struct DebianCdResolver;

impl ArtifactResolver for DebianCdResolver {
    fn resolve(&self, kind: ArtifactKind) -> Result<RemoteArtifact> {
        match kind {
            ArtifactKind::Image => {
                let listing = fetch_listing(RELEASES_URL)?;
                let name = find_image_link(&listing)?;
                Ok(RemoteArtifact {
                    url: format!("{RELEASES_URL}{name}"),
                    name,
                })
            }
            ArtifactKind::HashFile => Ok(fixed_artifact(HASH_FILE_NAME)),
            ArtifactKind::SignatureFile => Ok(fixed_artifact(SIGNATURE_FILE_NAME)),
            ArtifactKind::PreseedBasic => Ok(RemoteArtifact {
                name: "example-preseed.txt".to_owned(),
                url: PRESEED_BASIC_URL.to_owned(),
            }),
            ArtifactKind::PreseedFull => Ok(RemoteArtifact {
                name: "example-preseed.txt".to_owned(),
                url: PRESEED_FULL_URL.to_owned(),
            }),
        }
    }
}

fn fixed_artifact(name: &str) -> RemoteArtifact {
    RemoteArtifact {
        name: name.to_owned(),
        url: format!("{RELEASES_URL}{name}"),
    }
}

fn fetch_listing(url: &str) -> Result<String> {
    let mut response = http_agent()
        .get(url)
        .call()
        .map_err(|e| DebseedError::Download {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
    response
        .body_mut()
        .read_to_string()
        .map_err(|e| DebseedError::Download {
            url: url.to_owned(),
            reason: e.to_string(),
        })
}

/// Scans the listing HTML for the single netinst image link.
///
/// # Errors
///
/// Returns [`DebseedError::ProtocolMismatch`] unless exactly one distinct
/// link matches.
fn find_image_link(listing: &str) -> Result<String> {
    let mut matches: Vec<&str> = hrefs_in(listing).filter(|h| is_netinst_name(h)).collect();
    matches.sort_unstable();
    matches.dedup();
    match matches.as_slice() {
        [only] => Ok((*only).to_owned()),
        _ => Err(DebseedError::ProtocolMismatch {
            tool: "release listing",
            output: format!(
                "expected exactly one netinst image link, found {}",
                matches.len()
            ),
        }),
    }
}

/// Iterates over `href="..."` attribute values in an HTML fragment.
fn hrefs_in(html: &str) -> impl Iterator<Item = &str> {
    html.split("href=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
}

/// Recognises `debian-<version>-amd64-netinst.iso` where the version is
/// digits and dots.
fn is_netinst_name(name: &str) -> bool {
    let Some(version) = name
        .strip_prefix("debian-")
        .and_then(|rest| rest.strip_suffix("-amd64-netinst.iso"))
    else {
        return false;
    };
    !version.is_empty() && version.chars().all(|c| c.is_ascii_digit() || c == '.')
}
