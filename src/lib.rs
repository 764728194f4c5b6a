//! debseed library.
//!
//! This crate provides the core functionality for obtaining, verifying,
//! and customising Debian installation images. It is used by the `debseed`
//! CLI binary and can be consumed programmatically for testing or custom
//! provisioning workflows.
//!
//! # Modules
//!
//! - [`checksum`] - Checksum manifest trimming, checking, and regeneration
//! - [`cli`] - Command-line argument definitions
//! - [`deps`] - Availability checks for required external tools
//! - [`error`] - Semantic error types
//! - [`exec`] - External process execution with timeouts
//! - [`fetch`] - HTTP file download with progress reporting
//! - [`image`] - Image extraction, initrd injection, and repacking
//! - [`keystore`] - GPG key store queries and key import
//! - [`perm`] - Scoped write-permission grants with restoration
//! - [`prompt`] - Interactive yes/no confirmation
//! - [`report`] - Prefixed status reporting
//! - [`resolve`] - Remote artefact URL resolution
//! - [`verify`] - GPG detached-signature verification
//! - [`workflow`] - End-to-end acquisition and injection flows

pub mod checksum;
pub mod cli;
pub mod deps;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod image;
pub mod keystore;
pub mod perm;
pub mod prompt;
pub mod report;
pub mod resolve;
pub mod verify;
pub mod workflow;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
