//! Bootable-image modification.
//!
//! Implements the injection pipeline over external tools: extract the image
//! tree, preserve the boot sector, append the payload to the embedded
//! initrd archive, regenerate the internal hash manifest, and repack a
//! hybrid-bootable image. Each run either produces a fully valid output
//! image or no output image at all.
//!
//! # Sub-modules
//!
//! - [`extract`] — whole-image extraction into a directory tree.
//! - [`mbr`] — boot-sector capture from the original image.
//! - [`initrd`] — payload append on the embedded initrd archive.
//! - [`repack`] — volume-label validation and hybrid-boot repacking.
//! - [`pipeline`] — the injection state machine tying the steps together.

pub mod extract;
pub mod initrd;
pub mod mbr;
pub mod pipeline;
pub mod repack;
