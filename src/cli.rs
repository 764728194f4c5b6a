//! CLI argument definitions for debseed.
//!
//! This module defines the command-line interface using clap. It is
//! separated from the main entrypoint to keep the binary focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Obtain and customise Debian installation images.
#[derive(Parser, Debug)]
#[command(name = "debseed")]
#[command(version, about)]
#[command(long_about = concat!(
    "Obtain and customise Debian installation images.\n\n",
    "debseed downloads the latest stable netinst image from the official ",
    "mirrors, verifies its GPG-signed checksums, and injects a preseed ",
    "configuration into the image's initrd so the resulting image installs ",
    "without manual input.\n\n",
    "All image surgery happens in temporary directories; the original image ",
    "is never modified.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Download and verify the latest stable netinst image:\n",
    "    $ debseed fetch image\n\n",
    "  Download the example preseed file to start from:\n",
    "    $ debseed fetch preseed-basic -o my-preseed.cfg\n\n",
    "  Inject a preseed file into an existing image:\n",
    "    $ debseed inject -i debian-12.5.0-amd64-netinst.iso -p my-preseed.cfg\n\n",
    "  Download the latest image and inject in one go:\n",
    "    $ debseed inject -p my-preseed.cfg -o custom.iso\n",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Suppress progress output (warnings and errors still shown).
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Download a remote artefact (image or example preseed file).
    Fetch(FetchArgs),

    /// Inject a preseed file into an installation image.
    Inject(InjectArgs),
}

/// Arguments for the fetch command.
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// What to download.
    #[arg(value_enum)]
    pub kind: FetchKind,

    /// Output location.
    #[command(flatten)]
    pub output: OutputArgs,
}

/// Downloadable artefacts.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// The latest stable netinst image, verified against its signed
    /// checksums.
    Image,
    /// The short example preseed file for the current stable release.
    PreseedBasic,
    /// The exhaustive example preseed file from the installation manual.
    PreseedFull,
}

/// Arguments for the inject command.
#[derive(Args, Debug, Clone)]
pub struct InjectArgs {
    /// Image to modify [default: download the latest stable netinst image].
    #[arg(short, long, value_name = "FILE")]
    pub image: Option<Utf8PathBuf>,

    /// Preseed file to embed.
    #[arg(short, long, value_name = "FILE")]
    pub preseed: Utf8PathBuf,

    /// Volume label for the modified image.
    #[arg(short, long, value_name = "LABEL", default_value = "Debian")]
    pub label: String,

    /// Output location.
    #[command(flatten)]
    pub output: OutputArgs,
}

/// Where a produced file should be written.
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Write the result to this exact path.
    #[arg(short = 'o', long, value_name = "FILE", conflicts_with = "output_dir")]
    pub output_file: Option<Utf8PathBuf>,

    /// Write the result into this directory under its default name.
    #[arg(short = 'd', long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,
}
