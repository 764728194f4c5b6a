//! debseed CLI entrypoint.
//!
//! This binary downloads and verifies Debian installation images and
//! injects preseed configurations into them. All orchestration lives
//! here; the heavy lifting is in the library modules.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use debseed::cli::{Cli, Command, FetchArgs, FetchKind, InjectArgs, OutputArgs};
use debseed::deps::missing_tools;
use debseed::error::{DebseedError, Result};
use debseed::exec::{CommandExecutor, SystemCommandExecutor};
use debseed::fetch::{DownloadObserver, FileFetcher, HttpFetcher};
use debseed::image::pipeline::InjectRequest;
use debseed::prompt::{Answer, Confirmer, StdinConfirmer};
use debseed::report::{Reporter, WriteReporter};
use debseed::resolve::{ArtifactKind, ArtifactResolver, DebianCdResolver};
use debseed::workflow;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let executor = SystemCommandExecutor;
    let mut reporter = WriteReporter::new(stderr, cli.quiet);
    let mut confirmer = StdinConfirmer;

    match &cli.command {
        Command::Fetch(args) => match args.kind {
            FetchKind::Image => {
                ensure_tools_available(&executor, &mut reporter)?;
                fetch_image(cli, args, &executor, &mut confirmer, &mut reporter)
            }
            FetchKind::PreseedBasic | FetchKind::PreseedFull => {
                fetch_preseed(args, &mut confirmer, &mut reporter)
            }
        },
        Command::Inject(args) => {
            ensure_tools_available(&executor, &mut reporter)?;
            inject(cli, args, &executor, &mut confirmer, &mut reporter)
        }
    }
}

/// Fails fast when any required external tool is missing.
fn ensure_tools_available(
    executor: &dyn CommandExecutor,
    reporter: &mut dyn Reporter,
) -> Result<()> {
    let missing = missing_tools(executor)?;
    let Some(first) = missing.first().copied() else {
        return Ok(());
    };
    for tool in &missing {
        reporter.error(&format!("Required tool '{tool}' is not available."));
    }
    Err(DebseedError::MissingTool { tool: first })
}

/// Downloads and verifies the latest stable netinst image.
///
/// The acquisition workflow runs inside a temporary directory next to the
/// final location, so an interrupted run never leaves a half-verified
/// image at the destination.
fn fetch_image(
    cli: &Cli,
    args: &FetchArgs,
    executor: &dyn CommandExecutor,
    confirmer: &mut StdinConfirmer,
    reporter: &mut WriteReporter<'_>,
) -> Result<()> {
    let dest_dir = destination_dir(&args.output)?;
    let staging = tempfile::tempdir_in(&dest_dir)?;
    let staging_dir =
        Utf8PathBuf::try_from(staging.path().to_path_buf()).map_err(|e| {
            DebseedError::Precondition {
                reason: format!("temporary directory is not valid UTF-8: {e}"),
            }
        })?;

    let mut progress = StderrProgress::default();
    let observer: Option<&mut dyn DownloadObserver> = if cli.quiet {
        None
    } else {
        Some(&mut progress)
    };

    let image_path = workflow::acquire_image(
        executor,
        &HttpFetcher,
        &DebianCdResolver,
        confirmer,
        reporter,
        &staging_dir,
        observer,
    )?;

    let name = image_path
        .file_name()
        .ok_or_else(|| DebseedError::Precondition {
            reason: format!("cannot determine a file name for '{image_path}'"),
        })?;
    let final_path = args
        .output
        .output_file
        .clone()
        .unwrap_or_else(|| dest_dir.join(name));

    move_into_place(&image_path, &final_path, confirmer, reporter)?;
    reporter.success(&format!("Image available at '{final_path}'."));
    Ok(())
}

/// Downloads one of the example preseed files.
fn fetch_preseed(
    args: &FetchArgs,
    confirmer: &mut StdinConfirmer,
    reporter: &mut WriteReporter<'_>,
) -> Result<()> {
    let kind = match args.kind {
        FetchKind::PreseedBasic => ArtifactKind::PreseedBasic,
        FetchKind::PreseedFull => ArtifactKind::PreseedFull,
        FetchKind::Image => unreachable!("dispatched in run"),
    };
    let artifact = DebianCdResolver.resolve(kind)?;
    let dest = match &args.output.output_file {
        Some(file) => file.clone(),
        None => destination_dir(&args.output)?.join(&artifact.name),
    };
    if dest.exists() {
        confirm_overwrite(&dest, confirmer, reporter)?;
        std::fs::remove_file(&dest)?;
    }

    reporter.info(&format!("Downloading '{}'...", artifact.url));
    HttpFetcher.fetch(&artifact.url, &dest, None)?;
    reporter.success(&format!("Preseed file available at '{dest}'."));
    Ok(())
}

/// Injects a preseed file into an image, downloading one first if none was
/// given.
fn inject(
    cli: &Cli,
    args: &InjectArgs,
    executor: &dyn CommandExecutor,
    confirmer: &mut StdinConfirmer,
    reporter: &mut WriteReporter<'_>,
) -> Result<()> {
    // Keeps a downloaded image alive until the pipeline is done with it.
    let mut download_dir: Option<tempfile::TempDir> = None;

    let image = match &args.image {
        Some(image) => image.clone(),
        None => {
            let staging = tempfile::tempdir()?;
            let staging_dir =
                Utf8PathBuf::try_from(staging.path().to_path_buf()).map_err(|e| {
                    DebseedError::Precondition {
                        reason: format!("temporary directory is not valid UTF-8: {e}"),
                    }
                })?;

            let mut progress = StderrProgress::default();
            let observer: Option<&mut dyn DownloadObserver> = if cli.quiet {
                None
            } else {
                Some(&mut progress)
            };
            let image = workflow::acquire_image(
                executor,
                &HttpFetcher,
                &DebianCdResolver,
                confirmer,
                reporter,
                &staging_dir,
                observer,
            )?;
            download_dir = Some(staging);
            image
        }
    };

    let output = match &args.output.output_file {
        Some(file) => file.clone(),
        None => destination_dir(&args.output)?.join(default_output_name(&image)?),
    };

    let request = InjectRequest {
        image,
        payload: args.preseed.clone(),
        output,
        label: args.label.clone(),
    };
    workflow::inject_into_image(executor, confirmer, reporter, &request)?;

    drop(download_dir);
    Ok(())
}

/// `debian-12.5.0-amd64-netinst.iso` becomes
/// `debian-12.5.0-amd64-netinst-debseed.iso`.
fn default_output_name(image: &Utf8Path) -> Result<String> {
    let stem = image
        .file_stem()
        .ok_or_else(|| DebseedError::Precondition {
            reason: format!("cannot determine a file name for '{image}'"),
        })?;
    Ok(match image.extension() {
        Some(extension) => format!("{stem}-debseed.{extension}"),
        None => format!("{stem}-debseed"),
    })
}

/// Resolves the requested output directory, defaulting to the working
/// directory.
fn destination_dir(output: &OutputArgs) -> Result<Utf8PathBuf> {
    if let Some(dir) = &output.output_dir {
        if !dir.is_dir() {
            return Err(DebseedError::Precondition {
                reason: format!("no such directory: '{dir}'"),
            });
        }
        return Ok(dir.clone());
    }
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd).map_err(|e| DebseedError::Precondition {
        reason: format!("working directory is not valid UTF-8: {e}"),
    })
}

/// Moves a finished file to its destination, asking before replacing
/// anything.
fn move_into_place(
    source: &Utf8Path,
    dest: &Utf8Path,
    confirmer: &mut dyn Confirmer,
    reporter: &mut dyn Reporter,
) -> Result<()> {
    if dest.exists() {
        confirm_overwrite(dest, confirmer, reporter)?;
        std::fs::remove_file(dest)?;
    }
    if std::fs::rename(source, dest).is_err() {
        // Crossing a filesystem boundary; fall back to copy-and-remove.
        std::fs::copy(source, dest)?;
        std::fs::remove_file(source)?;
    }
    Ok(())
}

/// Asks before overwriting `dest`; declining aborts.
fn confirm_overwrite(
    dest: &Utf8Path,
    confirmer: &mut dyn Confirmer,
    reporter: &mut dyn Reporter,
) -> Result<()> {
    reporter.warn(&format!("'{dest}' already exists."));
    loop {
        match confirmer.confirm(&format!("Overwrite '{dest}'?"))? {
            Answer::Yes => return Ok(()),
            Answer::No => {
                return Err(DebseedError::Aborted {
                    reason: format!("'{dest}' was left untouched"),
                });
            }
            Answer::Unclear => {}
        }
    }
}

/// Renders download progress as an updating percentage on stderr.
#[derive(Default)]
struct StderrProgress {
    last_percent: Option<u64>,
}

impl DownloadObserver for StderrProgress {
    fn progress(&mut self, received: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = received.saturating_mul(100) / total;
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);
        eprint!("\r[ {percent:>4}% ] {received} of {total} bytes");
        if received >= total {
            eprintln!();
        }
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            if writeln!(stderr, "error: {err}").is_err() {
                // Best-effort logging; ignore write failures.
            }
            1
        }
    }
}
