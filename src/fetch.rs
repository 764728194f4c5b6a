//! HTTP file download with optional progress reporting.
//!
//! Downloads stream the response body to disk in fixed-size chunks when the
//! server reports a content length, reporting proportional progress per
//! chunk. Without a content length the whole body is buffered and written
//! once, with no progress reporting.
//!
//! A failure mid-stream must not leave a file that looks complete: the
//! partial file is removed before the error propagates.

use crate::error::{DebseedError, Result};
use camino::Utf8Path;
use std::fs;
use std::io::{Read, Write};
use std::sync::OnceLock;
use std::time::Duration;

/// Fixed chunk size for streamed downloads.
const CHUNK_SIZE: usize = 4096;
/// Connection timeout; the body itself may take as long as it takes.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Receives proportional progress while a download streams.
pub trait DownloadObserver {
    /// Called after each chunk with total bytes received and the reported
    /// content length.
    fn progress(&mut self, received: u64, total: u64);
}

/// Trait for downloading a remote file to a local path.
///
/// Abstraction allows tests to exercise the acquisition workflow without
/// network access.
pub trait FileFetcher {
    /// Downloads `url` to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`DebseedError::Precondition`] if the destination's parent
    /// directory does not exist, [`DebseedError::ResourceConflict`] if the
    /// destination itself already exists (both checked before any network
    /// request), or [`DebseedError::Download`] / I/O errors for transfer
    /// failures.
    fn fetch(
        &self,
        url: &str,
        dest: &Utf8Path,
        observer: Option<&mut dyn DownloadObserver>,
    ) -> Result<()>;
}

/// HTTP-based fetcher using `ureq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

impl FileFetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        dest: &Utf8Path,
        observer: Option<&mut dyn DownloadObserver>,
    ) -> Result<()> {
        check_destination(dest)?;

        let response = http_agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;

        let total = response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let mut body = response.into_body();
        let reader = body.as_reader();

        match total {
            Some(total) => stream_to_file(reader, dest, total, observer),
            None => buffer_to_file(reader, dest, url),
        }
    }
}

/// Destination checks run before any network request.
fn check_destination(dest: &Utf8Path) -> Result<()> {
    let parent_exists = dest.parent().is_some_and(Utf8Path::is_dir);
    if !parent_exists {
        return Err(DebseedError::Precondition {
            reason: format!("no such directory: '{}'", dest.parent().unwrap_or(dest)),
        });
    }
    if dest.exists() {
        return Err(DebseedError::ResourceConflict {
            path: dest.to_owned(),
        });
    }
    Ok(())
}

/// Streams the body to `dest` in fixed-size chunks, reporting progress.
///
/// On any failure the partial file is removed before the error propagates.
fn stream_to_file(
    mut reader: impl Read,
    dest: &Utf8Path,
    total: u64,
    mut observer: Option<&mut dyn DownloadObserver>,
) -> Result<()> {
    let mut copy = |reader: &mut dyn Read| -> std::io::Result<()> {
        let mut file = fs::File::create(dest)?;
        let mut buffer = [0u8; CHUNK_SIZE];
        let mut received: u64 = 0;
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            file.write_all(&buffer[..bytes_read])?;
            received += bytes_read as u64;
            if let Some(observer) = observer.as_deref_mut() {
                observer.progress(received, total);
            }
        }
        file.flush()
    };

    if let Err(e) = copy(&mut reader) {
        let _ = fs::remove_file(dest);
        return Err(e.into());
    }
    Ok(())
}

/// Buffers the entire body in memory and writes it in one operation.
///
/// Used when the server reports no content length; progress cannot be
/// made proportional, so none is reported.
fn buffer_to_file(mut reader: impl Read, dest: &Utf8Path, url: &str) -> Result<()> {
    log::debug!("no content-length for {url}; buffering whole body");
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| DebseedError::Download {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
    fs::write(dest, bytes)?;
    Ok(())
}

/// Shared `ureq` agent with connection timeout configuration.
pub(crate) fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Maps a ureq error to a [`DebseedError::Download`].
pub(crate) fn map_ureq_error(url: &str, err: &ureq::Error) -> DebseedError {
    DebseedError::Download {
        url: url.to_owned(),
        reason: err.to_string(),
    }
}
