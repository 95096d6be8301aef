//! Single file downloads
//!
//! This module streams one URL into one file, chunk by chunk, reporting
//! progress to an observer. It never retries on its own; the batch engine
//! decides what happens after a failure.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while downloading a file
#[derive(Debug, Error)]
pub enum FetchError {
    /// Failed to set up the HTTP client
    #[error("Failed to create HTTP client: {0}")]
    Client(reqwest::Error),

    /// The request could not be sent or the connection broke
    #[error("Network error: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    /// The response body could not be read
    #[error("Connection interrupted after {received} bytes: {source}")]
    Interrupted {
        received: u64,
        source: std::io::Error,
    },

    /// The server answered with a non-success status
    #[error("HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Failed to create or write the destination file
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// How a successful fetch was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSummary {
    /// The destination already existed; nothing was transferred
    AlreadyPresent,
    /// The file was downloaded
    Downloaded { bytes: u64 },
}

/// Receives progress of individual transfers.
///
/// Implementations must be shareable between download workers.
pub trait TransferObserver: Sync {
    /// Called when the body of a transfer starts. `total` is the declared
    /// content length, or 0 when the server didn't declare one.
    fn begin(&self, label: &str, total: u64) -> Box<dyn TransferProgress + '_>;
}

/// Progress handle for one running transfer.
pub trait TransferProgress {
    /// Another chunk of `bytes` was written to disk.
    fn advance(&self, bytes: u64);

    /// The transfer ended, successfully or not.
    fn finish(&self, success: bool);
}

/// Observer that ignores all progress.
pub struct NoProgress;

impl TransferObserver for NoProgress {
    fn begin(&self, _label: &str, _total: u64) -> Box<dyn TransferProgress + '_> {
        Box::new(NoProgress)
    }
}

impl TransferProgress for NoProgress {
    fn advance(&self, _bytes: u64) {}

    fn finish(&self, _success: bool) {}
}

/// Something that can bring a URL to a local path.
pub trait Fetcher: Sync {
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        observer: &dyn TransferObserver,
    ) -> Result<FetchSummary, FetchError>;
}

/// Chunked HTTP downloader.
pub struct FileDownloader {
    client: reqwest::blocking::Client,
    chunk_size: usize,
}

impl FileDownloader {
    /// Creates a downloader
    ///
    /// # Arguments
    ///
    /// * `timeout` - Overall request timeout, `None` for no timeout
    /// * `chunk_size` - Size of the read/write buffer in bytes (0 is treated as 1)
    pub fn new(timeout: Option<Duration>, chunk_size: usize) -> Result<Self, FetchError> {
        let mut builder = reqwest::blocking::Client::builder();
        // The blocking client defaults to a 30s timeout; make "none" mean none
        builder = builder.timeout(timeout);
        let client = builder.build().map_err(FetchError::Client)?;

        Ok(Self {
            client,
            chunk_size: chunk_size.max(1),
        })
    }

    fn write_error(path: &Path, source: std::io::Error) -> FetchError {
        FetchError::Write {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Copies the body into the file, one chunk at a time.
    fn copy_chunks(
        &self,
        body: &mut impl Read,
        file: &mut File,
        destination: &Path,
        progress: &dyn TransferProgress,
    ) -> Result<u64, FetchError> {
        let mut buffer = vec![0u8; self.chunk_size];
        let mut received: u64 = 0;

        loop {
            let bytes_read = body
                .read(&mut buffer)
                .map_err(|source| FetchError::Interrupted { received, source })?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(&buffer[..bytes_read])
                .map_err(|e| Self::write_error(destination, e))?;

            received += bytes_read as u64;
            progress.advance(bytes_read as u64);
        }

        file.flush().map_err(|e| Self::write_error(destination, e))?;

        Ok(received)
    }
}

impl Fetcher for FileDownloader {
    /// Downloads `url` into `destination`
    ///
    /// An existing destination counts as a finished earlier download and is
    /// not checked further. On failure the partially written file is removed,
    /// so a later attempt starts from scratch.
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        observer: &dyn TransferObserver,
    ) -> Result<FetchSummary, FetchError> {
        if destination.exists() {
            tracing::debug!(path = %destination.display(), "destination exists, skipping");
            return Ok(FetchSummary::AlreadyPresent);
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| Self::write_error(parent, e))?;
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let mut file = File::create(destination).map_err(|e| Self::write_error(destination, e))?;

        let label = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.to_string());
        let progress = observer.begin(&label, total);

        let result = self.copy_chunks(&mut response, &mut file, destination, progress.as_ref());
        progress.finish(result.is_ok());

        match result {
            Ok(bytes) => {
                tracing::debug!(path = %destination.display(), bytes, "download finished");
                Ok(FetchSummary::Downloaded { bytes })
            }
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(destination);
                Err(e)
            }
        }
    }
}

/// Counters over one or more download sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// Items attempted, counting every automatic and manual retry
    pub attempts: u64,
    /// Items that ended in success
    pub successes: u64,
    /// Attempts that ended in failure
    pub failures: u64,
    /// Bytes written to disk
    pub bytes_transferred: u64,
    /// Successes satisfied by an already existing file
    pub skipped_existing: u64,
}

impl AddAssign for DownloadStats {
    fn add_assign(&mut self, other: Self) {
        self.attempts += other.attempts;
        self.successes += other.successes;
        self.failures += other.failures;
        self.bytes_transferred += other.bytes_transferred;
        self.skipped_existing += other.skipped_existing;
    }
}

/// Thread-safe accumulator behind [`DownloadStats`].
///
/// Updates from concurrent workers may interleave in any order; the totals
/// are exact.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    bytes_transferred: AtomicU64,
    skipped_existing: AtomicU64,
}

impl StatsRecorder {
    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, summary: FetchSummary) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        match summary {
            FetchSummary::AlreadyPresent => {
                self.skipped_existing.fetch_add(1, Ordering::Relaxed);
            }
            FetchSummary::Downloaded { bytes } => {
                self.bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
            }
        }
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DownloadStats {
        DownloadStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            bytes_transferred: self.bytes_transferred.load(Ordering::Relaxed),
            skipped_existing: self.skipped_existing.load(Ordering::Relaxed),
        }
    }
}
