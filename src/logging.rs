//! Logging init: file under the platform data dir, or fallback to stderr.
//!
//! Console output belongs to the menus, so the regular log goes to a file.

use crate::config::project_dirs;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Name of the log file
const LOG_FILE: &str = "rezka_grabber.log";

/// Filter used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info,rezka_grabber=debug";

/// Errors that can occur while setting up logging
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Failed to determine the data directory location
    #[error("Failed to determine log directory location")]
    LogDirectoryNotFound,

    /// Failed to create the directory or open the file
    #[error("Failed to open log file {path}: {source}")]
    OpenFailed { path: PathBuf, source: io::Error },

    /// A global subscriber was already installed
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Hands every log event its own handle to the log file.
struct LogFile(File);

/// Log file handle, or stderr when the file handle could not be cloned.
enum FileOrStderr {
    File(File),
    Stderr,
}

impl io::Write for FileOrStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileOrStderr::File(f) => f.write(buf),
            FileOrStderr::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileOrStderr::File(f) => f.flush(),
            FileOrStderr::Stderr => io::stderr().lock().flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = FileOrStderr;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(FileOrStderr::File)
            .unwrap_or(FileOrStderr::Stderr)
    }
}

/// Path of the log file.
pub fn log_path() -> Result<PathBuf, LoggingError> {
    let dirs = project_dirs().ok_or(LoggingError::LogDirectoryNotFound)?;
    Ok(dirs.data_local_dir().join(LOG_FILE))
}

/// Initializes structured logging to the log file
///
/// On failure the caller can fall back to [`init_logging_stderr`].
pub fn init_logging() -> Result<PathBuf, LoggingError> {
    let path = log_path()?;
    let open_failed = |source| LoggingError::OpenFailed {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(open_failed)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(open_failed)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(LogFile(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::info!("logging initialized at {}", path.display());

    Ok(path)
}

/// Initializes logging of warnings and errors to stderr only.
pub fn init_logging_stderr() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}
