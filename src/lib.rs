//! Rezka Grabber - Interactive batch downloader for series and movies
//!
//! This library resolves a content URL into translators, seasons and
//! episodes, lets the user narrow down what to fetch, and downloads the
//! chosen episodes with user-driven retry rounds.

pub mod batch;
pub mod catalog;
pub mod config;
pub mod content_resolution;
pub mod downloader;
pub mod file_operations;
pub mod logging;
pub mod picker;
pub mod prompt;
pub mod selection;
pub mod session;

// Re-export error types
pub use config::ConfigError;
pub use content_resolution::ResolutionError;
pub use downloader::FetchError;
pub use logging::LoggingError;
pub use picker::PickError;
pub use prompt::{InvalidChoice, PromptError};
pub use selection::{DownloadTarget, SelectionError};

// Re-export the types most callers need
pub use batch::{BatchDownloadEngine, BatchEvent, BatchReport, EngineSettings, MediaItem, Outcome};
pub use catalog::{CanonicalCatalog, EpisodeKey, TranslatorEpisodeMap, TranslatorId};
pub use config::Config;
pub use content_resolution::{ContentKind, ContentProvider, HttpResolverProvider, ResolvedContent};
pub use downloader::{DownloadStats, Fetcher, FileDownloader, TransferObserver, TransferProgress};
pub use prompt::{LinePrompter, Prompter, TerminalPrompter};
pub use session::{ProgressEvent, Session, TitleReport};

use thiserror::Error;

/// Top-level error type for Rezka Grabber operations
///
/// Individual download failures are not errors; they end up as
/// [`Outcome::Failure`] entries of a [`BatchReport`].
#[derive(Debug, Error)]
pub enum GrabberError {
    /// Error while resolving content or a stream
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Nothing to download for the chosen scope
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    /// Translator or quality could not be picked
    #[error("{0}")]
    Pick(#[from] PickError),

    /// Error while asking the user
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    /// Error while setting up the downloader
    #[error("Download error: {0}")]
    Fetch(#[from] FetchError),

    /// Error while loading or saving the configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl GrabberError {
    /// Whether the input ran out, in which case nobody is left to answer.
    pub fn is_input_closed(&self) -> bool {
        matches!(
            self,
            GrabberError::Prompt(PromptError::Closed)
                | GrabberError::Pick(PickError::Prompt(PromptError::Closed))
        )
    }
}
