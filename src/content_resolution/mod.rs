/// Data structures and traits for resolving content URLs.
///
/// The site scraping itself lives outside this crate. This module defines the
/// typed records the rest of the crate works with and the trait a resolver
/// has to implement, plus a provider talking to a JSON resolver service.
mod resolver_api;
mod resolver_api_types;

pub use resolver_api::HttpResolverProvider;

use crate::catalog::{EpisodeKey, TranslatorEpisodeMap, TranslatorId};
use thiserror::Error;

/// Errors that can occur while resolving content or stream manifests.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// Request to the resolver failed
    #[error("Request failed: {0}")]
    RequestError(String),

    /// Failed to parse the resolver's JSON response
    #[error("Failed to parse resolver response: {0}")]
    ParseError(String),

    /// The resolver does not know the content
    #[error("Content not found: {0}")]
    NotFound(String),

    /// The resolver returned invalid or unexpected data
    #[error("Resolver returned invalid data: {0}")]
    InvalidData(String),

    /// No stream exists for the chosen translator
    #[error("Stream unavailable")]
    StreamUnavailable,
}

/// Whether a URL points at a movie or a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Movie,
    Series,
}

/// A translation variant as reported by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorInfo {
    /// Identifier passed back when requesting streams
    pub id: TranslatorId,
    /// Human readable name
    pub display_name: String,
    /// Whether the site marks the translation as premium
    pub is_premium: bool,
}

impl TranslatorInfo {
    /// Menu label, with a premium marker where it applies.
    pub fn label(&self) -> String {
        if self.is_premium {
            format!("{} (Premium)", self.display_name)
        } else {
            self.display_name.clone()
        }
    }
}

/// Another part of the same franchise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherPart {
    pub name: String,
    pub url: String,
}

/// Quality → source URLs for one translator (and episode, for series).
///
/// Qualities keep the order the resolver listed them in. Qualities without
/// any URL are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamManifest {
    videos: Vec<(String, Vec<String>)>,
}

impl StreamManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a quality. Empty URL lists are ignored.
    pub fn push(&mut self, quality: impl Into<String>, urls: Vec<String>) {
        if urls.is_empty() {
            return;
        }
        self.videos.push((quality.into(), urls));
    }

    /// Available quality labels in discovery order.
    pub fn qualities(&self) -> Vec<String> {
        self.videos.iter().map(|(quality, _)| quality.clone()).collect()
    }

    /// The URL to download for a quality, i.e. the first one listed.
    pub fn url_for(&self, quality: &str) -> Option<&str> {
        self.videos
            .iter()
            .find(|(q, _)| q == quality)
            .and_then(|(_, urls)| urls.first())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

/// Everything known about a content URL after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub kind: ContentKind,
    /// Display name of the movie or series
    pub name: String,
    /// Translators in the order the resolver listed them
    pub translators: Vec<TranslatorInfo>,
    /// Episode availability per translator (empty for movies)
    pub episodes: TranslatorEpisodeMap,
    /// Other parts of the franchise, as listed by the resolver
    pub other_parts: Vec<OtherPart>,
}

impl ResolvedContent {
    /// Looks up translator details, falling back to the bare id as name.
    pub fn translator_info(&self, id: &TranslatorId) -> TranslatorInfo {
        self.translators
            .iter()
            .find(|t| t.id == *id)
            .cloned()
            .unwrap_or_else(|| TranslatorInfo {
                id: id.clone(),
                display_name: id.to_string(),
                is_premium: false,
            })
    }
}

/// Trait for resolvers that turn content URLs into catalogs and streams.
///
/// Implementors wrap whatever actually talks to the video site.
pub trait ContentProvider {
    /// Resolves a content URL.
    fn resolve(&self, url: &str) -> Result<ResolvedContent, ResolutionError>;

    /// Fetches the stream manifest of a movie (`episode` is `None`) or of
    /// one episode of a series.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the resolver reports the stream as unavailable.
    fn stream(
        &self,
        url: &str,
        translator: &TranslatorId,
        episode: Option<EpisodeKey>,
    ) -> Result<Option<StreamManifest>, ResolutionError>;
}
