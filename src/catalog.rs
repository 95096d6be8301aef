//! Season and episode catalog
//!
//! This module holds the per-translator episode availability reported by the
//! content provider and merges it into one canonical season → episode listing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Opaque identifier of one translation variant (audio dub or subtitles).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslatorId(String);

impl TranslatorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TranslatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TranslatorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A single (season, episode) pair.
///
/// Both numbers start at 1. Ordering is by season, then episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpisodeKey {
    /// The season number
    pub season: u32,
    /// The episode number within the season
    pub episode: u32,
}

impl EpisodeKey {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// Episodes available under one translator, grouped by season.
pub type SeasonEpisodes = BTreeMap<u32, BTreeSet<u32>>;

/// Per-translator episode availability.
///
/// Translators keep the order in which they were inserted, which is the order
/// the provider reported them in. Candidate lists derived from this map follow
/// the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatorEpisodeMap {
    entries: Vec<(TranslatorId, SeasonEpisodes)>,
}

impl TranslatorEpisodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds episodes of one season for a translator.
    ///
    /// Calling this repeatedly for the same translator and season merges the
    /// episode sets.
    pub fn insert<I>(&mut self, translator: TranslatorId, season: u32, episodes: I)
    where
        I: IntoIterator<Item = u32>,
    {
        let seasons = match self.entries.iter().position(|(id, _)| *id == translator) {
            Some(index) => &mut self.entries[index].1,
            None => {
                self.entries.push((translator, SeasonEpisodes::new()));
                let last = self.entries.len() - 1;
                &mut self.entries[last].1
            }
        };

        seasons.entry(season).or_default().extend(episodes);
    }

    /// Returns the season map of a translator, if it is known.
    pub fn get(&self, translator: &TranslatorId) -> Option<&SeasonEpisodes> {
        self.entries
            .iter()
            .find(|(id, _)| id == translator)
            .map(|(_, seasons)| seasons)
    }

    /// Iterates over translators and their season maps in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&TranslatorId, &SeasonEpisodes)> {
        self.entries.iter().map(|(id, seasons)| (id, seasons))
    }

    /// Checks whether a translator offers the given episode.
    pub fn covers(&self, translator: &TranslatorId, key: &EpisodeKey) -> bool {
        self.get(translator)
            .and_then(|seasons| seasons.get(&key.season))
            .is_some_and(|episodes| episodes.contains(&key.episode))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical season → episode listing across all translators.
///
/// Episode lists are always ascending and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalCatalog {
    seasons: BTreeMap<u32, Vec<u32>>,
}

impl CanonicalCatalog {
    /// Builds the catalog as the union of every translator's episodes.
    ///
    /// This is a pure data transform. An empty translator map yields an empty
    /// catalog, which the selection step rejects as unavailable.
    pub fn build(translators: &TranslatorEpisodeMap) -> Self {
        let mut merged: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();

        for (_, seasons) in translators.iter() {
            for (season, episodes) in seasons {
                merged
                    .entry(*season)
                    .or_default()
                    .extend(episodes.iter().copied());
            }
        }

        let seasons = merged
            .into_iter()
            .map(|(season, episodes)| (season, episodes.into_iter().collect()))
            .collect();

        Self { seasons }
    }

    /// Season numbers in ascending order.
    pub fn seasons(&self) -> impl Iterator<Item = u32> + '_ {
        self.seasons.keys().copied()
    }

    /// Sorted episode numbers of a season.
    pub fn episodes(&self, season: u32) -> Option<&[u32]> {
        self.seasons.get(&season).map(Vec::as_slice)
    }

    /// Every episode in ascending season, then ascending episode order.
    pub fn all_keys(&self) -> Vec<EpisodeKey> {
        self.seasons
            .iter()
            .flat_map(|(season, episodes)| {
                episodes
                    .iter()
                    .map(move |episode| EpisodeKey::new(*season, *episode))
            })
            .collect()
    }

    pub fn season_count(&self) -> usize {
        self.seasons.len()
    }

    pub fn episode_count(&self) -> usize {
        self.seasons.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.seasons.is_empty()
    }
}
