//! Download scope resolution
//!
//! Turns the user's choice of scope into the exact list of episodes to fetch
//! and narrows the translators down to those offering every one of them.

use crate::catalog::{CanonicalCatalog, EpisodeKey, TranslatorEpisodeMap, TranslatorId};
use thiserror::Error;

/// Errors that can occur while resolving a selection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// The provider reported no episodes at all
    #[error("No episodes are available for this content")]
    Unavailable,

    /// The requested season is not in the catalog
    #[error("Season {0} not found")]
    SeasonNotFound(u32),

    /// The requested episode is not in the catalog
    #[error("Episode {episode} of season {season} not found")]
    EpisodeNotFound { season: u32, episode: u32 },

    /// No translator offers every requested episode
    #[error("No translation covers all of the selected episodes")]
    NoCandidates,
}

/// What the user asked to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionScope {
    /// Every episode of every season
    AllSeasons,
    /// Every episode of one season
    WholeSeason(u32),
    /// Exactly one episode
    SingleEpisode(u32, u32),
}

/// Episodes to fetch, ascending.
pub type DownloadTarget = Vec<EpisodeKey>;

/// The outcome of resolving a scope against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Episodes to download, ascending
    pub targets: DownloadTarget,
    /// Translators offering every target, in provider order
    pub candidates: Vec<TranslatorId>,
}

/// Resolves a scope into download targets and translator candidates
///
/// Fails before anything else happens if the catalog is empty, if the scope
/// names a season or episode the catalog doesn't contain, or if no translator
/// covers the full target list.
pub fn resolve(
    scope: SelectionScope,
    catalog: &CanonicalCatalog,
    translators: &TranslatorEpisodeMap,
) -> Result<Selection, SelectionError> {
    if catalog.is_empty() {
        return Err(SelectionError::Unavailable);
    }

    let targets = targets_for(scope, catalog)?;
    let candidates = filter_candidates(&targets, translators);

    if candidates.is_empty() {
        return Err(SelectionError::NoCandidates);
    }

    tracing::debug!(
        targets = targets.len(),
        candidates = candidates.len(),
        ?scope,
        "selection resolved"
    );

    Ok(Selection {
        targets,
        candidates,
    })
}

fn targets_for(
    scope: SelectionScope,
    catalog: &CanonicalCatalog,
) -> Result<Vec<EpisodeKey>, SelectionError> {
    match scope {
        SelectionScope::AllSeasons => Ok(catalog.all_keys()),
        SelectionScope::WholeSeason(season) => {
            let episodes = catalog
                .episodes(season)
                .ok_or(SelectionError::SeasonNotFound(season))?;
            Ok(episodes
                .iter()
                .map(|episode| EpisodeKey::new(season, *episode))
                .collect())
        }
        SelectionScope::SingleEpisode(season, episode) => {
            let found = catalog
                .episodes(season)
                .is_some_and(|episodes| episodes.binary_search(&episode).is_ok());
            if !found {
                return Err(SelectionError::EpisodeNotFound { season, episode });
            }
            Ok(vec![EpisodeKey::new(season, episode)])
        }
    }
}

/// Keeps the translators that offer every target episode.
pub fn filter_candidates(
    targets: &[EpisodeKey],
    translators: &TranslatorEpisodeMap,
) -> Vec<TranslatorId> {
    translators
        .iter()
        .filter(|(id, _)| targets.iter().all(|key| translators.covers(id, key)))
        .map(|(id, _)| id.clone())
        .collect()
}
