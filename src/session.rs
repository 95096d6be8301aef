//! Processing of one content URL
//!
//! Ties the pieces together: resolve the URL, let the user narrow down what
//! to download, pick translator and quality, then hand everything to the
//! batch engine. Progress is reported through a callback so the library
//! never prints anything itself.

use crate::GrabberError;
use crate::batch::{BatchDownloadEngine, BatchEvent, BatchReport, BatchRequest, MediaItem};
use crate::catalog::{CanonicalCatalog, TranslatorId};
use crate::config::Config;
use crate::content_resolution::{
    ContentKind, ContentProvider, ResolutionError, ResolvedContent, TranslatorInfo,
};
use crate::downloader::{Fetcher, NoProgress, TransferObserver};
use crate::file_operations::content_dir;
use crate::picker::{pick_quality, pick_translator};
use crate::prompt::{PromptError, Prompter, option_at};
use crate::selection::{self, SelectionError, SelectionScope};
use std::path::PathBuf;

/// Progress event emitted while processing a URL
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Resolving a content URL
    Resolving { url: String },

    /// Content resolved
    Resolved {
        name: String,
        kind: ContentKind,
        translator_count: usize,
    },

    /// Catalog built from the translators' episode lists
    CatalogBuilt {
        season_count: usize,
        episode_count: usize,
    },

    /// Working on one part of a franchise
    PartStarted {
        name: String,
        index: usize,
        total: usize,
    },

    /// A part of a franchise could not be processed; the next one follows
    PartFailed { name: String, reason: String },

    /// Translator chosen
    TranslatorSelected { name: String },

    /// Quality chosen
    QualitySelected { quality: String },

    /// Downloads are about to start
    DownloadStarting { folder: PathBuf, items: usize },

    /// Progress of the batch download
    Batch(BatchEvent),

    /// Every title of the URL has been processed
    Complete { titles: usize, failed_items: usize },
}

/// Outcome of one processed title.
#[derive(Debug, Clone)]
pub struct TitleReport {
    /// Title the files were stored under
    pub title: String,
    pub report: BatchReport,
}

/// Collaborators and settings for processing URLs.
pub struct Session<'a, P: ?Sized, F: ?Sized> {
    provider: &'a P,
    fetcher: &'a F,
    config: &'a Config,
    observer: &'a dyn TransferObserver,
}

impl<'a, P, F> Session<'a, P, F>
where
    P: ContentProvider + Sync + ?Sized,
    F: Fetcher + ?Sized,
{
    pub fn new(provider: &'a P, fetcher: &'a F, config: &'a Config) -> Self {
        Self {
            provider,
            fetcher,
            config,
            observer: &NoProgress,
        }
    }

    /// Reports transfer progress of single files to `observer`.
    pub fn with_observer(mut self, observer: &'a dyn TransferObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Processes a content URL from start to finish
    ///
    /// When the content belongs to a franchise with other parts, the user
    /// picks one part or all of them. With all parts, a part that fails to
    /// resolve or select is reported through [`ProgressEvent::PartFailed`]
    /// and processing continues with the next one. If the input closes, the
    /// parts finished so far are returned and the rest are skipped.
    ///
    /// # Returns
    ///
    /// One report per title that reached the download stage
    pub fn process_url<E>(
        &self,
        url: &str,
        prompter: &mut dyn Prompter,
        mut on_event: E,
    ) -> Result<Vec<TitleReport>, GrabberError>
    where
        E: FnMut(ProgressEvent),
    {
        let content = self.resolve(url, &mut on_event)?;

        if content.other_parts.is_empty() {
            let title = content.name.clone();
            let report = self.process_content(url, &title, &content, prompter, &mut on_event)?;
            return Ok(complete(vec![TitleReport { title, report }], &mut on_event));
        }

        // Oldest part first
        let parts: Vec<_> = content.other_parts.iter().rev().cloned().collect();
        let mut options = vec!["All parts".to_string()];
        options.extend(parts.iter().map(|p| p.name.clone()));

        let choice = prompter.choose("Parts of this franchise:", &options)?;

        if choice > 0 {
            let part = option_at(&parts, choice - 1)?;
            let part_content = self.resolve(&part.url, &mut on_event)?;
            let report =
                self.process_content(&part.url, &part.name, &part_content, prompter, &mut on_event)?;
            let reports = vec![TitleReport {
                title: part.name.clone(),
                report,
            }];
            return Ok(complete(reports, &mut on_event));
        }

        let mut reports = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            on_event(ProgressEvent::PartStarted {
                name: part.name.clone(),
                index,
                total: parts.len(),
            });

            let result = match self.resolve(&part.url, &mut on_event) {
                Ok(part_content) => self.process_content(
                    &part.url,
                    &part.name,
                    &part_content,
                    prompter,
                    &mut on_event,
                ),
                Err(e) => Err(e),
            };

            match result {
                Ok(report) => reports.push(TitleReport {
                    title: part.name.clone(),
                    report,
                }),
                // Out of input: keep what was downloaded and skip the rest
                Err(e) if e.is_input_closed() => {
                    tracing::info!(part = %part.name, "input closed, remaining parts skipped");
                    break;
                }
                Err(e) => {
                    tracing::warn!(part = %part.name, error = %e, "part failed");
                    on_event(ProgressEvent::PartFailed {
                        name: part.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(complete(reports, &mut on_event))
    }

    fn resolve<E>(&self, url: &str, on_event: &mut E) -> Result<ResolvedContent, GrabberError>
    where
        E: FnMut(ProgressEvent),
    {
        on_event(ProgressEvent::Resolving {
            url: url.to_string(),
        });

        let content = self.provider.resolve(url)?;
        tracing::info!(name = %content.name, kind = ?content.kind, "content resolved");

        on_event(ProgressEvent::Resolved {
            name: content.name.clone(),
            kind: content.kind,
            translator_count: content.translators.len(),
        });

        Ok(content)
    }

    /// Runs the movie or series flow for already resolved content.
    pub fn process_content<E>(
        &self,
        url: &str,
        title: &str,
        content: &ResolvedContent,
        prompter: &mut dyn Prompter,
        on_event: &mut E,
    ) -> Result<BatchReport, GrabberError>
    where
        E: FnMut(ProgressEvent),
    {
        match content.kind {
            ContentKind::Series => self.process_series(url, title, content, prompter, on_event),
            ContentKind::Movie => self.process_movie(url, title, content, prompter, on_event),
        }
    }

    /// Series flow: scope, candidates, translator, quality probe, download.
    pub fn process_series<E>(
        &self,
        url: &str,
        title: &str,
        content: &ResolvedContent,
        prompter: &mut dyn Prompter,
        on_event: &mut E,
    ) -> Result<BatchReport, GrabberError>
    where
        E: FnMut(ProgressEvent),
    {
        let catalog = CanonicalCatalog::build(&content.episodes);
        if catalog.is_empty() {
            return Err(SelectionError::Unavailable.into());
        }

        on_event(ProgressEvent::CatalogBuilt {
            season_count: catalog.season_count(),
            episode_count: catalog.episode_count(),
        });

        let scope = choose_scope(&catalog, prompter)?;
        let selection = selection::resolve(scope, &catalog, &content.episodes)?;

        let candidates: Vec<TranslatorInfo> = selection
            .candidates
            .iter()
            .map(|id| content.translator_info(id))
            .collect();
        let translator = self.choose_translator(content, &candidates, prompter, on_event)?;

        // Qualities are discovered on the first target
        let probe = self
            .provider
            .stream(url, &translator, selection.targets.first().copied())?
            .ok_or(ResolutionError::StreamUnavailable)?;
        let quality = self.choose_quality(&probe.qualities(), prompter, on_event)?;

        let items: Vec<MediaItem> = selection.targets.iter().copied().map(MediaItem::from).collect();
        Ok(self.download(url, title, &translator, &quality, &items, prompter, on_event))
    }

    /// Movie flow: translator, quality, single-item download.
    pub fn process_movie<E>(
        &self,
        url: &str,
        title: &str,
        content: &ResolvedContent,
        prompter: &mut dyn Prompter,
        on_event: &mut E,
    ) -> Result<BatchReport, GrabberError>
    where
        E: FnMut(ProgressEvent),
    {
        if content.translators.is_empty() {
            return Err(SelectionError::NoCandidates.into());
        }

        let translator = self.choose_translator(content, &content.translators, prompter, on_event)?;

        let manifest = self
            .provider
            .stream(url, &translator, None)?
            .ok_or(ResolutionError::StreamUnavailable)?;
        let quality = self.choose_quality(&manifest.qualities(), prompter, on_event)?;

        Ok(self.download(url, title, &translator, &quality, &[MediaItem::Movie], prompter, on_event))
    }

    fn choose_translator<E>(
        &self,
        content: &ResolvedContent,
        candidates: &[TranslatorInfo],
        prompter: &mut dyn Prompter,
        on_event: &mut E,
    ) -> Result<TranslatorId, GrabberError>
    where
        E: FnMut(ProgressEvent),
    {
        let translator = pick_translator(
            candidates,
            self.config.preferred_translator.as_deref(),
            self.config.auto_select_single_option,
            prompter,
        )?;

        on_event(ProgressEvent::TranslatorSelected {
            name: content.translator_info(&translator).display_name,
        });

        Ok(translator)
    }

    fn choose_quality<E>(
        &self,
        available: &[String],
        prompter: &mut dyn Prompter,
        on_event: &mut E,
    ) -> Result<String, GrabberError>
    where
        E: FnMut(ProgressEvent),
    {
        let quality = pick_quality(
            available,
            self.config.preferred_quality.as_deref(),
            self.config.auto_select_single_option,
            prompter,
        )?;

        on_event(ProgressEvent::QualitySelected {
            quality: quality.clone(),
        });

        Ok(quality)
    }

    #[allow(clippy::too_many_arguments)]
    fn download<E>(
        &self,
        url: &str,
        title: &str,
        translator: &TranslatorId,
        quality: &str,
        items: &[MediaItem],
        prompter: &mut dyn Prompter,
        on_event: &mut E,
    ) -> BatchReport
    where
        E: FnMut(ProgressEvent),
    {
        let folder = content_dir(&self.config.download_dir, title);
        on_event(ProgressEvent::DownloadStarting {
            folder: folder.clone(),
            items: items.len(),
        });

        let request = BatchRequest {
            content_url: url,
            title,
            translator,
            quality,
            destination_dir: &folder,
        };

        let engine = BatchDownloadEngine::new(self.provider, self.fetcher, self.config.engine_settings())
            .with_observer(self.observer);

        let report = engine.run(
            &request,
            items,
            |failed| {
                match prompter.confirm(&format!("Retry {} failed download(s)?", failed.len())) {
                    Ok(answer) => answer,
                    Err(PromptError::Closed) => false,
                    Err(e) => {
                        tracing::warn!(error = %e, "retry question failed, not retrying");
                        false
                    }
                }
            },
            |event| on_event(ProgressEvent::Batch(event)),
        );

        tracing::info!(
            title,
            rounds = report.rounds,
            succeeded = report.succeeded(),
            failed = report.failed().len(),
            "batch finished"
        );

        report
    }
}

fn complete<E>(reports: Vec<TitleReport>, on_event: &mut E) -> Vec<TitleReport>
where
    E: FnMut(ProgressEvent),
{
    on_event(ProgressEvent::Complete {
        titles: reports.len(),
        failed_items: reports.iter().map(|r| r.report.failed().len()).sum(),
    });
    reports
}

/// Asks which seasons or episodes to download
///
/// The first entry of both menus selects everything on that level.
pub fn choose_scope(
    catalog: &CanonicalCatalog,
    prompter: &mut dyn Prompter,
) -> Result<SelectionScope, PromptError> {
    let seasons: Vec<u32> = catalog.seasons().collect();

    let mut options = vec!["All seasons".to_string()];
    options.extend(seasons.iter().map(|season| {
        let count = catalog.episodes(*season).map_or(0, <[u32]>::len);
        format!("Season {}: {} episode(s)", season, count)
    }));

    let choice = prompter.choose("Seasons:", &options)?;
    if choice == 0 {
        return Ok(SelectionScope::AllSeasons);
    }

    let season = *option_at(&seasons, choice - 1)?;
    let episodes = catalog.episodes(season).unwrap_or_default();

    let mut options = vec!["All episodes".to_string()];
    options.extend(episodes.iter().map(|episode| format!("Episode {}", episode)));

    let choice = prompter.choose(&format!("Episodes of season {}:", season), &options)?;
    if choice == 0 {
        return Ok(SelectionScope::WholeSeason(season));
    }

    let episode = *option_at(episodes, choice - 1)?;
    Ok(SelectionScope::SingleEpisode(season, episode))
}
