//! Batch downloads with retry rounds
//!
//! The engine downloads a list of items against one translator and quality.
//! After a full pass every failure is reported, and the caller decides whether
//! the failed subset gets another round. Successful items are never attempted
//! again; there is no limit on the number of rounds.

use crate::catalog::{EpisodeKey, TranslatorId};
use crate::content_resolution::ContentProvider;
use crate::downloader::{
    DownloadStats, FetchSummary, Fetcher, NoProgress, StatsRecorder, TransferObserver,
};
use crate::file_operations::{episode_filename, movie_filename};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

/// One thing to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaItem {
    /// The movie behind the content URL
    Movie,
    /// One episode of a series
    Episode(EpisodeKey),
}

impl MediaItem {
    fn episode(&self) -> Option<EpisodeKey> {
        match self {
            MediaItem::Movie => None,
            MediaItem::Episode(key) => Some(*key),
        }
    }
}

impl fmt::Display for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaItem::Movie => f.write_str("movie"),
            MediaItem::Episode(key) => write!(f, "{}", key),
        }
    }
}

impl From<EpisodeKey> for MediaItem {
    fn from(key: EpisodeKey) -> Self {
        MediaItem::Episode(key)
    }
}

/// Result of the latest attempt at an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

/// An item whose latest attempt failed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub item: MediaItem,
    pub reason: String,
}

/// Progress of a batch, emitted on the caller's thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// A round is about to start
    RoundStarted { round: u32, items: usize },
    /// Work on an item began
    ItemStarted { item: MediaItem, filename: String },
    /// An item reached its outcome for this round
    ItemFinished { item: MediaItem, outcome: Outcome },
    /// A round completed; `failed` lists what is still missing
    RoundFinished {
        round: u32,
        succeeded: usize,
        failed: Vec<FailedItem>,
    },
}

/// What to download and where.
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    /// Content URL passed to the provider when fetching manifests
    pub content_url: &'a str,
    /// Title, used for movie filenames
    pub title: &'a str,
    pub translator: &'a TranslatorId,
    pub quality: &'a str,
    /// Folder receiving the files
    pub destination_dir: &'a Path,
}

impl BatchRequest<'_> {
    /// Deterministic filename of an item.
    pub fn filename(&self, item: MediaItem) -> String {
        match item {
            MediaItem::Movie => movie_filename(self.title, self.quality),
            MediaItem::Episode(key) => episode_filename(key, self.quality),
        }
    }
}

/// Tuning knobs of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Automatic re-attempts of a failed transfer within one round
    pub max_retries: u32,
    /// Parallel downloads per round; 1 downloads strictly in order
    pub workers: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_retries: 0,
            workers: 1,
        }
    }
}

/// Final state of a batch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Latest outcome of every item, in request order
    pub outcomes: Vec<(MediaItem, Outcome)>,
    /// Rounds run, including the first pass
    pub rounds: u32,
    pub stats: DownloadStats,
}

impl BatchReport {
    /// Items still failed when the session ended.
    pub fn failed(&self) -> Vec<FailedItem> {
        collect_failures(&self.outcomes)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == Outcome::Success)
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes
            .iter()
            .all(|(_, outcome)| *outcome == Outcome::Success)
    }
}

fn collect_failures(outcomes: &[(MediaItem, Outcome)]) -> Vec<FailedItem> {
    outcomes
        .iter()
        .filter_map(|(item, outcome)| match outcome {
            Outcome::Failure(reason) => Some(FailedItem {
                item: *item,
                reason: reason.clone(),
            }),
            Outcome::Success => None,
        })
        .collect()
}

/// Why one attempt failed, and whether trying again right away makes sense.
struct AttemptFailure {
    reason: String,
    transient: bool,
}

enum WorkerMessage {
    Started(usize),
    Finished(usize, Outcome),
}

/// Downloads batches of items, tracking failures across retry rounds.
///
/// The engine owns its statistics; they cover every run of this instance and
/// are returned with each report.
pub struct BatchDownloadEngine<'a, P: ?Sized, F: ?Sized> {
    provider: &'a P,
    fetcher: &'a F,
    observer: &'a dyn TransferObserver,
    settings: EngineSettings,
    stats: StatsRecorder,
}

impl<'a, P, F> BatchDownloadEngine<'a, P, F>
where
    P: ContentProvider + Sync + ?Sized,
    F: Fetcher + ?Sized,
{
    pub fn new(provider: &'a P, fetcher: &'a F, settings: EngineSettings) -> Self {
        Self {
            provider,
            fetcher,
            observer: &NoProgress,
            settings,
            stats: StatsRecorder::default(),
        }
    }

    /// Reports transfer progress to `observer`.
    pub fn with_observer(mut self, observer: &'a dyn TransferObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Downloads `items`, offering retry rounds while failures remain
    ///
    /// After every round with failures, `should_retry` receives the failed
    /// items and decides whether they get another round. Events are delivered
    /// to `on_event` on the calling thread.
    pub fn run<R, E>(
        &self,
        request: &BatchRequest<'_>,
        items: &[MediaItem],
        mut should_retry: R,
        mut on_event: E,
    ) -> BatchReport
    where
        R: FnMut(&[FailedItem]) -> bool,
        E: FnMut(BatchEvent),
    {
        let mut round: u32 = 1;
        on_event(BatchEvent::RoundStarted {
            round,
            items: items.len(),
        });
        let first_pass = self.run_round(request, items, &mut on_event);
        let mut outcomes: Vec<(MediaItem, Outcome)> =
            items.iter().copied().zip(first_pass).collect();

        loop {
            let failed = collect_failures(&outcomes);
            on_event(BatchEvent::RoundFinished {
                round,
                succeeded: outcomes.len() - failed.len(),
                failed: failed.clone(),
            });

            if failed.is_empty() {
                break;
            }

            tracing::info!(round, failed = failed.len(), "round finished with failures");

            if !should_retry(&failed) {
                break;
            }

            round += 1;
            let retry_indices: Vec<usize> = outcomes
                .iter()
                .enumerate()
                .filter(|(_, (_, outcome))| matches!(outcome, Outcome::Failure(_)))
                .map(|(index, _)| index)
                .collect();
            let retry_items: Vec<MediaItem> =
                retry_indices.iter().map(|i| outcomes[*i].0).collect();

            on_event(BatchEvent::RoundStarted {
                round,
                items: retry_items.len(),
            });
            let results = self.run_round(request, &retry_items, &mut on_event);

            for (index, outcome) in retry_indices.into_iter().zip(results) {
                outcomes[index].1 = outcome;
            }
        }

        BatchReport {
            outcomes,
            rounds: round,
            stats: self.stats.snapshot(),
        }
    }

    /// One pass over `items`, returning outcomes in the same order.
    fn run_round<E>(
        &self,
        request: &BatchRequest<'_>,
        items: &[MediaItem],
        on_event: &mut E,
    ) -> Vec<Outcome>
    where
        E: FnMut(BatchEvent),
    {
        let workers = self.settings.workers.clamp(1, items.len().max(1));

        if workers == 1 {
            return items
                .iter()
                .map(|item| {
                    on_event(BatchEvent::ItemStarted {
                        item: *item,
                        filename: request.filename(*item),
                    });
                    let outcome = self.attempt(request, *item);
                    on_event(BatchEvent::ItemFinished {
                        item: *item,
                        outcome: outcome.clone(),
                    });
                    outcome
                })
                .collect();
        }

        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();
        let mut outcomes: Vec<Option<Outcome>> = vec![None; items.len()];

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                scope.spawn(move || {
                    loop {
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(item) = items.get(index) else {
                            break;
                        };
                        let _ = tx.send(WorkerMessage::Started(index));
                        let outcome = self.attempt(request, *item);
                        let _ = tx.send(WorkerMessage::Finished(index, outcome));
                    }
                });
            }
            drop(tx);

            for message in rx {
                match message {
                    WorkerMessage::Started(index) => on_event(BatchEvent::ItemStarted {
                        item: items[index],
                        filename: request.filename(items[index]),
                    }),
                    WorkerMessage::Finished(index, outcome) => {
                        on_event(BatchEvent::ItemFinished {
                            item: items[index],
                            outcome: outcome.clone(),
                        });
                        outcomes[index] = Some(outcome);
                    }
                }
            }
        });

        outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| Outcome::Failure("download worker stopped".to_string()))
            })
            .collect()
    }

    /// Attempts one item, re-trying transient transfer failures in place.
    fn attempt(&self, request: &BatchRequest<'_>, item: MediaItem) -> Outcome {
        let mut retries_left = self.settings.max_retries;

        loop {
            self.stats.record_attempt();

            match self.attempt_once(request, item) {
                Ok(summary) => {
                    self.stats.record_success(summary);
                    return Outcome::Success;
                }
                Err(failure) => {
                    self.stats.record_failure();
                    if failure.transient && retries_left > 0 {
                        retries_left -= 1;
                        tracing::warn!(%item, reason = %failure.reason, retries_left, "transfer failed, retrying");
                        continue;
                    }
                    tracing::warn!(%item, reason = %failure.reason, "download failed");
                    return Outcome::Failure(failure.reason);
                }
            }
        }
    }

    fn attempt_once(
        &self,
        request: &BatchRequest<'_>,
        item: MediaItem,
    ) -> Result<FetchSummary, AttemptFailure> {
        let permanent = |reason: String| AttemptFailure {
            reason,
            transient: false,
        };

        let manifest = self
            .provider
            .stream(request.content_url, request.translator, item.episode())
            .map_err(|e| permanent(e.to_string()))?
            .ok_or_else(|| permanent("Stream unavailable".to_string()))?;

        let url = manifest
            .url_for(request.quality)
            .ok_or_else(|| permanent(format!("Quality '{}' unavailable", request.quality)))?;

        let destination = request.destination_dir.join(request.filename(item));
        tracing::debug!(%item, path = %destination.display(), "fetching");

        self.fetcher
            .fetch(url, &destination, self.observer)
            .map_err(|e| AttemptFailure {
                reason: e.to_string(),
                transient: true,
            })
    }
}
