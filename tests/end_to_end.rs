//! Full URL processing against an in-memory resolver and a recording fetcher.

use rezka_grabber::content_resolution::{OtherPart, StreamManifest, TranslatorInfo};
use rezka_grabber::downloader::{FetchSummary, NoProgress};
use rezka_grabber::file_operations::content_dir;
use rezka_grabber::{
    Config, ContentKind, ContentProvider, EpisodeKey, FetchError, Fetcher, GrabberError,
    LinePrompter, Outcome, ProgressEvent, PromptError, Prompter, ResolutionError, ResolvedContent,
    SelectionError, Session, TranslatorEpisodeMap, TranslatorId, TransferObserver,
};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

struct MemoryProvider {
    contents: HashMap<String, ResolvedContent>,
    qualities: Vec<&'static str>,
    stream_calls: AtomicUsize,
}

impl MemoryProvider {
    fn new(contents: HashMap<String, ResolvedContent>, qualities: Vec<&'static str>) -> Self {
        Self {
            contents,
            qualities,
            stream_calls: AtomicUsize::new(0),
        }
    }

    fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

impl ContentProvider for MemoryProvider {
    fn resolve(&self, url: &str) -> Result<ResolvedContent, ResolutionError> {
        self.contents
            .get(url)
            .cloned()
            .ok_or_else(|| ResolutionError::NotFound(url.to_string()))
    }

    fn stream(
        &self,
        url: &str,
        translator: &TranslatorId,
        episode: Option<EpisodeKey>,
    ) -> Result<Option<StreamManifest>, ResolutionError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let item = episode.map_or_else(|| "movie".to_string(), |key| key.to_string());
        let mut manifest = StreamManifest::new();
        for quality in &self.qualities {
            manifest.push(
                *quality,
                vec![format!("mem://{}/{}/{}/{}", url, translator, item, quality)],
            );
        }
        Ok(Some(manifest))
    }
}

/// Records destinations; fails the first attempt of every URL in `flaky`.
#[derive(Default)]
struct RecordingFetcher {
    fetched: Mutex<Vec<(String, PathBuf)>>,
    flaky: Mutex<HashSet<String>>,
}

impl Fetcher for RecordingFetcher {
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        _observer: &dyn TransferObserver,
    ) -> Result<FetchSummary, FetchError> {
        if self.flaky.lock().unwrap().remove(url) {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: 503,
            });
        }
        self.fetched
            .lock()
            .unwrap()
            .push((url.to_string(), destination.to_path_buf()));
        Ok(FetchSummary::Downloaded { bytes: 10 })
    }
}

impl RecordingFetcher {
    fn destinations(&self) -> Vec<PathBuf> {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .map(|(_, path)| path.clone())
            .collect()
    }
}

fn translator(id: &str, name: &str) -> TranslatorInfo {
    TranslatorInfo {
        id: id.into(),
        display_name: name.to_string(),
        is_premium: false,
    }
}

fn series() -> ResolvedContent {
    let mut episodes = TranslatorEpisodeMap::new();
    episodes.insert("a".into(), 1, [1, 2, 3]);
    episodes.insert("a".into(), 2, [1]);
    episodes.insert("b".into(), 1, [1, 2]);
    episodes.insert("b".into(), 2, [1, 2]);

    ResolvedContent {
        kind: ContentKind::Series,
        name: "Show".to_string(),
        translators: vec![translator("a", "Studio A"), translator("b", "Studio B")],
        episodes,
        other_parts: vec![],
    }
}

fn movie(name: &str) -> ResolvedContent {
    ResolvedContent {
        kind: ContentKind::Movie,
        name: name.to_string(),
        translators: vec![translator("m", "Dub")],
        episodes: TranslatorEpisodeMap::new(),
        other_parts: vec![],
    }
}

fn config(root: &Path) -> Config {
    Config {
        download_dir: root.to_path_buf(),
        preferred_quality: Some("1080p".to_string()),
        max_retries: 0,
        ..Config::default()
    }
}

#[test]
fn test_whole_season_with_single_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let provider = MemoryProvider::new(
        HashMap::from([("https://site/show".to_string(), series())]),
        vec!["720p", "1080p"],
    );
    let fetcher = RecordingFetcher::default();

    // Season 2, all episodes; translator and quality need no question
    let mut prompter = LinePrompter::new(Cursor::new("3\n1\n"), Vec::new());
    let mut events = Vec::new();

    let reports = Session::new(&provider, &fetcher, &config)
        .process_url("https://site/show", &mut prompter, |e| events.push(e))
        .unwrap();

    assert_eq!(reports.len(), 1);
    let report = &reports[0].report;
    assert!(report.is_complete());
    assert_eq!(report.rounds, 1);
    assert_eq!(report.stats.successes, 2);

    let folder = content_dir(dir.path(), "Show");
    assert_eq!(
        fetcher.destinations(),
        vec![
            folder.join("S02E01_1080p.mp4"),
            folder.join("S02E02_1080p.mp4")
        ]
    );
    assert!(fetcher.fetched.lock().unwrap()[0].0.contains("/b/S02E01/1080p"));

    assert!(events.iter().any(
        |e| matches!(e, ProgressEvent::TranslatorSelected { name } if name == "Studio B")
    ));
    assert!(events.iter().any(
        |e| matches!(e, ProgressEvent::QualitySelected { quality } if quality == "1080p")
    ));
}

#[test]
fn test_failed_episode_recovered_in_retry_round() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let provider = MemoryProvider::new(
        HashMap::from([("https://site/show".to_string(), series())]),
        vec!["1080p"],
    );
    let fetcher = RecordingFetcher::default();
    fetcher
        .flaky
        .lock()
        .unwrap()
        .insert("mem://https://site/show/b/S02E02/1080p".to_string());

    // Season 2, all episodes, then yes to the retry question
    let mut prompter = LinePrompter::new(Cursor::new("3\n1\ny\n"), Vec::new());

    let reports = Session::new(&provider, &fetcher, &config)
        .process_url("https://site/show", &mut prompter, |_| {})
        .unwrap();

    let report = &reports[0].report;
    assert!(report.is_complete());
    assert_eq!(report.rounds, 2);
    assert_eq!(report.stats.attempts, 3);
    assert_eq!(report.stats.failures, 1);
    assert_eq!(fetcher.destinations().len(), 2);

    let shown = String::from_utf8(prompter.into_writer()).unwrap();
    assert!(shown.contains("Retry 1 failed download(s)?"));
}

#[test]
fn test_declined_retry_leaves_failure_in_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let provider = MemoryProvider::new(
        HashMap::from([("https://site/show".to_string(), series())]),
        vec!["1080p"],
    );
    let fetcher = RecordingFetcher::default();
    fetcher
        .flaky
        .lock()
        .unwrap()
        .insert("mem://https://site/show/b/S02E01/1080p".to_string());

    let mut prompter = LinePrompter::new(Cursor::new("3\n1\nn\n"), Vec::new());

    let reports = Session::new(&provider, &fetcher, &config)
        .process_url("https://site/show", &mut prompter, |_| {})
        .unwrap();

    let report = &reports[0].report;
    assert_eq!(report.rounds, 1);
    let failed = report.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].item.to_string(), "S02E01");
    assert_eq!(failed[0].reason, "HTTP 503");
    assert!(matches!(report.outcomes[1].1, Outcome::Success));
}

#[test]
fn test_all_parts_continue_after_failed_part() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let mut first = movie("Film 2");
    first.other_parts = vec![
        OtherPart {
            name: "Film 2".to_string(),
            url: "https://site/film-2".to_string(),
        },
        OtherPart {
            name: "Film 1".to_string(),
            url: "https://site/film-1".to_string(),
        },
        OtherPart {
            name: "Lost Film".to_string(),
            url: "https://site/missing".to_string(),
        },
    ];

    let provider = MemoryProvider::new(
        HashMap::from([
            ("https://site/film-2".to_string(), first),
            ("https://site/film-1".to_string(), movie("Film 1")),
        ]),
        vec!["1080p"],
    );
    let fetcher = RecordingFetcher::default();

    // "All parts"
    let mut prompter = LinePrompter::new(Cursor::new("1\n"), Vec::new());
    let mut events = Vec::new();

    let reports = Session::new(&provider, &fetcher, &config)
        .process_url("https://site/film-2", &mut prompter, |e| events.push(e))
        .unwrap();

    let titles: Vec<&str> = reports.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Film 1", "Film 2"]);
    assert!(events.iter().any(
        |e| matches!(e, ProgressEvent::PartFailed { name, .. } if name == "Lost Film")
    ));

    assert_eq!(
        fetcher.destinations(),
        vec![
            content_dir(dir.path(), "Film 1").join("Film 1_1080p.mp4"),
            content_dir(dir.path(), "Film 2").join("Film 2_1080p.mp4"),
        ]
    );

    let shown = String::from_utf8(prompter.into_writer()).unwrap();
    assert!(shown.contains("[2] Lost Film"));
    assert!(shown.contains("[4] Film 2"));
}

#[test]
fn test_unknown_url_is_a_resolution_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let provider = MemoryProvider::new(HashMap::new(), vec![]);
    let fetcher = RecordingFetcher::default();
    let mut prompter = LinePrompter::new(Cursor::new(""), Vec::new());

    let err = Session::new(&provider, &fetcher, &config)
        .with_observer(&NoProgress)
        .process_url("https://site/nothing", &mut prompter, |_| {})
        .unwrap_err();

    assert!(matches!(
        err,
        GrabberError::Resolution(ResolutionError::NotFound(_))
    ));
    assert!(fetcher.destinations().is_empty());
}

#[test]
fn test_closed_input_keeps_finished_parts() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let mut first = movie("Film 1");
    first.other_parts = vec![
        OtherPart {
            name: "Show".to_string(),
            url: "https://site/show".to_string(),
        },
        OtherPart {
            name: "Film 1".to_string(),
            url: "https://site/film-1".to_string(),
        },
    ];

    let provider = MemoryProvider::new(
        HashMap::from([
            ("https://site/film-1".to_string(), first),
            ("https://site/show".to_string(), series()),
        ]),
        vec!["1080p"],
    );
    let fetcher = RecordingFetcher::default();

    // "All parts"; the series part then asks for a season and input ends
    let mut prompter = LinePrompter::new(Cursor::new("1\n"), Vec::new());
    let mut events = Vec::new();

    let reports = Session::new(&provider, &fetcher, &config)
        .process_url("https://site/film-1", &mut prompter, |e| events.push(e))
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].title, "Film 1");
    assert_eq!(reports[0].report.stats.successes, 1);
    assert_eq!(fetcher.destinations().len(), 1);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ProgressEvent::PartFailed { .. }))
    );
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::Complete {
            titles: 1,
            failed_items: 0
        }
    )));
}

#[test]
fn test_no_candidates_stops_before_streams() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let provider = MemoryProvider::new(
        HashMap::from([("https://site/show".to_string(), series())]),
        vec!["1080p"],
    );
    let fetcher = RecordingFetcher::default();

    // All seasons: "a" lacks S02E02 and "b" lacks S01E03
    let mut prompter = LinePrompter::new(Cursor::new("1\n"), Vec::new());

    let err = Session::new(&provider, &fetcher, &config)
        .process_url("https://site/show", &mut prompter, |_| {})
        .unwrap_err();

    assert!(matches!(
        err,
        GrabberError::Selection(SelectionError::NoCandidates)
    ));
    assert_eq!(provider.stream_calls(), 0);
    assert!(fetcher.destinations().is_empty());
}

#[test]
fn test_empty_catalog_is_unavailable_without_prompting() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let mut empty = series();
    empty.episodes = TranslatorEpisodeMap::new();
    let provider = MemoryProvider::new(
        HashMap::from([("https://site/show".to_string(), empty)]),
        vec!["1080p"],
    );
    let fetcher = RecordingFetcher::default();
    let mut prompter = LinePrompter::new(Cursor::new(""), Vec::new());

    let err = Session::new(&provider, &fetcher, &config)
        .process_url("https://site/show", &mut prompter, |_| {})
        .unwrap_err();

    assert!(matches!(
        err,
        GrabberError::Selection(SelectionError::Unavailable)
    ));
    assert_eq!(provider.stream_calls(), 0);
    assert!(prompter.into_writer().is_empty());
}

#[test]
fn test_movie_without_translators_has_no_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let mut untranslated = movie("Film");
    untranslated.translators.clear();
    let provider = MemoryProvider::new(
        HashMap::from([("https://site/film".to_string(), untranslated)]),
        vec!["1080p"],
    );
    let fetcher = RecordingFetcher::default();
    let mut prompter = LinePrompter::new(Cursor::new(""), Vec::new());

    let err = Session::new(&provider, &fetcher, &config)
        .process_url("https://site/film", &mut prompter, |_| {})
        .unwrap_err();

    assert!(matches!(
        err,
        GrabberError::Selection(SelectionError::NoCandidates)
    ));
    assert_eq!(provider.stream_calls(), 0);
    assert!(fetcher.destinations().is_empty());
}

/// Answers menus from a script but cannot ask yes/no questions.
struct BrokenConfirm<P>(P);

impl<P: Prompter> Prompter for BrokenConfirm<P> {
    fn choose(&mut self, title: &str, options: &[String]) -> Result<usize, PromptError> {
        self.0.choose(title, options)
    }

    fn confirm(&mut self, _question: &str) -> Result<bool, PromptError> {
        Err(PromptError::Io(std::io::Error::other("terminal gone")))
    }

    fn input(&mut self, prompt: &str) -> Result<String, PromptError> {
        self.0.input(prompt)
    }
}

#[test]
fn test_failing_retry_question_means_no_retry() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let provider = MemoryProvider::new(
        HashMap::from([("https://site/show".to_string(), series())]),
        vec!["1080p"],
    );
    let fetcher = RecordingFetcher::default();
    fetcher
        .flaky
        .lock()
        .unwrap()
        .insert("mem://https://site/show/b/S02E02/1080p".to_string());

    let mut prompter = BrokenConfirm(LinePrompter::new(Cursor::new("3\n1\n"), Vec::new()));

    let reports = Session::new(&provider, &fetcher, &config)
        .process_url("https://site/show", &mut prompter, |_| {})
        .unwrap();

    let report = &reports[0].report;
    assert_eq!(report.rounds, 1);
    assert_eq!(report.failed().len(), 1);
    assert_eq!(fetcher.destinations().len(), 1);
}
