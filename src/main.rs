use clap::Parser;
use console::{Term, style};
use humansize::{DECIMAL, format_size};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rezka_grabber::batch::FailedItem;
use rezka_grabber::{
    BatchEvent, Config, DownloadStats, FileDownloader, GrabberError, HttpResolverProvider,
    LinePrompter, Outcome, ProgressEvent, PromptError, Prompter, Session, TerminalPrompter,
    TitleReport, TransferObserver, TransferProgress, logging,
};
use std::io;
use std::path::PathBuf;
use std::process;

/// Interactively download series and movies
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Content URL to process right away
    url: Option<String>,
}

/// Progress bars for running transfers.
struct BarObserver {
    multi: MultiProgress,
}

impl BarObserver {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }

    /// Prints a line without tearing the bars.
    fn println(&self, line: impl AsRef<str>) {
        self.multi.suspend(|| println!("{}", line.as_ref()));
    }
}

struct Bar(ProgressBar);

impl TransferObserver for BarObserver {
    fn begin(&self, label: &str, total: u64) -> Box<dyn TransferProgress + '_> {
        let bar = if total > 0 {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "{prefix:.cyan} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
            );
            bar
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{prefix:.cyan} {spinner} {bytes} ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        };

        let bar = self.multi.add(bar);
        bar.set_prefix(label.to_string());
        Box::new(Bar(bar))
    }
}

impl TransferProgress for Bar {
    fn advance(&self, bytes: u64) {
        self.0.inc(bytes);
    }

    fn finish(&self, success: bool) {
        if success {
            self.0.finish_and_clear();
        } else {
            self.0.abandon();
        }
    }
}

/// Handles progress events and prints formatted output to stdout
fn handle_progress_event(event: ProgressEvent, out: &BarObserver) {
    match event {
        ProgressEvent::Resolving { url } => {
            out.println(format!("\nResolving {}...", url));
        }
        ProgressEvent::Resolved {
            name,
            kind,
            translator_count,
        } => {
            out.println(format!(
                "Found {:?} '{}' with {} translation(s)",
                kind,
                style(name).bold(),
                translator_count
            ));
        }
        ProgressEvent::CatalogBuilt {
            season_count,
            episode_count,
        } => {
            out.println(format!(
                "{} season(s), {} episode(s) in total\n",
                season_count, episode_count
            ));
        }
        ProgressEvent::PartStarted { name, index, total } => {
            out.println(format!(
                "\n=== Part {}/{}: {} ===",
                index + 1,
                total,
                style(name).bold()
            ));
        }
        ProgressEvent::PartFailed { name, reason } => {
            out.println(format!(
                "{} {}: {}",
                style("Skipping part").yellow(),
                name,
                reason
            ));
        }
        ProgressEvent::TranslatorSelected { name } => {
            out.println(format!("Translation: {}", style(name).cyan()));
        }
        ProgressEvent::QualitySelected { quality } => {
            out.println(format!("Quality: {}", style(quality).cyan()));
        }
        ProgressEvent::DownloadStarting { folder, items } => {
            out.println(format!(
                "\nDownloading {} item(s) to {}",
                items,
                folder.display()
            ));
        }
        ProgressEvent::Batch(event) => handle_batch_event(event, out),
        ProgressEvent::Complete {
            titles,
            failed_items,
        } => {
            tracing::debug!(titles, failed_items, "url complete");
        }
    }
}

fn handle_batch_event(event: BatchEvent, out: &BarObserver) {
    match event {
        BatchEvent::RoundStarted { round, items } => {
            if round > 1 {
                out.println(format!("\n=== Retry round {} ({} item(s)) ===", round - 1, items));
            }
        }
        BatchEvent::ItemStarted { item, filename } => {
            out.println(format!("  {} -> {}", item, filename));
        }
        BatchEvent::ItemFinished { item, outcome } => match outcome {
            Outcome::Success => out.println(format!("  {} {}", style("✓").green(), item)),
            Outcome::Failure(reason) => {
                out.println(format!("  {} {}: {}", style("✗").red(), item, reason))
            }
        },
        BatchEvent::RoundFinished {
            succeeded, failed, ..
        } => {
            if failed.is_empty() {
                out.println(format!("{} item(s) done", succeeded));
            } else {
                print_failures(&failed, out);
            }
        }
    }
}

fn print_failures(failed: &[FailedItem], out: &BarObserver) {
    out.println(style(format!("\n{} item(s) failed:", failed.len())).red().to_string());
    for failure in failed {
        out.println(format!("  {}: {}", failure.item, failure.reason));
    }
}

fn print_reports(reports: &[TitleReport], totals: &mut DownloadStats) {
    for entry in reports {
        let failed = entry.report.failed();
        let summary = format!(
            "{}: {} of {} item(s) downloaded",
            entry.title,
            entry.report.succeeded(),
            entry.report.outcomes.len()
        );
        if failed.is_empty() {
            println!("{}", style(summary).green());
        } else {
            println!("{}", style(summary).yellow());
        }
        *totals += entry.report.stats;
    }
}

fn print_totals(totals: &DownloadStats) {
    if totals.attempts == 0 {
        return;
    }
    println!("\n=== Session Summary ===");
    println!("  Attempts:         {}", totals.attempts);
    println!("  Succeeded:        {}", totals.successes);
    println!("  Already present:  {}", totals.skipped_existing);
    println!("  Failed attempts:  {}", totals.failures);
    println!(
        "  Transferred:      {}",
        format_size(totals.bytes_transferred, DECIMAL)
    );
}

enum MenuAction {
    Url(String),
    Settings,
    Quit,
}

fn main_menu(prompter: &mut dyn Prompter) -> Result<MenuAction, PromptError> {
    let options = vec![
        "Enter a URL".to_string(),
        "Settings".to_string(),
        "Quit".to_string(),
    ];

    loop {
        match prompter.choose("\nMain menu:", &options)? {
            0 => {
                let url = prompter.input("Content URL")?;
                if !url.is_empty() {
                    return Ok(MenuAction::Url(url));
                }
            }
            1 => return Ok(MenuAction::Settings),
            _ => return Ok(MenuAction::Quit),
        }
    }
}

/// Lets the user edit settings until they go back; saves after every change.
fn settings_menu(
    config: &mut Config,
    path: Option<&PathBuf>,
    prompter: &mut dyn Prompter,
) -> Result<(), PromptError> {
    loop {
        let mut options: Vec<String> = Config::FIELDS
            .iter()
            .map(|name| {
                let value = config.get_field(name).unwrap_or_default();
                format!("{} = {}", name, value)
            })
            .collect();
        options.push("Back".to_string());

        let choice = prompter.choose("\nSettings:", &options)?;
        let Some(name) = Config::FIELDS.get(choice) else {
            return Ok(());
        };

        let value = prompter.input(&format!("New value for {} (empty clears preferences)", name))?;
        if let Err(e) = config.set_field(name, &value) {
            println!("{}", style(e).red());
            continue;
        }

        match path {
            Some(path) => match config.save(path) {
                Ok(()) => tracing::info!(setting = %name, value = %value, "setting saved"),
                Err(e) => println!("{}", style(format!("Could not save settings: {}", e)).red()),
            },
            None => println!("{}", style("Settings apply to this run only").yellow()),
        }
    }
}

fn load_config() -> (Config, Option<PathBuf>) {
    let path = match Config::default_path() {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("no config location: {}", e);
            return (Config::default(), None);
        }
    };

    match Config::load_or_init(&path) {
        Ok(config) => (config, Some(path)),
        Err(e) => {
            tracing::warn!("using default settings: {}", e);
            eprintln!("Warning: using default settings ({})", e);
            (Config::default(), None)
        }
    }
}

fn process(
    url: &str,
    config: &Config,
    prompter: &mut dyn Prompter,
    bars: &BarObserver,
) -> Result<Vec<TitleReport>, GrabberError> {
    let provider = HttpResolverProvider::new(&config.resolver_url, config.timeout())?;
    let fetcher = FileDownloader::new(config.timeout(), config.chunk_size)?;

    Session::new(&provider, &fetcher, config)
        .with_observer(bars)
        .process_url(url, prompter, |event| handle_progress_event(event, bars))
}

fn run(cli: Cli) -> Result<(), GrabberError> {
    let (mut config, config_path) = load_config();

    let mut prompter: Box<dyn Prompter> = if Term::stdout().is_term() && Term::stderr().is_term() {
        Box::new(TerminalPrompter::new())
    } else {
        Box::new(LinePrompter::new(io::stdin().lock(), io::stdout()))
    };
    let prompter = prompter.as_mut();

    let bars = BarObserver::new();
    let mut totals = DownloadStats::default();
    let mut pending_url = cli.url;

    loop {
        let url = match pending_url.take() {
            Some(url) => url,
            None => match main_menu(prompter) {
                Ok(MenuAction::Url(url)) => url,
                Ok(MenuAction::Settings) => {
                    match settings_menu(&mut config, config_path.as_ref(), prompter) {
                        Err(PromptError::Closed) => break,
                        Err(e) => return Err(e.into()),
                        Ok(()) => {}
                    }
                    continue;
                }
                Ok(MenuAction::Quit) | Err(PromptError::Closed) => break,
                Err(e) => return Err(e.into()),
            },
        };

        tracing::info!(%url, "processing url");

        match process(&url, &config, prompter, &bars) {
            Ok(reports) => {
                println!();
                print_reports(&reports, &mut totals);
            }
            Err(e) if e.is_input_closed() => break,
            Err(e) => {
                tracing::warn!(%url, error = %e, "url not processed");
                println!("{} {}", style("Error:").red().bold(), e);
            }
        }

        if !config.auto_reload {
            break;
        }
    }

    print_totals(&totals);
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable: {}", e);
    }

    if let Err(e) = run(cli) {
        tracing::error!("fatal: {}", e);
        eprintln!("\nError: {}", e);
        process::exit(1);
    }
}
