//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use oireachtas_core::{FlattenSummary, HarvestResult, ProgressReporter, SourceSummary};
use oireachtas_flatten::RecordReader;
use oireachtas_shared::{
    AppConfig, Delimiter, FlattenConfig, HarvestOptions, SourceKind, init_config, load_config,
    validate_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Oireachtas corpus builder.
#[derive(Parser)]
#[command(
    name = "oireachtas",
    version,
    about = "Harvest Oireachtas debates into one XML corpus and flatten it into rows.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// List, download, and assemble documents into one corpus.
    Harvest {
        /// Sources to harvest (dail, seanad, committee, questions). Defaults to
        /// every source enabled in the config.
        #[arg(short, long = "source")]
        sources: Vec<String>,

        /// First date to request, overriding every selected source (YYYY-MM-DD).
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last date to request (YYYY-MM-DD).
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Stop each source after this many unique documents.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Concurrent downloads.
        #[arg(short, long)]
        workers: Option<u32>,

        /// Download directory.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Output corpus path.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Flatten a corpus into a delimited file, one row per utterance.
    Flatten {
        /// Corpus to read (defaults to the cached prebuilt corpus).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file.
        #[arg(short, long, default_value = "debates_all.csv")]
        out: PathBuf,

        /// Write tab-separated output.
        #[arg(long)]
        tsv: bool,

        /// Download the prebuilt corpus first when the input is missing.
        #[arg(long)]
        fetch: bool,
    },

    /// Download the prebuilt corpus unless it is already cached.
    FetchCorpus {
        /// Source URL (defaults to `corpus.url`).
        #[arg(long)]
        url: Option<String>,

        /// Destination (defaults to `corpus.cache_path`).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Merge corpus slices into one corpus, in the order given.
    Merge {
        /// Corpus slices.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output corpus path.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Show the structure of the first records of a corpus.
    Inspect {
        /// Corpus to read (defaults to the cached prebuilt corpus).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Number of typed records to show.
        #[arg(short = 'n', long, default_value = "3")]
        count: usize,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "oireachtas=info",
        1 => "oireachtas=debug",
        _ => "oireachtas=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Harvest {
            sources,
            from,
            to,
            limit,
            workers,
            data_dir,
            out,
        } => {
            let overrides = HarvestOverrides {
                sources,
                from,
                to,
                limit,
                workers,
                data_dir,
                out,
            };
            cmd_harvest(overrides).await
        }
        Command::Flatten {
            input,
            out,
            tsv,
            fetch,
        } => cmd_flatten(input, &out, tsv, fetch).await,
        Command::FetchCorpus { url, out } => cmd_fetch_corpus(url, out).await,
        Command::Merge { inputs, out } => cmd_merge(&inputs, &out),
        Command::Inspect { input, count } => cmd_inspect(input, count),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// harvest
// ---------------------------------------------------------------------------

/// Flag values layered over the file config for one harvest.
struct HarvestOverrides {
    sources: Vec<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: Option<usize>,
    workers: Option<u32>,
    data_dir: Option<PathBuf>,
    out: Option<PathBuf>,
}

impl HarvestOverrides {
    fn apply(self, config: &mut AppConfig) -> Result<()> {
        if !self.sources.is_empty() {
            let selected = self
                .sources
                .iter()
                .map(|s| s.parse::<SourceKind>())
                .collect::<std::result::Result<Vec<_>, _>>()?;
            for kind in SourceKind::ALL {
                config.sources.window_mut(kind).enabled = selected.contains(&kind);
            }
        }

        for kind in SourceKind::ALL {
            let window = config.sources.window_mut(kind);
            if let Some(from) = self.from {
                window.date_start = from;
            }
            if let Some(to) = self.to {
                window.date_end = to;
            }
        }

        if let Some(limit) = self.limit {
            config.harvest.max_per_source = Some(limit);
        }
        if let Some(workers) = self.workers {
            config.harvest.max_workers = workers;
        }
        if let Some(dir) = self.data_dir {
            config.harvest.data_dir = dir.to_string_lossy().into_owned();
        }
        if let Some(out) = self.out {
            config.harvest.corpus_path = out.to_string_lossy().into_owned();
        }

        validate_config(config)?;
        Ok(())
    }
}

async fn cmd_harvest(overrides: HarvestOverrides) -> Result<()> {
    let mut config = load_config()?;
    overrides.apply(&mut config)?;

    let opts = HarvestOptions::from(&config);
    info!(
        api = %opts.api_base,
        workers = opts.max_workers,
        limit = ?opts.max_per_source,
        "starting harvest"
    );

    let reporter = CliProgress::new();
    let result = oireachtas_core::harvest(&opts, &config.sources, &reporter).await?;
    print_harvest(&result);
    Ok(())
}

fn source_row(s: &SourceSummary) -> String {
    format!(
        "  {:<10} {:>8} {:>6} {:>9} {:>10} {:>7} {:>10}",
        s.kind.to_string(),
        s.listed,
        s.duplicates,
        s.unusable,
        s.downloaded,
        s.failed,
        s.collisions
    )
}

fn print_harvest(result: &HarvestResult) {
    println!();
    println!("  Harvest complete ({})", result.run_id);
    println!(
        "  {:<10} {:>8} {:>6} {:>9} {:>10} {:>7} {:>10}",
        "source", "listed", "dupes", "unusable", "downloaded", "failed", "collisions"
    );
    for s in &result.sources {
        println!("{}", source_row(s));
        if let Some(err) = &s.listing_error {
            println!("  {:<10} listing stopped early: {err}", "");
        }
    }
    println!("  Records:  {}", result.corpus.records);
    if !result.corpus.skipped.is_empty() {
        println!("  Unreadable documents: {}", result.corpus.skipped.len());
    }
    println!("  Corpus:   {}", result.corpus.output.display());
    println!("  Elapsed:  {:.1}s", result.elapsed.as_secs_f64());
}

// ---------------------------------------------------------------------------
// flatten / fetch-corpus / merge / inspect
// ---------------------------------------------------------------------------

async fn cmd_flatten(input: Option<PathBuf>, out: &Path, tsv: bool, fetch: bool) -> Result<()> {
    let config = load_config()?;
    let corpus = input.unwrap_or_else(|| PathBuf::from(&config.corpus.cache_path));

    if !corpus.exists() {
        if !fetch {
            return Err(eyre!(
                "corpus not found at {} (run `oireachtas fetch-corpus` or pass --fetch)",
                corpus.display()
            ));
        }
        oireachtas_harvester::ensure_cached(
            &config.corpus.url,
            &corpus,
            config.harvest.download_timeout_secs,
        )
        .await?;
    }

    let flatten_config = FlattenConfig {
        delimiter: if tsv { Delimiter::Tab } else { config.flatten.delimiter },
        ..config.flatten.clone()
    };

    let reporter = CliProgress::new();
    let summary = oireachtas_core::flatten_to_file(&corpus, out, &flatten_config, &reporter)?;
    print_flatten(&summary);
    Ok(())
}

fn print_flatten(summary: &FlattenSummary) {
    let stats = &summary.stats;
    println!();
    println!("  Flatten complete");
    println!("  Records:           {}", stats.records);
    println!("  Untyped skipped:   {}", stats.untyped);
    println!("  No legal document: {}", stats.missing_document);
    println!("  Malformed:         {}", stats.malformed);
    for (element_type, count) in &stats.rows {
        println!("  {:<18} {count}", format!("{element_type} rows:"));
    }
    println!("  Rows written:      {}", summary.rows_written);
    if let Some(reason) = &stats.aborted {
        println!("  Stopped early:     {reason}");
    }
    println!("  Output:            {}", summary.output.display());
    println!("  Elapsed:           {:.1}s", summary.elapsed.as_secs_f64());
}

async fn cmd_fetch_corpus(url: Option<String>, out: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let url = url.unwrap_or_else(|| config.corpus.url.clone());
    let path = out.unwrap_or_else(|| PathBuf::from(&config.corpus.cache_path));

    let spinner = CliProgress::new();
    spinner.phase(&format!("Fetching {url}"));
    let downloaded =
        oireachtas_harvester::ensure_cached(&url, &path, config.harvest.download_timeout_secs)
            .await;
    spinner.done("");

    if downloaded? {
        println!("Corpus downloaded to: {}", path.display());
    } else {
        println!("Using cached corpus: {}", path.display());
    }
    Ok(())
}

fn cmd_merge(inputs: &[PathBuf], out: &Path) -> Result<()> {
    let result = oireachtas_core::merge_corpora(inputs, out)?;
    println!(
        "Merged {} slices ({} empty) into {}",
        result.merged,
        result.empty,
        result.output.display()
    );
    Ok(())
}

fn cmd_inspect(input: Option<PathBuf>, count: usize) -> Result<()> {
    let config = load_config()?;
    let corpus = input.unwrap_or_else(|| PathBuf::from(&config.corpus.cache_path));

    let mut reader = RecordReader::from_path(&corpus, &config.flatten.record_tag)?;
    let summaries = oireachtas_flatten::inspect(&mut reader, count)?;

    if summaries.is_empty() {
        println!("No typed records found in {}", corpus.display());
        return Ok(());
    }

    for s in &summaries {
        println!(
            "#{} {} {}",
            s.index,
            s.source_type.as_deref().unwrap_or("?"),
            s.date
        );
        match s.strategy {
            Some(strategy) => {
                println!("  document ({strategy}): {}", s.document_children.join(", "));
                if !s.debate_children.is_empty() {
                    println!("  debate: {}", s.debate_children.join(", "));
                }
            }
            None => println!("  no legal document"),
        }
        let rows: Vec<String> = s.rows.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("  rows: {}", if rows.is_empty() { "none".into() } else { rows.join(" ") });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_listed(&self, kind: SourceKind, references: usize) {
        self.spinner
            .println(format!("  {kind}: {references} documents listed"));
    }

    fn source_downloaded(&self, kind: SourceKind, downloaded: usize, total: usize) {
        self.spinner
            .println(format!("  {kind}: downloaded {downloaded}/{total}"));
    }

    fn rows_written(&self, rows: usize) {
        self.spinner.set_message(format!("Flattening corpus ({rows} rows)"));
    }

    fn done(&self, _message: &str) {
        self.spinner.finish_and_clear();
    }
}
