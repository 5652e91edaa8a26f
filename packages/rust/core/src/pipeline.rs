//! End-to-end workflows: `harvest` (listing → download → assemble) and
//! `flatten` (corpus → rows → sink).

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};
use uuid::Uuid;

use oireachtas_flatten::{FlattenStats, Flattener, RecordReader};
use oireachtas_harvester::Downloader;
use oireachtas_listing::{ListingOptions, ListingRequest};
use oireachtas_shared::{FlattenConfig, HarvestOptions, Result, SourceKind, SourcesConfig};

use crate::assembler::{self, AssembleResult};
use crate::sink::{DelimitedSink, RowSink};

/// Rows between progress callbacks while flattening.
const ROW_PROGRESS_INTERVAL: usize = 10_000;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after one source's listing has been paged through.
    fn source_listed(&self, kind: SourceKind, references: usize);
    /// Called after one source's documents have been downloaded.
    fn source_downloaded(&self, kind: SourceKind, downloaded: usize, total: usize);
    /// Called periodically with the number of rows written so far.
    fn rows_written(&self, rows: usize);
    /// Called when the pipeline completes.
    fn done(&self, message: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_listed(&self, _kind: SourceKind, _references: usize) {}
    fn source_downloaded(&self, _kind: SourceKind, _downloaded: usize, _total: usize) {}
    fn rows_written(&self, _rows: usize) {}
    fn done(&self, _message: &str) {}
}

// ---------------------------------------------------------------------------
// Harvest
// ---------------------------------------------------------------------------

/// Per-source counts for one harvest run.
#[derive(Debug, Clone)]
pub struct SourceSummary {
    pub kind: SourceKind,
    /// Unique references listed.
    pub listed: usize,
    /// Listing items dropped as already seen.
    pub duplicates: usize,
    /// Listing items with no usable locator.
    pub unusable: usize,
    pub downloaded: usize,
    pub failed: usize,
    /// References skipped because their file name was already taken.
    pub collisions: usize,
    /// Error that cut the listing short, if any.
    pub listing_error: Option<String>,
}

/// Result of the `harvest` pipeline.
#[derive(Debug, Clone)]
pub struct HarvestResult {
    pub run_id: Uuid,
    pub sources: Vec<SourceSummary>,
    pub corpus: AssembleResult,
    pub elapsed: Duration,
}

/// Run the full harvest.
///
/// 1. Page each enabled source's listing
/// 2. Download its documents into `data_dir/<source>/`
/// 3. Assemble everything into one corpus at `corpus_path`
///
/// A listing or download problem for one source is reported in its
/// [`SourceSummary`] and does not stop the others.
#[instrument(skip_all, fields(data_dir = %opts.data_dir.display()))]
pub async fn harvest(
    opts: &HarvestOptions,
    sources: &SourcesConfig,
    progress: &dyn ProgressReporter,
) -> Result<HarvestResult> {
    let start = Instant::now();
    let run_id = Uuid::now_v7();
    info!(%run_id, "starting harvest");

    let listing_opts = ListingOptions::from(opts);
    let downloader = Downloader::new(opts.max_workers, opts.download_timeout_secs)?;

    let mut summaries = Vec::new();
    let mut documents = Vec::new();

    for kind in SourceKind::ALL {
        let window = sources.window(kind);
        if !window.enabled {
            info!(source = %kind, "source disabled, skipping");
            continue;
        }

        progress.phase(&format!("Listing {kind}"));
        let request = ListingRequest::for_source(kind, window);
        let listing = oireachtas_listing::fetch_all(request, &listing_opts).await?;
        progress.source_listed(kind, listing.references.len());

        progress.phase(&format!("Downloading {kind}"));
        let dest = opts.data_dir.join(kind.dir_name());
        let report = downloader.download_all(&listing.references, &dest).await?;
        progress.source_downloaded(kind, report.documents.len(), listing.references.len());

        let summary = SourceSummary {
            kind,
            listed: listing.references.len(),
            duplicates: listing.stats.duplicates,
            unusable: listing.stats.unusable,
            downloaded: report.documents.len(),
            failed: report.failures.len(),
            collisions: report.collisions.len(),
            listing_error: listing.error,
        };
        info!(
            %run_id,
            source = %kind,
            listed = summary.listed,
            downloaded = summary.downloaded,
            failed = summary.failed,
            collisions = summary.collisions,
            "source harvested"
        );

        summaries.push(summary);
        documents.extend(report.documents);
    }

    progress.phase("Assembling corpus");
    let corpus = assembler::assemble(&documents, &opts.corpus_path)?;

    let result = HarvestResult {
        run_id,
        sources: summaries,
        corpus,
        elapsed: start.elapsed(),
    };

    progress.done(&format!(
        "{} records in {}",
        result.corpus.records,
        result.corpus.output.display()
    ));

    info!(
        %run_id,
        records = result.corpus.records,
        elapsed_ms = result.elapsed.as_millis(),
        "harvest complete"
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// Flatten
// ---------------------------------------------------------------------------

/// Result of the `flatten` pipeline.
#[derive(Debug, Clone)]
pub struct FlattenSummary {
    pub output: PathBuf,
    pub stats: FlattenStats,
    pub rows_written: usize,
    pub elapsed: Duration,
}

/// Stream every row of `flattener` into `sink`.
///
/// A sink error is fatal; parse problems are counted in the returned stats.
pub fn flatten_into<R: BufRead>(
    flattener: &mut Flattener<R>,
    sink: &mut dyn RowSink,
    progress: &dyn ProgressReporter,
) -> Result<FlattenStats> {
    for row in flattener.by_ref() {
        sink.write_row(&row)?;
        let written = sink.rows_written();
        if written % ROW_PROGRESS_INTERVAL == 0 {
            progress.rows_written(written);
        }
    }
    sink.finish()?;
    progress.rows_written(sink.rows_written());

    let stats = flattener.stats().clone();
    if let Some(reason) = &stats.aborted {
        warn!(%reason, "flatten ended before the end of the corpus");
    }
    Ok(stats)
}

/// Flatten the corpus at `corpus` into a delimited file at `output`.
#[instrument(skip_all, fields(corpus = %corpus.display(), output = %output.display()))]
pub fn flatten_to_file(
    corpus: &Path,
    output: &Path,
    config: &FlattenConfig,
    progress: &dyn ProgressReporter,
) -> Result<FlattenSummary> {
    let start = Instant::now();

    progress.phase("Flattening corpus");
    let mut flattener = Flattener::from_reader(RecordReader::from_path(corpus, &config.record_tag)?);
    let mut sink = DelimitedSink::create(output, config.delimiter)?;

    let stats = flatten_into(&mut flattener, &mut sink, progress)?;

    let summary = FlattenSummary {
        output: output.to_path_buf(),
        rows_written: sink.rows_written(),
        stats,
        elapsed: start.elapsed(),
    };

    progress.done(&format!(
        "{} rows from {} records",
        summary.rows_written, summary.stats.records
    ));

    info!(
        records = summary.stats.records,
        rows = summary.rows_written,
        untyped = summary.stats.untyped,
        missing_document = summary.stats.missing_document,
        malformed = summary.stats.malformed,
        elapsed_ms = summary.elapsed.as_millis(),
        "flatten complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oireachtas_shared::{Chamber, Delimiter};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("oir-pipeline-{}", Uuid::now_v7()))
    }

    fn options(server: &MockServer, dir: &Path) -> HarvestOptions {
        HarvestOptions {
            api_base: server.uri(),
            page_size: 50,
            listing_timeout_secs: 5,
            max_workers: 2,
            download_timeout_secs: 5,
            max_per_source: None,
            data_dir: dir.join("data"),
            corpus_path: dir.join("all_debates.xml"),
        }
    }

    fn only_dail() -> SourcesConfig {
        let mut sources = SourcesConfig::default();
        sources.seanad.enabled = false;
        sources.committee.enabled = false;
        sources.written_questions.enabled = false;
        sources
    }

    #[tokio::test]
    async fn harvest_then_flatten() {
        let server = MockServer::start().await;
        let uri = server.uri();

        let item = |date: &str, name: &str| {
            json!({ "debateRecord": { "date": date, "formats": { "xml": { "uri": format!("{uri}/akn/{name}.xml") } } } })
        };

        Mock::given(method("GET"))
            .and(path("/debates"))
            .and(query_param("chamber", "dail"))
            .and(query_param("skip", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    item("2024-01-10", "a"),
                    item("2024-01-11", "b"),
                    item("2024-01-11", "b"),
                    item("2024-01-12", "missing"),
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/debates"))
            .and(query_param("skip", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(&server)
            .await;

        let doc = |text: &str| {
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<akomaNtoso><debate><debateBody><debateSection eId="s1"><summary>{text}</summary></debateSection></debateBody></debate></akomaNtoso>"#
            )
        };
        Mock::given(method("GET"))
            .and(path("/akn/a.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(doc("First sitting")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/akn/b.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(doc("Second sitting")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/akn/missing.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = temp_dir();
        let opts = options(&server, &dir);
        let result = harvest(&opts, &only_dail(), &SilentProgress).await.unwrap();

        assert_eq!(result.sources.len(), 1);
        let dail = &result.sources[0];
        assert_eq!(dail.kind, SourceKind::House(Chamber::Dail));
        assert_eq!(dail.listed, 3);
        assert_eq!(dail.duplicates, 1);
        assert_eq!(dail.downloaded, 2);
        assert_eq!(dail.failed, 1);
        assert!(dail.listing_error.is_none());
        assert_eq!(result.corpus.records, 2);
        assert!(opts.data_dir.join("dail_debates").join("2024-01-10.xml").exists());

        let output = dir.join("rows.csv");
        let config = FlattenConfig {
            delimiter: Delimiter::Comma,
            ..FlattenConfig::default()
        };
        let summary = flatten_to_file(&opts.corpus_path, &output, &config, &SilentProgress).unwrap();

        assert_eq!(summary.stats.records, 2);
        assert_eq!(summary.rows_written, 2);
        let csv = std::fs::read_to_string(&output).unwrap();
        assert!(csv.starts_with("doc_id,source_type,date"));
        assert!(csv.contains("First sitting"));
        assert!(csv.contains("Second sitting"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn flatten_fixture_to_tsv() {
        let dir = temp_dir();
        let output = dir.join("rows.tsv");
        let config = FlattenConfig {
            delimiter: Delimiter::Tab,
            ..FlattenConfig::default()
        };

        let summary = flatten_to_file(
            Path::new("../../../fixtures/xml/committee_rollcall.xml"),
            &output,
            &config,
            &SilentProgress,
        )
        .unwrap();

        // 3 attendance + 1 summary + 2 speech paragraphs
        assert_eq!(summary.rows_written, 6);
        assert_eq!(summary.stats.total_rows(), 6);

        let text = std::fs::read_to_string(&output).unwrap();
        let widths: Vec<usize> = text.lines().map(|l| l.split('\t').count()).collect();
        assert_eq!(widths.len(), 7);
        assert!(widths.iter().all(|w| *w == oireachtas_shared::FLAT_ROW_WIDTH));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unwritable_output_is_fatal() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("file");
        std::fs::write(&blocker, "x").unwrap();

        let result = flatten_to_file(
            Path::new("../../../fixtures/xml/questions.xml"),
            &blocker.join("rows.csv"),
            &FlattenConfig::default(),
            &SilentProgress,
        );
        assert!(result.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
