//! Concurrent document downloader.
//!
//! Each reference is fetched by its own task; a semaphore bounds how many
//! run at once. Completions are drained one at a time from a [`JoinSet`],
//! so no task touches shared state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use oireachtas_shared::{
    DownloadedDocument, OireachtasError, ResourceReference, Result, SourceKind,
};

/// User-Agent string for document requests.
const USER_AGENT: &str = concat!("oireachtas-corpus/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A reference that could not be fetched or written.
#[derive(Debug, Clone)]
pub struct DownloadFailure {
    pub locator: String,
    pub reason: String,
}

/// Summary of one download batch.
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    /// Documents written, in completion order.
    pub documents: Vec<DownloadedDocument>,
    /// Per-reference failures.
    pub failures: Vec<DownloadFailure>,
    /// Locators skipped because an earlier reference in the batch already
    /// claimed the same file name.
    pub collisions: Vec<String>,
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Downloader
// ---------------------------------------------------------------------------

/// Fetches references to a directory with a bounded worker pool.
pub struct Downloader {
    client: Client,
    max_workers: usize,
}

impl Downloader {
    /// Create a downloader with the given pool size and per-request timeout.
    pub fn new(max_workers: u32, timeout_secs: u64) -> Result<Self> {
        if max_workers == 0 {
            return Err(OireachtasError::validation("max_workers must be at least 1"));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                OireachtasError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            max_workers: max_workers as usize,
        })
    }

    /// Download every reference into `dest_dir`.
    ///
    /// Fails only when `dest_dir` cannot be created. Individual fetch or
    /// write errors are logged and listed in [`DownloadReport::failures`].
    #[instrument(skip_all, fields(dest = %dest_dir.display(), refs = refs.len()))]
    pub async fn download_all(
        &self,
        refs: &[ResourceReference],
        dest_dir: &Path,
    ) -> Result<DownloadReport> {
        let start = Instant::now();

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| OireachtasError::io(dest_dir, e))?;

        let mut report = DownloadReport::default();
        let mut claimed: HashMap<String, &str> = HashMap::new();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();

        for reference in refs {
            let name = file_name(reference);
            if let Some(first) = claimed.get(&name) {
                warn!(
                    file = %name,
                    locator = %reference.locator,
                    claimed_by = %first,
                    "file name collision, skipping"
                );
                report.collisions.push(reference.locator.clone());
                continue;
            }
            claimed.insert(name.clone(), reference.locator.as_str());

            let client = self.client.clone();
            let sem = semaphore.clone();
            let target = dest_dir.join(&name);
            let reference = reference.clone();

            tasks.spawn(async move {
                let outcome = match sem.acquire_owned().await {
                    Ok(_permit) => fetch_to_file(&client, &reference, &target).await,
                    Err(e) => Err(OireachtasError::Network(format!("worker pool closed: {e}"))),
                };
                (reference.locator, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(doc))) => {
                    debug!(path = %doc.path.display(), bytes = doc.size_bytes, "saved");
                    report.documents.push(doc);
                }
                Ok((locator, Err(e))) => {
                    warn!(%locator, error = %e, "download failed");
                    report.failures.push(DownloadFailure {
                        locator,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "download task panicked");
                    report.failures.push(DownloadFailure {
                        locator: "task".into(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.duration = start.elapsed();

        info!(
            downloaded = report.documents.len(),
            failed = report.failures.len(),
            collisions = report.collisions.len(),
            duration_ms = report.duration.as_millis(),
            "download batch complete"
        );

        Ok(report)
    }
}

/// Fetch one reference and write its body verbatim to `target`.
async fn fetch_to_file(
    client: &Client,
    reference: &ResourceReference,
    target: &Path,
) -> Result<DownloadedDocument> {
    let locator = &reference.locator;

    let response = client
        .get(locator.as_str())
        .send()
        .await
        .map_err(|e| OireachtasError::Network(format!("{locator}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(OireachtasError::Network(format!("{locator}: HTTP {status}")));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| OireachtasError::Network(format!("{locator}: body read failed: {e}")))?;

    tokio::fs::write(target, &body)
        .await
        .map_err(|e| OireachtasError::io(target, e))?;

    Ok(DownloadedDocument {
        path: PathBuf::from(target),
        kind: reference.kind,
        date: reference.date.clone(),
        extra_key: reference.extra_key.clone(),
        locator: locator.clone(),
        size_bytes: body.len(),
        content_hash: compute_hash(&body),
    })
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Local file name for a reference.
///
/// - house debates: `{date}.xml`
/// - committee debates: `{date}__{slug}.xml`
/// - written questions: `{date}__pq_{number}.xml`
pub fn file_name(reference: &ResourceReference) -> String {
    let date = sanitize(&reference.date);
    let extra = reference.extra_key.as_deref().map(sanitize);

    match (reference.kind, extra) {
        (SourceKind::House(_), _) | (_, None) => format!("{date}.xml"),
        (SourceKind::Committee, Some(slug)) => format!("{date}__{slug}.xml"),
        (SourceKind::WrittenQuestion, Some(number)) => format!("{date}__pq_{number}.xml"),
    }
}

/// Keep names to a portable character set.
fn sanitize(part: &str) -> String {
    let cleaned: String = part
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Compute SHA-256 hash of content.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
