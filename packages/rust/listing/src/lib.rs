//! Paged, deduplicating reader for the Oireachtas listing API.
//!
//! A listing endpoint (`/debates`, `/questions`) is paged with `skip`/`limit`.
//! [`PagedListing`] walks it one page at a time, applies a source-specific
//! [`Extractor`] to every item, and yields each document locator at most once.
//! Paging stops when a page comes back empty.

mod extract;

use std::collections::HashSet;
use std::time::Duration;

use oireachtas_shared::{
    HarvestOptions, OireachtasError, ResourceReference, Result, SourceKind, SourceWindow,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use extract::{
    Extractor, extract_committee, extract_house, extract_written_question, extractor_for,
};

/// Default timeout in seconds for one listing request.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of results requested per page.
const DEFAULT_PAGE_SIZE: u32 = 50;

/// User-Agent string for listing requests.
const USER_AGENT: &str = concat!("oireachtas-corpus/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Options and requests
// ---------------------------------------------------------------------------

/// Configuration for paging a listing.
#[derive(Debug, Clone)]
pub struct ListingOptions {
    /// API base URL, e.g. `https://api.oireachtas.ie/v1`.
    pub base_url: String,
    /// Results requested per page. Also the offset step.
    pub page_size: u32,
    /// Timeout for each page request in seconds.
    pub timeout_secs: u64,
    /// Stop after this many unique references.
    pub max_items: Option<usize>,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            base_url: "https://api.oireachtas.ie/v1".into(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_items: None,
        }
    }
}

impl From<&HarvestOptions> for ListingOptions {
    fn from(opts: &HarvestOptions) -> Self {
        Self {
            base_url: opts.api_base.clone(),
            page_size: opts.page_size,
            timeout_secs: opts.listing_timeout_secs,
            max_items: opts.max_per_source,
        }
    }
}

/// One endpoint plus the fixed query parameters and extractor used to page it.
pub struct ListingRequest {
    /// Endpoint path below the base URL (`debates` or `questions`).
    pub endpoint: String,
    /// Query parameters sent with every page.
    pub params: Vec<(String, String)>,
    /// Item-to-reference extraction.
    pub extract: Extractor,
}

impl ListingRequest {
    /// The request for one source over a date window.
    pub fn for_source(kind: SourceKind, window: &SourceWindow) -> Self {
        let date_start = window.date_start.format("%Y-%m-%d").to_string();
        let date_end = window.date_end.format("%Y-%m-%d").to_string();

        let (endpoint, mut params): (&str, Vec<(String, String)>) = match kind {
            SourceKind::House(chamber) => (
                "debates",
                vec![
                    ("chamber".into(), chamber.as_str().into()),
                    ("chamber_type".into(), "house".into()),
                ],
            ),
            SourceKind::Committee => (
                "debates",
                vec![("chamber_type".into(), "committee".into())],
            ),
            SourceKind::WrittenQuestion => {
                ("questions", vec![("qtype".into(), "written".into())])
            }
        };
        params.push(("date_start".into(), date_start));
        params.push(("date_end".into(), date_end));

        Self {
            endpoint: endpoint.to_string(),
            params,
            extract: extractor_for(kind),
        }
    }
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// Body of one listing response.
#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    results: Vec<Value>,
}

/// One fetched page, after extraction and deduplication.
#[derive(Debug, Clone)]
pub struct ListingPage {
    /// Items the server returned on this page.
    pub result_count: usize,
    /// Offset the next page will be requested at.
    pub next_offset: usize,
    /// References on this page not seen earlier in the scan.
    pub references: Vec<ResourceReference>,
}

/// Counters for one listing scan.
#[derive(Debug, Clone, Default)]
pub struct ListingStats {
    /// Pages fetched (including the terminating empty page).
    pub pages: usize,
    /// Items returned by the server.
    pub items: usize,
    /// Items whose locator had already been yielded.
    pub duplicates: usize,
    /// Items with no usable locator.
    pub unusable: usize,
}

/// Lazy, forward-only scan over one listing endpoint.
///
/// Each instance owns its own deduplication set, so a new scan re-derives
/// the full reference list from offset 0.
pub struct PagedListing {
    client: Client,
    url: Url,
    params: Vec<(String, String)>,
    extract: Extractor,
    page_size: u32,
    max_items: Option<usize>,
    offset: usize,
    seen: HashSet<String>,
    done: bool,
    stats: ListingStats,
}

impl PagedListing {
    /// Prepare a scan. No request is made until [`PagedListing::next_page`].
    pub fn new(request: ListingRequest, opts: &ListingOptions) -> Result<Self> {
        if opts.page_size == 0 {
            return Err(OireachtasError::validation("page_size must be at least 1"));
        }

        let base = opts.base_url.trim_end_matches('/');
        let url = Url::parse(&format!("{base}/{}", request.endpoint)).map_err(|e| {
            OireachtasError::validation(format!("invalid listing URL {base}: {e}"))
        })?;

        Ok(Self {
            client: build_client(opts.timeout_secs)?,
            url,
            params: request.params,
            extract: request.extract,
            page_size: opts.page_size,
            max_items: opts.max_items,
            offset: 0,
            seen: HashSet::new(),
            done: false,
            stats: ListingStats::default(),
        })
    }

    /// Fetch the next page. Returns `Ok(None)` once the listing is exhausted
    /// (or the item cap was reached). A non-success status ends the scan and
    /// is returned as an error; pages already returned stay valid.
    pub async fn next_page(&mut self) -> Result<Option<ListingPage>> {
        if self.done {
            return Ok(None);
        }

        debug!(url = %self.url, offset = self.offset, "fetching listing page");

        let response = self
            .client
            .get(self.url.clone())
            .query(&self.params)
            .query(&[("skip", self.offset), ("limit", self.page_size as usize)])
            .send()
            .await
            .map_err(|e| {
                self.done = true;
                OireachtasError::Network(format!("{}: {e}", self.url))
            })?;

        let status = response.status();
        if !status.is_success() {
            self.done = true;
            return Err(OireachtasError::Network(format!(
                "{} (skip={}): HTTP {status}",
                self.url, self.offset
            )));
        }

        let body: ListingResponse = response.json().await.map_err(|e| {
            self.done = true;
            OireachtasError::parse(format!("{}: invalid listing body: {e}", self.url))
        })?;

        self.stats.pages += 1;

        if body.results.is_empty() {
            self.done = true;
            return Ok(None);
        }

        let result_count = body.results.len();
        self.stats.items += result_count;

        let mut references = Vec::new();
        for item in &body.results {
            let Some(reference) = (self.extract)(item) else {
                self.stats.unusable += 1;
                continue;
            };
            if reference.locator.trim().is_empty() {
                self.stats.unusable += 1;
                continue;
            }
            if !self.seen.insert(reference.locator.clone()) {
                self.stats.duplicates += 1;
                continue;
            }
            references.push(reference);

            if self.max_items.is_some_and(|max| self.seen.len() >= max) {
                self.done = true;
                break;
            }
        }

        // The server's page size, not the kept count, drives the offset.
        self.offset += self.page_size as usize;

        Ok(Some(ListingPage {
            result_count,
            next_offset: self.offset,
            references,
        }))
    }

    /// Counters so far.
    pub fn stats(&self) -> &ListingStats {
        &self.stats
    }
}

// ---------------------------------------------------------------------------
// Whole-listing helper
// ---------------------------------------------------------------------------

/// Everything one scan produced.
#[derive(Debug, Clone, Default)]
pub struct ListingOutcome {
    /// Unique references, in listing order.
    pub references: Vec<ResourceReference>,
    /// Scan counters.
    pub stats: ListingStats,
    /// The transport error that ended the scan early, if any.
    pub error: Option<String>,
}

/// Page through a whole listing.
///
/// Transport failures end the scan and are reported in
/// [`ListingOutcome::error`] alongside whatever was already collected.
/// Only setup failures (bad base URL, client construction) are returned as `Err`.
#[instrument(skip_all, fields(endpoint = %request.endpoint))]
pub async fn fetch_all(request: ListingRequest, opts: &ListingOptions) -> Result<ListingOutcome> {
    let mut listing = PagedListing::new(request, opts)?;
    let mut outcome = ListingOutcome::default();

    loop {
        match listing.next_page().await {
            Ok(Some(page)) => {
                debug!(
                    results = page.result_count,
                    kept = page.references.len(),
                    next_offset = page.next_offset,
                    "listing page processed"
                );
                outcome.references.extend(page.references);
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "listing aborted");
                outcome.error = Some(e.to_string());
                break;
            }
        }
    }

    outcome.stats = listing.stats().clone();

    info!(
        references = outcome.references.len(),
        pages = outcome.stats.pages,
        duplicates = outcome.stats.duplicates,
        unusable = outcome.stats.unusable,
        aborted = outcome.error.is_some(),
        "listing complete"
    );

    Ok(outcome)
}

/// Build a reqwest client with appropriate settings.
fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| OireachtasError::Network(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn house_item(date: &str, uri: &str) -> Value {
        json!({ "debateRecord": { "date": date, "formats": { "xml": { "uri": uri } } } })
    }

    fn opts(server: &MockServer, page_size: u32) -> ListingOptions {
        ListingOptions {
            base_url: server.uri(),
            page_size,
            timeout_secs: 5,
            max_items: None,
        }
    }

    fn dail_request() -> ListingRequest {
        ListingRequest {
            endpoint: "debates".into(),
            params: vec![("chamber".into(), "dail".into())],
            extract: extractor_for(SourceKind::House(oireachtas_shared::Chamber::Dail)),
        }
    }

    async fn mount_page(server: &MockServer, skip: &str, results: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/debates"))
            .and(query_param("skip", skip))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": results })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn pages_until_empty_and_dedups_by_locator() {
        let server = MockServer::start().await;

        mount_page(
            &server,
            "0",
            vec![
                house_item("2024-01-10", "https://x.test/a.xml"),
                house_item("2024-01-10", "https://x.test/b.xml"),
            ],
        )
        .await;
        mount_page(
            &server,
            "2",
            vec![
                // Same locator as on page one: dropped.
                house_item("2024-01-10", "https://x.test/a.xml"),
                json!({ "debateRecord": { "formats": {} } }),
            ],
        )
        .await;
        mount_page(&server, "4", vec![]).await;

        let outcome = fetch_all(dail_request(), &opts(&server, 2)).await.unwrap();

        let locators: Vec<&str> = outcome.references.iter().map(|r| r.locator.as_str()).collect();
        assert_eq!(locators, vec!["https://x.test/a.xml", "https://x.test/b.xml"]);
        // Same date, different locators: both kept.
        assert!(outcome.references.iter().all(|r| r.date == "2024-01-10"));
        assert_eq!(outcome.stats.pages, 3);
        assert_eq!(outcome.stats.duplicates, 1);
        assert_eq!(outcome.stats.unusable, 1);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn sends_fixed_params_with_paging() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/debates"))
            .and(query_param("chamber", "dail"))
            .and(query_param("skip", "0"))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = fetch_all(dail_request(), &opts(&server, 50)).await.unwrap();
        assert!(outcome.references.is_empty());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn error_status_keeps_partial_results() {
        let server = MockServer::start().await;

        mount_page(
            &server,
            "0",
            vec![house_item("2024-02-01", "https://x.test/first.xml")],
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/debates"))
            .and(query_param("skip", "1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let outcome = fetch_all(dail_request(), &opts(&server, 1)).await.unwrap();
        assert_eq!(outcome.references.len(), 1);
        let err = outcome.error.expect("scan should report the failure");
        assert!(err.contains("503"));
    }

    #[tokio::test]
    async fn stops_at_max_items() {
        let server = MockServer::start().await;

        mount_page(
            &server,
            "0",
            vec![
                house_item("2024-03-01", "https://x.test/1.xml"),
                house_item("2024-03-02", "https://x.test/2.xml"),
                house_item("2024-03-03", "https://x.test/3.xml"),
            ],
        )
        .await;

        let mut options = opts(&server, 3);
        options.max_items = Some(2);

        let mut listing = PagedListing::new(dail_request(), &options).unwrap();
        let page = listing.next_page().await.unwrap().unwrap();
        assert_eq!(page.result_count, 3);
        assert_eq!(page.references.len(), 2);
        assert_eq!(page.next_offset, 3);
        assert!(listing.next_page().await.unwrap().is_none());
    }

    fn load_fixture(name: &str) -> Value {
        let path = format!("../../../fixtures/json/{name}");
        let content = std::fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("missing fixture: {path}"));
        serde_json::from_str(&content).unwrap()
    }

    async fn serve_fixture(server: &MockServer, endpoint: &str, name: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/{endpoint}")))
            .and(query_param("skip", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture(name)))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/{endpoint}")))
            .and(query_param("skip", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn committee_listing_keeps_same_day_sessions() {
        let server = MockServer::start().await;
        serve_fixture(&server, "debates", "committee_debates_page.json").await;

        let window = SourceWindow {
            enabled: true,
            date_start: chrono_date(2023, 11, 1),
            date_end: chrono_date(2023, 11, 30),
        };
        let request = ListingRequest::for_source(SourceKind::Committee, &window);
        let outcome = fetch_all(request, &opts(&server, 50)).await.unwrap();

        let slugs: Vec<Option<&str>> = outcome
            .references
            .iter()
            .map(|r| r.extra_key.as_deref())
            .collect();
        assert_eq!(
            slugs,
            vec![Some("joint_committee_on_health"), Some("committee_of_public_accounts")]
        );
        assert!(outcome.references.iter().all(|r| r.date == "2023-11-08"));
        assert_eq!(outcome.stats.unusable, 1);
    }

    #[tokio::test]
    async fn written_question_listing_from_fixture() {
        let server = MockServer::start().await;
        serve_fixture(&server, "questions", "written_questions_page.json").await;

        let window = SourceWindow {
            enabled: true,
            date_start: chrono_date(2024, 2, 1),
            date_end: chrono_date(2024, 2, 29),
        };
        let request = ListingRequest::for_source(SourceKind::WrittenQuestion, &window);
        let outcome = fetch_all(request, &opts(&server, 50)).await.unwrap();

        assert_eq!(outcome.references.len(), 2);
        assert_eq!(outcome.references[0].extra_key.as_deref(), Some("1234"));
        assert_eq!(outcome.references[1].extra_key.as_deref(), Some("NA"));
        assert_eq!(outcome.references[1].date, "2024-02-13");
    }

    #[test]
    fn request_for_written_questions() {
        let window = SourceWindow {
            enabled: true,
            date_start: chrono_date(2012, 1, 1),
            date_end: chrono_date(2025, 7, 31),
        };
        let req = ListingRequest::for_source(SourceKind::WrittenQuestion, &window);
        assert_eq!(req.endpoint, "questions");
        assert!(req.params.contains(&("qtype".into(), "written".into())));
        assert!(req.params.contains(&("date_start".into(), "2012-01-01".into())));
        assert!(req.params.contains(&("date_end".into(), "2025-07-31".into())));
    }

    #[test]
    fn request_for_committee_has_no_chamber() {
        let window = SourceWindow {
            enabled: true,
            date_start: chrono_date(1924, 1, 1),
            date_end: chrono_date(1924, 12, 31),
        };
        let req = ListingRequest::for_source(SourceKind::Committee, &window);
        assert_eq!(req.endpoint, "debates");
        assert!(req.params.iter().all(|(k, _)| k != "chamber"));
        assert!(req.params.contains(&("chamber_type".into(), "committee".into())));
    }

    #[test]
    fn zero_page_size_rejected() {
        let options = ListingOptions {
            page_size: 0,
            ..ListingOptions::default()
        };
        assert!(PagedListing::new(dail_request(), &options).is_err());
    }

    fn chrono_date(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }
}
