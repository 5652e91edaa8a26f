//! Per-source extraction of resource references from listing items.
//!
//! Each listing shape nests the document locator at a different JSON path:
//! - house sittings: `debateRecord.formats.xml.uri`
//! - committee sessions: `debateRecord.formats.xml` (object or bare string)
//! - written questions: `question.debateSection.formats.xml` (object or bare string)
//!
//! Committee and question items do not always carry every key, so the slug,
//! date, or number is mined out of the locator's path segments as a fallback.

use std::sync::LazyLock;

use oireachtas_shared::{Chamber, ResourceReference, SourceKind};
use regex::Regex;
use serde_json::Value;
use url::Url;

/// Turns one listing item into a reference, or `None` when the item has no document.
pub type Extractor = Box<dyn Fn(&Value) -> Option<ResourceReference> + Send + Sync>;

/// Placeholder for a question without a number.
const MISSING_QUESTION_NUMBER: &str = "NA";

/// Placeholder for an item whose date cannot be recovered.
const MISSING_DATE: &str = "undated";

/// Matches an ISO `YYYY-MM-DD` path segment.
static DATE_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date segment regex"));

/// Build the extractor for a source kind.
pub fn extractor_for(kind: SourceKind) -> Extractor {
    match kind {
        SourceKind::House(chamber) => Box::new(move |item| extract_house(item, chamber)),
        SourceKind::Committee => Box::new(extract_committee),
        SourceKind::WrittenQuestion => Box::new(extract_written_question),
    }
}

/// Extract a plenary sitting.
pub fn extract_house(item: &Value, chamber: Chamber) -> Option<ResourceReference> {
    let record = item.get("debateRecord")?;
    let locator = xml_locator(record.pointer("/formats/xml")?)?;

    let date = str_field(record, "date")
        .or_else(|| str_field(item, "contextDate"))
        .map(str::to_string)
        .or_else(|| first_date_segment(&path_segments(locator)))
        .unwrap_or_else(|| MISSING_DATE.to_string());

    Some(ResourceReference {
        locator: locator.to_string(),
        kind: SourceKind::House(chamber),
        date,
        extra_key: None,
    })
}

/// Extract a committee session. The slug always comes from the locator path
/// (`.../debateRecord/{slug}/{date}/...`).
pub fn extract_committee(item: &Value) -> Option<ResourceReference> {
    let record = item.get("debateRecord")?;
    let locator = xml_locator(record.pointer("/formats/xml")?)?;
    let segments = path_segments(locator);
    let (path_slug, path_date) = committee_segments(&segments);

    let date = str_field(record, "date")
        .map(str::to_string)
        .or(path_date)
        .or_else(|| first_date_segment(&segments))
        .unwrap_or_else(|| MISSING_DATE.to_string());

    Some(ResourceReference {
        locator: locator.to_string(),
        kind: SourceKind::Committee,
        date,
        extra_key: path_slug,
    })
}

/// Extract a written question.
pub fn extract_written_question(item: &Value) -> Option<ResourceReference> {
    let question = item.get("question")?;
    let locator = xml_locator(question.pointer("/debateSection/formats/xml")?)?;

    let date = str_field(question, "date")
        .map(str::to_string)
        .or_else(|| first_date_segment(&path_segments(locator)))
        .unwrap_or_else(|| MISSING_DATE.to_string());

    // The API reports questionNumber as an integer; older items use strings.
    let number = match question.get("questionNumber") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => MISSING_QUESTION_NUMBER.to_string(),
    };

    Some(ResourceReference {
        locator: locator.to_string(),
        kind: SourceKind::WrittenQuestion,
        date,
        extra_key: Some(number),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The `xml` format entry is either `{ "uri": ... }` or the URI itself.
fn xml_locator(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) => map.get("uri").and_then(Value::as_str),
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Non-empty path segments of a locator. Falls back to plain splitting when
/// the locator is not an absolute URL.
fn path_segments(locator: &str) -> Vec<String> {
    match Url::parse(locator) {
        Ok(url) => url
            .path_segments()
            .map(|segs| {
                segs.filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default(),
        Err(_) => locator
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// `(slug, date)` following the `debateRecord` segment, or at the fixed
/// positions the API has historically used (`/akn/ie/debateRecord/{slug}/{date}`).
fn committee_segments(segments: &[String]) -> (Option<String>, Option<String>) {
    let anchor = segments
        .iter()
        .position(|s| s == "debateRecord")
        .map(|i| i + 1)
        .unwrap_or(3);

    let slug = segments.get(anchor).cloned();
    let date = segments
        .get(anchor + 1)
        .filter(|s| DATE_SEGMENT_RE.is_match(s))
        .cloned();
    (slug, date)
}

fn first_date_segment(segments: &[String]) -> Option<String> {
    segments
        .iter()
        .find(|s| DATE_SEGMENT_RE.is_match(s))
        .cloned()
}
