//! Streaming flattener: corpus XML to fixed-width rows.
//!
//! This crate provides:
//! - [`RecordReader`]: forward-only pull reader with explicit record release
//! - [`tree`]: the owned element tree one record is parsed into
//! - [`akn`]: Akoma Ntoso row extraction
//! - [`Flattener`]: the lazy row iterator tying them together

pub mod akn;
pub mod reader;
pub mod tree;

use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, warn};

use oireachtas_shared::{ElementType, FlatRow, RECORD_TAG, Result};

pub use akn::{
    DocumentMeta, Extraction, LOCATE_STRATEGIES, extract_records, extract_rows, locate_document,
};
pub use reader::{RecordEvent, RecordReader};
pub use tree::{Element, Node};

/// Counters for one flatten pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenStats {
    /// Typed records that were flattened (including those yielding no rows).
    pub records: usize,
    /// Records without a type attribute, skipped.
    pub untyped: usize,
    /// Typed records in which no legal document was found.
    pub missing_document: usize,
    /// Records discarded because they could not be parsed.
    pub malformed: usize,
    /// Rows emitted per element type.
    pub rows: BTreeMap<String, usize>,
    /// Set when the stream ended on an unrecoverable error.
    pub aborted: Option<String>,
}

impl FlattenStats {
    pub fn total_rows(&self) -> usize {
        self.rows.values().sum()
    }

    pub fn rows_of(&self, element_type: ElementType) -> usize {
        self.rows.get(element_type.as_str()).copied().unwrap_or(0)
    }
}

/// Lazy iterator of rows over a corpus.
///
/// Rows of one record are buffered; the record itself is released before
/// any of them is handed out.
pub struct Flattener<R: BufRead> {
    reader: RecordReader<R>,
    pending: VecDeque<FlatRow>,
    stats: FlattenStats,
    done: bool,
}

impl Flattener<BufReader<File>> {
    /// Open a corpus file using the default record tag.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_tag(path, RECORD_TAG)
    }

    pub fn open_with_tag(path: &Path, record_tag: &str) -> Result<Self> {
        Ok(Self::from_reader(RecordReader::from_path(path, record_tag)?))
    }
}

impl<R: BufRead> Flattener<R> {
    pub fn from_reader(reader: RecordReader<R>) -> Self {
        Self {
            reader,
            pending: VecDeque::new(),
            stats: FlattenStats::default(),
            done: false,
        }
    }

    pub fn stats(&self) -> &FlattenStats {
        &self.stats
    }

    pub fn into_stats(self) -> FlattenStats {
        self.stats
    }

    /// Pull records until one yields rows or the stream ends.
    fn fill(&mut self) {
        while self.pending.is_empty() && !self.done {
            let event = match self.reader.next_record() {
                Ok(Some(event)) => event,
                Ok(None) => {
                    self.done = true;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "corpus stream ended early");
                    self.stats.aborted = Some(e.to_string());
                    self.done = true;
                    break;
                }
            };

            match event {
                RecordEvent::Malformed {
                    index,
                    position,
                    reason,
                } => {
                    warn!(record = index, position, %reason, "skipping malformed record");
                    self.stats.malformed += 1;
                }
                RecordEvent::Complete { index, .. } => {
                    let extractions = match self.reader.record() {
                        Some(record) => extract_records(record),
                        None => continue,
                    };
                    self.reader.release();
                    for extraction in extractions {
                        self.absorb(index, extraction);
                    }
                }
            }
        }
    }

    fn absorb(&mut self, index: usize, extraction: Extraction) {
        match extraction {
            Extraction::Untyped => {
                debug!(record = index, "record has no type, skipping");
                self.stats.untyped += 1;
            }
            Extraction::NoDocument => {
                debug!(record = index, "no legal document in record");
                self.stats.records += 1;
                self.stats.missing_document += 1;
            }
            Extraction::Rows(rows) => {
                self.stats.records += 1;
                for row in &rows {
                    *self
                        .stats
                        .rows
                        .entry(row.element_type.as_str().to_string())
                        .or_default() += 1;
                }
                self.pending.extend(rows);
            }
        }
    }
}

impl<R: BufRead> Iterator for Flattener<R> {
    type Item = FlatRow;

    fn next(&mut self) -> Option<FlatRow> {
        if self.pending.is_empty() {
            self.fill();
        }
        self.pending.pop_front()
    }
}

/// Open `path` and return its row iterator.
pub fn flatten(path: &Path) -> Result<Flattener<BufReader<File>>> {
    Flattener::open(path)
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// Shape summary of one record, for eyeballing a corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSummary {
    pub index: usize,
    pub source_type: Option<String>,
    pub date: String,
    /// Strategy that located the legal document.
    pub strategy: Option<&'static str>,
    /// Child element names of the legal document.
    pub document_children: Vec<String>,
    /// Child element names of the document's inner `debate`, if any.
    pub debate_children: Vec<String>,
    /// Rows per element type.
    pub rows: BTreeMap<String, usize>,
}

/// Summarize the first `limit` typed records.
pub fn inspect<R: BufRead>(reader: &mut RecordReader<R>, limit: usize) -> Result<Vec<RecordSummary>> {
    let mut out = Vec::new();

    while out.len() < limit {
        let Some(event) = reader.next_record()? else {
            break;
        };
        let RecordEvent::Complete { index, .. } = event else {
            continue;
        };
        let Some(record) = reader.record() else {
            continue;
        };
        let Some(source_type) = akn::record_type(record).map(str::to_string) else {
            reader.release();
            continue;
        };

        let located = locate_document(record);
        let names = |el: &Element| el.elements().map(|c| c.name.clone()).collect::<Vec<_>>();
        let document_children = located.map(|(_, doc)| names(doc)).unwrap_or_default();
        let debate_children = located
            .and_then(|(_, doc)| doc.child("debate"))
            .map(names)
            .unwrap_or_default();

        let mut rows = BTreeMap::new();
        if let Extraction::Rows(extracted) = extract_rows(record) {
            for row in extracted {
                *rows.entry(row.element_type.as_str().to_string()).or_default() += 1;
            }
        }

        out.push(RecordSummary {
            index,
            source_type: Some(source_type),
            date: record.attr_or_empty("date").to_string(),
            strategy: located.map(|(s, _)| s),
            document_children,
            debate_children,
            rows,
        });
        reader.release();
    }

    Ok(out)
}
