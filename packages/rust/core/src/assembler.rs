//! Corpus assembler.
//!
//! Concatenates downloaded documents into one `<all_debates>` file, wrapping
//! each in a `<debate>` record tagged with its source metadata. Documents are
//! copied as text, one at a time; nothing is parsed.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use quick_xml::escape::escape;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use oireachtas_shared::{
    CORPUS_ROOT_TAG, DownloadedDocument, OireachtasError, RECORD_DATA_TAG, RECORD_TAG, Result,
    SourceKind,
};

/// Byte order mark, XML declaration, and doctype at the start of a document.
static PROLOG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\x{FEFF}?\s*(?:<\?xml[^>]*\?>\s*)?(?:<!DOCTYPE[^>]*>\s*)?").expect("valid regex")
});

/// Opening corpus wrapper, after the prolog has been removed.
static CORPUS_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^<{CORPUS_ROOT_TAG}\b[^>]*?(/?)>")).expect("valid regex")
});

static CORPUS_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"</{CORPUS_ROOT_TAG}\s*>\s*$")).expect("valid regex"));

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Output from assembling a corpus.
#[derive(Debug, Clone)]
pub struct AssembleResult {
    /// Path of the corpus file.
    pub output: PathBuf,
    /// Records written.
    pub records: usize,
    /// Documents that could not be read, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Write every document into one corpus at `output`.
///
/// Records are ordered Dáil, Seanad, committee, written questions; within a
/// source, by file path. An unreadable document is skipped and reported.
/// Failing to create or write `output` is fatal.
#[instrument(skip_all, fields(output = %output.display(), documents = documents.len()))]
pub fn assemble(documents: &[DownloadedDocument], output: &Path) -> Result<AssembleResult> {
    let mut ordered: Vec<&DownloadedDocument> = documents.iter().collect();
    ordered.sort_by(|a, b| {
        (a.kind.assembly_rank(), &a.path).cmp(&(b.kind.assembly_rank(), &b.path))
    });

    let mut out = create_output(output)?;
    write_line(&mut out, output, XML_DECLARATION)?;
    write_line(&mut out, output, &format!("<{CORPUS_ROOT_TAG}>"))?;

    let mut records = 0;
    let mut skipped = Vec::new();

    for doc in ordered {
        let raw = match std::fs::read(&doc.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %doc.path.display(), error = %e, "cannot read document, skipping");
                skipped.push((doc.path.clone(), e.to_string()));
                continue;
            }
        };
        let text = String::from_utf8_lossy(&raw);
        let body = strip_prolog(&text);

        write_line(&mut out, output, &format!("{}<{RECORD_DATA_TAG}>", record_open_tag(doc)))?;
        write_line(&mut out, output, body.trim_end())?;
        write_line(&mut out, output, &format!("</{RECORD_DATA_TAG}></{RECORD_TAG}>"))?;

        debug!(path = %doc.path.display(), kind = %doc.kind, "record written");
        records += 1;
    }

    write_line(&mut out, output, &format!("</{CORPUS_ROOT_TAG}>"))?;
    out.flush().map_err(|e| OireachtasError::io(output, e))?;

    info!(records, skipped = skipped.len(), "corpus assembled");

    Ok(AssembleResult {
        output: output.to_path_buf(),
        records,
        skipped,
    })
}

/// `<debate type=".." date=".." ...>` for one document.
fn record_open_tag(doc: &DownloadedDocument) -> String {
    let mut tag = format!(
        r#"<{RECORD_TAG} type="{}" date="{}""#,
        doc.kind.record_type(),
        escape(doc.date.as_str())
    );

    match (doc.kind, doc.extra_key.as_deref()) {
        (SourceKind::Committee, Some(slug)) => {
            tag.push_str(&format!(r#" slug="{}""#, escape(slug)));
        }
        (SourceKind::WrittenQuestion, number) => {
            tag.push_str(r#" question_type="written""#);
            if let Some(number) = number {
                tag.push_str(&format!(r#" number="{}""#, escape(number)));
            }
        }
        _ => {}
    }

    tag.push('>');
    tag
}

/// Remove a leading BOM, XML declaration, and doctype.
fn strip_prolog(text: &str) -> &str {
    match PROLOG_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Output from merging corpus slices.
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub output: PathBuf,
    /// Slices that contributed content.
    pub merged: usize,
    /// Slices with no records.
    pub empty: usize,
}

/// Concatenate assembled corpus slices, in order, into one corpus.
///
/// Each slice's prolog and `<all_debates>` wrapper are stripped. A slice
/// that cannot be read is fatal, since a silently partial merge would look
/// complete.
#[instrument(skip_all, fields(output = %output.display(), inputs = inputs.len()))]
pub fn merge_corpora(inputs: &[PathBuf], output: &Path) -> Result<MergeResult> {
    let mut out = create_output(output)?;
    write_line(&mut out, output, XML_DECLARATION)?;
    write_line(&mut out, output, &format!("<{CORPUS_ROOT_TAG}>"))?;

    let mut merged = 0;
    let mut empty = 0;

    for input in inputs {
        let raw = std::fs::read(input).map_err(|e| OireachtasError::io(input, e))?;
        let text = String::from_utf8_lossy(&raw);

        let inner = corpus_body(&text).trim();
        if inner.is_empty() {
            debug!(input = %input.display(), "empty slice");
            empty += 1;
            continue;
        }

        write_line(&mut out, output, inner)?;
        merged += 1;
    }

    write_line(&mut out, output, &format!("</{CORPUS_ROOT_TAG}>"))?;
    out.flush().map_err(|e| OireachtasError::io(output, e))?;

    info!(merged, empty, "corpora merged");

    Ok(MergeResult {
        output: output.to_path_buf(),
        merged,
        empty,
    })
}

/// Records of a corpus slice without its prolog or root wrapper.
fn corpus_body(text: &str) -> &str {
    let body = strip_prolog(text);

    let Some(open) = CORPUS_OPEN_RE.captures(body) else {
        return body;
    };
    if open.get(1).is_some_and(|m| !m.as_str().is_empty()) {
        // <all_debates/>
        return "";
    }

    let body = &body[open.get(0).map_or(0, |m| m.end())..];
    match CORPUS_CLOSE_RE.find(body) {
        Some(close) => &body[..close.start()],
        None => body,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| OireachtasError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| OireachtasError::io(path, e))?;
    Ok(BufWriter::new(file))
}

fn write_line(out: &mut impl Write, path: &Path, line: &str) -> Result<()> {
    writeln!(out, "{line}").map_err(|e| OireachtasError::io(path, e))
}
