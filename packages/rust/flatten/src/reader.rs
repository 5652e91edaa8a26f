//! Forward-only record reader over an assembled corpus.
//!
//! The reader pulls XML events and builds an owned [`Element`] only for the
//! outermost record element (`debate` by default). Everything outside a
//! record, including the corpus root, is never materialized. A completed
//! record is held until [`RecordReader::release`] (or the next call to
//! [`RecordReader::next_record`]), so at most one record lives in memory.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, warn};

use oireachtas_shared::{OireachtasError, Result};

use crate::tree::{Element, Node};

/// Read buffer capacity kept across records. Larger buffers are dropped on release.
const RETAINED_BUFFER: usize = 64 * 1024;

/// Consecutive syntax errors tolerated before the stream is abandoned.
const MAX_CONSECUTIVE_ERRORS: usize = 32;

/// Outcome of pulling one record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEvent {
    /// A well-formed record is held and available via [`RecordReader::record`].
    Complete { index: usize, position: u64 },
    /// The record could not be parsed cleanly and was discarded.
    Malformed {
        index: usize,
        position: u64,
        reason: String,
    },
}

/// Lightweight token produced from one quick-xml event.
///
/// Element tokens carry the first attribute problem met while reading the tag.
enum Token {
    Open(Element, Option<String>),
    Empty(Element, Option<String>),
    Close(String),
    Text(String),
    Eof,
    Skip,
}

/// Pull reader yielding one top-level record at a time.
pub struct RecordReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    source: PathBuf,
    record_tag: String,
    /// Open elements of the record being built; empty between records.
    stack: Vec<Element>,
    /// Completed record awaiting release.
    held: Option<Element>,
    /// First problem seen inside the record being built.
    defect: Option<String>,
    index: usize,
    finished: bool,
}

impl RecordReader<BufReader<File>> {
    /// Open a corpus file.
    pub fn from_path(path: &Path, record_tag: &str) -> Result<Self> {
        let file = File::open(path).map_err(|e| OireachtasError::io(path, e))?;
        let mut reader = Self::new(BufReader::new(file), record_tag);
        reader.source = path.to_path_buf();
        Ok(reader)
    }
}

impl<R: BufRead> RecordReader<R> {
    /// Wrap any buffered source.
    pub fn new(source: R, record_tag: &str) -> Self {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.trim_text(false);

        Self {
            reader,
            buf: Vec::new(),
            source: PathBuf::from("<stream>"),
            record_tag: record_tag.to_string(),
            stack: Vec::new(),
            held: None,
            defect: None,
            index: 0,
            finished: false,
        }
    }

    /// The record returned by the last [`RecordEvent::Complete`], if not yet released.
    pub fn record(&self) -> Option<&Element> {
        self.held.as_ref()
    }

    /// Whether a completed record is still held.
    pub fn is_holding_record(&self) -> bool {
        self.held.is_some()
    }

    /// Drop the held record and trim the read buffer.
    pub fn release(&mut self) {
        self.held = None;
        if self.buf.capacity() > RETAINED_BUFFER {
            self.buf = Vec::with_capacity(RETAINED_BUFFER);
        }
    }

    /// Records seen so far, well-formed or not.
    pub fn records_seen(&self) -> usize {
        self.index
    }

    /// Byte offset of the parser in the source.
    pub fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    /// Advance to the next record.
    ///
    /// Returns `Ok(None)` at end of input. Syntax problems inside a record
    /// are reported as [`RecordEvent::Malformed`] and the stream continues;
    /// only I/O failures are returned as `Err`.
    pub fn next_record(&mut self) -> Result<Option<RecordEvent>> {
        if self.held.is_some() {
            debug!("previous record not released, releasing");
            self.release();
        }
        if self.finished {
            return Ok(None);
        }

        let mut consecutive_errors = 0usize;

        loop {
            let in_record = !self.stack.is_empty();
            let token = match read_token(
                &mut self.reader,
                &mut self.buf,
                in_record,
                self.record_tag.as_bytes(),
            ) {
                Ok(token) => {
                    consecutive_errors = 0;
                    token
                }
                Err(quick_xml::Error::Io(e)) => {
                    self.finished = true;
                    self.stack.clear();
                    return Err(OireachtasError::io(
                        &self.source,
                        std::io::Error::new(e.kind(), e.to_string()),
                    ));
                }
                Err(e) => {
                    let opens_record =
                        !in_record && names_tag(&self.buf, self.record_tag.as_bytes());
                    self.buf.clear();
                    consecutive_errors += 1;
                    let position = self.position();
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        warn!(%position, error = %e, "parser is not advancing, ending stream");
                        self.finished = true;
                        self.stack.clear();
                        return Err(OireachtasError::parse(format!(
                            "{}: unrecoverable XML error at byte {position}: {e}",
                            self.source.display()
                        )));
                    }
                    if in_record {
                        self.note_defect(format!("XML error: {e}"));
                    } else if opens_record {
                        return Ok(Some(self.malformed(format!("unreadable start tag: {e}"))));
                    } else {
                        warn!(%position, error = %e, "XML error between records");
                    }
                    continue;
                }
            };
            self.buf.clear();

            match token {
                Token::Skip => {}
                Token::Eof => {
                    self.finished = true;
                    if self.stack.is_empty() {
                        return Ok(None);
                    }
                    self.stack.clear();
                    let reason = self
                        .defect
                        .take()
                        .unwrap_or_else(|| "record truncated at end of input".into());
                    return Ok(Some(self.malformed(reason)));
                }
                Token::Open(el, defect) => {
                    self.stack.push(el);
                    if let Some(reason) = defect {
                        self.note_defect(reason);
                    }
                }
                Token::Empty(el, defect) => {
                    if let Some(reason) = defect {
                        self.note_defect(reason);
                    }
                    if let Some(event) = self.attach(el) {
                        return Ok(Some(event));
                    }
                }
                Token::Text(text) => {
                    if let Some(top) = self.stack.last_mut() {
                        top.push_text(text);
                    }
                }
                Token::Close(name) => {
                    if let Some(event) = self.close(&name) {
                        return Ok(Some(event));
                    }
                }
            }
        }
    }

    /// Attach a finished element to its parent, or complete the record.
    fn attach(&mut self, el: Element) -> Option<RecordEvent> {
        match self.stack.last_mut() {
            Some(parent) => {
                parent.children.push(Node::Element(el));
                None
            }
            None => Some(self.complete(el)),
        }
    }

    /// Handle a closing tag, repairing unclosed children.
    fn close(&mut self, name: &str) -> Option<RecordEvent> {
        let Some(depth) = self.stack.iter().rposition(|e| e.name == name) else {
            if !self.stack.is_empty() {
                self.note_defect(format!("unexpected closing tag </{name}>"));
            }
            return None;
        };

        while self.stack.len() > depth + 1 {
            if let Some(unclosed) = self.stack.pop() {
                self.note_defect(format!("unclosed <{}>", unclosed.name));
                if let Some(parent) = self.stack.last_mut() {
                    parent.children.push(Node::Element(unclosed));
                }
            }
        }

        let el = self.stack.pop()?;
        self.attach(el)
    }

    fn complete(&mut self, record: Element) -> RecordEvent {
        let index = self.index;
        self.index += 1;
        let position = self.position();

        match self.defect.take() {
            Some(reason) => RecordEvent::Malformed {
                index,
                position,
                reason,
            },
            None => {
                self.held = Some(record);
                RecordEvent::Complete { index, position }
            }
        }
    }

    fn malformed(&mut self, reason: String) -> RecordEvent {
        let index = self.index;
        self.index += 1;
        RecordEvent::Malformed {
            index,
            position: self.position(),
            reason,
        }
    }

    fn note_defect(&mut self, reason: String) {
        if self.defect.is_none() {
            self.defect = Some(reason);
        }
    }
}

/// Pull one event and convert it to an owned token.
///
/// Outside a record only the opening of a record element is materialized.
fn read_token<R: BufRead>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
    in_record: bool,
    record_tag: &[u8],
) -> std::result::Result<Token, quick_xml::Error> {
    let event = reader.read_event_into(buf)?;

    let token = match event {
        Event::Start(e) if in_record || e.local_name().as_ref() == record_tag => {
            let (el, defect) = element_from(&e);
            Token::Open(el, defect)
        }
        Event::Empty(e) if in_record || e.local_name().as_ref() == record_tag => {
            let (el, defect) = element_from(&e);
            Token::Empty(el, defect)
        }
        Event::End(e) if in_record => {
            Token::Close(String::from_utf8_lossy(e.local_name().as_ref()).into_owned())
        }
        Event::Text(t) if in_record => {
            let text = match t.unescape() {
                Ok(s) => s.into_owned(),
                Err(_) => String::from_utf8_lossy(&t).into_owned(),
            };
            Token::Text(text)
        }
        Event::CData(c) if in_record => Token::Text(String::from_utf8_lossy(&c).into_owned()),
        Event::Eof => Token::Eof,
        _ => Token::Skip,
    };

    Ok(token)
}

/// Build an element from a start tag, keeping the attributes read before any
/// broken one.
fn element_from(start: &BytesStart<'_>) -> (Element, Option<String>) {
    let mut el = Element::new(String::from_utf8_lossy(start.local_name().as_ref()));

    for attr in start.attributes().with_checks(false) {
        let attr = match attr {
            Ok(attr) => attr,
            Err(e) => {
                let reason = format!("bad attribute in <{}>: {e}", el.name);
                return (el, Some(reason));
            }
        };
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        el.attrs.push((key, value));
    }

    (el, None)
}

/// Whether raw tag bytes left by a failed read start with `tag` (prefix allowed).
fn names_tag(raw: &[u8], tag: &[u8]) -> bool {
    let raw = raw.strip_prefix(b"<").unwrap_or(raw);
    let end = raw
        .iter()
        .position(|b| b.is_ascii_whitespace() || matches!(b, b'/' | b'>'))
        .unwrap_or(raw.len());
    let name = &raw[..end];
    let local = match name.iter().rposition(|&b| b == b':') {
        Some(colon) => &name[colon + 1..],
        None => name,
    };
    !tag.is_empty() && local == tag
}
