//! Tabular row output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use oireachtas_shared::{Delimiter, FlatRow, OireachtasError, Result};

/// Consumer of flattened rows.
pub trait RowSink {
    fn write_row(&mut self, row: &FlatRow) -> Result<()>;

    /// Flush buffered output. Called once after the last row.
    fn finish(&mut self) -> Result<()>;

    fn rows_written(&self) -> usize;
}

/// Comma- or tab-delimited writer.
///
/// The header is written together with the first row, so a pass that yields
/// no rows produces an empty file.
pub struct DelimitedSink<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl DelimitedSink<BufWriter<File>> {
    /// Create (or truncate) `path`.
    pub fn create(path: &Path, delimiter: Delimiter) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| OireachtasError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| OireachtasError::io(path, e))?;
        Ok(Self::new(BufWriter::new(file), delimiter))
    }
}

impl<W: Write> DelimitedSink<W> {
    pub fn new(inner: W, delimiter: Delimiter) -> Self {
        let writer = csv::WriterBuilder::new()
            .delimiter(delimiter.as_byte())
            .has_headers(false)
            .from_writer(inner);
        Self { writer, rows: 0 }
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| OireachtasError::Sink(format!("flush failed: {}", e.error())))
    }
}

impl<W: Write> RowSink for DelimitedSink<W> {
    fn write_row(&mut self, row: &FlatRow) -> Result<()> {
        if self.rows == 0 {
            self.writer
                .write_record(FlatRow::COLUMNS)
                .map_err(|e| OireachtasError::Sink(format!("header: {e}")))?;
        }
        self.writer
            .write_record(row.values())
            .map_err(|e| OireachtasError::Sink(format!("row {}: {e}", self.rows + 1)))?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| OireachtasError::Sink(format!("flush failed: {e}")))
    }

    fn rows_written(&self) -> usize {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oireachtas_shared::{ElementType, FLAT_ROW_WIDTH};

    fn row(text: &str) -> FlatRow {
        FlatRow {
            doc_id: "/akn/ie/debateRecord/dail/2024-01-01/debate/main".into(),
            source_type: "dail".into(),
            date: "2024-01-01".into(),
            title_ga: String::new(),
            title_en: "Dáil Éireann debate".into(),
            proponent_ga: String::new(),
            proponent_en: String::new(),
            status_ga: String::new(),
            status_en: String::new(),
            document_date: String::new(),
            volume: String::new(),
            number: String::new(),
            committee_name: String::new(),
            question_type: String::new(),
            question_number: String::new(),
            section_name: String::new(),
            section_id: "dbsect_1".into(),
            element_type: ElementType::Speech,
            element_id: "spk_1".into(),
            speaker_id: "#A".into(),
            speaker_name: "A".into(),
            speaker_role: String::new(),
            recorded_time: String::new(),
            topic: String::new(),
            question: String::new(),
            written_answer: String::new(),
            text: text.into(),
            heading_text: String::new(),
            heading_time: String::new(),
            attendance: String::new(),
        }
    }

    #[test]
    fn header_comes_with_first_row() {
        let mut sink = DelimitedSink::new(Vec::new(), Delimiter::Comma);
        sink.write_row(&row("Hello, \"world\"\nagain")).unwrap();
        sink.write_row(&row("Second")).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.rows_written(), 2);

        let bytes = sink.into_inner().unwrap();
        let mut reader = csv::ReaderBuilder::new().from_reader(bytes.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), FLAT_ROW_WIDTH);
        assert_eq!(&headers[17], "element_type");

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.len() == FLAT_ROW_WIDTH));
        assert_eq!(&records[0][26], "Hello, \"world\"\nagain");
        assert_eq!(&records[0][17], "speech");
    }

    #[test]
    fn tab_delimited() {
        let mut sink = DelimitedSink::new(Vec::new(), Delimiter::Tab);
        sink.write_row(&row("x")).unwrap();
        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header.split('\t').count(), FLAT_ROW_WIDTH);
    }

    #[test]
    fn no_rows_no_header() {
        let mut sink = DelimitedSink::new(Vec::new(), Delimiter::Comma);
        sink.finish().unwrap();
        assert!(sink.into_inner().unwrap().is_empty());
    }
}
