//! Core domain types shared by the harvester, assembler, and flattener.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OireachtasError;

/// Root element wrapping every record of an assembled corpus.
pub const CORPUS_ROOT_TAG: &str = "all_debates";

/// Element name of one top-level corpus record.
pub const RECORD_TAG: &str = "debate";

/// Element wrapping the embedded legal document inside a record.
pub const RECORD_DATA_TAG: &str = "data";

// ---------------------------------------------------------------------------
// SourceKind
// ---------------------------------------------------------------------------

/// One of the two houses of the Oireachtas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chamber {
    Dail,
    Seanad,
}

impl Chamber {
    /// Value of the listing API's `chamber` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dail => "dail",
            Self::Seanad => "seanad",
        }
    }
}

/// Which listing a resource came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A plenary sitting of one chamber.
    House(Chamber),
    /// A committee session.
    Committee,
    /// A written parliamentary question and its answer.
    WrittenQuestion,
}

impl SourceKind {
    /// Every source kind, in corpus assembly order.
    pub const ALL: [SourceKind; 4] = [
        SourceKind::House(Chamber::Dail),
        SourceKind::House(Chamber::Seanad),
        SourceKind::Committee,
        SourceKind::WrittenQuestion,
    ];

    /// The `type` attribute this source carries in the assembled corpus.
    pub fn record_type(&self) -> &'static str {
        match self {
            Self::House(chamber) => chamber.as_str(),
            Self::Committee => "committee",
            Self::WrittenQuestion => "questions",
        }
    }

    /// Position of this source's records in the assembled corpus.
    /// Dáil, then Seanad, then committees, then written questions.
    pub fn assembly_rank(&self) -> u8 {
        match self {
            Self::House(Chamber::Dail) => 0,
            Self::House(Chamber::Seanad) => 1,
            Self::Committee => 2,
            Self::WrittenQuestion => 3,
        }
    }

    /// Download sub-directory for this source.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::House(Chamber::Dail) => "dail_debates",
            Self::House(Chamber::Seanad) => "seanad_debates",
            Self::Committee => "committee_debates",
            Self::WrittenQuestion => "written_questions",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.record_type())
    }
}

impl FromStr for SourceKind {
    type Err = OireachtasError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dail" => Ok(Self::House(Chamber::Dail)),
            "seanad" => Ok(Self::House(Chamber::Seanad)),
            "committee" | "committees" => Ok(Self::Committee),
            "questions" | "written_questions" | "written" => Ok(Self::WrittenQuestion),
            other => Err(OireachtasError::validation(format!(
                "unknown source '{other}': expected dail, seanad, committee or questions"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceReference / DownloadedDocument
// ---------------------------------------------------------------------------

/// A downloadable document found in a listing.
///
/// Identity is the `locator` alone: one date may carry several independent
/// resources (e.g. several committee sessions on the same day).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    /// Absolute URI of the document.
    pub locator: String,
    /// Listing the reference came from.
    pub kind: SourceKind,
    /// Sitting date (`YYYY-MM-DD`) or other primary key.
    pub date: String,
    /// Committee slug or question number, when the source has one.
    pub extra_key: Option<String>,
}

/// A document written to local storage by the downloader.
#[derive(Debug, Clone)]
pub struct DownloadedDocument {
    /// Where the body was written.
    pub path: PathBuf,
    /// Listing the document came from.
    pub kind: SourceKind,
    /// Sitting date or primary key.
    pub date: String,
    /// Committee slug or question number.
    pub extra_key: Option<String>,
    /// URI the body was fetched from.
    pub locator: String,
    /// Body length in bytes.
    pub size_bytes: usize,
    /// SHA-256 of the body (hex).
    pub content_hash: String,
}

// ---------------------------------------------------------------------------
// FlatRow
// ---------------------------------------------------------------------------

/// Semantic origin of a flattened row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Attendance,
    Summary,
    Speech,
    Question,
}

impl ElementType {
    /// All element types, in within-record emission order.
    pub const ALL: [ElementType; 4] = [
        ElementType::Attendance,
        ElementType::Summary,
        ElementType::Speech,
        ElementType::Question,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attendance => "attendance",
            Self::Summary => "summary",
            Self::Speech => "speech",
            Self::Question => "question",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of columns in every flattened row.
pub const FLAT_ROW_WIDTH: usize = 30;

/// One fixed-width output row: an attendance entry, summary, speech
/// paragraph, or question/answer pair.
///
/// Fields that do not apply to the row's [`ElementType`] are empty strings.
/// Document-level fields are repeated on every row of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRow {
    pub doc_id: String,
    pub source_type: String,
    pub date: String,
    pub title_ga: String,
    pub title_en: String,
    pub proponent_ga: String,
    pub proponent_en: String,
    pub status_ga: String,
    pub status_en: String,
    pub document_date: String,
    pub volume: String,
    pub number: String,
    pub committee_name: String,
    pub question_type: String,
    pub question_number: String,
    pub section_name: String,
    pub section_id: String,
    pub element_type: ElementType,
    pub element_id: String,
    pub speaker_id: String,
    pub speaker_name: String,
    pub speaker_role: String,
    pub recorded_time: String,
    pub topic: String,
    pub question: String,
    pub written_answer: String,
    pub text: String,
    pub heading_text: String,
    pub heading_time: String,
    pub attendance: String,
}

impl FlatRow {
    /// Header row, in column order.
    pub const COLUMNS: [&'static str; FLAT_ROW_WIDTH] = [
        "doc_id",
        "source_type",
        "date",
        "title_ga",
        "title_en",
        "proponent_ga",
        "proponent_en",
        "status_ga",
        "status_en",
        "document_date",
        "volume",
        "number",
        "committee_name",
        "question_type",
        "question_number",
        "section_name",
        "section_id",
        "element_type",
        "element_id",
        "speaker_id",
        "speaker_name",
        "speaker_role",
        "recorded_time",
        "topic",
        "question",
        "written_answer",
        "text",
        "heading_text",
        "heading_time",
        "attendance",
    ];

    /// Cell values in [`FlatRow::COLUMNS`] order.
    pub fn values(&self) -> [&str; FLAT_ROW_WIDTH] {
        [
            &self.doc_id,
            &self.source_type,
            &self.date,
            &self.title_ga,
            &self.title_en,
            &self.proponent_ga,
            &self.proponent_en,
            &self.status_ga,
            &self.status_en,
            &self.document_date,
            &self.volume,
            &self.number,
            &self.committee_name,
            &self.question_type,
            &self.question_number,
            &self.section_name,
            &self.section_id,
            self.element_type.as_str(),
            &self.element_id,
            &self.speaker_id,
            &self.speaker_name,
            &self.speaker_role,
            &self.recorded_time,
            &self.topic,
            &self.question,
            &self.written_answer,
            &self.text,
            &self.heading_text,
            &self.heading_time,
            &self.attendance,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_row(element_type: ElementType) -> FlatRow {
        FlatRow {
            doc_id: String::new(),
            source_type: "dail".into(),
            date: "2024-05-01".into(),
            title_ga: String::new(),
            title_en: String::new(),
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
            section_id: String::new(),
            element_type,
            element_id: String::new(),
            speaker_id: String::new(),
            speaker_name: String::new(),
            speaker_role: String::new(),
            recorded_time: String::new(),
            topic: String::new(),
            question: String::new(),
            written_answer: String::new(),
            text: "Cuireadh tús leis an suí".into(),
            heading_text: String::new(),
            heading_time: String::new(),
            attendance: String::new(),
        }
    }

    #[test]
    fn source_kind_parses_aliases() {
        assert_eq!(
            "Dail".parse::<SourceKind>().unwrap(),
            SourceKind::House(Chamber::Dail)
        );
        assert_eq!(
            "written".parse::<SourceKind>().unwrap(),
            SourceKind::WrittenQuestion
        );
        assert!("senate".parse::<SourceKind>().is_err());
    }

    #[test]
    fn assembly_order_is_fixed() {
        let ranks: Vec<u8> = SourceKind::ALL.iter().map(|k| k.assembly_rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
        assert_eq!(SourceKind::WrittenQuestion.record_type(), "questions");
    }

    #[test]
    fn values_line_up_with_columns() {
        let row = blank_row(ElementType::Summary);
        let values = row.values();
        assert_eq!(values.len(), FlatRow::COLUMNS.len());

        let text_idx = FlatRow::COLUMNS.iter().position(|c| *c == "text").unwrap();
        assert_eq!(values[text_idx], "Cuireadh tús leis an suí");

        let type_idx = FlatRow::COLUMNS
            .iter()
            .position(|c| *c == "element_type")
            .unwrap();
        assert_eq!(values[type_idx], "summary");
    }

    #[test]
    fn element_type_serializes_lowercase() {
        let json = serde_json::to_string(&ElementType::Attendance).unwrap();
        assert_eq!(json, "\"attendance\"");
    }
}
