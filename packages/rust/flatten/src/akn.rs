//! Row extraction from one corpus record's Akoma Ntoso document.

use oireachtas_shared::{ElementType, FlatRow, RECORD_DATA_TAG};

use crate::tree::Element;

/// Root element name of the embedded legal document.
pub const DOCUMENT_TAG: &str = "akomaNtoso";

/// One way of finding the legal document inside a record.
pub type LocateStrategy = for<'a> fn(&'a Element) -> Option<&'a Element>;

/// Lookup strategies, tried in order.
pub const LOCATE_STRATEGIES: &[(&str, LocateStrategy)] = &[
    ("direct", locate_direct),
    ("wrapped", locate_wrapped),
    ("descendant", locate_anywhere),
];

/// `record/data/akomaNtoso`
fn locate_direct(record: &Element) -> Option<&Element> {
    record.child(RECORD_DATA_TAG)?.child(DOCUMENT_TAG)
}

/// `record/data/*/akomaNtoso`
fn locate_wrapped(record: &Element) -> Option<&Element> {
    record
        .child(RECORD_DATA_TAG)?
        .elements()
        .find_map(|wrapper| wrapper.child(DOCUMENT_TAG))
}

fn locate_anywhere(record: &Element) -> Option<&Element> {
    record.find_descendant(DOCUMENT_TAG)
}

/// Find the legal document, returning the name of the strategy that matched.
pub fn locate_document(record: &Element) -> Option<(&'static str, &Element)> {
    LOCATE_STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(record).map(|doc| (*name, doc)))
}

/// Record source type (`type`, else `kind`).
pub fn record_type(record: &Element) -> Option<&str> {
    record.attr("type").or_else(|| record.attr("kind"))
}

/// What one record produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// No type attribute: a nested artifact, not a real record.
    Untyped,
    /// No legal document could be located.
    NoDocument,
    /// Rows in emission order (possibly none).
    Rows(Vec<FlatRow>),
}

/// Flatten one record.
pub fn extract_rows(record: &Element) -> Extraction {
    let Some(source_type) = record_type(record) else {
        return Extraction::Untyped;
    };
    let Some((_, doc)) = locate_document(record) else {
        return Extraction::NoDocument;
    };

    let meta = DocumentMeta::read(record, source_type, doc);
    let mut rows = Vec::new();

    attendance_rows(&meta, doc, &mut rows);
    section_rows(&meta, doc, &mut rows);
    if source_type == "questions" {
        question_rows(&meta, doc, &mut rows);
    }

    Extraction::Rows(rows)
}

/// Flatten a record, descending into an untyped record for typed ones nested in it.
///
/// Nested records are taken outermost first; a typed record is never searched
/// further, so each nested record is flattened once.
pub fn extract_records(record: &Element) -> Vec<Extraction> {
    if record_type(record).is_some() {
        return vec![extract_rows(record)];
    }

    let mut nested = Vec::new();
    collect_typed(record, &record.name, &mut nested);
    if nested.is_empty() {
        return vec![Extraction::Untyped];
    }
    nested.into_iter().map(extract_rows).collect()
}

fn collect_typed<'a>(el: &'a Element, tag: &str, out: &mut Vec<&'a Element>) {
    for child in el.elements() {
        if child.name == tag && record_type(child).is_some() {
            out.push(child);
        } else {
            collect_typed(child, tag, out);
        }
    }
}

// ---------------------------------------------------------------------------
// Document metadata
// ---------------------------------------------------------------------------

/// Document-level fields repeated on every row of a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMeta {
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
}

impl DocumentMeta {
    pub fn read(record: &Element, source_type: &str, doc: &Element) -> Self {
        let doc_id = doc
            .descendants_named("FRBRWork")
            .find_map(|work| work.child("FRBRthis"))
            .map(|this| this.attr_or_empty("value").to_string())
            .unwrap_or_default();

        let preface = doc.find_descendant("preface");
        let block = |name: &str, tag: &str| preface.map(|p| block_text(p, name, tag)).unwrap_or_default();

        let document_date = preface
            .and_then(|p| {
                p.descendants_named("block")
                    .filter(|b| b.attr("name") == Some("date_en"))
                    .find_map(|b| b.child("docDate"))
            })
            .map(|d| d.attr_or_empty("date").to_string())
            .unwrap_or_default();

        let doc_number = |prefix: &str| {
            preface
                .and_then(|p| {
                    p.descendants_named("docNumber")
                        .find(|n| n.attr("refersTo").is_some_and(|r| r.starts_with(prefix)))
                })
                .map(|n| n.text().trim().to_string())
                .unwrap_or_default()
        };

        Self {
            doc_id,
            source_type: source_type.to_string(),
            date: record.attr_or_empty("date").to_string(),
            title_ga: block("title_ga", "docTitle"),
            title_en: block("title_en", "docTitle"),
            proponent_ga: block("proponent_ga", "docProponent"),
            proponent_en: block("proponent_en", "docProponent"),
            status_ga: block("status_ga", "docStatus"),
            status_en: block("status_en", "docStatus"),
            document_date,
            volume: doc_number("#vol_"),
            number: doc_number("#no_"),
            committee_name: record.attr_or_empty("slug").to_string(),
            question_type: record.attr_or_empty("question_type").to_string(),
            question_number: record.attr_or_empty("number").to_string(),
        }
    }

    /// A row carrying this metadata with every row-level field empty.
    pub fn row(&self, element_type: ElementType) -> FlatRow {
        FlatRow {
            doc_id: self.doc_id.clone(),
            source_type: self.source_type.clone(),
            date: self.date.clone(),
            title_ga: self.title_ga.clone(),
            title_en: self.title_en.clone(),
            proponent_ga: self.proponent_ga.clone(),
            proponent_en: self.proponent_en.clone(),
            status_ga: self.status_ga.clone(),
            status_en: self.status_en.clone(),
            document_date: self.document_date.clone(),
            volume: self.volume.clone(),
            number: self.number.clone(),
            committee_name: self.committee_name.clone(),
            question_type: self.question_type.clone(),
            question_number: self.question_number.clone(),
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
            text: String::new(),
            heading_text: String::new(),
            heading_time: String::new(),
            attendance: String::new(),
        }
    }
}

/// Leading text of `block[@name=name]/tag` anywhere under the preface.
fn block_text(preface: &Element, name: &str, tag: &str) -> String {
    preface
        .descendants_named("block")
        .filter(|b| b.attr("name") == Some(name))
        .find_map(|b| b.child(tag))
        .map(|el| el.text().trim().to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

fn attendance_rows(meta: &DocumentMeta, doc: &Element, rows: &mut Vec<FlatRow>) {
    let Some(roll) = doc.find_descendant("rollCall") else {
        return;
    };

    let header = roll
        .child("summary")
        .map(|s| s.text().trim().to_string())
        .unwrap_or_default();

    let mut persons = Vec::new();
    persons_in_tables(roll, false, &mut persons);

    for person in persons {
        let name = person.text().trim().to_string();
        let mut row = meta.row(ElementType::Attendance);
        row.text = header.clone();
        row.speaker_id = person.attr_or_empty("refersTo").trim_start_matches('#').to_string();
        row.speaker_name = name.clone();
        row.attendance = name;
        rows.push(row);
    }
}

/// Persons with at least one `table` ancestor below `el`, each once.
fn persons_in_tables<'a>(el: &'a Element, in_table: bool, out: &mut Vec<&'a Element>) {
    for child in el.elements() {
        if in_table && child.name == "person" {
            out.push(child);
        }
        persons_in_tables(child, in_table || child.name == "table", out);
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn section_rows(meta: &DocumentMeta, doc: &Element, rows: &mut Vec<FlatRow>) {
    for section in doc.descendants_named("debateSection") {
        let section_name = section.attr_or_empty("name");
        let section_id = section.attr_or_empty("eId");

        let heading = section.child("heading");
        let heading_text = heading
            .map(|h| h.text().trim().to_string())
            .unwrap_or_default();
        let heading_time = heading
            .and_then(|h| h.child("recordedTime"))
            .map(|t| t.attr_or_empty("time").to_string())
            .unwrap_or_default();

        let section_row = |element_type: ElementType| {
            let mut row = meta.row(element_type);
            row.section_name = section_name.to_string();
            row.section_id = section_id.to_string();
            row.heading_text = heading_text.clone();
            row.heading_time = heading_time.clone();
            row
        };

        for summary in section.children_named("summary") {
            let mut row = section_row(ElementType::Summary);
            row.element_id = summary.attr_or_empty("eId").to_string();
            row.text = summary.text().trim().to_string();
            rows.push(row);
        }

        for speech in section.children_named("speech") {
            let from = speech.child("from");
            let speaker_name = from
                .map(|f| f.text().trim().to_string())
                .unwrap_or_default();
            let recorded_time = from
                .and_then(|f| f.child("recordedTime"))
                .map(|t| t.attr_or_empty("time").to_string())
                .unwrap_or_default();

            for p in speech.children_named("p") {
                let mut row = section_row(ElementType::Speech);
                row.element_id = speech.attr_or_empty("eId").to_string();
                row.speaker_id = speech.attr_or_empty("by").to_string();
                row.speaker_role = speech.attr_or_empty("as").to_string();
                row.speaker_name = speaker_name.clone();
                row.recorded_time = recorded_time.clone();
                row.text = p.itertext().trim().to_string();
                rows.push(row);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

/// Pair the n-th `question` with the n-th `speech`, padding the shorter side.
fn question_rows(meta: &DocumentMeta, doc: &Element, rows: &mut Vec<FlatRow>) {
    let questions: Vec<&Element> = doc.descendants_named("question").collect();
    let answers: Vec<&Element> = doc.descendants_named("speech").collect();

    for i in 0..questions.len().max(answers.len()) {
        let question = questions.get(i).copied();
        let answer = answers.get(i).copied();

        let question_text = question.map(paragraph_text).unwrap_or_default();
        let answer_text = answer.map(paragraph_text).unwrap_or_default();

        let mut row = meta.row(ElementType::Question);
        row.element_id = question
            .map(|q| q.attr_or_empty("eId").to_string())
            .unwrap_or_default();
        row.topic = question
            .map(|q| q.attr_or_empty("to").to_string())
            .unwrap_or_default();
        row.text = format!("{question_text} {answer_text}").trim().to_string();
        row.question = question_text;
        row.written_answer = answer_text;
        rows.push(row);
    }
}

/// Trimmed text of each `p` child, space-joined.
fn paragraph_text(el: &Element) -> String {
    el.children_named("p")
        .map(|p| p.itertext().trim().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{RecordEvent, RecordReader};

    /// Parse the first record of an XML string.
    fn record(xml: &str) -> Element {
        let mut reader = RecordReader::new(xml.as_bytes(), "debate");
        match reader.next_record().unwrap() {
            Some(RecordEvent::Complete { .. }) => reader.record().unwrap().clone(),
            other => panic!("expected a record, got {other:?}"),
        }
    }

    fn rows(xml: &str) -> Vec<FlatRow> {
        match extract_rows(&record(xml)) {
            Extraction::Rows(rows) => rows,
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn strategies_in_order() {
        let direct = record(r#"<debate type="dail"><data><akomaNtoso id="d"/></data></debate>"#);
        assert_eq!(locate_document(&direct).map(|(s, _)| s), Some("direct"));

        let wrapped = record(
            r#"<debate type="dail"><data><wrap><akomaNtoso/></wrap></data></debate>"#,
        );
        assert_eq!(locate_document(&wrapped).map(|(s, _)| s), Some("wrapped"));

        let deep = record(
            r#"<debate type="dail"><other><x><akomaNtoso/></x></other></debate>"#,
        );
        assert_eq!(locate_document(&deep).map(|(s, _)| s), Some("descendant"));

        let none = record(r#"<debate type="dail"><data/></debate>"#);
        assert!(locate_document(&none).is_none());
        assert_eq!(extract_rows(&none), Extraction::NoDocument);
    }

    #[test]
    fn kind_attribute_counts_as_type() {
        let rec = record(r#"<debate kind="seanad"><data><akomaNtoso/></data></debate>"#);
        assert_eq!(record_type(&rec), Some("seanad"));
        assert_eq!(extract_rows(&rec), Extraction::Rows(vec![]));
    }

    #[test]
    fn untyped_record() {
        let rec = record(r#"<debate><data><akomaNtoso/></data></debate>"#);
        assert_eq!(extract_rows(&rec), Extraction::Untyped);
    }

    #[test]
    fn metadata_from_preface() {
        let xml = r##"<debate type="committee" date="2023-05-04" slug="health">
<data><akomaNtoso><debate>
  <meta><identification><FRBRWork><FRBRthis value="/akn/ie/debateRecord/health/2023-05-04/debate/main"/></FRBRWork></identification></meta>
  <preface>
    <block name="title_ga"><docTitle>Comhchoiste</docTitle></block>
    <block name="title_en"><docTitle> Joint Committee on Health </docTitle></block>
    <block name="date_en"><docDate date="2023-05-04">Thursday</docDate></block>
    <container name="num"><p><docNumber refersTo="#vol_12">Vol. 12</docNumber><docNumber refersTo="#no_3">No. 3</docNumber></p></container>
  </preface>
  <debateBody><debateSection name="prelude" eId="dbsect_1"><summary eId="sum_1">Opened.</summary></debateSection></debateBody>
</debate></akomaNtoso></data></debate>"##;

        let rows = rows(xml);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.doc_id, "/akn/ie/debateRecord/health/2023-05-04/debate/main");
        assert_eq!(row.title_ga, "Comhchoiste");
        assert_eq!(row.title_en, "Joint Committee on Health");
        assert_eq!(row.proponent_en, "");
        assert_eq!(row.document_date, "2023-05-04");
        assert_eq!(row.volume, "Vol. 12");
        assert_eq!(row.number, "No. 3");
        assert_eq!(row.committee_name, "health");
        assert_eq!(row.element_type, ElementType::Summary);
        assert_eq!(row.element_id, "sum_1");
        assert_eq!(row.text, "Opened.");
    }

    #[test]
    fn speech_rows_per_paragraph() {
        let xml = r##"<debate type="dail" date="2024-01-01"><data><akomaNtoso>
<debateSection name="questions" eId="dbsect_2">
  <heading>Health Services <recordedTime time="2024-01-01T14:00:00"/></heading>
  <speech by="#MaryMurphy" as="#Minister" eId="spk_1">
    <from>Deputy Mary Murphy<recordedTime time="2024-01-01T14:01:00"/></from>
    <p eId="para_1"> First <i>point</i>. </p>
    <p eId="para_2">Second.</p>
  </speech>
</debateSection></akomaNtoso></data></debate>"##;

        let rows = rows(xml);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.element_type == ElementType::Speech));
        assert_eq!(rows[0].text, "First point.");
        assert_eq!(rows[1].text, "Second.");
        assert_eq!(rows[0].speaker_id, "#MaryMurphy");
        assert_eq!(rows[0].speaker_role, "#Minister");
        assert_eq!(rows[0].speaker_name, "Deputy Mary Murphy");
        assert_eq!(rows[0].recorded_time, "2024-01-01T14:01:00");
        assert_eq!(rows[0].heading_text, "Health Services");
        assert_eq!(rows[0].heading_time, "2024-01-01T14:00:00");
        assert_eq!(rows[0].section_id, "dbsect_2");
        assert_eq!(rows[0].element_id, "spk_1");
    }

    #[test]
    fn nested_tables_count_persons_once() {
        let xml = r##"<debate type="committee"><data><akomaNtoso>
<rollCall><summary>Present:</summary>
  <table><tr><td><person refersTo="#A">A</person>
    <table><tr><td><person refersTo="#B">B</person></td></tr></table>
  </td></tr></table>
  <person refersTo="#Outside">Not in a table</person>
</rollCall></akomaNtoso></data></debate>"##;

        let rows = rows(xml);
        let ids: Vec<&str> = rows.iter().map(|r| r.speaker_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn questions_only_for_question_records() {
        let body = r#"<data><akomaNtoso>
<question eId="q_1" to="Minister for Health"><p>Will the Minister act?</p></question>
<speech eId="a_1"><p>Yes.</p></speech>
</akomaNtoso></data>"#;

        let qrows = rows(&format!(r#"<debate type="questions">{body}</debate>"#));
        assert_eq!(qrows.len(), 1);
        assert_eq!(qrows[0].question, "Will the Minister act?");
        assert_eq!(qrows[0].written_answer, "Yes.");
        assert_eq!(qrows[0].text, "Will the Minister act? Yes.");
        assert_eq!(qrows[0].topic, "Minister for Health");

        let drows = rows(&format!(r#"<debate type="dail">{body}</debate>"#));
        assert!(drows.is_empty());
    }

    #[test]
    fn unanswered_question_has_empty_answer() {
        let xml = r#"<debate type="questions"><data><akomaNtoso>
<question eId="q_1"><p>One?</p></question>
<question eId="q_2"><p>Two?</p></question>
<speech><p>Answer one.</p></speech>
</akomaNtoso></data></debate>"#;

        let rows = rows(xml);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].element_id, "q_2");
        assert_eq!(rows[1].written_answer, "");
        assert_eq!(rows[1].text, "Two?");
    }
}
