//! Field candidates and per-source extraction results

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed field value
///
/// Fields are dynamically schemed (the set of extractable variables is
/// caller-defined), so values are a tagged variant rather than generics.
/// Normalization and equivalence per kind live in [`crate::schema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Numeric value in the field's canonical unit (e.g., dose in cGy)
    Numeric(f64),
    /// Calendar date
    Date(NaiveDate),
    /// Controlled-vocabulary code (e.g., a treatment site)
    Code(String),
    /// Free text
    Text(String),
}

impl FieldValue {
    /// Numeric payload, if this is a numeric value
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(n) => Some(*n),
            _ => None,
        }
    }

    /// Date payload, if this is a date value
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// String payload for code and text values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Code(s) | FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Numeric(n) => write!(f, "{}", n),
            FieldValue::Date(d) => write!(f, "{}", d),
            FieldValue::Code(s) | FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Which kind of evidence source a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The single structured warehouse record
    Structured,
    /// One narrative document
    Document,
}

/// One proposed value for one field from one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCandidate {
    /// Field this candidate proposes a value for
    pub field_name: String,

    /// The proposed value
    pub value: FieldValue,

    /// Extractor confidence in [0.0, 1.0]
    pub confidence: f64,

    /// Kind of the originating source
    pub source_kind: SourceKind,

    /// Originating source id: structured-record id or document id
    pub source_id: String,

    /// Trust rank among document sources; lower is more trusted.
    /// Meaningless for the structured source.
    pub source_priority: i32,

    /// Date of the originating document, used for recency tie-breaks
    pub document_date: Option<NaiveDate>,

    /// Whether the originating source marks this field as complete.
    /// Set only by the structured-record parser.
    pub complete: bool,

    /// Evidence snippet supporting the value
    pub citation: Option<String>,

    /// Extractor rationale
    pub reasoning: Option<String>,
}

impl FieldCandidate {
    /// Create a candidate with provenance fields defaulted; the owning
    /// [`SourceExtraction`] stamps source identity on construction.
    pub fn new(field_name: impl Into<String>, value: FieldValue, confidence: f64) -> Self {
        Self {
            field_name: field_name.into(),
            value,
            confidence,
            source_kind: SourceKind::Document,
            source_id: String::new(),
            source_priority: i32::MAX,
            document_date: None,
            complete: false,
            citation: None,
            reasoning: None,
        }
    }

    /// Attach an evidence citation
    pub fn with_citation(mut self, citation: impl Into<String>) -> Self {
        self.citation = Some(citation.into());
        self
    }

    /// Attach extractor rationale
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Validate invariants that every candidate must satisfy
    pub fn validate(&self) -> Result<(), String> {
        if self.field_name.is_empty() {
            return Err("field_name is empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence {} out of range [0.0, 1.0]",
                self.confidence
            ));
        }
        Ok(())
    }
}

/// The full candidate set produced from one source for one concept
///
/// Created once per source per extraction pass and never mutated. The
/// constructor stamps source identity onto every candidate so provenance
/// cannot drift from the owning source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceExtraction {
    /// Kind of this source
    pub source_kind: SourceKind,

    /// Structured-record id or document id
    pub source_id: String,

    /// Trust rank among document sources (lower = more trusted)
    pub source_priority: i32,

    /// Document date, for recency ordering; None for the structured source
    pub document_date: Option<NaiveDate>,

    /// All candidates this source produced
    pub candidates: Vec<FieldCandidate>,
}

impl SourceExtraction {
    /// Build the extraction for the single structured source
    pub fn structured(source_id: impl Into<String>, candidates: Vec<FieldCandidate>) -> Self {
        Self::stamp(SourceKind::Structured, source_id.into(), 0, None, candidates)
    }

    /// Build the extraction for one document source
    pub fn document(
        source_id: impl Into<String>,
        source_priority: i32,
        document_date: NaiveDate,
        candidates: Vec<FieldCandidate>,
    ) -> Self {
        Self::stamp(
            SourceKind::Document,
            source_id.into(),
            source_priority,
            Some(document_date),
            candidates,
        )
    }

    fn stamp(
        source_kind: SourceKind,
        source_id: String,
        source_priority: i32,
        document_date: Option<NaiveDate>,
        mut candidates: Vec<FieldCandidate>,
    ) -> Self {
        for candidate in &mut candidates {
            candidate.source_kind = source_kind;
            candidate.source_id = source_id.clone();
            candidate.source_priority = source_priority;
            candidate.document_date = document_date;
        }
        Self {
            source_kind,
            source_id,
            source_priority,
            document_date,
            candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_candidate_validation() {
        let candidate = FieldCandidate::new("dose_cgy", FieldValue::Numeric(5400.0), 0.9);
        assert!(candidate.validate().is_ok());
    }

    #[test]
    fn test_candidate_confidence_out_of_range() {
        let candidate = FieldCandidate::new("dose_cgy", FieldValue::Numeric(5400.0), 1.2);
        assert!(candidate.validate().is_err());
    }

    #[test]
    fn test_candidate_empty_field_name() {
        let candidate = FieldCandidate::new("", FieldValue::Text("x".to_string()), 0.5);
        assert!(candidate.validate().is_err());
    }

    #[test]
    fn test_source_extraction_stamps_provenance() {
        let candidates = vec![
            FieldCandidate::new("start_date", FieldValue::Date(date("2019-07-15")), 0.8),
            FieldCandidate::new("dose_cgy", FieldValue::Numeric(5400.0), 0.7),
        ];
        let extraction =
            SourceExtraction::document("doc-17", 2, date("2019-08-01"), candidates);

        for candidate in &extraction.candidates {
            assert_eq!(candidate.source_kind, SourceKind::Document);
            assert_eq!(candidate.source_id, "doc-17");
            assert_eq!(candidate.source_priority, 2);
            assert_eq!(candidate.document_date, Some(date("2019-08-01")));
        }
    }

    #[test]
    fn test_structured_extraction_has_no_document_date() {
        let candidates = vec![FieldCandidate::new(
            "site",
            FieldValue::Code("BREAST".to_string()),
            0.95,
        )];
        let extraction = SourceExtraction::structured("aria:123", candidates);

        assert_eq!(extraction.source_kind, SourceKind::Structured);
        assert_eq!(extraction.candidates[0].document_date, None);
        assert_eq!(extraction.candidates[0].source_id, "aria:123");
    }

    #[test]
    fn test_field_value_accessors() {
        assert_eq!(FieldValue::Numeric(3.5).as_numeric(), Some(3.5));
        assert_eq!(FieldValue::Text("x".to_string()).as_numeric(), None);
        assert_eq!(
            FieldValue::Date(date("2020-01-02")).as_date(),
            Some(date("2020-01-02"))
        );
        assert_eq!(FieldValue::Code("LUNG".to_string()).as_str(), Some("LUNG"));
    }
}
