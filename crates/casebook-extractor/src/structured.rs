//! Structured warehouse record parsing
//!
//! The structured source arrives as one flat JSON object keyed by field
//! name, with optional `<field>_complete` boolean markers from the
//! warehouse's own completeness audit. No LLM is involved; values map
//! directly onto schema kinds with a fixed high confidence.

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::parser::parse_value;
use casebook_domain::{FieldCandidate, FieldSchema, SourceExtraction};
use serde_json::Value;
use tracing::debug;

/// Parses the structured record into a source extraction
#[derive(Debug, Clone)]
pub struct StructuredRecordParser {
    confidence: f64,
}

impl StructuredRecordParser {
    /// Create a parser assigning `confidence` to every structured value
    pub fn new(confidence: f64) -> Self {
        Self { confidence }
    }

    /// Create a parser using the configured structured-record confidence
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(config.structured_confidence)
    }

    /// Parse one warehouse record
    ///
    /// Keys absent from the schema are ignored (the warehouse carries many
    /// columns beyond the requested concept). Null and missing values
    /// produce no candidate. A value of the wrong shape is an error: the
    /// warehouse is a trusted source and malformed data there must surface.
    pub fn parse(
        &self,
        source_id: impl Into<String>,
        record: &Value,
        schema: &FieldSchema,
    ) -> Result<SourceExtraction, ExtractorError> {
        let obj = record.as_object().ok_or_else(|| {
            ExtractorError::StructuredRecord("record is not a JSON object".to_string())
        })?;

        let mut candidates = Vec::new();

        for name in schema.field_names() {
            let raw = match obj.get(name) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };

            let spec = schema
                .spec(name)
                .map_err(|e| ExtractorError::StructuredRecord(e.to_string()))?;

            let value = parse_value(spec.kind, raw).map_err(|e| {
                ExtractorError::StructuredRecord(format!("field '{}': {}", name, e))
            })?;

            // Present values count as complete unless the audit says otherwise
            let complete = obj
                .get(&format!("{}_complete", name))
                .and_then(|v| v.as_bool())
                .unwrap_or(true);

            let mut candidate = FieldCandidate::new(name, value, self.confidence);
            candidate.complete = complete;
            candidates.push(candidate);
        }

        debug!(
            fields = candidates.len(),
            "parsed structured record into candidates"
        );

        Ok(SourceExtraction::structured(source_id, candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casebook_domain::{FieldSpec, FieldValue, SourceKind};
    use serde_json::json;

    fn schema() -> FieldSchema {
        FieldSchema::new(vec![
            FieldSpec::numeric("dose_cgy").required(),
            FieldSpec::date("start_date").required(),
            FieldSpec::code("site", &["breast", "lung"]),
        ])
    }

    #[test]
    fn test_parse_full_record() {
        let record = json!({
            "dose_cgy": 5400,
            "start_date": "2019-07-15",
            "site": "BREAST",
            "unrelated_column": "ignored"
        });

        let extraction = StructuredRecordParser::new(0.95)
            .parse("aria:123", &record, &schema())
            .unwrap();

        assert_eq!(extraction.source_kind, SourceKind::Structured);
        assert_eq!(extraction.source_id, "aria:123");
        assert_eq!(extraction.candidates.len(), 3);
        for candidate in &extraction.candidates {
            assert_eq!(candidate.confidence, 0.95);
            assert!(candidate.complete);
        }
    }

    #[test]
    fn test_from_config_uses_structured_confidence() {
        let mut config = ExtractorConfig::default();
        config.structured_confidence = 0.85;
        let record = json!({"dose_cgy": 5400});

        let extraction = StructuredRecordParser::from_config(&config)
            .parse("aria:123", &record, &schema())
            .unwrap();

        assert_eq!(extraction.candidates[0].confidence, 0.85);
    }

    #[test]
    fn test_null_and_missing_fields_skipped() {
        let record = json!({
            "dose_cgy": 5400,
            "start_date": null
        });

        let extraction = StructuredRecordParser::new(0.95)
            .parse("aria:123", &record, &schema())
            .unwrap();

        assert_eq!(extraction.candidates.len(), 1);
        assert_eq!(extraction.candidates[0].field_name, "dose_cgy");
    }

    #[test]
    fn test_completeness_marker_respected() {
        let record = json!({
            "dose_cgy": 5400,
            "dose_cgy_complete": false,
            "start_date": "2019-07-15"
        });

        let extraction = StructuredRecordParser::new(0.95)
            .parse("aria:123", &record, &schema())
            .unwrap();

        let dose = extraction
            .candidates
            .iter()
            .find(|c| c.field_name == "dose_cgy")
            .unwrap();
        let start = extraction
            .candidates
            .iter()
            .find(|c| c.field_name == "start_date")
            .unwrap();

        assert!(!dose.complete);
        assert!(start.complete);
    }

    #[test]
    fn test_malformed_value_is_error() {
        let record = json!({"start_date": "not a date"});
        let result = StructuredRecordParser::new(0.95).parse("aria:123", &record, &schema());
        assert!(matches!(result, Err(ExtractorError::StructuredRecord(_))));
    }

    #[test]
    fn test_non_object_record_is_error() {
        let result =
            StructuredRecordParser::new(0.95).parse("aria:123", &json!([1, 2]), &schema());
        assert!(matches!(result, Err(ExtractorError::StructuredRecord(_))));
    }

    #[test]
    fn test_values_parse_to_declared_kinds() {
        let record = json!({"dose_cgy": "5400", "site": "breast"});
        let extraction = StructuredRecordParser::new(0.9)
            .parse("aria:123", &record, &schema())
            .unwrap();

        let dose = extraction
            .candidates
            .iter()
            .find(|c| c.field_name == "dose_cgy")
            .unwrap();
        assert_eq!(dose.value, FieldValue::Numeric(5400.0));
    }
}
