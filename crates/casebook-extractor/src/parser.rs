//! Parse LLM output into field candidates

use crate::error::ExtractorError;
use casebook_domain::{FieldCandidate, FieldKind, FieldSchema, FieldValue};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

/// Parse an LLM extraction response into field candidates
///
/// Malformed entries are skipped with a warning; a response where every
/// entry is malformed still parses to an empty set. Only unparseable JSON
/// is an error.
pub fn parse_candidates(
    response: &str,
    schema: &FieldSchema,
) -> Result<Vec<FieldCandidate>, ExtractorError> {
    let json_str = extract_json(response)?;

    let json: Value = serde_json::from_str(&json_str)
        .map_err(|e| ExtractorError::InvalidFormat(format!("JSON parse error: {}", e)))?;

    let entries = json
        .as_array()
        .ok_or_else(|| ExtractorError::InvalidFormat("Expected JSON array".to_string()))?;

    let mut candidates = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        match parse_candidate_json(entry, schema) {
            Ok(candidate) => {
                if let Err(e) = candidate.validate() {
                    warn!("candidate {} failed validation: {}", idx, e);
                    continue;
                }
                candidates.push(candidate);
            }
            Err(e) => {
                warn!("failed to parse candidate {}: {}", idx, e);
            }
        }
    }

    Ok(candidates)
}

/// Parse an LLM clarification response
///
/// `null` means the model could not disambiguate. A returned candidate is
/// parsed against the requested field's declared kind and forced onto the
/// requested field even if the model mislabeled it; a value the kind
/// cannot parse counts as no answer, not an error.
pub fn parse_clarification(
    response: &str,
    schema: &FieldSchema,
    field_name: &str,
) -> Result<Option<FieldCandidate>, ExtractorError> {
    let json_str = extract_json(response)?;

    let json: Value = serde_json::from_str(&json_str)
        .map_err(|e| ExtractorError::InvalidFormat(format!("JSON parse error: {}", e)))?;

    if json.is_null() {
        return Ok(None);
    }

    let obj = json
        .as_object()
        .ok_or_else(|| ExtractorError::InvalidFormat("Candidate is not a JSON object".to_string()))?;

    if let Some(answered) = obj.get("field_name").and_then(|v| v.as_str()) {
        if answered != field_name {
            warn!(
                "clarification answered '{}' instead of '{}'",
                answered, field_name
            );
        }
    }

    let spec = schema
        .spec(field_name)
        .map_err(|e| ExtractorError::InvalidFormat(e.to_string()))?;
    let raw_value = obj
        .get("value")
        .ok_or_else(|| ExtractorError::InvalidFormat("Missing 'value'".to_string()))?;
    let value = match parse_value(spec.kind, raw_value) {
        Ok(value) => value,
        Err(e) => {
            warn!("clarification value unusable for '{}': {}", field_name, e);
            return Ok(None);
        }
    };

    let confidence = obj
        .get("confidence")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ExtractorError::InvalidFormat("Missing or invalid 'confidence'".to_string()))?;

    let mut candidate = FieldCandidate::new(field_name, value, confidence);
    if let Some(citation) = obj.get("citation").and_then(|v| v.as_str()) {
        candidate = candidate.with_citation(citation);
    }
    if let Some(reasoning) = obj.get("reasoning").and_then(|v| v.as_str()) {
        candidate = candidate.with_reasoning(reasoning);
    }

    candidate
        .validate()
        .map_err(ExtractorError::InvalidFormat)?;

    Ok(Some(candidate))
}

/// Extract JSON from a response, handling markdown code blocks
fn extract_json(response: &str) -> Result<String, ExtractorError> {
    let trimmed = response.trim();

    if trimmed.starts_with("```json") || trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() < 2 {
            return Err(ExtractorError::InvalidFormat("Empty code block".to_string()));
        }

        // Skip first line (```json or ```) and last line (```)
        let json_lines = &lines[1..lines.len().saturating_sub(1)];
        Ok(json_lines.join("\n"))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Parse a single candidate object against the schema
fn parse_candidate_json(json: &Value, schema: &FieldSchema) -> Result<FieldCandidate, String> {
    let obj = json
        .as_object()
        .ok_or_else(|| "Candidate is not a JSON object".to_string())?;

    let field_name = obj
        .get("field_name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "Missing or invalid 'field_name'".to_string())?
        .to_string();

    // Hallucinated field names are skipped, not fatal
    let spec = schema
        .spec(&field_name)
        .map_err(|_| format!("Field '{}' is not in the schema", field_name))?;

    let raw_value = obj
        .get("value")
        .ok_or_else(|| "Missing 'value'".to_string())?;
    let value = parse_value(spec.kind, raw_value)?;

    let confidence = obj
        .get("confidence")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| "Missing or invalid 'confidence'".to_string())?;

    let mut candidate = FieldCandidate::new(field_name, value, confidence);

    if let Some(citation) = obj.get("citation").and_then(|v| v.as_str()) {
        candidate = candidate.with_citation(citation);
    }
    if let Some(reasoning) = obj.get("reasoning").and_then(|v| v.as_str()) {
        candidate = candidate.with_reasoning(reasoning);
    }

    Ok(candidate)
}

/// Parse a JSON value into the field's declared kind
pub(crate) fn parse_value(kind: FieldKind, raw: &Value) -> Result<FieldValue, String> {
    match kind {
        FieldKind::Numeric => {
            // Models sometimes quote numbers
            let n = raw
                .as_f64()
                .or_else(|| raw.as_str().and_then(|s| s.trim().parse().ok()))
                .ok_or_else(|| format!("Expected a number, got {}", raw))?;
            Ok(FieldValue::Numeric(n))
        }
        FieldKind::Date => {
            let s = raw
                .as_str()
                .ok_or_else(|| format!("Expected a date string, got {}", raw))?;
            let date: NaiveDate = s
                .trim()
                .parse()
                .map_err(|e| format!("Invalid date '{}': {}", s, e))?;
            Ok(FieldValue::Date(date))
        }
        FieldKind::Code => {
            let s = raw
                .as_str()
                .ok_or_else(|| format!("Expected a code string, got {}", raw))?;
            Ok(FieldValue::Code(s.to_string()))
        }
        FieldKind::Text => {
            let s = raw
                .as_str()
                .ok_or_else(|| format!("Expected a text string, got {}", raw))?;
            Ok(FieldValue::Text(s.to_string()))
        }
    }
}
