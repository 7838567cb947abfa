//! Record-level metrics

use casebook_domain::{AdjudicatedField, FieldSchema};
use std::collections::BTreeMap;

/// Weighted mean of field confidences, weights from the schema
pub fn overall_confidence(
    fields: &BTreeMap<String, AdjudicatedField>,
    schema: &FieldSchema,
) -> f64 {
    let mut total_weight = 0.0;
    let mut weighted = 0.0;
    for (name, field) in fields {
        let weight = schema.spec(name).map(|s| s.weight).unwrap_or(1.0);
        total_weight += weight;
        weighted += weight * field.confidence;
    }
    if total_weight == 0.0 {
        0.0
    } else {
        weighted / total_weight
    }
}

/// Required fields carrying a final value, over all required fields.
/// 1.0 when the schema requires nothing.
pub fn completeness_ratio(
    fields: &BTreeMap<String, AdjudicatedField>,
    schema: &FieldSchema,
) -> f64 {
    let required = schema.required_fields();
    if required.is_empty() {
        return 1.0;
    }
    let filled = required
        .iter()
        .filter(|name| {
            fields
                .get(**name)
                .map(|f| f.final_value.is_some())
                .unwrap_or(false)
        })
        .count();
    filled as f64 / required.len() as f64
}
