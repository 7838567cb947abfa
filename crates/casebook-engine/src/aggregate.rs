//! Source aggregation
//!
//! Flattens per-source extractions into a per-field candidate map with a
//! fully deterministic source order, so the per-field algorithm sees the
//! same input regardless of extraction completion order.

use casebook_domain::{FieldCandidate, SourceExtraction};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Group all candidates by field name
///
/// Order within each field's list: the structured source first, then
/// documents by ascending `source_priority`, ties by descending
/// `document_date`, final ties by `source_id`. Sources without a date sort
/// after dated ones at the same priority.
pub fn aggregate(
    structured: Option<&SourceExtraction>,
    documents: &[SourceExtraction],
) -> BTreeMap<String, Vec<FieldCandidate>> {
    let mut ordered_docs: Vec<&SourceExtraction> = documents.iter().collect();
    ordered_docs.sort_by(|a, b| {
        (a.source_priority, Reverse(a.document_date), &a.source_id)
            .cmp(&(b.source_priority, Reverse(b.document_date), &b.source_id))
    });

    let mut map: BTreeMap<String, Vec<FieldCandidate>> = BTreeMap::new();
    let sources = structured.into_iter().chain(ordered_docs);
    for source in sources {
        for candidate in &source.candidates {
            map.entry(candidate.field_name.clone())
                .or_default()
                .push(candidate.clone());
        }
    }
    map
}
