//! Clarification request assembly

use casebook_domain::traits::ClarificationRequest;
use casebook_domain::FieldCandidate;

/// Build the targeted re-read request for one ambiguous field
///
/// Evidence lines quote each candidate's citation when the extractor
/// recorded one, falling back to the bare value.
pub fn build_request(
    field_name: &str,
    question: String,
    candidates: &[FieldCandidate],
) -> ClarificationRequest {
    let evidence = candidates
        .iter()
        .map(|c| {
            let support = c
                .citation
                .clone()
                .unwrap_or_else(|| c.value.to_string());
            match c.document_date {
                Some(date) => format!("{} ({}): {}", c.source_id, date, support),
                None => format!("{}: {}", c.source_id, support),
            }
        })
        .collect();

    ClarificationRequest {
        field_name: field_name.to_string(),
        question,
        evidence,
    }
}

/// Cap a confidence strictly below `cap`
pub(crate) fn cap_below(confidence: f64, cap: f64) -> f64 {
    confidence.min(cap - f64::EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use casebook_domain::{FieldValue, SourceExtraction};
    use chrono::NaiveDate;

    #[test]
    fn test_evidence_prefers_citations() {
        let date: NaiveDate = "2019-08-01".parse().unwrap();
        let extraction = SourceExtraction::document(
            "doc-a",
            1,
            date,
            vec![
                FieldCandidate::new("start_date", FieldValue::Date("2019-07-15".parse().unwrap()), 0.8)
                    .with_citation("treatment began July 15"),
                FieldCandidate::new("start_date", FieldValue::Date("2019-07-20".parse().unwrap()), 0.7),
            ],
        );

        let request = build_request(
            "start_date",
            "Which start date is correct?".to_string(),
            &extraction.candidates,
        );

        assert_eq!(request.field_name, "start_date");
        assert_eq!(request.evidence.len(), 2);
        assert_eq!(request.evidence[0], "doc-a (2019-08-01): treatment began July 15");
        assert_eq!(request.evidence[1], "doc-a (2019-08-01): 2019-07-20");
    }

    #[test]
    fn test_cap_is_strict() {
        assert!(cap_below(0.9, 0.5) < 0.5);
        assert!(cap_below(0.2, 0.5) == 0.2);
    }
}
