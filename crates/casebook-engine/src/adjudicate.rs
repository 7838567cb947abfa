//! The adjudication run: aggregation, per-field resolution, consistency
//! pass, and the bounded clarification loop
//!
//! A run is a pure function of its inputs; the engine holds no state
//! between runs. A run always produces an `AdjudicatedRecord`, possibly
//! with review flags and recorded findings. Only invalid configuration
//! and programmer errors (unknown fields, malformed rules) abort.

use crate::aggregate::aggregate;
use crate::clarify::{build_request, cap_below};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::metrics::{completeness_ratio, overall_confidence};
use crate::resolve::resolve_field;
use casebook_domain::traits::FieldExtractor;
use casebook_domain::{
    AdjudicatedField, AdjudicatedRecord, ClarificationOutcome, ClarificationRound, Conflict,
    FieldCandidate, FieldSchema, RecordId, SourceExtraction,
};
use casebook_rules::RuleSet;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Run one full adjudication for one patient/concept
pub fn adjudicate<E>(
    patient_id: &str,
    concept: &str,
    structured: Option<&SourceExtraction>,
    documents: &[SourceExtraction],
    extractor: &E,
    schema: &FieldSchema,
    rules: &RuleSet,
    config: &EngineConfig,
) -> Result<AdjudicatedRecord, EngineError>
where
    E: FieldExtractor,
    E::Error: std::fmt::Display,
{
    config.validate().map_err(EngineError::Config)?;
    rules.validate(schema)?;

    let mut candidate_map = aggregate(structured, documents);

    // A candidate naming an undeclared field is a programmer error
    for name in candidate_map.keys() {
        schema.spec(name)?;
    }

    let mut fields: BTreeMap<String, AdjudicatedField> = BTreeMap::new();
    for name in schema.field_names() {
        let candidates = candidate_map.get(name).map(Vec::as_slice).unwrap_or(&[]);
        fields.insert(
            name.to_string(),
            resolve_field(name, candidates, schema, config)?,
        );
    }

    let mut clarifications = Vec::new();
    let mut rounds_used: BTreeMap<String, u32> = BTreeMap::new();

    // Unresolved disagreements first
    let review_fields: Vec<String> = fields
        .iter()
        .filter(|(_, f)| f.needs_manual_review)
        .map(|(name, _)| name.clone())
        .collect();
    for name in review_fields {
        let question = format!("Multiple sources disagree on '{}'. Which value is correct?", name);
        run_rounds(
            &name,
            question,
            extractor,
            schema,
            config,
            &mut candidate_map,
            &mut fields,
            &mut rounds_used,
            &mut clarifications,
            |fields| !fields[&name].needs_manual_review,
        )?;
    }

    // Consistency pass over the settled field map; findings at or above
    // the severity floor get their own clarification rounds
    let mut inconsistencies = Vec::new();
    for rule in rules.iter() {
        let Some(mut finding) = rule.evaluate(&fields, schema)? else {
            continue;
        };
        info!(rule = %finding.rule_id, severity = ?finding.severity, "inconsistency detected");

        if finding.severity >= config.clarify_severity_floor {
            let target = finding
                .fields_involved
                .iter()
                .find(|name| {
                    fields
                        .get(*name)
                        .map(|f| f.final_value.is_some())
                        .unwrap_or(false)
                })
                .unwrap_or(&finding.fields_involved[0])
                .clone();
            let question = format!(
                "The current values violate a plausibility check ({}). What is the correct value of '{}'?",
                finding.description, target
            );

            let fixed = run_rounds(
                &target,
                question,
                extractor,
                schema,
                config,
                &mut candidate_map,
                &mut fields,
                &mut rounds_used,
                &mut clarifications,
                |fields| matches!(rule.evaluate(fields, schema), Ok(None)),
            )?;
            if fixed {
                finding.resolved = true;
            }
        }

        inconsistencies.push(finding);
    }

    for field in fields.values_mut() {
        field.finalize();
    }

    let record = AdjudicatedRecord {
        id: RecordId::new(),
        patient_id: patient_id.to_string(),
        concept: concept.to_string(),
        overall_confidence: overall_confidence(&fields, schema),
        completeness_ratio: completeness_ratio(&fields, schema),
        fields,
        inconsistencies,
        clarifications,
    };

    info!(
        patient = patient_id,
        concept,
        confidence = record.overall_confidence,
        completeness = record.completeness_ratio,
        rounds = record.clarifications.len(),
        "adjudication complete"
    );

    Ok(record)
}

/// Drive clarification rounds for one field until `satisfied` holds or
/// the field's round budget runs out
///
/// A usable answer replaces the field's candidate set and the per-field
/// algorithm re-runs for that field alone; prior conflicts are kept as
/// history. On exhaustion the field reverts to its best pre-clarification
/// result with confidence capped strictly below the review cap.
#[allow(clippy::too_many_arguments)]
fn run_rounds<E, F>(
    field_name: &str,
    question: String,
    extractor: &E,
    schema: &FieldSchema,
    config: &EngineConfig,
    candidate_map: &mut BTreeMap<String, Vec<FieldCandidate>>,
    fields: &mut BTreeMap<String, AdjudicatedField>,
    rounds_used: &mut BTreeMap<String, u32>,
    clarifications: &mut Vec<ClarificationRound>,
    mut satisfied: F,
) -> Result<bool, EngineError>
where
    E: FieldExtractor,
    E::Error: std::fmt::Display,
    F: FnMut(&BTreeMap<String, AdjudicatedField>) -> bool,
{
    let snapshot_field = fields.get(field_name).cloned();
    let snapshot_candidates = candidate_map.get(field_name).cloned().unwrap_or_default();
    let prior_conflicts: Vec<Conflict> = snapshot_field
        .as_ref()
        .map(|f| f.conflicts.clone())
        .unwrap_or_default();
    let mut ran_any = false;

    loop {
        let used = rounds_used.get(field_name).copied().unwrap_or(0);
        if used >= config.max_rounds {
            if !ran_any {
                // Budget already spent by an earlier trigger; leave the
                // field as it stands
                return Ok(false);
            }
            break;
        }
        let round_number = used + 1;
        rounds_used.insert(field_name.to_string(), round_number);
        ran_any = true;
        debug!(field = field_name, round = round_number, "clarification round");

        let request = build_request(
            field_name,
            question.clone(),
            candidate_map.get(field_name).map(Vec::as_slice).unwrap_or(&[]),
        );

        // Extractor failure is an unanswered round, not a run failure
        let answer = match extractor.clarify(&request) {
            Ok(answer) => answer,
            Err(e) => {
                warn!(field = field_name, error = %e, "clarification call failed");
                None
            }
        };

        let Some(mut candidate) = answer else {
            clarifications.push(ClarificationRound {
                round_number,
                field_name: field_name.to_string(),
                question: question.clone(),
                response: None,
                outcome: ClarificationOutcome::Unresolved,
            });
            continue;
        };

        if candidate.source_id.is_empty() {
            candidate.source_id = format!("clarification:round-{}", round_number);
        }
        let response_text = candidate.value.to_string();

        candidate_map.insert(field_name.to_string(), vec![candidate]);
        // An answer the schema cannot normalize (e.g. the wrong value
        // kind) is an unanswered round, not a run failure
        let mut updated = match resolve_field(
            field_name,
            candidate_map.get(field_name).map(Vec::as_slice).unwrap_or(&[]),
            schema,
            config,
        ) {
            Ok(updated) => updated,
            Err(e) => {
                warn!(field = field_name, error = %e, "clarification answer unusable");
                candidate_map.insert(field_name.to_string(), snapshot_candidates.clone());
                clarifications.push(ClarificationRound {
                    round_number,
                    field_name: field_name.to_string(),
                    question: question.clone(),
                    response: Some(response_text),
                    outcome: ClarificationOutcome::Unresolved,
                });
                continue;
            }
        };

        // Keep the disagreement history on the re-resolved field
        let mut history: Vec<Conflict> = prior_conflicts
            .iter()
            .cloned()
            .map(|mut c| {
                c.resolved = true;
                c
            })
            .collect();
        history.extend(std::mem::take(&mut updated.conflicts));
        updated.conflicts = history;
        fields.insert(field_name.to_string(), updated);

        let done = satisfied(fields);
        clarifications.push(ClarificationRound {
            round_number,
            field_name: field_name.to_string(),
            question: question.clone(),
            response: Some(response_text),
            outcome: if done {
                ClarificationOutcome::Resolved
            } else {
                ClarificationOutcome::Unresolved
            },
        });
        if done {
            return Ok(true);
        }
    }

    // Exhausted: revert to the best pre-clarification result, capped
    if let Some(last) = clarifications
        .iter_mut()
        .rev()
        .find(|r| r.field_name == field_name)
    {
        last.outcome = ClarificationOutcome::Exhausted;
    }

    let mut final_field =
        snapshot_field.unwrap_or_else(|| AdjudicatedField::absent(field_name));
    final_field.confidence = cap_below(final_field.confidence, config.review_confidence_cap);
    final_field.needs_manual_review = true;
    fields.insert(field_name.to_string(), final_field);
    candidate_map.insert(field_name.to_string(), snapshot_candidates);

    info!(
        field = field_name,
        "clarification exhausted; field finalized for manual review"
    );
    Ok(false)
}
