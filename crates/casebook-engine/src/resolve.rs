//! Per-field adjudication
//!
//! Pure and deterministic: given the same candidate list, schema, and
//! configuration, resolution always produces the same result. Candidate
//! order comes from [`crate::aggregate`], so the whole path is stable
//! across runs.
//!
//! Precedence on disagreement is an ordered list of named rules, each a
//! pure predicate, rather than nested conditionals; reordering policy
//! means reordering the list.

use crate::config::EngineConfig;
use crate::error::EngineError;
use casebook_domain::{
    AdjudicatedField, Conflict, FieldCandidate, FieldSchema, FieldState, FieldValue, SourceKind,
};
use tracing::debug;

/// Structured source is complete for the field and confident enough
pub const RULE_STRUCTURED_COMPLETE: &str = "structured_complete_and_confident";
/// Holders of the most trusted document priority agree on one value
pub const RULE_MOST_TRUSTED: &str = "most_trusted_document";
/// Holders of the most recent document date agree on one value
pub const RULE_MOST_RECENT: &str = "most_recent_document";
/// No precedence rule was decisive
pub const RULE_UNRESOLVED: &str = "unresolved";

/// Resolve one field from its aggregated candidates
///
/// Schema lookup failures abort: a candidate naming an undeclared field
/// is a programmer error, not a data condition.
pub fn resolve_field(
    field_name: &str,
    candidates: &[FieldCandidate],
    schema: &FieldSchema,
    config: &EngineConfig,
) -> Result<AdjudicatedField, EngineError> {
    if candidates.is_empty() {
        return Ok(AdjudicatedField::absent(field_name));
    }

    // Normalize once; all comparison below is on normalized values
    let mut normalized = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let value = schema.normalize(field_name, &candidate.value)?;
        normalized.push((candidate, value));
    }

    if normalized.len() == 1 {
        let (candidate, value) = &normalized[0];
        return Ok(AdjudicatedField {
            field_name: field_name.to_string(),
            final_value: Some(value.clone()),
            confidence: candidate.confidence,
            primary_source_id: Some(candidate.source_id.clone()),
            supporting_source_ids: Vec::new(),
            conflicts: Vec::new(),
            needs_manual_review: false,
            state: FieldState::SingleSource,
        });
    }

    if all_agree(field_name, &normalized, schema)? {
        return Ok(merge_agreeing(field_name, &normalized, config));
    }

    match pick_winner(field_name, &normalized, schema, config)? {
        Some((winner_idx, rule)) => {
            debug!(field = field_name, rule, "disagreement resolved by precedence");
            resolved_by_rule(field_name, &normalized, winner_idx, rule, schema)
        }
        None => {
            debug!(field = field_name, "no precedence rule decisive");
            needs_clarification(field_name, &normalized, schema)
        }
    }
}

type Normalized<'a> = [(&'a FieldCandidate, FieldValue)];

fn all_agree(
    field_name: &str,
    normalized: &Normalized<'_>,
    schema: &FieldSchema,
) -> Result<bool, EngineError> {
    let (_, first) = &normalized[0];
    for (_, value) in &normalized[1..] {
        if !schema.equivalent(field_name, first, value)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// All sources agree: fuse them, boosting confidence per corroborating
/// source, capped at 1.0
fn merge_agreeing(
    field_name: &str,
    normalized: &Normalized<'_>,
    config: &EngineConfig,
) -> AdjudicatedField {
    let n = normalized.len();
    let max_conf = normalized
        .iter()
        .map(|(c, _)| c.confidence)
        .fold(0.0_f64, f64::max);
    let confidence = (max_conf + config.corroboration_bonus * (n as f64 - 1.0)).min(1.0);

    // Primary is the structured source when it is confident enough,
    // otherwise the best-ranked document
    let primary_idx = normalized
        .iter()
        .position(|(c, _)| {
            c.source_kind == SourceKind::Structured && c.confidence >= config.agreement_threshold
        })
        .unwrap_or_else(|| {
            normalized
                .iter()
                .position(|(c, _)| c.source_kind == SourceKind::Document)
                .unwrap_or(0)
        });

    let (primary, value) = &normalized[primary_idx];
    let supporting = normalized
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != primary_idx)
        .map(|(_, (c, _))| c.source_id.clone())
        .collect();

    AdjudicatedField {
        field_name: field_name.to_string(),
        final_value: Some(value.clone()),
        confidence,
        primary_source_id: Some(primary.source_id.clone()),
        supporting_source_ids: supporting,
        conflicts: Vec::new(),
        needs_manual_review: false,
        state: FieldState::Merged,
    }
}

/// Apply the ordered precedence rules to a disagreement
fn pick_winner(
    field_name: &str,
    normalized: &Normalized<'_>,
    schema: &FieldSchema,
    config: &EngineConfig,
) -> Result<Option<(usize, &'static str)>, EngineError> {
    // (a) structured source, field complete, confident enough
    if let Some(idx) = normalized.iter().position(|(c, _)| {
        c.source_kind == SourceKind::Structured
            && c.complete
            && c.confidence >= config.agreement_threshold
    }) {
        return Ok(Some((idx, RULE_STRUCTURED_COMPLETE)));
    }

    let documents: Vec<usize> = normalized
        .iter()
        .enumerate()
        .filter(|(_, (c, _))| c.source_kind == SourceKind::Document)
        .map(|(i, _)| i)
        .collect();
    if documents.is_empty() {
        return Ok(None);
    }

    // (b) most trusted document priority, if its holders agree
    let best_priority = documents
        .iter()
        .map(|&i| normalized[i].0.source_priority)
        .min()
        .unwrap_or(i32::MAX);
    let holders: Vec<usize> = documents
        .iter()
        .copied()
        .filter(|&i| normalized[i].0.source_priority == best_priority)
        .collect();
    if holders_agree(field_name, normalized, &holders, schema)? {
        return Ok(Some((holders[0], RULE_MOST_TRUSTED)));
    }

    // (c) most recent document date, if its holders agree
    let best_date = documents
        .iter()
        .filter_map(|&i| normalized[i].0.document_date)
        .max();
    if let Some(best_date) = best_date {
        let holders: Vec<usize> = documents
            .iter()
            .copied()
            .filter(|&i| normalized[i].0.document_date == Some(best_date))
            .collect();
        if holders_agree(field_name, normalized, &holders, schema)? {
            return Ok(Some((holders[0], RULE_MOST_RECENT)));
        }
    }

    Ok(None)
}

fn holders_agree(
    field_name: &str,
    normalized: &Normalized<'_>,
    holders: &[usize],
    schema: &FieldSchema,
) -> Result<bool, EngineError> {
    let (_, first) = &normalized[holders[0]];
    for &idx in &holders[1..] {
        if !schema.equivalent(field_name, first, &normalized[idx].1)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn resolved_by_rule(
    field_name: &str,
    normalized: &Normalized<'_>,
    winner_idx: usize,
    rule: &'static str,
    schema: &FieldSchema,
) -> Result<AdjudicatedField, EngineError> {
    let (winner, winner_value) = &normalized[winner_idx];

    let mut supporting = Vec::new();
    let mut conflicts = Vec::new();
    for (i, (candidate, value)) in normalized.iter().enumerate() {
        if i == winner_idx {
            continue;
        }
        if schema.equivalent(field_name, winner_value, value)? {
            supporting.push(candidate.source_id.clone());
        } else {
            conflicts.push(Conflict {
                competing_value: value.clone(),
                competing_source_id: candidate.source_id.clone(),
                resolution_rule: rule.to_string(),
                resolved: true,
            });
        }
    }

    Ok(AdjudicatedField {
        field_name: field_name.to_string(),
        final_value: Some(winner_value.clone()),
        confidence: winner.confidence,
        primary_source_id: Some(winner.source_id.clone()),
        supporting_source_ids: supporting,
        conflicts,
        needs_manual_review: false,
        state: FieldState::ResolvedByPrecedence,
    })
}

/// No rule decisive: keep the best guess but flag the field
fn needs_clarification(
    field_name: &str,
    normalized: &Normalized<'_>,
    schema: &FieldSchema,
) -> Result<AdjudicatedField, EngineError> {
    // Best pre-clarification guess; ties keep the best-ranked source
    let best_idx = normalized
        .iter()
        .enumerate()
        .max_by(|(ai, (a, _)), (bi, (b, _))| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(bi.cmp(ai))
        })
        .map(|(i, _)| i)
        .unwrap_or(0);

    let (best, best_value) = &normalized[best_idx];

    let mut supporting = Vec::new();
    let mut conflicts = Vec::new();
    for (i, (candidate, value)) in normalized.iter().enumerate() {
        if i == best_idx {
            continue;
        }
        if schema.equivalent(field_name, best_value, value)? {
            supporting.push(candidate.source_id.clone());
        } else {
            conflicts.push(Conflict {
                competing_value: value.clone(),
                competing_source_id: candidate.source_id.clone(),
                resolution_rule: RULE_UNRESOLVED.to_string(),
                resolved: false,
            });
        }
    }

    Ok(AdjudicatedField {
        field_name: field_name.to_string(),
        final_value: Some(best_value.clone()),
        confidence: best.confidence,
        primary_source_id: Some(best.source_id.clone()),
        supporting_source_ids: supporting,
        conflicts,
        needs_manual_review: true,
        state: FieldState::NeedsClarification,
    })
}
