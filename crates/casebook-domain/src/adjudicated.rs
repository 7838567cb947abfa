//! Fused per-field results and the field resolution state machine

use crate::field::FieldValue;
use serde::{Deserialize, Serialize};

/// Resolution state of one field
///
/// `Unresolved -> {SingleSource, Merged, ResolvedByPrecedence,
/// NeedsClarification} -> Final`. `Final` is terminal: a field never
/// re-enters adjudication once finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    /// No resolution attempted yet
    Unresolved,
    /// Exactly one candidate existed
    SingleSource,
    /// All candidates agreed after normalization
    Merged,
    /// Disagreement decided by a precedence rule
    ResolvedByPrecedence,
    /// No precedence rule applied unambiguously
    NeedsClarification,
    /// Terminal
    Final,
}

/// One losing candidate in a resolved (or unresolved) disagreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// The value that lost
    pub competing_value: FieldValue,
    /// Source that proposed the losing value
    pub competing_source_id: String,
    /// Name of the precedence rule that decided, or "unresolved"
    pub resolution_rule: String,
    /// False while the disagreement is still open
    pub resolved: bool,
}

/// The fused result for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjudicatedField {
    /// Field name
    pub field_name: String,
    /// Final normalized value; None when no source produced a candidate
    pub final_value: Option<FieldValue>,
    /// Confidence in the final value, [0.0, 1.0]
    pub confidence: f64,
    /// Source whose candidate won
    pub primary_source_id: Option<String>,
    /// Sources whose candidates agreed with the winner
    pub supporting_source_ids: Vec<String>,
    /// Every disagreement this field saw, in resolution order
    pub conflicts: Vec<Conflict>,
    /// True when adjudication could not settle the field
    pub needs_manual_review: bool,
    /// Where the field sits in the resolution state machine
    pub state: FieldState,
}

impl AdjudicatedField {
    /// A field no source produced a candidate for
    pub fn absent(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            final_value: None,
            confidence: 0.0,
            primary_source_id: None,
            supporting_source_ids: Vec::new(),
            conflicts: Vec::new(),
            needs_manual_review: false,
            state: FieldState::Final,
        }
    }

    /// Transition to the terminal state
    pub fn finalize(&mut self) {
        self.state = FieldState::Final;
    }

    /// Whether the field carries a value
    pub fn is_resolved(&self) -> bool {
        self.final_value.is_some() && !self.needs_manual_review
    }
}
