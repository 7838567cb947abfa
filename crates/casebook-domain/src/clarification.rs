//! Clarification loop artifacts

use serde::{Deserialize, Serialize};

/// Terminal outcome of one clarification round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationOutcome {
    /// The field resolved cleanly after this round
    Resolved,
    /// The round produced no usable answer; more rounds may follow
    Unresolved,
    /// The round budget ran out; the field is finalized low-confidence
    Exhausted,
}

/// One request-response cycle back to the field extractor for an
/// ambiguous field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationRound {
    /// 1-based round counter, bounded by the engine's `max_rounds`
    pub round_number: u32,
    /// Field being disambiguated
    pub field_name: String,
    /// Natural-language question, including the competing evidence
    pub question: String,
    /// Extractor response; None when no answer came back
    pub response: Option<String>,
    /// How the round ended
    pub outcome: ClarificationOutcome,
}
