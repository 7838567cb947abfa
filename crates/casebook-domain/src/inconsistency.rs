//! Domain-plausibility findings

use serde::{Deserialize, Serialize};

/// Severity of a plausibility violation
///
/// Ordering matters: the engine opens clarification for findings at or
/// above a configured severity floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; never drives clarification
    Low,
    /// Suspicious; worth a re-read
    Medium,
    /// Domain-implausible; must be clarified or flagged for review
    High,
}

/// One violated plausibility rule, recorded as a finding rather than an
/// error — a concept run always produces a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inconsistency {
    /// Identifier of the violated rule
    pub rule_id: String,
    /// Fields the rule reads
    pub fields_involved: Vec<String>,
    /// Severity from the rule definition
    pub severity: Severity,
    /// Human-readable description of the violation
    pub description: String,
    /// True once a clarification round removed the violation
    pub resolved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
    }
}
