//! Casebook Plausibility Rules
//!
//! Domain-plausibility checks evaluated once over a fully adjudicated
//! field map. Rules are pure predicates over final values; a violation is
//! a recorded [`Inconsistency`] finding, never an error. A rule that
//! references a field the schema does not declare is a programmer error
//! and aborts the run.
//!
//! # Example
//!
//! ```
//! use casebook_rules::{PlausibilityRule, RuleSet};
//! use casebook_domain::Severity;
//!
//! let rules = RuleSet::new(vec![
//!     PlausibilityRule::date_ordering("dates_ordered", Severity::High, "start_date", "stop_date"),
//!     PlausibilityRule::numeric_range("dose_sane", Severity::Medium, "dose_cgy", 1.0, 20_000.0),
//! ]);
//! assert_eq!(rules.len(), 2);
//! ```

#![warn(missing_docs)]

use casebook_domain::{AdjudicatedField, FieldSchema, FieldValue, Inconsistency, Severity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors from malformed rule definitions
///
/// These abort the run; a misconfigured rule list is a bug, not a data
/// condition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    /// A rule references a field the schema does not declare
    #[error("Rule '{rule_id}' references unknown field '{field}'")]
    UnknownField {
        /// Offending rule
        rule_id: String,
        /// Undeclared field name
        field: String,
    },

    /// A rule's range bounds are inverted
    #[error("Rule '{rule_id}' has an empty range [{min}, {max}]")]
    EmptyRange {
        /// Offending rule
        rule_id: String,
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
}

/// The check a rule performs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum RuleKind {
    /// `earlier` must not come after `later`
    DateOrdering {
        /// Field that must come first
        earlier: String,
        /// Field that must come second
        later: String,
    },
    /// A numeric field must fall inside `[min, max]`
    NumericRange {
        /// Field under test
        field: String,
        /// Inclusive lower bound
        min: f64,
        /// Inclusive upper bound
        max: f64,
    },
    /// `field` is only plausible when `gate_field` holds one of `allowed`
    CodeGate {
        /// Field under test
        field: String,
        /// Code field controlling validity
        gate_field: String,
        /// Codes under which `field` is plausible
        allowed: Vec<String>,
    },
    /// A date field must not precede a fixed anchor date
    AnchorDate {
        /// Field under test
        field: String,
        /// Earliest plausible date (e.g., diagnosis date)
        anchor: NaiveDate,
    },
}

/// One domain-plausibility rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlausibilityRule {
    /// Stable identifier, recorded on findings
    pub id: String,
    /// Severity assigned to violations
    pub severity: Severity,
    /// Human-readable statement of the constraint
    pub description: String,
    /// The check itself
    pub kind: RuleKind,
}

impl PlausibilityRule {
    /// `earlier` must not come after `later`
    pub fn date_ordering(
        id: impl Into<String>,
        severity: Severity,
        earlier: impl Into<String>,
        later: impl Into<String>,
    ) -> Self {
        let earlier = earlier.into();
        let later = later.into();
        Self {
            id: id.into(),
            severity,
            description: format!("{} must not come after {}", earlier, later),
            kind: RuleKind::DateOrdering { earlier, later },
        }
    }

    /// A numeric field must fall inside `[min, max]`
    pub fn numeric_range(
        id: impl Into<String>,
        severity: Severity,
        field: impl Into<String>,
        min: f64,
        max: f64,
    ) -> Self {
        let field = field.into();
        Self {
            id: id.into(),
            severity,
            description: format!("{} must fall in [{}, {}]", field, min, max),
            kind: RuleKind::NumericRange { field, min, max },
        }
    }

    /// `field` is only plausible when `gate_field` holds one of `allowed`
    pub fn code_gate(
        id: impl Into<String>,
        severity: Severity,
        field: impl Into<String>,
        gate_field: impl Into<String>,
        allowed: &[&str],
    ) -> Self {
        let field = field.into();
        let gate_field = gate_field.into();
        Self {
            id: id.into(),
            severity,
            description: format!("{} is only valid for certain {} codes", field, gate_field),
            kind: RuleKind::CodeGate {
                field,
                gate_field,
                allowed: allowed.iter().map(|s| s.to_uppercase()).collect(),
            },
        }
    }

    /// A date field must not precede `anchor`
    pub fn anchor_date(
        id: impl Into<String>,
        severity: Severity,
        field: impl Into<String>,
        anchor: NaiveDate,
    ) -> Self {
        let field = field.into();
        Self {
            id: id.into(),
            severity,
            description: format!("{} must not precede {}", field, anchor),
            kind: RuleKind::AnchorDate { field, anchor },
        }
    }

    /// Replace the generated description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Fields this rule reads
    pub fn fields_involved(&self) -> Vec<String> {
        match &self.kind {
            RuleKind::DateOrdering { earlier, later } => vec![earlier.clone(), later.clone()],
            RuleKind::NumericRange { field, .. } => vec![field.clone()],
            RuleKind::CodeGate { field, gate_field, .. } => {
                vec![field.clone(), gate_field.clone()]
            }
            RuleKind::AnchorDate { field, .. } => vec![field.clone()],
        }
    }

    /// Check the rule definition against the schema
    pub fn validate(&self, schema: &FieldSchema) -> Result<(), RuleError> {
        for field in self.fields_involved() {
            if schema.spec(&field).is_err() {
                return Err(RuleError::UnknownField {
                    rule_id: self.id.clone(),
                    field,
                });
            }
        }
        if let RuleKind::NumericRange { min, max, .. } = self.kind {
            if min > max {
                return Err(RuleError::EmptyRange {
                    rule_id: self.id.clone(),
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Evaluate the rule over final values
    ///
    /// Fields without a final value never fire a rule; an absent value is
    /// missing evidence, not a violation.
    pub fn evaluate(
        &self,
        fields: &BTreeMap<String, AdjudicatedField>,
        schema: &FieldSchema,
    ) -> Result<Option<Inconsistency>, RuleError> {
        self.validate(schema)?;

        let violated = match &self.kind {
            RuleKind::DateOrdering { earlier, later } => {
                match (final_date(fields, earlier), final_date(fields, later)) {
                    (Some(a), Some(b)) => a > b,
                    _ => false,
                }
            }
            RuleKind::NumericRange { field, min, max } => match final_numeric(fields, field) {
                Some(n) => n < *min || n > *max,
                None => false,
            },
            RuleKind::CodeGate {
                field,
                gate_field,
                allowed,
            } => {
                let has_value = fields
                    .get(field)
                    .map(|f| f.final_value.is_some())
                    .unwrap_or(false);
                match (has_value, final_code(fields, gate_field)) {
                    (true, Some(code)) => !allowed.contains(&code),
                    _ => false,
                }
            }
            RuleKind::AnchorDate { field, anchor } => match final_date(fields, field) {
                Some(d) => d < *anchor,
                None => false,
            },
        };

        if !violated {
            return Ok(None);
        }

        debug!(rule = %self.id, "plausibility rule fired");
        Ok(Some(Inconsistency {
            rule_id: self.id.clone(),
            fields_involved: self.fields_involved(),
            severity: self.severity,
            description: self.description.clone(),
            resolved: false,
        }))
    }
}

/// An ordered list of plausibility rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<PlausibilityRule>,
}

impl RuleSet {
    /// Build a rule set; evaluation order is list order
    pub fn new(rules: Vec<PlausibilityRule>) -> Self {
        Self { rules }
    }

    /// Append a rule
    pub fn push(&mut self, rule: PlausibilityRule) {
        self.rules.push(rule);
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set holds no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate the rules in evaluation order
    pub fn iter(&self) -> impl Iterator<Item = &PlausibilityRule> {
        self.rules.iter()
    }

    /// Validate every rule definition against the schema
    pub fn validate(&self, schema: &FieldSchema) -> Result<(), RuleError> {
        for rule in &self.rules {
            rule.validate(schema)?;
        }
        Ok(())
    }

    /// Evaluate every rule in order, collecting all findings
    pub fn evaluate_all(
        &self,
        fields: &BTreeMap<String, AdjudicatedField>,
        schema: &FieldSchema,
    ) -> Result<Vec<Inconsistency>, RuleError> {
        let mut findings = Vec::new();
        for rule in &self.rules {
            if let Some(finding) = rule.evaluate(fields, schema)? {
                findings.push(finding);
            }
        }
        Ok(findings)
    }
}

fn final_date(fields: &BTreeMap<String, AdjudicatedField>, name: &str) -> Option<NaiveDate> {
    fields.get(name)?.final_value.as_ref()?.as_date()
}

fn final_numeric(fields: &BTreeMap<String, AdjudicatedField>, name: &str) -> Option<f64> {
    fields.get(name)?.final_value.as_ref()?.as_numeric()
}

fn final_code(fields: &BTreeMap<String, AdjudicatedField>, name: &str) -> Option<String> {
    match fields.get(name)?.final_value.as_ref()? {
        FieldValue::Code(c) => Some(c.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casebook_domain::{FieldSpec, FieldState};

    fn schema() -> FieldSchema {
        FieldSchema::new(vec![
            FieldSpec::numeric("dose_cgy"),
            FieldSpec::date("start_date"),
            FieldSpec::date("stop_date"),
            FieldSpec::code("site", &["breast", "lung"]),
        ])
    }

    fn field_with(name: &str, value: FieldValue) -> AdjudicatedField {
        AdjudicatedField {
            field_name: name.to_string(),
            final_value: Some(value),
            confidence: 0.9,
            primary_source_id: Some("doc-1".to_string()),
            supporting_source_ids: Vec::new(),
            conflicts: Vec::new(),
            needs_manual_review: false,
            state: FieldState::Final,
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn field_map(fields: Vec<AdjudicatedField>) -> BTreeMap<String, AdjudicatedField> {
        fields
            .into_iter()
            .map(|f| (f.field_name.clone(), f))
            .collect()
    }

    #[test]
    fn test_date_ordering_fires_when_reversed() {
        let fields = field_map(vec![
            field_with("start_date", FieldValue::Date(date("2019-09-01"))),
            field_with("stop_date", FieldValue::Date(date("2019-07-01"))),
        ]);
        let rule = PlausibilityRule::date_ordering(
            "dates_ordered",
            Severity::High,
            "start_date",
            "stop_date",
        );

        let finding = rule.evaluate(&fields, &schema()).unwrap().unwrap();
        assert_eq!(finding.rule_id, "dates_ordered");
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.fields_involved, vec!["start_date", "stop_date"]);
        assert!(!finding.resolved);
    }

    #[test]
    fn test_date_ordering_quiet_when_ordered() {
        let fields = field_map(vec![
            field_with("start_date", FieldValue::Date(date("2019-07-01"))),
            field_with("stop_date", FieldValue::Date(date("2019-09-01"))),
        ]);
        let rule = PlausibilityRule::date_ordering(
            "dates_ordered",
            Severity::High,
            "start_date",
            "stop_date",
        );

        assert!(rule.evaluate(&fields, &schema()).unwrap().is_none());
    }

    #[test]
    fn test_missing_value_never_fires() {
        let fields = field_map(vec![
            field_with("start_date", FieldValue::Date(date("2019-09-01"))),
            AdjudicatedField::absent("stop_date"),
        ]);
        let rule = PlausibilityRule::date_ordering(
            "dates_ordered",
            Severity::High,
            "start_date",
            "stop_date",
        );

        assert!(rule.evaluate(&fields, &schema()).unwrap().is_none());
    }

    #[test]
    fn test_numeric_range() {
        let rule =
            PlausibilityRule::numeric_range("dose_sane", Severity::Medium, "dose_cgy", 1.0, 20_000.0);

        let inside = field_map(vec![field_with("dose_cgy", FieldValue::Numeric(5400.0))]);
        assert!(rule.evaluate(&inside, &schema()).unwrap().is_none());

        let outside = field_map(vec![field_with("dose_cgy", FieldValue::Numeric(54_000.0))]);
        assert!(rule.evaluate(&outside, &schema()).unwrap().is_some());
    }

    #[test]
    fn test_code_gate() {
        let rule = PlausibilityRule::code_gate(
            "dose_needs_site",
            Severity::Medium,
            "dose_cgy",
            "site",
            &["breast", "lung"],
        );

        let gated_ok = field_map(vec![
            field_with("dose_cgy", FieldValue::Numeric(5400.0)),
            field_with("site", FieldValue::Code("BREAST".to_string())),
        ]);
        assert!(rule.evaluate(&gated_ok, &schema()).unwrap().is_none());

        let gated_bad = field_map(vec![
            field_with("dose_cgy", FieldValue::Numeric(5400.0)),
            field_with("site", FieldValue::Code("PROSTATE".to_string())),
        ]);
        assert!(rule.evaluate(&gated_bad, &schema()).unwrap().is_some());

        // Gate unresolved: missing evidence, not a violation
        let no_gate = field_map(vec![field_with("dose_cgy", FieldValue::Numeric(5400.0))]);
        assert!(rule.evaluate(&no_gate, &schema()).unwrap().is_none());
    }

    #[test]
    fn test_anchor_date() {
        let rule = PlausibilityRule::anchor_date(
            "after_diagnosis",
            Severity::High,
            "start_date",
            date("2019-05-01"),
        );

        let before = field_map(vec![field_with(
            "start_date",
            FieldValue::Date(date("2019-03-15")),
        )]);
        assert!(rule.evaluate(&before, &schema()).unwrap().is_some());

        let after = field_map(vec![field_with(
            "start_date",
            FieldValue::Date(date("2019-07-15")),
        )]);
        assert!(rule.evaluate(&after, &schema()).unwrap().is_none());
    }

    #[test]
    fn test_unknown_field_is_programmer_error() {
        let rule =
            PlausibilityRule::numeric_range("bad", Severity::Low, "not_a_field", 0.0, 1.0);
        let err = rule.evaluate(&BTreeMap::new(), &schema()).unwrap_err();
        assert!(matches!(err, RuleError::UnknownField { .. }));
    }

    #[test]
    fn test_inverted_range_is_programmer_error() {
        let rule =
            PlausibilityRule::numeric_range("bad", Severity::Low, "dose_cgy", 10.0, 1.0);
        let err = rule.validate(&schema()).unwrap_err();
        assert!(matches!(err, RuleError::EmptyRange { .. }));
    }

    #[test]
    fn test_rule_set_collects_all_findings() {
        let rules = RuleSet::new(vec![
            PlausibilityRule::date_ordering(
                "dates_ordered",
                Severity::High,
                "start_date",
                "stop_date",
            ),
            PlausibilityRule::numeric_range(
                "dose_sane",
                Severity::Medium,
                "dose_cgy",
                1.0,
                20_000.0,
            ),
        ]);

        let fields = field_map(vec![
            field_with("start_date", FieldValue::Date(date("2019-09-01"))),
            field_with("stop_date", FieldValue::Date(date("2019-07-01"))),
            field_with("dose_cgy", FieldValue::Numeric(54_000.0)),
        ]);

        let findings = rules.evaluate_all(&fields, &schema()).unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].rule_id, "dates_ordered");
        assert_eq!(findings[1].rule_id, "dose_sane");
    }
}
