//! Field schema registry: per-field kinds, weights, tolerances, and
//! normalization
//!
//! The set of extractable variables is caller-defined, so comparison and
//! normalization are resolved through this registry rather than hard-coded
//! per field. A candidate naming a field absent from the schema is a
//! programmer error and aborts the run.

use crate::field::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Default absolute tolerance for numeric agreement, applied after unit
/// canonicalization
pub const DEFAULT_NUMERIC_TOLERANCE: f64 = 1e-6;

/// Errors raised by schema lookups; these are programmer errors, not
/// recoverable extraction failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A candidate referenced a field the schema does not define
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// A value's kind does not match the field's declared kind
    #[error("Field '{field}' expects {expected:?}, got {actual:?}")]
    KindMismatch {
        /// Field name
        field: String,
        /// Declared kind
        expected: FieldKind,
        /// Kind of the offending value
        actual: FieldKind,
    },
}

/// The kind of value a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Numeric, compared with an absolute tolerance
    Numeric,
    /// Calendar date, compared with a day tolerance
    Date,
    /// Controlled-vocabulary code, compared case-insensitively
    Code,
    /// Free text, compared after whitespace and case folding
    Text,
}

impl FieldKind {
    /// Kind of a concrete value
    pub fn of(value: &FieldValue) -> Self {
        match value {
            FieldValue::Numeric(_) => FieldKind::Numeric,
            FieldValue::Date(_) => FieldKind::Date,
            FieldValue::Code(_) => FieldKind::Code,
            FieldValue::Text(_) => FieldKind::Text,
        }
    }
}

/// Declaration of one extractable field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, unique within a schema
    pub name: String,
    /// Value kind
    pub kind: FieldKind,
    /// Whether the field counts toward the completeness ratio
    pub required: bool,
    /// Weight in the record-level confidence mean
    pub weight: f64,
    /// Absolute tolerance for numeric agreement
    pub numeric_tolerance: f64,
    /// Day tolerance for date agreement; 0 = exact match
    pub date_tolerance_days: i64,
    /// Allowed codes for `Code` fields; empty = unconstrained
    pub allowed_codes: Vec<String>,
}

impl FieldSpec {
    fn base(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            weight: 1.0,
            numeric_tolerance: DEFAULT_NUMERIC_TOLERANCE,
            date_tolerance_days: 0,
            allowed_codes: Vec::new(),
        }
    }

    /// A numeric field
    pub fn numeric(name: impl Into<String>) -> Self {
        Self::base(name, FieldKind::Numeric)
    }

    /// A date field
    pub fn date(name: impl Into<String>) -> Self {
        Self::base(name, FieldKind::Date)
    }

    /// A code field with its allowed vocabulary
    pub fn code(name: impl Into<String>, allowed: &[&str]) -> Self {
        let mut spec = Self::base(name, FieldKind::Code);
        spec.allowed_codes = allowed.iter().map(|s| s.to_uppercase()).collect();
        spec
    }

    /// A free-text field
    pub fn text(name: impl Into<String>) -> Self {
        Self::base(name, FieldKind::Text)
    }

    /// Mark the field required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the confidence weight
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the numeric agreement tolerance
    pub fn with_numeric_tolerance(mut self, tolerance: f64) -> Self {
        self.numeric_tolerance = tolerance;
        self
    }

    /// Set the date agreement tolerance in days
    pub fn with_date_tolerance_days(mut self, days: i64) -> Self {
        self.date_tolerance_days = days;
        self
    }
}

/// Caller-supplied value normalizer (e.g., unit conversion for dose fields)
pub type Normalizer = Arc<dyn Fn(&FieldValue) -> FieldValue + Send + Sync>;

/// The registry of field declarations plus per-field normalizers
///
/// Normalization order: the custom normalizer runs first (unit conversion),
/// then the kind default (case/whitespace folding for text and codes).
#[derive(Clone)]
pub struct FieldSchema {
    specs: BTreeMap<String, FieldSpec>,
    normalizers: HashMap<String, Normalizer>,
}

impl fmt::Debug for FieldSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSchema")
            .field("specs", &self.specs)
            .field("normalizers", &self.normalizers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FieldSchema {
    /// Build a schema from field declarations
    pub fn new(specs: Vec<FieldSpec>) -> Self {
        Self {
            specs: specs.into_iter().map(|s| (s.name.clone(), s)).collect(),
            normalizers: HashMap::new(),
        }
    }

    /// Register a custom normalizer for one field
    pub fn with_normalizer<F>(mut self, field: impl Into<String>, normalizer: F) -> Self
    where
        F: Fn(&FieldValue) -> FieldValue + Send + Sync + 'static,
    {
        self.normalizers.insert(field.into(), Arc::new(normalizer));
        self
    }

    /// Look up one field's declaration
    pub fn spec(&self, field: &str) -> Result<&FieldSpec, SchemaError> {
        self.specs
            .get(field)
            .ok_or_else(|| SchemaError::UnknownField(field.to_string()))
    }

    /// All declared field names, in stable order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    /// Names of all required fields
    pub fn required_fields(&self) -> Vec<&str> {
        self.specs
            .values()
            .filter(|s| s.required)
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Number of declared fields
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the schema declares no fields
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Normalize a candidate value for comparison and storage
    pub fn normalize(&self, field: &str, value: &FieldValue) -> Result<FieldValue, SchemaError> {
        let spec = self.spec(field)?;

        let value = match self.normalizers.get(field) {
            Some(normalizer) => normalizer(value),
            None => value.clone(),
        };

        let actual = FieldKind::of(&value);
        if actual != spec.kind {
            return Err(SchemaError::KindMismatch {
                field: field.to_string(),
                expected: spec.kind,
                actual,
            });
        }

        Ok(match value {
            FieldValue::Code(s) => FieldValue::Code(s.trim().to_uppercase()),
            FieldValue::Text(s) => {
                FieldValue::Text(s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            }
            other => other,
        })
    }

    /// Whether two already-normalized values agree under the field's
    /// tolerances
    pub fn equivalent(
        &self,
        field: &str,
        a: &FieldValue,
        b: &FieldValue,
    ) -> Result<bool, SchemaError> {
        let spec = self.spec(field)?;

        Ok(match (a, b) {
            (FieldValue::Numeric(x), FieldValue::Numeric(y)) => {
                (x - y).abs() <= spec.numeric_tolerance
            }
            (FieldValue::Date(x), FieldValue::Date(y)) => {
                (*x - *y).num_days().abs() <= spec.date_tolerance_days
            }
            (FieldValue::Code(x), FieldValue::Code(y)) => x == y,
            (FieldValue::Text(x), FieldValue::Text(y)) => x == y,
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn radiation_schema() -> FieldSchema {
        FieldSchema::new(vec![
            FieldSpec::numeric("dose_cgy").required(),
            FieldSpec::date("start_date").required(),
            FieldSpec::date("stop_date"),
            FieldSpec::code("site", &["breast", "lung", "prostate"]),
            FieldSpec::text("technique"),
        ])
        // Doses under 1000 are almost certainly Gy, not cGy
        .with_normalizer("dose_cgy", |v| match v {
            FieldValue::Numeric(n) if *n < 1000.0 => FieldValue::Numeric(n * 100.0),
            other => other.clone(),
        })
    }

    #[test]
    fn test_unknown_field_is_error() {
        let schema = radiation_schema();
        let err = schema
            .normalize("not_a_field", &FieldValue::Numeric(1.0))
            .unwrap_err();
        assert_eq!(err, SchemaError::UnknownField("not_a_field".to_string()));
    }

    #[test]
    fn test_unit_normalizer_converts_gy_to_cgy() {
        let schema = radiation_schema();
        let normalized = schema
            .normalize("dose_cgy", &FieldValue::Numeric(54.0))
            .unwrap();
        assert_eq!(normalized, FieldValue::Numeric(5400.0));

        // Already canonical, untouched
        let normalized = schema
            .normalize("dose_cgy", &FieldValue::Numeric(5400.0))
            .unwrap();
        assert_eq!(normalized, FieldValue::Numeric(5400.0));
    }

    #[test]
    fn test_code_normalization_uppercases() {
        let schema = radiation_schema();
        let normalized = schema
            .normalize("site", &FieldValue::Code(" breast ".to_string()))
            .unwrap();
        assert_eq!(normalized, FieldValue::Code("BREAST".to_string()));
    }

    #[test]
    fn test_text_normalization_folds_whitespace_and_case() {
        let schema = radiation_schema();
        let normalized = schema
            .normalize("technique", &FieldValue::Text("  IMRT\n with  boost ".to_string()))
            .unwrap();
        assert_eq!(normalized, FieldValue::Text("imrt with boost".to_string()));
    }

    #[test]
    fn test_kind_mismatch_is_error() {
        let schema = radiation_schema();
        let err = schema
            .normalize("dose_cgy", &FieldValue::Text("fifty-four".to_string()))
            .unwrap_err();
        assert!(matches!(err, SchemaError::KindMismatch { .. }));
    }

    #[test]
    fn test_date_equivalence_respects_tolerance() {
        let schema = FieldSchema::new(vec![
            FieldSpec::date("start_date").with_date_tolerance_days(3)
        ]);

        let a = FieldValue::Date(date("2019-07-15"));
        let b = FieldValue::Date(date("2019-07-17"));
        let c = FieldValue::Date(date("2019-07-20"));

        assert!(schema.equivalent("start_date", &a, &b).unwrap());
        assert!(!schema.equivalent("start_date", &a, &c).unwrap());
    }

    #[test]
    fn test_exact_date_match_by_default() {
        let schema = radiation_schema();
        let a = FieldValue::Date(date("2019-07-15"));
        let b = FieldValue::Date(date("2019-07-16"));
        assert!(!schema.equivalent("start_date", &a, &b).unwrap());
        assert!(schema.equivalent("start_date", &a, &a.clone()).unwrap());
    }

    #[test]
    fn test_required_fields() {
        let schema = radiation_schema();
        assert_eq!(schema.required_fields(), vec!["dose_cgy", "start_date"]);
    }
}
