//! Record identity and the terminal adjudication artifact

use crate::adjudicated::AdjudicatedField;
use crate::clarification::ClarificationRound;
use crate::inconsistency::Inconsistency;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for an adjudicated record, based on UUIDv7
///
/// UUIDv7 gives chronological sortability across runs without any
/// coordination, which is what we want for audit trails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(u128);

impl RecordId {
    /// Generate a new UUIDv7-based RecordId
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a RecordId from a raw u128 value (storage deserialization)
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a RecordId from its UUID string form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid record id: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }

    /// Timestamp component of the UUIDv7 (milliseconds since Unix epoch)
    pub fn timestamp(&self) -> u64 {
        // UUIDv7: top 48 bits are the Unix millisecond timestamp
        (self.0 >> 80) as u64
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

/// The terminal artifact of one adjudication run: every field of one concept
/// for one patient, fused across all evidence sources.
///
/// A record is built once per run and never mutated after being returned.
/// The engine holds no state between runs; a record is a pure function of
/// the run's inputs plus the cache contents at the time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjudicatedRecord {
    /// Record identity (UUIDv7, sortable by creation time)
    #[serde(with = "record_id_serde")]
    pub id: RecordId,

    /// Patient this record describes
    pub patient_id: String,

    /// Clinical concept that was extracted (e.g., "radiation_course")
    pub concept: String,

    /// Fused result per field, keyed by field name
    pub fields: BTreeMap<String, AdjudicatedField>,

    /// Domain-plausibility findings from the consistency pass
    pub inconsistencies: Vec<Inconsistency>,

    /// Full clarification history, in the order rounds were opened
    pub clarifications: Vec<ClarificationRound>,

    /// Weighted mean of all field confidences
    pub overall_confidence: f64,

    /// Resolved required fields / total required fields
    pub completeness_ratio: f64,
}

mod record_id_serde {
    use super::RecordId;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(id: &RecordId, s: S) -> Result<S::Ok, S::Error> {
        id.to_string().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<RecordId, D::Error> {
        let s = String::deserialize(d)?;
        RecordId::from_string(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_ordering() {
        let id1 = RecordId::from_value(1000);
        let id2 = RecordId::from_value(2000);

        assert!(id1 < id2);
        assert!(id2 > id1);
    }

    #[test]
    fn test_record_id_chronological() {
        let id1 = RecordId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = RecordId::new();

        assert!(id1 < id2, "Earlier UUIDv7 should sort before later UUIDv7");
        assert!(id1.timestamp() <= id2.timestamp());
    }

    #[test]
    fn test_record_id_display_and_parse() {
        let id = RecordId::new();
        let id_str = id.to_string();

        assert_eq!(id_str.len(), 36);

        let parsed = RecordId::from_string(&id_str).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_record_id_invalid_string() {
        assert!(RecordId::from_string("not-a-valid-uuid").is_err());
        assert!(RecordId::from_string("").is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: UUIDv7 ordering matches u128 ordering
        #[test]
        fn test_record_id_ordering_property(a: u128, b: u128) {
            let id_a = RecordId::from_value(a);
            let id_b = RecordId::from_value(b);

            prop_assert_eq!(id_a < id_b, a < b);
            prop_assert_eq!(id_a == id_b, a == b);
        }

        /// Property: round-trip through string representation preserves ID
        #[test]
        fn test_record_id_string_roundtrip(value: u128) {
            let id = RecordId::from_value(value);
            let id_str = id.to_string();

            match RecordId::from_string(&id_str) {
                Ok(parsed) => prop_assert_eq!(id, parsed),
                Err(e) => return Err(TestCaseError::fail(e)),
            }
        }
    }
}
