//! Document identity, locators, and cached extraction records

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque object-store locator for a document's raw bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Bucket or container name
    pub bucket: String,
    /// Object key within the bucket
    pub key: String,
    /// Optional object revision
    pub revision: Option<String>,
}

impl SourceLocation {
    /// Create a locator without a revision
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            revision: None,
        }
    }

    /// Set the object revision
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(rev) => write!(f, "{}/{}@{}", self.bucket, self.key, rev),
            None => write!(f, "{}/{}", self.bucket, self.key),
        }
    }
}

/// Document metadata as delivered by the warehouse locator provider
///
/// One `DocumentRef` per narrative document in a concept run. The cache
/// turns a ref plus an extraction outcome into a [`CachedDocument`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Unique document identity (the cache key)
    pub document_id: String,
    /// Patient the document belongs to
    pub patient_id: String,
    /// Where the raw bytes live
    pub source_location: SourceLocation,
    /// Caller-defined category (e.g., "imaging_report")
    pub document_type: String,
    /// Document date
    pub document_date: NaiveDate,
    /// Declared content type of the raw bytes
    pub content_type: String,
    /// Trust rank among document sources; lower = more trusted
    pub source_priority: i32,
}

/// One row of the document text cache: the most recent extraction attempt
/// (success or failure) for one document identity.
///
/// Writes are whole-record replacements; a record is never partially
/// mutated. `content_hash` detects duplicated text across documents and is
/// not the cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDocument {
    /// Unique document identity (cache key)
    pub document_id: String,
    /// Patient the document belongs to
    pub patient_id: String,
    /// Object-store locator the bytes were fetched from
    pub source_location: SourceLocation,
    /// Caller-defined category
    pub document_type: String,
    /// Document date
    pub document_date: NaiveDate,
    /// Declared content type of the raw bytes
    pub content_type: String,
    /// Extracted plain text; empty on failure
    pub extracted_text: String,
    /// Length of `extracted_text` in bytes
    pub text_length: u64,
    /// Lowercase hex SHA-256 of `extracted_text`
    pub content_hash: String,
    /// Unix seconds when this extraction attempt ran
    pub extraction_timestamp: u64,
    /// Which adapter produced the text (e.g., "pdf", "plain")
    pub extraction_method: String,
    /// Monotonic version of the extraction logic
    pub extraction_version: u32,
    /// Name of the extractor implementation
    pub extractor_name: String,
    /// Whether extraction succeeded
    pub extraction_success: bool,
    /// Failure description when `extraction_success` is false
    pub extraction_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation::new("clinical-docs", "2019/rpt-17.pdf");
        assert_eq!(loc.to_string(), "clinical-docs/2019/rpt-17.pdf");

        let loc = loc.with_revision("3");
        assert_eq!(loc.to_string(), "clinical-docs/2019/rpt-17.pdf@3");
    }

    #[test]
    fn test_cached_document_serde_roundtrip() {
        let doc = CachedDocument {
            document_id: "doc-1".to_string(),
            patient_id: "pt-9".to_string(),
            source_location: SourceLocation::new("bucket", "key"),
            document_type: "imaging_report".to_string(),
            document_date: "2019-07-15".parse().unwrap(),
            content_type: "text/plain".to_string(),
            extracted_text: "report body".to_string(),
            text_length: 11,
            content_hash: "abc123".to_string(),
            extraction_timestamp: 1_700_000_000,
            extraction_method: "plain".to_string(),
            extraction_version: 1,
            extractor_name: "plain-utf8".to_string(),
            extraction_success: true,
            extraction_error: None,
        };

        let json = serde_json::to_string(&doc).unwrap();
        let back: CachedDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(doc, back);
    }
}
