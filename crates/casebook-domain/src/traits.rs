//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and
//! infrastructure. Implementations live in other crates.

use crate::field::FieldCandidate;
use crate::schema::FieldSchema;

/// Trait for LLM provider operations
///
/// Implemented by the infrastructure layer (casebook-llm). The seam is
/// synchronous; async callers bridge with `spawn_blocking`.
pub trait LlmProvider {
    /// Error type for LLM operations
    type Error;

    /// Generate text completion
    fn generate(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Generate with structured output (if supported)
    fn generate_structured(&self, prompt: &str, schema: &str) -> Result<String, Self::Error>;
}

/// A targeted re-read request for one ambiguous field
#[derive(Debug, Clone, PartialEq)]
pub struct ClarificationRequest {
    /// Field being disambiguated
    pub field_name: String,
    /// Natural-language question
    pub question: String,
    /// Competing evidence snippets, one per disagreeing source
    pub evidence: Vec<String>,
}

/// Trait for turning evidence into field candidates
///
/// Implemented by the application layer (casebook-extractor) over an
/// [`LlmProvider`]. The engine only sees this seam, which keeps
/// adjudication testable with scripted extractors.
pub trait FieldExtractor {
    /// Error type for extraction operations
    type Error;

    /// Extract candidates for every schema field present in `text`.
    /// Source provenance is stamped later by the owning
    /// [`crate::SourceExtraction`].
    fn extract_fields(
        &self,
        text: &str,
        schema: &FieldSchema,
    ) -> Result<Vec<FieldCandidate>, Self::Error>;

    /// Re-read the evidence for one field. `Ok(None)` means the extractor
    /// could not disambiguate this round.
    fn clarify(
        &self,
        request: &ClarificationRequest,
    ) -> Result<Option<FieldCandidate>, Self::Error>;
}
