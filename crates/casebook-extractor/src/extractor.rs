//! LLM-backed field extractor

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::parser::{parse_candidates, parse_clarification};
use crate::prompt::{clarification_prompt, PromptBuilder};
use casebook_domain::traits::{ClarificationRequest, FieldExtractor, LlmProvider};
use casebook_domain::{FieldCandidate, FieldSchema};
use std::sync::Arc;
use tracing::{debug, info};

/// Extracts schema fields from narrative text via an LLM
///
/// Holds the concept schema so clarification answers can be parsed with
/// the right field kinds. The seam is synchronous; the engine calls it
/// from `spawn_blocking`.
pub struct LlmFieldExtractor<L: LlmProvider> {
    provider: Arc<L>,
    schema: FieldSchema,
    config: ExtractorConfig,
}

impl<L> LlmFieldExtractor<L>
where
    L: LlmProvider,
    L::Error: std::fmt::Display,
{
    /// Create an extractor over a provider for one concept schema
    pub fn new(provider: L, schema: FieldSchema, config: ExtractorConfig) -> Self {
        Self {
            provider: Arc::new(provider),
            schema,
            config,
        }
    }

    /// Create an extractor sharing an already-wrapped provider
    pub fn with_shared_provider(
        provider: Arc<L>,
        schema: FieldSchema,
        config: ExtractorConfig,
    ) -> Self {
        Self {
            provider,
            schema,
            config,
        }
    }
}

impl<L> FieldExtractor for LlmFieldExtractor<L>
where
    L: LlmProvider,
    L::Error: std::fmt::Display,
{
    type Error = ExtractorError;

    fn extract_fields(
        &self,
        text: &str,
        schema: &FieldSchema,
    ) -> Result<Vec<FieldCandidate>, Self::Error> {
        if text.len() > self.config.max_text_length {
            return Err(ExtractorError::TextTooLong(
                text.len(),
                self.config.max_text_length,
            ));
        }

        let prompt = PromptBuilder::new(text, schema).build();
        debug!(prompt_len = prompt.len(), "built extraction prompt");

        let response = self
            .provider
            .generate_structured(&prompt, "json_array")
            .map_err(|e| ExtractorError::Llm(e.to_string()))?;

        let candidates = parse_candidates(&response, schema)?;
        info!(count = candidates.len(), "parsed field candidates");

        Ok(candidates)
    }

    fn clarify(
        &self,
        request: &ClarificationRequest,
    ) -> Result<Option<FieldCandidate>, Self::Error> {
        let prompt = clarification_prompt(request, self.config.max_evidence_snippets);
        debug!(field = %request.field_name, "built clarification prompt");

        let response = self
            .provider
            .generate(&prompt)
            .map_err(|e| ExtractorError::Llm(e.to_string()))?;

        parse_clarification(&response, &self.schema, &request.field_name)
    }
}
