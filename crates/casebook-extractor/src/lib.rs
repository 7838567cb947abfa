//! Casebook Field Extractor
//!
//! Turns evidence into typed field candidates for one clinical concept.
//! Narrative documents go through an LLM with schema-aware prompts; the
//! structured warehouse record is parsed directly, no model in the loop.
//!
//! # Architecture
//!
//! ```text
//! Document text → LlmFieldExtractor → LLM → FieldCandidates
//! Warehouse row → StructuredRecordParser  → FieldCandidates
//! ```
//!
//! Both paths produce [`casebook_domain::FieldCandidate`] values; the
//! adjudication engine downstream does not care which path a candidate
//! came from beyond its stamped provenance.
//!
//! # Example
//!
//! ```
//! use casebook_extractor::{ExtractorConfig, LlmFieldExtractor};
//! use casebook_domain::traits::FieldExtractor;
//! use casebook_domain::{FieldSchema, FieldSpec};
//! use casebook_llm::MockProvider;
//!
//! let schema = FieldSchema::new(vec![FieldSpec::numeric("dose_cgy")]);
//! let extractor = LlmFieldExtractor::new(
//!     MockProvider::new("[]"),
//!     schema.clone(),
//!     ExtractorConfig::default(),
//! );
//!
//! let candidates = extractor.extract_fields("RT summary", &schema).unwrap();
//! assert!(candidates.is_empty());
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod extractor;
mod parser;
mod prompt;
mod structured;

pub use config::ExtractorConfig;
pub use error::ExtractorError;
pub use extractor::LlmFieldExtractor;
pub use parser::{parse_candidates, parse_clarification};
pub use prompt::{clarification_prompt, PromptBuilder};
pub use structured::StructuredRecordParser;
