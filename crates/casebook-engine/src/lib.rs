//! Casebook Adjudication Engine
//!
//! Fuses field candidates from one structured source and many narrative
//! documents into a single [`casebook_domain::AdjudicatedRecord`] per
//! patient and clinical concept.
//!
//! # Architecture
//!
//! ```text
//! DocumentRefs → cache (single-flight) → text → FieldExtractor → candidates
//! Structured record ────────────────────────────────────────────→ candidates
//!                                                                    │
//!                  aggregate → resolve per field → consistency pass →│
//!                        bounded clarification loop → AdjudicatedRecord
//! ```
//!
//! Per-field resolution is pure and deterministic; all I/O lives in the
//! async [`Pipeline`]. A run always yields a record: failed sources
//! become absent candidates, implausible values become recorded
//! findings, unresolvable conflicts become review flags.

#![warn(missing_docs)]

mod adjudicate;
mod aggregate;
mod clarify;
mod config;
mod error;
mod metrics;
mod pipeline;
mod resolve;

pub use adjudicate::adjudicate;
pub use aggregate::aggregate;
pub use clarify::build_request;
pub use config::EngineConfig;
pub use error::EngineError;
pub use metrics::{completeness_ratio, overall_confidence};
pub use pipeline::{ConceptRequest, Pipeline};
pub use resolve::{
    resolve_field, RULE_MOST_RECENT, RULE_MOST_TRUSTED, RULE_STRUCTURED_COMPLETE, RULE_UNRESOLVED,
};
