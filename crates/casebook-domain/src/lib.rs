//! Casebook Domain Layer
//!
//! This crate contains the core data model for Casebook: the types that flow
//! between the document text cache, the field extractors, and the
//! adjudication engine. It holds no I/O; infrastructure implementations live
//! in other crates.
//!
//! ## Key Concepts
//!
//! - **Concept**: one clinical construct being extracted (e.g., a
//!   radiation-treatment course), composed of named fields
//! - **Source**: one origin of evidence — the single structured record or
//!   one narrative document
//! - **Field candidate**: one proposed value for one field from one source,
//!   with confidence and citation
//! - **Adjudication**: resolving competing candidates into one final value
//!   with full provenance and a conflict audit trail
//!
//! ## Architecture
//!
//! - Value types and trait seams only
//! - The cache crate owns `CachedDocument` persistence
//! - The engine crate owns `AdjudicatedRecord` construction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adjudicated;
pub mod clarification;
pub mod document;
pub mod field;
pub mod inconsistency;
pub mod record;
pub mod schema;
pub mod traits;

// Re-exports for convenience
pub use adjudicated::{AdjudicatedField, Conflict, FieldState};
pub use clarification::{ClarificationOutcome, ClarificationRound};
pub use document::{CachedDocument, DocumentRef, SourceLocation};
pub use field::{FieldCandidate, FieldValue, SourceExtraction, SourceKind};
pub use inconsistency::{Inconsistency, Severity};
pub use record::{AdjudicatedRecord, RecordId};
pub use schema::{FieldKind, FieldSchema, FieldSpec, SchemaError};
