//! Error types for the adjudication engine
//!
//! The taxonomy is deliberately small: data-level problems (missing
//! sources, failed extractions, implausible values) are recorded in the
//! `AdjudicatedRecord` rather than raised. Only programmer errors and
//! invalid configuration abort a run.

use casebook_domain::SchemaError;
use casebook_rules::RuleError;
use thiserror::Error;

/// Errors that abort an adjudication run
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A candidate or rule referenced the schema incorrectly
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A plausibility rule definition is malformed
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    /// A spawned adjudication task failed to join
    #[error("Task join error: {0}")]
    Join(String),
}
