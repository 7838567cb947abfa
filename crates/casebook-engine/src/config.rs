//! Configuration for the adjudication engine

use casebook_domain::Severity;
use serde::{Deserialize, Serialize};

/// Configuration for the adjudication engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum structured-source confidence for the structured precedence
    /// rule to decide a disagreement
    pub agreement_threshold: f64,

    /// Confidence boost per corroborating source when all sources agree
    pub corroboration_bonus: f64,

    /// Hard bound on clarification rounds per field
    pub max_rounds: u32,

    /// Fields that exhaust clarification finalize strictly below this
    pub review_confidence_cap: f64,

    /// Concurrent document fetch-and-extract workers per concept run
    pub worker_limit: usize,

    /// Minimum inconsistency severity that opens clarification
    pub clarify_severity_floor: Severity,
}

impl EngineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.agreement_threshold) {
            return Err("agreement_threshold must be in [0.0, 1.0]".to_string());
        }
        if !(0.0..=1.0).contains(&self.corroboration_bonus) {
            return Err("corroboration_bonus must be in [0.0, 1.0]".to_string());
        }
        if self.max_rounds == 0 {
            return Err("max_rounds must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.review_confidence_cap) {
            return Err("review_confidence_cap must be in [0.0, 1.0]".to_string());
        }
        if self.worker_limit == 0 {
            return Err("worker_limit must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Strict preset: harder to corroborate, quicker to flag for review
    pub fn strict() -> Self {
        Self {
            agreement_threshold: 0.9,
            corroboration_bonus: 0.02,
            max_rounds: 2,
            review_confidence_cap: 0.4,
            worker_limit: 4,
            clarify_severity_floor: Severity::Low,
        }
    }

    /// Lenient preset: more rounds, larger corroboration boost
    pub fn lenient() -> Self {
        Self {
            agreement_threshold: 0.7,
            corroboration_bonus: 0.1,
            max_rounds: 5,
            review_confidence_cap: 0.5,
            worker_limit: 8,
            clarify_severity_floor: Severity::High,
        }
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to a TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agreement_threshold: 0.8,
            corroboration_bonus: 0.05,
            max_rounds: 3,
            review_confidence_cap: 0.5,
            worker_limit: 4,
            clarify_severity_floor: Severity::Medium,
        }
    }
}
