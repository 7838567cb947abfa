//! Configuration for the field extractor

use serde::{Deserialize, Serialize};

/// Configuration for the field extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Maximum input text length (characters)
    pub max_text_length: usize,

    /// Confidence assigned to values read from the structured record
    pub structured_confidence: f64,

    /// Maximum evidence snippets quoted in a clarification prompt
    pub max_evidence_snippets: usize,
}

impl ExtractorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_text_length == 0 {
            return Err("max_text_length must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.structured_confidence) {
            return Err("structured_confidence must be in [0.0, 1.0]".to_string());
        }
        if self.max_evidence_snippets == 0 {
            return Err("max_evidence_snippets must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Strict preset: shorter inputs, less trusting of the warehouse
    pub fn strict() -> Self {
        Self {
            max_text_length: 20_000,
            structured_confidence: 0.85,
            max_evidence_snippets: 4,
        }
    }

    /// Lenient preset: larger inputs, more context in clarifications
    pub fn lenient() -> Self {
        Self {
            max_text_length: 100_000,
            structured_confidence: 0.95,
            max_evidence_snippets: 12,
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

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_text_length: 50_000,
            structured_confidence: 0.95,
            max_evidence_snippets: 8,
        }
    }
}
