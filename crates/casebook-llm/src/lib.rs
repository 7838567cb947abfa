//! Casebook LLM Provider Layer
//!
//! Implementations of the `LlmProvider` trait from `casebook-domain`. Field
//! extraction and clarification both go through this seam, so a scripted
//! mock is enough to exercise the whole adjudication engine offline.
//!
//! # Providers
//!
//! - `MockProvider`: deterministic scripted responses for testing
//! - `OllamaProvider`: local Ollama API integration
//!
//! # Examples
//!
//! ```
//! use casebook_llm::MockProvider;
//! use casebook_domain::traits::LlmProvider;
//!
//! let provider = MockProvider::new("[]");
//! assert_eq!(provider.generate("any prompt").unwrap(), "[]");
//! ```

#![warn(missing_docs)]

pub mod ollama;

use casebook_domain::traits::LlmProvider as LlmProviderTrait;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub use ollama::OllamaProvider;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from the model
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Model not available at the endpoint
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

/// Deterministic mock provider
///
/// Returns scripted responses without network calls. Responses can be keyed
/// by a substring of the prompt, which lets one mock serve both the initial
/// extraction prompt and later clarification prompts in a single test.
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    responses: Arc<Mutex<Vec<(String, String)>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockProvider {
    /// Create a provider returning one fixed response for every prompt
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            responses: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Script a response for any prompt containing `needle`. Earlier
    /// scripts win when several match.
    pub fn add_response(&mut self, needle: impl Into<String>, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push((needle.into(), response.into()));
    }

    /// Script a failure for any prompt containing `needle`
    pub fn add_error(&mut self, needle: impl Into<String>) {
        self.add_response(needle, "\u{0}ERROR");
    }

    /// How many times `generate` has been called
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Reset the call counter
    pub fn reset_call_count(&self) {
        *self.call_count.lock().unwrap() = 0;
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("[]")
    }
}

impl LlmProviderTrait for MockProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        *self.call_count.lock().unwrap() += 1;

        let responses = self.responses.lock().unwrap();
        for (needle, response) in responses.iter() {
            if prompt.contains(needle.as_str()) {
                if response == "\u{0}ERROR" {
                    return Err(LlmError::Other("scripted mock error".to_string()));
                }
                return Ok(response.clone());
            }
        }

        Ok(self.default_response.clone())
    }

    fn generate_structured(&self, prompt: &str, _schema: &str) -> Result<String, Self::Error> {
        self.generate(prompt)
    }
}
