//! Casebook text extraction adapters
//!
//! Pluggable per-content-type extractors that turn a document's raw bytes
//! into plain text, plus the byte-fetcher seam in front of the object
//! store. The cache calls these through its fetch-and-extract closure;
//! failures here become persisted failure records, never raised errors.

#![warn(missing_docs)]

mod html;

use casebook_domain::SourceLocation;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Errors from raw-byte retrieval
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The locator does not resolve to an object
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The object store is unreachable or refused the request
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Errors from byte-to-text extraction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    /// No adapter registered for this content type
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),

    /// The adapter could not parse the bytes
    #[error("{kind} extraction failed: {message}")]
    Parse {
        /// Adapter name
        kind: String,
        /// Underlying parse failure
        message: String,
    },

    /// The adapter produced no text
    #[error("extraction produced empty text")]
    EmptyText,
}

/// Fetches raw document bytes from an opaque locator
///
/// Object-store implementations are external collaborators; the in-memory
/// [`MemoryFetcher`] covers tests and the pipeline seam.
pub trait ByteFetcher: Send + Sync {
    /// Retrieve the bytes behind a locator
    fn fetch(&self, location: &SourceLocation) -> Result<Vec<u8>, FetchError>;
}

/// In-memory fetcher keyed by `bucket/key`
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    objects: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    /// Create an empty fetcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes behind a locator
    pub fn insert(&mut self, location: &SourceLocation, bytes: impl Into<Vec<u8>>) {
        self.objects
            .insert(format!("{}/{}", location.bucket, location.key), bytes.into());
    }
}

impl ByteFetcher for MemoryFetcher {
    fn fetch(&self, location: &SourceLocation) -> Result<Vec<u8>, FetchError> {
        self.objects
            .get(&format!("{}/{}", location.bucket, location.key))
            .cloned()
            .ok_or_else(|| FetchError::NotFound(location.to_string()))
    }
}

/// Converts raw document bytes into plain text
pub trait TextExtractor: Send + Sync {
    /// Adapter name, recorded as `extraction_method` in cache provenance
    fn name(&self) -> &'static str;

    /// Extract plain UTF-8 text from the bytes
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Plain-text passthrough with lossy UTF-8 fallback
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// HTML-to-text: strips tags, scripts, and styles; decodes the common
/// entities; folds whitespace
#[derive(Debug, Default)]
pub struct HtmlExtractor;

impl TextExtractor for HtmlExtractor {
    fn name(&self) -> &'static str {
        "html"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        Ok(html::strip_html(&String::from_utf8_lossy(bytes)))
    }
}

/// PDF text extraction via `pdf-extract`
#[derive(Debug, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Parse {
            kind: "PDF".to_string(),
            message: e.to_string(),
        })
    }
}

/// Content-type-keyed adapter registry
///
/// Carries the monotonic `extraction_version` of the extraction logic;
/// bump it when adapter behavior changes so callers can force
/// re-extraction of stale cache rows.
pub struct ExtractorRegistry {
    adapters: HashMap<String, Box<dyn TextExtractor>>,
    version: u32,
}

impl ExtractorRegistry {
    /// Current version of the shipped extraction logic
    pub const CURRENT_VERSION: u32 = 1;

    /// Registry with the standard adapters (plain text, HTML, PDF)
    pub fn standard() -> Self {
        let mut registry = Self::empty(Self::CURRENT_VERSION);
        registry.register("text/plain", Box::new(PlainTextExtractor));
        registry.register("text/html", Box::new(HtmlExtractor));
        registry.register("application/pdf", Box::new(PdfExtractor));
        registry
    }

    /// Empty registry at an explicit version
    pub fn empty(version: u32) -> Self {
        Self {
            adapters: HashMap::new(),
            version,
        }
    }

    /// Register (or replace) the adapter for a content type
    pub fn register(&mut self, content_type: impl Into<String>, adapter: Box<dyn TextExtractor>) {
        self.adapters.insert(content_type.into(), adapter);
    }

    /// Version recorded as `extraction_version` in cache provenance
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Name of the adapter for a content type, if registered
    pub fn adapter_name(&self, content_type: &str) -> Option<&'static str> {
        self.adapters.get(content_type).map(|a| a.name())
    }

    /// Dispatch extraction by declared content type
    ///
    /// Empty output is an error: a document that extracts to nothing is
    /// useless evidence and should be recorded as a failure.
    pub fn extract(&self, content_type: &str, bytes: &[u8]) -> Result<String, ExtractError> {
        let adapter = self
            .adapters
            .get(content_type)
            .ok_or_else(|| ExtractError::UnsupportedContentType(content_type.to_string()))?;

        debug!(content_type, adapter = adapter.name(), "extracting text");
        let text = adapter.extract(bytes)?;
        if text.trim().is_empty() {
            return Err(ExtractError::EmptyText);
        }
        Ok(text)
    }
}
