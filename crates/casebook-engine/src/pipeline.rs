//! The async concept-run pipeline
//!
//! Wires the cache, byte fetcher, text-extraction registry, and field
//! extractor into one run: fill the cache for every document under a
//! bounded worker pool, extract field candidates from each successful
//! text, then hand everything to the synchronous adjudication.
//!
//! Cancellation model: dropping the future returned by [`Pipeline::run`]
//! abandons adjudication, but document extraction tasks are spawned, so
//! in-flight fetch-and-extract work completes and lands in the cache
//! rather than being wasted.

use crate::adjudicate::adjudicate;
use crate::config::EngineConfig;
use crate::error::EngineError;
use casebook_cache::{DocumentCache, ExtractedText, ExtractionFailure};
use casebook_domain::traits::FieldExtractor;
use casebook_domain::{AdjudicatedRecord, DocumentRef, FieldSchema, SourceExtraction};
use casebook_extract::{ByteFetcher, ExtractorRegistry};
use casebook_rules::RuleSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

const EXTRACTOR_NAME: &str = "casebook-extract";

/// One concept run's inputs
///
/// The structured source arrives pre-parsed as a [`SourceExtraction`];
/// structured-field parsing is the caller's step, typically via
/// `casebook-extractor`'s structured-record parser.
#[derive(Debug, Clone)]
pub struct ConceptRequest {
    /// Patient under extraction
    pub patient_id: String,
    /// Clinical concept (e.g., "radiation_course")
    pub concept: String,
    /// The single structured source, if one exists for this patient
    pub structured: Option<SourceExtraction>,
    /// Narrative documents to consult
    pub documents: Vec<DocumentRef>,
}

/// The assembled concept pipeline
pub struct Pipeline<E> {
    cache: DocumentCache,
    fetcher: Arc<dyn ByteFetcher>,
    registry: Arc<ExtractorRegistry>,
    field_extractor: Arc<E>,
    schema: FieldSchema,
    rules: RuleSet,
    config: EngineConfig,
}

impl<E> Pipeline<E>
where
    E: FieldExtractor + Send + Sync + 'static,
    E::Error: std::fmt::Display + Send + 'static,
{
    /// Assemble a pipeline; fails fast on invalid configuration or rules
    pub fn new(
        cache: DocumentCache,
        fetcher: Arc<dyn ByteFetcher>,
        registry: Arc<ExtractorRegistry>,
        field_extractor: E,
        schema: FieldSchema,
        rules: RuleSet,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::Config)?;
        rules.validate(&schema)?;
        Ok(Self {
            cache,
            fetcher,
            registry,
            field_extractor: Arc::new(field_extractor),
            schema,
            rules,
            config,
        })
    }

    /// Run one concept extraction end to end
    ///
    /// Always produces a record for valid inputs: missing documents,
    /// failed extractions, and implausible values surface inside the
    /// record, never as errors.
    pub async fn run(&self, request: ConceptRequest) -> Result<AdjudicatedRecord, EngineError> {
        info!(
            patient = %request.patient_id,
            concept = %request.concept,
            documents = request.documents.len(),
            "starting concept run"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.worker_limit));
        let mut handles = Vec::with_capacity(request.documents.len());
        for doc_ref in request.documents.iter().cloned() {
            handles.push(tokio::spawn(Self::extract_source(
                self.cache.clone(),
                Arc::clone(&self.fetcher),
                Arc::clone(&self.registry),
                Arc::clone(&self.field_extractor),
                self.schema.clone(),
                Arc::clone(&semaphore),
                doc_ref,
            )));
        }

        // Barrier: adjudication sees every source succeed or fail first
        let mut documents = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Some(source)) => documents.push(source),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "document worker panicked"),
            }
        }

        let structured = request.structured;
        let extractor = Arc::clone(&self.field_extractor);
        let schema = self.schema.clone();
        let rules = self.rules.clone();
        let config = self.config.clone();
        let patient_id = request.patient_id;
        let concept = request.concept;

        // Adjudication (including clarification calls) is synchronous;
        // keep it off the reactor
        tokio::task::spawn_blocking(move || {
            adjudicate(
                &patient_id,
                &concept,
                structured.as_ref(),
                &documents,
                &*extractor,
                &schema,
                &rules,
                &config,
            )
        })
        .await
        .map_err(|e| EngineError::Join(e.to_string()))?
    }

    /// One document worker: fill the cache, then extract field candidates.
    ///
    /// Returns None when the source contributes nothing; an absent
    /// candidate set is how source failures reach adjudication.
    async fn extract_source(
        cache: DocumentCache,
        fetcher: Arc<dyn ByteFetcher>,
        registry: Arc<ExtractorRegistry>,
        field_extractor: Arc<E>,
        schema: FieldSchema,
        semaphore: Arc<Semaphore>,
        doc_ref: DocumentRef,
    ) -> Option<SourceExtraction> {
        // The semaphore is never closed while workers hold it
        let _permit = semaphore.acquire_owned().await.ok()?;

        let outcome = cache
            .get_or_extract(&doc_ref, || {
                let fetcher = Arc::clone(&fetcher);
                let registry = Arc::clone(&registry);
                let doc_ref = doc_ref.clone();
                async move { fetch_and_extract(fetcher.as_ref(), &registry, &doc_ref) }
            })
            .await;

        let doc = match outcome {
            Ok(doc) => doc,
            Err(e) => {
                warn!(document_id = %doc_ref.document_id, error = %e, "cache failure; source skipped");
                return None;
            }
        };
        if !doc.extraction_success {
            debug!(document_id = %doc_ref.document_id, "extraction failed earlier; source skipped");
            return None;
        }

        let text = doc.extracted_text;
        let result =
            tokio::task::spawn_blocking(move || field_extractor.extract_fields(&text, &schema))
                .await;

        match result {
            Ok(Ok(candidates)) => Some(SourceExtraction::document(
                doc_ref.document_id.clone(),
                doc_ref.source_priority,
                doc_ref.document_date,
                candidates,
            )),
            Ok(Err(e)) => {
                warn!(document_id = %doc_ref.document_id, error = %e, "field extraction failed; source skipped");
                None
            }
            Err(e) => {
                warn!(document_id = %doc_ref.document_id, error = %e, "field extraction task panicked");
                None
            }
        }
    }
}

/// Synchronous fetch-and-extract, shaped for the cache's closure seam
fn fetch_and_extract(
    fetcher: &dyn ByteFetcher,
    registry: &ExtractorRegistry,
    doc_ref: &DocumentRef,
) -> Result<ExtractedText, ExtractionFailure> {
    let version = registry.version();
    let method = registry
        .adapter_name(&doc_ref.content_type)
        .unwrap_or("unknown")
        .to_string();
    let failure = |error: String, method: &str| ExtractionFailure {
        error,
        method: method.to_string(),
        extractor_name: EXTRACTOR_NAME.to_string(),
        version,
    };

    let bytes = fetcher
        .fetch(&doc_ref.source_location)
        .map_err(|e| failure(e.to_string(), &method))?;
    let text = registry
        .extract(&doc_ref.content_type, &bytes)
        .map_err(|e| failure(e.to_string(), &method))?;

    Ok(ExtractedText {
        text,
        method,
        extractor_name: EXTRACTOR_NAME.to_string(),
        version,
    })
}
