//! Full pipeline runs over the in-memory cache and fetcher

use casebook_cache::DocumentCache;
use casebook_domain::{DocumentRef, FieldSchema, FieldSpec, FieldValue, SourceLocation};
use casebook_engine::{ConceptRequest, EngineConfig, Pipeline};
use casebook_extract::{ExtractorRegistry, MemoryFetcher};
use casebook_extractor::{ExtractorConfig, LlmFieldExtractor};
use casebook_llm::MockProvider;
use casebook_rules::RuleSet;
use chrono::NaiveDate;
use std::sync::Arc;

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn schema() -> FieldSchema {
    FieldSchema::new(vec![
        FieldSpec::numeric("dose_cgy").required(),
        FieldSpec::date("start_date").required(),
    ])
    .with_normalizer("dose_cgy", |v| match v {
        FieldValue::Numeric(n) if *n < 1000.0 => FieldValue::Numeric(n * 100.0),
        other => other.clone(),
    })
}

fn doc_ref(id: &str, key: &str, priority: i32, doc_date: &str) -> DocumentRef {
    DocumentRef {
        document_id: id.to_string(),
        patient_id: "patient-1".to_string(),
        source_location: SourceLocation::new("reports", key),
        document_type: "treatment_summary".to_string(),
        document_date: date(doc_date),
        content_type: "text/plain".to_string(),
        source_priority: priority,
    }
}

/// Provider scripted per document text; the extraction prompt embeds the
/// document body, so a text fragment is enough to key the response.
fn scripted_provider() -> MockProvider {
    let mut provider = MockProvider::new("[]");
    provider.add_response(
        "Total dose 5400 cGy",
        r#"[
            {"field_name": "dose_cgy", "value": 5400, "confidence": 0.9,
             "citation": "Total dose 5400 cGy"},
            {"field_name": "start_date", "value": "2019-07-15", "confidence": 0.85}
        ]"#,
    );
    provider.add_response(
        "Course of 54 Gy",
        r#"[{"field_name": "dose_cgy", "value": 54, "confidence": 0.8,
             "citation": "Course of 54 Gy"}]"#,
    );
    provider
}

fn pipeline(cache: DocumentCache, fetcher: MemoryFetcher) -> Pipeline<LlmFieldExtractor<MockProvider>> {
    let extractor = LlmFieldExtractor::new(
        scripted_provider(),
        schema(),
        ExtractorConfig::default(),
    );
    Pipeline::new(
        cache,
        Arc::new(fetcher),
        Arc::new(ExtractorRegistry::standard()),
        extractor,
        schema(),
        RuleSet::default(),
        EngineConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn two_documents_merge_after_normalization() {
    let cache = DocumentCache::in_memory().unwrap();
    let mut fetcher = MemoryFetcher::new();
    let doc_a = doc_ref("doc-a", "summary.txt", 1, "2019-08-01");
    let doc_b = doc_ref("doc-b", "note.txt", 2, "2019-07-20");
    fetcher.insert(
        &doc_a.source_location,
        b"Total dose 5400 cGy delivered to the left breast.".to_vec(),
    );
    fetcher.insert(&doc_b.source_location, b"Course of 54 Gy completed.".to_vec());

    let pipeline = pipeline(cache.clone(), fetcher);
    let record = pipeline
        .run(ConceptRequest {
            patient_id: "patient-1".to_string(),
            concept: "radiation_course".to_string(),
            structured: None,
            documents: vec![doc_a, doc_b],
        })
        .await
        .unwrap();

    let dose = &record.fields["dose_cgy"];
    assert_eq!(dose.final_value, Some(FieldValue::Numeric(5400.0)));
    assert!(dose.conflicts.is_empty());
    assert!(dose.confidence > 0.9);

    let start = &record.fields["start_date"];
    assert_eq!(start.final_value, Some(FieldValue::Date(date("2019-07-15"))));
    assert_eq!(start.primary_source_id.as_deref(), Some("doc-a"));

    assert_eq!(record.completeness_ratio, 1.0);
    assert!(cache.is_cached("doc-a").unwrap());
    assert!(cache.is_cached("doc-b").unwrap());
}

#[tokio::test]
async fn missing_document_becomes_absent_source() {
    let cache = DocumentCache::in_memory().unwrap();
    let mut fetcher = MemoryFetcher::new();
    let doc_a = doc_ref("doc-a", "summary.txt", 1, "2019-08-01");
    let doc_gone = doc_ref("doc-gone", "lost.txt", 1, "2019-08-02");
    fetcher.insert(
        &doc_a.source_location,
        b"Total dose 5400 cGy delivered.".to_vec(),
    );

    let pipeline = pipeline(cache.clone(), fetcher);
    let record = pipeline
        .run(ConceptRequest {
            patient_id: "patient-1".to_string(),
            concept: "radiation_course".to_string(),
            structured: None,
            documents: vec![doc_a, doc_gone],
        })
        .await
        .unwrap();

    // The run still produced a record from the surviving source
    assert_eq!(
        record.fields["dose_cgy"].final_value,
        Some(FieldValue::Numeric(5400.0))
    );

    // The failure is persisted so it is not re-attempted
    let cached = cache.get("doc-gone").unwrap().unwrap();
    assert!(!cached.extraction_success);
    assert!(cached.extraction_error.is_some());
}

#[tokio::test]
async fn second_run_reuses_cached_text() {
    let cache = DocumentCache::in_memory().unwrap();
    let mut fetcher = MemoryFetcher::new();
    let doc_a = doc_ref("doc-a", "summary.txt", 1, "2019-08-01");
    fetcher.insert(
        &doc_a.source_location,
        b"Total dose 5400 cGy delivered.".to_vec(),
    );

    let pipeline = pipeline(cache.clone(), fetcher);
    let request = ConceptRequest {
        patient_id: "patient-1".to_string(),
        concept: "radiation_course".to_string(),
        structured: None,
        documents: vec![doc_a],
    };

    let first = pipeline.run(request.clone()).await.unwrap();
    let timestamp = cache.get("doc-a").unwrap().unwrap().extraction_timestamp;

    let second = pipeline.run(request).await.unwrap();
    assert_eq!(second.fields, first.fields);

    // Hit path: the stored record was not rewritten
    let cached = cache.get("doc-a").unwrap().unwrap();
    assert_eq!(cached.extraction_timestamp, timestamp);
}

#[tokio::test]
async fn cached_text_survives_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("casebook.db");

    let mut fetcher = MemoryFetcher::new();
    let doc_a = doc_ref("doc-a", "summary.txt", 1, "2019-08-01");
    fetcher.insert(
        &doc_a.source_location,
        b"Total dose 5400 cGy delivered.".to_vec(),
    );

    {
        let cache = DocumentCache::open(&db_path).unwrap();
        let pipeline = pipeline(cache, fetcher);
        pipeline
            .run(ConceptRequest {
                patient_id: "patient-1".to_string(),
                concept: "radiation_course".to_string(),
                structured: None,
                documents: vec![doc_a.clone()],
            })
            .await
            .unwrap();
    }

    let reopened = DocumentCache::open(&db_path).unwrap();
    let cached = reopened.get("doc-a").unwrap().unwrap();
    assert!(cached.extraction_success);
    assert_eq!(cached.extracted_text, "Total dose 5400 cGy delivered.");
}

#[tokio::test]
async fn worker_limit_one_still_processes_all_documents() {
    let cache = DocumentCache::in_memory().unwrap();
    let mut fetcher = MemoryFetcher::new();
    let doc_a = doc_ref("doc-a", "summary.txt", 1, "2019-08-01");
    let doc_b = doc_ref("doc-b", "note.txt", 2, "2019-07-20");
    fetcher.insert(
        &doc_a.source_location,
        b"Total dose 5400 cGy delivered.".to_vec(),
    );
    fetcher.insert(&doc_b.source_location, b"Course of 54 Gy completed.".to_vec());

    let extractor = LlmFieldExtractor::new(
        scripted_provider(),
        schema(),
        ExtractorConfig::default(),
    );
    let mut config = EngineConfig::default();
    config.worker_limit = 1;
    let pipeline = Pipeline::new(
        cache,
        Arc::new(fetcher),
        Arc::new(ExtractorRegistry::standard()),
        extractor,
        schema(),
        RuleSet::default(),
        config,
    )
    .unwrap();

    let record = pipeline
        .run(ConceptRequest {
            patient_id: "patient-1".to_string(),
            concept: "radiation_course".to_string(),
            structured: None,
            documents: vec![doc_a, doc_b],
        })
        .await
        .unwrap();

    // Both documents contributed: agreement boosted the dose confidence
    assert!(record.fields["dose_cgy"].confidence > 0.9);
}
