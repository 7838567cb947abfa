//! Casebook Document Text Cache
//!
//! A content-addressed, provenance-tracking store that turns expensive
//! document-to-text extraction into a one-time cost. One SQLite row per
//! document identity; the single-flight [`DocumentCache::get_or_extract`]
//! guarantees at most one in-flight extraction per `document_id` under
//! concurrent access.
//!
//! # Architecture
//!
//! - SQLite for durable records (bundled rusqlite, WAL not required — one
//!   writer at a time behind a connection mutex)
//! - Per-document-id async locks for single-flight coordination
//! - SHA-256 content hashing for text de-duplication detection
//!
//! # Examples
//!
//! ```no_run
//! use casebook_cache::DocumentCache;
//!
//! let cache = DocumentCache::open("casebook.db").unwrap();
//! assert!(!cache.is_cached("doc-1").unwrap());
//! ```

#![warn(missing_docs)]

mod export;
mod stats;

pub use stats::CacheStats;

use casebook_domain::{CachedDocument, DocumentRef, SourceLocation};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Errors that can occur during cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Invalid data in the store
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Export/import serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Export/import I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Successful output of a fetch-and-extract closure
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    /// The extracted plain text
    pub text: String,
    /// Adapter that produced the text (e.g., "pdf")
    pub method: String,
    /// Extractor implementation name
    pub extractor_name: String,
    /// Monotonic version of the extraction logic
    pub version: u32,
}

/// Failed output of a fetch-and-extract closure
///
/// Failures are data, not errors: the cache persists them so a known-bad
/// extraction is not re-attempted until the caller forces re-extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionFailure {
    /// What went wrong (fetch error, parse error, empty text, ...)
    pub error: String,
    /// Adapter that failed, if dispatch got that far
    pub method: String,
    /// Extractor implementation name
    pub extractor_name: String,
    /// Monotonic version of the extraction logic
    pub version: u32,
}

/// Lowercase hex SHA-256 of extracted text, used for de-duplication
/// detection across documents (not as the cache key)
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SQLite-backed document text cache
///
/// Explicitly constructed and passed into the engine (no global state);
/// cloning shares the underlying connection and flight table.
///
/// # Thread safety
///
/// All persistent operations serialize on a connection mutex. Single-flight
/// locking is per-`document_id`: callers for different documents never
/// contend, and reads of already-cached entries never block on extractions.
#[derive(Clone)]
pub struct DocumentCache {
    conn: Arc<Mutex<Connection>>,
    flights: Arc<AsyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl DocumentCache {
    /// Open (or create) a cache at the given database path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory cache, useful for tests
    pub fn in_memory() -> Result<Self, CacheError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            flights: Arc::new(AsyncMutex::new(HashMap::new())),
        })
    }

    /// Whether a record exists for this document identity. No side effects.
    pub fn is_cached(&self, document_id: &str) -> Result<bool, CacheError> {
        let conn = self.lock_conn();
        let exists: Option<bool> = conn
            .query_row(
                "SELECT 1 FROM documents WHERE document_id = ?1",
                params![document_id],
                |_| Ok(true),
            )
            .optional()?;
        Ok(exists.unwrap_or(false))
    }

    /// Fetch one cached record
    pub fn get(&self, document_id: &str) -> Result<Option<CachedDocument>, CacheError> {
        let conn = self.lock_conn();
        let doc = conn
            .query_row(
                &format!("{} WHERE document_id = ?1", SELECT_DOCUMENT),
                params![document_id],
                row_to_document,
            )
            .optional()?;
        Ok(doc)
    }

    /// Explicit whole-record upsert
    ///
    /// Overwrites unconditionally; callers own the `extraction_version`
    /// comparison policy when forcing re-extraction.
    pub fn put(&self, doc: &CachedDocument) -> Result<(), CacheError> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT OR REPLACE INTO documents (
                document_id, patient_id, bucket, object_key, revision,
                document_type, document_date, content_type,
                extracted_text, text_length, content_hash,
                extraction_timestamp, extraction_method, extraction_version,
                extractor_name, extraction_success, extraction_error
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                doc.document_id,
                doc.patient_id,
                doc.source_location.bucket,
                doc.source_location.key,
                doc.source_location.revision,
                doc.document_type,
                doc.document_date.to_string(),
                doc.content_type,
                doc.extracted_text,
                doc.text_length as i64,
                doc.content_hash,
                doc.extraction_timestamp as i64,
                doc.extraction_method,
                doc.extraction_version,
                doc.extractor_name,
                doc.extraction_success,
                doc.extraction_error,
            ],
        )?;
        Ok(())
    }

    /// The core operation: return the cached record, or run
    /// `fetch_and_extract` exactly once across all concurrent callers for
    /// this `document_id` and persist its outcome before anyone sees it.
    ///
    /// Closure failures are captured into a persisted record with
    /// `extraction_success = false`; they are not raised and later calls
    /// will not re-attempt them.
    pub async fn get_or_extract<F, Fut>(
        &self,
        doc_ref: &DocumentRef,
        fetch_and_extract: F,
    ) -> Result<CachedDocument, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<ExtractedText, ExtractionFailure>>,
    {
        // Fast path: resolved entries never block on in-flight extractions
        if let Some(doc) = self.get(&doc_ref.document_id)? {
            debug!(document_id = %doc_ref.document_id, "cache hit");
            return Ok(doc);
        }

        let flight = {
            let mut flights = self.flights.lock().await;
            flights
                .entry(doc_ref.document_id.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let doc = {
            let _guard = flight.lock().await;

            // Losers of the flight race find the winner's persisted result
            match self.get(&doc_ref.document_id)? {
                Some(doc) => {
                    debug!(document_id = %doc_ref.document_id, "cache hit after flight wait");
                    doc
                }
                None => {
                    info!(document_id = %doc_ref.document_id, "extracting");
                    let outcome = fetch_and_extract().await;
                    let doc = build_record(doc_ref, outcome);
                    if !doc.extraction_success {
                        warn!(
                            document_id = %doc_ref.document_id,
                            error = doc.extraction_error.as_deref().unwrap_or(""),
                            "extraction failed; persisting failure record"
                        );
                    }
                    self.put(&doc)?;
                    doc
                }
            }
        };

        // Drop the flight entry once nobody else is waiting on it
        let mut flights = self.flights.lock().await;
        if let Some(entry) = flights.get(&doc_ref.document_id) {
            // One reference in the map plus our local clone
            if Arc::strong_count(entry) <= 2 {
                flights.remove(&doc_ref.document_id);
            }
        }

        Ok(doc)
    }

    /// All cached records for a patient, ordered by `document_date`
    /// ascending then `document_id`
    pub fn list_by_patient(
        &self,
        patient_id: &str,
        document_type: Option<&str>,
    ) -> Result<Vec<CachedDocument>, CacheError> {
        let conn = self.lock_conn();

        let mut sql = format!("{} WHERE patient_id = ?", SELECT_DOCUMENT);
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(patient_id.to_string())];

        if let Some(doc_type) = document_type {
            sql.push_str(" AND document_type = ?");
            sql_params.push(Box::new(doc_type.to_string()));
        }
        sql.push_str(" ORDER BY document_date, document_id");

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = sql_params.iter().map(|p| p.as_ref()).collect();
        let docs = stmt
            .query_map(&param_refs[..], row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    /// Delete every record for a patient. The only deletion path.
    pub fn purge_patient(&self, patient_id: &str) -> Result<usize, CacheError> {
        let conn = self.lock_conn();
        let deleted = conn.execute(
            "DELETE FROM documents WHERE patient_id = ?1",
            params![patient_id],
        )?;
        info!(patient_id, deleted, "purged patient cache");
        Ok(deleted)
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned mutex means a panic mid-write; continuing is safe
        // because every write is a single whole-record statement
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

const SELECT_DOCUMENT: &str = "SELECT document_id, patient_id, bucket, object_key, revision, \
     document_type, document_date, content_type, extracted_text, text_length, \
     content_hash, extraction_timestamp, extraction_method, extraction_version, \
     extractor_name, extraction_success, extraction_error FROM documents";

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<CachedDocument> {
    let date_str: String = row.get(6)?;
    let document_date: NaiveDate = date_str.parse().map_err(|e: chrono::ParseError| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(CachedDocument {
        document_id: row.get(0)?,
        patient_id: row.get(1)?,
        source_location: SourceLocation {
            bucket: row.get(2)?,
            key: row.get(3)?,
            revision: row.get(4)?,
        },
        document_type: row.get(5)?,
        document_date,
        content_type: row.get(7)?,
        extracted_text: row.get(8)?,
        text_length: row.get::<_, i64>(9)? as u64,
        content_hash: row.get(10)?,
        extraction_timestamp: row.get::<_, i64>(11)? as u64,
        extraction_method: row.get(12)?,
        extraction_version: row.get(13)?,
        extractor_name: row.get(14)?,
        extraction_success: row.get(15)?,
        extraction_error: row.get(16)?,
    })
}

fn build_record(
    doc_ref: &DocumentRef,
    outcome: Result<ExtractedText, ExtractionFailure>,
) -> CachedDocument {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    match outcome {
        Ok(extracted) => CachedDocument {
            document_id: doc_ref.document_id.clone(),
            patient_id: doc_ref.patient_id.clone(),
            source_location: doc_ref.source_location.clone(),
            document_type: doc_ref.document_type.clone(),
            document_date: doc_ref.document_date,
            content_type: doc_ref.content_type.clone(),
            text_length: extracted.text.len() as u64,
            content_hash: content_hash(&extracted.text),
            extracted_text: extracted.text,
            extraction_timestamp: timestamp,
            extraction_method: extracted.method,
            extraction_version: extracted.version,
            extractor_name: extracted.extractor_name,
            extraction_success: true,
            extraction_error: None,
        },
        Err(failure) => CachedDocument {
            document_id: doc_ref.document_id.clone(),
            patient_id: doc_ref.patient_id.clone(),
            source_location: doc_ref.source_location.clone(),
            document_type: doc_ref.document_type.clone(),
            document_date: doc_ref.document_date,
            content_type: doc_ref.content_type.clone(),
            extracted_text: String::new(),
            text_length: 0,
            content_hash: content_hash(""),
            extraction_timestamp: timestamp,
            extraction_method: failure.method,
            extraction_version: failure.version,
            extractor_name: failure.extractor_name,
            extraction_success: false,
            extraction_error: Some(failure.error),
        },
    }
}
