//! Patient-scoped export and re-import
//!
//! The export format is JSON lines, one full `CachedDocument` per line
//! including every provenance field, ordered by `document_date` then
//! `document_id`. It round-trips through [`DocumentCache::import`].

use crate::{CacheError, DocumentCache};
use casebook_domain::CachedDocument;
use std::io::{BufRead, Write};
use tracing::info;

impl DocumentCache {
    /// Write every cached record for a patient to `sink`, deterministically
    /// ordered
    pub fn export<W: Write>(&self, patient_id: &str, sink: &mut W) -> Result<usize, CacheError> {
        let docs = self.list_by_patient(patient_id, None)?;
        for doc in &docs {
            serde_json::to_writer(&mut *sink, doc)?;
            sink.write_all(b"\n")?;
        }
        info!(patient_id, exported = docs.len(), "exported patient cache");
        Ok(docs.len())
    }

    /// Read records from a previous export and upsert each one
    pub fn import<R: BufRead>(&self, source: R) -> Result<usize, CacheError> {
        let mut imported = 0;
        for line in source.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let doc: CachedDocument = serde_json::from_str(&line)?;
            self.put(&doc)?;
            imported += 1;
        }
        Ok(imported)
    }
}
