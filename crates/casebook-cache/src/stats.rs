//! Patient-scoped cache statistics

use crate::{CacheError, DocumentCache};
use rusqlite::params;
use std::collections::BTreeMap;

/// Summary of one patient's cached documents
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheStats {
    /// Number of cached records (successes and recorded failures)
    pub total: usize,
    /// Number of successful extractions
    pub success_count: usize,
    /// `success_count / total`, 0.0 for an empty cache
    pub success_rate: f64,
    /// Total extracted characters across successful records
    pub char_total: u64,
    /// Record counts per document type
    pub by_document_type: BTreeMap<String, usize>,
    /// Record counts per content type
    pub by_content_type: BTreeMap<String, usize>,
}

impl DocumentCache {
    /// Aggregate statistics over one patient's cached documents
    pub fn stats(&self, patient_id: &str) -> Result<CacheStats, CacheError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT document_type, content_type, extraction_success, text_length \
             FROM documents WHERE patient_id = ?1",
        )?;

        let rows = stmt.query_map(params![patient_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut stats = CacheStats::default();
        for row in rows {
            let (document_type, content_type, success, text_length) = row?;
            stats.total += 1;
            if success {
                stats.success_count += 1;
                stats.char_total += text_length as u64;
            }
            *stats.by_document_type.entry(document_type).or_insert(0) += 1;
            *stats.by_content_type.entry(content_type).or_insert(0) += 1;
        }

        if stats.total > 0 {
            stats.success_rate = stats.success_count as f64 / stats.total as f64;
        }
        Ok(stats)
    }
}
