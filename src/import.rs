//! Bulk spreadsheet import. Rows are normalized, written in fixed-size batches one after
//! another, and keyed deterministically so re-importing a file overwrites instead of
//! duplicating.

use crate::config::DEFAULT_IMPORT_BATCH_SIZE;
use crate::error::{AnalyticsError, Result};
use crate::ingestion::{map_import_row, ImportRow};
use crate::schema::RecordSource;
use crate::store::{to_document, DocumentStore, WriteOp, RECORDS_COLLECTION};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProgress {
    /// Rows handled so far, skipped ones included.
    pub processed: usize,
    pub total: usize,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 0-based position in the input.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportReport {
    /// Distinct documents written. Rows sharing student, branch and class collapse into one.
    pub imported: usize,
    /// Upserts sent to the store, duplicates included.
    pub written: usize,
    pub skipped: Vec<SkippedRow>,
    pub batches: usize,
}

#[derive(Debug, Clone)]
pub struct BulkImporter {
    batch_size: usize,
}

impl Default for BulkImporter {
    fn default() -> Self {
        Self::new(DEFAULT_IMPORT_BATCH_SIZE)
    }
}

impl BulkImporter {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn effective_batch_size<S: DocumentStore + ?Sized>(&self, store: &S) -> usize {
        self.batch_size.min(store.max_batch_size()).max(1)
    }

    /// Imports `rows` batch by batch. Bad rows are skipped with a warning. The first failed
    /// batch aborts the import; batches committed before it stay in the store.
    pub fn import_rows<S, F>(
        &self,
        store: &mut S,
        rows: &[ImportRow],
        mut on_progress: F,
    ) -> Result<ImportReport>
    where
        S: DocumentStore + ?Sized,
        F: FnMut(ImportProgress),
    {
        let total = rows.len();
        let batch_size = self.effective_batch_size(store);
        let mut report = ImportReport::default();
        let mut ids: HashSet<String> = HashSet::new();

        for (chunk_index, chunk) in rows.chunks(batch_size).enumerate() {
            let offset = chunk_index * batch_size;
            let mut ops = Vec::with_capacity(chunk.len());
            let mut chunk_ids = Vec::with_capacity(chunk.len());

            for (i, row) in chunk.iter().enumerate() {
                let position = offset + i;
                match map_import_row(row) {
                    Ok(record) => {
                        let id = record.id.clone().unwrap_or_default();
                        ops.push(WriteOp::upsert(RECORDS_COLLECTION, id.clone(), to_document(&record)?));
                        chunk_ids.push(id);
                    }
                    Err(e) => {
                        warn!("Skipping import row {}: {}", position, e);
                        report.skipped.push(SkippedRow {
                            row: position,
                            reason: e.to_string(),
                        });
                    }
                }
            }

            let batch_len = ops.len();
            if batch_len > 0 {
                store
                    .commit_batch(ops)
                    .map_err(|e| AnalyticsError::BatchFailed {
                        batch: report.batches + 1,
                        committed: report.imported,
                        message: e.to_string(),
                    })?;
                report.written += batch_len;
                ids.extend(chunk_ids);
                report.imported = ids.len();
                report.batches += 1;
            }

            let processed = offset + chunk.len();
            let progress = ImportProgress {
                processed,
                total,
                percent: percent(processed, total),
            };
            info!(
                "Import chunk {} done ({} records, {}%)",
                chunk_index + 1,
                batch_len,
                progress.percent
            );
            on_progress(progress);
        }

        info!(
            "Import finished: {} imported, {} skipped in {} batches",
            report.imported,
            report.skipped.len(),
            report.batches
        );
        Ok(report)
    }

    /// Deletes every record written by a previous import, batch by batch. Returns how many
    /// were deleted.
    pub fn clear_imported<S>(&self, store: &mut S) -> Result<usize>
    where
        S: DocumentStore + ?Sized,
    {
        let source = serde_json::to_value(RecordSource::ExcelImport)?;
        let ids: Vec<String> = store
            .find_by_field(RECORDS_COLLECTION, "source", &source)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let batch_size = self.effective_batch_size(store);
        let mut deleted = 0;
        for (batch_index, chunk) in ids.chunks(batch_size).enumerate() {
            let ops = chunk
                .iter()
                .map(|id| WriteOp::delete(RECORDS_COLLECTION, id.clone()))
                .collect();
            store
                .commit_batch(ops)
                .map_err(|e| AnalyticsError::BatchFailed {
                    batch: batch_index + 1,
                    committed: deleted,
                    message: e.to_string(),
                })?;
            deleted += chunk.len();
        }

        info!("Removed {} imported records", deleted);
        Ok(deleted)
    }
}

fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed as f64 / total as f64) * 100.0).round() as u8
}
