//! Integrity checker: reconciles the catalog against the filesystem for a
//! subtree (or everything), pruning rows whose paths are gone and updating
//! rows whose size or hash drifted.
//!
//! Progress is reported on a line-oriented stream consumed by the GUI
//! shells: `@@PHASE:<name>`, `@@PROGRESS:<current>:<total>`, and a final
//! `@@RESULT:<json>`.

use std::io::Write;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::coordinator::CatalogHandle;
use crate::error::Error;
use crate::hasher::{self, HashPolicy};
use crate::pathutil;
use crate::storage::models::FileWithPath;

/// Files are reconciled (and committed) in chunks of this size.
const CHUNK_SIZE: usize = 500;

#[derive(Debug, Default, Serialize)]
pub struct IntegrityReport {
    pub checked_dirs: u64,
    pub checked_files: u64,
    pub missing_dirs: u64,
    pub missing_files: u64,
    pub updated_files: u64,
    /// Seconds.
    pub duration: f64,
}

pub struct IntegrityChecker {
    handle: CatalogHandle,
    policy: HashPolicy,
}

impl IntegrityChecker {
    pub fn new(handle: CatalogHandle, policy: HashPolicy) -> Self {
        Self { handle, policy }
    }

    /// One-shot reconciliation. Each chunk runs in its own transaction; a
    /// chunk failure aborts that chunk only and the run continues.
    pub fn check(
        &self,
        base_path: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<IntegrityReport, Error> {
        let start = Instant::now();
        let prefix = base_path.map(pathutil::normalize);
        let mut report = IntegrityReport::default();

        self.check_directories(prefix.as_deref(), out, &mut report)?;
        self.check_files(prefix.as_deref(), out, &mut report)?;

        report.duration = start.elapsed().as_secs_f64();
        let json = serde_json::to_string(&report)
            .map_err(|err| Error::Other(format!("serializing integrity report: {}", err)))?;
        writeln!(out, "@@RESULT:{}", json)?;
        info!(
            "Integrity run finished in {:.2}s: {} dirs / {} files checked, \
             {} dirs / {} files missing, {} files updated",
            report.duration,
            report.checked_dirs,
            report.checked_files,
            report.missing_dirs,
            report.missing_files,
            report.updated_files,
        );
        Ok(report)
    }

    fn check_directories(
        &self,
        prefix: Option<&str>,
        out: &mut dyn Write,
        report: &mut IntegrityReport,
    ) -> Result<(), Error> {
        writeln!(out, "@@PHASE:dirs")?;
        let rows = self.handle.with(|c| c.directories_under(prefix))?;
        let total = rows.len();
        writeln!(out, "@@PROGRESS:0:{}", total)?;

        // Rows are ordered by path, so a deleted parent's descendants
        // follow immediately; their rows are already cascade-removed.
        let mut deleted_prefixes: Vec<String> = Vec::new();
        let mut processed = 0usize;

        for chunk in rows.chunks(CHUNK_SIZE) {
            let result = self.handle.with(|c| -> rusqlite::Result<DirChunkOutcome> {
                c.begin()?;
                let mut outcome = DirChunkOutcome::default();
                for row in chunk {
                    outcome.checked += 1;
                    if deleted_prefixes
                        .iter()
                        .chain(outcome.deleted_prefixes.iter())
                        .any(|p| pathutil::is_same_or_under(&row.full_path, p))
                    {
                        outcome.missing_dirs += 1;
                        continue;
                    }
                    if !Path::new(&row.full_path).is_dir() {
                        outcome.missing_files +=
                            c.count_files_under(Some(&row.full_path))? as u64;
                        c.delete_directory(row.drive_id, &row.full_path)?;
                        outcome.missing_dirs += 1;
                        outcome.deleted_prefixes.push(row.full_path.clone());
                    }
                }
                c.commit()?;
                Ok(outcome)
            });
            match result {
                Ok(outcome) => {
                    report.checked_dirs += outcome.checked;
                    report.missing_dirs += outcome.missing_dirs;
                    report.missing_files += outcome.missing_files;
                    deleted_prefixes.extend(outcome.deleted_prefixes);
                }
                Err(err) => {
                    let _ = self.handle.with(|c| c.rollback());
                    warn!("Directory chunk failed, continuing: {}", err);
                }
            }
            processed += chunk.len();
            writeln!(out, "@@PROGRESS:{}:{}", processed, total)?;
        }
        Ok(())
    }

    fn check_files(
        &self,
        prefix: Option<&str>,
        out: &mut dyn Write,
        report: &mut IntegrityReport,
    ) -> Result<(), Error> {
        writeln!(out, "@@PHASE:files")?;
        let total = self.handle.with(|c| c.count_files_under(prefix))? as u64;
        let mut processed = 0u64;
        writeln!(out, "@@PROGRESS:0:{}", total)?;

        let mut after_id = 0i64;
        loop {
            let page = self
                .handle
                .with(|c| c.files_page_after(prefix, after_id, CHUNK_SIZE as i64))?;
            if page.is_empty() {
                break;
            }
            after_id = page.last().map(|r| r.id).unwrap_or(after_id);

            let chunk_result = self.handle.with(|c| -> rusqlite::Result<(u64, u64, u64)> {
                c.begin()?;
                let mut checked = 0u64;
                let mut missing = 0u64;
                let mut updated = 0u64;
                for row in &page {
                    checked += 1;
                    if self.reconcile_file(c, row)? {
                        match std::fs::metadata(file_path(row)) {
                            Ok(_) => updated += 1,
                            Err(_) => missing += 1,
                        }
                    }
                }
                c.commit()?;
                Ok((checked, missing, updated))
            });

            match chunk_result {
                Ok((checked, missing, updated)) => {
                    report.checked_files += checked;
                    report.missing_files += missing;
                    report.updated_files += updated;
                }
                Err(err) => {
                    let _ = self.handle.with(|c| c.rollback());
                    warn!("File chunk failed, continuing: {}", err);
                }
            }

            processed += page.len() as u64;
            writeln!(out, "@@PROGRESS:{}:{}", processed, total)?;
        }
        Ok(())
    }

    /// Reconcile one row. Returns true when the row changed (was deleted or
    /// updated).
    fn reconcile_file(
        &self,
        catalog: &mut crate::storage::Catalog,
        row: &FileWithPath,
    ) -> rusqlite::Result<bool> {
        let full = file_path(row);
        let metadata = match std::fs::metadata(&full) {
            Ok(metadata) => metadata,
            Err(_) => {
                catalog.delete_file_row(row)?;
                return Ok(true);
            }
        };

        let size = metadata.len() as i64;
        let hash_wanted = self.policy.should_hash(&row.directory_path);
        let fresh_hash = if hash_wanted {
            hasher::hash_file(Path::new(&full))
        } else {
            None
        };

        let mismatch = size != row.size || (hash_wanted && fresh_hash != row.hash);
        if mismatch {
            let modified_ms = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64);
            let hash = if hash_wanted {
                fresh_hash.as_deref()
            } else {
                row.hash.as_deref()
            };
            catalog.update_file_size_hash(row.id, size, hash, modified_ms)?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[derive(Debug, Default)]
struct DirChunkOutcome {
    checked: u64,
    missing_dirs: u64,
    missing_files: u64,
    deleted_prefixes: Vec<String>,
}

fn file_path(row: &FileWithPath) -> String {
    pathutil::join(
        &row.directory_path,
        &pathutil::join_filename(&row.name, &row.extension),
    )
}
