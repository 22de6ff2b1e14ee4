//! Recursive scanner: walks a base path top-down, populates the catalog in
//! batched transactions, and checkpoints progress so an interrupted scan
//! resumes where it left off.

pub mod ignore;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, UNIX_EPOCH};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::alias::DriveAliasResolver;
use crate::coordinator::CatalogHandle;
use crate::error::Error;
use crate::hasher::{self, HashPolicy};
use crate::pathutil;
use crate::storage::models::FileUpsert;
use ignore::IgnoreRules;

/// Checkpoint (progress row + commit) every this many directories.
const PROGRESS_DIR_INTERVAL: u64 = 1000;

#[derive(Debug)]
pub struct ScanOutcome {
    pub drive: String,
    pub directories: u64,
    pub files: u64,
    pub duration: Duration,
    pub resumed: bool,
    pub interrupted: bool,
}

/// Decision for one visited directory `current` given resume target
/// `resume`, both normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResumeAction {
    /// Already committed in the previous run; skip the whole subtree.
    PruneSubtree,
    /// An ancestor of the resume point: don't re-process its own entries,
    /// but keep descending toward the target.
    DescendOnly,
    /// At or past the resume point: process normally (and clear the target).
    Process,
}

pub(crate) fn resume_action(current: &str, resume: &str) -> ResumeAction {
    if current >= resume {
        ResumeAction::Process
    } else if pathutil::is_same_or_under(resume, current) {
        ResumeAction::DescendOnly
    } else {
        ResumeAction::PruneSubtree
    }
}

pub struct Scanner {
    handle: CatalogHandle,
    resolver: Arc<DriveAliasResolver>,
    policy: HashPolicy,
    rules: IgnoreRules,
    cancel: Arc<AtomicBool>,
}

impl Scanner {
    pub fn new(
        handle: CatalogHandle,
        resolver: Arc<DriveAliasResolver>,
        policy: HashPolicy,
        rules: IgnoreRules,
    ) -> Self {
        Self {
            handle,
            resolver,
            policy,
            rules,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cooperative stop flag, checked between directories.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Scan `base_path` into the catalog. With `force_restart` the drive's
    /// data is wiped first; otherwise a progress row from an earlier
    /// interrupted run selects the resume point.
    pub fn scan(&self, base_path: &str, force_restart: bool) -> Result<ScanOutcome, Error> {
        let start = Instant::now();

        let canon = self.resolver.canonicalize(base_path);
        if canon.is_alias {
            info!(
                "{} is an alias of {}; scanning the canonical location",
                base_path, canon.path
            );
        }
        let root = canon.path.clone();
        let drive = canon.real_drive.clone();

        let drive_id = self.handle.with(|c| c.get_or_create_drive(&drive))?;

        let mut resume: Option<String> = None;
        if force_restart {
            info!("Restart requested; wiping catalog data for drive {}", drive);
            self.handle.with(|c| c.wipe_drive_data(drive_id))?;
        } else {
            resume = self
                .handle
                .with(|c| c.get_scan_progress(drive_id))?
                .map(|(path, _)| path);
            if let Some(target) = &resume {
                info!("Resuming scan of {} from {}", drive, target);
            }
        }
        let resumed = resume.is_some();

        self.handle.with(|c| c.begin())?;
        match self.walk(&root, drive_id, resume) {
            Ok((directories, files, interrupted)) => {
                self.handle.with(|c| {
                    if !interrupted {
                        c.clear_scan_progress(drive_id)?;
                    }
                    c.commit()
                })?;
                let outcome = ScanOutcome {
                    drive,
                    directories,
                    files,
                    duration: start.elapsed(),
                    resumed,
                    interrupted,
                };
                info!(
                    "Scan of {} finished in {:.2}s: {} directories, {} files{}",
                    root,
                    outcome.duration.as_secs_f64(),
                    directories,
                    files,
                    if interrupted { " (interrupted)" } else { "" },
                );
                Ok(outcome)
            }
            Err(err) => {
                // Keep the progress row: a later run resumes from the last
                // committed checkpoint.
                if let Err(rollback_err) = self.handle.with(|c| c.rollback()) {
                    warn!("Rollback after scan failure also failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    fn walk(
        &self,
        root: &str,
        drive_id: i64,
        mut resume: Option<String>,
    ) -> Result<(u64, u64, bool), Error> {
        let mut directories = 0u64;
        let mut files = 0u64;

        // Deterministic lexicographic order; resume checkpoints rely on it.
        let mut it = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        loop {
            let entry = match it.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    warn!("Skipping unreadable entry: {}", err);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let norm = pathutil::normalize_path(entry.path());
            if self.rules.is_ignored_dir(&norm) {
                debug!("Ignoring subtree {}", norm);
                it.skip_current_dir();
                continue;
            }

            if self.cancel.load(Ordering::Relaxed) {
                info!("Scan cancelled at {}; progress kept", norm);
                self.handle.with(|c| c.set_scan_progress(drive_id, &norm))?;
                return Ok((directories, files, true));
            }

            let mut process_entries = true;
            if let Some(target) = resume.clone() {
                match resume_action(&norm, &target) {
                    ResumeAction::PruneSubtree => {
                        it.skip_current_dir();
                        continue;
                    }
                    ResumeAction::DescendOnly => process_entries = false,
                    ResumeAction::Process => resume = None,
                }
            }

            let dir_id = self
                .handle
                .with(|c| c.get_or_create_directory(drive_id, &norm))?;

            if process_entries {
                files += self.scan_directory_files(entry.path(), &norm, dir_id)? as u64;
                directories += 1;
                self.handle.with(|c| c.note_directory());

                if directories % PROGRESS_DIR_INTERVAL == 0 {
                    info!(
                        "Progress: {} directories, {} files (at {})",
                        directories, files, norm
                    );
                    self.handle.with(|c| {
                        c.set_scan_progress(drive_id, &norm)?;
                        c.commit_and_reopen()
                    })?;
                } else if self.handle.with(|c| c.commit_due()) {
                    self.handle.with(|c| {
                        c.set_scan_progress(drive_id, &norm)?;
                        c.commit_and_reopen()
                    })?;
                }
            }
        }

        Ok((directories, files, false))
    }

    /// Upsert all plain files directly inside one directory, as a batch.
    fn scan_directory_files(
        &self,
        dir: &Path,
        dir_norm: &str,
        dir_id: i64,
    ) -> Result<usize, Error> {
        let hash_here = self.policy.should_hash(dir_norm);

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Cannot list {}: {}", dir_norm, err);
                return Ok(0);
            }
        };

        let mut batch: Vec<FileUpsert> = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping entry in {}: {}", dir_norm, err);
                    continue;
                }
            };
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => continue,
                Ok(_) => {}
                Err(err) => {
                    warn!("Skipping {}: {}", entry.path().display(), err);
                    continue;
                }
            }

            let path = entry.path();
            let norm = pathutil::normalize_path(&path);
            if self.rules.is_ignored_file(&norm) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!("Skipping {}: {}", norm, err);
                    continue;
                }
            };

            let hash = if hash_here {
                hasher::hash_file(&path)
            } else {
                None
            };

            batch.push(FileUpsert {
                directory_id: dir_id,
                full_name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len() as i64,
                hash,
                created_ms: metadata.created().ok().and_then(systemtime_ms),
                modified_ms: metadata.modified().ok().and_then(systemtime_ms),
            });
        }

        let count = batch.len();
        if !batch.is_empty() {
            self.handle.with(|c| c.batch_upsert_files(&batch))?;
        }
        Ok(count)
    }
}

fn systemtime_ms(time: std::time::SystemTime) -> Option<i64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_action_prune_before_target() {
        // a < m, and m is not under a: the whole subtree was committed.
        assert_eq!(
            resume_action("D:/work/a", "D:/work/m"),
            ResumeAction::PruneSubtree
        );
    }

    #[test]
    fn test_resume_action_descend_into_ancestor() {
        assert_eq!(
            resume_action("D:/work", "D:/work/m"),
            ResumeAction::DescendOnly
        );
        assert_eq!(
            resume_action("D:/", "D:/work/m"),
            ResumeAction::DescendOnly
        );
    }

    #[test]
    fn test_resume_action_at_and_past_target() {
        assert_eq!(
            resume_action("D:/work/m", "D:/work/m"),
            ResumeAction::Process
        );
        assert_eq!(
            resume_action("D:/work/z", "D:/work/m"),
            ResumeAction::Process
        );
    }
}
