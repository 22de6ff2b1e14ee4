//! Real-time filesystem-event handling.
//!
//! Events are translated into catalog mutations with the same invariants as
//! the scanner. The handler owns its own connection (scans may run in other
//! processes), pings it before every event and reconnects with back-off on
//! failure. Every event runs in its own explicit transaction, followed by a
//! passive WAL checkpoint so reader processes observe the change promptly.

pub mod pump;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::alias::DriveAliasResolver;
use crate::error::Error;
use crate::hasher::{self, HashPolicy};
use crate::pathutil;
use crate::scanner::ignore::IgnoreRules;
use crate::storage::Catalog;

const RECONNECT_ATTEMPTS: u32 = 3;
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Modified,
    Moved { dest: PathBuf },
    Deleted,
}

#[derive(Debug, Clone)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
    pub is_dir: bool,
}

pub struct EventHandler {
    catalog: Catalog,
    db_path: Option<String>,
    resolver: Arc<DriveAliasResolver>,
    policy: HashPolicy,
    rules: IgnoreRules,
}

impl EventHandler {
    pub fn open(
        db_path: &str,
        resolver: Arc<DriveAliasResolver>,
        policy: HashPolicy,
        rules: IgnoreRules,
    ) -> Result<Self, Error> {
        Ok(Self {
            catalog: Catalog::open(db_path)?,
            db_path: Some(db_path.to_string()),
            resolver,
            policy,
            rules,
        })
    }

    /// Wrap an existing catalog (tests). No reconnection is possible.
    pub fn with_catalog(
        catalog: Catalog,
        resolver: Arc<DriveAliasResolver>,
        policy: HashPolicy,
        rules: IgnoreRules,
    ) -> Self {
        Self {
            catalog,
            db_path: None,
            resolver,
            policy,
            rules,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Handle one event. Errors are isolated: they roll back, get logged,
    /// and never abort the observer.
    pub fn handle(&mut self, event: FsEvent) {
        if !self.ensure_connection() {
            warn!("Catalog connection lost; dropping event {:?}", event);
            return;
        }
        if let Err(err) = self.process(&event) {
            if let Err(rollback_err) = self.catalog.rollback() {
                warn!("Rollback after event failure also failed: {}", rollback_err);
            }
            warn!("Event handling failed ({:?}): {}", event.kind, err);
        }
    }

    /// Ping the connection; on failure close and reopen with back-off.
    fn ensure_connection(&mut self) -> bool {
        let ping = self
            .catalog
            .connection()
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0));
        if ping.is_ok() {
            return true;
        }
        let Some(db_path) = self.db_path.clone() else {
            return false;
        };
        for attempt in 1..=RECONNECT_ATTEMPTS {
            warn!(
                "Catalog ping failed; reconnect attempt {}/{}",
                attempt, RECONNECT_ATTEMPTS
            );
            thread::sleep(RECONNECT_BACKOFF);
            match Catalog::open(&db_path) {
                Ok(catalog) => {
                    self.catalog = catalog;
                    info!("Catalog connection re-established");
                    return true;
                }
                Err(err) => warn!("Reconnect failed: {}", err),
            }
        }
        false
    }

    fn process(&mut self, event: &FsEvent) -> Result<(), Error> {
        let raw = pathutil::normalize_path(&event.path);

        // Ignore filters run before any database work.
        if self.rules.is_ignored_event_path(&raw) {
            // A move out of an ignored location still matters for the
            // destination; everything else is filtered here.
            if !matches!(event.kind, FsEventKind::Moved { .. }) {
                debug!("Ignoring event for {}", raw);
                return Ok(());
            }
        }

        let canon = self.resolver.canonicalize(&raw);
        let drive = canon.real_drive.clone();
        let path = canon.path;

        let drive_id = self.catalog.get_or_create_drive(&drive)?;

        self.catalog.begin()?;
        let result = match &event.kind {
            FsEventKind::Created => self.on_created(drive_id, &path, event.is_dir),
            FsEventKind::Modified => self.on_modified(drive_id, &path, event.is_dir),
            FsEventKind::Moved { dest } => self.on_moved(drive_id, &raw, &path, dest, event.is_dir),
            FsEventKind::Deleted => self.on_deleted(drive_id, &path, event.is_dir),
        };
        result?;
        self.catalog.commit()?;
        self.catalog.checkpoint_passive()?;
        Ok(())
    }

    fn on_created(&mut self, drive_id: i64, path: &str, is_dir: bool) -> Result<(), Error> {
        if is_dir {
            self.catalog.get_or_create_directory(drive_id, path)?;
            return Ok(());
        }
        self.upsert_file_from_fs(drive_id, path)
    }

    fn on_modified(&mut self, drive_id: i64, path: &str, is_dir: bool) -> Result<(), Error> {
        if is_dir {
            self.catalog.get_or_create_directory(drive_id, path)?;
            return Ok(());
        }
        if Path::new(path).exists() {
            self.upsert_file_from_fs(drive_id, path)
        } else {
            // Raced with a deletion; drop the row if we have one.
            self.delete_file_row_for(drive_id, path)?;
            Ok(())
        }
    }

    fn on_moved(
        &mut self,
        drive_id: i64,
        raw_source: &str,
        source: &str,
        dest: &Path,
        is_dir: bool,
    ) -> Result<(), Error> {
        let dest_raw = pathutil::normalize_path(dest);
        let dest_canon = self.resolver.canonicalize(&dest_raw);
        let dest_ignored = self.rules.is_ignored_event_path(&dest_raw);
        let source_ignored = self.rules.is_ignored_event_path(raw_source);

        if is_dir {
            // A full-fidelity synchronous subtree rewrite is not attempted.
            // The stale source subtree is dropped (cascade) and the
            // destination root is created; the next scan or integrity run
            // repopulates its contents.
            info!(
                "Directory moved {} -> {}; subtree will repopulate on next scan",
                source, dest_canon.path
            );
            self.catalog.delete_directory(drive_id, source)?;
            if !dest_ignored {
                let dest_drive_id = self
                    .catalog
                    .get_or_create_drive(&dest_canon.real_drive)?;
                self.catalog
                    .get_or_create_directory(dest_drive_id, &dest_canon.path)?;
            }
            return Ok(());
        }

        if dest_ignored {
            // Moved into ignored territory: same as a deletion.
            self.delete_file_row_for(drive_id, source)?;
            return Ok(());
        }

        let dest_drive_id = self.catalog.get_or_create_drive(&dest_canon.real_drive)?;

        let existing = if source_ignored {
            None
        } else {
            self.find_file_row(drive_id, source)?
        };

        match existing {
            Some(file_id) => {
                let parent = pathutil::parent_of(&dest_canon.path)
                    .ok_or_else(|| Error::Other(format!("move target has no parent: {}", dest_canon.path)))?;
                let new_dir_id = self
                    .catalog
                    .get_or_create_directory(dest_drive_id, &parent)?;
                let (stem, ext_name) = pathutil::split_filename(pathutil::leaf_of(&dest_canon.path));
                let new_ext_id = self.catalog.get_or_create_extension(&ext_name)?;
                self.catalog.move_file(file_id, new_dir_id, &stem, new_ext_id)?;
                Ok(())
            }
            // Unknown source: treat as a creation at the destination.
            None => self.upsert_file_from_fs(dest_drive_id, &dest_canon.path),
        }
    }

    fn on_deleted(&mut self, drive_id: i64, path: &str, is_dir: bool) -> Result<(), Error> {
        if is_dir {
            self.catalog.delete_directory(drive_id, path)?;
            return Ok(());
        }
        let removed = self.delete_file_row_for(drive_id, path)?;
        if !removed {
            // Some backends report directory removals without a folder
            // flag; fall back to the directory row.
            self.catalog.delete_directory(drive_id, path)?;
        }
        Ok(())
    }

    /// Upsert the parent directory (may race with a scanner, which is fine)
    /// and then the file itself with fresh filesystem metadata.
    fn upsert_file_from_fs(&mut self, drive_id: i64, path: &str) -> Result<(), Error> {
        let parent = match pathutil::parent_of(path) {
            Some(parent) => parent,
            None => return Ok(()),
        };
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) => {
                debug!("File vanished before handling {}: {}", path, err);
                return Ok(());
            }
        };
        let dir_id = self.catalog.get_or_create_directory(drive_id, &parent)?;
        let hash = if self.policy.should_hash(&parent) {
            hasher::hash_file(Path::new(path))
        } else {
            None
        };
        let full_name = pathutil::leaf_of(path).to_string();
        let modified_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64);
        let created_ms = metadata
            .created()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64);
        self.catalog.insert_or_update_file(
            dir_id,
            &full_name,
            metadata.len() as i64,
            hash.as_deref(),
            created_ms,
            modified_ms,
        )?;
        Ok(())
    }

    fn find_file_row(&mut self, drive_id: i64, path: &str) -> Result<Option<i64>, Error> {
        let Some(parent) = pathutil::parent_of(path) else {
            return Ok(None);
        };
        let Some(dir_id) = self.catalog.find_directory(drive_id, &parent)? else {
            return Ok(None);
        };
        let (stem, ext_name) = pathutil::split_filename(pathutil::leaf_of(path));
        let Some(ext) = self.catalog.get_extension(&ext_name)? else {
            return Ok(None);
        };
        Ok(self.catalog.find_file_id(dir_id, &stem, ext.id)?)
    }

    fn delete_file_row_for(&mut self, drive_id: i64, path: &str) -> Result<bool, Error> {
        let Some(parent) = pathutil::parent_of(path) else {
            return Ok(false);
        };
        let Some(dir_id) = self.catalog.find_directory(drive_id, &parent)? else {
            return Ok(false);
        };
        Ok(self
            .catalog
            .delete_file_by_name(dir_id, pathutil::leaf_of(path))?)
    }
}
