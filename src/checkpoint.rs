//! Read/clear surface over scan-progress checkpoints.
//!
//! The scanner writes checkpoints inside its own transactions; this type is
//! how everything else (the orchestrator, status displays) inspects or
//! discards them.

use tracing::info;

use crate::coordinator::CatalogHandle;
use crate::error::Error;
use crate::storage::models::ScanProgressRow;

pub struct ProgressCheckpointer {
    handle: CatalogHandle,
}

impl ProgressCheckpointer {
    pub fn new(handle: CatalogHandle) -> Self {
        Self { handle }
    }

    /// The resume path for a drive, if an interrupted scan left one.
    pub fn resume_path(&self, drive_id: i64) -> Result<Option<String>, Error> {
        Ok(self
            .handle
            .with(|c| c.get_scan_progress(drive_id))?
            .map(|(path, _)| path))
    }

    pub fn all(&self) -> Result<Vec<ScanProgressRow>, Error> {
        Ok(self.handle.with(|c| c.all_scan_progress())?)
    }

    /// Discard a drive's checkpoint so the next scan starts from the top.
    pub fn clear(&self, drive_id: i64) -> Result<(), Error> {
        self.handle.with(|c| c.clear_scan_progress(drive_id))?;
        info!("Cleared scan checkpoint for drive {}", drive_id);
        Ok(())
    }
}
