//! Scan-lock coordination.
//!
//! The lock log is advisory and append-only: acquiring means inserting an
//! active row after verifying no live holder exists. Rows left active by a
//! crashed process on the same host are cleared automatically (pid probe);
//! a live holder anywhere refuses the acquisition. Rows from other hosts
//! cannot be probed, so they refuse until released or forced.

use std::fmt;

use tracing::{info, warn};

use crate::coordinator::CatalogHandle;
use crate::error::Error;
use crate::platform;
use crate::storage::models::{ScanLockRow, ScanProgressRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    Manual,
    Scheduled,
    Integrity,
    Event,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Manual => "manual",
            ScanType::Scheduled => "scheduled",
            ScanType::Integrity => "integrity",
            ScanType::Event => "event",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an acquisition attempt.
#[derive(Debug)]
pub enum Acquire {
    /// Lock row id; pass it back to [`ScanLockCoordinator::release`].
    Granted(i64),
    /// A live holder exists.
    Refused(ScanLockRow),
}

/// Snapshot for status displays.
#[derive(Debug)]
pub struct LockStatus {
    pub active: Vec<ScanLockRow>,
    /// Active rows on this host whose process is gone.
    pub orphaned: Vec<ScanLockRow>,
    pub progress: Vec<ScanProgressRow>,
}

pub struct ScanLockCoordinator {
    handle: CatalogHandle,
}

impl ScanLockCoordinator {
    pub fn new(handle: CatalogHandle) -> Self {
        Self { handle }
    }

    /// Try to take the scan lock. Same-host orphans are deactivated on the
    /// way; the first genuinely live holder refuses the attempt.
    pub fn acquire(&self, scan_type: ScanType) -> Result<Acquire, Error> {
        let host = platform::hostname();
        let pid = platform::current_pid();
        let result = self.handle.with(|c| -> rusqlite::Result<Acquire> {
            for row in c.active_scan_locks()? {
                if row.hostname == host && !platform::pid_alive(row.pid) {
                    warn!(
                        "Clearing orphaned scan lock {} ({} scan, pid {} no longer running)",
                        row.id, row.scan_type, row.pid
                    );
                    c.deactivate_scan_lock(row.id)?;
                } else {
                    return Ok(Acquire::Refused(row));
                }
            }
            let id = c.insert_scan_lock(scan_type.as_str(), pid, &host)?;
            Ok(Acquire::Granted(id))
        })?;
        match &result {
            Acquire::Granted(id) => info!("Scan lock {} acquired ({})", id, scan_type),
            Acquire::Refused(row) => info!(
                "Scan lock held by {} pid {} ({} scan, lock {})",
                row.hostname, row.pid, row.scan_type, row.id
            ),
        }
        Ok(result)
    }

    /// Take the lock unconditionally, leaving any existing holder's row
    /// untouched. For operator overrides only.
    pub fn acquire_forced(&self, scan_type: ScanType) -> Result<i64, Error> {
        let host = platform::hostname();
        let pid = platform::current_pid();
        let id = self
            .handle
            .with(|c| c.insert_scan_lock(scan_type.as_str(), pid, &host))?;
        warn!("Scan lock {} force-acquired ({})", id, scan_type);
        Ok(id)
    }

    pub fn release(&self, lock_id: i64) -> Result<(), Error> {
        self.handle.with(|c| c.deactivate_scan_lock(lock_id))?;
        info!("Scan lock {} released", lock_id);
        Ok(())
    }

    /// Whether any live holder exists right now (orphans don't count).
    pub fn is_active(&self) -> Result<bool, Error> {
        let host = platform::hostname();
        let rows = self.handle.with(|c| c.active_scan_locks())?;
        Ok(rows
            .iter()
            .any(|row| row.hostname != host || platform::pid_alive(row.pid)))
    }

    pub fn status_detail(&self) -> Result<LockStatus, Error> {
        let host = platform::hostname();
        let (rows, progress) = self.handle.with(|c| -> rusqlite::Result<_> {
            let rows = c.active_scan_locks()?;
            let progress = c.all_scan_progress()?;
            Ok((rows, progress))
        })?;
        let (orphaned, active): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .partition(|row| row.hostname == host && !platform::pid_alive(row.pid));
        Ok(LockStatus {
            active,
            orphaned,
            progress,
        })
    }
}
