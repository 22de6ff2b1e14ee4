//! The orchestrator ties the pieces together: lock-gated scans and
//! integrity runs, whole-catalog sweeps over every canonical drive, the
//! scheduled-scan poll loop, and status snapshots.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Local;
use tracing::{error, info, warn};

use crate::alias::DriveAliasResolver;
use crate::checkpoint::ProgressCheckpointer;
use crate::config::{AppConfig, ScheduledScan, ScheduledScanType};
use crate::coordinator::CatalogHandle;
use crate::error::Error;
use crate::hasher::HashPolicy;
use crate::integrity::IntegrityChecker;
use crate::lock::{Acquire, LockStatus, ScanLockCoordinator, ScanType};
use crate::scanner::ignore::IgnoreRules;
use crate::scanner::Scanner;
use crate::storage::models::{DriveSummary, ScanLockRow};

const SCHEDULE_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Process exit statuses for scan-style commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
    /// Another scan holds the lock.
    AlreadyActive,
    /// Lock acquisition itself failed.
    LockRefused,
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
            ExitStatus::AlreadyActive => 2,
            ExitStatus::LockRefused => 3,
        }
    }
}

#[derive(Debug)]
pub struct StatusDetail {
    pub lock: LockStatus,
    pub drives: Vec<DriveSummary>,
    pub recent_locks: Vec<ScanLockRow>,
}

pub struct Orchestrator {
    handle: CatalogHandle,
    resolver: Arc<DriveAliasResolver>,
    config: AppConfig,
    policy: HashPolicy,
    rules: IgnoreRules,
    lock: ScanLockCoordinator,
    checkpointer: ProgressCheckpointer,
}

impl Orchestrator {
    pub fn new(handle: CatalogHandle, resolver: Arc<DriveAliasResolver>, config: AppConfig) -> Self {
        let policy = HashPolicy::from_config(&config);
        let rules = IgnoreRules::from_config(&config);
        let lock = ScanLockCoordinator::new(handle.clone());
        let checkpointer = ProgressCheckpointer::new(handle.clone());
        Self {
            handle,
            resolver,
            config,
            policy,
            rules,
            lock,
            checkpointer,
        }
    }

    pub fn lock(&self) -> &ScanLockCoordinator {
        &self.lock
    }

    /// Take the scan lock, folding a live holder into [`Error::LockRefused`]
    /// and both refusal shapes into their exit statuses.
    fn try_acquire(&self, scan_type: ScanType) -> Result<i64, ExitStatus> {
        let attempt = self.lock.acquire(scan_type).and_then(|a| match a {
            Acquire::Granted(id) => Ok(id),
            Acquire::Refused(row) => Err(Error::LockRefused(format!(
                "{} scan on {} (pid {}, lock {})",
                row.scan_type, row.hostname, row.pid, row.id
            ))),
        });
        match attempt {
            Ok(id) => Ok(id),
            Err(Error::LockRefused(holder)) => {
                info!("Not starting: {}", holder);
                Err(ExitStatus::AlreadyActive)
            }
            Err(err) => {
                error!("Lock acquisition failed: {}", err);
                Err(ExitStatus::LockRefused)
            }
        }
    }

    fn scanner(&self) -> Scanner {
        Scanner::new(
            self.handle.clone(),
            self.resolver.clone(),
            self.policy.clone(),
            self.rules.clone(),
        )
    }

    /// Scan one path under the lock discipline.
    ///
    /// Scheduled runs are non-interactive: they restart unless a checkpoint
    /// from an interrupted run exists. Interactive runs follow the
    /// `resume_scan` configuration unless `--restart` overrides it.
    pub fn run_scan(&self, path: &str, restart: bool, scheduled: bool, force: bool) -> ExitStatus {
        let scan_type = if scheduled {
            ScanType::Scheduled
        } else {
            ScanType::Manual
        };

        let lock_id = if force {
            match self.lock.acquire_forced(scan_type) {
                Ok(id) => id,
                Err(err) => {
                    error!("Forced lock acquisition failed: {}", err);
                    return ExitStatus::LockRefused;
                }
            }
        } else {
            match self.try_acquire(scan_type) {
                Ok(id) => id,
                Err(status) => return status,
            }
        };

        let status = match self.effective_restart(path, restart, scheduled) {
            Ok(effective_restart) => match self.scanner().scan(path, effective_restart) {
                Ok(_) => ExitStatus::Success,
                Err(err) => {
                    error!("Scan of {} failed: {}", path, err);
                    ExitStatus::Failure
                }
            },
            Err(err) => {
                error!("Cannot read scan checkpoint for {}: {}", path, err);
                ExitStatus::Failure
            }
        };

        if let Err(err) = self.lock.release(lock_id) {
            warn!("Releasing scan lock {} failed: {}", lock_id, err);
        }
        status
    }

    fn effective_restart(&self, path: &str, restart: bool, scheduled: bool) -> Result<bool, Error> {
        if restart {
            return Ok(true);
        }
        if !scheduled {
            return Ok(!self.config.resume_scan);
        }
        let canon = self.resolver.canonicalize(path);
        let drive_id = self
            .handle
            .with(|c| c.get_or_create_drive(&canon.real_drive))?;
        Ok(self.checkpointer.resume_path(drive_id)?.is_none())
    }

    /// Sweep every canonical drive under one lock. A failing drive is
    /// logged and the sweep continues; the worst per-drive status wins.
    pub fn scan_all_canonical_drives(&self, restart: bool) -> ExitStatus {
        let lock_id = match self.try_acquire(ScanType::Manual) {
            Ok(id) => id,
            Err(status) => return status,
        };

        let drives = self.resolver.canonical_drive_list();
        for alias in self.resolver.mappings().keys() {
            info!("Skipping alias drive {} (already covered by its target)", alias);
        }

        let scanner = self.scanner();
        let mut failures = 0usize;
        for drive in &drives {
            match scanner.scan(drive, restart) {
                Ok(outcome) => info!(
                    "{}: {} directories, {} files",
                    drive, outcome.directories, outcome.files
                ),
                Err(err) => {
                    failures += 1;
                    error!("Scan of {} failed, continuing: {}", drive, err);
                }
            }
        }
        info!(
            "Sweep finished: {}/{} drives succeeded",
            drives.len() - failures,
            drives.len()
        );

        if let Err(err) = self.lock.release(lock_id) {
            warn!("Releasing scan lock {} failed: {}", lock_id, err);
        }
        if failures == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Failure
        }
    }

    /// Lock-gated integrity run over `path` (or everything).
    pub fn check_integrity(&self, path: Option<&str>, out: &mut dyn Write) -> ExitStatus {
        let lock_id = match self.try_acquire(ScanType::Integrity) {
            Ok(id) => id,
            Err(status) => return status,
        };

        let canonical = path.map(|p| self.resolver.canonicalize(p).path);
        let checker = IntegrityChecker::new(self.handle.clone(), self.policy.clone());
        let status = match checker.check(canonical.as_deref(), out) {
            Ok(_) => ExitStatus::Success,
            Err(err) => {
                error!("Integrity run failed: {}", err);
                ExitStatus::Failure
            }
        };

        if let Err(err) = self.lock.release(lock_id) {
            warn!("Releasing scan lock {} failed: {}", lock_id, err);
        }
        status
    }

    /// Schedule dispatcher. Polls the wall clock every 30 seconds and fires
    /// the first enabled entry whose HH:MM matches, at most once per minute.
    /// Entries are skipped while another scan is active.
    pub fn poll_schedule(&self, stop: Arc<AtomicBool>) -> Result<(), Error> {
        if self.config.scheduled_scans.is_empty() {
            warn!("No scheduled scans configured; dispatcher has nothing to do");
        }
        let mut last_fired: Option<String> = None;
        while !stop.load(Ordering::Relaxed) {
            let minute = Local::now().format("%H:%M").to_string();
            if last_fired.as_deref() != Some(&minute) {
                let due = self
                    .config
                    .scheduled_scans
                    .iter()
                    .find(|entry| entry.enabled && entry.time == minute);
                if let Some(entry) = due {
                    last_fired = Some(minute);
                    match self.lock.is_active() {
                        Ok(true) => {
                            info!("Skipping scheduled {:?} entry: a scan is active", entry.scan_type)
                        }
                        Ok(false) => self.fire(entry),
                        Err(err) => warn!("Cannot check scan lock: {}", err),
                    }
                }
            }
            thread::sleep(SCHEDULE_POLL_INTERVAL);
        }
        info!("Schedule dispatcher stopped");
        Ok(())
    }

    fn fire(&self, entry: &ScheduledScan) {
        info!("Firing scheduled {:?} entry ({})", entry.scan_type, entry.time);
        let status = match entry.scan_type {
            ScheduledScanType::Drive => match &entry.path {
                Some(path) => self.run_scan(path, entry.restart, true, false),
                None => {
                    warn!("Scheduled drive entry has no path; skipping");
                    return;
                }
            },
            ScheduledScanType::Full => self.scan_all_canonical_drives(entry.restart),
            ScheduledScanType::Integrity => {
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                self.check_integrity(entry.path.as_deref(), &mut out)
            }
        };
        if status != ExitStatus::Success {
            warn!("Scheduled entry finished with status {:?}", status);
        }
    }

    pub fn status_detail(&self) -> Result<StatusDetail, Error> {
        let lock = self.lock.status_detail()?;
        let (drives, recent_locks) = self.handle.with(|c| -> rusqlite::Result<_> {
            let drives = c.drive_summaries()?;
            let recent = c.recent_scan_locks(10)?;
            Ok((drives, recent))
        })?;
        Ok(StatusDetail {
            lock,
            drives,
            recent_locks,
        })
    }
}
