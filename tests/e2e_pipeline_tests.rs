use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use drivecat::hasher::HashPolicy;
use drivecat::lock::{Acquire, ScanType};
use drivecat::pathutil;
use drivecat::scanner::ignore::IgnoreRules;
use drivecat::watcher::{EventHandler, FsEvent, FsEventKind};
use drivecat::{AppConfig, CatalogHandle, DriveAliasResolver, ExitStatus, Orchestrator};

/// Scan, handle live events against the same file-backed catalog, then
/// reconcile: the full pipeline, end to end.
#[test]
fn test_scan_watch_check_pipeline() {
    let data = tempdir().unwrap();
    fs::write(data.path().join("a.txt"), "alpha").unwrap();
    let sub = data.path().join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("b.txt"), "beta").unwrap();
    let root = pathutil::normalize_path(data.path());

    let db_dir = tempdir().unwrap();
    let db_path = db_dir.path().join("catalog.db").to_string_lossy().into_owned();

    let mut config = AppConfig::default();
    config.db_path = db_path.clone();

    let handle = CatalogHandle::open(&db_path).unwrap();
    let resolver = Arc::new(DriveAliasResolver::discover());
    let orchestrator = Orchestrator::new(handle.clone(), resolver.clone(), config.clone());

    // Scan.
    let status = orchestrator.run_scan(&root, false, false, false);
    assert_eq!(status, ExitStatus::Success);
    assert_eq!(status.code(), 0);
    assert_eq!(
        handle.with(|c| c.count_files_under(Some(&root))).unwrap(),
        2
    );

    // A new file appears and its event arrives.
    let fresh = data.path().join("c.txt");
    fs::write(&fresh, "gamma").unwrap();
    let mut watcher = EventHandler::open(
        &db_path,
        resolver.clone(),
        HashPolicy::from_config(&config),
        IgnoreRules::from_config(&config),
    )
    .unwrap();
    watcher.handle(FsEvent {
        kind: FsEventKind::Created,
        path: fresh.clone(),
        is_dir: false,
    });
    assert_eq!(
        handle.with(|c| c.count_files_under(Some(&root))).unwrap(),
        3
    );

    // The file vanishes behind the watcher's back; integrity converges.
    fs::remove_file(&fresh).unwrap();
    let mut stream = Vec::new();
    let status = orchestrator.check_integrity(Some(&root), &mut stream);
    assert_eq!(status, ExitStatus::Success);
    assert_eq!(
        handle.with(|c| c.count_files_under(Some(&root))).unwrap(),
        2
    );

    // The run landed in the lock history.
    let detail = orchestrator.status_detail().unwrap();
    assert!(detail.lock.active.is_empty());
    assert!(detail
        .recent_locks
        .iter()
        .any(|row| row.scan_type == "integrity" && !row.is_active));
}

#[test]
fn test_lock_gates_scan_and_check() {
    let data = tempdir().unwrap();
    fs::write(data.path().join("a.txt"), "alpha").unwrap();
    let root = pathutil::normalize_path(data.path());

    let handle = CatalogHandle::open_in_memory().unwrap();
    let resolver = Arc::new(DriveAliasResolver::discover());
    let orchestrator = Orchestrator::new(handle, resolver, AppConfig::default());

    let holder = match orchestrator.lock().acquire(ScanType::Manual).unwrap() {
        Acquire::Granted(id) => id,
        Acquire::Refused(row) => panic!("unexpected holder {:?}", row),
    };

    assert_eq!(
        orchestrator.run_scan(&root, false, false, false),
        ExitStatus::AlreadyActive
    );
    assert_eq!(
        orchestrator.run_scan(&root, false, false, false).code(),
        2
    );
    let mut stream = Vec::new();
    assert_eq!(
        orchestrator.check_integrity(Some(&root), &mut stream),
        ExitStatus::AlreadyActive
    );

    // --force bypasses the holder.
    assert_eq!(
        orchestrator.run_scan(&root, false, false, true),
        ExitStatus::Success
    );

    orchestrator.lock().release(holder).unwrap();
    assert_eq!(
        orchestrator.run_scan(&root, false, false, false),
        ExitStatus::Success
    );
}

#[test]
fn test_checkpointer_reads_and_clears() {
    use drivecat::checkpoint::ProgressCheckpointer;

    let handle = CatalogHandle::open_in_memory().unwrap();
    let drive_id = handle.with(|c| c.get_or_create_drive("/")).unwrap();
    handle
        .with(|c| c.set_scan_progress(drive_id, "/data/photos"))
        .unwrap();

    let checkpointer = ProgressCheckpointer::new(handle.clone());
    assert_eq!(
        checkpointer.resume_path(drive_id).unwrap().as_deref(),
        Some("/data/photos")
    );
    assert_eq!(checkpointer.all().unwrap().len(), 1);

    checkpointer.clear(drive_id).unwrap();
    assert!(checkpointer.resume_path(drive_id).unwrap().is_none());
    assert!(checkpointer.all().unwrap().is_empty());
}

#[test]
fn test_scheduled_scan_restarts_without_checkpoint() {
    let data = tempdir().unwrap();
    fs::write(data.path().join("a.txt"), "alpha").unwrap();
    fs::write(data.path().join("b.txt"), "beta").unwrap();
    let root = pathutil::normalize_path(data.path());

    let handle = CatalogHandle::open_in_memory().unwrap();
    let resolver = Arc::new(DriveAliasResolver::discover());
    let orchestrator = Orchestrator::new(handle.clone(), resolver, AppConfig::default());

    assert_eq!(
        orchestrator.run_scan(&root, false, true, false),
        ExitStatus::Success
    );

    // A stale row survives a plain resume-less rescan only if the restart
    // rule failed; the scheduled run wipes and rebuilds.
    fs::remove_file(data.path().join("b.txt")).unwrap();
    assert_eq!(
        orchestrator.run_scan(&root, false, true, false),
        ExitStatus::Success
    );
    assert_eq!(
        handle.with(|c| c.count_files_under(Some(&root))).unwrap(),
        1
    );
}
