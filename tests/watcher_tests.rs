use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use drivecat::hasher::HashPolicy;
use drivecat::pathutil;
use drivecat::scanner::ignore::IgnoreRules;
use drivecat::storage::Catalog;
use drivecat::watcher::{EventHandler, FsEvent, FsEventKind};
use drivecat::{AppConfig, DriveAliasResolver};

fn handler() -> EventHandler {
    let config = AppConfig::default();
    EventHandler::with_catalog(
        Catalog::open_in_memory().unwrap(),
        Arc::new(DriveAliasResolver::with_mappings(
            HashMap::new(),
            vec!["/".to_string()],
        )),
        HashPolicy::from_config(&config),
        IgnoreRules::from_config(&config),
    )
}

fn created(path: std::path::PathBuf, is_dir: bool) -> FsEvent {
    FsEvent {
        kind: FsEventKind::Created,
        path,
        is_dir,
    }
}

#[test]
fn test_created_event_inserts_row() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("note.txt");
    fs::write(&file, "hello").unwrap();

    let mut h = handler();
    h.handle(created(file.clone(), false));

    let root = pathutil::normalize_path(dir.path());
    let db = h.catalog();
    assert_eq!(db.count_files_under(Some(&root)).unwrap(), 1);
    let page = db.files_page_after(Some(&root), 0, 10).unwrap();
    assert_eq!(page[0].name, "note");
    assert_eq!(page[0].size, 5);
}

#[test]
fn test_modified_event_updates_size() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("note.txt");
    fs::write(&file, "hello").unwrap();

    let mut h = handler();
    h.handle(created(file.clone(), false));
    fs::write(&file, "hello, much longer now").unwrap();
    h.handle(FsEvent {
        kind: FsEventKind::Modified,
        path: file.clone(),
        is_dir: false,
    });

    let root = pathutil::normalize_path(dir.path());
    let page = h.catalog().files_page_after(Some(&root), 0, 10).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].size, "hello, much longer now".len() as i64);
}

#[test]
fn test_rename_preserves_row_identity() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("old.txt");
    fs::write(&source, "same bytes").unwrap();

    let mut h = handler();
    h.handle(created(source.clone(), false));

    let root = pathutil::normalize_path(dir.path());
    let old_id = h.catalog().files_page_after(Some(&root), 0, 10).unwrap()[0].id;

    let dest = dir.path().join("new.md");
    fs::rename(&source, &dest).unwrap();
    h.handle(FsEvent {
        kind: FsEventKind::Moved { dest: dest.clone() },
        path: source.clone(),
        is_dir: false,
    });

    let page = h.catalog().files_page_after(Some(&root), 0, 10).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, old_id);
    assert_eq!(page[0].name, "new");
    assert_eq!(page[0].extension, ".md");
    // A move is not a deletion.
    assert_eq!(h.catalog().count_deleted_files().unwrap(), 0);
}

#[test]
fn test_move_across_directories() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    let source = dir.path().join("roam.txt");
    fs::write(&source, "x").unwrap();

    let mut h = handler();
    h.handle(created(source.clone(), false));

    let dest = sub.join("roam.txt");
    fs::rename(&source, &dest).unwrap();
    h.handle(FsEvent {
        kind: FsEventKind::Moved { dest: dest.clone() },
        path: source.clone(),
        is_dir: false,
    });

    let root = pathutil::normalize_path(dir.path());
    let page = h.catalog().files_page_after(Some(&root), 0, 10).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].directory_path, pathutil::normalize_path(&sub));
}

#[test]
fn test_deleted_event_removes_row_and_audits() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("gone.txt");
    fs::write(&file, "bye").unwrap();

    let mut h = handler();
    h.handle(created(file.clone(), false));
    fs::remove_file(&file).unwrap();
    h.handle(FsEvent {
        kind: FsEventKind::Deleted,
        path: file.clone(),
        is_dir: false,
    });

    let root = pathutil::normalize_path(dir.path());
    let db = h.catalog();
    assert_eq!(db.count_files_under(Some(&root)).unwrap(), 0);
    assert_eq!(db.count_deleted_files().unwrap(), 1);
}

#[test]
fn test_directory_move_drops_source_subtree() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old_dir");
    fs::create_dir(&old).unwrap();
    let inner = old.join("inner.txt");
    fs::write(&inner, "inner").unwrap();

    let mut h = handler();
    h.handle(created(old.clone(), true));
    h.handle(created(inner.clone(), false));

    let new = dir.path().join("new_dir");
    fs::rename(&old, &new).unwrap();
    h.handle(FsEvent {
        kind: FsEventKind::Moved { dest: new.clone() },
        path: old.clone(),
        is_dir: true,
    });

    let db = h.catalog();
    let drive_id = db.list_drives().unwrap()[0].id;
    assert!(db
        .find_directory(drive_id, &pathutil::normalize_path(&old))
        .unwrap()
        .is_none());
    // Destination root exists; its contents arrive with the next scan.
    let root = pathutil::normalize_path(dir.path());
    assert_eq!(db.count_files_under(Some(&root)).unwrap(), 0);
}

#[test]
fn test_ignored_paths_produce_no_writes() {
    let dir = tempdir().unwrap();
    let temp_file = dir.path().join("download.crdownload");
    fs::write(&temp_file, "partial").unwrap();

    let mut h = handler();
    h.handle(created(temp_file, false));
    h.handle(created(dir.path().join("Thumbs.db"), false));
    h.handle(created(dir.path().join("app.log"), false));

    // The filter runs before any catalog write, so not even the drive row
    // appears.
    assert!(h.catalog().list_drives().unwrap().is_empty());
}
