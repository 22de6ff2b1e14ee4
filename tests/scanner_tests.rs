use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use drivecat::hasher::HashPolicy;
use drivecat::pathutil;
use drivecat::scanner::ignore::IgnoreRules;
use drivecat::scanner::Scanner;
use drivecat::{AppConfig, CatalogHandle, DriveAliasResolver};

fn resolver() -> Arc<DriveAliasResolver> {
    Arc::new(DriveAliasResolver::with_mappings(
        HashMap::new(),
        vec!["/".to_string()],
    ))
}

fn scanner_with(handle: CatalogHandle, config: &AppConfig) -> Scanner {
    Scanner::new(
        handle,
        resolver(),
        HashPolicy::from_config(config),
        IgnoreRules::from_config(config),
    )
}

/// root/
///   a.txt
///   b.log          (indexed: suffix filters apply to events only)
///   sub/
///     c.bin
fn create_tree(root: &std::path::Path) {
    fs::write(root.join("a.txt"), "alpha").unwrap();
    fs::write(root.join("b.log"), "log line\n").unwrap();
    let sub = root.join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("c.bin"), vec![0u8; 128]).unwrap();
}

#[test]
fn test_fresh_scan_indexes_tree() {
    let dir = tempdir().unwrap();
    create_tree(dir.path());
    let root = pathutil::normalize_path(dir.path());

    let handle = CatalogHandle::open_in_memory().unwrap();
    let config = AppConfig::default();
    let scanner = scanner_with(handle.clone(), &config);

    let outcome = scanner.scan(&root, false).unwrap();
    assert_eq!(outcome.directories, 2); // root + sub
    assert_eq!(outcome.files, 3);
    assert!(!outcome.resumed);
    assert!(!outcome.interrupted);

    assert_eq!(
        handle.with(|c| c.count_files_under(Some(&root))).unwrap(),
        3
    );
    // No checkpoint left behind after a clean finish.
    let drive_id = handle.with(|c| c.get_or_create_drive("/")).unwrap();
    assert!(handle
        .with(|c| c.get_scan_progress(drive_id))
        .unwrap()
        .is_none());
}

#[test]
fn test_rescan_is_idempotent() {
    let dir = tempdir().unwrap();
    create_tree(dir.path());
    let root = pathutil::normalize_path(dir.path());

    let handle = CatalogHandle::open_in_memory().unwrap();
    let config = AppConfig::default();
    let scanner = scanner_with(handle.clone(), &config);

    scanner.scan(&root, false).unwrap();
    scanner.scan(&root, false).unwrap();
    assert_eq!(
        handle.with(|c| c.count_files_under(Some(&root))).unwrap(),
        3
    );
}

#[test]
fn test_rescan_picks_up_size_change() {
    let dir = tempdir().unwrap();
    create_tree(dir.path());
    let root = pathutil::normalize_path(dir.path());

    let handle = CatalogHandle::open_in_memory().unwrap();
    let config = AppConfig::default();
    let scanner = scanner_with(handle.clone(), &config);
    scanner.scan(&root, false).unwrap();

    fs::write(dir.path().join("a.txt"), "alpha grew considerably").unwrap();
    scanner.scan(&root, false).unwrap();

    let page = handle
        .with(|c| c.files_page_after(Some(&root), 0, 100))
        .unwrap();
    let a = page.iter().find(|r| r.name == "a").unwrap();
    assert_eq!(a.size, "alpha grew considerably".len() as i64);
    assert_eq!(page.len(), 3);
}

#[test]
fn test_restart_wipes_stale_rows() {
    let dir = tempdir().unwrap();
    create_tree(dir.path());
    let root = pathutil::normalize_path(dir.path());

    let handle = CatalogHandle::open_in_memory().unwrap();
    let config = AppConfig::default();
    let scanner = scanner_with(handle.clone(), &config);
    scanner.scan(&root, false).unwrap();

    fs::remove_file(dir.path().join("b.log")).unwrap();
    scanner.scan(&root, true).unwrap();

    assert_eq!(
        handle.with(|c| c.count_files_under(Some(&root))).unwrap(),
        2
    );
}

#[test]
fn test_resume_skips_committed_subtrees() {
    let dir = tempdir().unwrap();
    let root = pathutil::normalize_path(dir.path());
    for name in ["a", "m", "z"] {
        let sub = dir.path().join(name);
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join(format!("{}.txt", name)), name).unwrap();
    }

    let handle = CatalogHandle::open_in_memory().unwrap();
    let config = AppConfig::default();
    let scanner = scanner_with(handle.clone(), &config);

    // Pretend an earlier run committed everything up to (but not
    // including) "m" and was interrupted there.
    let drive_id = handle.with(|c| c.get_or_create_drive("/")).unwrap();
    handle
        .with(|c| c.set_scan_progress(drive_id, &pathutil::join(&root, "m")))
        .unwrap();

    let outcome = scanner.scan(&root, false).unwrap();
    assert!(outcome.resumed);
    // "a" was pruned, the root itself only descended.
    assert_eq!(outcome.files, 2);
    let page = handle
        .with(|c| c.files_page_after(Some(&root), 0, 100))
        .unwrap();
    let names: Vec<_> = page.iter().map(|r| r.name.as_str()).collect();
    assert!(names.contains(&"m"));
    assert!(names.contains(&"z"));
    assert!(!names.contains(&"a"));
    // Checkpoint cleared by the clean finish.
    assert!(handle
        .with(|c| c.get_scan_progress(drive_id))
        .unwrap()
        .is_none());
}

#[test]
fn test_configured_ignore_prefix() {
    let dir = tempdir().unwrap();
    create_tree(dir.path());
    let skip = dir.path().join("skip");
    fs::create_dir(&skip).unwrap();
    fs::write(skip.join("hidden.txt"), "not indexed").unwrap();
    let root = pathutil::normalize_path(dir.path());

    let handle = CatalogHandle::open_in_memory().unwrap();
    let mut config = AppConfig::default();
    config.ignore_prefixes = vec![pathutil::join(&root, "skip")];
    let scanner = scanner_with(handle.clone(), &config);

    let outcome = scanner.scan(&root, false).unwrap();
    assert_eq!(outcome.files, 3);
    let drive_id = handle.with(|c| c.get_or_create_drive("/")).unwrap();
    assert!(handle
        .with(|c| c.find_directory(drive_id, &pathutil::join(&root, "skip")))
        .unwrap()
        .is_none());
}

#[test]
fn test_alias_scan_lands_on_canonical_drive() {
    let dir = tempdir().unwrap();
    create_tree(dir.path());
    let root = pathutil::normalize_path(dir.path());

    // "T:/" is an alias of the temp tree; scanning it must index the real
    // location and never create a drive row for the alias.
    let mut mappings = HashMap::new();
    mappings.insert("T:/".to_string(), root.clone());
    let resolver = Arc::new(DriveAliasResolver::with_mappings(
        mappings,
        vec!["/".to_string(), "T:/".to_string()],
    ));

    let handle = CatalogHandle::open_in_memory().unwrap();
    let config = AppConfig::default();
    let scanner = Scanner::new(
        handle.clone(),
        resolver,
        HashPolicy::from_config(&config),
        IgnoreRules::from_config(&config),
    );

    let outcome = scanner.scan("T:/", false).unwrap();
    assert_eq!(outcome.drive, "/");
    assert_eq!(outcome.files, 3);

    let drives = handle.with(|c| c.list_drives()).unwrap();
    assert_eq!(drives.len(), 1);
    assert_eq!(drives[0].name, "/");
    assert_eq!(
        handle.with(|c| c.count_files_under(Some(&root))).unwrap(),
        3
    );
}

#[test]
fn test_hashing_policy_applies() {
    let dir = tempdir().unwrap();
    create_tree(dir.path());
    let root = pathutil::normalize_path(dir.path());

    let handle = CatalogHandle::open_in_memory().unwrap();
    let mut config = AppConfig::default();
    config.hashing = true;
    let scanner = scanner_with(handle.clone(), &config);
    scanner.scan(&root, false).unwrap();

    let page = handle
        .with(|c| c.files_page_after(Some(&root), 0, 100))
        .unwrap();
    for row in &page {
        let hash = row.hash.as_deref().unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
    // Identical content under different names hashes identically.
    fs::write(dir.path().join("a_copy.txt"), "alpha").unwrap();
    scanner.scan(&root, false).unwrap();
    let groups = handle.with(|c| c.duplicate_hash_groups(10)).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].1, 2);
}
