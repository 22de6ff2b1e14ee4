use tempfile::tempdir;

use drivecat::pathutil::NO_EXTENSION;
use drivecat::storage::models::FileUpsert;
use drivecat::storage::Catalog;

fn catalog() -> Catalog {
    Catalog::open_in_memory().unwrap()
}

#[test]
fn test_drive_and_directory_creation() {
    let mut db = catalog();
    let drive_id = db.get_or_create_drive("C:/").unwrap();
    assert_eq!(db.get_or_create_drive("C:/").unwrap(), drive_id);

    let dir_id = db.get_or_create_directory(drive_id, "C:/work/sub").unwrap();
    // Ancestors were materialized.
    assert!(db.find_directory(drive_id, "C:/").unwrap().is_some());
    assert!(db.find_directory(drive_id, "C:/work").unwrap().is_some());
    assert_eq!(
        db.find_directory(drive_id, "C:/work/sub").unwrap(),
        Some(dir_id)
    );
    // Idempotent.
    assert_eq!(
        db.get_or_create_directory(drive_id, "C:/work/sub").unwrap(),
        dir_id
    );
}

#[test]
fn test_file_upsert_preserves_created_timestamp() {
    let mut db = catalog();
    let drive_id = db.get_or_create_drive("C:/").unwrap();
    let dir_id = db.get_or_create_directory(drive_id, "C:/work").unwrap();

    let id = db
        .insert_or_update_file(dir_id, "a.txt", 10, None, Some(111), Some(500))
        .unwrap();
    let row = db.get_file(id).unwrap().unwrap();
    assert_eq!(row.size, 10);
    assert_eq!(row.created_ms, Some(111));

    // Same identity updates in place and keeps created_ms.
    let id2 = db
        .insert_or_update_file(dir_id, "a.txt", 20, Some("deadbeef"), Some(999), Some(600))
        .unwrap();
    assert_eq!(id2, id);
    let row = db.get_file(id).unwrap().unwrap();
    assert_eq!(row.size, 20);
    assert_eq!(row.hash.as_deref(), Some("deadbeef"));
    assert_eq!(row.created_ms, Some(111));
    assert_eq!(row.modified_ms, Some(600));
}

#[test]
fn test_extensionless_file_uses_sentinel() {
    let mut db = catalog();
    let drive_id = db.get_or_create_drive("C:/").unwrap();
    let dir_id = db.get_or_create_directory(drive_id, "C:/work").unwrap();

    let id = db
        .insert_or_update_file(dir_id, "README", 5, None, None, None)
        .unwrap();
    let row = db.get_file(id).unwrap().unwrap();
    assert_eq!(row.name, "README");
    let ext = db.get_extension(NO_EXTENSION).unwrap().unwrap();
    assert_eq!(row.extension_id, ext.id);

    // "a.txt" and "a" in the same directory are distinct rows.
    let other = db
        .insert_or_update_file(dir_id, "README.txt", 5, None, None, None)
        .unwrap();
    assert_ne!(other, id);
}

#[test]
fn test_seeded_extension_classification() {
    let db = catalog();
    let jpg = db.get_extension(".jpg").unwrap().unwrap();
    assert_eq!(jpg.category, "image");
    assert!(jpg.is_binary);
    let rs = db.get_extension(".rs").unwrap().unwrap();
    assert_eq!(rs.category, "code");
    assert!(!rs.is_binary);
}

#[test]
fn test_directory_delete_cascades_and_audits() {
    let mut db = catalog();
    let drive_id = db.get_or_create_drive("C:/").unwrap();
    let sub = db.get_or_create_directory(drive_id, "C:/work/sub").unwrap();
    let deep = db
        .get_or_create_directory(drive_id, "C:/work/sub/deep")
        .unwrap();
    db.insert_or_update_file(sub, "a.txt", 1, None, None, None)
        .unwrap();
    db.insert_or_update_file(deep, "b.txt", 2, None, None, None)
        .unwrap();

    assert!(db.delete_directory(drive_id, "C:/work/sub").unwrap());
    assert!(db.find_directory(drive_id, "C:/work/sub").unwrap().is_none());
    assert!(db
        .find_directory(drive_id, "C:/work/sub/deep")
        .unwrap()
        .is_none());
    assert_eq!(db.count_files_under(None).unwrap(), 0);
    // Parent survives; deleting again reports no row.
    assert!(db.find_directory(drive_id, "C:/work").unwrap().is_some());
    assert!(!db.delete_directory(drive_id, "C:/work/sub").unwrap());
}

#[test]
fn test_delete_file_by_name_audits() {
    let mut db = catalog();
    let drive_id = db.get_or_create_drive("C:/").unwrap();
    let dir_id = db.get_or_create_directory(drive_id, "C:/work").unwrap();
    db.insert_or_update_file(dir_id, "a.txt", 7, None, None, None)
        .unwrap();

    assert!(db.delete_file_by_name(dir_id, "a.txt").unwrap());
    assert!(!db.delete_file_by_name(dir_id, "a.txt").unwrap());
    assert_eq!(db.count_deleted_files().unwrap(), 1);
}

#[test]
fn test_batch_upsert_partitions_updates_and_inserts() {
    let mut db = catalog();
    let drive_id = db.get_or_create_drive("C:/").unwrap();
    let dir_id = db.get_or_create_directory(drive_id, "C:/work").unwrap();
    db.insert_or_update_file(dir_id, "existing.txt", 1, None, None, None)
        .unwrap();

    let batch = vec![
        FileUpsert {
            directory_id: dir_id,
            full_name: "existing.txt".to_string(),
            size: 99,
            hash: None,
            created_ms: None,
            modified_ms: None,
        },
        FileUpsert {
            directory_id: dir_id,
            full_name: "fresh.txt".to_string(),
            size: 2,
            hash: None,
            created_ms: None,
            modified_ms: None,
        },
        FileUpsert {
            directory_id: dir_id,
            full_name: "fresh2.bin".to_string(),
            size: 3,
            hash: None,
            created_ms: None,
            modified_ms: None,
        },
    ];

    db.begin().unwrap();
    let (updated, inserted) = db.batch_upsert_files(&batch).unwrap();
    db.commit().unwrap();
    assert_eq!(updated, 1);
    assert_eq!(inserted, 2);
    assert_eq!(db.count_files_under(None).unwrap(), 3);

    // Re-running the same batch is pure updates.
    db.begin().unwrap();
    let (updated, inserted) = db.batch_upsert_files(&batch).unwrap();
    db.commit().unwrap();
    assert_eq!(updated, 3);
    assert_eq!(inserted, 0);
}

#[test]
fn test_batch_upsert_survives_external_delete() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let db_path = db_path.to_str().unwrap();

    let mut writer = Catalog::open(db_path).unwrap();
    let drive_id = writer.get_or_create_drive("C:/").unwrap();
    let dir_id = writer.get_or_create_directory(drive_id, "C:/work").unwrap();

    let batch = vec![FileUpsert {
        directory_id: dir_id,
        full_name: "shared.txt".to_string(),
        size: 5,
        hash: None,
        created_ms: None,
        modified_ms: None,
    }];
    writer.begin().unwrap();
    writer.batch_upsert_files(&batch).unwrap();
    writer.commit().unwrap();

    // Another connection deletes the row; the writer's existence cache
    // still remembers it.
    let mut other = Catalog::open(db_path).unwrap();
    assert!(other.delete_file_by_name(dir_id, "shared.txt").unwrap());

    writer.begin().unwrap();
    let (updated, inserted) = writer.batch_upsert_files(&batch).unwrap();
    writer.commit().unwrap();
    assert_eq!(updated, 0);
    assert_eq!(inserted, 1);
    assert_eq!(writer.count_files_under(Some("C:/work")).unwrap(), 1);
}

#[test]
fn test_wipe_drive_data_is_scoped() {
    let mut db = catalog();
    let c = db.get_or_create_drive("C:/").unwrap();
    let d = db.get_or_create_drive("D:/").unwrap();
    let c_dir = db.get_or_create_directory(c, "C:/work").unwrap();
    let d_dir = db.get_or_create_directory(d, "D:/data").unwrap();
    db.insert_or_update_file(c_dir, "a.txt", 1, None, None, None)
        .unwrap();
    db.insert_or_update_file(d_dir, "b.txt", 1, None, None, None)
        .unwrap();
    db.set_scan_progress(c, "C:/work").unwrap();

    db.wipe_drive_data(c).unwrap();

    assert!(db.find_directory(c, "C:/work").unwrap().is_none());
    assert!(db.get_scan_progress(c).unwrap().is_none());
    assert!(db.find_directory(d, "D:/data").unwrap().is_some());
    assert_eq!(db.count_files_under(None).unwrap(), 1);
    // Wipe is a restart, not a disappearance: no audit rows.
    assert_eq!(db.count_deleted_files().unwrap(), 0);
}

#[test]
fn test_scan_progress_round_trip() {
    let mut db = catalog();
    let drive_id = db.get_or_create_drive("E:/").unwrap();
    assert!(db.get_scan_progress(drive_id).unwrap().is_none());

    db.set_scan_progress(drive_id, "E:/photos/2023").unwrap();
    let (path, _) = db.get_scan_progress(drive_id).unwrap().unwrap();
    assert_eq!(path, "E:/photos/2023");

    // Upsert on conflict.
    db.set_scan_progress(drive_id, "E:/photos/2024").unwrap();
    let (path, _) = db.get_scan_progress(drive_id).unwrap().unwrap();
    assert_eq!(path, "E:/photos/2024");

    db.clear_scan_progress(drive_id).unwrap();
    assert!(db.get_scan_progress(drive_id).unwrap().is_none());
}

#[test]
fn test_files_page_after_keyset_pagination() {
    let mut db = catalog();
    let drive_id = db.get_or_create_drive("C:/").unwrap();
    let dir_id = db.get_or_create_directory(drive_id, "C:/work").unwrap();
    for i in 0..7 {
        db.insert_or_update_file(dir_id, &format!("f{}.txt", i), i, None, None, None)
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut after = 0i64;
    loop {
        let page = db.files_page_after(Some("C:/work"), after, 3).unwrap();
        if page.is_empty() {
            break;
        }
        after = page.last().unwrap().id;
        seen.extend(page.into_iter().map(|r| r.name));
    }
    assert_eq!(seen.len(), 7);

    // Prefix scoping does not leak sibling directories.
    let other = db.get_or_create_directory(drive_id, "C:/workbench").unwrap();
    db.insert_or_update_file(other, "x.txt", 1, None, None, None)
        .unwrap();
    let page = db.files_page_after(Some("C:/work"), 0, 100).unwrap();
    assert_eq!(page.len(), 7);
}

#[test]
fn test_find_files_by_name_pattern() {
    let mut db = catalog();
    let drive_id = db.get_or_create_drive("C:/").unwrap();
    let dir_id = db.get_or_create_directory(drive_id, "C:/docs").unwrap();
    db.insert_or_update_file(dir_id, "report-2023.pdf", 1, None, None, None)
        .unwrap();
    db.insert_or_update_file(dir_id, "report-2024.pdf", 1, None, None, None)
        .unwrap();
    db.insert_or_update_file(dir_id, "notes.txt", 1, None, None, None)
        .unwrap();

    let hits = db.find_files_by_name("report-%", 10).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|r| r.extension == ".pdf"));
    assert_eq!(hits[0].directory_path, "C:/docs");
}

#[test]
fn test_export_log_append() {
    let mut db = catalog();
    let first = db.append_export_log("csv", "C:/out/files.csv").unwrap();
    let second = db.append_export_log("json", "C:/out/files.json").unwrap();
    assert!(second > first);
}

#[test]
fn test_subtree_totals() {
    let mut db = catalog();
    let drive_id = db.get_or_create_drive("C:/").unwrap();
    let a = db.get_or_create_directory(drive_id, "C:/work/a").unwrap();
    let b = db.get_or_create_directory(drive_id, "C:/work/b").unwrap();
    db.insert_or_update_file(a, "one.txt", 10, None, None, None)
        .unwrap();
    db.insert_or_update_file(b, "two.txt", 32, None, None, None)
        .unwrap();

    let (dirs, files, bytes) = db.subtree_totals("C:/work").unwrap();
    assert_eq!(dirs, 3);
    assert_eq!(files, 2);
    assert_eq!(bytes, 42);
}
