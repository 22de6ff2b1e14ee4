use rusqlite::{params, params_from_iter, types::Value, OptionalExtension, Result};
use tracing::debug;

use super::models::*;
use super::sqlite::Catalog;
use crate::pathutil;

/// Row-value probe batches stay well under SQLite's parameter limit.
const PROBE_CHUNK: usize = 300;

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Bounds for "path equals prefix or lives under it" range scans.
/// '0' is the byte after '/' so `[prefix + "/", prefix + "0")` covers
/// exactly the descendants under the binary collation.
fn path_range(prefix: &str) -> (String, String, String) {
    if prefix.ends_with('/') {
        let mut high = prefix[..prefix.len() - 1].to_string();
        high.push('0');
        (prefix.to_string(), prefix.to_string(), high)
    } else {
        (
            prefix.to_string(),
            format!("{}/", prefix),
            format!("{}0", prefix),
        )
    }
}

impl Catalog {
    // ── Drives ───────────────────────────────────────────────────

    pub fn get_or_create_drive(&mut self, name: &str) -> Result<i64> {
        let existing: Option<i64> = self
            .connection()
            .prepare_cached("SELECT id FROM drives WHERE name = ?1")?
            .query_row(params![name], |row| row.get(0))
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        match self
            .connection()
            .execute("INSERT INTO drives (name) VALUES (?1)", params![name])
        {
            Ok(_) => {
                let id = self.connection().last_insert_rowid();
                debug!("Created drive {} ({})", name, id);
                Ok(id)
            }
            // Raced with another writer; the row exists now.
            Err(err) if is_unique_violation(&err) => self
                .connection()
                .query_row("SELECT id FROM drives WHERE name = ?1", params![name], |r| {
                    r.get(0)
                }),
            Err(err) => Err(err),
        }
    }

    pub fn drive_name(&self, drive_id: i64) -> Result<String> {
        self.connection().query_row(
            "SELECT name FROM drives WHERE id = ?1",
            params![drive_id],
            |row| row.get(0),
        )
    }

    pub fn list_drives(&self) -> Result<Vec<Drive>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT id, name FROM drives ORDER BY name")?;
        let drives = stmt
            .query_map([], |row| {
                Ok(Drive {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(drives)
    }

    /// Remove every directory (cascading to files) and the progress row for
    /// one drive. Other drives are untouched. No audit rows are written:
    /// this is an intentional restart, not a disappearance.
    pub fn wipe_drive_data(&mut self, drive_id: i64) -> Result<()> {
        let dirs = self.connection().execute(
            "DELETE FROM directories WHERE drive_id = ?1",
            params![drive_id],
        )?;
        self.connection().execute(
            "DELETE FROM scan_progress WHERE drive_id = ?1",
            params![drive_id],
        )?;
        self.cache.clear();
        debug!("Wiped drive {} ({} directories)", drive_id, dirs);
        Ok(())
    }

    // ── Extensions ───────────────────────────────────────────────

    pub fn get_or_create_extension(&mut self, name: &str) -> Result<i64> {
        if let Some(id) = self.extension_ids.get(name) {
            return Ok(*id);
        }
        let existing: Option<i64> = self
            .connection()
            .prepare_cached("SELECT id FROM extensions WHERE name = ?1")?
            .query_row(params![name], |row| row.get(0))
            .optional()?;
        let id = match existing {
            Some(id) => id,
            None => {
                let info = super::extensions::classify(name);
                match self.connection().execute(
                    "INSERT INTO extensions (name, category, is_binary, mime) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![name, info.category, info.is_binary, info.mime],
                ) {
                    Ok(_) => self.connection().last_insert_rowid(),
                    Err(err) if is_unique_violation(&err) => self.connection().query_row(
                        "SELECT id FROM extensions WHERE name = ?1",
                        params![name],
                        |r| r.get(0),
                    )?,
                    Err(err) => return Err(err),
                }
            }
        };
        self.extension_ids.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn get_extension(&self, name: &str) -> Result<Option<Extension>> {
        self.connection()
            .query_row(
                "SELECT id, name, category, is_binary, mime FROM extensions WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Extension {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        category: row.get(2)?,
                        is_binary: row.get(3)?,
                        mime: row.get(4)?,
                    })
                },
            )
            .optional()
    }

    // ── Directories ──────────────────────────────────────────────

    pub fn find_directory(&self, drive_id: i64, full_path: &str) -> Result<Option<i64>> {
        self.connection()
            .prepare_cached("SELECT id FROM directories WHERE drive_id = ?1 AND full_path = ?2")?
            .query_row(params![drive_id, full_path], |row| row.get(0))
            .optional()
    }

    /// Get or create a directory row, materializing every missing ancestor
    /// from the drive root down. Iterative so pathological depth cannot
    /// overflow the stack. Idempotent under races: a uniqueness conflict is
    /// resolved by re-reading the winner's row.
    pub fn get_or_create_directory(&mut self, drive_id: i64, full_path: &str) -> Result<i64> {
        if let Some(id) = self.find_directory(drive_id, full_path)? {
            return Ok(id);
        }

        let drive_name = self.drive_name(drive_id)?;
        let root = drive_name.clone();

        // Ancestor chain from the root to the target, inclusive.
        let mut chain: Vec<String> = Vec::new();
        let mut cursor = full_path.to_string();
        while cursor != root {
            chain.push(cursor.clone());
            match pathutil::parent_of(&cursor) {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        chain.push(root);
        chain.reverse();

        let mut parent_id: Option<i64> = None;
        let mut dir_id: i64 = 0;
        for path in &chain {
            dir_id = match self.find_directory(drive_id, path)? {
                Some(id) => id,
                None => self.insert_directory(drive_id, parent_id, path)?,
            };
            parent_id = Some(dir_id);
        }
        Ok(dir_id)
    }

    fn insert_directory(
        &mut self,
        drive_id: i64,
        parent_id: Option<i64>,
        full_path: &str,
    ) -> Result<i64> {
        let name = pathutil::leaf_of(full_path).to_string();
        let depth = pathutil::depth_of(full_path);
        match self.connection().execute(
            "INSERT INTO directories (drive_id, parent_id, full_path, name, depth) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![drive_id, parent_id, full_path, name, depth],
        ) {
            Ok(_) => Ok(self.connection().last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => self.connection().query_row(
                "SELECT id FROM directories WHERE drive_id = ?1 AND full_path = ?2",
                params![drive_id, full_path],
                |r| r.get(0),
            ),
            Err(err) => Err(err),
        }
    }

    /// Delete a directory row (children and files cascade) and write the
    /// audit entry. Returns false when no such row exists.
    pub fn delete_directory(&mut self, drive_id: i64, full_path: &str) -> Result<bool> {
        let deleted = self.connection().execute(
            "DELETE FROM directories WHERE drive_id = ?1 AND full_path = ?2",
            params![drive_id, full_path],
        )?;
        if deleted == 0 {
            return Ok(false);
        }
        let drive_name = self.drive_name(drive_id)?;
        self.record_deleted_directory(&drive_name, full_path)?;
        // Cascade invalidates an unknown set of file keys.
        self.cache.clear();
        Ok(true)
    }

    pub fn directories_under(&self, prefix: Option<&str>) -> Result<Vec<DirectoryRow>> {
        let sql_all = "SELECT id, drive_id, parent_id, full_path, name, depth \
                       FROM directories ORDER BY full_path";
        let sql_scoped = "SELECT id, drive_id, parent_id, full_path, name, depth \
                          FROM directories \
                          WHERE full_path = ?1 OR (full_path >= ?2 AND full_path < ?3) \
                          ORDER BY full_path";
        let map = |row: &rusqlite::Row<'_>| {
            Ok(DirectoryRow {
                id: row.get(0)?,
                drive_id: row.get(1)?,
                parent_id: row.get(2)?,
                full_path: row.get(3)?,
                name: row.get(4)?,
                depth: row.get(5)?,
            })
        };
        let rows = match prefix {
            Some(p) => {
                let (exact, low, high) = path_range(p);
                let mut stmt = self.connection().prepare(sql_scoped)?;
                let rows = stmt
                    .query_map(params![exact, low, high], map)?
                    .collect::<Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = self.connection().prepare(sql_all)?;
                let rows = stmt.query_map([], map)?.collect::<Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(rows)
    }

    pub fn directory_path(&self, dir_id: i64) -> Result<String> {
        self.connection().query_row(
            "SELECT full_path FROM directories WHERE id = ?1",
            params![dir_id],
            |row| row.get(0),
        )
    }

    // ── Files ────────────────────────────────────────────────────

    pub fn find_file_id(&self, dir_id: i64, stem: &str, ext_id: i64) -> Result<Option<i64>> {
        self.connection()
            .prepare_cached(
                "SELECT id FROM files \
                 WHERE directory_id = ?1 AND name = ?2 AND extension_id = ?3",
            )?
            .query_row(params![dir_id, stem, ext_id], |row| row.get(0))
            .optional()
    }

    pub fn get_file(&self, file_id: i64) -> Result<Option<FileRow>> {
        self.connection()
            .query_row(
                "SELECT id, directory_id, extension_id, name, size, hash, created_ms, modified_ms \
                 FROM files WHERE id = ?1",
                params![file_id],
                |row| {
                    Ok(FileRow {
                        id: row.get(0)?,
                        directory_id: row.get(1)?,
                        extension_id: row.get(2)?,
                        name: row.get(3)?,
                        size: row.get(4)?,
                        hash: row.get(5)?,
                        created_ms: row.get(6)?,
                        modified_ms: row.get(7)?,
                    })
                },
            )
            .optional()
    }

    /// UPDATE-first upsert of one file. `created_ms` is only written on
    /// insert; updates preserve the original creation timestamp.
    pub fn insert_or_update_file(
        &mut self,
        dir_id: i64,
        full_name: &str,
        size: i64,
        hash: Option<&str>,
        created_ms: Option<i64>,
        modified_ms: Option<i64>,
    ) -> Result<i64> {
        let (stem, ext_name) = pathutil::split_filename(full_name);
        let ext_id = self.get_or_create_extension(&ext_name)?;
        let key = (dir_id, stem.clone(), ext_id);

        let known_id = match self.cache.get(&key) {
            Some(id) => Some(id),
            None => self.find_file_id(dir_id, &stem, ext_id)?,
        };

        if let Some(id) = known_id {
            let changed = self
                .connection()
                .prepare_cached(
                    "UPDATE files SET size = ?2, hash = ?3, modified_ms = ?4 WHERE id = ?1",
                )?
                .execute(params![id, size, hash, modified_ms])?;
            if changed == 1 {
                self.cache.insert(key, id);
                return Ok(id);
            }
            // Stale cache entry: the row is gone, fall through to insert.
            self.cache.remove(&key);
        }

        let id = self.insert_file(dir_id, &stem, ext_id, size, hash, created_ms, modified_ms)?;
        self.cache.insert(key, id);
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_file(
        &mut self,
        dir_id: i64,
        stem: &str,
        ext_id: i64,
        size: i64,
        hash: Option<&str>,
        created_ms: Option<i64>,
        modified_ms: Option<i64>,
    ) -> Result<i64> {
        let created = created_ms.unwrap_or_else(now_ms);
        match self
            .connection()
            .prepare_cached(
                "INSERT INTO files (directory_id, extension_id, name, size, hash, created_ms, modified_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?
            .execute(params![dir_id, ext_id, stem, size, hash, created, modified_ms])
        {
            Ok(_) => Ok(self.connection().last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => {
                // Race: another writer inserted the same key. Re-read and
                // apply our values as an update.
                let id: i64 = self.connection().query_row(
                    "SELECT id FROM files \
                     WHERE directory_id = ?1 AND name = ?2 AND extension_id = ?3",
                    params![dir_id, stem, ext_id],
                    |r| r.get(0),
                )?;
                self.connection().execute(
                    "UPDATE files SET size = ?2, hash = ?3, modified_ms = ?4 WHERE id = ?1",
                    params![id, size, hash, modified_ms],
                )?;
                Ok(id)
            }
            Err(err) => Err(err),
        }
    }

    /// Batched upsert. Partitions the batch into UPDATE and INSERT subsets
    /// using the existence cache plus one row-value probing query for the
    /// cache misses, then runs the two prepared statements. The caller must
    /// hold an open transaction. Returns (updated, inserted).
    pub fn batch_upsert_files(&mut self, items: &[FileUpsert]) -> Result<(usize, usize)> {
        debug_assert!(
            self.in_transaction(),
            "batch_upsert_files requires an enclosing transaction"
        );
        if items.is_empty() {
            return Ok((0, 0));
        }

        struct Pending {
            dir_id: i64,
            stem: String,
            ext_id: i64,
            size: i64,
            hash: Option<String>,
            created_ms: Option<i64>,
            modified_ms: Option<i64>,
        }

        let mut pending = Vec::with_capacity(items.len());
        for item in items {
            let (stem, ext_name) = pathutil::split_filename(&item.full_name);
            let ext_id = self.get_or_create_extension(&ext_name)?;
            pending.push(Pending {
                dir_id: item.directory_id,
                stem,
                ext_id,
                size: item.size,
                hash: item.hash.clone(),
                created_ms: item.created_ms,
                modified_ms: item.modified_ms,
            });
        }

        // Partition on the cache; probe the misses in one query per chunk.
        let mut updates: Vec<(i64, usize)> = Vec::new();
        let mut misses: Vec<usize> = Vec::new();
        for (idx, p) in pending.iter().enumerate() {
            let key = (p.dir_id, p.stem.clone(), p.ext_id);
            match self.cache.get(&key) {
                Some(id) => updates.push((id, idx)),
                None => misses.push(idx),
            }
        }

        let mut inserts: Vec<usize> = Vec::new();
        for chunk in misses.chunks(PROBE_CHUNK) {
            let placeholders = chunk
                .iter()
                .map(|_| "(?,?,?)")
                .collect::<Vec<_>>()
                .join(",");
            let sql = format!(
                "SELECT id, directory_id, name, extension_id FROM files \
                 WHERE (directory_id, name, extension_id) IN (VALUES {})",
                placeholders
            );
            let mut values: Vec<Value> = Vec::with_capacity(chunk.len() * 3);
            for idx in chunk {
                let p = &pending[*idx];
                values.push(Value::Integer(p.dir_id));
                values.push(Value::Text(p.stem.clone()));
                values.push(Value::Integer(p.ext_id));
            }
            let mut stmt = self.connection().prepare(&sql)?;
            let found: Vec<(i64, i64, String, i64)> = stmt
                .query_map(params_from_iter(values), |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?
                .collect::<Result<Vec<_>>>()?;
            drop(stmt);

            let mut hits: std::collections::HashMap<(i64, &str, i64), i64> =
                std::collections::HashMap::with_capacity(found.len());
            for row in &found {
                hits.insert((row.1, row.2.as_str(), row.3), row.0);
            }
            for idx in chunk {
                let p = &pending[*idx];
                match hits.get(&(p.dir_id, p.stem.as_str(), p.ext_id)) {
                    Some(id) => updates.push((*id, *idx)),
                    None => inserts.push(*idx),
                }
            }
        }

        let mut updated = 0usize;
        let mut lost: Vec<usize> = Vec::new();
        {
            let mut stmt = self.connection().prepare_cached(
                "UPDATE files SET size = ?2, hash = ?3, modified_ms = ?4 WHERE id = ?1",
            )?;
            for (id, idx) in &updates {
                let p = &pending[*idx];
                if stmt.execute(params![id, p.size, p.hash, p.modified_ms])? == 1 {
                    updated += 1;
                } else {
                    // Stale cache entry: another connection deleted the
                    // row. Reroute to the insert path.
                    lost.push(*idx);
                }
            }
        }
        let lost_set: std::collections::HashSet<usize> = lost.iter().copied().collect();
        for (id, idx) in &updates {
            let p = &pending[*idx];
            let key = (p.dir_id, p.stem.clone(), p.ext_id);
            if lost_set.contains(idx) {
                self.cache.remove(&key);
            } else {
                self.cache.insert(key, *id);
            }
        }
        inserts.extend(lost);

        let mut inserted = 0usize;
        for idx in inserts {
            let p = &pending[idx];
            let id = self.insert_file(
                p.dir_id,
                &p.stem,
                p.ext_id,
                p.size,
                p.hash.as_deref(),
                p.created_ms,
                p.modified_ms,
            )?;
            self.cache.insert((p.dir_id, p.stem.clone(), p.ext_id), id);
            inserted += 1;
        }

        Ok((updated, inserted))
    }

    /// Delete one file row located by its directory and full filename,
    /// writing the audit entry. Returns false when no row matched.
    pub fn delete_file_by_name(&mut self, dir_id: i64, full_name: &str) -> Result<bool> {
        let (stem, ext_name) = pathutil::split_filename(full_name);
        let ext_id = match self.get_extension(&ext_name)? {
            Some(ext) => ext.id,
            None => return Ok(false),
        };
        let size: Option<i64> = self
            .connection()
            .prepare_cached(
                "SELECT size FROM files \
                 WHERE directory_id = ?1 AND name = ?2 AND extension_id = ?3",
            )?
            .query_row(params![dir_id, stem, ext_id], |row| row.get(0))
            .optional()?;
        let Some(size) = size else {
            return Ok(false);
        };
        self.connection().execute(
            "DELETE FROM files WHERE directory_id = ?1 AND name = ?2 AND extension_id = ?3",
            params![dir_id, stem, ext_id],
        )?;
        self.cache.remove(&(dir_id, stem.clone(), ext_id));
        let dir_path = self.directory_path(dir_id)?;
        self.record_deleted_file(&dir_path, &stem, &ext_name, size)?;
        Ok(true)
    }

    /// Delete a file row by id (integrity checker path), with audit.
    pub fn delete_file_row(&mut self, row: &FileWithPath) -> Result<()> {
        self.connection()
            .execute("DELETE FROM files WHERE id = ?1", params![row.id])?;
        self.record_deleted_file(&row.directory_path, &row.name, &row.extension, row.size)?;
        Ok(())
    }

    /// Re-home a file row after a move event: new directory, stem and
    /// extension in one statement.
    pub fn move_file(
        &mut self,
        file_id: i64,
        new_dir_id: i64,
        new_stem: &str,
        new_ext_id: i64,
    ) -> Result<()> {
        self.connection().execute(
            "UPDATE files SET directory_id = ?2, name = ?3, extension_id = ?4 WHERE id = ?1",
            params![file_id, new_dir_id, new_stem, new_ext_id],
        )?;
        self.cache
            .insert((new_dir_id, new_stem.to_string(), new_ext_id), file_id);
        Ok(())
    }

    pub fn update_file_size_hash(
        &mut self,
        file_id: i64,
        size: i64,
        hash: Option<&str>,
        modified_ms: Option<i64>,
    ) -> Result<()> {
        self.connection().execute(
            "UPDATE files SET size = ?2, hash = ?3, modified_ms = ?4 WHERE id = ?1",
            params![file_id, size, hash, modified_ms],
        )?;
        Ok(())
    }

    /// Keyset-paginated file listing for the integrity sweep; stable under
    /// concurrent deletes.
    pub fn files_page_after(
        &self,
        prefix: Option<&str>,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<FileWithPath>> {
        let base = "SELECT f.id, f.directory_id, d.full_path, f.name, e.name, f.size, f.hash \
                    FROM files f \
                    JOIN directories d ON d.id = f.directory_id \
                    JOIN extensions e ON e.id = f.extension_id";
        let map = |row: &rusqlite::Row<'_>| {
            Ok(FileWithPath {
                id: row.get(0)?,
                directory_id: row.get(1)?,
                directory_path: row.get(2)?,
                name: row.get(3)?,
                extension: row.get(4)?,
                size: row.get(5)?,
                hash: row.get(6)?,
            })
        };
        let rows = match prefix {
            Some(p) => {
                let (exact, low, high) = path_range(p);
                let sql = format!(
                    "{} WHERE f.id > ?1 \
                     AND (d.full_path = ?2 OR (d.full_path >= ?3 AND d.full_path < ?4)) \
                     ORDER BY f.id LIMIT ?5",
                    base
                );
                let mut stmt = self.connection().prepare(&sql)?;
                let rows = stmt
                    .query_map(params![after_id, exact, low, high, limit], map)?
                    .collect::<Result<Vec<_>>>()?;
                rows
            }
            None => {
                let sql = format!("{} WHERE f.id > ?1 ORDER BY f.id LIMIT ?2", base);
                let mut stmt = self.connection().prepare(&sql)?;
                let rows = stmt
                    .query_map(params![after_id, limit], map)?
                    .collect::<Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(rows)
    }

    pub fn count_files_under(&self, prefix: Option<&str>) -> Result<i64> {
        match prefix {
            Some(p) => {
                let (exact, low, high) = path_range(p);
                self.connection().query_row(
                    "SELECT COUNT(*) FROM files f \
                     JOIN directories d ON d.id = f.directory_id \
                     WHERE d.full_path = ?1 OR (d.full_path >= ?2 AND d.full_path < ?3)",
                    params![exact, low, high],
                    |row| row.get(0),
                )
            }
            None => {
                self.connection()
                    .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
            }
        }
    }

    // ── Scan progress ────────────────────────────────────────────

    pub fn set_scan_progress(&mut self, drive_id: i64, last_path: &str) -> Result<()> {
        self.connection().execute(
            "INSERT INTO scan_progress (drive_id, last_path, updated_ms) VALUES (?1, ?2, ?3) \
             ON CONFLICT(drive_id) DO UPDATE SET \
                 last_path = excluded.last_path, updated_ms = excluded.updated_ms",
            params![drive_id, last_path, now_ms()],
        )?;
        Ok(())
    }

    pub fn get_scan_progress(&self, drive_id: i64) -> Result<Option<(String, i64)>> {
        self.connection()
            .query_row(
                "SELECT last_path, updated_ms FROM scan_progress WHERE drive_id = ?1",
                params![drive_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
    }

    pub fn clear_scan_progress(&mut self, drive_id: i64) -> Result<()> {
        self.connection().execute(
            "DELETE FROM scan_progress WHERE drive_id = ?1",
            params![drive_id],
        )?;
        Ok(())
    }

    pub fn all_scan_progress(&self) -> Result<Vec<ScanProgressRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT sp.drive_id, dr.name, sp.last_path, sp.updated_ms \
             FROM scan_progress sp JOIN drives dr ON dr.id = sp.drive_id \
             ORDER BY dr.name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ScanProgressRow {
                    drive_id: row.get(0)?,
                    drive_name: row.get(1)?,
                    last_path: row.get(2)?,
                    updated_ms: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Scan locks ───────────────────────────────────────────────

    pub fn insert_scan_lock(&mut self, scan_type: &str, pid: i64, hostname: &str) -> Result<i64> {
        self.connection().execute(
            "INSERT INTO scan_locks (scan_type, started_ms, pid, hostname, is_active) \
             VALUES (?1, ?2, ?3, ?4, 1)",
            params![scan_type, now_ms(), pid, hostname],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn deactivate_scan_lock(&mut self, lock_id: i64) -> Result<()> {
        self.connection().execute(
            "UPDATE scan_locks SET is_active = 0 WHERE id = ?1",
            params![lock_id],
        )?;
        Ok(())
    }

    pub fn active_scan_locks(&self) -> Result<Vec<ScanLockRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, scan_type, started_ms, pid, hostname, is_active \
             FROM scan_locks WHERE is_active = 1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], scan_lock_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn recent_scan_locks(&self, limit: i64) -> Result<Vec<ScanLockRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, scan_type, started_ms, pid, hostname, is_active \
             FROM scan_locks ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], scan_lock_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Audit log ────────────────────────────────────────────────

    pub fn record_deleted_directory(&mut self, drive_name: &str, full_path: &str) -> Result<()> {
        self.connection().execute(
            "INSERT INTO deleted_directories (drive_name, full_path, deleted_ms) \
             VALUES (?1, ?2, ?3)",
            params![drive_name, full_path, now_ms()],
        )?;
        Ok(())
    }

    pub fn record_deleted_file(
        &mut self,
        directory_path: &str,
        name: &str,
        extension: &str,
        size: i64,
    ) -> Result<()> {
        self.connection().execute(
            "INSERT INTO deleted_files (directory_path, name, extension, size, deleted_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![directory_path, name, extension, size, now_ms()],
        )?;
        Ok(())
    }

    pub fn count_deleted_files(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM deleted_files", [], |row| row.get(0))
    }

    // ── Export log ───────────────────────────────────────────────

    pub fn append_export_log(&mut self, export_type: &str, artifact_path: &str) -> Result<i64> {
        self.connection().execute(
            "INSERT INTO export_log (export_type, artifact_path, exported_ms) \
             VALUES (?1, ?2, ?3)",
            params![export_type, artifact_path, now_ms()],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    // ── Read-side queries for the external shells ────────────────

    pub fn drive_summaries(&self) -> Result<Vec<DriveSummary>> {
        let mut stmt = self.connection().prepare(
            "SELECT dr.id, dr.name, \
                    (SELECT COUNT(*) FROM directories d WHERE d.drive_id = dr.id), \
                    (SELECT COUNT(*) FROM files f JOIN directories d ON d.id = f.directory_id \
                     WHERE d.drive_id = dr.id), \
                    (SELECT COALESCE(SUM(f.size), 0) FROM files f \
                     JOIN directories d ON d.id = f.directory_id WHERE d.drive_id = dr.id) \
             FROM drives dr ORDER BY dr.name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DriveSummary {
                    drive_id: row.get(0)?,
                    drive_name: row.get(1)?,
                    directory_count: row.get(2)?,
                    file_count: row.get(3)?,
                    total_bytes: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Name-predicate search over stems, `LIKE` with `%`/`_` wildcards.
    pub fn find_files_by_name(&self, pattern: &str, limit: i64) -> Result<Vec<FileWithPath>> {
        let mut stmt = self.connection().prepare(
            "SELECT f.id, f.directory_id, d.full_path, f.name, e.name, f.size, f.hash \
             FROM files f \
             JOIN directories d ON d.id = f.directory_id \
             JOIN extensions e ON e.id = f.extension_id \
             WHERE f.name LIKE ?1 ORDER BY d.full_path, f.name LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![pattern, limit], |row| {
                Ok(FileWithPath {
                    id: row.get(0)?,
                    directory_id: row.get(1)?,
                    directory_path: row.get(2)?,
                    name: row.get(3)?,
                    extension: row.get(4)?,
                    size: row.get(5)?,
                    hash: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Groups of files sharing a content hash: (hash, count, size).
    pub fn duplicate_hash_groups(&self, limit: i64) -> Result<Vec<(String, i64, i64)>> {
        let mut stmt = self.connection().prepare(
            "SELECT hash, COUNT(*), size FROM files \
             WHERE hash IS NOT NULL \
             GROUP BY hash, size HAVING COUNT(*) > 1 \
             ORDER BY size * (COUNT(*) - 1) DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Aggregate (directories, files, bytes) for a subtree.
    pub fn subtree_totals(&self, prefix: &str) -> Result<(i64, i64, i64)> {
        let (exact, low, high) = path_range(prefix);
        let dirs: i64 = self.connection().query_row(
            "SELECT COUNT(*) FROM directories \
             WHERE full_path = ?1 OR (full_path >= ?2 AND full_path < ?3)",
            params![exact, low, high],
            |row| row.get(0),
        )?;
        let (files, bytes): (i64, i64) = self.connection().query_row(
            "SELECT COUNT(*), COALESCE(SUM(f.size), 0) FROM files f \
             JOIN directories d ON d.id = f.directory_id \
             WHERE d.full_path = ?1 OR (d.full_path >= ?2 AND d.full_path < ?3)",
            params![exact, low, high],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((dirs, files, bytes))
    }
}

fn scan_lock_from_row(row: &rusqlite::Row<'_>) -> Result<ScanLockRow> {
    Ok(ScanLockRow {
        id: row.get(0)?,
        scan_type: row.get(1)?,
        started_ms: row.get(2)?,
        pid: row.get(3)?,
        hostname: row.get(4)?,
        is_active: row.get(5)?,
    })
}
