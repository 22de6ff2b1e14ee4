use std::collections::HashMap;
use std::time::{Duration, Instant};

use rusqlite::{Connection, Result};
use tracing::{debug, warn};

use super::cache::ExistenceCache;
use super::extensions;

/// Commit the open transaction after this many directories.
pub const COMMIT_DIR_INTERVAL: u32 = 250;
/// ...or when it has been open this long, whichever comes first.
pub const COMMIT_TIME_INTERVAL: Duration = Duration::from_secs(60);

const BUSY_TIMEOUT_MS: u32 = 60_000;
const SCHEMA_VERSION: i64 = 1;

/// The catalog store: one SQLite connection plus the advisory caches that
/// ride along with it. All writes in a process flow through a single
/// `Catalog` guarded by the write coordinator.
pub struct Catalog {
    conn: Connection,
    pub(super) cache: ExistenceCache,
    pub(super) extension_ids: HashMap<String, i64>,
    tx_open: bool,
    tx_opened_at: Instant,
    tx_dir_count: u32,
}

impl Catalog {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let mut catalog = Catalog {
            conn,
            cache: ExistenceCache::default(),
            extension_ids: HashMap::new(),
            tx_open: false,
            tx_opened_at: Instant::now(),
            tx_dir_count: 0,
        };
        catalog.configure_pragmas()?;
        catalog.migrate_schema()?;
        Ok(catalog)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = {};",
            BUSY_TIMEOUT_MS
        ))?;

        // Some connection states silently drop the foreign_keys pragma
        // (e.g. inside an open transaction). Verify and re-issue once.
        let fk: i64 = self
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if fk != 1 {
            warn!("foreign_keys pragma not honored, re-issuing");
            self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            let fk: i64 = self
                .conn
                .query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
            if fk != 1 {
                return Err(rusqlite::Error::InvalidQuery);
            }
        }

        debug!("SQLite pragmas configured (WAL mode, 60s busy timeout, FK on)");
        Ok(())
    }

    fn migrate_schema(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        self.conn.execute_batch(include_str!("schema.sql"))?;

        if version < SCHEMA_VERSION {
            self.seed_extensions()?;
            self.conn
                .execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
            debug!("Catalog schema initialized (version {})", SCHEMA_VERSION);
        }
        Ok(())
    }

    fn seed_extensions(&self) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO extensions (name, category, is_binary, mime) \
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (name, category, is_binary, mime) in extensions::SEED {
            stmt.execute(rusqlite::params![name, category, is_binary, mime])?;
        }
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ── Transaction primitives ───────────────────────────────────
    //
    // The scanner holds one long-running transaction across many calls, so
    // explicit BEGIN/COMMIT is used instead of rusqlite's scoped
    // `Transaction` type.

    pub fn begin(&mut self) -> Result<()> {
        debug_assert!(!self.tx_open, "begin() with a transaction already open");
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        self.tx_open = true;
        self.tx_opened_at = Instant::now();
        self.tx_dir_count = 0;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        if self.tx_open {
            self.conn.execute_batch("COMMIT;")?;
            self.tx_open = false;
        }
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        if self.tx_open {
            self.conn.execute_batch("ROLLBACK;")?;
            self.tx_open = false;
        }
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.tx_open
    }

    /// Record one processed directory against the open transaction.
    pub fn note_directory(&mut self) {
        self.tx_dir_count += 1;
    }

    /// Whether the open transaction has hit the commit interval
    /// (250 directories or 60 seconds, whichever first).
    pub fn commit_due(&self) -> bool {
        self.tx_open
            && (self.tx_dir_count >= COMMIT_DIR_INTERVAL
                || self.tx_opened_at.elapsed() >= COMMIT_TIME_INTERVAL)
    }

    pub fn commit_and_reopen(&mut self) -> Result<()> {
        self.commit()?;
        self.begin()
    }

    /// Force a passive WAL checkpoint so reader processes observe recent
    /// commits promptly. Used by the event handler after each event.
    pub fn checkpoint_passive(&self) -> Result<()> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_| Ok(()))?;
        Ok(())
    }
}
