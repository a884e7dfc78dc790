//! SQLite cache backend.
//!
//! Collections are stored as one JSON payload per dataset, criteria as one
//! JSON payload per domain. The schema is versioned by [`schema`] migrations.

mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::cache::{CacheBackend, CacheEntry, CacheGateway, EntryKind};

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Cache path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Default on-disk location of the cache database.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "grimoire")
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?;
        Ok(dirs.cache_dir().join("grimoire.db"))
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        schema::run_migrations(&conn)
    }

    /// Open and migrate the database at `path`.
    pub fn open_migrated(path: PathBuf) -> Result<Self> {
        let db = Self::open(path)?;
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }
}

impl CacheBackend for Database {
    fn read_collection(&self, dataset: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let payload = conn
            .query_row(
                "SELECT payload FROM collections WHERE dataset = ?",
                [dataset],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn write_collection(&self, dataset: &str, payload: &str, count: usize) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO collections (dataset, payload, entity_count, stored_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(dataset) DO UPDATE SET
                payload = excluded.payload,
                entity_count = excluded.entity_count,
                stored_at = excluded.stored_at",
            (dataset, payload, count as i64, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    fn remove_collection(&self, dataset: &str) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM collections WHERE dataset = ?", [dataset])?;
        Ok(rows > 0)
    }

    fn read_criteria(&self, domain: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let payload = conn
            .query_row(
                "SELECT payload FROM criteria WHERE domain = ?",
                [domain],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn write_criteria(&self, domain: &str, payload: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO criteria (domain, payload, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(domain) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at",
            (domain, payload, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<CacheEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT 'collection', dataset, entity_count,
                    length(CAST(payload AS BLOB)), stored_at
             FROM collections
             UNION ALL
             SELECT 'criteria', domain, NULL,
                    length(CAST(payload AS BLOB)), updated_at
             FROM criteria
             ORDER BY 1, 2",
        )?;

        let entries = stmt
            .query_map([], |row| {
                Ok(CacheEntry {
                    kind: EntryKind::from_str(&row.get::<_, String>(0)?)
                        .unwrap_or(EntryKind::Collection),
                    key: row.get(1)?,
                    count: row.get::<_, Option<i64>>(2)?.map(|n| n.max(0) as usize),
                    bytes: row.get::<_, i64>(3)?.max(0) as usize,
                    stored_at: parse_datetime(row.get::<_, String>(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch("DELETE FROM collections; DELETE FROM criteria;")?;
        Ok(())
    }
}

/// Cache gateway over the database at `path`. A file that cannot be opened or
/// migrated (unreadable, not SQLite, newer schema) is logged and replaced by a
/// process-local [`crate::cache::MemoryCache`] for this run.
pub fn open_cache(path: PathBuf) -> CacheGateway {
    match Database::open_migrated(path.clone()) {
        Ok(db) => CacheGateway::new(Arc::new(db)),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = format!("{:#}", e),
                "Cache unavailable, continuing with an in-memory cache"
            );
            CacheGateway::memory()
        }
    }
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
