//! Embedded relational metadata store (component A) plus the trivial
//! bucket-settings table (component M) that lives alongside it.
//!
//! Grounded on `other_examples/.../sqlite_cache.rs.rs`: a single SQLite
//! file opened once, WAL journaling, a busy timeout so concurrent callers
//! wait instead of failing, and `Mutex<Connection>` as the concurrency
//! primitive — `rusqlite::Connection` is `!Sync`, so a mutex (not a pool)
//! is the natural fit for a single-writer embedded cache.

use crate::error::{Error, Result};
use crate::models::{BucketSettings, CacheEntry};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

pub struct MetadataStore {
    conn: Mutex<Connection>,
}

impl MetadataStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                bucket_name TEXT NOT NULL,
                object_key TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                etag TEXT NOT NULL,
                cache_path TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                PRIMARY KEY (bucket_name, object_key)
            );
            CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries(expires_at);
            CREATE TABLE IF NOT EXISTS bucket_settings (
                bucket_name TEXT PRIMARY KEY,
                public_url TEXT
            );",
        )?;

        debug!("metadata store opened at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests; each test gets its own isolated schema.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE cache_entries (
                bucket_name TEXT NOT NULL,
                object_key TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                etag TEXT NOT NULL,
                cache_path TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                PRIMARY KEY (bucket_name, object_key)
            );
            CREATE INDEX idx_cache_entries_expires_at ON cache_entries(expires_at);
            CREATE TABLE bucket_settings (
                bucket_name TEXT PRIMARY KEY,
                public_url TEXT
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn lookup(&self, bucket: &str, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT bucket_name, object_key, content_type, size, etag, cache_path, cached_at, expires_at
             FROM cache_entries WHERE bucket_name = ?1 AND object_key = ?2 AND expires_at > ?3",
        )?;
        let entry = stmt
            .query_row(params![bucket, key, now.to_rfc3339()], row_to_entry)
            .optional()?;
        Ok(entry)
    }

    pub fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO cache_entries
                (bucket_name, object_key, content_type, size, etag, cache_path, cached_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(bucket_name, object_key) DO UPDATE SET
                content_type = excluded.content_type,
                size = excluded.size,
                etag = excluded.etag,
                cache_path = excluded.cache_path,
                cached_at = excluded.cached_at,
                expires_at = excluded.expires_at",
            params![
                entry.bucket_name,
                entry.object_key,
                entry.content_type,
                entry.size,
                entry.etag,
                entry.cache_path,
                entry.cached_at.to_rfc3339(),
                entry.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn entries_in_bucket(&self, bucket: &str) -> Result<Vec<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT bucket_name, object_key, content_type, size, etag, cache_path, cached_at, expires_at
             FROM cache_entries WHERE bucket_name = ?1",
        )?;
        let rows = stmt
            .query_map(params![bucket], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_entry(&self, bucket: &str, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        let existing = conn
            .query_row(
                "SELECT bucket_name, object_key, content_type, size, etag, cache_path, cached_at, expires_at
                 FROM cache_entries WHERE bucket_name = ?1 AND object_key = ?2",
                params![bucket, key],
                row_to_entry,
            )
            .optional()?;
        if existing.is_some() {
            conn.execute(
                "DELETE FROM cache_entries WHERE bucket_name = ?1 AND object_key = ?2",
                params![bucket, key],
            )?;
        }
        Ok(existing)
    }

    /// Rows with `expires_at <= now`. Deletes them and returns the full
    /// rows so the caller can best-effort remove their body files.
    pub fn delete_expired(&self, now: DateTime<Utc>) -> Result<Vec<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT bucket_name, object_key, content_type, size, etag, cache_path, cached_at, expires_at
             FROM cache_entries WHERE expires_at <= ?1",
        )?;
        let expired = stmt
            .query_map(params![now.to_rfc3339()], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        conn.execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?1",
            params![now.to_rfc3339()],
        )?;
        Ok(expired)
    }

    pub fn total_size(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let total: Option<i64> =
            conn.query_row("SELECT SUM(size) FROM cache_entries", [], |row| row.get(0))?;
        Ok(total.unwrap_or(0))
    }

    /// Rows ordered oldest-insertion-first, for LRU-by-insertion eviction.
    pub fn entries_by_cached_at_asc(&self) -> Result<Vec<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT bucket_name, object_key, content_type, size, etag, cache_path, cached_at, expires_at
             FROM cache_entries ORDER BY cached_at ASC",
        )?;
        let rows = stmt
            .query_map([], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_all(&self) -> Result<Vec<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT bucket_name, object_key, content_type, size, etag, cache_path, cached_at, expires_at
             FROM cache_entries",
        )?;
        let all = stmt
            .query_map([], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        conn.execute("DELETE FROM cache_entries", [])?;
        Ok(all)
    }

    pub fn delete_bucket(&self, bucket: &str) -> Result<Vec<CacheEntry>> {
        let entries = self.entries_in_bucket(bucket)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM cache_entries WHERE bucket_name = ?1",
            params![bucket],
        )?;
        Ok(entries)
    }

    pub fn vacuum(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("VACUUM;")?;
        Ok(())
    }

    // --- bucket_settings (component M) ---

    pub fn get_settings(&self, bucket: &str) -> Result<Option<BucketSettings>> {
        let conn = self.conn.lock().unwrap();
        let settings = conn
            .query_row(
                "SELECT bucket_name, public_url FROM bucket_settings WHERE bucket_name = ?1",
                params![bucket],
                |row| {
                    Ok(BucketSettings {
                        bucket_name: row.get(0)?,
                        public_url: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(settings)
    }

    pub fn upsert_settings(&self, settings: &BucketSettings) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO bucket_settings (bucket_name, public_url) VALUES (?1, ?2)
             ON CONFLICT(bucket_name) DO UPDATE SET public_url = excluded.public_url",
            params![settings.bucket_name, settings.public_url],
        )?;
        Ok(())
    }

    pub fn delete_settings(&self, bucket: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "DELETE FROM bucket_settings WHERE bucket_name = ?1",
            params![bucket],
        )?;
        Ok(changed > 0)
    }
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<CacheEntry> {
    let cached_at: String = row.get(6)?;
    let expires_at: String = row.get(7)?;
    Ok(CacheEntry {
        bucket_name: row.get(0)?,
        object_key: row.get(1)?,
        content_type: row.get(2)?,
        size: row.get(3)?,
        etag: row.get(4)?,
        cache_path: row.get(5)?,
        cached_at: parse_rfc3339(&cached_at),
        expires_at: parse_rfc3339(&expires_at),
    })
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
