//! Content cache (component C): cache-aside over the metadata store (A)
//! and body store (B). Generalizes the teacher's `cache.rs`
//! (`CacheManager`: a struct wrapping a backing store, `debug!`/`error!`
//! logging at every operation, best-effort cleanup on failure) from
//! Redis key/value semantics to SQLite row + on-disk body semantics.

use crate::body_store;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::metadata_store::MetadataStore;
use crate::models::CacheEntry;
use crate::sanitize::cache_path_for;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct ContentCache {
    store: Arc<MetadataStore>,
    cache_root: PathBuf,
    ttl: chrono::Duration,
    max_size_bytes: i64,
}

impl ContentCache {
    pub fn new(store: Arc<MetadataStore>, cache_root: PathBuf, config: &CacheConfig) -> Self {
        Self {
            store,
            cache_root,
            ttl: config.ttl(),
            max_size_bytes: config.max_size_bytes(),
        }
    }

    pub fn lookup(&self, bucket: &str, key: &str) -> Result<Option<CacheEntry>> {
        let entry = self.store.lookup(bucket, key, Utc::now())?;
        if entry.is_some() {
            debug!("cache hit for {}/{}", bucket, key);
        } else {
            debug!("cache miss for {}/{}", bucket, key);
        }
        Ok(entry)
    }

    pub async fn store(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        etag: &str,
    ) -> Result<CacheEntry> {
        let path = cache_path_for(&self.cache_root, bucket, key);
        body_store::write(&path, body).await?;

        let now = Utc::now();
        let entry = CacheEntry {
            bucket_name: bucket.to_string(),
            object_key: key.to_string(),
            content_type: content_type.to_string(),
            size: body.len() as i64,
            etag: etag.to_string(),
            cache_path: path.to_string_lossy().into_owned(),
            cached_at: now,
            expires_at: now + self.ttl,
        };
        self.store.upsert(&entry)?;
        info!("cached {}/{} ({} bytes)", bucket, key, entry.size);

        if let Err(e) = self.evict().await {
            error!("eviction pass after store failed: {}", e);
        }

        Ok(entry)
    }

    pub async fn open_body(&self, cache_path: &str) -> Result<File> {
        body_store::open(std::path::Path::new(cache_path))
            .await
            .map_err(|_| Error::BodyMissing)
    }

    /// Removes rows in `bucket` whose cached etag disagrees with
    /// `current_etags[key]`. Keys absent from `current_etags` are left
    /// untouched. Returns the number of rows removed.
    pub async fn invalidate_by_etags(
        &self,
        bucket: &str,
        current_etags: &HashMap<String, String>,
    ) -> Result<usize> {
        let entries = self.store.entries_in_bucket(bucket)?;
        let mut removed = 0;
        for entry in entries {
            if let Some(current) = current_etags.get(&entry.object_key) {
                if current != &entry.etag {
                    self.store.delete_entry(bucket, &entry.object_key)?;
                    body_store::remove(std::path::Path::new(&entry.cache_path)).await;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            debug!("invalidated {} stale entries in bucket {}", removed, bucket);
        }
        Ok(removed)
    }

    /// LRU-by-insertion eviction: while `SUM(size) > max_size_bytes`,
    /// remove rows oldest-`cached_at`-first. No-op when the cap is
    /// disabled (`max_size_bytes <= 0`). The multi-row SQLite pass runs on
    /// a blocking-pool thread so it never stalls the async runtime.
    pub async fn evict(&self) -> Result<usize> {
        if self.max_size_bytes <= 0 {
            return Ok(0);
        }

        let max_size_bytes = self.max_size_bytes;
        let store = self.store.clone();
        let (removed, final_total, removed_paths) = tokio::task::spawn_blocking(move || -> Result<(usize, i64, Vec<String>)> {
            let mut total = store.total_size()?;
            if total <= max_size_bytes {
                return Ok((0, total, Vec::new()));
            }

            let candidates = store.entries_by_cached_at_asc()?;
            let mut removed = 0;
            let mut removed_paths = Vec::new();
            for entry in candidates {
                if total <= max_size_bytes {
                    break;
                }
                store.delete_entry(&entry.bucket_name, &entry.object_key)?;
                removed_paths.push(entry.cache_path);
                total -= entry.size;
                removed += 1;
            }
            Ok((removed, total, removed_paths))
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))??;

        for path in &removed_paths {
            body_store::remove(std::path::Path::new(path)).await;
        }

        if removed > 0 {
            info!("evicted {} entries, cache size now {} bytes", removed, final_total);
        }
        Ok(removed)
    }

    /// Deletes every row with `expires_at <= now` on a blocking-pool
    /// thread, then best-effort removes their body files.
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let store = self.store.clone();
        let expired = tokio::task::spawn_blocking(move || store.delete_expired(Utc::now()))
            .await
            .map_err(|e| Error::Internal(e.to_string()))??;

        for entry in &expired {
            body_store::remove(std::path::Path::new(&entry.cache_path)).await;
        }
        if !expired.is_empty() {
            debug!("cleaned up {} expired entries", expired.len());
        }
        Ok(expired.len())
    }

    /// Runs `VACUUM` on a blocking-pool thread.
    pub async fn vacuum(&self) -> Result<()> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.vacuum())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?
    }

    pub async fn clear_all(&self) -> Result<usize> {
        let entries = self.store.delete_all()?;
        for entry in &entries {
            body_store::remove(std::path::Path::new(&entry.cache_path)).await;
        }
        Ok(entries.len())
    }

    pub async fn clear_bucket(&self, bucket: &str) -> Result<usize> {
        let entries = self.store.delete_bucket(bucket)?;
        for entry in &entries {
            body_store::remove(std::path::Path::new(&entry.cache_path)).await;
        }
        Ok(entries.len())
    }

    pub async fn clear_key(&self, bucket: &str, key: &str) -> Result<usize> {
        match self.store.delete_entry(bucket, key)? {
            Some(entry) => {
                body_store::remove(std::path::Path::new(&entry.cache_path)).await;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Spawns the background maintenance loop: every `interval`, run
    /// `cleanup_expired` then `evict`, vacuuming if either removed rows.
    /// Stops when `cancel` is triggered. Grounded on the teacher's
    /// `cleanup.rs::cleanup_empty_directories` sleep-loop shape.
    pub fn start_maintenance(self: Arc<Self>, interval: std::time::Duration, cancel: CancellationToken) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("content cache maintenance loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let mut did_work = false;
                        match self.cleanup_expired().await {
                            Ok(n) if n > 0 => did_work = true,
                            Ok(_) => {}
                            Err(e) => warn!("cleanup_expired failed: {}", e),
                        }
                        match self.evict().await {
                            Ok(n) if n > 0 => did_work = true,
                            Ok(_) => {}
                            Err(e) => warn!("evict failed: {}", e),
                        }
                        if did_work {
                            if let Err(e) = self.vacuum().await {
                                warn!("vacuum failed: {}", e);
                            }
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use tempfile::tempdir;

    fn cache_with(max_size_mb: i64, ttl_minutes: i64, dir: &std::path::Path) -> ContentCache {
        let store = Arc::new(MetadataStore::open_in_memory().unwrap());
        let config = CacheConfig {
            db_path: PathBuf::from(":memory:"),
            dir: dir.to_path_buf(),
            ttl_minutes,
            cleanup_interval_minutes: 60,
            max_size_mb,
        };
        ContentCache::new(store, dir.to_path_buf(), &config)
    }

    #[tokio::test]
    async fn store_then_lookup_returns_entry_with_body_on_disk() {
        let dir = tempdir().unwrap();
        let cache = cache_with(0, 120, dir.path());

        let entry = cache
            .store("b", "k", b"payload", "text/plain", "etag1")
            .await
            .unwrap();

        let found = cache.lookup("b", "k").unwrap().unwrap();
        assert_eq!(found.etag, "etag1");
        assert!(std::path::Path::new(&entry.cache_path).starts_with(dir.path()));
        assert!(tokio::fs::metadata(&entry.cache_path).await.is_ok());
    }

    #[tokio::test]
    async fn cleanup_expired_removes_only_expired_rows() {
        let dir = tempdir().unwrap();
        let cache = cache_with(0, -1, dir.path()); // negative ttl => already expired
        cache.store("b", "stale", b"x", "text/plain", "e1").await.unwrap();

        let cache_fresh = cache_with(0, 120, dir.path());
        cache_fresh.store("b", "fresh", b"y", "text/plain", "e2").await.unwrap();

        let removed = cache.cleanup_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert!(cache.lookup("b", "stale").unwrap().is_none());
        assert!(cache.lookup("b", "fresh").unwrap().is_some());
    }

    #[tokio::test]
    async fn evict_removes_oldest_insertion_first_prefix() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MetadataStore::open_in_memory().unwrap());
        let config = CacheConfig {
            db_path: PathBuf::from(":memory:"),
            dir: dir.path().to_path_buf(),
            ttl_minutes: 120,
            cleanup_interval_minutes: 60,
            max_size_mb: 0,
        };
        let cache = ContentCache::new(store.clone(), dir.path().to_path_buf(), &config);

        let base = Utc::now();
        for (i, key) in ["k0", "k1", "k2", "k3"].iter().enumerate() {
            let entry = CacheEntry {
                bucket_name: "b".to_string(),
                object_key: key.to_string(),
                content_type: "text/plain".to_string(),
                size: 200,
                etag: format!("e{i}"),
                cache_path: dir.path().join(key).to_string_lossy().into_owned(),
                cached_at: base + chrono::Duration::minutes(i as i64),
                expires_at: base + chrono::Duration::minutes(120 + i as i64),
            };
            tokio::fs::write(&entry.cache_path, b"x").await.unwrap();
            store.upsert(&entry).unwrap();
        }

        let cache = ContentCache {
            max_size_bytes: 500,
            ..cache
        };

        let removed = cache.evict().await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.lookup("b", "k0").unwrap().is_none());
        assert!(cache.lookup("b", "k1").unwrap().is_none());
        assert!(cache.lookup("b", "k2").unwrap().is_some());
        assert!(cache.lookup("b", "k3").unwrap().is_some());
        assert_eq!(store.total_size().unwrap(), 400);
    }

    #[tokio::test]
    async fn invalidate_by_etags_removes_only_mismatched_keys() {
        let dir = tempdir().unwrap();
        let cache = cache_with(0, 120, dir.path());
        cache.store("b", "k1", b"a", "text/plain", "X").await.unwrap();
        cache.store("b", "k2", b"b", "text/plain", "Y").await.unwrap();

        let mut etags = HashMap::new();
        etags.insert("k1".to_string(), "X".to_string());
        etags.insert("k2".to_string(), "Z".to_string());

        let removed = cache.invalidate_by_etags("b", &etags).await.unwrap();
        assert_eq!(removed, 1);
        assert!(cache.lookup("b", "k1").unwrap().is_some());
        assert!(cache.lookup("b", "k2").unwrap().is_none());
    }
}
