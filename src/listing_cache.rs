//! In-memory listing cache (component D): short-TTL `moka` caches over
//! the upstream store's bucket and object listings. Grounded on the
//! teacher's `cache.rs::CacheManager` invalidation methods
//! (`invalidate_bucket_cache`/`invalidate_pattern`), generalized from
//! Redis key deletion to `moka`'s in-process eviction (dependency
//! adopted from `harborgrid-justin-caddy/Cargo.toml`, which already
//! pulls in `moka` for this exact role).

use crate::models::{Bucket, ListObjectsResult};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const BUCKETS_KEY: &str = "__buckets__";

pub struct ListingCache {
    buckets: Cache<&'static str, Arc<Vec<Bucket>>>,
    objects: Cache<String, Arc<ListObjectsResult>>,
}

impl ListingCache {
    pub fn new(buckets_ttl: Duration, objects_ttl: Duration) -> Self {
        Self {
            buckets: Cache::builder().time_to_live(buckets_ttl).max_capacity(1).build(),
            objects: Cache::builder().time_to_live(objects_ttl).max_capacity(10_000).build(),
        }
    }

    pub async fn get_buckets(&self) -> Option<Arc<Vec<Bucket>>> {
        self.buckets.get(&BUCKETS_KEY).await
    }

    pub async fn set_buckets(&self, buckets: Vec<Bucket>) {
        self.buckets.insert(BUCKETS_KEY, Arc::new(buckets)).await;
    }

    pub async fn invalidate_buckets(&self) {
        self.buckets.invalidate(&BUCKETS_KEY).await;
        debug!("invalidated bucket listing cache");
    }

    pub async fn get_objects(&self, bucket: &str, prefix: Option<&str>) -> Option<Arc<ListObjectsResult>> {
        self.objects.get(&objects_key(bucket, prefix)).await
    }

    pub async fn set_objects(&self, bucket: &str, prefix: Option<&str>, result: ListObjectsResult) {
        self.objects
            .insert(objects_key(bucket, prefix), Arc::new(result))
            .await;
    }

    /// Invalidates every cached listing for `bucket`, across all prefixes.
    /// `moka` has no prefix-delete primitive, so this walks the live
    /// entries and removes matches — mirrors the teacher's
    /// `invalidate_pattern` doing a `SCAN` over Redis keys.
    pub async fn invalidate_objects(&self, bucket: &str) {
        let prefix = format!("{bucket}:");
        let keys: Vec<String> = self
            .objects
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| (*k).clone())
            .collect();
        for key in keys {
            self.objects.invalidate(&key).await;
        }
        debug!("invalidated object listing cache for bucket {}", bucket);
    }

    pub async fn invalidate_all_objects(&self) {
        self.objects.invalidate_all();
    }

    pub async fn invalidate_all(&self) {
        self.invalidate_buckets().await;
        self.invalidate_all_objects().await;
    }

    /// Forces pending eviction work to run; exposed for tests and for an
    /// optional periodic sweep alongside the content cache's maintenance
    /// loop.
    pub async fn run_pending_tasks(&self) {
        self.buckets.run_pending_tasks().await;
        self.objects.run_pending_tasks().await;
    }
}

fn objects_key(bucket: &str, prefix: Option<&str>) -> String {
    format!("{bucket}:{}", prefix.unwrap_or(""))
}
