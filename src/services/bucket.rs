//! BucketService (component G): cache-aside over the listing cache's
//! bucket slot, grounded on the teacher's `s3/handlers.rs::list_buckets`.

use crate::error::Result;
use crate::listing_cache::ListingCache;
use crate::models::Bucket;
use crate::upstream::UpstreamStore;
use std::sync::Arc;

pub struct BucketService {
    listing_cache: Arc<ListingCache>,
    upstream: Arc<dyn UpstreamStore>,
}

impl BucketService {
    pub fn new(listing_cache: Arc<ListingCache>, upstream: Arc<dyn UpstreamStore>) -> Self {
        Self { listing_cache, upstream }
    }

    pub async fn get_buckets(&self) -> Result<Vec<Bucket>> {
        if let Some(cached) = self.listing_cache.get_buckets().await {
            return Ok((*cached).clone());
        }

        let buckets = self.upstream.list_buckets().await?;
        self.listing_cache.set_buckets(buckets.clone()).await;
        Ok(buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::FilesystemUpstream;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn get_buckets_caches_after_first_fetch() {
        let dir = tempdir().unwrap();
        let upstream: Arc<dyn UpstreamStore> = Arc::new(FilesystemUpstream::new(dir.path().to_path_buf()).unwrap());
        upstream.put("b1", "k", "text/plain", b"x".to_vec()).await.unwrap();

        let listing_cache = Arc::new(ListingCache::new(Duration::from_secs(60), Duration::from_secs(60)));
        let svc = BucketService::new(listing_cache.clone(), upstream.clone());

        let first = svc.get_buckets().await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(listing_cache.get_buckets().await.is_some());

        upstream.put("b2", "k", "text/plain", b"y".to_vec()).await.unwrap();
        let second = svc.get_buckets().await.unwrap();
        assert_eq!(second.len(), 1); // still cached, upstream change not yet visible
    }
}
