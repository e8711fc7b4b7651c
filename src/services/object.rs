//! ObjectService (component G): listing read path with etag-driven
//! invalidation of the content cache, mirroring the teacher's
//! `s3/handlers.rs::list_objects` handler generalized onto the listing
//! cache + content cache pair.

use crate::content_cache::ContentCache;
use crate::error::Result;
use crate::listing_cache::ListingCache;
use crate::models::{ListObjectsParams, ListObjectsResult};
use crate::upstream::UpstreamStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

pub struct ObjectService {
    listing_cache: Arc<ListingCache>,
    content_cache: Arc<ContentCache>,
    upstream: Arc<dyn UpstreamStore>,
}

impl ObjectService {
    pub fn new(listing_cache: Arc<ListingCache>, content_cache: Arc<ContentCache>, upstream: Arc<dyn UpstreamStore>) -> Self {
        Self {
            listing_cache,
            content_cache,
            upstream,
        }
    }

    pub async fn get_objects(&self, bucket: &str, params: &ListObjectsParams) -> Result<ListObjectsResult> {
        let prefix = params.prefix.as_deref().unwrap_or("");

        if let Some(cached) = self.listing_cache.get_objects(bucket, Some(prefix)).await {
            return Ok((*cached).clone());
        }

        let result = self
            .upstream
            .list_objects(bucket, prefix, params.delimiter.as_deref())
            .await?;
        self.listing_cache.set_objects(bucket, Some(prefix), result.clone()).await;

        let etag_map: HashMap<String, String> = result
            .objects
            .iter()
            .filter(|o| !o.etag.is_empty())
            .map(|o| (o.key.clone(), o.etag.clone()))
            .collect();

        if !etag_map.is_empty() {
            if let Err(e) = self.content_cache.invalidate_by_etags(bucket, &etag_map).await {
                error!("invalidate_by_etags failed for bucket {}: {}", bucket, e);
            }
        }

        Ok(result)
    }
}
