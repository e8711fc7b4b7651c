//! UploadService (component G): buffers an incoming body, drives the
//! two-phase progress publish sequence through `ProgressBroker`, and
//! writes through to the upstream store. Grounded on the teacher's
//! `s3/handlers.rs::put_object` handler, generalized to the cache-aware,
//! progress-reporting write path spec.md §4.7 describes.

use crate::error::{Error, Result};
use crate::listing_cache::ListingCache;
use crate::models::{PutResult, UploadEvent, UploadPhase};
use crate::progress::reader::{self, ProgressCallback};
use crate::progress::ProgressBroker;
use crate::sanitize::sanitize_object_path;
use crate::upstream::UpstreamStore;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

pub struct UploadService {
    listing_cache: Arc<ListingCache>,
    upstream: Arc<dyn UpstreamStore>,
    broker: Arc<ProgressBroker>,
}

impl UploadService {
    pub fn new(listing_cache: Arc<ListingCache>, upstream: Arc<dyn UpstreamStore>, broker: Arc<ProgressBroker>) -> Self {
        Self {
            listing_cache,
            upstream,
            broker,
        }
    }

    pub async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
        overwrite: bool,
        upload_id: Option<&str>,
    ) -> Result<PutResult> {
        let key = sanitize_object_path(key).ok_or_else(|| Error::InvalidArgument("empty object key".into()))?;

        let body = match upload_id {
            Some(id) => self.read_with_progress(body, id).await?,
            None => body,
        };

        let result = if overwrite {
            self.upstream.put(bucket, &key, content_type, body).await?
        } else {
            self.upstream.put_if_absent(bucket, &key, content_type, body).await?
        };

        self.listing_cache.invalidate_objects(bucket).await;

        Ok(PutResult {
            etag: result.etag,
            size: result.size,
        })
    }

    /// Phase-2 (`uploading`) progress: reads `body` back through
    /// [`crate::progress::reader`], forwarding each byte count from the
    /// reader's synchronous callback over an unbounded channel, then
    /// awaits one broker publish per count in the order received. Driving
    /// the publish from this async path — instead of spawning a detached
    /// task per callback invocation — keeps `uploading` events published,
    /// in order, strictly before this function returns, and therefore
    /// strictly before the caller's `complete` event.
    async fn read_with_progress(&self, body: Vec<u8>, upload_id: &str) -> Result<Vec<u8>> {
        let total = body.len() as u64;
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let cb: ProgressCallback = Arc::new(move |n| {
            let _ = tx.send(n as u64);
        });

        let mut progress_reader = reader::wrap(std::io::Cursor::new(body), Some(cb))?;
        let mut buf = Vec::new();
        progress_reader.read_to_end(&mut buf).await?;
        drop(progress_reader);

        while let Some(processed) = rx.recv().await {
            self.broker
                .publish(
                    upload_id,
                    UploadEvent::progress(upload_id, UploadPhase::Uploading, processed, Some(total)),
                )
                .await;
        }

        Ok(buf)
    }

    /// Creates a zero-byte `application/x-directory` marker object.
    pub async fn create_directory(&self, bucket: &str, path: &str) -> Result<()> {
        let sanitized = sanitize_object_path(path).ok_or_else(|| Error::InvalidArgument("empty directory path".into()))?;
        let key = format!("{sanitized}/");

        self.upstream.put(bucket, &key, "application/x-directory", Vec::new()).await?;
        self.listing_cache.invalidate_objects(bucket).await;
        Ok(())
    }
}
