//! Upstream store interface (component I): the object store this gateway
//! caches in front of. Generalizes the teacher's `storage::StorageBackend`
//! trait to the narrower surface the cache layer actually drives —
//! listing, fetching, and two flavors of put.

pub mod filesystem;

pub use filesystem::FilesystemUpstream;

use crate::error::Result;
use crate::models::{Bucket, ListObjectsResult, PutResult, UpstreamObject};
use async_trait::async_trait;

#[async_trait]
pub trait UpstreamStore: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<Bucket>>;

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Result<ListObjectsResult>;

    async fn get(&self, bucket: &str, key: &str) -> Result<UpstreamObject>;

    /// Unconditional write; overwrites any existing object at `key`. The
    /// body is fully buffered (spec requires the buffered form so the
    /// reader wrapping it for progress accounting can be seekable).
    async fn put(&self, bucket: &str, key: &str, content_type: &str, body: Vec<u8>) -> Result<PutResult>;

    /// Conditional write: fails with `Error::ObjectAlreadyExists` if an
    /// object already exists at `key`.
    async fn put_if_absent(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<PutResult>;
}
