//! Reference [`UpstreamStore`] implementation backed by the local
//! filesystem. Generalizes the teacher's `FileSystemBackend`: one file
//! per object under `base_path/bucket/key`, with a `.meta` JSON sidecar
//! carrying content type and etag (the teacher uses the same sidecar-file
//! idiom for `ObjectMetadata`, just swapped from `md5` to `sha2` since the
//! rest of this crate already depends on it for cache-path hashing).

use super::UpstreamStore;
use crate::body_store;
use crate::error::{Error, Result};
use crate::models::{Bucket, ListObjectsResult, ObjectSummary, PutResult, UpstreamObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

#[derive(Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    etag: String,
    last_modified: DateTime<Utc>,
}

pub struct FilesystemUpstream {
    base_path: PathBuf,
}

impl FilesystemUpstream {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.bucket_path(bucket).join(key)
    }

    fn sidecar_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.object_path(bucket, key);
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".meta");
        path.set_file_name(name);
        path
    }

    async fn load_sidecar(&self, bucket: &str, key: &str) -> Option<Sidecar> {
        let raw = fs::read(self.sidecar_path(bucket, key)).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }

    async fn save_sidecar(&self, bucket: &str, key: &str, sidecar: &Sidecar) -> Result<()> {
        let json = serde_json::to_vec(sidecar).map_err(|e| Error::Internal(e.to_string()))?;
        body_store::write(&self.sidecar_path(bucket, key), &json).await?;
        Ok(())
    }

    async fn put_inner(&self, bucket: &str, key: &str, content_type: &str, body: Vec<u8>) -> Result<PutResult> {
        let etag = format!("{:x}", Sha256::digest(&body));
        let path = self.object_path(bucket, key);
        body_store::write(&path, &body).await?;

        self.save_sidecar(
            bucket,
            key,
            &Sidecar {
                content_type: content_type.to_string(),
                etag: etag.clone(),
                last_modified: Utc::now(),
            },
        )
        .await?;

        info!("upstream put {}/{} ({} bytes)", bucket, key, body.len());
        Ok(PutResult {
            etag,
            size: body.len() as i64,
        })
    }

    async fn walk_keys(&self, root: &Path, prefix: &Path, keys: &mut Vec<String>) -> Result<()> {
        let mut entries = match fs::read_dir(root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                Box::pin(self.walk_keys(&path, prefix, keys)).await?;
            } else {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.ends_with(".meta") {
                    continue;
                }
                if let Ok(relative) = path.strip_prefix(prefix) {
                    keys.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UpstreamStore for FilesystemUpstream {
    async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        let mut buckets = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                let metadata = entry.metadata().await?;
                let created_at = metadata
                    .created()
                    .or_else(|_| metadata.modified())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                buckets.push(Bucket {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    created_at,
                });
            }
        }
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Result<ListObjectsResult> {
        let root = self.bucket_path(bucket);
        let mut keys = Vec::new();
        self.walk_keys(&root, &root, &mut keys).await?;

        let mut objects = Vec::new();
        let mut common_prefixes: BTreeSet<String> = BTreeSet::new();

        for key in keys {
            if !key.starts_with(prefix) {
                continue;
            }

            if let Some(delim) = delimiter {
                let rest = &key[prefix.len()..];
                if let Some(idx) = rest.find(delim) {
                    let boundary = prefix.len() + idx + delim.len();
                    common_prefixes.insert(key[..boundary].to_string());
                    continue;
                }
            }

            let object_path = root.join(&key);
            let metadata = fs::metadata(&object_path).await?;
            let sidecar = self.load_sidecar(bucket, &key).await;
            let last_modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            objects.push(ObjectSummary {
                key: key.clone(),
                size: metadata.len() as i64,
                etag: sidecar.map(|s| s.etag).unwrap_or_default(),
                last_modified,
            });
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(ListObjectsResult {
            objects,
            common_prefixes: common_prefixes.into_iter().collect(),
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<UpstreamObject> {
        let path = self.object_path(bucket, key);
        let body = fs::read(&path)
            .await
            .map_err(|_| Error::UpstreamUnavailable(format!("no such object {bucket}/{key}")))?;
        let sidecar = self.load_sidecar(bucket, key).await;

        let (content_type, etag) = match sidecar {
            Some(s) => (s.content_type, s.etag),
            None => ("application/octet-stream".to_string(), format!("{:x}", Sha256::digest(&body))),
        };

        Ok(UpstreamObject {
            size: body.len() as i64,
            body,
            content_type,
            etag,
        })
    }

    async fn put(&self, bucket: &str, key: &str, content_type: &str, body: Vec<u8>) -> Result<PutResult> {
        self.put_inner(bucket, key, content_type, body).await
    }

    async fn put_if_absent(&self, bucket: &str, key: &str, content_type: &str, body: Vec<u8>) -> Result<PutResult> {
        if fs::metadata(self.object_path(bucket, key)).await.is_ok() {
            return Err(Error::ObjectAlreadyExists);
        }
        self.put_inner(bucket, key, content_type, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn put_then_get_roundtrips_body_and_content_type() {
        let dir = tempdir().unwrap();
        let store = FilesystemUpstream::new(dir.path().to_path_buf()).unwrap();

        store.put("b", "k.txt", "text/plain", b"hello".to_vec()).await.unwrap();
        let obj = store.get("b", "k.txt").await.unwrap();

        assert_eq!(obj.body, b"hello");
        assert_eq!(obj.content_type, "text/plain");
        assert_eq!(obj.size, 5);
    }

    #[tokio::test]
    async fn put_if_absent_rejects_existing_key() {
        let dir = tempdir().unwrap();
        let store = FilesystemUpstream::new(dir.path().to_path_buf()).unwrap();

        store.put_if_absent("b", "k", "text/plain", b"a".to_vec()).await.unwrap();
        let err = store
            .put_if_absent("b", "k", "text/plain", b"b".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ObjectAlreadyExists));
    }

    #[tokio::test]
    async fn list_objects_groups_by_delimiter_into_common_prefixes() {
        let dir = tempdir().unwrap();
        let store = FilesystemUpstream::new(dir.path().to_path_buf()).unwrap();

        store.put("b", "a/one.txt", "text/plain", b"1".to_vec()).await.unwrap();
        store.put("b", "a/two.txt", "text/plain", b"2".to_vec()).await.unwrap();
        store.put("b", "root.txt", "text/plain", b"3".to_vec()).await.unwrap();

        let result = store.list_objects("b", "", Some("/")).await.unwrap();

        assert_eq!(result.common_prefixes, vec!["a/".to_string()]);
        assert_eq!(result.objects.len(), 1);
        assert_eq!(result.objects[0].key, "root.txt");
    }

    #[tokio::test]
    async fn list_buckets_returns_created_directories() {
        let dir = tempdir().unwrap();
        let store = FilesystemUpstream::new(dir.path().to_path_buf()).unwrap();
        store.put("bucket-a", "k", "text/plain", b"x".to_vec()).await.unwrap();

        let buckets = store.list_buckets().await.unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].name, "bucket-a");
    }
}
