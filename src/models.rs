use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted content-cache row: `(bucket_name, object_key)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub bucket_name: String,
    pub object_key: String,
    pub content_type: String,
    pub size: i64,
    pub etag: String,
    pub cache_path: String,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// `(bucket_name PRIMARY KEY, public_url)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSettings {
    pub bucket_name: String,
    pub public_url: Option<String>,
}

/// A bucket as reported by the upstream store's `list_buckets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A single object entry in a listing result, as reported upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListObjectsResult {
    pub objects: Vec<ObjectSummary>,
    pub common_prefixes: Vec<String>,
}

/// Phase of an upload as observed by a progress subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    Receiving,
    Uploading,
    Complete,
    Error,
}

/// A single event published to an upload's subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadEvent {
    pub upload_id: String,
    pub phase: UploadPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_processed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<UploadResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl UploadEvent {
    pub fn progress(upload_id: &str, phase: UploadPhase, bytes_processed: u64, total_bytes: Option<u64>) -> Self {
        Self {
            upload_id: upload_id.to_string(),
            phase,
            bytes_processed: Some(bytes_processed),
            total_bytes,
            result: None,
            error_message: None,
        }
    }

    pub fn complete(upload_id: &str, result: UploadResult) -> Self {
        Self {
            upload_id: upload_id.to_string(),
            phase: UploadPhase::Complete,
            bytes_processed: None,
            total_bytes: None,
            result: Some(result),
            error_message: None,
        }
    }

    pub fn error(upload_id: &str, message: impl Into<String>) -> Self {
        Self {
            upload_id: upload_id.to_string(),
            phase: UploadPhase::Error,
            bytes_processed: None,
            total_bytes: None,
            result: None,
            error_message: Some(message.into()),
        }
    }

    /// The SSE `event:` name for this event's phase.
    pub fn event_name(&self) -> &'static str {
        match self.phase {
            UploadPhase::Receiving | UploadPhase::Uploading => "progress",
            UploadPhase::Complete => "complete",
            UploadPhase::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, UploadPhase::Complete | UploadPhase::Error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    pub key: String,
    pub size: u64,
    pub etag: String,
}

/// A single object fetched from the upstream store, ready to be cached.
pub struct UpstreamObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub size: i64,
    pub etag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutResult {
    pub etag: String,
    pub size: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListObjectsParams {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
}

/// Returned by `ContentService::get_content`: an opened handle to the
/// object's bytes, always backed by the on-disk cache file (fetched from
/// upstream and written through on a miss).
pub struct ObjectContent {
    pub body: tokio::fs::File,
    pub content_type: String,
    pub size: i64,
    pub etag: String,
    pub cache_hit: bool,
}
