//! Remote object storage (S3)
//!
//! Stateless helpers over a bucket: list video objects under a prefix, read
//! object metadata, and fetch result blobs written by the inference service.

use crate::error::{PipelineError, Result};
use crate::store::has_extension;
use aws_sdk_s3::Client;
use tracing::debug;

/// Matched case-insensitively, same rule as local video files.
pub const VIDEO_EXTENSION: &str = "mp4";

/// Size and content type reported by a head request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub size_bytes: u64,
    pub content_type: String,
}

/// A video object: the full key for remote calls, the base name for local records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVideo {
    pub key: String,
    pub name: String,
}

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// All keys under `prefix`, across pages.
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMetadata>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

/// Video objects under `prefix`, nested keys included.
pub async fn list_videos(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<RemoteVideo>> {
    let keys = store.list_keys(bucket, prefix).await?;
    let videos = videos_from_keys(&keys);
    debug!("Found {} videos under s3://{}/{}", videos.len(), bucket, prefix);
    Ok(videos)
}

pub fn videos_from_keys(keys: &[String]) -> Vec<RemoteVideo> {
    keys.iter()
        .filter(|key| has_extension(key.as_str(), VIDEO_EXTENSION))
        .filter_map(|key| {
            let name = key.rsplit('/').next().filter(|n| !n.is_empty())?;
            Some(RemoteVideo {
                key: key.clone(),
                name: name.to_string(),
            })
        })
        .collect()
}

pub fn s3_uri(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key)
}

pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn from_region(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Self::new(Client::new(&config))
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| PipelineError::StorageError(e.to_string()))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                PipelineError::StorageError(format!("head {}: {}", s3_uri(bucket, key), e))
            })?;

        Ok(ObjectMetadata {
            size_bytes: response.content_length().unwrap_or(0).max(0) as u64,
            content_type: response
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string(),
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                PipelineError::StorageError(format!("get {}: {}", s3_uri(bucket, key), e))
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| PipelineError::StorageError(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}
