//! Embedding stage: async Marengo jobs per remote video

use crate::config::EmbeddingSettings;
use crate::error::{PipelineError, Result};
use crate::inference::{AsyncInference, EmbeddingJobRequest};
use crate::metrics::{BatchStats, BatchSummary, ItemOutcome};
use crate::models::{EmbeddingOption, VideoEmbeddingSegment, VideoEmbeddings};
use crate::poller::{ensure_not_cancelled, poll_until_terminal, CancelSignal};
use crate::storage::{list_videos, s3_uri, ObjectStore, RemoteVideo};
use crate::store::{self, keyframe_file_name, record_file_name};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

/// Result document the service writes next to each job.
#[derive(Debug, Deserialize)]
struct EmbeddingOutput {
    data: Vec<VideoEmbeddingSegment>,
}

pub fn parse_embedding_output(bytes: &[u8]) -> Result<Vec<VideoEmbeddingSegment>> {
    let output: EmbeddingOutput = serde_json::from_slice(bytes)?;
    if output.data.is_empty() {
        return Err(PipelineError::ValidationError(
            "embedding output contains no segments".to_string(),
        ));
    }
    for segment in &output.data {
        segment.validate()?;
    }
    Ok(output.data)
}

pub struct EmbeddingGenerator {
    settings: EmbeddingSettings,
    bucket_owner: String,
    storage: Arc<dyn ObjectStore>,
    inference: Arc<dyn AsyncInference>,
    cancel: Option<CancelSignal>,
}

impl EmbeddingGenerator {
    pub fn new(
        settings: EmbeddingSettings,
        bucket_owner: impl Into<String>,
        storage: Arc<dyn ObjectStore>,
        inference: Arc<dyn AsyncInference>,
    ) -> Self {
        Self {
            settings,
            bucket_owner: bucket_owner.into(),
            storage,
            inference,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Process every remote video in order. A job the service reports as
    /// failed is counted and skipped; any other error, cancellation included,
    /// ends the run.
    pub async fn run(&self) -> Result<BatchSummary> {
        let bucket = &self.settings.target.bucket;
        let videos =
            list_videos(self.storage.as_ref(), bucket, &self.settings.source_prefix).await?;

        let mut stats = BatchStats::new("embeddings");
        for video in videos {
            ensure_not_cancelled(&self.cancel, &video.name)?;
            match self.process(&video).await {
                Ok(outcome) => stats.record(outcome),
                Err(e @ PipelineError::JobFailed { .. }) => {
                    error!("Skipping {}: {}", video.name, e);
                    stats.record(ItemOutcome::Failed);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(stats.finish())
    }

    pub async fn process(&self, video: &RemoteVideo) -> Result<ItemOutcome> {
        let video_name = video.name.as_str();
        let local_path = self.settings.output_dir.join(record_file_name(video_name));
        if store::exists(&local_path).await? {
            info!("Skipping {}, already processed", video_name);
            return Ok(ItemOutcome::Skipped);
        }

        let bucket = &self.settings.target.bucket;
        let video_uri = s3_uri(bucket, &video.key);
        info!("Generating embeddings for video: {}", video.key);

        let metadata = self.storage.head(bucket, &video.key).await?;

        let request = EmbeddingJobRequest {
            model_id: self.settings.model_id.clone(),
            video_uri: video_uri.clone(),
            bucket_owner: self.bucket_owner.clone(),
            options: EmbeddingOption::ALL.to_vec(),
            output_uri: format!("s3://{}/{}/", bucket, self.settings.destination_prefix),
        };
        ensure_not_cancelled(&self.cancel, video_name)?;
        let handle = self.inference.submit(&request).await?;
        info!("Job started with invocation ARN: {}", handle);

        let outcome = poll_until_terminal(
            self.inference.as_ref(),
            &handle,
            &self.settings.poll,
            self.cancel.clone(),
        )
        .await?;
        info!("Final job status: {:?} after {} checks", outcome.status, outcome.checks);

        let result_key = format!(
            "{}/{}/output.json",
            self.settings.destination_prefix,
            handle.invocation_id()
        );
        let segments = parse_embedding_output(&self.storage.get(bucket, &result_key).await?)?;

        let record = VideoEmbeddings::new(
            video_name,
            video_uri,
            format!("{}/{}", self.settings.cdn_base_url, keyframe_file_name(video_name)),
            metadata.size_bytes,
            metadata.content_type,
            segments,
        )?;

        store::write_record(&local_path, &record).await?;
        info!("Video embeddings written to: {}", local_path.display());
        Ok(ItemOutcome::Written)
    }
}
