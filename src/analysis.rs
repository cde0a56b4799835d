//! Analysis stage: title, summary and keywords per remote video

use crate::config::AnalysisSettings;
use crate::error::{PipelineError, Result};
use crate::inference::{TextInference, TextRequest};
use crate::metrics::{BatchStats, BatchSummary, ItemOutcome};
use crate::models::VideoAnalysis;
use crate::retry::retry_throttled;
use crate::poller::{ensure_not_cancelled, CancelSignal};
use crate::storage::{list_videos, s3_uri, ObjectStore, RemoteVideo};
use crate::store::{self, record_file_name};
use std::sync::Arc;
use tracing::info;

pub const TITLE_PROMPT: &str = "Generate a descriptive title for the video. \
Only provide the title in the response; no pre-text, post-text, or quotation marks.";

pub const SUMMARY_PROMPT: &str = "Generate a detailed summary of the video. \
Consider the visual, audio, textual, spatial, and temporal aspects in the video. \
Only provide the summary in the response; no pre-text, post-text, or quotation marks.";

pub const KEYWORDS_PROMPT: &str = "Extract keywords from the video content as a list of strings, \
for example: [\"keyword1\", \"keyword2\", \"keyword3\", \"keyword4\"]. \
Only provide the list keywords in the response; no pre-text, post-text.";

/// Parse the keyword response as a JSON array of strings.
///
/// Surrounding whitespace and a Markdown code fence are tolerated.
pub fn parse_keywords(response: &str) -> Result<Vec<String>> {
    let mut text = response.trim();
    if let Some(fenced) = text.strip_prefix("```") {
        text = fenced.trim_start_matches("json").trim_end_matches("```").trim();
    }
    serde_json::from_str::<Vec<String>>(text).map_err(|e| {
        PipelineError::ValidationError(format!(
            "keywords: expected a JSON string array ({}): {:?}",
            e, response
        ))
    })
}

pub struct AnalysisGenerator {
    settings: AnalysisSettings,
    bucket_owner: String,
    storage: Arc<dyn ObjectStore>,
    inference: Arc<dyn TextInference>,
    cancel: Option<CancelSignal>,
}

impl AnalysisGenerator {
    pub fn new(
        settings: AnalysisSettings,
        bucket_owner: impl Into<String>,
        storage: Arc<dyn ObjectStore>,
        inference: Arc<dyn TextInference>,
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

    /// Process every remote video in order; the first error ends the run.
    pub async fn run(&self) -> Result<BatchSummary> {
        let videos = list_videos(
            self.storage.as_ref(),
            &self.settings.target.bucket,
            &self.settings.source_prefix,
        )
        .await?;

        let mut stats = BatchStats::new("analyses");
        for video in videos {
            ensure_not_cancelled(&self.cancel, &video.name)?;
            stats.record(self.process(&video).await?);
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

        let video_uri = s3_uri(&self.settings.target.bucket, &video.key);
        info!("Generating analysis for video: {}", video.key);

        let title = self.ask("title", TITLE_PROMPT, &video_uri).await?;
        let summary = self.ask("summary", SUMMARY_PROMPT, &video_uri).await?;
        let keywords = parse_keywords(&self.ask("keywords", KEYWORDS_PROMPT, &video_uri).await?)?;

        let record =
            VideoAnalysis::new(video_name, video_uri, title.trim(), summary.trim(), keywords)?;
        store::write_record(&local_path, &record).await?;
        info!("Video analysis written to: {}", local_path.display());
        Ok(ItemOutcome::Written)
    }

    async fn ask(&self, operation: &str, prompt: &str, video_uri: &str) -> Result<String> {
        let request = TextRequest {
            model_id: self.settings.model_id.clone(),
            prompt: prompt.to_string(),
            video_uri: video_uri.to_string(),
            bucket_owner: self.bucket_owner.clone(),
            temperature: self.settings.temperature,
        };
        retry_throttled(&self.settings.retry, operation, || {
            self.inference.invoke(&request)
        })
        .await
    }
}
