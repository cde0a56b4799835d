//! Persisted record types
//!
//! Field names match the JSON artifacts consumed by the search index, so the
//! acronym fields (`s3URI`, `keyframeURL`) are renamed explicitly.

use crate::error::{PipelineError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Modality a segment vector was computed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingOption {
    VisualImage,
    VisualText,
    Audio,
}

impl EmbeddingOption {
    pub const ALL: [EmbeddingOption; 3] = [
        EmbeddingOption::VisualImage,
        EmbeddingOption::VisualText,
        EmbeddingOption::Audio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingOption::VisualImage => "visual-image",
            EmbeddingOption::VisualText => "visual-text",
            EmbeddingOption::Audio => "audio",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoEmbeddingSegment {
    pub embedding: Vec<f64>,
    pub embedding_option: EmbeddingOption,
    pub start_sec: f64,
    pub end_sec: f64,
}

impl VideoEmbeddingSegment {
    pub fn new(
        embedding: Vec<f64>,
        embedding_option: EmbeddingOption,
        start_sec: f64,
        end_sec: f64,
    ) -> Result<Self> {
        let segment = Self {
            embedding,
            embedding_option,
            start_sec,
            end_sec,
        };
        segment.validate()?;
        Ok(segment)
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding.is_empty() {
            return Err(PipelineError::ValidationError(
                "embedding: vector is empty".to_string(),
            ));
        }
        if !self.start_sec.is_finite() || !self.end_sec.is_finite() || self.start_sec < 0.0 {
            return Err(PipelineError::ValidationError(format!(
                "startSec/endSec: invalid offsets {}..{}",
                self.start_sec, self.end_sec
            )));
        }
        if self.start_sec > self.end_sec {
            return Err(PipelineError::ValidationError(format!(
                "startSec {} is after endSec {}",
                self.start_sec, self.end_sec
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoEmbeddings {
    pub video_name: String,
    #[serde(rename = "s3URI")]
    pub s3_uri: String,
    #[serde(rename = "keyframeURL")]
    pub keyframe_url: String,
    pub date_created: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub duration_sec: f64,
    pub content_type: String,
    pub embeddings: Vec<VideoEmbeddingSegment>,
}

impl VideoEmbeddings {
    /// Build a record, deriving `durationSec` from the segments.
    pub fn new(
        video_name: impl Into<String>,
        s3_uri: impl Into<String>,
        keyframe_url: impl Into<String>,
        size_bytes: u64,
        content_type: impl Into<String>,
        embeddings: Vec<VideoEmbeddingSegment>,
    ) -> Result<Self> {
        let record = Self {
            video_name: video_name.into(),
            s3_uri: s3_uri.into(),
            keyframe_url: keyframe_url.into(),
            date_created: timestamp_now(),
            size_bytes,
            duration_sec: duration_from_segments(&embeddings),
            content_type: content_type.into(),
            embeddings,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<()> {
        require_non_empty("videoName", &self.video_name)?;
        require_non_empty("s3URI", &self.s3_uri)?;
        for segment in &self.embeddings {
            segment.validate()?;
        }
        Ok(())
    }
}

/// End of the last segment, rounded to two decimals.
pub fn duration_from_segments(segments: &[VideoEmbeddingSegment]) -> f64 {
    segments
        .last()
        .map(|s| (s.end_sec * 100.0).round() / 100.0)
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAnalysis {
    pub video_name: String,
    #[serde(rename = "s3URI")]
    pub s3_uri: String,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub date_created: String,
}

impl VideoAnalysis {
    pub fn new(
        video_name: impl Into<String>,
        s3_uri: impl Into<String>,
        title: impl Into<String>,
        summary: impl Into<String>,
        keywords: Vec<String>,
    ) -> Result<Self> {
        let record = Self {
            video_name: video_name.into(),
            s3_uri: s3_uri.into(),
            title: title.into(),
            summary: summary.into(),
            keywords: dedup_keywords(keywords),
            date_created: timestamp_now(),
        };
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<()> {
        require_non_empty("videoName", &self.video_name)?;
        require_non_empty("s3URI", &self.s3_uri)?;
        Ok(())
    }
}

/// Drop blank and repeated keywords, keeping first-seen order.
pub fn dedup_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSearchDocument {
    pub video_name: String,
    #[serde(rename = "s3URI")]
    pub s3_uri: String,
    #[serde(rename = "keyframeURL")]
    pub keyframe_url: String,
    pub title: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub date_created: String,
    pub content_type: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub duration_sec: f64,
    pub embeddings: Vec<VideoEmbeddingSegment>,
}

impl OpenSearchDocument {
    /// Join the two per-video records.
    ///
    /// Storage, keyframe and vector fields come from `embeddings`; identity and
    /// descriptive text come from `analysis`. Both must name the same video.
    pub fn merge(
        embeddings: VideoEmbeddings,
        analysis: VideoAnalysis,
        date_created: String,
    ) -> Result<Self> {
        if embeddings.video_name != analysis.video_name {
            return Err(PipelineError::ValidationError(format!(
                "videoName mismatch: embeddings record is for {}, analysis record is for {}",
                embeddings.video_name, analysis.video_name
            )));
        }

        Ok(Self {
            video_name: analysis.video_name,
            s3_uri: analysis.s3_uri,
            keyframe_url: embeddings.keyframe_url,
            title: analysis.title,
            summary: analysis.summary,
            keywords: analysis.keywords,
            date_created,
            content_type: embeddings.content_type,
            size_bytes: embeddings.size_bytes,
            duration_sec: embeddings.duration_sec,
            embeddings: embeddings.embeddings,
        })
    }
}

/// UTC wall-clock in the `dateCreated` format.
pub fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S UTC").to_string()
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PipelineError::ValidationError(format!("{}: must not be empty", field)));
    }
    Ok(())
}
