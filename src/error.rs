use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Throttled by inference service: {0}")]
    Throttled(String),

    #[error("Inference request failed: {0}")]
    InferenceError(String),

    #[error("Storage request failed: {0}")]
    StorageError(String),

    #[error("Async job {job} failed: {message}")]
    JobFailed { job: String, message: String },

    #[error("Async job {job} still running after {waited:?}")]
    JobTimeout { job: String, waited: Duration },

    #[error("Async job {0} polling cancelled")]
    Cancelled(String),

    #[error("Missing configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] crate::ffmpeg::FfmpegError),
}

impl PipelineError {
    /// Rate-limit rejections are the only errors worth retrying.
    pub fn is_throttling(&self) -> bool {
        matches!(self, PipelineError::Throttled(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
