//! video_search_prep - batch preparation of video search documents
//!
//! Four sequential stages share a `<video-base-name>.json` naming convention:
//! keyframe extraction (system `ffmpeg`), embedding generation (async Bedrock
//! jobs), analysis generation (synchronous Bedrock calls), and document
//! assembly joining the two records per video.

pub mod analysis;
pub mod assemble;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod ffmpeg;
pub mod inference;
pub mod keyframe;
pub mod metrics;
pub mod models;
pub mod poller;
pub mod retry;
pub mod storage;
pub mod store;

pub use analysis::AnalysisGenerator;
pub use assemble::DocumentAssembler;
pub use embeddings::EmbeddingGenerator;
pub use error::{PipelineError, Result};
pub use ffmpeg::{FfmpegCommand, FfmpegError};
pub use keyframe::{FfmpegGrabber, FrameGrabber, KeyframeConfig, KeyframeExtractor};
pub use metrics::{BatchSummary, ItemOutcome};
pub use models::{
    EmbeddingOption, OpenSearchDocument, VideoAnalysis, VideoEmbeddingSegment, VideoEmbeddings,
};
pub use poller::{ensure_not_cancelled, poll_until_terminal, CancelSignal, PollOutcome, PollPolicy};
pub use retry::{retry_throttled, RetryPolicy};
