//! Keyframe extraction via FFmpeg
//!
//! One still per local video, taken at a fixed offset with an input-side
//! (fast) seek. Existing images are never regenerated.

use crate::error::Result;
use crate::ffmpeg::{FfmpegCommand, FfmpegError};
use crate::metrics::{BatchStats, BatchSummary, ItemOutcome};
use crate::poller::{ensure_not_cancelled, CancelSignal};
use crate::storage::VIDEO_EXTENSION;
use crate::store::{has_extension, keyframe_file_name};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Produces a single still image from a video.
pub trait FrameGrabber: Send + Sync {
    fn grab(
        &self,
        input: &Path,
        timestamp: &str,
        output: &Path,
    ) -> std::result::Result<(), FfmpegError>;
}

/// Shells out to the system `ffmpeg` binary.
pub struct FfmpegGrabber {
    binary: String,
}

impl FfmpegGrabber {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for FfmpegGrabber {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FrameGrabber for FfmpegGrabber {
    fn grab(
        &self,
        input: &Path,
        timestamp: &str,
        output: &Path,
    ) -> std::result::Result<(), FfmpegError> {
        FfmpegCommand::with_binary(self.binary.as_str())
            .seek(timestamp)
            .input(input)
            .frames(1)
            .no_overwrite()
            .output(output)
            .execute()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct KeyframeConfig {
    pub videos_dir: PathBuf,
    pub keyframes_dir: PathBuf,
    /// HH:MM:SS offset of the extracted frame
    pub timestamp: String,
    pub video_extension: String,
}

impl Default for KeyframeConfig {
    fn default() -> Self {
        Self {
            videos_dir: PathBuf::from("videos"),
            keyframes_dir: PathBuf::from("keyframes"),
            timestamp: "00:00:02".to_string(),
            video_extension: VIDEO_EXTENSION.to_string(),
        }
    }
}

pub struct KeyframeExtractor<G: FrameGrabber = FfmpegGrabber> {
    config: KeyframeConfig,
    grabber: G,
    cancel: Option<CancelSignal>,
}

impl<G: FrameGrabber> KeyframeExtractor<G> {
    pub fn new(config: KeyframeConfig, grabber: G) -> Self {
        Self {
            config,
            grabber,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Extract one frame unless `output` already exists.
    pub fn extract(&self, input: &Path, output: &Path) -> Result<ItemOutcome> {
        if output.exists() {
            info!("Skipping {}, keyframe already exists", input.display());
            return Ok(ItemOutcome::Skipped);
        }

        info!(
            "Extracting keyframe from {} at {} to {}",
            input.display(),
            self.config.timestamp,
            output.display()
        );
        self.grabber.grab(input, &self.config.timestamp, output)?;
        Ok(ItemOutcome::Written)
    }

    /// Process every video in the videos directory. A failing file is logged
    /// and counted; the rest of the batch still runs. Cancellation stops the
    /// batch before the next file.
    pub fn run(&self) -> Result<BatchSummary> {
        std::fs::create_dir_all(&self.config.keyframes_dir)?;

        let mut videos: Vec<PathBuf> = std::fs::read_dir(&self.config.videos_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_extension(path, &self.config.video_extension))
            .collect();
        videos.sort();

        let mut stats = BatchStats::new("keyframes");
        for video in videos {
            let name = video
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            ensure_not_cancelled(&self.cancel, &name)?;
            let output = self.config.keyframes_dir.join(keyframe_file_name(&name));

            match self.extract(&video, &output) {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    error!("Keyframe extraction failed for {}: {}", video.display(), e);
                    stats.record(ItemOutcome::Failed);
                }
            }
        }

        Ok(stats.finish())
    }
}
