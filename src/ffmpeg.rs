//! FFmpeg command wrapper utilities

use std::path::Path;
use std::process::{Command, Output, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FfmpegError {
    #[error("FFmpeg not found: {0}")]
    NotInstalled(String),

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Argument builder for a single `ffmpeg` invocation.
///
/// Argument order matters: options pushed before `input` apply to the input
/// (e.g. fast seek), options pushed after apply to the output.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    binary: String,
    args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new() -> Self {
        Self::with_binary("ffmpeg")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            args: vec!["-hide_banner".to_string(), "-loglevel".to_string(), "error".to_string()],
        }
    }

    /// Input-side seek. Must be called before `input` to get a fast seek.
    pub fn seek(mut self, timestamp: &str) -> Self {
        self.args.push("-ss".to_string());
        self.args.push(timestamp.to_string());
        self
    }

    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push("-i".to_string());
        self.args.push(path.as_ref().display().to_string());
        self
    }

    pub fn frames(mut self, count: u32) -> Self {
        self.args.push("-frames:v".to_string());
        self.args.push(count.to_string());
        self
    }

    /// Never overwrite an existing output file.
    pub fn no_overwrite(mut self) -> Self {
        self.args.push("-n".to_string());
        self
    }

    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push(path.as_ref().display().to_string());
        self
    }

    pub fn to_args(&self) -> &[String] {
        &self.args
    }

    pub fn execute(self) -> Result<Output, FfmpegError> {
        if !is_installed(&self.binary) {
            return Err(FfmpegError::NotInstalled(self.binary));
        }

        let output = Command::new(&self.binary)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| FfmpegError::ExecutionFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FfmpegError::ExecutionFailed(stderr.trim().to_string()));
        }

        Ok(output)
    }
}

impl Default for FfmpegCommand {
    fn default() -> Self {
        Self::new()
    }
}

fn is_installed(binary: &str) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}
