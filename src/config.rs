//! Pipeline configuration from the environment
//!
//! Service identifiers come from environment variables, optionally loaded from
//! a `.env` file. Directories, model ids and timings have defaults.

use crate::error::{PipelineError, Result};
use crate::poller::PollPolicy;
use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const MARENGO_MODEL_ID: &str = "twelvelabs.marengo-embed-2-7-v1:0";
pub const PEGASUS_MODEL_ID: &str = "us.twelvelabs.pegasus-1-2-v1:0";

/// Region and bucket for one remote stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTarget {
    pub region: String,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub target: ServiceTarget,
    pub model_id: String,
    pub source_prefix: String,
    /// Prefix the async job writes its results under.
    pub destination_prefix: String,
    pub cdn_base_url: String,
    pub output_dir: PathBuf,
    pub poll: PollPolicy,
}

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub target: ServiceTarget,
    pub model_id: String,
    pub source_prefix: String,
    pub temperature: f32,
    pub output_dir: PathBuf,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSettings {
    pub embeddings_dir: PathBuf,
    pub analyses_dir: PathBuf,
    pub documents_dir: PathBuf,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            embeddings_dir: PathBuf::from("bedrock_marengo_embeddings"),
            analyses_dir: PathBuf::from("bedrock_pegasus_analyses"),
            documents_dir: PathBuf::from("documents"),
        }
    }
}

/// Lookup over a snapshot of environment variables.
pub struct Env {
    vars: HashMap<String, String>,
}

impl Env {
    /// Load `.env` if present, then snapshot the process environment.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| PipelineError::ConfigError(key.to_string()))
    }

    pub fn optional(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn secs(&self, key: &str, default: u64) -> Result<Duration> {
        match self.optional(key) {
            None => Ok(Duration::from_secs(default)),
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| {
                    PipelineError::ConfigError(format!(
                        "{} must be whole seconds, got {:?}",
                        key, raw
                    ))
                }),
        }
    }
}

/// Account that owns the source buckets.
pub fn bucket_owner(env: &Env) -> Result<String> {
    env.required("AWS_ACCOUNT_ID")
}

impl EmbeddingSettings {
    pub fn from_env(env: &Env) -> Result<Self> {
        let interval = env.secs("POLL_INTERVAL_SECS", 10)?;
        if interval.is_zero() {
            return Err(PipelineError::ConfigError(
                "POLL_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            target: ServiceTarget {
                region: env.required("AWS_REGION_MARENGO")?,
                bucket: env.required("S3_VIDEO_STORAGE_BUCKET_MARENGO")?,
            },
            model_id: MARENGO_MODEL_ID.to_string(),
            source_prefix: "commercials".to_string(),
            destination_prefix: "embeddings".to_string(),
            cdn_base_url: env.required("CLOUDFRONT_URL")?.trim_end_matches('/').to_string(),
            output_dir: DocumentSettings::default().embeddings_dir,
            poll: PollPolicy {
                interval,
                max_wait: env.secs("POLL_MAX_WAIT_SECS", 30 * 60)?,
            },
        })
    }
}

impl AnalysisSettings {
    pub fn from_env(env: &Env) -> Result<Self> {
        Ok(Self {
            target: ServiceTarget {
                region: env.required("AWS_REGION_PEGASUS")?,
                bucket: env.required("S3_VIDEO_STORAGE_BUCKET_PEGASUS")?,
            },
            model_id: PEGASUS_MODEL_ID.to_string(),
            source_prefix: "commercials".to_string(),
            temperature: 0.2,
            output_dir: DocumentSettings::default().analyses_dir,
            retry: RetryPolicy::default(),
        })
    }
}
