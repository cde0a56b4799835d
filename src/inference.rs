//! Hosted model clients (Amazon Bedrock)
//!
//! Two seams: an asynchronous job API for the embedding model and a
//! synchronous invoke API for the video-to-text model. Request bodies are
//! built as plain JSON so they can be checked without a service.

use crate::error::{PipelineError, Result};
use crate::models::EmbeddingOption;
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::{
    AsyncInvokeOutputDataConfig, AsyncInvokeS3OutputDataConfig, AsyncInvokeStatus,
};
use aws_sdk_bedrockruntime::Client;
use aws_smithy_types::Document;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

/// Error code the service uses for rate-limit rejections.
pub const THROTTLING_MARKER: &str = "ThrottlingException";

/// Handle to a submitted async job (the invocation ARN).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(arn: impl Into<String>) -> Self {
        Self(arn.into())
    }

    pub fn arn(&self) -> &str {
        &self.0
    }

    /// Last path segment of the ARN; the service writes results under it.
    pub fn invocation_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    InProgress,
    Completed,
    Failed(Option<String>),
}

#[derive(Debug, Clone)]
pub struct EmbeddingJobRequest {
    pub model_id: String,
    pub video_uri: String,
    pub bucket_owner: String,
    pub options: Vec<EmbeddingOption>,
    /// `s3://bucket/prefix/` the service writes `output.json` under.
    pub output_uri: String,
}

#[derive(Debug, Clone)]
pub struct TextRequest {
    pub model_id: String,
    pub prompt: String,
    pub video_uri: String,
    pub bucket_owner: String,
    pub temperature: f32,
}

#[async_trait::async_trait]
pub trait AsyncInference: Send + Sync {
    async fn submit(&self, request: &EmbeddingJobRequest) -> Result<JobHandle>;

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus>;
}

#[async_trait::async_trait]
pub trait TextInference: Send + Sync {
    /// Returns the model's free-text message.
    async fn invoke(&self, request: &TextRequest) -> Result<String>;
}

pub fn embedding_model_input(request: &EmbeddingJobRequest) -> Value {
    json!({
        "inputType": "video",
        "mediaSource": {
            "s3Location": {
                "uri": request.video_uri,
                "bucketOwner": request.bucket_owner,
            }
        },
        "embeddingOption": request.options.iter().map(|o| o.as_str()).collect::<Vec<_>>(),
    })
}

pub fn text_request_body(request: &TextRequest) -> Value {
    json!({
        "inputPrompt": request.prompt,
        "mediaSource": {
            "s3Location": {
                "uri": request.video_uri,
                "bucketOwner": request.bucket_owner,
            }
        },
        "temperature": request.temperature,
    })
}

#[derive(Debug, Deserialize)]
struct TextResponse {
    message: String,
}

/// Throttling is recognised by the service's error code in the message.
pub fn classify_message(message: String) -> PipelineError {
    if message.contains(THROTTLING_MARKER) {
        PipelineError::Throttled(message)
    } else {
        PipelineError::InferenceError(message)
    }
}

fn classify<E, R>(context: &str, err: SdkError<E, R>) -> PipelineError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug + 'static,
{
    if err.code() == Some(THROTTLING_MARKER) {
        return PipelineError::Throttled(format!("{}: {}", context, THROTTLING_MARKER));
    }
    classify_message(format!("{}: {}", context, DisplayErrorContext(&err)))
}

fn json_to_document(value: &Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Document::from(u)
            } else if let Some(i) = n.as_i64() {
                Document::from(i)
            } else {
                Document::from(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => Document::String(s.clone()),
        Value::Array(items) => Document::Array(items.iter().map(json_to_document).collect()),
        Value::Object(map) => Document::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_document(v)))
                .collect(),
        ),
    }
}

/// Bedrock runtime client serving both model seams.
#[derive(Debug, Clone)]
pub struct BedrockInference {
    client: Client,
}

impl BedrockInference {
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
impl AsyncInference for BedrockInference {
    async fn submit(&self, request: &EmbeddingJobRequest) -> Result<JobHandle> {
        let output = AsyncInvokeS3OutputDataConfig::builder()
            .s3_uri(&request.output_uri)
            .build()
            .map_err(|e| PipelineError::ValidationError(e.to_string()))?;

        let response = self
            .client
            .start_async_invoke()
            .model_id(&request.model_id)
            .model_input(json_to_document(&embedding_model_input(request)))
            .output_data_config(AsyncInvokeOutputDataConfig::S3OutputDataConfig(output))
            .send()
            .await
            .map_err(|e| classify("start_async_invoke", e))?;

        Ok(JobHandle::new(response.invocation_arn()))
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus> {
        let response = self
            .client
            .get_async_invoke()
            .invocation_arn(handle.arn())
            .send()
            .await
            .map_err(|e| classify("get_async_invoke", e))?;

        Ok(match response.status() {
            AsyncInvokeStatus::Completed => JobStatus::Completed,
            AsyncInvokeStatus::Failed => {
                JobStatus::Failed(response.failure_message().map(str::to_string))
            }
            AsyncInvokeStatus::InProgress => JobStatus::InProgress,
            other => {
                warn!(
                    "Unrecognised job status {:?} for {}, treating as in progress",
                    other, handle
                );
                JobStatus::InProgress
            }
        })
    }
}

#[async_trait::async_trait]
impl TextInference for BedrockInference {
    async fn invoke(&self, request: &TextRequest) -> Result<String> {
        let body = serde_json::to_vec(&text_request_body(request))?;

        let response = self
            .client
            .invoke_model()
            .model_id(&request.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| classify("invoke_model", e))?;

        let parsed: TextResponse = serde_json::from_slice(response.body().as_ref())?;
        Ok(parsed.message)
    }
}
