//! Transcription job handling.
//!
//! Starting a job is split from collecting its results because the
//! orchestrator parks the execution on a task token while the managed
//! transcription service runs. The token is stashed in the artifact bucket
//! under a key matching the job name, so the completion watcher can find it
//! from nothing but the job's own events.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::credentials::CredentialsBroker;
use crate::storage::{ElevatedObjectStore, StagingStore};
use crate::types::{ResourceRef, execution_short_id};
use crate::{Error, Result};

const SUPPORTED_FORMATS: [&str; 7] = ["mp3", "mp4", "wav", "flac", "ogg", "amr", "webm"];

/// Map common container extensions onto the format names the transcription
/// service accepts, then validate. An explicit override skips the remapping
/// but not the validation.
pub fn resolve_media_format(extension: &str, override_format: Option<&str>) -> Result<String> {
    let format = match override_format {
        Some(forced) => forced.to_string(),
        None => match extension {
            "m4a" => "mp4".to_string(),
            "3ga" => "amr".to_string(),
            "oga" | "opus" => "ogg".to_string(),
            other => other.to_string(),
        },
    };

    if SUPPORTED_FORMATS.contains(&format.as_str()) {
        Ok(format)
    } else {
        Err(Error::UnsupportedMediaFormat(format))
    }
}

/// Parameters for starting a managed transcription job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartJobParams {
    pub job_name: String,
    pub media_file_uri: String,
    pub language_code: String,
    pub media_format: String,
    pub output_bucket_name: String,
}

/// Details of a finished job.
#[derive(Debug, Clone)]
pub struct TranscriptionJobInfo {
    pub transcript_file_uri: String,
}

/// Managed transcription service operations.
#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    async fn start_job(&self, params: StartJobParams) -> Result<()>;
    async fn get_job(&self, job_name: &str) -> Result<TranscriptionJobInfo>;
}

/// Amazon Transcribe backed client.
pub struct AwsTranscriptionClient {
    client: aws_sdk_transcribe::Client,
}

impl AwsTranscriptionClient {
    pub fn new(client: aws_sdk_transcribe::Client) -> Self {
        Self { client }
    }

    pub fn from_aws(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_transcribe::Client::new(config))
    }
}

#[async_trait]
impl TranscriptionClient for AwsTranscriptionClient {
    async fn start_job(&self, params: StartJobParams) -> Result<()> {
        let media = aws_sdk_transcribe::types::Media::builder()
            .media_file_uri(params.media_file_uri)
            .build();

        self.client
            .start_transcription_job()
            .transcription_job_name(params.job_name)
            .media(media)
            .language_code(aws_sdk_transcribe::types::LanguageCode::from(
                params.language_code.as_str(),
            ))
            .media_format(aws_sdk_transcribe::types::MediaFormat::from(
                params.media_format.as_str(),
            ))
            .output_bucket_name(params.output_bucket_name)
            .send()
            .await
            .map_err(|e| Error::transport(e.to_string()))?;
        Ok(())
    }

    async fn get_job(&self, job_name: &str) -> Result<TranscriptionJobInfo> {
        let output = self
            .client
            .get_transcription_job()
            .transcription_job_name(job_name)
            .send()
            .await
            .map_err(|e| Error::transport(e.to_string()))?;

        let uri = output
            .transcription_job()
            .and_then(|job| job.transcript())
            .and_then(|t| t.transcript_file_uri())
            .ok_or_else(|| Error::transport("transcription job has no transcript URI"))?;

        Ok(TranscriptionJobInfo {
            transcript_file_uri: uri.to_string(),
        })
    }
}

/// Input for starting a transcription.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeStartRequest {
    #[serde(rename = "Artifact")]
    pub artifact: ArtifactRef,

    #[serde(rename = "Task")]
    pub task: TranscribeTask,

    #[serde(rename = "Execution")]
    pub execution: ResourceRef,

    #[serde(rename = "TaskIteratorIndex")]
    pub task_iterator_index: u32,

    /// Orchestrator token released when the job completes.
    #[serde(rename = "TaskToken")]
    pub task_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactRef {
    #[serde(rename = "BucketName")]
    pub bucket_name: String,

    #[serde(rename = "ObjectKey")]
    pub object_key: String,

    #[serde(rename = "Descriptor")]
    pub descriptor: ArtifactDescriptor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactDescriptor {
    #[serde(rename = "Extension")]
    pub extension: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeTask {
    #[serde(rename = "LanguageCode")]
    pub language_code: String,

    #[serde(rename = "MediaFormat")]
    pub media_format: Option<String>,
}

/// Input for collecting results.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeResultsRequest {
    #[serde(rename = "TranscriptionJob")]
    pub transcription_job: TranscriptionJobRef,

    #[serde(rename = "Task")]
    pub task: ResultsTask,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionJobRef {
    #[serde(rename = "TranscriptionJobName")]
    pub transcription_job_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultsTask {
    #[serde(rename = "Destination")]
    pub destination: Value,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "Mode")]
enum TranscriptDestination {
    #[serde(rename = "AWS/S3")]
    S3 {
        #[serde(rename = "BucketName")]
        bucket_name: String,
        #[serde(rename = "ObjectKey")]
        object_key: String,
    },
}

impl TranscriptDestination {
    fn from_value(value: &Value) -> Result<Self> {
        let mode = value
            .get("Mode")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::UnsupportedDestinationType("<missing>".to_string()))?;
        if mode != "AWS/S3" {
            return Err(Error::UnsupportedDestinationType(mode.to_string()));
        }
        serde_json::from_value(value.clone()).map_err(Error::from)
    }
}

/// Result reported back to the orchestrator once the transcript is in place.
#[derive(Debug, Clone, Serialize)]
pub struct TranscribeTaskResult {
    #[serde(rename = "Task")]
    pub task: &'static str,

    #[serde(rename = "Mode")]
    pub mode: String,

    #[serde(rename = "BucketName")]
    pub bucket_name: String,

    #[serde(rename = "ObjectKey")]
    pub object_key: String,

    #[serde(rename = "Time")]
    pub time: String,

    #[serde(rename = "Timestamp")]
    pub timestamp: f64,
}

/// Starts jobs and copies finished transcripts to their destination.
pub struct Transcriber {
    client: Arc<dyn TranscriptionClient>,
    staging: Arc<dyn StagingStore>,
    broker: Arc<dyn CredentialsBroker>,
    writer: Arc<dyn ElevatedObjectStore>,
    job_name_prefix: String,
}

impl Transcriber {
    pub fn new(
        client: Arc<dyn TranscriptionClient>,
        staging: Arc<dyn StagingStore>,
        broker: Arc<dyn CredentialsBroker>,
        writer: Arc<dyn ElevatedObjectStore>,
        job_name_prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            staging,
            broker,
            writer,
            job_name_prefix: job_name_prefix.into(),
        }
    }

    /// Job names carry the deployment prefix and the iterator index, so the
    /// completion watcher can filter out jobs from other deployments and two
    /// transcriptions in one execution never collide.
    fn job_name(&self, execution_id: &str, task_iterator_index: u32) -> String {
        format!(
            "{}{}-{}",
            self.job_name_prefix,
            execution_short_id(execution_id),
            task_iterator_index
        )
    }

    /// Stash the task token and start the job.
    pub async fn start(&self, request: &TranscribeStartRequest) -> Result<()> {
        let media_format = resolve_media_format(
            &request.artifact.descriptor.extension,
            request.task.media_format.as_deref(),
        )?;
        let job_name = self.job_name(&request.execution.id, request.task_iterator_index);

        self.staging
            .upload(
                &request.artifact.bucket_name,
                &format!("{job_name}.TaskToken"),
                request.task_token.clone().into_bytes(),
            )
            .await?;

        self.client
            .start_job(StartJobParams {
                job_name: job_name.clone(),
                media_file_uri: format!(
                    "s3://{}/{}",
                    request.artifact.bucket_name, request.artifact.object_key
                ),
                language_code: request.task.language_code.clone(),
                media_format,
                output_bucket_name: request.artifact.bucket_name.clone(),
            })
            .await?;

        info!(job_name, "Started transcription job");
        Ok(())
    }

    /// Copy the finished transcript to the task's destination and report it.
    pub async fn results(
        &self,
        request: &TranscribeResultsRequest,
    ) -> Result<TranscribeTaskResult> {
        let TranscriptDestination::S3 {
            bucket_name,
            object_key,
        } = TranscriptDestination::from_value(&request.task.destination)?;

        let job = self
            .client
            .get_job(&request.transcription_job.transcription_job_name)
            .await?;
        let (source_bucket, source_key) = transcript_location(&job.transcript_file_uri)?;

        let credentials = self.broker.assume_writer_role().await?;
        self.writer
            .copy_object(
                &credentials,
                &source_bucket,
                &source_key,
                &bucket_name,
                &object_key,
            )
            .await?;

        let now = Utc::now();
        Ok(TranscribeTaskResult {
            task: "Transcribe",
            mode: "AWS/S3".to_string(),
            bucket_name,
            object_key,
            time: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            timestamp: now.timestamp_millis() as f64 / 1000.0,
        })
    }
}

/// Split a transcript URL of the form
/// `https://s3.<region>.amazonaws.com/<bucket>/<key>` into bucket and key.
fn transcript_location(transcript_file_uri: &str) -> Result<(String, String)> {
    let parsed = url::Url::parse(transcript_file_uri)
        .map_err(|e| Error::transport(format!("invalid transcript URI: {e}")))?;
    let path = parsed.path().trim_start_matches('/');
    let (bucket, key) = path
        .split_once('/')
        .ok_or_else(|| Error::transport("transcript URI has no object key"))?;
    Ok((bucket.to_string(), key.to_string()))
}
