//! Source ingestion.
//!
//! The first step of every execution copies the job's source file into the
//! service-owned artifact bucket so later steps read from a known location.
//! Sources arrive either as an HTTP URL or as an object in a bucket the
//! service can read.

use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::storage::StagingStore;
use crate::types::ResourceRef;
use crate::{Error, Result};

/// A declared source location, tagged by its `Mode`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "Mode")]
pub enum Source {
    #[serde(rename = "HTTP")]
    Http {
        #[serde(rename = "URL")]
        url: String,
    },

    #[serde(rename = "AWS/S3")]
    S3 {
        #[serde(rename = "BucketName")]
        bucket_name: String,
        #[serde(rename = "ObjectKey")]
        object_key: String,
    },
}

impl Source {
    pub fn from_value(value: &Value) -> Result<Self> {
        let mode = value
            .get("Mode")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::UnsupportedSourceMode("<missing>".to_string()))?;

        if !matches!(mode, "HTTP" | "AWS/S3") {
            return Err(Error::UnsupportedSourceMode(mode.to_string()));
        }

        serde_json::from_value(value.clone()).map_err(Error::from)
    }

    /// Filename component of the staged key, derived from the source.
    ///
    /// HTTP sources use the last path segment, falling back to the hostname
    /// for bare-origin URLs.
    pub fn filename(&self) -> String {
        match self {
            Self::Http { url } => url::Url::parse(url)
                .ok()
                .and_then(|parsed| {
                    let name = parsed
                        .path_segments()
                        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
                        .map(String::from);
                    name.or_else(|| parsed.host_str().map(String::from))
                })
                .unwrap_or_else(|| "source".to_string()),
            Self::S3 { object_key, .. } => object_key
                .rsplit('/')
                .next()
                .unwrap_or(object_key)
                .to_string(),
        }
    }
}

/// One ingest invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    #[serde(rename = "Job")]
    pub job: IngestJob,

    #[serde(rename = "Execution")]
    pub execution: ResourceRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestJob {
    #[serde(rename = "Source")]
    pub source: Value,
}

/// Location of the staged copy, passed through the rest of the execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    #[serde(rename = "BucketName")]
    pub bucket_name: String,

    #[serde(rename = "ObjectKey")]
    pub object_key: String,
}

/// Stages source files into the artifact bucket.
pub struct Ingestor {
    http: reqwest::Client,
    store: Arc<dyn StagingStore>,
    artifact_bucket: String,
}

impl Ingestor {
    pub fn new(store: Arc<dyn StagingStore>, artifact_bucket: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            store,
            artifact_bucket: artifact_bucket.into(),
        }
    }

    /// Stage the request's source and return where it landed.
    ///
    /// Each ingest gets a unique key segment so re-running an execution never
    /// overwrites an earlier artifact.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<Artifact> {
        let source = Source::from_value(&request.job.source)?;
        let object_key = format!(
            "{}/{}/{}",
            request.execution.id,
            Uuid::new_v4(),
            source.filename()
        );

        match &source {
            Source::Http { url } => self.stage_http(url, &object_key).await?,
            Source::S3 {
                bucket_name,
                object_key: source_key,
            } => {
                self.store
                    .copy(bucket_name, source_key, &self.artifact_bucket, &object_key)
                    .await?
            }
        }

        info!(object_key, "Staged source artifact");
        Ok(Artifact {
            bucket_name: self.artifact_bucket.clone(),
            object_key,
        })
    }

    /// Download to a temporary file, then upload the file. Spooling through
    /// disk keeps memory flat for large media sources.
    async fn stage_http(&self, url: &str, object_key: &str) -> Result<()> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport(format!(
                "source download failed with status {status}"
            )));
        }

        let spool = tempfile::NamedTempFile::new()?;
        let mut file = tokio::fs::File::create(spool.path()).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        self.store
            .upload_file(&self.artifact_bucket, object_key, spool.path())
            .await
    }
}
