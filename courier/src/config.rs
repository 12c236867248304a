//! Global application configuration loaded from environment variables.

use crate::{Error, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the invocation API binds to.
    pub bind_addr: String,

    /// Maximum number of HTTP redirects a callback delivery will follow.
    pub max_http_redirects: u32,

    /// Timeout for a single HTTP delivery attempt, in seconds.
    pub http_attempt_timeout_secs: u64,

    /// Overall deadline for an HTTP delivery including its redirect chain,
    /// in seconds.
    pub http_overall_deadline_secs: u64,

    /// Identity string attached as a dimension to failure metrics.
    pub callback_function_identity: String,

    /// IAM role assumed for writes to caller-owned buckets.
    pub s3_destination_writer_role: String,

    /// Short-term bucket that holds staged source artifacts.
    pub artifact_bucket_name: String,

    /// Prefix applied to transcription job names so events from other
    /// deployments can be filtered out.
    pub transcribe_job_name_prefix: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            max_http_redirects: parse_var("MAX_HTTP_REDIRECTS", 10)?,
            http_attempt_timeout_secs: parse_var("HTTP_ATTEMPT_TIMEOUT_SECS", 30)?,
            http_overall_deadline_secs: parse_var("HTTP_OVERALL_DEADLINE_SECS", 120)?,
            callback_function_identity: std::env::var("CALLBACK_FUNCTION_IDENTITY")
                .unwrap_or_else(|_| "courier-callback".to_string()),
            s3_destination_writer_role: required_var("S3_DESTINATION_WRITER_ROLE")?,
            artifact_bucket_name: required_var("ARTIFACT_BUCKET_NAME")?,
            transcribe_job_name_prefix: std::env::var("TRANSCRIBE_JOB_NAME_PREFIX")
                .unwrap_or_else(|_| "courier-".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::config(format!("{name} environment variable is required")))
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::config(format!("{name} must be a valid number"))),
        Err(_) => Ok(default),
    }
}
