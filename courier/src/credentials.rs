//! Short-lived credential brokering for writes into caller-owned buckets.
//!
//! Deliveries that land in a destination the caller owns must not use the
//! service's ambient identity. A broker hands out scoped credentials for a
//! writer role the caller has granted, and every write builds its client from
//! those credentials. Nothing here caches: each delivery assumes the role
//! fresh so a revoked grant takes effect immediately.

use async_trait::async_trait;

use crate::{Error, Result};

const WRITER_SESSION_NAME: &str = "courier_destination_writer";

/// Credentials scoped to a single assumed-role session.
#[derive(Debug, Clone)]
pub struct ScopedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

/// Hands out short-lived credentials for the destination writer role.
#[async_trait]
pub trait CredentialsBroker: Send + Sync {
    async fn assume_writer_role(&self) -> Result<ScopedCredentials>;
}

/// STS-backed broker assuming a fixed writer role.
pub struct StsCredentialsBroker {
    client: aws_sdk_sts::Client,
    role_arn: String,
}

impl StsCredentialsBroker {
    pub fn new(client: aws_sdk_sts::Client, role_arn: impl Into<String>) -> Self {
        Self {
            client,
            role_arn: role_arn.into(),
        }
    }

    pub fn from_aws(config: &aws_config::SdkConfig, role_arn: impl Into<String>) -> Self {
        Self::new(aws_sdk_sts::Client::new(config), role_arn)
    }
}

#[async_trait]
impl CredentialsBroker for StsCredentialsBroker {
    async fn assume_writer_role(&self) -> Result<ScopedCredentials> {
        let output = self
            .client
            .assume_role()
            .role_arn(&self.role_arn)
            .role_session_name(WRITER_SESSION_NAME)
            .send()
            .await
            .map_err(|e| Error::Credential(e.to_string()))?;

        let creds = output
            .credentials()
            .ok_or_else(|| Error::Credential("assume-role response had no credentials".into()))?;

        Ok(ScopedCredentials {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
        })
    }
}
