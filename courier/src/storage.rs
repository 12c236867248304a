//! Object storage access.
//!
//! Two seams: `StagingStore` covers the service-owned artifact bucket that
//! pipeline steps read and write with ambient credentials, and
//! `ElevatedObjectStore` covers caller-owned buckets that require scoped
//! credentials from the [`CredentialsBroker`](crate::credentials::CredentialsBroker).

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;

use crate::credentials::ScopedCredentials;
use crate::{Error, Result};

/// Service-owned staging bucket operations.
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Upload an in-memory object.
    async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;

    /// Upload a file from local disk, streaming its contents.
    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()>;

    /// Server-side copy between buckets readable with ambient credentials.
    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<()>;
}

/// Writes into caller-owned buckets using per-delivery scoped credentials.
///
/// Implementations must build a fresh client from the supplied credentials on
/// every call rather than caching sessions.
#[async_trait]
pub trait ElevatedObjectStore: Send + Sync {
    async fn put_object(
        &self,
        credentials: &ScopedCredentials,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<()>;

    async fn copy_object(
        &self,
        credentials: &ScopedCredentials,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<()>;
}

/// S3-backed staging store using the ambient service identity.
pub struct S3StagingStore {
    client: aws_sdk_s3::Client,
}

impl S3StagingStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    pub fn from_aws(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_s3::Client::new(config))
    }
}

#[async_trait]
impl StagingStore for S3StagingStore {
    async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| Error::StorageWrite(e.to_string()))?;
        Ok(())
    }

    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| Error::StorageWrite(e.to_string()))?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::StorageWrite(e.to_string()))?;
        Ok(())
    }

    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(copy_source(source_bucket, source_key))
            .bucket(dest_bucket)
            .key(dest_key)
            .send()
            .await
            .map_err(|e| Error::StorageWrite(e.to_string()))?;
        Ok(())
    }
}

/// S3-backed elevated store. Builds a one-shot client per call from the
/// scoped credentials, layered over the base region/endpoint configuration.
pub struct ElevatedS3Store {
    base_config: aws_config::SdkConfig,
}

impl ElevatedS3Store {
    pub fn new(base_config: aws_config::SdkConfig) -> Self {
        Self { base_config }
    }

    fn client_for(&self, credentials: &ScopedCredentials) -> aws_sdk_s3::Client {
        let provider = aws_sdk_s3::config::Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            Some(credentials.session_token.clone()),
            None,
            "courier_scoped",
        );
        let config = aws_sdk_s3::config::Builder::from(&self.base_config)
            .credentials_provider(provider)
            .build();
        aws_sdk_s3::Client::from_conf(config)
    }
}

#[async_trait]
impl ElevatedObjectStore for ElevatedS3Store {
    async fn put_object(
        &self,
        credentials: &ScopedCredentials,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<()> {
        self.client_for(credentials)
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| Error::StorageWrite(e.to_string()))?;
        Ok(())
    }

    async fn copy_object(
        &self,
        credentials: &ScopedCredentials,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<()> {
        self.client_for(credentials)
            .copy_object()
            .copy_source(copy_source(source_bucket, source_key))
            .bucket(dest_bucket)
            .key(dest_key)
            .send()
            .await
            .map_err(|e| Error::StorageWrite(e.to_string()))?;
        Ok(())
    }
}

/// Build a `CopySource` header value, percent-encoding each key segment while
/// keeping the path separators intact.
fn copy_source(bucket: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{bucket}/{}", encoded.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_source_encodes_segments() {
        assert_eq!(
            copy_source("my-bucket", "a path/with spaces.mp3"),
            "my-bucket/a%20path/with%20spaces.mp3"
        );
    }

    #[test]
    fn test_copy_source_plain_key() {
        assert_eq!(copy_source("b", "x/y/z.json"), "b/x/y/z.json");
    }
}
