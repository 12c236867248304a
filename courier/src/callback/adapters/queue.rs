//! Message queue delivery.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::callback::envelope::Envelope;
use crate::{Error, Result};

/// Sends a message to a queue by URL.
#[async_trait]
pub trait QueueClient: Send + Sync {
    async fn send_message(&self, queue_url: &str, message: &str) -> Result<()>;
}

/// SQS-backed queue client.
pub struct SqsQueueClient {
    client: aws_sdk_sqs::Client,
}

impl SqsQueueClient {
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }

    pub fn from_aws(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_sqs::Client::new(config))
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn send_message(&self, queue_url: &str, message: &str) -> Result<()> {
        self.client
            .send_message()
            .queue_url(queue_url)
            .message_body(message)
            .send()
            .await
            .map_err(|e| Error::transport(e.to_string()))?;
        Ok(())
    }
}

/// Serializes the envelope once and sends it as a single queue message.
pub struct QueueAdapter {
    client: Arc<dyn QueueClient>,
}

impl QueueAdapter {
    pub fn new(client: Arc<dyn QueueClient>) -> Self {
        Self { client }
    }

    pub async fn deliver(&self, queue_url: &str, envelope: &Envelope) -> Result<()> {
        let message = envelope.to_json()?;
        self.client.send_message(queue_url, &message).await?;
        debug!(queue_url, "Sent callback to queue");
        Ok(())
    }
}
