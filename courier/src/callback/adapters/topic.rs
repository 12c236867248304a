//! Pub/sub topic delivery.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::callback::envelope::Envelope;
use crate::{Error, Result};

/// Publishes a message to a named topic.
#[async_trait]
pub trait TopicClient: Send + Sync {
    async fn publish(&self, topic_arn: &str, message: &str) -> Result<()>;
}

/// SNS-backed topic client.
pub struct SnsTopicClient {
    client: aws_sdk_sns::Client,
}

impl SnsTopicClient {
    pub fn new(client: aws_sdk_sns::Client) -> Self {
        Self { client }
    }

    pub fn from_aws(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_sns::Client::new(config))
    }
}

#[async_trait]
impl TopicClient for SnsTopicClient {
    async fn publish(&self, topic_arn: &str, message: &str) -> Result<()> {
        self.client
            .publish()
            .topic_arn(topic_arn)
            .message(message)
            .send()
            .await
            .map_err(|e| Error::transport(e.to_string()))?;
        Ok(())
    }
}

/// Serializes the envelope once and publishes it as a single message.
pub struct TopicAdapter {
    client: Arc<dyn TopicClient>,
}

impl TopicAdapter {
    pub fn new(client: Arc<dyn TopicClient>) -> Self {
        Self { client }
    }

    pub async fn deliver(&self, topic_arn: &str, envelope: &Envelope) -> Result<()> {
        let message = envelope.to_json()?;
        self.client.publish(topic_arn, &message).await?;
        debug!(topic_arn, "Published callback to topic");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::envelope::CallbackPayload;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingTopicClient {
        published: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl TopicClient for RecordingTopicClient {
        async fn publish(&self, topic_arn: &str, message: &str) -> Result<()> {
            self.published
                .lock()
                .unwrap()
                .push((topic_arn.to_string(), message.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publishes_serialized_envelope() {
        let client = Arc::new(RecordingTopicClient {
            published: Mutex::new(Vec::new()),
        });
        let adapter = TopicAdapter::new(client.clone());
        let envelope = Envelope::new(CallbackPayload::JobReceived(json!({"Job": {"Id": "j1"}})));

        adapter
            .deliver("arn:aws:sns:us-east-1:123:cb", &envelope)
            .await
            .unwrap();

        let published = client.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "arn:aws:sns:us-east-1:123:cb");
        let body: serde_json::Value = serde_json::from_str(&published[0].1).unwrap();
        assert_eq!(body["JobReceived"]["Job"]["Id"], "j1");
        assert!(body["Time"].is_string());
    }
}
