//! Callback dispatch.

use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::credentials::StsCredentialsBroker;
use crate::storage::ElevatedS3Store;
use crate::types::ExecutionContext;
use crate::{Error, Result};

use super::CallbackRequest;
use super::adapters::event_bus::EventBridgeClient;
use super::adapters::queue::SqsQueueClient;
use super::adapters::topic::SnsTopicClient;
use super::adapters::{
    EventBusAdapter, HttpAdapter, HttpDeliveryConfig, ObjectStoreAdapter, QueueAdapter,
    TopicAdapter,
};
use super::destination::Destination;
use super::envelope::{CallbackPayload, Envelope};
use super::metrics::{CloudWatchMetricsSink, MetricsSink, job_failure_signaled, record_failure_callback};

/// Owns one adapter per destination type and routes each callback to exactly
/// one of them.
pub struct CallbackService {
    topic: TopicAdapter,
    queue: QueueAdapter,
    object_store: ObjectStoreAdapter,
    event_bus: EventBusAdapter,
    http: HttpAdapter,
    metrics: Arc<dyn MetricsSink>,
}

impl CallbackService {
    pub fn new(
        topic: TopicAdapter,
        queue: QueueAdapter,
        object_store: ObjectStoreAdapter,
        event_bus: EventBusAdapter,
        http: HttpAdapter,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            topic,
            queue,
            object_store,
            event_bus,
            http,
            metrics,
        }
    }

    /// Wire every adapter against live AWS clients.
    pub fn from_aws(aws: &aws_config::SdkConfig, config: &AppConfig) -> Self {
        let broker = Arc::new(StsCredentialsBroker::from_aws(
            aws,
            config.s3_destination_writer_role.clone(),
        ));
        let writer = Arc::new(ElevatedS3Store::new(aws.clone()));
        let http_config = HttpDeliveryConfig {
            max_redirects: config.max_http_redirects,
            attempt_timeout: std::time::Duration::from_secs(config.http_attempt_timeout_secs),
            overall_deadline: std::time::Duration::from_secs(config.http_overall_deadline_secs),
        };

        Self::new(
            TopicAdapter::new(Arc::new(SnsTopicClient::from_aws(aws))),
            QueueAdapter::new(Arc::new(SqsQueueClient::from_aws(aws))),
            ObjectStoreAdapter::new(broker, writer),
            EventBusAdapter::new(Arc::new(EventBridgeClient::from_aws(aws))),
            HttpAdapter::new(http_config),
            Arc::new(CloudWatchMetricsSink::from_aws(
                aws,
                config.callback_function_identity.clone(),
            )),
        )
    }

    /// Process one callback request end to end.
    ///
    /// The destination is validated before the payload so an unknown `Type`
    /// fails without emitting metrics or touching the network.
    pub async fn handle(&self, request: CallbackRequest) -> Result<()> {
        let destination = Destination::from_value(&request.callback)?;

        let message = request
            .message
            .ok_or_else(|| Error::UnsupportedPayload("request had no Message".to_string()))?;
        let payload = CallbackPayload::from_message(message)?;

        let execution = ExecutionContext {
            execution_id: request.execution.id,
            state_machine_id: request.state_machine.id,
            task_iterator_index: request.task_iterator_index,
        };

        let envelope = Envelope::new(payload);
        self.deliver(destination, &envelope, &execution).await
    }

    async fn deliver(
        &self,
        destination: Destination,
        envelope: &Envelope,
        execution: &ExecutionContext,
    ) -> Result<()> {
        if job_failure_signaled(envelope.payload()) {
            record_failure_callback(&*self.metrics).await;
        }

        match destination {
            Destination::Topic { topic_arn } => self.topic.deliver(&topic_arn, envelope).await?,
            Destination::Queue { queue_url } => self.queue.deliver(&queue_url, envelope).await?,
            Destination::ObjectStore {
                bucket_name,
                object_prefix,
            } => {
                self.object_store
                    .deliver(&bucket_name, &object_prefix, envelope, execution)
                    .await?
            }
            Destination::EventBus { event_bus_name } => {
                self.event_bus
                    .deliver(event_bus_name.as_deref(), envelope, execution)
                    .await?
            }
            Destination::Http(http_destination) => {
                let body = serde_json::to_value(envelope)?;
                self.http.deliver(&http_destination, &body).await?
            }
        }

        info!(
            execution = execution.execution_short_id(),
            "Callback delivered"
        );
        Ok(())
    }
}
