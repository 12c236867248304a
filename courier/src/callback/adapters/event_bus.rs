//! Event bus delivery.
//!
//! Unlike the point-to-point transports, bus events carry routing metadata
//! alongside the envelope: a fixed source, a detail type derived from the
//! payload kind, and the execution identifiers as resources, so consumers can
//! pattern-match without parsing the detail body.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::callback::envelope::{Envelope, PayloadKind};
use crate::types::ExecutionContext;
use crate::{Error, Result};

pub const EVENT_SOURCE: &str = "org.courier.pipeline";

/// A fully described bus event, ready to publish.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub detail: String,
    pub detail_type: String,
    pub event_bus_name: Option<String>,
    pub resources: Vec<String>,
    pub time: DateTime<Utc>,
}

/// Publishes a single event to an event bus.
#[async_trait]
pub trait EventBusClient: Send + Sync {
    async fn put_event(&self, event: BusEvent) -> Result<()>;
}

/// EventBridge-backed bus client.
pub struct EventBridgeClient {
    client: aws_sdk_eventbridge::Client,
}

impl EventBridgeClient {
    pub fn new(client: aws_sdk_eventbridge::Client) -> Self {
        Self { client }
    }

    pub fn from_aws(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_eventbridge::Client::new(config))
    }
}

#[async_trait]
impl EventBusClient for EventBridgeClient {
    async fn put_event(&self, event: BusEvent) -> Result<()> {
        let mut entry = aws_sdk_eventbridge::types::PutEventsRequestEntry::builder()
            .source(EVENT_SOURCE)
            .detail_type(event.detail_type)
            .detail(event.detail)
            .set_resources(Some(event.resources))
            .time(std::time::SystemTime::from(event.time).into());
        if let Some(bus_name) = event.event_bus_name {
            entry = entry.event_bus_name(bus_name);
        }

        let output = self
            .client
            .put_events()
            .entries(entry.build())
            .send()
            .await
            .map_err(|e| Error::transport(e.to_string()))?;

        if output.failed_entry_count() > 0 {
            return Err(Error::transport("event bus rejected the entry"));
        }
        Ok(())
    }
}

/// Builds the bus event for an envelope and publishes it.
pub struct EventBusAdapter {
    client: Arc<dyn EventBusClient>,
}

impl EventBusAdapter {
    pub fn new(client: Arc<dyn EventBusClient>) -> Self {
        Self { client }
    }

    pub async fn deliver(
        &self,
        event_bus_name: Option<&str>,
        envelope: &Envelope,
        execution: &ExecutionContext,
    ) -> Result<()> {
        let event = BusEvent {
            detail: envelope.to_json()?,
            detail_type: detail_type(envelope.payload().kind()).to_string(),
            event_bus_name: event_bus_name.map(String::from),
            resources: vec![
                execution.state_machine_id.clone(),
                execution.execution_id.clone(),
            ],
            time: envelope.time(),
        };
        self.client.put_event(event).await?;
        debug!(bus = event_bus_name.unwrap_or("default"), "Put callback event on bus");
        Ok(())
    }
}

fn detail_type(kind: PayloadKind) -> &'static str {
    match kind {
        PayloadKind::JobReceived => "Courier Job Received Callback",
        PayloadKind::TaskResult => "Courier Task Result Callback",
        PayloadKind::JobResult => "Courier Job Result Callback",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::envelope::CallbackPayload;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingBusClient {
        events: Mutex<Vec<BusEvent>>,
    }

    #[async_trait]
    impl EventBusClient for RecordingBusClient {
        async fn put_event(&self, event: BusEvent) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn execution() -> ExecutionContext {
        ExecutionContext {
            execution_id: "arn:exec".to_string(),
            state_machine_id: "arn:machine".to_string(),
            task_iterator_index: None,
        }
    }

    #[tokio::test]
    async fn test_event_carries_routing_metadata() {
        let client = Arc::new(RecordingBusClient {
            events: Mutex::new(Vec::new()),
        });
        let adapter = EventBusAdapter::new(client.clone());
        let envelope = Envelope::new(CallbackPayload::TaskResult(json!({"Task": "Copy"})));

        adapter
            .deliver(Some("jobs-bus"), &envelope, &execution())
            .await
            .unwrap();

        let events = client.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.detail_type, "Courier Task Result Callback");
        assert_eq!(event.event_bus_name.as_deref(), Some("jobs-bus"));
        assert_eq!(event.resources, vec!["arn:machine", "arn:exec"]);
        assert_eq!(event.time, envelope.time());
        let detail: serde_json::Value = serde_json::from_str(&event.detail).unwrap();
        assert_eq!(detail["TaskResult"]["Task"], "Copy");
    }

    #[tokio::test]
    async fn test_default_bus_when_unnamed() {
        let client = Arc::new(RecordingBusClient {
            events: Mutex::new(Vec::new()),
        });
        let adapter = EventBusAdapter::new(client.clone());
        let envelope = Envelope::new(CallbackPayload::JobResult(Default::default()));

        adapter.deliver(None, &envelope, &execution()).await.unwrap();

        let events = client.events.lock().unwrap();
        assert!(events[0].event_bus_name.is_none());
        assert_eq!(events[0].detail_type, "Courier Job Result Callback");
    }
}
