//! Object store delivery.
//!
//! Envelopes land in the caller's bucket under a deterministic key derived
//! from the execution and the payload kind, so a poll-based consumer can find
//! them without listing. Writes always go through the credentials broker; the
//! service identity never touches the destination bucket directly.

use std::sync::Arc;

use tracing::debug;

use crate::callback::envelope::{Envelope, PayloadKind};
use crate::credentials::CredentialsBroker;
use crate::storage::ElevatedObjectStore;
use crate::types::ExecutionContext;
use crate::Result;

/// Writes envelopes into caller-owned buckets with elevated credentials.
pub struct ObjectStoreAdapter {
    broker: Arc<dyn CredentialsBroker>,
    writer: Arc<dyn ElevatedObjectStore>,
}

impl ObjectStoreAdapter {
    pub fn new(broker: Arc<dyn CredentialsBroker>, writer: Arc<dyn ElevatedObjectStore>) -> Self {
        Self { broker, writer }
    }

    pub async fn deliver(
        &self,
        bucket_name: &str,
        object_prefix: &str,
        envelope: &Envelope,
        execution: &ExecutionContext,
    ) -> Result<()> {
        let key = object_key(object_prefix, envelope, execution);
        let body = envelope.to_json()?;

        let credentials = self.broker.assume_writer_role().await?;
        self.writer
            .put_object(&credentials, bucket_name, &key, body.into_bytes())
            .await?;

        debug!(bucket_name, key, "Wrote callback to object store");
        Ok(())
    }
}

/// Key layout: `{prefix}{execution_short_id}/{object_name}`, where task
/// results carry their iterator index so parallel tasks never collide.
fn object_key(prefix: &str, envelope: &Envelope, execution: &ExecutionContext) -> String {
    let name = match envelope.payload().kind() {
        PayloadKind::JobReceived => "job_received.json".to_string(),
        PayloadKind::TaskResult => {
            format!(
                "task_result.{}.json",
                execution.task_iterator_index.unwrap_or(0)
            )
        }
        PayloadKind::JobResult => "job_result.json".to_string(),
    };
    format!("{prefix}{}/{name}", execution.execution_short_id())
}
