//! Failure-signal detection and metric emission.
//!
//! A callback that reports a failed job increments a counter before it is
//! dispatched, so operators can alarm on failure callbacks without consuming
//! the callbacks themselves. Metric emission is best-effort: a sink error is
//! logged and dropped, never surfaced as a delivery failure.

use async_trait::async_trait;
use aws_sdk_cloudwatch::types::{Dimension, MetricDatum, StandardUnit};
use tracing::warn;

use crate::Result;

use super::envelope::{CallbackPayload, SUCCESS_STATE};

pub const METRIC_NAMESPACE: &str = "Courier/Pipeline";
pub const ERROR_CALLBACKS_METRIC: &str = "ErrorCallbackMessagesSent";

/// True when the payload reports a failed job.
///
/// Only final job results can signal failure. A job failed when any task
/// failed or when it ended in a non-success state; a result missing its
/// `State` field counts only if it lists failed tasks.
pub fn job_failure_signaled(payload: &CallbackPayload) -> bool {
    let CallbackPayload::JobResult(result) = payload else {
        return false;
    };

    let any_failed_tasks = result
        .failed_tasks
        .as_ref()
        .is_some_and(|tasks| !tasks.is_empty());
    let bad_state = result.state.as_ref().is_some_and(|s| s != SUCCESS_STATE);

    any_failed_tasks || bad_state
}

/// Counter sink for operational metrics.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn increment(&self, metric_name: &str) -> Result<()>;
}

/// Emit the failure-callback metric, logging and swallowing sink errors.
pub async fn record_failure_callback(sink: &dyn MetricsSink) {
    if let Err(e) = sink.increment(ERROR_CALLBACKS_METRIC).await {
        warn!("Failed to record failure-callback metric: {e}");
    }
}

/// CloudWatch-backed metrics sink.
pub struct CloudWatchMetricsSink {
    client: aws_sdk_cloudwatch::Client,
    function_identity: String,
}

impl CloudWatchMetricsSink {
    pub fn new(client: aws_sdk_cloudwatch::Client, function_identity: impl Into<String>) -> Self {
        Self {
            client,
            function_identity: function_identity.into(),
        }
    }

    pub fn from_aws(config: &aws_config::SdkConfig, function_identity: impl Into<String>) -> Self {
        Self::new(aws_sdk_cloudwatch::Client::new(config), function_identity)
    }
}

#[async_trait]
impl MetricsSink for CloudWatchMetricsSink {
    async fn increment(&self, metric_name: &str) -> Result<()> {
        let datum = MetricDatum::builder()
            .metric_name(metric_name)
            .dimensions(
                Dimension::builder()
                    .name("FunctionName")
                    .value(&self.function_identity)
                    .build(),
            )
            .value(1.0)
            .unit(StandardUnit::Count)
            .build();

        self.client
            .put_metric_data()
            .namespace(METRIC_NAMESPACE)
            .metric_data(datum)
            .send()
            .await
            .map_err(|e| crate::Error::transport(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::envelope::JobResult;
    use serde_json::json;

    fn job_result(state: Option<&str>, failed: Option<Vec<serde_json::Value>>) -> CallbackPayload {
        CallbackPayload::JobResult(JobResult {
            state: state.map(String::from),
            failed_tasks: failed,
            extra: Default::default(),
        })
    }

    #[test]
    fn test_successful_result_not_flagged() {
        assert!(!job_failure_signaled(&job_result(Some("DONE"), None)));
        assert!(!job_failure_signaled(&job_result(
            Some("DONE"),
            Some(vec![])
        )));
    }

    #[test]
    fn test_non_success_state_flagged() {
        assert!(job_failure_signaled(&job_result(Some("ERROR"), None)));
        assert!(job_failure_signaled(&job_result(Some("TIMED_OUT"), None)));
    }

    #[test]
    fn test_failed_tasks_flagged_even_when_done() {
        assert!(job_failure_signaled(&job_result(
            Some("DONE"),
            Some(vec![json!({"Task": "Copy"})])
        )));
    }

    #[test]
    fn test_missing_state_without_failures_not_flagged() {
        assert!(!job_failure_signaled(&job_result(None, None)));
    }

    #[test]
    fn test_non_result_payloads_never_flagged() {
        assert!(!job_failure_signaled(&CallbackPayload::JobReceived(json!({
            "State": "ERROR"
        }))));
        assert!(!job_failure_signaled(&CallbackPayload::TaskResult(json!({
            "FailedTasks": [1]
        }))));
    }
}
