//! Callback envelope construction.
//!
//! Every delivery carries the same envelope regardless of transport: a
//! `Time`/`Timestamp` pair captured once when the envelope is built, plus the
//! payload under its kind tag. Building the envelope once and reusing it for
//! the whole delivery keeps the timestamps consistent across redirects and
//! retries.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::{Error, Result};

/// Terminal success state reported by the orchestrator.
pub const SUCCESS_STATE: &str = "DONE";

/// A callback payload, tagged by its kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CallbackPayload {
    /// Acknowledgement that a job was accepted.
    JobReceived(Value),
    /// Result of a single task within a job.
    TaskResult(Value),
    /// Final result of a whole job.
    JobResult(JobResult),
}

/// Final job result, with the fields the failure detector inspects. Everything
/// else passes through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct JobResult {
    #[serde(rename = "State", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(rename = "FailedTasks", skip_serializing_if = "Option::is_none")]
    pub failed_tasks: Option<Vec<Value>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl CallbackPayload {
    /// Parse a raw callback message into a known payload kind.
    ///
    /// Messages whose single top-level key is not a recognized kind are
    /// rejected here so no transport ever sees an unclassifiable payload.
    pub fn from_message(message: Value) -> Result<Self> {
        serde_json::from_value(message).map_err(|e| Error::UnsupportedPayload(e.to_string()))
    }

    /// Stable label for the payload kind, used for event detail types and
    /// storage object names.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::JobReceived(_) => PayloadKind::JobReceived,
            Self::TaskResult(_) => PayloadKind::TaskResult,
            Self::JobResult(_) => PayloadKind::JobResult,
        }
    }
}

/// Payload kind, independent of the payload body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    JobReceived,
    TaskResult,
    JobResult,
}

/// The wire envelope. `Time` and `Timestamp` describe the same instant; the
/// payload is flattened in under its kind tag.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(rename = "Time", serialize_with = "serialize_iso8601")]
    time: DateTime<Utc>,

    #[serde(rename = "Timestamp")]
    timestamp: f64,

    #[serde(flatten)]
    payload: CallbackPayload,
}

impl Envelope {
    /// Wrap a payload, capturing the current instant.
    pub fn new(payload: CallbackPayload) -> Self {
        Self::at(payload, Utc::now())
    }

    /// Wrap a payload at an explicit instant.
    pub fn at(payload: CallbackPayload, time: DateTime<Utc>) -> Self {
        let timestamp = time.timestamp_millis() as f64 / 1000.0;
        Self {
            time,
            timestamp,
            payload,
        }
    }

    pub fn payload(&self) -> &CallbackPayload {
        &self.payload
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Serialize the whole envelope to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn serialize_iso8601<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
}
