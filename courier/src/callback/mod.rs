//! Callback delivery subsystem.
//!
//! Pipeline steps report progress by sending callbacks to destinations the
//! original job request named. A callback request carries the destination
//! descriptor, the raw payload, and the execution identifiers; the service
//! wraps the payload in a timestamped envelope and hands it to exactly one
//! transport adapter.

pub mod adapters;
pub mod destination;
pub mod envelope;
pub mod metrics;
pub mod service;

pub use destination::{Destination, HttpDestination};
pub use envelope::{CallbackPayload, Envelope, PayloadKind};
pub use service::CallbackService;

use serde::Deserialize;
use serde_json::Value;

use crate::types::ResourceRef;

/// One callback invocation from the orchestrator.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackRequest {
    /// Raw destination descriptor; validated before anything else runs.
    #[serde(rename = "Callback")]
    pub callback: Value,

    /// Raw callback payload.
    #[serde(rename = "Message")]
    pub message: Option<Value>,

    #[serde(rename = "Execution")]
    pub execution: ResourceRef,

    #[serde(rename = "StateMachine")]
    pub state_machine: ResourceRef,

    /// Iterator index when this callback belongs to a task map state.
    #[serde(rename = "TaskIteratorIndex")]
    pub task_iterator_index: Option<u32>,
}
