//! Shared orchestrator input types.
//!
//! Every pipeline step receives a slice of the orchestrator's execution state.
//! The wire format uses PascalCase field names, mapped here via serde renames.

use serde::{Deserialize, Serialize};

/// Reference to an orchestrator resource (execution or state machine).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRef {
    #[serde(rename = "Id")]
    pub id: String,
}

/// Execution identifiers used to derive storage keys and event resources.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Full execution identifier (ARN-like, colon separated).
    pub execution_id: String,
    /// Full state machine identifier.
    pub state_machine_id: String,
    /// Iterator index when the invocation belongs to a task map state.
    pub task_iterator_index: Option<u32>,
}

impl ExecutionContext {
    /// Last colon-separated segment of the execution identifier.
    ///
    /// Storage keys and job names use the short form so they stay readable
    /// and independent of the account/region portions of the ARN.
    pub fn execution_short_id(&self) -> &str {
        self.execution_id
            .rsplit(':')
            .next()
            .unwrap_or(&self.execution_id)
    }
}

/// Derive the short execution id from a full execution identifier.
pub fn execution_short_id(execution_id: &str) -> &str {
    execution_id.rsplit(':').next().unwrap_or(execution_id)
}
