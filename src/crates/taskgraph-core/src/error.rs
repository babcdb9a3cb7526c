//! Error types for graph construction and execution
//!
//! Only graph compilation surfaces errors to callers; execution failures are
//! recorded in-band on the [`ExecutionState`](crate::ExecutionState) and never
//! cross the engine boundary as `Err`.

use thiserror::Error;

/// Errors that can occur during graph construction, validation and execution
#[derive(Debug, Error)]
pub enum GraphError {
    /// Graph structure is invalid
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// A referenced node does not exist
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// General execution error (programming errors only; node failures are
    /// recorded on the state instead)
    #[error("Execution error: {0}")]
    Execution(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
