//! Construction-time errors
//!
//! Only wiring and configuration raise; request-time failures travel in-band
//! as [`ServiceError`](crate::responses::ServiceError) values.

use thiserror::Error;

/// Errors while building the conductor
#[derive(Debug, Error)]
pub enum ConductorError {
    /// A request graph failed to compile
    #[error("Graph construction failed: {0}")]
    Graph(#[from] taskgraph_core::GraphError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] tooling::ToolingError),

    /// Backend client could not be built
    #[error("Model backend error: {0}")]
    Backend(#[from] models::ModelError),
}
