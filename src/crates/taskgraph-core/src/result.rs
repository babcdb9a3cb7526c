//! Node execution result types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A node's contribution to the execution state
///
/// Nodes never raise across the runtime boundary; success and failure are
/// both expressed through this record. `execution_time` and `cost` are
/// actual measurements, filled in by the node or by the engine wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResult {
    /// Whether the node completed its work
    pub success: bool,

    /// Typed bag of output data handed to downstream nodes
    pub data: Value,

    /// Self-assessed confidence in the output, 0..1
    pub confidence: f64,

    /// Wall-clock execution time in seconds
    pub execution_time: f64,

    /// Cost incurred by this node in currency units
    pub cost: f64,

    /// Model invoked by this node, if any
    pub model_used: Option<String>,

    /// Failure message when `success` is false
    pub error: Option<String>,

    /// Whether a failure should route through the error handler (true) or
    /// terminate the run (false). Ignored on success.
    pub recoverable: bool,
}

impl NodeResult {
    /// Successful result carrying output data
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data,
            confidence: 0.0,
            execution_time: 0.0,
            cost: 0.0,
            model_used: None,
            error: None,
            recoverable: true,
        }
    }

    /// Recoverable failure; the error handler will run
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            confidence: 0.0,
            execution_time: 0.0,
            cost: 0.0,
            model_used: None,
            error: Some(error.into()),
            recoverable: true,
        }
    }

    /// Fatal failure; the run terminates without the error handler
    pub fn fatal(error: impl Into<String>) -> Self {
        Self {
            recoverable: false,
            ..Self::failure(error)
        }
    }

    /// Set the confidence score
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set the measured execution time in seconds
    pub fn with_execution_time(mut self, seconds: f64) -> Self {
        self.execution_time = seconds;
        self
    }

    /// Set the incurred cost
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Set the model used
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_used = Some(model.into());
        self
    }

    /// Fetch a string field from the data bag
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}
