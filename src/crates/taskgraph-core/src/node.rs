//! Graph node trait and per-node statistics
//!
//! A node is one unit of work in a graph. It exposes a single operation,
//! [`GraphNode::execute`], which mutates the state it is handed and returns a
//! [`NodeResult`]. Nodes must not panic or raise across this boundary: any
//! internal failure is converted into a failed result. Retries are never a
//! node's concern; they belong to the scheduler or to explicit error-handler
//! edges.

use crate::result::NodeResult;
use crate::state::ExecutionState;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Role a node plays within a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Start,
    Processing,
    Decision,
    End,
    ErrorHandler,
}

/// One unit of work in a graph
#[async_trait]
pub trait GraphNode: Send + Sync {
    /// Unique name of this node within its graph
    fn name(&self) -> &str;

    /// Role of this node
    fn kind(&self) -> NodeKind {
        NodeKind::Processing
    }

    /// Execute against the current state
    ///
    /// The engine hands out the mutable reference one node at a time, so the
    /// state is never shared across concurrent nodes.
    async fn execute(&self, state: &mut ExecutionState) -> NodeResult;
}

/// Per-node invocation counters
///
/// Maintained by the engine as a side effect of execution; read-only to the
/// rest of the system.
#[derive(Debug, Default)]
pub struct NodeStats {
    inner: Mutex<NodeStatsInner>,
}

#[derive(Debug, Default, Clone)]
struct NodeStatsInner {
    executions: u64,
    successes: u64,
    total_time: f64,
}

/// Read-only snapshot of a node's counters
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStatsSnapshot {
    pub executions: u64,
    pub successes: u64,
    pub avg_execution_time: f64,
    pub success_rate: f64,
}

impl NodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invocation
    pub fn record(&self, success: bool, seconds: f64) {
        let mut inner = self.inner.lock();
        inner.executions += 1;
        if success {
            inner.successes += 1;
        }
        inner.total_time += seconds;
    }

    /// Snapshot the counters
    pub fn snapshot(&self) -> NodeStatsSnapshot {
        let inner = self.inner.lock().clone();
        let executions = inner.executions;
        NodeStatsSnapshot {
            executions,
            successes: inner.successes,
            avg_execution_time: if executions == 0 {
                0.0
            } else {
                inner.total_time / executions as f64
            },
            success_rate: if executions == 0 {
                1.0
            } else {
                inner.successes as f64 / executions as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_start_empty() {
        let stats = NodeStats::new();
        let snap = stats.snapshot();
        assert_eq!(snap.executions, 0);
        assert_eq!(snap.avg_execution_time, 0.0);
        assert_eq!(snap.success_rate, 1.0);
    }

    #[test]
    fn test_stats_record() {
        let stats = NodeStats::new();
        stats.record(true, 0.2);
        stats.record(false, 0.4);
        stats.record(true, 0.6);

        let snap = stats.snapshot();
        assert_eq!(snap.executions, 3);
        assert_eq!(snap.successes, 2);
        assert!((snap.avg_execution_time - 0.4).abs() < 1e-9);
        assert!((snap.success_rate - 2.0 / 3.0).abs() < 1e-9);
    }
}
