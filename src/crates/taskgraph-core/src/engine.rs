//! Graph execution engine
//!
//! Compiles a [`Graph`] into a runnable plan and executes it one node at a
//! time against a single owned [`ExecutionState`]. The engine enforces the
//! run deadline at every node boundary, routes recoverable failures through
//! the error handler, and trips a circuit breaker when the execution path
//! grows past its cap so a pathological routing loop can never spin forever.
//!
//! The engine never raises through its boundary: compilation returns
//! `Result`, but `run` records every failure on the state and returns a
//! plain report.

use crate::error::GraphError;
use crate::graph::{Edge, Graph, END, START};
use crate::node::{NodeStats, NodeStatsSnapshot};
use crate::state::ExecutionState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tooling::timeout::TimeBudget;
use tracing::{debug, warn};

/// Default cap on execution path length
pub const DEFAULT_MAX_PATH_LEN: usize = 15;

/// Aggregate statistics for one graph instance
///
/// Observability only; never consulted for routing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStatsSnapshot {
    pub executions: u64,
    pub successes: u64,
    pub total_execution_time: f64,
    pub avg_execution_time: f64,
}

/// Outcome summary of one run
#[derive(Debug, Clone, Default)]
pub struct GraphRunReport {
    /// No fatal errors and a non-empty final response
    pub success: bool,
    /// The run deadline expired mid-run
    pub deadline_exceeded: bool,
    /// The path-length circuit breaker fired
    pub circuit_breaker_tripped: bool,
    /// Nodes executed, excluding the start and end sentinels
    pub nodes_executed: usize,
}

#[derive(Debug, Default)]
struct GraphStatsInner {
    executions: u64,
    successes: u64,
    total_time: f64,
}

/// Compiled, runnable graph
pub struct GraphEngine {
    name: String,
    graph: Graph,
    max_path_len: usize,
    stats: Mutex<GraphStatsInner>,
    node_stats: HashMap<String, NodeStats>,
}

impl GraphEngine {
    /// Validate and compile a graph
    pub fn compile(name: impl Into<String>, graph: Graph) -> Result<Self, GraphError> {
        graph.validate()?;
        let node_stats = graph
            .nodes
            .keys()
            .map(|k| (k.clone(), NodeStats::new()))
            .collect();
        Ok(Self {
            name: name.into(),
            graph,
            max_path_len: DEFAULT_MAX_PATH_LEN,
            stats: Mutex::new(GraphStatsInner::default()),
            node_stats,
        })
    }

    /// Override the execution path cap
    pub fn with_max_path_len(mut self, cap: usize) -> Self {
        self.max_path_len = cap;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Aggregate statistics for this graph instance
    pub fn stats(&self) -> GraphStatsSnapshot {
        let inner = self.stats.lock();
        GraphStatsSnapshot {
            executions: inner.executions,
            successes: inner.successes,
            total_execution_time: inner.total_time,
            avg_execution_time: if inner.executions == 0 {
                0.0
            } else {
                inner.total_time / inner.executions as f64
            },
        }
    }

    /// Counters for one node of this graph instance
    pub fn node_stats(&self, name: &str) -> Option<NodeStatsSnapshot> {
        self.node_stats.get(name).map(|s| s.snapshot())
    }

    /// Execute the graph to completion or deadline against the given state
    ///
    /// Failures never propagate as `Err`; they are recorded on the state and
    /// summarized in the returned report.
    pub async fn run(&self, state: &mut ExecutionState) -> GraphRunReport {
        let run_start = Instant::now();
        let budget = TimeBudget::new(Duration::from_secs_f64(
            state.max_execution_time.max(0.0),
        ));
        let mut report = GraphRunReport::default();

        state.execution_path.push(START.to_string());

        let mut current = match self.route_from(START, state) {
            Some(node) => node,
            None => {
                state.append_error("engine", "no entry route from start", false);
                self.finish_run(state, run_start, &mut report);
                return report;
            }
        };
        let mut handler_visited = false;
        let mut force_end_after_handler = false;
        let mut fatal = false;

        loop {
            if current == END {
                state.execution_path.push(END.to_string());
                break;
            }

            let node = match self.graph.nodes.get(&current) {
                Some(node) => node.clone(),
                None => {
                    state.append_error("engine", format!("unknown node {}", current), false);
                    fatal = true;
                    break;
                }
            };

            state.execution_path.push(current.clone());
            report.nodes_executed += 1;

            let started = Instant::now();
            let mut result = match budget.remaining() {
                None => {
                    report.deadline_exceeded = true;
                    state.append_error(
                        &current,
                        format!(
                            "run deadline of {:.1}s exceeded before node execution",
                            state.max_execution_time
                        ),
                        false,
                    );
                    break;
                }
                Some(remaining) => {
                    match tokio::time::timeout(remaining, node.execute(state)).await {
                        Ok(result) => result,
                        Err(_) => {
                            report.deadline_exceeded = true;
                            state.append_error(
                                &current,
                                format!(
                                    "run deadline of {:.1}s exceeded during node execution",
                                    state.max_execution_time
                                ),
                                false,
                            );
                            break;
                        }
                    }
                }
            };

            let elapsed = started.elapsed().as_secs_f64();
            if result.execution_time == 0.0 {
                result.execution_time = elapsed;
            }

            state.add_time(&current, result.execution_time);
            if result.cost > 0.0 {
                state.add_cost(&current, result.cost);
            }
            if result.confidence > 0.0 {
                state.set_confidence(&current, result.confidence);
            }
            if let Some(model) = &result.model_used {
                state.models_used.insert(model.clone());
            }
            if let Some(stats) = self.node_stats.get(&current) {
                stats.record(result.success, elapsed);
            }

            let success = result.success;
            let recoverable = result.recoverable;
            if !success {
                let message = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown node failure".to_string());
                warn!(graph = %self.name, node = %current, error = %message, "node failed");
                state.append_error(&current, message, recoverable);
            }
            state.record_result(&current, result);

            let at_handler = Some(current.as_str()) == self.graph.error_handler.as_deref();

            if force_end_after_handler && at_handler {
                current = END.to_string();
                continue;
            }

            if !success {
                if !recoverable {
                    fatal = true;
                    break;
                }
                if at_handler {
                    // Handler itself failed; nothing left to try
                    break;
                }
                match (&self.graph.error_handler, handler_visited) {
                    (Some(handler), false) => {
                        handler_visited = true;
                        current = handler.clone();
                        continue;
                    }
                    _ => break,
                }
            }

            // Circuit breaker: leave room for the handler and end sentinels
            if state.execution_path.len() + 2 >= self.max_path_len {
                report.circuit_breaker_tripped = true;
                state.append_error(
                    "engine",
                    format!(
                        "circuit-breaker-tripped: execution path reached {} nodes",
                        state.execution_path.len()
                    ),
                    true,
                );
                match (&self.graph.error_handler, at_handler) {
                    (Some(handler), false) => {
                        force_end_after_handler = true;
                        handler_visited = true;
                        current = handler.clone();
                    }
                    _ => {
                        current = END.to_string();
                    }
                }
                continue;
            }

            current = match self.route_from(&current, state) {
                Some(next) => next,
                None => {
                    // Routing label with no branch: default to the handler
                    state.append_warning(&current, "no branch for routing label");
                    match (&self.graph.error_handler, handler_visited) {
                        (Some(handler), false) => {
                            handler_visited = true;
                            force_end_after_handler = true;
                            handler.clone()
                        }
                        _ => {
                            state.append_error(&current, "no route onward", false);
                            fatal = true;
                            break;
                        }
                    }
                }
            };
        }

        report.success = !fatal && !report.deadline_exceeded && !state.final_response.is_empty();
        self.finish_run(state, run_start, &mut report);
        report
    }

    fn finish_run(&self, state: &ExecutionState, run_start: Instant, report: &mut GraphRunReport) {
        let elapsed = run_start.elapsed().as_secs_f64();
        let mut stats = self.stats.lock();
        stats.executions += 1;
        if report.success {
            stats.successes += 1;
        }
        stats.total_time += elapsed;
        debug!(
            graph = %self.name,
            request_id = %state.request_id,
            success = report.success,
            nodes = report.nodes_executed,
            elapsed_secs = elapsed,
            "graph run finished"
        );
    }

    /// Resolve the first outgoing edge of a node against the current state
    fn route_from(&self, from: &str, state: &ExecutionState) -> Option<String> {
        let edges = self.graph.edges.get(from)?;
        match edges.first()? {
            Edge::Direct(to) => Some(to.clone()),
            Edge::Conditional { route, branches } => {
                let label = route(state);
                branches.get(&label).cloned()
            }
        }
    }
}
