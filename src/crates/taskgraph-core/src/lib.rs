//! Core graph execution engine for conductor
//!
//! This crate provides the substrate every request pipeline is built on:
//!
//! - [`ExecutionState`] - the typed, single-writer record threaded through one
//!   graph run, carrying costs, timings, confidences and the execution trace
//! - [`NodeResult`] - a node's contribution back to the state
//! - [`GraphNode`] - the unit-of-work trait with per-node statistics
//! - [`Graph`] - nodes plus static and conditional edges, with validation
//! - [`GraphEngine`] - the sequential executor with deadline enforcement,
//!   error-handler routing and a circuit breaker against predicate loops
//!
//! Graphs here are deliberately simple: one request, one state, one node at a
//! time. Parallelism lives a level up, in the multi-agent scheduler, which
//! runs whole waves of tasks against snapshots of this state.

pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod result;
pub mod state;

pub use engine::{GraphEngine, GraphRunReport, GraphStatsSnapshot};
pub use error::GraphError;
pub use graph::{Edge, Graph, RouteFn, END, START};
pub use node::{GraphNode, NodeKind, NodeStats, NodeStatsSnapshot};
pub use result::NodeResult;
pub use state::{
    ConversationTurn, ExecutionIssue, ExecutionState, Intent, QualityLevel, BUDGET_EPSILON,
};

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
