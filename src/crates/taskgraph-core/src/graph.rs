//! Graph structure: nodes, edges and validation
//!
//! A graph is a set of named nodes connected by edges. Edges come in two
//! kinds: *direct* (unconditional) and *conditional* (a pure routing function
//! over the state selects a labelled branch). Cycles are permitted only
//! through the designated error-handler node; everywhere else the graph must
//! be acyclic.

use crate::error::GraphError;
use crate::node::GraphNode;
use crate::state::ExecutionState;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Virtual entry node name
pub const START: &str = "start";

/// Virtual terminal node name
pub const END: &str = "end";

/// Routing function for conditional edges
///
/// Pure over the state: returns the label of the branch to follow.
pub type RouteFn = Arc<dyn Fn(&ExecutionState) -> String + Send + Sync>;

/// Edge between two nodes
#[derive(Clone)]
pub enum Edge {
    /// Unconditional transition
    Direct(String),

    /// State-dependent transition: `route` picks a label, `branches` maps
    /// labels to target nodes. A label with no branch routes to the error
    /// handler.
    Conditional {
        route: RouteFn,
        branches: HashMap<String, String>,
    },
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(to) => f.debug_tuple("Direct").field(to).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("route", &"<function>")
                .field("branches", branches)
                .finish(),
        }
    }
}

/// Graph under construction
///
/// Build with [`add_node`](Self::add_node) and the edge methods, then hand to
/// [`GraphEngine::compile`](crate::engine::GraphEngine::compile) which runs
/// [`validate`](Self::validate).
#[derive(Default)]
pub struct Graph {
    pub(crate) nodes: HashMap<String, Arc<dyn GraphNode>>,
    pub(crate) edges: HashMap<String, Vec<Edge>>,
    pub(crate) error_handler: Option<String>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, keyed by its own name
    pub fn add_node(&mut self, node: Arc<dyn GraphNode>) -> &mut Self {
        self.nodes.insert(node.name().to_string(), node);
        self
    }

    /// Add a direct edge
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.edges
            .entry(from.into())
            .or_default()
            .push(Edge::Direct(to.into()));
        self
    }

    /// Add a conditional edge with a routing function and labelled branches
    pub fn add_conditional_edge(
        &mut self,
        from: impl Into<String>,
        route: RouteFn,
        branches: HashMap<String, String>,
    ) -> &mut Self {
        self.edges
            .entry(from.into())
            .or_default()
            .push(Edge::Conditional { route, branches });
        self
    }

    /// Designate the error-handler node
    ///
    /// The handler receives control on recoverable node failures and on
    /// routing labels with no matching branch. It is the only node through
    /// which cycles are tolerated.
    pub fn set_error_handler(&mut self, name: impl Into<String>) -> &mut Self {
        self.error_handler = Some(name.into());
        self
    }

    /// Validate the graph structure
    ///
    /// Checks that:
    /// - a unique entry edge leaves [`START`]
    /// - every edge endpoint refers to a registered node (or START/END)
    /// - every registered node has at least one outgoing edge
    /// - [`END`] is reachable from [`START`]
    /// - the graph is acyclic once the error handler is excluded
    /// - the designated error handler, if any, is a registered node
    pub fn validate(&self) -> Result<(), GraphError> {
        let start_edges = self
            .edges
            .get(START)
            .ok_or_else(|| GraphError::Validation("no entry edge from start".to_string()))?;
        if start_edges.len() != 1 {
            return Err(GraphError::Validation(format!(
                "expected exactly one entry edge from start, found {}",
                start_edges.len()
            )));
        }

        if let Some(handler) = &self.error_handler {
            if !self.nodes.contains_key(handler) {
                return Err(GraphError::NodeNotFound(handler.clone()));
            }
        }

        for (from, edges) in &self.edges {
            if from != START && !self.nodes.contains_key(from) {
                return Err(GraphError::Validation(format!(
                    "edge source {} does not exist",
                    from
                )));
            }
            for edge in edges {
                for to in Self::edge_targets(edge) {
                    if to != END && !self.nodes.contains_key(to) {
                        return Err(GraphError::Validation(format!(
                            "edge target {} does not exist",
                            to
                        )));
                    }
                }
            }
        }

        for name in self.nodes.keys() {
            if !self.edges.contains_key(name) {
                return Err(GraphError::Validation(format!(
                    "node {} has no outgoing edge",
                    name
                )));
            }
        }

        if !self.end_reachable() {
            return Err(GraphError::Validation(
                "end is not reachable from start".to_string(),
            ));
        }

        self.check_acyclic()?;

        Ok(())
    }

    fn edge_targets(edge: &Edge) -> Vec<&str> {
        match edge {
            Edge::Direct(to) => vec![to.as_str()],
            Edge::Conditional { branches, .. } => {
                branches.values().map(|s| s.as_str()).collect()
            }
        }
    }

    fn end_reachable(&self) -> bool {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(START);

        while let Some(current) = queue.pop_front() {
            if current == END {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(edges) = self.edges.get(current) {
                for edge in edges {
                    for target in Self::edge_targets(edge) {
                        queue.push_back(target);
                    }
                }
            }
        }
        false
    }

    /// Cycle detection over all nodes except the error handler
    fn check_acyclic(&self) -> Result<(), GraphError> {
        let skip = self.error_handler.as_deref();
        let mut visiting: HashSet<&str> = HashSet::new();
        let mut done: HashSet<&str> = HashSet::new();

        fn visit<'a>(
            graph: &'a Graph,
            node: &'a str,
            skip: Option<&str>,
            visiting: &mut HashSet<&'a str>,
            done: &mut HashSet<&'a str>,
        ) -> Result<(), GraphError> {
            if node == END || Some(node) == skip || done.contains(node) {
                return Ok(());
            }
            if !visiting.insert(node) {
                return Err(GraphError::Validation(format!(
                    "cycle detected through node {}",
                    node
                )));
            }
            if let Some(edges) = graph.edges.get(node) {
                for edge in edges {
                    for target in Graph::edge_targets(edge) {
                        visit(graph, target, skip, visiting, done)?;
                    }
                }
            }
            visiting.remove(node);
            done.insert(node);
            Ok(())
        }

        visit(self, START, skip, &mut visiting, &mut done)
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("error_handler", &self.error_handler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::NodeResult;
    use async_trait::async_trait;

    struct Noop {
        name: String,
    }

    #[async_trait]
    impl GraphNode for Noop {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(&self, _state: &mut ExecutionState) -> NodeResult {
            NodeResult::success(serde_json::Value::Null)
        }
    }

    fn noop(name: &str) -> Arc<dyn GraphNode> {
        Arc::new(Noop {
            name: name.to_string(),
        })
    }

    #[test]
    fn test_linear_graph_validates() {
        let mut graph = Graph::new();
        graph.add_node(noop("a"));
        graph.add_node(noop("b"));
        graph.add_edge(START, "a");
        graph.add_edge("a", "b");
        graph.add_edge("b", END);

        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_missing_entry_edge() {
        let mut graph = Graph::new();
        graph.add_node(noop("a"));
        graph.add_edge("a", END);

        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_dangling_edge_target() {
        let mut graph = Graph::new();
        graph.add_node(noop("a"));
        graph.add_edge(START, "a");
        graph.add_edge("a", "missing");

        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_node_without_outgoing_edge() {
        let mut graph = Graph::new();
        graph.add_node(noop("a"));
        graph.add_node(noop("sink"));
        graph.add_edge(START, "a");
        graph.add_edge("a", END);

        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_unreachable_end() {
        let mut graph = Graph::new();
        graph.add_node(noop("a"));
        graph.add_node(noop("b"));
        graph.add_edge(START, "a");
        graph.add_edge("a", "b");
        graph.add_edge("b", "a");

        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_cycle_rejected_outside_error_handler() {
        let mut graph = Graph::new();
        graph.add_node(noop("a"));
        graph.add_node(noop("b"));
        graph.add_edge(START, "a");
        graph.add_edge("a", "b");
        graph.add_edge("b", "a");
        graph.add_edge("b", END);

        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_cycle_through_error_handler_allowed() {
        let mut graph = Graph::new();
        graph.add_node(noop("a"));
        graph.add_node(noop("handler"));
        graph.add_edge(START, "a");
        graph.add_edge("a", END);
        graph.add_edge("handler", "a");
        graph.set_error_handler("handler");

        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_conditional_branch_targets_checked() {
        let mut graph = Graph::new();
        graph.add_node(noop("router"));
        graph.add_edge(START, "router");
        graph.add_conditional_edge(
            "router",
            Arc::new(|_s: &ExecutionState| "left".to_string()),
            HashMap::from([
                ("left".to_string(), END.to_string()),
                ("right".to_string(), "missing".to_string()),
            ]),
        );

        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_unknown_error_handler_rejected() {
        let mut graph = Graph::new();
        graph.add_node(noop("a"));
        graph.add_edge(START, "a");
        graph.add_edge("a", END);
        graph.set_error_handler("ghost");

        assert!(matches!(
            graph.validate(),
            Err(GraphError::NodeNotFound(_))
        ));
    }
}
