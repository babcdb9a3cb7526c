//! Execution state threaded through one graph run
//!
//! The state is created by the edge when a request arrives, mutated
//! exclusively by the node currently executing (the engine serializes access
//! by running nodes in a total order), read by downstream nodes, and finally
//! serialized back to the edge. It is discarded when the run returns.
//!
//! Accounting invariant: `sum(costs_incurred) + cost_budget_remaining`
//! always equals the initial budget, compared with [`BUDGET_EPSILON`] to
//! absorb floating drift.

use crate::result::NodeResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Epsilon for budget comparisons
pub const BUDGET_EPSILON: f64 = 1e-9;

/// Conversation history cap in turns
pub const MAX_HISTORY_TURNS: usize = 20;

/// Conversation history cap in bytes of content
pub const MAX_HISTORY_BYTES: usize = 8 * 1024;

/// One turn of a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Classified intent of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Conversation,
    Question,
    Code,
    Analysis,
    Request,
    Creative,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Conversation => "conversation",
            Intent::Question => "question",
            Intent::Code => "code",
            Intent::Analysis => "analysis",
            Intent::Request => "request",
            Intent::Creative => "creative",
        }
    }

    /// Parse an intent label, tolerating surrounding noise from model output
    pub fn parse(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        for intent in [
            Intent::Conversation,
            Intent::Question,
            Intent::Code,
            Intent::Analysis,
            Intent::Request,
            Intent::Creative,
        ] {
            if lower.contains(intent.as_str()) {
                return Some(intent);
            }
        }
        None
    }
}

/// Quality requirement for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    /// Fastest response, basic quality
    Minimal,
    /// Good balance of speed and quality
    #[default]
    Balanced,
    /// High quality, reasonable speed
    High,
    /// Best quality, may be slower and more expensive
    Premium,
}

impl QualityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Minimal => "minimal",
            QualityLevel::Balanced => "balanced",
            QualityLevel::High => "high",
            QualityLevel::Premium => "premium",
        }
    }
}

impl std::str::FromStr for QualityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimal" => Ok(QualityLevel::Minimal),
            "balanced" => Ok(QualityLevel::Balanced),
            "high" => Ok(QualityLevel::High),
            "premium" => Ok(QualityLevel::Premium),
            other => Err(format!("unknown quality level: {}", other)),
        }
    }
}

/// An error or warning recorded against a node during a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionIssue {
    pub node: String,
    pub message: String,
    pub recoverable: bool,
}

/// The record threaded through one graph run
///
/// Single-writer by construction: only the node currently executing holds a
/// mutable reference, handed out by the engine in topological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
    // Identity
    pub request_id: String,
    pub correlation_id: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,

    // Input
    pub original_query: String,
    pub processed_query: String,
    pub conversation_history: Vec<ConversationTurn>,

    // Classification
    pub intent: Option<Intent>,
    pub complexity_score: f64,

    // Constraints
    pub initial_budget: f64,
    pub cost_budget_remaining: f64,
    pub max_execution_time: f64,
    pub quality_requirement: QualityLevel,

    // Accounting
    pub costs_incurred: HashMap<String, f64>,
    pub execution_times: HashMap<String, f64>,
    pub confidence_scores: HashMap<String, f64>,
    pub models_used: BTreeSet<String>,

    // Execution trace
    pub execution_path: Vec<String>,
    pub node_results: HashMap<String, NodeResult>,
    pub intermediate_results: HashMap<String, Value>,
    pub errors: Vec<ExecutionIssue>,
    pub warnings: Vec<ExecutionIssue>,

    // Output
    pub final_response: String,
    pub response_metadata: HashMap<String, Value>,
}

impl ExecutionState {
    /// Create a fresh state for one run
    pub fn new(
        query: impl Into<String>,
        budget: f64,
        max_execution_time: f64,
        quality: QualityLevel,
    ) -> Self {
        let query = query.into();
        Self {
            request_id: Uuid::new_v4().to_string(),
            correlation_id: Uuid::new_v4().to_string(),
            session_id: None,
            user_id: None,
            processed_query: query.clone(),
            original_query: query,
            conversation_history: Vec::new(),
            intent: None,
            complexity_score: 0.5,
            initial_budget: budget,
            cost_budget_remaining: budget,
            max_execution_time,
            quality_requirement: quality,
            costs_incurred: HashMap::new(),
            execution_times: HashMap::new(),
            confidence_scores: HashMap::new(),
            models_used: BTreeSet::new(),
            execution_path: Vec::new(),
            node_results: HashMap::new(),
            intermediate_results: HashMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            final_response: String::new(),
            response_metadata: HashMap::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Record cost against a node, decrementing the remaining budget
    ///
    /// Additive: repeated calls for the same node accumulate.
    pub fn add_cost(&mut self, node: &str, amount: f64) {
        if amount == 0.0 {
            return;
        }
        *self.costs_incurred.entry(node.to_string()).or_insert(0.0) += amount;
        self.cost_budget_remaining -= amount;
        if self.cost_budget_remaining < -BUDGET_EPSILON {
            tracing::warn!(
                node = node,
                remaining = self.cost_budget_remaining,
                "cost budget overrun"
            );
        }
    }

    /// Record execution time against a node (additive)
    pub fn add_time(&mut self, node: &str, seconds: f64) {
        *self.execution_times.entry(node.to_string()).or_insert(0.0) += seconds;
    }

    /// Record a confidence score for a node
    pub fn set_confidence(&mut self, node: &str, score: f64) {
        self.confidence_scores
            .insert(node.to_string(), score.clamp(0.0, 1.0));
    }

    /// Record a node result
    ///
    /// A prior result is replaced only when it was a failure and the new one
    /// is a success (retry-replaces-failure); otherwise the first write wins.
    pub fn record_result(&mut self, node: &str, result: NodeResult) {
        match self.node_results.get(node) {
            None => {
                self.node_results.insert(node.to_string(), result);
            }
            Some(prior) if !prior.success && result.success => {
                self.node_results.insert(node.to_string(), result);
            }
            Some(_) => {}
        }
    }

    /// Append an error against a node
    pub fn append_error(&mut self, node: &str, message: impl Into<String>, recoverable: bool) {
        self.errors.push(ExecutionIssue {
            node: node.to_string(),
            message: message.into(),
            recoverable,
        });
    }

    /// Append a warning against a node
    pub fn append_warning(&mut self, node: &str, message: impl Into<String>) {
        self.warnings.push(ExecutionIssue {
            node: node.to_string(),
            message: message.into(),
            recoverable: true,
        });
    }

    /// Stash a value for downstream nodes
    pub fn set_intermediate(&mut self, node: &str, value: Value) {
        self.intermediate_results.insert(node.to_string(), value);
    }

    /// Read a stashed value
    pub fn intermediate(&self, node: &str) -> Option<&Value> {
        self.intermediate_results.get(node)
    }

    /// Append a conversation turn, enforcing the history cap
    ///
    /// History is bounded to the most recent [`MAX_HISTORY_TURNS`] turns or
    /// [`MAX_HISTORY_BYTES`] of content, whichever binds first. Truncation
    /// records a `history-truncated` warning once per run.
    pub fn push_turn(&mut self, turn: ConversationTurn) {
        self.conversation_history.push(turn);
        let mut truncated = false;

        while self.conversation_history.len() > MAX_HISTORY_TURNS {
            self.conversation_history.remove(0);
            truncated = true;
        }
        while self.history_bytes() > MAX_HISTORY_BYTES && self.conversation_history.len() > 1 {
            self.conversation_history.remove(0);
            truncated = true;
        }

        if truncated
            && !self
                .warnings
                .iter()
                .any(|w| w.message == "history-truncated")
        {
            self.append_warning("context_manager", "history-truncated");
        }
    }

    fn history_bytes(&self) -> usize {
        self.conversation_history
            .iter()
            .map(|t| t.content.len())
            .sum()
    }

    /// Total cost incurred so far
    pub fn total_cost(&self) -> f64 {
        self.costs_incurred.values().sum()
    }

    /// Arithmetic mean of recorded confidences, or 0.0 when none exist
    pub fn avg_confidence(&self) -> f64 {
        if self.confidence_scores.is_empty() {
            return 0.0;
        }
        self.confidence_scores.values().sum::<f64>() / self.confidence_scores.len() as f64
    }

    /// Total wall-clock time recorded against nodes
    pub fn total_execution_time(&self) -> f64 {
        self.execution_times.values().sum()
    }

    /// Whether an additional cost still fits the initial budget
    pub fn within_budget(&self, extra_cost: f64) -> bool {
        self.total_cost() + extra_cost <= self.initial_budget + BUDGET_EPSILON
    }

    /// Set the final response
    ///
    /// Once set, only an error handler may overwrite it. Returns whether the
    /// write took effect.
    pub fn try_set_final_response(
        &mut self,
        text: impl Into<String>,
        from_error_handler: bool,
    ) -> bool {
        if self.final_response.is_empty() || from_error_handler {
            self.final_response = text.into();
            true
        } else {
            false
        }
    }

    /// Whether any fatal (non-recoverable) error was recorded
    pub fn has_fatal_error(&self) -> bool {
        self.errors.iter().any(|e| !e.recoverable)
    }
}
