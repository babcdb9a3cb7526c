//! Outbound result schemas and the structured error object
//!
//! Every value leaving the core is fully materialized; errors are in-band
//! and carry a stable code, a user-safe message and the correlation id.
//! Internal detail never leaks into production error payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskgraph_core::{ConversationTurn, ExecutionIssue, ExecutionState};

/// Overall status of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// All nodes succeeded
    Success,
    /// Some nodes failed but a response exists
    Partial,
}

/// Accounting attached to every result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub cost: f64,
    pub execution_time: f64,
    pub models_used: Vec<String>,
    pub confidence: f64,
    pub cached: bool,
}

impl ResponseMetadata {
    pub fn from_state(state: &ExecutionState, execution_time: f64) -> Self {
        Self {
            cost: state.total_cost(),
            execution_time,
            models_used: state.models_used.iter().cloned().collect(),
            confidence: state.avg_confidence(),
            cached: false,
        }
    }
}

/// One error surfaced in a result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub code: String,
    pub node: String,
    pub message: String,
}

impl ErrorEntry {
    pub fn from_issue(issue: &ExecutionIssue) -> Self {
        Self {
            code: "NODE_ERROR".to_string(),
            node: issue.node.clone(),
            message: issue.message.clone(),
        }
    }
}

/// Result of `run_chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub response: String,
    pub session_id: Option<String>,
    pub conversation_history: Vec<ConversationTurn>,
    pub sources: Vec<String>,
    pub citations: Vec<String>,
    pub status: ResponseStatus,
    pub metadata: ResponseMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_hints: Option<Value>,
}

/// One search result row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Result of `run_search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub results: Vec<SearchResultItem>,
    pub summary: String,
    pub total_results: usize,
    pub search_time: f64,
    pub sources_consulted: Vec<String>,
    pub status: ResponseStatus,
    pub metadata: ResponseMetadata,
}

/// Result of `run_research`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub workflow_id: String,
    pub success: bool,
    pub research_results: String,
    pub detailed_results: Vec<Value>,
    pub confidence_score: f64,
    pub errors: Vec<ErrorEntry>,
    pub metadata: ResearchMetadata,
}

/// Research-specific accounting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchMetadata {
    pub execution_time: f64,
    pub agents_used: Vec<String>,
    pub task_count: usize,
    pub cost: f64,
}

/// Structured in-band error
///
/// `user_message` is always safe to show; internals stay in logs keyed by
/// the correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceError {
    pub error_code: String,
    pub user_message: String,
    pub suggestions: Vec<String>,
    pub correlation_id: String,
    pub execution_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<Value>,
}

impl ServiceError {
    pub fn validation(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            error_code: "VALIDATION_ERROR".to_string(),
            user_message: message.into(),
            suggestions: vec!["Adjust the request and try again".to_string()],
            correlation_id: correlation_id.into(),
            execution_time: 0.0,
            partial: None,
        }
    }

    pub fn deadline(
        operation_class: &str,
        elapsed: f64,
        correlation_id: impl Into<String>,
        partial: Option<Value>,
    ) -> Self {
        Self {
            error_code: "DEADLINE_EXCEEDED".to_string(),
            user_message: format!(
                "The {} operation took longer than its time budget ({:.1}s elapsed)",
                operation_class, elapsed
            ),
            suggestions: vec![
                "Try a simpler query".to_string(),
                "Raise the time budget".to_string(),
            ],
            correlation_id: correlation_id.into(),
            execution_time: elapsed,
            partial,
        }
    }

    pub fn internal(correlation_id: impl Into<String>, elapsed: f64) -> Self {
        Self {
            error_code: "INTERNAL_ERROR".to_string(),
            user_message: "Something went wrong handling the request".to_string(),
            suggestions: vec!["Try again shortly".to_string()],
            correlation_id: correlation_id.into(),
            execution_time: elapsed,
            partial: None,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code, self.user_message)
    }
}

impl std::error::Error for ServiceError {}
