//! Agent task records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use taskgraph_core::NodeResult;
use uuid::Uuid;

/// Default per-task execution timeout
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// Agent roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Research,
    Analysis,
    Synthesis,
    FactCheck,
    Code,
    Creative,
    Planning,
    Coordination,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Research => "research",
            AgentKind::Analysis => "analysis",
            AgentKind::Synthesis => "synthesis",
            AgentKind::FactCheck => "fact_check",
            AgentKind::Code => "code",
            AgentKind::Creative => "creative",
            AgentKind::Planning => "planning",
            AgentKind::Coordination => "coordination",
        }
    }
}

/// Task lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Idle,
    Working,
    Completed,
    Failed,
    Waiting,
    Blocked,
}

/// Advisory dispatch priority within a ready wave
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskPriority {
    Low = 1,
    Normal = 2,
    High = 3,
    Critical = 4,
}

/// One unit of work in a multi-agent DAG
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub task_id: String,
    pub agent_kind: AgentKind,
    /// Free-form subtype the agent interprets (e.g. `literature_review`)
    pub task_kind: String,
    pub description: String,
    pub input: Value,
    pub dependencies: BTreeSet<String>,
    pub priority: TaskPriority,
    #[serde(skip, default = "default_timeout")]
    pub timeout: Duration,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub result: Option<NodeResult>,
}

fn default_timeout() -> Duration {
    DEFAULT_TASK_TIMEOUT
}

impl AgentTask {
    pub fn new(agent_kind: AgentKind, task_kind: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::new_v4().to_string(),
            agent_kind,
            task_kind: task_kind.into(),
            description: String::new(),
            input: Value::Null,
            dependencies: BTreeSet::new(),
            priority: TaskPriority::Normal,
            timeout: DEFAULT_TASK_TIMEOUT,
            retry_count: 0,
            max_retries: 2,
            created_at: now,
            updated_at: now,
            status: TaskStatus::Idle,
            result: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.task_id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ready iff every dependency completed and the task itself is runnable
    pub fn is_ready(&self, completed: &HashSet<String>) -> bool {
        matches!(self.status, TaskStatus::Idle | TaskStatus::Waiting)
            && self.dependencies.iter().all(|dep| completed.contains(dep))
    }

    /// Whether the retry budget allows another attempt
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn update_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// String field from the task input bag
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_defaults() {
        let task = AgentTask::new(AgentKind::Research, "general_research");
        assert_eq!(task.status, TaskStatus::Idle);
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.max_retries, 2);
        assert_eq!(task.priority, TaskPriority::Normal);
        assert!(task.dependencies.is_empty());
        assert!(task.result.is_none());
    }

    #[test]
    fn test_readiness_requires_completed_dependencies() {
        let task = AgentTask::new(AgentKind::Analysis, "deep_analysis")
            .with_id("analyze")
            .with_dependencies(["research"]);

        let mut completed = HashSet::new();
        assert!(!task.is_ready(&completed));

        completed.insert("research".to_string());
        assert!(task.is_ready(&completed));
    }

    #[test]
    fn test_readiness_requires_runnable_status() {
        let mut task = AgentTask::new(AgentKind::Research, "r").with_id("r1");
        let completed = HashSet::new();

        assert!(task.is_ready(&completed));

        task.update_status(TaskStatus::Working);
        assert!(!task.is_ready(&completed));

        task.update_status(TaskStatus::Waiting);
        assert!(task.is_ready(&completed));

        task.update_status(TaskStatus::Failed);
        assert!(!task.is_ready(&completed));
    }

    #[test]
    fn test_retry_budget() {
        let mut task = AgentTask::new(AgentKind::Code, "generate").with_max_retries(2);
        assert!(task.can_retry());
        task.retry_count = 2;
        assert!(!task.can_retry());
    }

    #[test]
    fn test_update_status_touches_timestamp() {
        let mut task = AgentTask::new(AgentKind::Planning, "plan");
        let before = task.updated_at;
        task.update_status(TaskStatus::Working);
        assert!(task.updated_at >= before);
        assert_eq!(task.status, TaskStatus::Working);
    }

    #[test]
    fn test_input_str() {
        let task = AgentTask::new(AgentKind::Research, "r")
            .with_input(json!({"query": "rust agents", "depth": 3}));
        assert_eq!(task.input_str("query"), Some("rust agents"));
        assert_eq!(task.input_str("depth"), None);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Critical > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Normal);
        assert!(TaskPriority::Normal > TaskPriority::Low);
    }
}
