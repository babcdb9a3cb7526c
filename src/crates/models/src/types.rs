//! Shared model types: statuses, tiers, requests and results

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-call generation timeout
pub const DEFAULT_GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

/// Lifecycle status of a model on the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Unknown,
    Loading,
    Ready,
    Error,
    Unloaded,
}

/// Residency tier of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelTier {
    /// Always loaded
    T0,
    /// Keep warm
    T1,
    /// Load on demand
    T2,
}

/// Task kinds used for model selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SimpleClassification,
    QaAndSummary,
    AnalyticalReasoning,
    DeepResearch,
    CodeTasks,
    Multilingual,
    CreativeWriting,
    Conversation,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::SimpleClassification => "simple_classification",
            TaskType::QaAndSummary => "qa_and_summary",
            TaskType::AnalyticalReasoning => "analytical_reasoning",
            TaskType::DeepResearch => "deep_research",
            TaskType::CodeTasks => "code_tasks",
            TaskType::Multilingual => "multilingual",
            TaskType::CreativeWriting => "creative_writing",
            TaskType::Conversation => "conversation",
        }
    }
}

/// One generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stop: Vec<String>,
    pub timeout: Duration,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            max_tokens: 512,
            temperature: 0.7,
            stop: Vec::new(),
            timeout: DEFAULT_GENERATE_TIMEOUT,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Classified failure kinds for generation calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationErrorKind {
    Timeout,
    Connection,
    ModelUnavailable,
    Other,
}

/// Outcome of one generation call
///
/// Both success and failure travel through this record; the manager and the
/// client never raise for a failed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResult {
    pub success: bool,
    pub text: String,
    /// Wall-clock execution time in seconds
    pub execution_time: f64,
    pub model_used: String,
    pub tokens_generated: u32,
    pub tokens_per_second: f64,
    /// Currency units; zero for local models
    pub cost: f64,
    pub error: Option<String>,
    pub error_kind: Option<GenerationErrorKind>,
}

impl ModelResult {
    pub fn ok(
        model: impl Into<String>,
        text: impl Into<String>,
        execution_time: f64,
        tokens_generated: u32,
        tokens_per_second: f64,
    ) -> Self {
        Self {
            success: true,
            text: text.into(),
            execution_time,
            model_used: model.into(),
            tokens_generated,
            tokens_per_second,
            cost: 0.0,
            error: None,
            error_kind: None,
        }
    }

    pub fn failed(
        model: impl Into<String>,
        kind: GenerationErrorKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            text: String::new(),
            execution_time: 0.0,
            model_used: model.into(),
            tokens_generated: 0,
            tokens_per_second: 0.0,
            cost: 0.0,
            error: Some(error.into()),
            error_kind: Some(kind),
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

/// One chunk of a streaming generation
///
/// The stream terminates when `done` is true; the terminal chunk carries the
/// evaluation counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub text: String,
    pub done: bool,
    pub prompt_eval_count: Option<u32>,
    pub eval_count: Option<u32>,
    /// Total duration in nanoseconds, as reported by the backend
    pub total_duration: Option<u64>,
}

/// Convert backend nanoseconds to seconds
pub(crate) fn nanos_to_secs(nanos: u64) -> f64 {
    nanos as f64 / 1_000_000_000.0
}
