//! Agent implementations behind a single dispatch function
//!
//! Agent roles are a closed set, so dispatch is a plain match over
//! [`AgentKind`] rather than a trait-object registry. Every agent receives
//! the task plus a read-only snapshot of the execution state as it stood at
//! the start of the current wave; results are merged back into the live
//! state by the scheduler between waves.

mod analysis;
mod content;
mod planning;
mod research;

use crate::task::{AgentKind, AgentTask};
use models::{ModelResult, TextGenerator};
use serde_json::Value;
use std::sync::Arc;
use taskgraph_core::{ExecutionState, NodeResult};

/// Services injected into every agent
#[derive(Clone)]
pub struct AgentContext {
    pub generator: Arc<dyn TextGenerator>,
}

impl AgentContext {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

/// Execute one task with the agent its kind names
///
/// Never raises; model failures come back as failed results for the
/// scheduler's retry bookkeeping.
pub async fn run_agent(
    ctx: &AgentContext,
    task: &AgentTask,
    state: &ExecutionState,
) -> NodeResult {
    match task.agent_kind {
        AgentKind::Research => research::run_research(ctx, task, state).await,
        AgentKind::FactCheck => research::run_fact_check(ctx, task, state).await,
        AgentKind::Analysis => analysis::run_analysis(ctx, task, state).await,
        AgentKind::Synthesis => analysis::run_synthesis(ctx, task, state).await,
        AgentKind::Code => content::run_code(ctx, task, state).await,
        AgentKind::Creative => content::run_creative(ctx, task, state).await,
        AgentKind::Planning => planning::run_planning(ctx, task, state).await,
        AgentKind::Coordination => planning::run_coordination(ctx, task, state).await,
    }
}

/// The question this task is about
///
/// Falls back from the task input to the run's processed query.
pub(crate) fn task_query<'a>(task: &'a AgentTask, state: &'a ExecutionState) -> &'a str {
    task.input_str("query")
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| {
            if task.description.is_empty() {
                &state.processed_query
            } else {
                &task.description
            }
        })
}

/// Output texts of this task's completed dependencies, in dependency order
pub(crate) fn dependency_texts(task: &AgentTask, state: &ExecutionState) -> Vec<String> {
    task.dependencies
        .iter()
        .filter_map(|dep| state.intermediate(dep))
        .filter_map(|data| data.get("text").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .collect()
}

/// Length-scaled confidence heuristic
///
/// Longer substantive output earns a modest bump over the base, capped well
/// below certainty.
pub(crate) fn length_confidence(text: &str, base: f64) -> f64 {
    (base + (text.len() as f64 / 4000.0).min(0.25)).min(0.95)
}

/// Fold a successful model call into a node result
pub(crate) fn completed(model: &ModelResult, data: Value, confidence: f64) -> NodeResult {
    NodeResult::success(data)
        .with_confidence(confidence)
        .with_cost(model.cost)
        .with_execution_time(model.execution_time)
        .with_model(model.model_used.clone())
}

/// Convert a failed model call into a failed node result
pub(crate) fn failed(task: &AgentTask, model: &ModelResult) -> NodeResult {
    NodeResult::failure(format!(
        "{} agent failed: {}",
        task.agent_kind.as_str(),
        model
            .error
            .clone()
            .unwrap_or_else(|| "model call failed".to_string())
    ))
    .with_execution_time(model.execution_time)
}

/// Truncate a source text for prompt embedding
pub(crate) fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskgraph_core::QualityLevel;

    #[test]
    fn test_task_query_fallback_chain() {
        let state = ExecutionState::new("state query", 1.0, 30.0, QualityLevel::Balanced);

        let task = AgentTask::new(AgentKind::Research, "r")
            .with_input(serde_json::json!({"query": "input query"}));
        assert_eq!(task_query(&task, &state), "input query");

        let task = AgentTask::new(AgentKind::Research, "r").with_description("task description");
        assert_eq!(task_query(&task, &state), "task description");

        let task = AgentTask::new(AgentKind::Research, "r");
        assert_eq!(task_query(&task, &state), "state query");
    }

    #[test]
    fn test_dependency_texts_reads_intermediates() {
        let mut state = ExecutionState::new("q", 1.0, 30.0, QualityLevel::Balanced);
        state.set_intermediate("a", serde_json::json!({"text": "findings from a"}));
        state.set_intermediate("b", serde_json::json!({"no_text": true}));

        let task = AgentTask::new(AgentKind::Analysis, "deep").with_dependencies(["a", "b", "c"]);
        let texts = dependency_texts(&task, &state);
        assert_eq!(texts, vec!["findings from a"]);
    }

    #[test]
    fn test_length_confidence_bounds() {
        assert!(length_confidence("", 0.6) >= 0.6);
        let long = "x".repeat(100_000);
        assert!(length_confidence(&long, 0.7) <= 0.95);
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        assert_eq!(clip("hello", 3), "hel");
        assert_eq!(clip("hi", 10), "hi");
        assert_eq!(clip("héllo", 2), "hé");
    }
}
