//! Planning and coordination agents

use super::{completed, failed, length_confidence, task_query, AgentContext};
use crate::task::AgentTask;
use models::TaskType;
use serde_json::json;
use taskgraph_core::{ExecutionState, NodeResult, QualityLevel};

/// Break an objective into an actionable plan
pub(super) async fn run_planning(
    ctx: &AgentContext,
    task: &AgentTask,
    state: &ExecutionState,
) -> NodeResult {
    let objective = task_query(task, state);
    let complexity = task.input_str("complexity").unwrap_or("standard");

    let prompt = format!(
        "You are a task management expert. Break down this objective into \
         actionable steps.\n\n\
         Objective: {}\n\
         Complexity level: {}\n\n\
         Provide:\n\
         1. The main work streams\n\
         2. Specific tasks within each, with priorities\n\
         3. Dependencies and sequencing between tasks\n\
         4. The deliverable each task produces\n\n\
         Make each task specific and measurable.",
        objective, complexity
    );

    let model = ctx
        .generator
        .generate_text(
            TaskType::AnalyticalReasoning,
            QualityLevel::Balanced,
            &prompt,
            700,
            0.4,
        )
        .await;

    if !model.success {
        return failed(task, &model);
    }

    let confidence = length_confidence(&model.text, 0.65);
    let data = json!({
        "text": model.text,
        "objective": objective,
    });
    completed(&model, data, confidence)
}

/// Assess workflow progress and recommend next actions
///
/// Coordination stays useful even when the model is down: the workflow
/// summary is computed locally and a rule-based plan stands in for the
/// model's recommendation.
pub(super) async fn run_coordination(
    ctx: &AgentContext,
    task: &AgentTask,
    state: &ExecutionState,
) -> NodeResult {
    let completed_count = state
        .node_results
        .values()
        .filter(|r| r.success)
        .count();
    let failed_count = state.node_results.len() - completed_count;
    let summary = format!(
        "Workflow state: {} tasks completed, {} failed, average confidence {:.2}.",
        completed_count,
        failed_count,
        state.avg_confidence()
    );

    let prompt = format!(
        "You are a workflow coordinator.\n\n\
         {}\n\
         Objective: {}\n\n\
         Recommend the next actions: what to prioritize, what to retry and \
         what to drop. Three recommendations at most.",
        summary,
        task_query(task, state)
    );

    let model = ctx
        .generator
        .generate_text(
            TaskType::SimpleClassification,
            QualityLevel::Minimal,
            &prompt,
            300,
            0.3,
        )
        .await;

    if model.success {
        let data = json!({
            "text": model.text,
            "workflow_summary": summary,
            "plan_source": "model",
        });
        completed(&model, data, 0.7)
    } else {
        let fallback = if failed_count > 0 {
            format!("{} Retry the failed tasks before proceeding.", summary)
        } else {
            format!("{} Proceed with the remaining tasks in dependency order.", summary)
        };
        NodeResult::success(json!({
            "text": fallback,
            "workflow_summary": summary,
            "plan_source": "fallback",
        }))
        .with_confidence(0.4)
    }
}
