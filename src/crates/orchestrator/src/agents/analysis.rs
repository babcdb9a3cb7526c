//! Analysis and synthesis agents

use super::{clip, completed, dependency_texts, failed, length_confidence, task_query, AgentContext};
use crate::task::AgentTask;
use models::TaskType;
use serde_json::json;
use taskgraph_core::{ExecutionState, NodeResult, QualityLevel};

/// Analyze upstream findings (or the raw query when nothing is upstream)
pub(super) async fn run_analysis(
    ctx: &AgentContext,
    task: &AgentTask,
    state: &ExecutionState,
) -> NodeResult {
    let analysis_type = task.input_str("analysis_type").unwrap_or("general");
    let sources = dependency_texts(task, state);
    let material = if sources.is_empty() {
        task_query(task, state).to_string()
    } else {
        sources
            .iter()
            .map(|s| clip(s, 1500))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    };

    let prompt = format!(
        "You are an analysis specialist performing {} analysis.\n\n\
         Material:\n{}\n\n\
         Identify the patterns, tensions and implications in this material. \
         State your reasoning, then conclude with the three most important \
         takeaways.",
        analysis_type, material
    );

    let model = ctx
        .generator
        .generate_text(
            TaskType::AnalyticalReasoning,
            QualityLevel::High,
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
        "analysis_type": analysis_type,
        "sources_analyzed": sources.len(),
    });
    completed(&model, data, confidence)
}

/// Combine upstream outputs into one coherent deliverable
pub(super) async fn run_synthesis(
    ctx: &AgentContext,
    task: &AgentTask,
    state: &ExecutionState,
) -> NodeResult {
    let goal = task.input_str("goal").unwrap_or("a comprehensive summary");
    let audience = task.input_str("audience").unwrap_or("a general audience");
    let sources = dependency_texts(task, state);

    if sources.is_empty() {
        return NodeResult::failure("synthesis has no upstream output to combine");
    }

    let numbered = sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("Source {}:\n{}", i + 1, clip(s, 1500)))
        .collect::<Vec<_>>()
        .join("\n\n");
    let prompt = format!(
        "You are a synthesis specialist.\n\n\
         Goal: {}\n\
         Audience: {}\n\n\
         {}\n\n\
         Combine these sources into one coherent response. Resolve overlaps, \
         note disagreements explicitly, and do not introduce material absent \
         from the sources.",
        goal, audience, numbered
    );

    let model = ctx
        .generator
        .generate_text(TaskType::QaAndSummary, QualityLevel::High, &prompt, 900, 0.5)
        .await;

    if !model.success {
        return failed(task, &model);
    }

    let confidence = length_confidence(&model.text, 0.7);
    let data = json!({
        "text": model.text,
        "goal": goal,
        "sources_combined": sources.len(),
    });
    completed(&model, data, confidence)
}
