//! Code and creative agents

use super::{completed, failed, length_confidence, task_query, AgentContext};
use crate::task::AgentTask;
use models::TaskType;
use serde_json::json;
use taskgraph_core::{ExecutionState, NodeResult, QualityLevel};

/// Code generation, review, debugging and optimization
pub(super) async fn run_code(
    ctx: &AgentContext,
    task: &AgentTask,
    state: &ExecutionState,
) -> NodeResult {
    let request = task_query(task, state);
    let language = task.input_str("language").unwrap_or("python");
    let existing = task.input_str("code").unwrap_or("");

    let prompt = match task.task_kind.as_str() {
        "code_review" => format!(
            "You are a senior {} engineer reviewing code.\n\n\
             Code:\n```{}\n{}\n```\n\n\
             Point out correctness issues, risky constructs and style \
             problems, most severe first, each with a concrete fix.",
            language, language, existing
        ),
        "debugging" => format!(
            "You are a {} debugging specialist.\n\n\
             Problem: {}\n\n\
             Code:\n```{}\n{}\n```\n\n\
             Diagnose the likely fault, explain the mechanism, and show the \
             corrected code.",
            language, request, language, existing
        ),
        "optimization" => format!(
            "You are a {} performance specialist.\n\n\
             Code:\n```{}\n{}\n```\n\n\
             Identify the dominant costs and show an optimized version, \
             noting the complexity change for each edit.",
            language, language, existing
        ),
        _ => format!(
            "You are an expert {} developer.\n\n\
             Task: {}\n\n\
             Write clear, working code with brief usage notes. Include error \
             handling where the task calls for it.",
            language, request
        ),
    };

    let model = ctx
        .generator
        .generate_text(TaskType::CodeTasks, QualityLevel::High, &prompt, 900, 0.2)
        .await;

    if !model.success {
        return failed(task, &model);
    }

    let has_code_block = model.text.contains("```");
    let confidence = if has_code_block {
        length_confidence(&model.text, 0.7)
    } else {
        0.5
    };
    let data = json!({
        "text": model.text,
        "language": language,
        "action": task.task_kind,
        "has_code_block": has_code_block,
    });
    completed(&model, data, confidence)
}

/// Creative writing, brainstorming and storytelling
pub(super) async fn run_creative(
    ctx: &AgentContext,
    task: &AgentTask,
    state: &ExecutionState,
) -> NodeResult {
    let request = task_query(task, state);
    let tone = task.input_str("tone").unwrap_or("engaging");
    let audience = task.input_str("audience").unwrap_or("a general audience");

    let prompt = match task.task_kind.as_str() {
        "brainstorming" => format!(
            "You are a creative collaborator brainstorming ideas.\n\n\
             Brief: {}\n\n\
             Produce a dozen distinct ideas, one per line, ranging from safe \
             to unconventional. No elaboration beyond one sentence each.",
            request
        ),
        "storytelling" => format!(
            "You are a storyteller writing for {}.\n\n\
             Premise: {}\n\
             Tone: {}\n\n\
             Write the story with a clear arc: setup, tension, resolution.",
            audience, request, tone
        ),
        _ => format!(
            "You are a skilled writer.\n\n\
             Brief: {}\n\
             Tone: {}\n\
             Audience: {}\n\n\
             Write the piece. Favor concrete language over abstraction.",
            request, tone, audience
        ),
    };

    let model = ctx
        .generator
        .generate_text(
            TaskType::CreativeWriting,
            QualityLevel::High,
            &prompt,
            900,
            0.9,
        )
        .await;

    if !model.success {
        return failed(task, &model);
    }

    let confidence = length_confidence(&model.text, 0.6);
    let data = json!({
        "text": model.text,
        "content_type": task.task_kind,
        "tone": tone,
    });
    completed(&model, data, confidence)
}
