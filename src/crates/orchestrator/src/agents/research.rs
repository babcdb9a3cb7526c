//! Research and fact-check agents

use super::{clip, completed, dependency_texts, failed, length_confidence, task_query, AgentContext};
use crate::task::AgentTask;
use models::TaskType;
use serde_json::json;
use taskgraph_core::{ExecutionState, NodeResult, QualityLevel};

/// Gather findings on the task's query
///
/// The `task_kind` picks the research angle: `literature_review`,
/// `fact_gathering`, `trend_analysis`, or general research by default.
pub(super) async fn run_research(
    ctx: &AgentContext,
    task: &AgentTask,
    state: &ExecutionState,
) -> NodeResult {
    let query = task_query(task, state);
    let depth = task.input_str("depth").unwrap_or("standard");

    let prompt = match task.task_kind.as_str() {
        "literature_review" => format!(
            "You are a research specialist conducting a literature review.\n\n\
             Topic: {}\n\n\
             Summarize the established knowledge, major perspectives and open \
             questions on this topic. Structure your findings as a list of \
             key points with short supporting explanations.",
            query
        ),
        "fact_gathering" => format!(
            "You are a research specialist gathering verifiable facts.\n\n\
             Topic: {}\n\n\
             List the most important concrete facts about this topic, one per \
             line, each as specific and checkable as possible.",
            query
        ),
        "trend_analysis" => format!(
            "You are a research specialist analyzing trends.\n\n\
             Topic: {}\n\n\
             Describe the current direction of this area, recent developments \
             and where it appears to be heading. Note the evidence behind \
             each observation.",
            query
        ),
        _ => format!(
            "You are a research specialist.\n\n\
             Research question: {}\n\
             Depth: {}\n\n\
             Provide structured findings: the key facts, the main viewpoints, \
             and anything uncertain or contested. Use a numbered list of \
             findings followed by a short summary.",
            query, depth
        ),
    };

    let model = ctx
        .generator
        .generate_text(TaskType::DeepResearch, QualityLevel::High, &prompt, 800, 0.6)
        .await;

    if !model.success {
        return failed(task, &model);
    }

    let key_points = extract_key_points(&model.text);
    let confidence = length_confidence(&model.text, 0.6);
    let data = json!({
        "text": model.text,
        "key_points": key_points,
        "query": query,
        "research_kind": task.task_kind,
    });
    completed(&model, data, confidence)
}

/// Verify claims made by upstream tasks
pub(super) async fn run_fact_check(
    ctx: &AgentContext,
    task: &AgentTask,
    state: &ExecutionState,
) -> NodeResult {
    let sources = dependency_texts(task, state);
    let claims = extract_claims(&sources);

    if claims.is_empty() {
        return NodeResult::success(json!({
            "text": "No checkable claims found in upstream output.",
            "claims_checked": 0,
            "reliability": "unknown",
        }))
        .with_confidence(0.3);
    }

    let claim_list = claims
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "You are a fact-checking specialist.\n\n\
         Assess each claim below. For each one, state VERIFIED, UNCERTAIN or \
         FALSE with a one-sentence justification.\n\n\
         Claims:\n{}",
        claim_list
    );

    let model = ctx
        .generator
        .generate_text(
            TaskType::AnalyticalReasoning,
            QualityLevel::High,
            &prompt,
            600,
            0.3,
        )
        .await;

    if !model.success {
        return failed(task, &model);
    }

    let reliability = score_reliability(&model.text);
    let confidence = match reliability {
        "high" => 0.85,
        "medium" => 0.65,
        _ => 0.45,
    };
    let data = json!({
        "text": model.text,
        "claims": claims,
        "claims_checked": claims.len(),
        "reliability": reliability,
    });
    completed(&model, data, confidence)
}

/// Pull list-like lines out of research output
fn extract_key_points(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            line.starts_with('-')
                || line.starts_with('*')
                || line.chars().next().is_some_and(|c| c.is_ascii_digit())
        })
        .map(|line| {
            line.trim_start_matches(['-', '*', ' '])
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(10)
        .collect()
}

/// Pull checkable sentences out of upstream texts
///
/// A claim is a sentence carrying a number or a copular verb, the shapes
/// most worth verifying.
fn extract_claims(sources: &[String]) -> Vec<String> {
    let mut claims = Vec::new();
    for source in sources {
        for sentence in source.split(['.', '\n']) {
            let sentence = sentence.trim();
            if sentence.len() < 20 || sentence.len() > 300 {
                continue;
            }
            let has_number = sentence.chars().any(|c| c.is_ascii_digit());
            let has_copula = [" is ", " are ", " was ", " were ", " has ", " have "]
                .iter()
                .any(|v| sentence.contains(v));
            if has_number || has_copula {
                claims.push(clip(sentence, 300).to_string());
            }
            if claims.len() >= 5 {
                return claims;
            }
        }
    }
    claims
}

fn score_reliability(verification: &str) -> &'static str {
    let lower = verification.to_lowercase();
    let verified = lower.matches("verified").count();
    let false_count = lower.matches("false").count();

    if false_count == 0 && verified > 0 {
        "high"
    } else if verified >= false_count {
        "medium"
    } else {
        "low"
    }
}
