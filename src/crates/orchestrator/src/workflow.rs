//! Research workflow planning
//!
//! Expands a research request into a concrete task DAG for the scheduler:
//! a planning task first, then one research task per angle (how many angles
//! depends on the requested depth), then analysis, an optional fact-check
//! pass at depth 3 and above, and a final synthesis over everything.

use crate::scheduler::{MultiAgentScheduler, SchedulerOutcome};
use crate::task::{AgentKind, AgentTask, TaskPriority};
use serde_json::json;
use std::collections::BTreeSet;
use taskgraph_core::ExecutionState;
use tooling::timeout::TimeBudget;
use uuid::Uuid;

/// Research methodologies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Methodology {
    Systematic,
    Exploratory,
    Comparative,
    MetaAnalysis,
}

impl Methodology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Methodology::Systematic => "systematic",
            Methodology::Exploratory => "exploratory",
            Methodology::Comparative => "comparative",
            Methodology::MetaAnalysis => "meta-analysis",
        }
    }

    /// Research angles dispatched for this methodology, widest first
    fn angles(&self) -> &'static [&'static str] {
        match self {
            Methodology::Systematic => {
                &["literature_review", "fact_gathering", "trend_analysis"]
            }
            Methodology::Exploratory => {
                &["general_research", "trend_analysis", "fact_gathering"]
            }
            Methodology::Comparative => {
                &["general_research", "fact_gathering", "literature_review"]
            }
            Methodology::MetaAnalysis => {
                &["literature_review", "literature_review", "fact_gathering"]
            }
        }
    }
}

impl std::str::FromStr for Methodology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "systematic" => Ok(Methodology::Systematic),
            "exploratory" => Ok(Methodology::Exploratory),
            "comparative" => Ok(Methodology::Comparative),
            "meta-analysis" | "meta_analysis" => Ok(Methodology::MetaAnalysis),
            other => Err(format!("unknown methodology: {}", other)),
        }
    }
}

/// Result of one research workflow run
#[derive(Debug)]
pub struct ResearchOutcome {
    pub workflow_id: String,
    pub success: bool,
    /// Synthesized answer, empty when synthesis never completed
    pub synthesis: String,
    pub scheduler: SchedulerOutcome,
    /// Distinct agent roles that produced results, in plan order
    pub agents_used: Vec<String>,
    pub task_count: usize,
}

/// Build the task DAG for a research question
///
/// `depth` (1..=5) controls how many research angles run in parallel and
/// whether a fact-check pass is included.
pub fn build_research_plan(
    question: &str,
    methodology: Methodology,
    depth: u8,
) -> Vec<AgentTask> {
    let depth = depth.clamp(1, 5);
    let research_count = match depth {
        1 | 2 => 1,
        3 | 4 => 2,
        _ => 3,
    };
    let depth_label = match depth {
        1 => "quick",
        2 | 3 => "standard",
        _ => "comprehensive",
    };

    let mut tasks = Vec::new();

    tasks.push(
        AgentTask::new(AgentKind::Planning, "task_breakdown")
            .with_id("plan")
            .with_description(format!("Plan {} research", methodology.as_str()))
            .with_input(json!({"query": question, "complexity": depth_label}))
            .with_priority(TaskPriority::High),
    );

    let mut research_ids = Vec::new();
    for (i, angle) in methodology.angles().iter().take(research_count).enumerate() {
        let id = format!("research_{}", i + 1);
        tasks.push(
            AgentTask::new(AgentKind::Research, *angle)
                .with_id(&id)
                .with_input(json!({"query": question, "depth": depth_label}))
                .with_dependencies(["plan"]),
        );
        research_ids.push(id);
    }

    tasks.push(
        AgentTask::new(AgentKind::Analysis, "deep_analysis")
            .with_id("analysis")
            .with_input(json!({"query": question, "analysis_type": methodology.as_str()}))
            .with_dependencies(research_ids.clone()),
    );

    let mut synthesis_deps: BTreeSet<String> =
        research_ids.iter().cloned().collect();
    synthesis_deps.insert("analysis".to_string());

    if depth >= 3 {
        tasks.push(
            AgentTask::new(AgentKind::FactCheck, "claim_verification")
                .with_id("fact_check")
                .with_input(json!({"query": question}))
                .with_dependencies(research_ids.clone()),
        );
        synthesis_deps.insert("fact_check".to_string());
    }

    tasks.push(
        AgentTask::new(AgentKind::Synthesis, "research_report")
            .with_id("synthesis")
            .with_input(json!({
                "query": question,
                "goal": format!("a {} research report", methodology.as_str()),
            }))
            .with_dependencies(synthesis_deps)
            .with_priority(TaskPriority::High),
    );

    tasks
}

/// Plan and execute a research workflow
pub async fn run_research_workflow(
    scheduler: &MultiAgentScheduler,
    question: &str,
    methodology: Methodology,
    depth: u8,
    state: &mut ExecutionState,
    deadline: Option<TimeBudget>,
) -> ResearchOutcome {
    let workflow_id = Uuid::new_v4().to_string();
    let tasks = build_research_plan(question, methodology, depth);
    let task_count = tasks.len();
    let plan_order: Vec<(String, AgentKind)> = tasks
        .iter()
        .map(|t| (t.task_id.clone(), t.agent_kind))
        .collect();

    let outcome = scheduler.execute_tasks(tasks, state, deadline).await;

    let mut agents_used = Vec::new();
    for (id, kind) in &plan_order {
        if outcome.results.get(id).map(|r| r.success).unwrap_or(false)
            && !agents_used.contains(&kind.as_str().to_string())
        {
            agents_used.push(kind.as_str().to_string());
        }
    }

    let synthesis = outcome
        .results
        .get("synthesis")
        .filter(|r| r.success)
        .and_then(|r| r.data_str("text").map(|s| s.to_string()))
        .unwrap_or_default();

    let success = outcome.all_succeeded() && !synthesis.is_empty();

    ResearchOutcome {
        workflow_id,
        success,
        synthesis,
        scheduler: outcome,
        agents_used,
        task_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use std::collections::HashSet;

    #[test]
    fn test_shallow_plan_shape() {
        let tasks = build_research_plan("why rust", Methodology::Exploratory, 1);
        let ids: Vec<&str> = tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["plan", "research_1", "analysis", "synthesis"]);

        // No fact-check below depth 3
        assert!(tasks.iter().all(|t| t.agent_kind != AgentKind::FactCheck));
    }

    #[test]
    fn test_deep_plan_includes_fact_check_and_more_research() {
        let tasks = build_research_plan("why rust", Methodology::Systematic, 5);
        let ids: HashSet<&str> = tasks.iter().map(|t| t.task_id.as_str()).collect();

        assert!(ids.contains("research_3"));
        assert!(ids.contains("fact_check"));
        assert_eq!(tasks.len(), 7);
    }

    #[test]
    fn test_plan_dependencies_form_expected_dag() {
        let tasks = build_research_plan("q", Methodology::Systematic, 3);
        let by_id: std::collections::HashMap<&str, &AgentTask> =
            tasks.iter().map(|t| (t.task_id.as_str(), t)).collect();

        assert!(by_id["plan"].dependencies.is_empty());
        assert!(by_id["research_1"].dependencies.contains("plan"));
        assert!(by_id["analysis"].dependencies.contains("research_1"));
        assert!(by_id["analysis"].dependencies.contains("research_2"));
        assert!(by_id["fact_check"].dependencies.contains("research_1"));
        assert!(by_id["synthesis"].dependencies.contains("analysis"));
        assert!(by_id["synthesis"].dependencies.contains("fact_check"));
    }

    #[test]
    fn test_depth_is_clamped() {
        let tasks = build_research_plan("q", Methodology::Exploratory, 99);
        assert!(tasks.iter().any(|t| t.task_id == "research_3"));

        let tasks = build_research_plan("q", Methodology::Exploratory, 0);
        assert!(tasks.iter().any(|t| t.task_id == "research_1"));
        assert!(!tasks.iter().any(|t| t.task_id == "research_2"));
    }

    #[test]
    fn test_plan_tasks_start_idle() {
        let tasks = build_research_plan("q", Methodology::Comparative, 2);
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Idle));
        assert!(tasks.iter().all(|t| t.retry_count == 0));
    }

    #[test]
    fn test_methodology_parsing() {
        assert_eq!(
            "systematic".parse::<Methodology>(),
            Ok(Methodology::Systematic)
        );
        assert_eq!(
            "meta-analysis".parse::<Methodology>(),
            Ok(Methodology::MetaAnalysis)
        );
        assert!("vibes".parse::<Methodology>().is_err());
    }
}
