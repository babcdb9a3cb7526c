//! Multi-agent orchestration for conductor
//!
//! Resolves a heterogeneous task DAG and executes it to completion or
//! definitive failure:
//!
//! - [`AgentTask`] - one unit of work with dependencies, priority and a
//!   bounded retry budget
//! - [`agents`] - the agent roles (research, analysis, synthesis, fact-check,
//!   code, creative, planning, coordination) behind a single dispatch
//!   function
//! - [`MultiAgentScheduler`] - the wave executor: ready tasks run in
//!   parallel, failures retry within their budget, and an empty ready set
//!   with pending work left is reported rather than spun on
//! - [`workflow`] - expands a research request (methodology x depth) into a
//!   concrete task DAG and runs it

pub mod agents;
pub mod scheduler;
pub mod task;
pub mod workflow;

pub use agents::AgentContext;
pub use scheduler::{MultiAgentScheduler, SchedulerConfig, SchedulerOutcome};
pub use task::{AgentKind, AgentTask, TaskPriority, TaskStatus};
pub use workflow::{build_research_plan, run_research_workflow, Methodology, ResearchOutcome};
