//! Multi-agent dependency scheduler
//!
//! Executes a set of [`AgentTask`]s wave by wave: every iteration computes
//! the ready set (all dependencies completed, status runnable), dispatches it
//! concurrently, then waits for the whole wave at a barrier before merging
//! results into the shared state. Downstream tasks therefore observe every
//! mutation of their transitive dependencies, while tasks inside one wave
//! share nothing but the wave-start snapshot.
//!
//! Failures retry while the task's budget allows, re-entering the ready set
//! on the next iteration. An empty ready set with pending work left means a
//! dependency cycle or exhausted retries upstream; the scheduler records a
//! deadlock-or-cycle warning and returns partial results instead of spinning.
//!
//! The scheduler never raises through its boundary; callers inspect the
//! returned result map.

use crate::agents::{run_agent, AgentContext};
use crate::task::{AgentTask, TaskStatus};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use taskgraph_core::{ExecutionState, NodeResult};
use tooling::timeout::TimeBudget;
use tracing::{debug, warn};

/// Scheduler tuning
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    /// Maximum tasks in flight at once; unbounded when None. Higher-priority
    /// tasks are dispatched first within a wave either way.
    pub concurrency_cap: Option<usize>,
}

/// Outcome of one DAG execution
#[derive(Debug, Default)]
pub struct SchedulerOutcome {
    /// Definitive per-task results (successes, exhausted failures and
    /// cancellations)
    pub results: HashMap<String, NodeResult>,
    /// The run deadline expired with tasks still in flight
    pub deadline_exceeded: bool,
    /// A wave found no ready task with pending work remaining
    pub stalled: bool,
    /// Number of waves dispatched
    pub waves: usize,
    /// Task ids that never reached a definitive result
    pub incomplete: Vec<String>,
}

impl SchedulerOutcome {
    /// Every task produced a successful result
    pub fn all_succeeded(&self) -> bool {
        !self.deadline_exceeded
            && !self.stalled
            && self.incomplete.is_empty()
            && self.results.values().all(|r| r.success)
    }
}

/// Wave executor over a heterogeneous task DAG
pub struct MultiAgentScheduler {
    ctx: AgentContext,
    config: SchedulerConfig,
}

impl MultiAgentScheduler {
    pub fn new(ctx: AgentContext) -> Self {
        Self {
            ctx,
            config: SchedulerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute the tasks to completion, definitive failure or deadline
    pub async fn execute_tasks(
        &self,
        tasks: Vec<AgentTask>,
        state: &mut ExecutionState,
        deadline: Option<TimeBudget>,
    ) -> SchedulerOutcome {
        let mut pending: HashMap<String, AgentTask> = tasks
            .into_iter()
            .map(|t| (t.task_id.clone(), t))
            .collect();
        let mut completed: HashSet<String> = HashSet::new();
        let mut outcome = SchedulerOutcome::default();

        while !pending.is_empty() {
            let mut ready: Vec<String> = pending
                .values()
                .filter(|t| t.is_ready(&completed))
                .map(|t| t.task_id.clone())
                .collect();

            if ready.is_empty() {
                warn!(
                    pending = pending.len(),
                    "deadlock-or-cycle: no ready tasks with pending work remaining"
                );
                state.append_warning(
                    "scheduler",
                    "deadlock-or-cycle: no ready tasks with pending work remaining",
                );
                outcome.stalled = true;
                break;
            }

            // Priority-ordered dispatch; id as the deterministic tie-break
            ready.sort_by(|a, b| {
                let pa = pending[a].priority;
                let pb = pending[b].priority;
                pb.cmp(&pa).then_with(|| a.cmp(b))
            });

            outcome.waves += 1;
            debug!(wave = outcome.waves, tasks = ready.len(), "dispatching wave");

            let snapshot = Arc::new(state.clone());
            let semaphore = self
                .config
                .concurrency_cap
                .map(|cap| Arc::new(tokio::sync::Semaphore::new(cap.max(1))));

            let mut handles = Vec::with_capacity(ready.len());
            for id in &ready {
                let task = pending.get_mut(id).expect("ready task is pending");
                task.update_status(TaskStatus::Working);

                let task_clone = task.clone();
                let ctx = self.ctx.clone();
                let snap = snapshot.clone();
                let sem = semaphore.clone();
                let handle = tokio::spawn(async move {
                    let _permit = match &sem {
                        Some(sem) => sem.clone().acquire_owned().await.ok(),
                        None => None,
                    };
                    match tokio::time::timeout(task_clone.timeout, run_agent(&ctx, &task_clone, &snap))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => NodeResult::failure(format!(
                            "task timed out after {:?}",
                            task_clone.timeout
                        )),
                    }
                });
                handles.push((id.clone(), handle));
            }

            // Barrier: wait for the whole wave, bounded by the run deadline
            let abort_handles: Vec<_> = handles.iter().map(|(_, h)| h.abort_handle()).collect();
            let dispatched: Vec<String> = handles.iter().map(|(id, _)| id.clone()).collect();
            let wave = async {
                let mut collected = Vec::with_capacity(handles.len());
                for (id, handle) in handles {
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(err) => NodeResult::failure(format!("agent task crashed: {}", err)),
                    };
                    collected.push((id, result));
                }
                collected
            };

            let wave_results = match &deadline {
                None => wave.await,
                Some(guard) => match guard.remaining() {
                    Some(remaining) => match tokio::time::timeout(remaining, wave).await {
                        Ok(results) => results,
                        Err(_) => {
                            self.cancel_wave(
                                abort_handles,
                                &dispatched,
                                &mut pending,
                                state,
                                &mut outcome,
                            );
                            break;
                        }
                    },
                    None => {
                        self.cancel_wave(
                            abort_handles,
                            &dispatched,
                            &mut pending,
                            state,
                            &mut outcome,
                        );
                        break;
                    }
                },
            };

            for (id, result) in wave_results {
                let task = pending.get_mut(&id).expect("dispatched task is pending");

                if result.success {
                    task.update_status(TaskStatus::Completed);
                    task.result = Some(result.clone());
                    completed.insert(id.clone());
                    merge_result(state, &id, &result);
                    outcome.results.insert(id, result);
                } else if task.can_retry() {
                    task.retry_count += 1;
                    task.update_status(TaskStatus::Waiting);
                    debug!(
                        task_id = %id,
                        retry = task.retry_count,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "retrying failed task"
                    );
                } else {
                    task.update_status(TaskStatus::Failed);
                    task.result = Some(result.clone());
                    state.append_error(
                        &id,
                        result
                            .error
                            .clone()
                            .unwrap_or_else(|| "task failed".to_string()),
                        true,
                    );
                    state.record_result(&id, result.clone());
                    outcome.results.insert(id, result);
                }
            }

            pending.retain(|id, _| !completed.contains(id));
        }

        outcome.incomplete = pending
            .keys()
            .filter(|id| !outcome.results.contains_key(*id))
            .cloned()
            .collect();
        outcome.incomplete.sort();
        outcome
    }

    /// Deadline fired mid-wave: abort in-flight tasks and record canceled
    /// results for them
    fn cancel_wave(
        &self,
        abort_handles: Vec<tokio::task::AbortHandle>,
        dispatched: &[String],
        pending: &mut HashMap<String, AgentTask>,
        state: &mut ExecutionState,
        outcome: &mut SchedulerOutcome,
    ) {
        for handle in abort_handles {
            handle.abort();
        }
        outcome.deadline_exceeded = true;
        state.append_error("scheduler", "run deadline exceeded with tasks in flight", true);

        for id in dispatched {
            if let Some(task) = pending.get_mut(id) {
                task.update_status(TaskStatus::Failed);
                let result = NodeResult::failure("canceled: run deadline exceeded");
                task.result = Some(result.clone());
                state.record_result(id, result.clone());
                outcome.results.insert(id.clone(), result);
            }
        }
    }
}

/// Merge a successful task result into the shared state
fn merge_result(state: &mut ExecutionState, task_id: &str, result: &NodeResult) {
    if result.cost > 0.0 {
        state.add_cost(task_id, result.cost);
    }
    if result.execution_time > 0.0 {
        state.add_time(task_id, result.execution_time);
    }
    if result.confidence > 0.0 {
        state.set_confidence(task_id, result.confidence);
    }
    if let Some(model) = &result.model_used {
        state.models_used.insert(model.clone());
    }
    state.set_intermediate(task_id, result.data.clone());
    state.record_result(task_id, result.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{AgentKind, TaskPriority};
    use async_trait::async_trait;
    use models::{GenerationErrorKind, ModelResult, TaskType, TextGenerator};
    use parking_lot::Mutex as PlMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use taskgraph_core::QualityLevel;

    /// Generator whose responses are scripted per call; optionally fails the
    /// first N calls
    struct Scripted {
        calls: AtomicUsize,
        fail_first: usize,
        delay: Duration,
        call_log: PlMutex<Vec<String>>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first: 0,
                delay: Duration::ZERO,
                call_log: PlMutex::new(Vec::new()),
            }
        }

        fn failing_first(n: usize) -> Self {
            Self {
                fail_first: n,
                ..Self::new()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate_text(
            &self,
            _task: TaskType,
            _quality: QualityLevel,
            prompt: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> ModelResult {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.call_log.lock().push(prompt.chars().take(120).collect());
            if call < self.fail_first {
                ModelResult::failed("phi:2.7b", GenerationErrorKind::Connection, "backend down")
            } else {
                ModelResult::ok(
                    "phi:2.7b",
                    "1. Finding one about the topic is solid.\n2. Finding two is numbered 42.",
                    0.2,
                    30,
                    60.0,
                )
            }
        }
    }

    fn scheduler(generator: Arc<Scripted>) -> MultiAgentScheduler {
        MultiAgentScheduler::new(AgentContext::new(generator))
    }

    fn state() -> ExecutionState {
        ExecutionState::new("test research question", 5.0, 60.0, QualityLevel::High)
    }

    fn research_task(id: &str) -> AgentTask {
        AgentTask::new(AgentKind::Research, "general_research").with_id(id)
    }

    #[tokio::test]
    async fn test_empty_dag_returns_empty_success() {
        let sched = scheduler(Arc::new(Scripted::new()));
        let mut s = state();
        let outcome = sched.execute_tasks(Vec::new(), &mut s, None).await;

        assert!(outcome.results.is_empty());
        assert!(outcome.all_succeeded());
        assert_eq!(outcome.waves, 0);
    }

    #[tokio::test]
    async fn test_single_task_runs_once() {
        let gen = Arc::new(Scripted::new());
        let sched = scheduler(gen.clone());
        let mut s = state();

        let outcome = sched
            .execute_tasks(vec![research_task("only")], &mut s, None)
            .await;

        assert!(outcome.all_succeeded());
        assert_eq!(outcome.waves, 1);
        assert_eq!(gen.calls.load(Ordering::SeqCst), 1);
        assert!(outcome.results["only"].success);
        assert!(s.intermediate("only").is_some());
        assert!(s.models_used.contains("phi:2.7b"));
    }

    #[tokio::test]
    async fn test_dependency_chain_runs_in_waves() {
        let gen = Arc::new(Scripted::new());
        let sched = scheduler(gen.clone());
        let mut s = state();

        let tasks = vec![
            AgentTask::new(AgentKind::Planning, "plan").with_id("plan"),
            AgentTask::new(AgentKind::Research, "general_research")
                .with_id("research")
                .with_dependencies(["plan"]),
            AgentTask::new(AgentKind::Analysis, "deep_analysis")
                .with_id("analyze")
                .with_dependencies(["research"]),
        ];

        let outcome = sched.execute_tasks(tasks, &mut s, None).await;

        assert!(outcome.all_succeeded());
        assert_eq!(outcome.waves, 3);
        assert_eq!(outcome.results.len(), 3);
        // Downstream analysis saw the research output through the state
        assert!(s.intermediate("research").is_some());
    }

    #[tokio::test]
    async fn test_independent_tasks_share_one_wave() {
        let gen = Arc::new(Scripted::slow(Duration::from_millis(50)));
        let sched = scheduler(gen.clone());
        let mut s = state();

        let tasks = vec![
            research_task("a"),
            research_task("b"),
            research_task("c"),
        ];

        let started = std::time::Instant::now();
        let outcome = sched.execute_tasks(tasks, &mut s, None).await;
        let elapsed = started.elapsed();

        assert!(outcome.all_succeeded());
        assert_eq!(outcome.waves, 1);
        // Parallel dispatch: one wave takes roughly one task's time
        assert!(elapsed < Duration::from_millis(140));
    }

    #[tokio::test]
    async fn test_retry_to_success_counts_attempts() {
        let gen = Arc::new(Scripted::failing_first(2));
        let sched = scheduler(gen.clone());
        let mut s = state();

        let task = research_task("flaky").with_max_retries(2);
        let outcome = sched.execute_tasks(vec![task], &mut s, None).await;

        assert!(outcome.results["flaky"].success);
        // Two failures then a success
        assert_eq!(gen.calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.waves, 3);
    }

    #[tokio::test]
    async fn test_persistent_failure_bounded_attempts() {
        let gen = Arc::new(Scripted::failing_first(usize::MAX));
        let sched = scheduler(gen.clone());
        let mut s = state();

        let task = research_task("doomed").with_max_retries(2);
        let outcome = sched.execute_tasks(vec![task], &mut s, None).await;

        assert!(!outcome.results["doomed"].success);
        // Exactly 1 + max_retries attempts
        assert_eq!(gen.calls.load(Ordering::SeqCst), 3);
        assert!(outcome.stalled);
        assert!(s.errors.iter().any(|e| e.node == "doomed"));
    }

    #[tokio::test]
    async fn test_failed_dependency_leaves_downstream_incomplete() {
        let gen = Arc::new(Scripted::failing_first(usize::MAX));
        let sched = scheduler(gen.clone());
        let mut s = state();

        let tasks = vec![
            research_task("upstream").with_max_retries(0),
            AgentTask::new(AgentKind::Analysis, "deep_analysis")
                .with_id("downstream")
                .with_dependencies(["upstream"]),
        ];

        let outcome = sched.execute_tasks(tasks, &mut s, None).await;

        assert!(!outcome.results["upstream"].success);
        assert!(outcome.stalled);
        assert_eq!(outcome.incomplete, vec!["downstream"]);
        assert!(!outcome.results.contains_key("downstream"));
    }

    #[tokio::test]
    async fn test_cycle_detected_as_deadlock() {
        let gen = Arc::new(Scripted::new());
        let sched = scheduler(gen.clone());
        let mut s = state();

        let tasks = vec![
            research_task("a").with_dependencies(["b"]),
            research_task("b").with_dependencies(["a"]),
        ];

        let outcome = sched.execute_tasks(tasks, &mut s, None).await;

        assert!(outcome.stalled);
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.incomplete, vec!["a", "b"]);
        assert_eq!(gen.calls.load(Ordering::SeqCst), 0);
        assert!(s
            .warnings
            .iter()
            .any(|w| w.message.contains("deadlock-or-cycle")));
    }

    #[tokio::test]
    async fn test_deadline_cancels_inflight_wave() {
        let gen = Arc::new(Scripted::slow(Duration::from_millis(500)));
        let sched = scheduler(gen.clone());
        let mut s = state();

        let deadline = TimeBudget::new(Duration::from_millis(50));
        let outcome = sched
            .execute_tasks(vec![research_task("slow")], &mut s, Some(deadline))
            .await;

        assert!(outcome.deadline_exceeded);
        let result = &outcome.results["slow"];
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("canceled"));
    }

    #[tokio::test]
    async fn test_priority_orders_dispatch_within_wave() {
        let gen = Arc::new(Scripted::new());
        let sched = scheduler(gen.clone()).with_config(SchedulerConfig {
            concurrency_cap: Some(1),
        });
        let mut s = state();

        let tasks = vec![
            AgentTask::new(AgentKind::Research, "general_research")
                .with_id("low")
                .with_input(serde_json::json!({"query": "LOWPRIO"}))
                .with_priority(TaskPriority::Low),
            AgentTask::new(AgentKind::Research, "general_research")
                .with_id("critical")
                .with_input(serde_json::json!({"query": "CRITICAL"}))
                .with_priority(TaskPriority::Critical),
        ];

        let outcome = sched.execute_tasks(tasks, &mut s, None).await;
        assert!(outcome.all_succeeded());

        let log = gen.call_log.lock();
        let critical_pos = log.iter().position(|p| p.contains("CRITICAL")).unwrap();
        let low_pos = log.iter().position(|p| p.contains("LOWPRIO")).unwrap();
        assert!(critical_pos < low_pos);
    }

    #[tokio::test]
    async fn test_per_task_timeout_is_a_retryable_failure() {
        let gen = Arc::new(Scripted::slow(Duration::from_millis(200)));
        let sched = scheduler(gen.clone());
        let mut s = state();

        let task = research_task("slowpoke")
            .with_timeout(Duration::from_millis(20))
            .with_max_retries(0);
        let outcome = sched.execute_tasks(vec![task], &mut s, None).await;

        let result = &outcome.results["slowpoke"];
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("timed out"));
    }
}
