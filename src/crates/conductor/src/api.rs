//! Inbound operations: run_chat, run_search, run_research
//!
//! Each operation validates its request before any state exists, builds the
//! execution state, runs the matching graph or workflow inside the
//! async-safety envelope, and serializes the state back into a fully
//! materialized result. Errors stay in-band as [`ServiceError`] values.

use crate::analytics::{AnalyticsEvent, AnalyticsSink, NoopSink};
use crate::config::ConductorConfig;
use crate::envelope::{self, ENVELOPE_GRACE};
use crate::error::ConductorError;
use crate::requests::{ChatRequest, ResearchRequest, SearchRequest};
use crate::responses::{
    ChatResult, ErrorEntry, ResearchMetadata, ResearchResult, ResponseMetadata, ResponseStatus,
    SearchResult, SearchResultItem, ServiceError,
};
use models::{ManagerConfig, ModelManager, OllamaClient, OllamaConfig, TextGenerator};
use orchestrator::{run_research_workflow, AgentContext, MultiAgentScheduler};
use pipelines::chat::build_chat_graph;
use pipelines::search::build_search_graph;
use pipelines::{
    CostTable, KvCache, NoopCache, SearchHit, SearchProvider, SmartRouter, UnavailableProvider,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use taskgraph_core::{ConversationTurn, ExecutionState, GraphEngine, QualityLevel};
use tokio::sync::Mutex;
use tooling::timeout::{OperationClass, TimeBudget};
use tracing::info;
use uuid::Uuid;

/// Everything a request needs, injected at construction
#[derive(Clone)]
pub struct Services {
    pub generator: Arc<dyn TextGenerator>,
    pub cache: Arc<dyn KvCache>,
    pub provider: Arc<dyn SearchProvider>,
    pub analytics: Arc<dyn AnalyticsSink>,
    pub costs: CostTable,
}

impl Services {
    /// Services with a generator and no-op collaborators
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            cache: Arc::new(NoopCache),
            provider: Arc::new(UnavailableProvider),
            analytics: Arc::new(NoopSink),
            costs: CostTable::default(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn KvCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn with_costs(mut self, costs: CostTable) -> Self {
        self.costs = costs;
        self
    }
}

/// The orchestration core
pub struct Conductor {
    chat_graph: GraphEngine,
    search_graph: GraphEngine,
    scheduler: MultiAgentScheduler,
    analytics: Arc<dyn AnalyticsSink>,
}

impl Conductor {
    /// Build the conductor from injected services
    pub fn new(services: Services) -> Result<Self, ConductorError> {
        let chat_graph = build_chat_graph(services.generator.clone(), services.cache.clone())?;
        let search_graph = build_search_graph(
            services.generator.clone(),
            services.provider.clone(),
            services.cache.clone(),
            SmartRouter::new(services.costs.clone()),
        )?;
        let scheduler = MultiAgentScheduler::new(AgentContext::new(services.generator.clone()));

        Ok(Self {
            chat_graph,
            search_graph,
            scheduler,
            analytics: services.analytics,
        })
    }

    /// Production wiring: backend client, model manager, discovery
    ///
    /// Returns the manager alongside the conductor so the edge can observe
    /// model stats and drive shutdown.
    pub async fn bootstrap(
        config: &ConductorConfig,
    ) -> Result<(Self, Arc<ModelManager>), ConductorError> {
        tooling::logging::init_tracing(&config.log_level);

        let client = OllamaClient::new(OllamaConfig::new(&config.model_backend_host))?;
        let manager = Arc::new(ModelManager::new(Arc::new(client), ManagerConfig::default()));
        manager.initialize().await;
        if manager.is_degraded() {
            info!("starting with a degraded model catalog");
        }

        let services = Services::new(manager.clone() as Arc<dyn TextGenerator>)
            .with_costs(config.costs.clone());
        Ok((Self::new(services)?, manager))
    }

    /// Aggregate statistics for the chat graph instance
    pub fn chat_stats(&self) -> taskgraph_core::GraphStatsSnapshot {
        self.chat_graph.stats()
    }

    /// Aggregate statistics for the search graph instance
    pub fn search_stats(&self) -> taskgraph_core::GraphStatsSnapshot {
        self.search_graph.stats()
    }

    /// Run one chat turn
    pub async fn run_chat(&self, request: ChatRequest) -> Result<ChatResult, ServiceError> {
        let correlation_id = Uuid::new_v4().to_string();
        request
            .validate()
            .map_err(|message| ServiceError::validation(message, &correlation_id))?;

        let class = envelope::chat_class(&request.query);
        let deadline =
            envelope::run_deadline(class, &request.query, request.max_execution_time);

        let mut state = ExecutionState::new(
            &request.query,
            request.max_cost,
            deadline.as_secs_f64(),
            request.quality,
        )
        .with_correlation_id(&correlation_id);
        state.session_id = request.session_id.clone();
        for turn in &request.conversation_history {
            state.push_turn(turn.clone());
        }
        if let Some(style) = &request.response_style {
            state.set_intermediate("request", json!({"style": style}));
        }

        let shared = Arc::new(Mutex::new(state));
        let op_shared = shared.clone();
        let graph = &self.chat_graph;
        let op_request = request.clone();
        let operation = async move {
            let started = Instant::now();
            let mut state = op_shared.lock().await;
            let report = graph.run(&mut state).await;
            let elapsed = started.elapsed().as_secs_f64();

            if state.final_response.is_empty() {
                return Err(ServiceError::internal(&state.correlation_id, elapsed));
            }
            Ok(build_chat_result(&state, report.success, elapsed, &op_request))
        };

        let result = envelope::run_enveloped(
            class,
            &correlation_id,
            deadline + ENVELOPE_GRACE,
            shared.clone(),
            operation,
        )
        .await;

        self.record_outcome("chat", &correlation_id, shared, &result).await;
        result
    }

    /// Run one search request
    pub async fn run_search(&self, request: SearchRequest) -> Result<SearchResult, ServiceError> {
        let correlation_id = Uuid::new_v4().to_string();
        request
            .validate()
            .map_err(|message| ServiceError::validation(message, &correlation_id))?;

        let class = OperationClass::Standard;
        let deadline = envelope::run_deadline(class, &request.query, f64::MAX);

        let mut state = ExecutionState::new(
            &request.query,
            request.budget,
            deadline.as_secs_f64(),
            request.quality,
        )
        .with_correlation_id(&correlation_id);
        state.set_intermediate("request", json!({"max_results": request.max_results}));

        let shared = Arc::new(Mutex::new(state));
        let op_shared = shared.clone();
        let graph = &self.search_graph;
        let query = request.query.clone();
        let operation = async move {
            let started = Instant::now();
            let mut state = op_shared.lock().await;
            let report = graph.run(&mut state).await;
            let elapsed = started.elapsed().as_secs_f64();

            if state.final_response.is_empty() {
                return Err(ServiceError::internal(&state.correlation_id, elapsed));
            }
            Ok(build_search_result(&state, report.success, elapsed, &query))
        };

        let result = envelope::run_enveloped(
            class,
            &correlation_id,
            deadline + ENVELOPE_GRACE,
            shared.clone(),
            operation,
        )
        .await;

        self.record_outcome("search", &correlation_id, shared, &result).await;
        result
    }

    /// Run one research workflow
    pub async fn run_research(
        &self,
        request: ResearchRequest,
    ) -> Result<ResearchResult, ServiceError> {
        let correlation_id = Uuid::new_v4().to_string();
        request
            .validate()
            .map_err(|message| ServiceError::validation(message, &correlation_id))?;
        let methodology = request
            .parsed_methodology()
            .map_err(|message| ServiceError::validation(message, &correlation_id))?;

        let class = OperationClass::Research;
        let deadline =
            envelope::run_deadline(class, &request.research_question, request.time_budget);

        let state = ExecutionState::new(
            &request.research_question,
            request.cost_budget,
            deadline.as_secs_f64(),
            QualityLevel::High,
        )
        .with_correlation_id(&correlation_id);

        let shared = Arc::new(Mutex::new(state));
        let op_shared = shared.clone();
        let scheduler = &self.scheduler;
        let question = request.research_question.clone();
        let depth = request.depth_level;
        let operation = async move {
            let started = Instant::now();
            let mut state = op_shared.lock().await;
            let guard = TimeBudget::new(deadline);

            let outcome = run_research_workflow(
                scheduler,
                &question,
                methodology,
                depth,
                &mut state,
                Some(guard),
            )
            .await;
            let elapsed = started.elapsed().as_secs_f64();

            let mut errors: Vec<ErrorEntry> =
                state.errors.iter().map(ErrorEntry::from_issue).collect();
            if outcome.scheduler.deadline_exceeded {
                errors.push(ErrorEntry {
                    code: "DEADLINE_EXCEEDED".to_string(),
                    node: "scheduler".to_string(),
                    message: format!(
                        "research deadline of {:.1}s exceeded",
                        deadline.as_secs_f64()
                    ),
                });
            }

            let mut detailed_results: Vec<serde_json::Value> = outcome
                .scheduler
                .results
                .iter()
                .map(|(id, result)| {
                    json!({
                        "task_id": id,
                        "success": result.success,
                        "confidence": result.confidence,
                        "cost": result.cost,
                        "data": result.data,
                        "error": result.error,
                    })
                })
                .collect();
            detailed_results.sort_by(|a, b| {
                a["task_id"]
                    .as_str()
                    .unwrap_or("")
                    .cmp(b["task_id"].as_str().unwrap_or(""))
            });

            let research_results = if outcome.synthesis.is_empty() {
                "Research could not be completed within its budget.".to_string()
            } else {
                outcome.synthesis.clone()
            };

            Ok(ResearchResult {
                workflow_id: outcome.workflow_id,
                success: outcome.success,
                research_results,
                detailed_results,
                confidence_score: state.avg_confidence(),
                errors,
                metadata: ResearchMetadata {
                    execution_time: elapsed,
                    agents_used: outcome.agents_used,
                    task_count: outcome.task_count,
                    cost: state.total_cost(),
                },
            })
        };

        let result = envelope::run_enveloped(
            class,
            &correlation_id,
            deadline + ENVELOPE_GRACE,
            shared.clone(),
            operation,
        )
        .await;

        self.record_outcome("research", &correlation_id, shared, &result).await;
        result
    }

    async fn record_outcome<T>(
        &self,
        kind: &str,
        correlation_id: &str,
        shared: Arc<Mutex<ExecutionState>>,
        result: &Result<T, ServiceError>,
    ) {
        let state = shared.lock().await;
        let event = AnalyticsEvent::new(kind, state.request_id.clone(), correlation_id)
            .with_outcome(
                result.is_ok(),
                state.total_cost(),
                state.total_execution_time(),
            );
        self.analytics.record(event);
    }
}

fn build_chat_result(
    state: &ExecutionState,
    run_success: bool,
    elapsed: f64,
    request: &ChatRequest,
) -> ChatResult {
    let status = if run_success && state.errors.is_empty() {
        ResponseStatus::Success
    } else {
        ResponseStatus::Partial
    };

    let mut conversation_history = state.conversation_history.clone();
    conversation_history.push(ConversationTurn::user(state.original_query.clone()));
    conversation_history.push(ConversationTurn::assistant(state.final_response.clone()));

    let sources = metadata_strings(state, "sources");
    let citations = metadata_strings(state, "citations");

    let developer_hints = request.include_debug_info.then(|| {
        json!({
            "execution_path": state.execution_path,
            "warnings": state.warnings,
            "complexity_score": state.complexity_score,
            "intent": state.intent.map(|i| i.as_str()),
        })
    });

    ChatResult {
        response: state.final_response.clone(),
        session_id: state.session_id.clone(),
        conversation_history,
        sources,
        citations,
        status,
        metadata: ResponseMetadata::from_state(state, elapsed),
        developer_hints,
    }
}

fn build_search_result(
    state: &ExecutionState,
    run_success: bool,
    elapsed: f64,
    query: &str,
) -> SearchResult {
    let hits: Vec<SearchHit> = state
        .intermediate("content_enhancement")
        .filter(|v| v.get("results").is_some())
        .or_else(|| state.intermediate("brave_search"))
        .and_then(|v| v.get("results"))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();

    let results: Vec<SearchResultItem> = hits
        .iter()
        .map(|hit| SearchResultItem {
            title: hit.title.clone(),
            url: hit.url.clone(),
            snippet: hit.snippet.clone(),
        })
        .collect();

    let status = if run_success && state.errors.is_empty() {
        ResponseStatus::Success
    } else {
        ResponseStatus::Partial
    };

    SearchResult {
        query: query.to_string(),
        total_results: results.len(),
        results,
        summary: state.final_response.clone(),
        search_time: elapsed,
        sources_consulted: metadata_strings(state, "providers_used"),
        status,
        metadata: ResponseMetadata::from_state(state, elapsed),
    }
}

fn metadata_strings(state: &ExecutionState, key: &str) -> Vec<String> {
    state
        .response_metadata
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}
