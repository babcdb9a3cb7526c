//! Search graph: route -> search -> enhance -> synthesize, or direct response
//!
//! The smart router's `skip_external` decision switches between the search
//! pipeline and the direct no-external-call branch. Provider failures are
//! isolated: a failed search becomes an empty result set routed to the
//! direct branch, and a failed enhancement fetch is a warning, never a run
//! failure.

use crate::cache::{search_key, KvCache};
use crate::providers::{SearchHit, SearchProvider};
use crate::router::SmartRouter;
use async_trait::async_trait;
use models::{TaskType, TextGenerator};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use taskgraph_core::{
    ExecutionState, Graph, GraphEngine, GraphError, GraphNode, NodeKind, NodeResult, RouteFn, END,
    START,
};
use tracing::debug;

const SEARCH_CACHE_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_MAX_RESULTS: usize = 10;
const SCRAPE_CLIP_CHARS: usize = 2000;

fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Decide the strategy for this request and stash it for the branch routers
pub struct SmartRouterNode {
    router: SmartRouter,
}

impl SmartRouterNode {
    pub fn new(router: SmartRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl GraphNode for SmartRouterNode {
    fn name(&self) -> &str {
        "smart_router"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decision
    }

    async fn execute(&self, state: &mut ExecutionState) -> NodeResult {
        let analysis = self.router.analyze(&state.processed_query);
        let strategy = self.router.decide(
            &state.processed_query,
            state.cost_budget_remaining,
            state.quality_requirement,
        );

        state.complexity_score = analysis.complexity;
        debug!(
            rationale = %strategy.rationale,
            skip_external = strategy.skip_external,
            "search strategy selected"
        );

        let strategy_value = match serde_json::to_value(&strategy) {
            Ok(value) => value,
            Err(err) => return NodeResult::failure(format!("strategy serialization: {}", err)),
        };
        state.set_intermediate("smart_router", strategy_value.clone());

        NodeResult::success(strategy_value).with_confidence(0.8)
    }
}

/// Primary web search, cache-first
pub struct PrimarySearchNode {
    provider: Arc<dyn SearchProvider>,
    cache: Arc<dyn KvCache>,
    search_cost: f64,
    max_results: usize,
}

impl PrimarySearchNode {
    pub fn new(provider: Arc<dyn SearchProvider>, cache: Arc<dyn KvCache>, search_cost: f64) -> Self {
        Self {
            provider,
            cache,
            search_cost,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

#[async_trait]
impl GraphNode for PrimarySearchNode {
    fn name(&self) -> &str {
        "brave_search"
    }

    async fn execute(&self, state: &mut ExecutionState) -> NodeResult {
        let query = state.processed_query.clone();
        let max_results = state
            .intermediate("request")
            .and_then(|v| v.get("max_results"))
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(self.max_results);
        let key = search_key(&query, max_results);

        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(hits) = serde_json::from_value::<Vec<SearchHit>>(cached) {
                let count = hits.len();
                state.set_intermediate("brave_search", json!({"results": hits}));
                state
                    .response_metadata
                    .insert("providers_used".to_string(), json!([]));
                return NodeResult::success(json!({
                    "result_count": count,
                    "from_cache": true,
                }))
                .with_confidence(0.8);
            }
        }

        if !state.within_budget(self.search_cost) {
            state.append_warning("brave_search", "insufficient budget for primary search");
            state.set_intermediate("brave_search", json!({"results": []}));
            return NodeResult::success(json!({"result_count": 0})).with_confidence(0.2);
        }

        match self.provider.search(&query, max_results).await {
            Ok(hits) => {
                if let Ok(value) = serde_json::to_value(&hits) {
                    self.cache.set(&key, value, SEARCH_CACHE_TTL).await;
                }
                let count = hits.len();
                state.set_intermediate("brave_search", json!({"results": hits}));
                state
                    .response_metadata
                    .insert("providers_used".to_string(), json!([self.provider.name()]));
                NodeResult::success(json!({
                    "result_count": count,
                    "from_cache": false,
                }))
                .with_confidence(0.75)
                .with_cost(self.search_cost)
            }
            Err(err) => {
                // Provider faults are isolated; an empty result set routes
                // the run to the direct branch
                state.append_warning("brave_search", format!("provider failed: {}", err));
                state.set_intermediate("brave_search", json!({"results": []}));
                NodeResult::success(json!({
                    "result_count": 0,
                    "provider_error": err.to_string(),
                }))
                .with_confidence(0.2)
            }
        }
    }
}

/// Best-effort content enhancement over the top search results
pub struct ContentEnhancementNode {
    provider: Arc<dyn SearchProvider>,
    scrape_cost: f64,
}

impl ContentEnhancementNode {
    pub fn new(provider: Arc<dyn SearchProvider>, scrape_cost: f64) -> Self {
        Self {
            provider,
            scrape_cost,
        }
    }
}

#[async_trait]
impl GraphNode for ContentEnhancementNode {
    fn name(&self) -> &str {
        "content_enhancement"
    }

    async fn execute(&self, state: &mut ExecutionState) -> NodeResult {
        let strategy = state.intermediate("smart_router").cloned().unwrap_or_default();
        let enabled = strategy
            .get("use_content_enhancement")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let max_fetches = strategy
            .get("max_enhancement_fetches")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;

        if !enabled || max_fetches == 0 {
            return NodeResult::success(json!({"enhancement_skipped": true})).with_confidence(1.0);
        }

        let mut hits: Vec<SearchHit> = state
            .intermediate("brave_search")
            .and_then(|v| v.get("results"))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        if hits.is_empty() {
            return NodeResult::success(json!({
                "enhancement_skipped": true,
                "reason": "no results to enhance",
            }))
            .with_confidence(0.5);
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let mut enhanced = 0usize;
        let mut spent = 0.0;
        for hit in hits.iter_mut().take(max_fetches) {
            if !state.within_budget(spent + self.scrape_cost) {
                state.append_warning("content_enhancement", "budget exhausted mid-enhancement");
                break;
            }
            match self.provider.scrape(&hit.url).await {
                Ok(text) => {
                    hit.content = Some(clip(&text, SCRAPE_CLIP_CHARS).to_string());
                    enhanced += 1;
                    spent += self.scrape_cost;
                }
                Err(err) => {
                    state.append_warning(
                        "content_enhancement",
                        format!("scrape failed for {}: {}", hit.url, err),
                    );
                }
            }
        }

        state.set_intermediate(
            "content_enhancement",
            json!({"results": hits, "enhanced_count": enhanced}),
        );

        NodeResult::success(json!({
            "enhancement_skipped": false,
            "enhanced_count": enhanced,
        }))
        .with_confidence(0.8)
        .with_cost(spent)
    }
}

/// Synthesize the final answer from whatever results exist
pub struct ResponseSynthesisNode {
    generator: Arc<dyn TextGenerator>,
}

impl ResponseSynthesisNode {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl GraphNode for ResponseSynthesisNode {
    fn name(&self) -> &str {
        "response_synthesis"
    }

    async fn execute(&self, state: &mut ExecutionState) -> NodeResult {
        let results_value = state
            .intermediate("content_enhancement")
            .filter(|v| v.get("results").is_some())
            .or_else(|| state.intermediate("brave_search"))
            .cloned()
            .unwrap_or_default();
        let hits: Vec<SearchHit> = results_value
            .get("results")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        if hits.is_empty() {
            return NodeResult::failure("no search results available for synthesis");
        }

        let sources_block = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                let body = hit.content.as_deref().unwrap_or(&hit.snippet);
                format!("{}. {}: {}", i + 1, hit.title, clip(body, 800))
            })
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Answer the question using only the search results below. Cite \
             sources by their number where relevant, and say so when the \
             results do not cover something.\n\n\
             Question: {}\n\nResults:\n{}",
            state.processed_query, sources_block
        );

        let model = self
            .generator
            .generate_text(
                TaskType::QaAndSummary,
                state.quality_requirement,
                &prompt,
                800,
                0.5,
            )
            .await;

        if !model.success {
            return NodeResult::failure(format!(
                "synthesis failed: {}",
                model.error.as_deref().unwrap_or("unknown")
            ))
            .with_execution_time(model.execution_time);
        }

        let citations: Vec<String> = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("[{}] {} - {}", i + 1, hit.title, hit.url))
            .collect();
        let response = format!("{}\n\nSources:\n{}", model.text, citations.join("\n"));
        state.try_set_final_response(response, false);

        let sources: Vec<String> = hits.iter().map(|h| h.url.clone()).collect();
        let enhanced_count = results_value
            .get("enhanced_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;
        let enhanced_ratio = enhanced_count as f64 / hits.len() as f64;
        let confidence =
            (0.5 + 0.1 * (hits.len().min(3) as f64) + 0.2 * enhanced_ratio).min(0.95);

        state
            .response_metadata
            .insert("sources".to_string(), json!(sources));
        state
            .response_metadata
            .insert("citations".to_string(), json!(citations));
        state.response_metadata.insert(
            "quality_metrics".to_string(),
            json!({
                "result_count": hits.len(),
                "enhanced_ratio": enhanced_ratio,
                "response_length": model.text.len(),
            }),
        );

        NodeResult::success(json!({
            "result_count": hits.len(),
            "enhanced_ratio": enhanced_ratio,
        }))
        .with_confidence(confidence)
        .with_cost(model.cost)
        .with_execution_time(model.execution_time)
        .with_model(model.model_used)
    }
}

/// Answer without any external call
pub struct DirectResponseNode {
    generator: Arc<dyn TextGenerator>,
}

impl DirectResponseNode {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn canned_response(query: &str) -> Option<&'static str> {
        match query.trim().to_lowercase().as_str() {
            "hello" | "hi" | "hey" => Some("Hello! What would you like to know?"),
            "thanks" | "thank you" => Some("You're welcome!"),
            _ => None,
        }
    }
}

#[async_trait]
impl GraphNode for DirectResponseNode {
    fn name(&self) -> &str {
        "direct_response"
    }

    async fn execute(&self, state: &mut ExecutionState) -> NodeResult {
        state
            .response_metadata
            .insert("providers_used".to_string(), json!([]));
        state
            .response_metadata
            .insert("answered_directly".to_string(), json!(true));

        if let Some(canned) = Self::canned_response(&state.original_query) {
            state.try_set_final_response(canned, false);
            return NodeResult::success(json!({"method": "canned"})).with_confidence(0.9);
        }

        let prompt = format!(
            "Answer from general knowledge. Live search results are not \
             available for this request, so say so if the answer depends on \
             current events.\n\nQuestion: {}",
            state.processed_query
        );
        let model = self
            .generator
            .generate_text(
                TaskType::QaAndSummary,
                state.quality_requirement,
                &prompt,
                500,
                0.6,
            )
            .await;

        if !model.success {
            return NodeResult::failure(format!(
                "direct response failed: {}",
                model.error.as_deref().unwrap_or("unknown")
            ));
        }

        state.try_set_final_response(model.text.clone(), false);
        NodeResult::success(json!({"method": "model"}))
            .with_confidence(0.6)
            .with_cost(model.cost)
            .with_execution_time(model.execution_time)
            .with_model(model.model_used)
    }
}

/// Last resort for the search pipeline
pub struct SearchErrorHandlerNode;

#[async_trait]
impl GraphNode for SearchErrorHandlerNode {
    fn name(&self) -> &str {
        "error_handler"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::ErrorHandler
    }

    async fn execute(&self, state: &mut ExecutionState) -> NodeResult {
        if state.final_response.is_empty() {
            state.try_set_final_response(
                "I couldn't complete that search. Please try again or rephrase your query.",
                true,
            );
        }
        NodeResult::success(json!({"errors_handled": state.errors.len()})).with_confidence(0.3)
    }
}

/// Assemble and compile the search graph
pub fn build_search_graph(
    generator: Arc<dyn TextGenerator>,
    provider: Arc<dyn SearchProvider>,
    cache: Arc<dyn KvCache>,
    router: SmartRouter,
) -> Result<GraphEngine, GraphError> {
    let search_cost = router.costs().primary_search;
    let scrape_cost = router.costs().enhancement_fetch;

    let mut graph = Graph::new();
    graph.add_node(Arc::new(SmartRouterNode::new(router)));
    graph.add_node(Arc::new(PrimarySearchNode::new(
        provider.clone(),
        cache,
        search_cost,
    )));
    graph.add_node(Arc::new(ContentEnhancementNode::new(provider, scrape_cost)));
    graph.add_node(Arc::new(ResponseSynthesisNode::new(generator.clone())));
    graph.add_node(Arc::new(DirectResponseNode::new(generator)));
    graph.add_node(Arc::new(SearchErrorHandlerNode));

    graph.add_edge(START, "smart_router");

    let branch_on_strategy: RouteFn = Arc::new(|state: &ExecutionState| {
        let skip = state
            .intermediate("smart_router")
            .and_then(|v| v.get("skip_external"))
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        if skip { "direct".to_string() } else { "search".to_string() }
    });
    graph.add_conditional_edge(
        "smart_router",
        branch_on_strategy,
        HashMap::from([
            ("direct".to_string(), "direct_response".to_string()),
            ("search".to_string(), "brave_search".to_string()),
        ]),
    );

    let branch_on_results: RouteFn = Arc::new(|state: &ExecutionState| {
        let count = state
            .intermediate("brave_search")
            .and_then(|v| v.get("results"))
            .and_then(|v| v.as_array())
            .map(|a| a.len())
            .unwrap_or(0);
        if count == 0 {
            "no_results".to_string()
        } else {
            "has_results".to_string()
        }
    });
    graph.add_conditional_edge(
        "brave_search",
        branch_on_results,
        HashMap::from([
            ("no_results".to_string(), "direct_response".to_string()),
            ("has_results".to_string(), "content_enhancement".to_string()),
        ]),
    );

    graph.add_edge("content_enhancement", "response_synthesis");
    graph.add_edge("response_synthesis", END);
    graph.add_edge("direct_response", END);
    graph.add_edge("error_handler", END);
    graph.set_error_handler("error_handler");

    GraphEngine::compile("search", graph)
}
