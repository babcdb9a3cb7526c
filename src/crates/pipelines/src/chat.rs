//! Chat graph: context -> intent -> generate -> cache-update
//!
//! Four processing nodes and an error handler. The context manager is pure
//! CPU work; the intent classifier uses the smallest, fastest model with a
//! keyword fallback; the response generator selects by intent at the
//! requested quality; the cache update offers the finished turn to the
//! external cache and is a no-op without one.

use crate::cache::{conversation_key, KvCache};
use crate::intent::{classify_by_keywords, task_type_for};
use async_trait::async_trait;
use models::{TaskType, TextGenerator};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use taskgraph_core::{
    ConversationTurn, ExecutionState, Graph, GraphEngine, GraphError, GraphNode, Intent, NodeKind,
    NodeResult, QualityLevel, END, START,
};
use tracing::debug;

const CONVERSATION_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Infer conversation attributes and enrich the query
pub struct ContextManagerNode;

#[async_trait]
impl GraphNode for ContextManagerNode {
    fn name(&self) -> &str {
        "context_manager"
    }

    async fn execute(&self, state: &mut ExecutionState) -> NodeResult {
        if state.conversation_history.is_empty() {
            return NodeResult::success(json!({"has_context": false})).with_confidence(0.9);
        }

        let all_text: String = state
            .conversation_history
            .iter()
            .map(|t| t.content.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        let expertise = if ["code", "api", "function", "compile", "deploy"]
            .iter()
            .any(|m| all_text.contains(m))
        {
            "technical"
        } else {
            "general"
        };
        let mood = if ["not working", "broken", "frustrated", "still fails"]
            .iter()
            .any(|m| all_text.contains(m))
        {
            "frustrated"
        } else {
            "neutral"
        };

        let recent_topics: Vec<String> = state
            .conversation_history
            .iter()
            .rev()
            .filter(|t| t.role == "user")
            .take(3)
            .map(|t| t.content.split_whitespace().take(6).collect::<Vec<_>>().join(" "))
            .collect();

        let prefix = recent_topics
            .first()
            .map(|topic| format!("[continuing a conversation about: {}] ", topic))
            .unwrap_or_default();
        state.processed_query = format!("{}{}", prefix, state.original_query);

        NodeResult::success(json!({
            "has_context": true,
            "expertise": expertise,
            "mood": mood,
            "recent_topics": recent_topics,
            "history_turns": state.conversation_history.len(),
        }))
        .with_confidence(0.9)
    }
}

/// Classify the query's intent with a small model, keywords as fallback
pub struct IntentClassifierNode {
    generator: Arc<dyn TextGenerator>,
}

impl IntentClassifierNode {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl GraphNode for IntentClassifierNode {
    fn name(&self) -> &str {
        "intent_classifier"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decision
    }

    async fn execute(&self, state: &mut ExecutionState) -> NodeResult {
        let prompt = format!(
            "Classify the intent of this message as exactly one word from: \
             conversation, question, code, analysis, request, creative.\n\n\
             Message: {}\n\nIntent:",
            state.original_query
        );

        let model = self
            .generator
            .generate_text(
                TaskType::SimpleClassification,
                QualityLevel::Minimal,
                &prompt,
                8,
                0.0,
            )
            .await;

        let (intent, method, result) = if model.success {
            match Intent::parse(&model.text) {
                Some(intent) => (intent, "model", Some(model)),
                None => (classify_by_keywords(&state.original_query), "keyword", None),
            }
        } else {
            debug!("classifier model failed, using keyword rules");
            (classify_by_keywords(&state.original_query), "keyword", None)
        };

        state.intent = Some(intent);

        let mut node_result = NodeResult::success(json!({
            "intent": intent.as_str(),
            "classification_method": method,
        }))
        .with_confidence(if method == "model" { 0.85 } else { 0.6 });

        if let Some(model) = result {
            node_result = node_result
                .with_cost(model.cost)
                .with_execution_time(model.execution_time)
                .with_model(model.model_used);
        }
        node_result
    }
}

/// Generate the final chat response
pub struct ResponseGeneratorNode {
    generator: Arc<dyn TextGenerator>,
}

impl ResponseGeneratorNode {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn max_tokens_for(quality: QualityLevel) -> u32 {
        match quality {
            QualityLevel::Minimal => 256,
            QualityLevel::Balanced => 512,
            QualityLevel::High => 768,
            QualityLevel::Premium => 1024,
        }
    }
}

#[async_trait]
impl GraphNode for ResponseGeneratorNode {
    fn name(&self) -> &str {
        "response_generator"
    }

    async fn execute(&self, state: &mut ExecutionState) -> NodeResult {
        let intent = state.intent.unwrap_or(Intent::Conversation);
        let task = task_type_for(intent);

        // Degrade rather than overrun when the budget is already spent
        let quality = if state.within_budget(0.0) {
            state.quality_requirement
        } else {
            state.append_warning("response_generator", "budget exhausted, degrading quality");
            QualityLevel::Minimal
        };

        let history_tail: String = state
            .conversation_history
            .iter()
            .rev()
            .take(3)
            .rev()
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = if history_tail.is_empty() {
            format!("Respond helpfully and concisely.\n\nUser: {}", state.processed_query)
        } else {
            format!(
                "Respond helpfully and concisely, consistent with the conversation so far.\n\n\
                 {}\nuser: {}",
                history_tail, state.processed_query
            )
        };

        let style = state
            .intermediate("request")
            .and_then(|v| v.get("style"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let prompt = match style {
            Some(style) => format!("{}\n\nRespond in a {} style.", prompt, style),
            None => prompt,
        };

        let temperature = if task == TaskType::CodeTasks { 0.2 } else { 0.7 };
        let model = self
            .generator
            .generate_text(task, quality, &prompt, Self::max_tokens_for(quality), temperature)
            .await;

        if !model.success {
            return NodeResult::failure(format!(
                "response generation failed: {}",
                model.error.as_deref().unwrap_or("unknown")
            ))
            .with_execution_time(model.execution_time);
        }

        state.try_set_final_response(model.text.clone(), false);

        let confidence = (0.6 + (model.text.len() as f64 / 2000.0) * 0.2).min(0.9);
        NodeResult::success(json!({
            "response_length": model.text.len(),
            "task_type": task.as_str(),
            "intent": intent.as_str(),
        }))
        .with_confidence(confidence)
        .with_cost(model.cost)
        .with_execution_time(model.execution_time)
        .with_model(model.model_used)
    }
}

/// Offer the finished turn to the external cache
pub struct CacheUpdateNode {
    cache: Arc<dyn KvCache>,
}

impl CacheUpdateNode {
    pub fn new(cache: Arc<dyn KvCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl GraphNode for CacheUpdateNode {
    fn name(&self) -> &str {
        "cache_update"
    }

    async fn execute(&self, state: &mut ExecutionState) -> NodeResult {
        let Some(session_id) = state.session_id.clone() else {
            return NodeResult::success(json!({"cached": false})).with_confidence(1.0);
        };

        let mut turns = state.conversation_history.clone();
        turns.push(ConversationTurn::user(state.original_query.clone()));
        turns.push(ConversationTurn::assistant(state.final_response.clone()));

        let value = match serde_json::to_value(&turns) {
            Ok(value) => value,
            Err(err) => {
                state.append_warning("cache_update", format!("history serialization: {}", err));
                return NodeResult::success(json!({"cached": false})).with_confidence(1.0);
            }
        };

        self.cache
            .set(&conversation_key(&session_id), value, CONVERSATION_CACHE_TTL)
            .await;

        NodeResult::success(json!({"cached": true, "turns": turns.len()})).with_confidence(1.0)
    }
}

/// Last resort: make sure the run ends with something to say
pub struct ChatErrorHandlerNode;

#[async_trait]
impl GraphNode for ChatErrorHandlerNode {
    fn name(&self) -> &str {
        "error_handler"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::ErrorHandler
    }

    async fn execute(&self, state: &mut ExecutionState) -> NodeResult {
        if state.final_response.is_empty() {
            state.try_set_final_response(
                "I ran into a problem handling that request. Please try again.",
                true,
            );
        }
        NodeResult::success(json!({"errors_handled": state.errors.len()})).with_confidence(0.3)
    }
}

/// Assemble and compile the chat graph
pub fn build_chat_graph(
    generator: Arc<dyn TextGenerator>,
    cache: Arc<dyn KvCache>,
) -> Result<GraphEngine, GraphError> {
    let mut graph = Graph::new();
    graph.add_node(Arc::new(ContextManagerNode));
    graph.add_node(Arc::new(IntentClassifierNode::new(generator.clone())));
    graph.add_node(Arc::new(ResponseGeneratorNode::new(generator)));
    graph.add_node(Arc::new(CacheUpdateNode::new(cache)));
    graph.add_node(Arc::new(ChatErrorHandlerNode));

    graph.add_edge(START, "context_manager");
    graph.add_edge("context_manager", "intent_classifier");
    graph.add_edge("intent_classifier", "response_generator");
    graph.add_edge("response_generator", "cache_update");
    graph.add_edge("cache_update", END);
    graph.add_edge("error_handler", END);
    graph.set_error_handler("error_handler");

    GraphEngine::compile("chat", graph)
}
