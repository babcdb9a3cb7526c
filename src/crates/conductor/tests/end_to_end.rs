//! End-to-end scenarios through the public operations

use async_trait::async_trait;
use conductor::{
    ChatRequest, Conductor, ResearchRequest, ResponseStatus, SearchRequest, Services,
};
use models::{
    GenerationErrorKind, GenerationRequest, ModelBackend, ModelError, ModelResult, ModelManager,
    ManagerConfig, StreamChunk, TaskType, TextGenerator,
};
use futures::stream::BoxStream;
use pipelines::{SearchHit, StaticProvider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskgraph_core::QualityLevel;

/// Scripted generator: instant classifier replies, substantial answers,
/// optional latency and failure injection
struct TestGenerator {
    classifier_reply: String,
    answer: String,
    delay: Duration,
    fail_all: bool,
    calls: AtomicUsize,
}

impl TestGenerator {
    fn new() -> Self {
        Self {
            classifier_reply: "conversation".to_string(),
            answer: "React and Vue are both mature component frameworks. React \
                     brings JSX, a huge ecosystem and fine-grained control, while \
                     Vue offers single-file components and an approachable \
                     reactivity model. For large teams with existing React \
                     experience, React remains the safer default; for fast \
                     onboarding, Vue has the edge."
                .to_string(),
            delay: Duration::ZERO,
            fail_all: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn classifying(reply: &str) -> Self {
        Self {
            classifier_reply: reply.to_string(),
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
impl TextGenerator for TestGenerator {
    async fn generate_text(
        &self,
        task: TaskType,
        _quality: QualityLevel,
        _prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> ModelResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_all {
            return ModelResult::failed("phi:2.7b", GenerationErrorKind::Connection, "down");
        }
        if task == TaskType::SimpleClassification {
            ModelResult::ok("phi:2.7b", self.classifier_reply.clone(), 0.05, 2, 40.0)
        } else {
            ModelResult::ok("llama2:7b-chat", self.answer.clone(), 0.4, 80, 60.0)
        }
    }
}

fn search_hits() -> Vec<SearchHit> {
    vec![
        SearchHit::new("React vs Vue in depth", "http://a.example", "framework comparison")
            .with_score(0.9),
        SearchHit::new("Vue 3 reactivity", "http://b.example", "reactivity model").with_score(0.8),
        SearchHit::new("React ecosystem survey", "http://c.example", "ecosystem").with_score(0.7),
        SearchHit::new("Legacy comparison", "http://d.example", "older take").with_score(0.2),
    ]
}

fn conductor_with(generator: Arc<dyn TextGenerator>, provider: Arc<StaticProvider>) -> Conductor {
    Conductor::new(Services::new(generator).with_provider(provider)).unwrap()
}

#[tokio::test]
async fn scenario_simple_greeting() {
    let generator = Arc::new(TestGenerator::classifying("conversation"));
    let conductor = Conductor::new(Services::new(generator)).unwrap();

    let mut request = ChatRequest::new("Hello");
    request.max_cost = 0.10;
    request.include_debug_info = true;

    let result = conductor.run_chat(request).await.unwrap();

    assert!(result.response.len() >= 5);
    assert_eq!(result.status, ResponseStatus::Success);
    assert!(result.metadata.cost <= 0.10);
    assert!(!result.metadata.models_used.is_empty());

    let hints = result.developer_hints.unwrap();
    assert_eq!(
        hints["execution_path"],
        serde_json::json!([
            "start",
            "context_manager",
            "intent_classifier",
            "response_generator",
            "cache_update",
            "end"
        ])
    );
    assert_eq!(hints["intent"], "conversation");
}

#[tokio::test]
async fn scenario_budget_starved_search() {
    let provider = Arc::new(StaticProvider::with_hits(search_hits()));
    let conductor = conductor_with(Arc::new(TestGenerator::new()), provider.clone());

    let mut request = SearchRequest::new("latest AI news", 0.001);
    request.quality = QualityLevel::Balanced;

    let result = conductor.run_search(request).await.unwrap();

    // No external provider was touched
    assert_eq!(provider.search_calls(), 0);
    assert_eq!(provider.scrape_calls(), 0);
    assert!(result.sources_consulted.is_empty());
    assert!(!result.summary.is_empty());
    // Only the direct-response model call is billed, and local models are free
    assert_eq!(result.metadata.cost, 0.0);
}

#[tokio::test]
async fn scenario_premium_enhancement() {
    let provider = Arc::new(StaticProvider::with_hits(search_hits()));
    let conductor = conductor_with(Arc::new(TestGenerator::new()), provider.clone());

    let mut request = SearchRequest::new("compare React and Vue", 5.0);
    request.quality = QualityLevel::Premium;

    let result = conductor.run_search(request).await.unwrap();

    assert_eq!(provider.search_calls(), 1);
    assert_eq!(provider.scrape_calls(), 3);
    assert!(result.summary.len() >= 100);
    assert!(result.results.len() >= 3);
    assert_eq!(result.sources_consulted, vec!["static"]);
    // Primary search plus three enhancement fetches
    assert!((result.metadata.cost - (0.42 + 3.0 * 0.84)).abs() < 1e-6);
    assert_eq!(result.status, ResponseStatus::Success);
}

#[tokio::test]
async fn scenario_research_dependency_waves() {
    let generator = Arc::new(TestGenerator::new());
    let conductor = Conductor::new(Services::new(generator)).unwrap();

    let mut request = ResearchRequest::new("how do rust async runtimes schedule tasks");
    request.methodology = "exploratory".to_string();
    request.depth_level = 2;
    request.cost_budget = 2.0;
    request.time_budget = 30.0;

    let result = conductor.run_research(request).await.unwrap();

    assert!(result.success);
    assert_eq!(
        result.metadata.agents_used,
        vec!["planning", "research", "analysis", "synthesis"]
    );
    assert_eq!(result.metadata.task_count, 4);
    assert!(!result.research_results.is_empty());
    assert!(result.errors.is_empty());
    assert!(result.confidence_score > 0.0);
    assert_eq!(result.detailed_results.len(), 4);
}

#[tokio::test]
async fn scenario_deadline_mid_research() {
    // Each model call takes 5s; the time budget allows half a second
    let generator = Arc::new(TestGenerator::slow(Duration::from_secs(5)));
    let conductor = Conductor::new(Services::new(generator)).unwrap();

    let mut request = ResearchRequest::new("slow question");
    request.time_budget = 0.5;
    request.depth_level = 1;

    let result = conductor.run_research(request).await.unwrap();

    assert!(!result.success);
    assert!(result
        .errors
        .iter()
        .any(|e| e.code == "DEADLINE_EXCEEDED"));
    assert!((result.metadata.execution_time - 0.5).abs() < 0.2);
    // Partial results are present: the in-flight task was cancelled
    assert!(result
        .detailed_results
        .iter()
        .any(|r| r["error"].as_str().unwrap_or_default().contains("canceled")));
}

#[tokio::test]
async fn boundary_empty_query_rejected_at_zero_cost() {
    let conductor = Conductor::new(Services::new(Arc::new(TestGenerator::new()))).unwrap();

    let err = conductor
        .run_chat(ChatRequest::new("   "))
        .await
        .unwrap_err();
    assert_eq!(err.error_code, "VALIDATION_ERROR");
    assert_eq!(err.execution_time, 0.0);
}

#[tokio::test]
async fn boundary_over_long_query_rejected() {
    let conductor = Conductor::new(Services::new(Arc::new(TestGenerator::new()))).unwrap();

    let err = conductor
        .run_search(SearchRequest::new("x".repeat(10_000), 1.0))
        .await
        .unwrap_err();
    assert_eq!(err.error_code, "VALIDATION_ERROR");
    assert!(err.user_message.contains("maximum length"));
}

#[tokio::test]
async fn boundary_unknown_methodology_rejected() {
    let conductor = Conductor::new(Services::new(Arc::new(TestGenerator::new()))).unwrap();

    let mut request = ResearchRequest::new("q");
    request.methodology = "speculative".to_string();
    let err = conductor.run_research(request).await.unwrap_err();
    assert_eq!(err.error_code, "VALIDATION_ERROR");
}

/// Backend whose discovery and loading always fail: the manager runs
/// degraded and generation fails with a classified error, but the chat
/// envelope still answers with the safe fallback
struct DeadBackend;

#[async_trait]
impl ModelBackend for DeadBackend {
    async fn health_check(&self) -> bool {
        false
    }

    async fn list_models(&self, _force: bool) -> Result<Vec<String>, ModelError> {
        Err(ModelError::Connection("refused".into()))
    }

    async fn pull_model(&self, name: &str) -> Result<(), ModelError> {
        Err(ModelError::ModelNotFound(name.to_string()))
    }

    async fn generate(&self, request: &GenerationRequest) -> ModelResult {
        ModelResult::failed(
            request.model.clone(),
            GenerationErrorKind::Connection,
            "backend is down",
        )
    }

    async fn generate_stream(
        &self,
        _request: &GenerationRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk, ModelError>>, ModelError> {
        Err(ModelError::Connection("refused".into()))
    }
}

#[tokio::test]
async fn degraded_catalog_still_answers_with_fallback() {
    let config = ManagerConfig {
        discovery_attempts: 1,
        ..ManagerConfig::default()
    };
    let manager = Arc::new(ModelManager::new(Arc::new(DeadBackend), config));
    manager.initialize().await;
    assert!(manager.is_degraded());

    // Selection still serves the configured default name
    assert_eq!(
        manager.select_optimal_model(TaskType::QaAndSummary, QualityLevel::Balanced),
        "llama2:7b-chat"
    );

    let conductor =
        Conductor::new(Services::new(manager.clone() as Arc<dyn TextGenerator>)).unwrap();
    let result = conductor.run_chat(ChatRequest::new("Hello there")).await.unwrap();

    // Every model call failed, so the error handler's fallback answered
    assert_eq!(result.status, ResponseStatus::Partial);
    assert!(!result.response.is_empty());
    assert!(result.metadata.models_used.is_empty());
}
