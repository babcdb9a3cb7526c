//! Model lifecycle management with cost-aware selection
//!
//! The manager catalogs available models, classifies them into residency
//! tiers, and picks one per `(task kind, quality)` pair with a short-TTL
//! selection cache. Loading is single-flight: two callers racing to load the
//! same model issue one pull. Discovery failures put the manager into a
//! degraded state where selection serves a hard-coded default and generation
//! fails with a classified model-unavailable error.
//!
//! Generation failures are never retried here; transport retries live in the
//! backend client and task retries in the scheduler.

use crate::client::ModelBackend;
use crate::error::ModelError;
use crate::info::ModelInfo;
use crate::types::{
    GenerationErrorKind, GenerationRequest, ModelResult, ModelStatus, ModelTier, TaskType,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskgraph_core::QualityLevel;
use tokio::time::Instant;
use tooling::retry::{retry_with_backoff, BackoffSchedule};
use tracing::{debug, info, warn};

/// Manager configuration
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Served when the catalog is empty or nothing is ready
    pub default_model: String,
    /// Preferred model per task kind
    pub assignments: HashMap<TaskType, String>,
    /// Name-prefix to tier classification, first match wins
    pub tier_prefixes: Vec<(String, ModelTier)>,
    /// Selection cache TTL
    pub selection_ttl: Duration,
    /// How long to wait for a model already loading elsewhere
    pub load_wait: Duration,
    /// Discovery attempts before entering degraded mode
    pub discovery_attempts: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_model: "llama2:7b-chat".to_string(),
            assignments: HashMap::from([
                (TaskType::SimpleClassification, "phi:2.7b".to_string()),
                (TaskType::QaAndSummary, "llama2:7b-chat".to_string()),
                (
                    TaskType::AnalyticalReasoning,
                    "mistral:7b-instruct".to_string(),
                ),
                (TaskType::DeepResearch, "mistral:7b-instruct".to_string()),
                (TaskType::CodeTasks, "deepseek-coder:6.7b".to_string()),
                (TaskType::Multilingual, "llama2:7b-chat".to_string()),
                (TaskType::CreativeWriting, "mistral:7b-instruct".to_string()),
                (TaskType::Conversation, "llama2:7b-chat".to_string()),
            ]),
            tier_prefixes: vec![
                ("phi".to_string(), ModelTier::T0),
                ("llama2".to_string(), ModelTier::T1),
            ],
            selection_ttl: Duration::from_secs(60),
            load_wait: Duration::from_secs(30),
            discovery_attempts: 3,
        }
    }
}

type SelectionKey = (TaskType, QualityLevel);

/// Model catalog, selection and generation front-end
pub struct ModelManager {
    backend: Arc<dyn ModelBackend>,
    config: ManagerConfig,
    registry: DashMap<String, ModelInfo>,
    selection_cache: Mutex<HashMap<SelectionKey, (String, Instant)>>,
    load_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    degraded: AtomicBool,
    shut_down: AtomicBool,
}

impl ModelManager {
    pub fn new(backend: Arc<dyn ModelBackend>, config: ManagerConfig) -> Self {
        Self {
            backend,
            config,
            registry: DashMap::new(),
            selection_cache: Mutex::new(HashMap::new()),
            load_locks: Mutex::new(HashMap::new()),
            degraded: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Discover the catalog from the backend
    ///
    /// Retries with exponential backoff; on ultimate failure the manager
    /// enters degraded mode with an empty catalog and keeps serving.
    pub async fn initialize(&self) {
        let backoff = BackoffSchedule::starting_at(Duration::from_millis(500));
        match retry_with_backoff(self.config.discovery_attempts, backoff, || {
            self.backend.list_models(true)
        })
        .await
        {
            Ok(names) => {
                for name in names {
                    let tier = self.classify_tier(&name);
                    self.registry.insert(
                        name.clone(),
                        ModelInfo::new(name, tier).with_status(ModelStatus::Ready),
                    );
                }
                self.degraded.store(false, Ordering::SeqCst);
                info!(models = self.registry.len(), "model catalog discovered");
            }
            Err(err) => {
                self.degraded.store(true, Ordering::SeqCst);
                warn!(error = %err, "model discovery failed, entering degraded mode");
            }
        }
    }

    /// Whether discovery failed and the catalog is untrusted
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn classify_tier(&self, name: &str) -> ModelTier {
        for (prefix, tier) in &self.config.tier_prefixes {
            if name.starts_with(prefix.as_str()) {
                return *tier;
            }
        }
        ModelTier::T2
    }

    fn is_ready(&self, name: &str) -> bool {
        self.registry
            .get(name)
            .map(|info| info.status == ModelStatus::Ready)
            .unwrap_or(false)
    }

    /// Pick the model for a task kind at a quality level
    ///
    /// Selection order: fresh cache entry whose model is still ready, then
    /// the configured assignment, then the best-scoring ready model with ties
    /// broken by ascending name, and finally the hard-coded default.
    pub fn select_optimal_model(&self, task: TaskType, quality: QualityLevel) -> String {
        let key = (task, quality);

        {
            let mut cache = self.selection_cache.lock();
            if let Some((model, at)) = cache.get(&key) {
                if at.elapsed() < self.config.selection_ttl && self.is_ready(model) {
                    return model.clone();
                }
                cache.remove(&key);
            }
        }

        let selected = self.pick_model(task);
        self.selection_cache
            .lock()
            .insert(key, (selected.clone(), Instant::now()));
        selected
    }

    fn pick_model(&self, task: TaskType) -> String {
        if let Some(preferred) = self.config.assignments.get(&task) {
            if self.is_ready(preferred) {
                return preferred.clone();
            }
        }

        // Preferred not ready: score every ready model, ties by ascending
        // name for determinism
        let now = Utc::now();
        let mut candidates: Vec<(String, f64)> = self
            .registry
            .iter()
            .filter(|entry| entry.status == ModelStatus::Ready)
            .map(|entry| (entry.name.clone(), entry.selection_score(now)))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        let mut best: Option<(String, f64)> = None;
        for (name, score) in candidates {
            match &best {
                Some((_, best_score)) if score <= *best_score => {}
                _ => best = Some((name, score)),
            }
        }

        match best {
            Some((name, _)) => name,
            None => {
                warn!(
                    fallback = %self.config.default_model,
                    "no ready models, serving emergency fallback"
                );
                self.config.default_model.clone()
            }
        }
    }

    /// Run one generation call against a named model
    ///
    /// Ensures the model is loaded first (waiting out an in-flight load or
    /// issuing a single-flight pull), then calls the backend and folds the
    /// outcome into the model's performance record. Failures are in-band and
    /// never retried at this level.
    pub async fn generate(&self, request: GenerationRequest) -> ModelResult {
        if self.shut_down.load(Ordering::SeqCst) {
            return ModelResult::failed(
                request.model.clone(),
                GenerationErrorKind::Other,
                "model manager is shut down",
            );
        }

        if let Err(err) = self.ensure_loaded(&request.model).await {
            let result = ModelResult::failed(
                request.model.clone(),
                GenerationErrorKind::ModelUnavailable,
                err.to_string(),
            );
            self.update_stats(&result);
            return result;
        }

        let result = self.backend.generate(&request).await;
        self.update_stats(&result);
        result
    }

    fn update_stats(&self, result: &ModelResult) {
        let mut info = self
            .registry
            .entry(result.model_used.clone())
            .or_insert_with(|| {
                let tier = self.classify_tier(&result.model_used);
                ModelInfo::new(result.model_used.clone(), tier)
            });
        info.update_stats(result, 0.0);
    }

    /// Record a caller-observed confidence score against a model
    pub fn record_confidence(&self, model: &str, confidence: f64) {
        if let Some(mut info) = self.registry.get_mut(model) {
            info.record_confidence(confidence);
        }
    }

    async fn ensure_loaded(&self, model: &str) -> Result<(), ModelError> {
        match self.registry.get(model).map(|info| info.status) {
            Some(ModelStatus::Ready) => return Ok(()),
            Some(ModelStatus::Loading) => return self.wait_for_ready(model).await,
            _ => {}
        }

        // Single-flight: one load per model at a time
        let lock = {
            let mut locks = self.load_locks.lock();
            locks
                .entry(model.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        // A racing caller may have finished the load while we waited
        if self.is_ready(model) {
            return Ok(());
        }

        self.set_status(model, ModelStatus::Loading);
        debug!(model, "loading model");

        match self.backend.pull_model(model).await {
            Ok(()) => {
                self.set_status(model, ModelStatus::Ready);
                Ok(())
            }
            Err(err) => {
                self.set_status(model, ModelStatus::Error);
                Err(err)
            }
        }
    }

    async fn wait_for_ready(&self, model: &str) -> Result<(), ModelError> {
        let deadline = Instant::now() + self.config.load_wait;
        while Instant::now() < deadline {
            match self.registry.get(model).map(|info| info.status) {
                Some(ModelStatus::Ready) => return Ok(()),
                Some(ModelStatus::Error) | None => {
                    return Err(ModelError::Other(format!("load failed for {}", model)))
                }
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
        Err(ModelError::Timeout(format!(
            "model {} did not become ready within {:?}",
            model, self.config.load_wait
        )))
    }

    fn set_status(&self, model: &str, status: ModelStatus) {
        let tier = self.classify_tier(model);
        self.registry
            .entry(model.to_string())
            .or_insert_with(|| ModelInfo::new(model.to_string(), tier))
            .status = status;
    }

    /// Snapshot of every model's performance record
    pub fn model_snapshot(&self) -> Vec<ModelInfo> {
        self.registry
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of models in the catalog
    pub fn catalog_size(&self) -> usize {
        self.registry.len()
    }

    /// Release resources; safe to call more than once
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.selection_cache.lock().clear();
        self.load_locks.lock().clear();
        info!("model manager shut down");
    }
}

/// The narrow generation seam graphs and agents call
///
/// Implemented by [`ModelManager`]; tests substitute scripted generators so
/// nothing above this crate needs a live backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(
        &self,
        task: TaskType,
        quality: QualityLevel,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> ModelResult;
}

#[async_trait]
impl TextGenerator for ModelManager {
    async fn generate_text(
        &self,
        task: TaskType,
        quality: QualityLevel,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> ModelResult {
        let model = self.select_optimal_model(task, quality);
        let request = GenerationRequest::new(model, prompt)
            .with_max_tokens(max_tokens)
            .with_temperature(temperature);
        self.generate(request).await
    }
}
