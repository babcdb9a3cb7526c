//! Async HTTP client for the local inference daemon
//!
//! Thin wrapper over the daemon's REST surface: `/api/tags` (list),
//! `/api/pull` (streaming pull) and `/api/generate` (unary and streaming).
//! Health checks are cached for 30 seconds and the model list for 5 minutes;
//! a completed pull invalidates the list cache.
//!
//! Retry policy: transport faults (connection errors, 5xx) are retried up to
//! `max_retries` times with `retry_delay * 2^attempt` backoff. Timeouts, 4xx
//! responses and model-not-found errors fail immediately.

use crate::error::ModelError;
use crate::types::{
    nanos_to_secs, GenerationErrorKind, GenerationRequest, ModelResult, StreamChunk,
};
use crate::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Backend interface the model manager depends on
///
/// [`OllamaClient`] is the production implementation; tests substitute their
/// own.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Whether the daemon is reachable and answering
    async fn health_check(&self) -> bool;

    /// Names of the models currently available on the backend
    async fn list_models(&self, force_refresh: bool) -> Result<Vec<String>>;

    /// Pull a model onto the backend, waiting for completion
    async fn pull_model(&self, name: &str) -> Result<()>;

    /// One unary generation call; failures are in-band
    async fn generate(&self, request: &GenerationRequest) -> ModelResult;

    /// Streaming generation; the stream ends after the `done` chunk
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>>;
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub max_retries: usize,
    /// Base retry delay in seconds; doubled each attempt
    pub retry_delay: f64,
    pub health_cache_ttl: Duration,
    pub list_cache_ttl: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            max_retries: 3,
            retry_delay: 1.0,
            health_cache_ttl: Duration::from_secs(30),
            list_cache_ttl: Duration::from_secs(300),
        }
    }
}

impl OllamaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// HTTP client for the inference daemon
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
    health_cache: Mutex<Option<(Instant, bool)>>,
    list_cache: Mutex<Option<(Instant, Vec<String>)>>,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ModelError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            health_cache: Mutex::new(None),
            list_cache: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Classify a reqwest error into a model error
    fn classify(err: reqwest::Error) -> ModelError {
        if err.is_timeout() {
            ModelError::Timeout(err.to_string())
        } else if err.is_connect() {
            ModelError::Connection(err.to_string())
        } else {
            ModelError::Http(err)
        }
    }

    async fn request_with_retry<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    let delay = self.config.retry_delay * 2f64.powi(attempt as i32);
                    debug!(attempt, delay_secs = delay, error = %err, "retrying backend call");
                    last_error = Some(err);
                    if attempt + 1 < self.config.max_retries {
                        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| ModelError::Other("retry budget exhausted".into())))
    }

    async fn fetch_model_names(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ModelError::ServiceUnavailable(format!(
                "list models returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(ModelError::InvalidResponse(format!(
                "list models returned {}",
                status
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn invalidate_list_cache(&self) {
        *self.list_cache.lock() = None;
    }
}

#[async_trait]
impl ModelBackend for OllamaClient {
    async fn health_check(&self) -> bool {
        if let Some((at, healthy)) = *self.health_cache.lock() {
            if at.elapsed() < self.config.health_cache_ttl {
                return healthy;
            }
        }

        let healthy = match self
            .client
            .get(self.url("/api/tags"))
            .timeout(Duration::from_secs(30))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        };

        *self.health_cache.lock() = Some((Instant::now(), healthy));
        healthy
    }

    async fn list_models(&self, force_refresh: bool) -> Result<Vec<String>> {
        if !force_refresh {
            if let Some((at, models)) = self.list_cache.lock().clone() {
                if at.elapsed() < self.config.list_cache_ttl {
                    return Ok(models);
                }
            }
        }

        let models = self
            .request_with_retry(|| self.fetch_model_names())
            .await?;
        *self.list_cache.lock() = Some((Instant::now(), models.clone()));
        Ok(models)
    }

    async fn pull_model(&self, name: &str) -> Result<()> {
        let body = PullRequest {
            name: name.to_string(),
            stream: true,
        };

        let response = self
            .client
            .post(self.url("/api/pull"))
            .json(&body)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(ModelError::ModelNotFound(name.to_string()));
        }
        if !status.is_success() {
            return Err(ModelError::ServiceUnavailable(format!(
                "pull returned {}",
                status
            )));
        }

        // Progress arrives as NDJSON; drain it to completion
        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Self::classify)?;
            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Ok(progress) = serde_json::from_slice::<PullProgress>(&line) {
                    if let Some(error) = progress.error {
                        return Err(ModelError::Other(format!("pull failed: {}", error)));
                    }
                    debug!(model = name, status = %progress.status, "pull progress");
                }
            }
        }

        self.invalidate_list_cache();
        Ok(())
    }

    async fn generate(&self, request: &GenerationRequest) -> ModelResult {
        let body = GenerateRequest::from_request(request, false);
        let started = std::time::Instant::now();

        let attempt = || async {
            let response = self
                .client
                .post(self.url("/api/generate"))
                .json(&body)
                .timeout(request.timeout)
                .send()
                .await
                .map_err(Self::classify)?;

            let status = response.status();
            if status.as_u16() == 404 {
                return Err(ModelError::ModelNotFound(request.model.clone()));
            }
            if status.is_server_error() {
                return Err(ModelError::ServiceUnavailable(format!(
                    "generate returned {}",
                    status
                )));
            }
            if !status.is_success() {
                return Err(ModelError::InvalidResponse(format!(
                    "generate returned {}",
                    status
                )));
            }

            response
                .json::<GenerateResponse>()
                .await
                .map_err(|e| ModelError::InvalidResponse(e.to_string()))
        };

        match self.request_with_retry(attempt).await {
            Ok(parsed) => {
                let execution_time = parsed
                    .total_duration
                    .map(nanos_to_secs)
                    .unwrap_or_else(|| started.elapsed().as_secs_f64());
                let tokens = parsed.eval_count.unwrap_or(0);
                let tokens_per_second = match parsed.eval_duration.map(nanos_to_secs) {
                    Some(secs) if secs > 0.0 => tokens as f64 / secs,
                    _ => 0.0,
                };
                ModelResult::ok(
                    request.model.clone(),
                    parsed.response,
                    execution_time,
                    tokens,
                    tokens_per_second,
                )
            }
            Err(err) => {
                warn!(model = %request.model, error = %err, "generation failed");
                let kind = match &err {
                    ModelError::Timeout(_) => GenerationErrorKind::Timeout,
                    ModelError::Connection(_) | ModelError::ServiceUnavailable(_) => {
                        GenerationErrorKind::Connection
                    }
                    ModelError::ModelNotFound(_) => GenerationErrorKind::ModelUnavailable,
                    _ => GenerationErrorKind::Other,
                };
                ModelResult::failed(request.model.clone(), kind, err.to_string())
            }
        }
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        let body = GenerateRequest::from_request(request, true);

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&body)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(ModelError::ModelNotFound(request.model.clone()));
        }
        if !status.is_success() {
            return Err(ModelError::ServiceUnavailable(format!(
                "generate returned {}",
                status
            )));
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut buffer: Vec<u8> = Vec::new();
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(OllamaClient::classify)?;
                buffer.extend_from_slice(&chunk);
                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    if line.iter().all(|b| b.is_ascii_whitespace()) {
                        continue;
                    }
                    let parsed: StreamResponse = serde_json::from_slice(&line)
                        .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
                    let done = parsed.done;
                    yield StreamChunk {
                        text: parsed.response,
                        done,
                        prompt_eval_count: parsed.prompt_eval_count,
                        eval_count: parsed.eval_count,
                        total_duration: parsed.total_duration,
                    };
                    if done {
                        break 'outer;
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}

// Wire types for the daemon's REST surface

#[derive(Debug, Serialize)]
struct PullRequest {
    name: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct PullProgress {
    #[serde(default)]
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

impl GenerateRequest {
    fn from_request(request: &GenerationRequest, stream: bool) -> Self {
        Self {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            stream,
            options: GenerateOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
                stop: request.stop.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    eval_duration: Option<u64>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    total_duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}
