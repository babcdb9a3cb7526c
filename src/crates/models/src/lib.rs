//! Model management for conductor
//!
//! Presents a uniform generate interface over a pool of named models with
//! distinct cost and quality profiles:
//!
//! - [`OllamaClient`] - thin async HTTP client over the local inference
//!   daemon (health, list, pull, unary and streaming generate) with result
//!   caching and transport-only retries
//! - [`ModelInfo`] - per-model performance record (EWMA latency, rolling
//!   success window, confidence history, tier)
//! - [`ModelManager`] - catalog discovery, cached selection scoring,
//!   single-flight loading and per-model stat tracking
//! - [`TextGenerator`] - the narrow seam graphs and agents call, so nothing
//!   above this crate touches HTTP directly

pub mod client;
pub mod error;
pub mod info;
pub mod manager;
pub mod types;

pub use client::{ModelBackend, OllamaClient, OllamaConfig};
pub use error::ModelError;
pub use info::ModelInfo;
pub use manager::{ManagerConfig, ModelManager, TextGenerator};
pub use types::{
    GenerationErrorKind, GenerationRequest, ModelResult, ModelStatus, ModelTier, StreamChunk,
    TaskType,
};

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
