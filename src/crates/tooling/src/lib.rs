//! Shared utilities for the conductor workspace
//!
//! This crate provides the ambient plumbing every other crate leans on:
//!
//! - `retry` - Bounded retries over a doubling backoff schedule
//! - `timeout` - Run time budgets and the per-operation-class timeout table
//!   with adaptive upgrades
//! - `safety` - Response materialization validation for envelope results
//! - `config` - Environment-variable configuration helpers
//! - `logging` - Structured logging initialization and timing helpers

pub mod config;
pub mod logging;
pub mod retry;
pub mod safety;
pub mod timeout;

use thiserror::Error;

/// Errors that can occur in the tooling crate
#[derive(Debug, Error)]
pub enum ToolingError {
    /// General error with message
    #[error("Tooling error: {0}")]
    General(String),

    /// Configuration value missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for tooling operations
pub type Result<T> = std::result::Result<T, ToolingError>;
