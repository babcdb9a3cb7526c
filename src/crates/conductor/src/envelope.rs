//! Async-safety envelope
//!
//! Every inbound operation runs inside an envelope that enforces an
//! operation-class deadline and guarantees the returned value is fully
//! materialized. On timeout the envelope returns a structured deadline error
//! carrying the elapsed time, the operation class, and whatever partial
//! state the run managed to record.

use crate::responses::ServiceError;
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use taskgraph_core::ExecutionState;
use tokio::sync::Mutex;
use tooling::safety;
use tooling::timeout::{adaptive_timeout, OperationClass};
use tracing::warn;

/// Pick the envelope class for a chat query
///
/// Short conversational turns get the tight budget; anything longer or
/// heavier is standard.
pub fn chat_class(query: &str) -> OperationClass {
    if query.split_whitespace().count() <= 12 {
        OperationClass::Simple
    } else {
        OperationClass::Standard
    }
}

/// Grace the envelope allows beyond the in-run deadline, so the engine and
/// scheduler get to record partial state before the envelope fires
pub const ENVELOPE_GRACE: Duration = Duration::from_millis(500);

/// The run deadline: the adaptive class timeout, never beyond the request's
/// own time budget
///
/// The budget is clamped to a sane range so a missing or absurd value can
/// never panic the duration conversion.
pub fn run_deadline(class: OperationClass, query: &str, request_budget: f64) -> Duration {
    let adaptive = adaptive_timeout(class, query);
    let clamped = if request_budget.is_finite() {
        request_budget.clamp(0.1, 86_400.0)
    } else {
        86_400.0
    };
    adaptive.min(Duration::from_secs_f64(clamped))
}

/// Run an operation under its deadline and materialization contract
///
/// `shared_state` is the run's execution state; on timeout the envelope
/// reads it to report partial progress.
pub async fn run_enveloped<T, F>(
    class: OperationClass,
    correlation_id: &str,
    timeout: Duration,
    shared_state: Arc<Mutex<ExecutionState>>,
    operation: F,
) -> Result<T, ServiceError>
where
    T: Serialize,
    F: Future<Output = Result<T, ServiceError>>,
{
    let started = std::time::Instant::now();

    match tokio::time::timeout(timeout, operation).await {
        Ok(Ok(value)) => {
            let serialized = match serde_json::to_value(&value) {
                Ok(serialized) => serialized,
                Err(err) => {
                    warn!(correlation_id, error = %err, "response serialization failed");
                    return Err(ServiceError::internal(
                        correlation_id,
                        started.elapsed().as_secs_f64(),
                    ));
                }
            };
            if let Some(violation) = safety::find_violation(&serialized) {
                warn!(
                    correlation_id,
                    violation = %violation,
                    "unmaterialized value in response, substituting fallback"
                );
                return Err(ServiceError::internal(
                    correlation_id,
                    started.elapsed().as_secs_f64(),
                ));
            }
            Ok(value)
        }
        Ok(Err(err)) => Err(err),
        Err(_) => {
            let elapsed = started.elapsed().as_secs_f64();
            let partial = partial_snapshot(&shared_state).await;
            warn!(
                correlation_id,
                class = class.as_str(),
                elapsed,
                "operation deadline exceeded"
            );
            Err(ServiceError::deadline(
                class.as_str(),
                elapsed,
                correlation_id,
                partial,
            ))
        }
    }
}

/// Capture whatever the run recorded before the deadline fired
async fn partial_snapshot(shared_state: &Arc<Mutex<ExecutionState>>) -> Option<Value> {
    let state = shared_state.lock().await;
    Some(json!({
        "execution_path": state.execution_path,
        "cost": state.total_cost(),
        "errors": state.errors,
        "warnings": state.warnings,
    }))
}
