//! Analytics sink interface
//!
//! Fire-and-forget: `record` must never block or fail the request path.
//! Persistent storage is an external collaborator; the core ships a no-op
//! sink and a tracing-backed one.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One recorded event
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsEvent {
    pub kind: String,
    pub request_id: String,
    pub correlation_id: String,
    pub success: bool,
    pub cost: f64,
    pub execution_time: f64,
    pub timestamp: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn new(
        kind: impl Into<String>,
        request_id: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            request_id: request_id.into(),
            correlation_id: correlation_id.into(),
            success: false,
            cost: 0.0,
            execution_time: 0.0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_outcome(mut self, success: bool, cost: f64, execution_time: f64) -> Self {
        self.success = success;
        self.cost = cost;
        self.execution_time = execution_time;
        self
    }
}

/// Analytics collaborator
pub trait AnalyticsSink: Send + Sync {
    /// Record an event; must return promptly and never error
    fn record(&self, event: AnalyticsEvent);
}

/// Sink that drops everything
#[derive(Debug, Default)]
pub struct NoopSink;

impl AnalyticsSink for NoopSink {
    fn record(&self, _event: AnalyticsEvent) {}
}

/// Sink that logs events through tracing
#[derive(Debug, Default)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn record(&self, event: AnalyticsEvent) {
        tracing::info!(
            kind = %event.kind,
            request_id = %event.request_id,
            success = event.success,
            cost = event.cost,
            execution_time = event.execution_time,
            "analytics event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = AnalyticsEvent::new("chat", "req-1", "corr-1").with_outcome(true, 0.42, 1.5);
        assert_eq!(event.kind, "chat");
        assert!(event.success);
        assert_eq!(event.cost, 0.42);
    }

    #[test]
    fn test_sinks_accept_events() {
        let event = AnalyticsEvent::new("search", "req-2", "corr-2");
        NoopSink.record(event.clone());
        TracingSink.record(event);
    }
}
