//! Time budgets for top-level operations
//!
//! Every inbound operation runs against a single [`TimeBudget`] created at
//! run start and threaded through the graph engine, the scheduler and the
//! backend calls, so all suspension points measure against the same clock.
//! The operation-class table assigns the budget; the adaptive path widens it
//! for queries that look expensive before any work starts.

use std::time::Duration;
use tokio::time::Instant;

/// A run's time budget
///
/// Tracks elapsed time from construction against a fixed limit. Consumers
/// ask for [`remaining`](Self::remaining) before each suspension point and
/// treat `None` as the deadline having passed.
#[derive(Debug, Clone)]
pub struct TimeBudget {
    started: Instant,
    limit: Duration,
}

impl TimeBudget {
    /// Start the clock on a budget of `limit`
    pub fn new(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    /// Time left before the budget is spent, or None once it is
    pub fn remaining(&self) -> Option<Duration> {
        self.limit.checked_sub(self.started.elapsed())
    }

    /// Whether the budget has run out
    pub fn is_spent(&self) -> bool {
        self.remaining().is_none()
    }

    /// Time consumed so far, capped at the limit
    pub fn spent(&self) -> Duration {
        self.started.elapsed().min(self.limit)
    }

    /// The full budget this was created with
    pub fn limit(&self) -> Duration {
        self.limit
    }
}

/// Operation classes with distinct time budgets
///
/// The caller picks the class from the operation kind; the envelope enforces
/// the resulting deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// Simple chat or lookup
    Simple,
    /// Standard operations
    Standard,
    /// Complex analysis
    Complex,
    /// Research workflows
    Research,
    /// Streaming responses
    Streaming,
}

impl OperationClass {
    /// Base timeout for this class
    pub fn base_timeout(&self) -> Duration {
        match self {
            OperationClass::Simple => Duration::from_secs(15),
            OperationClass::Standard => Duration::from_secs(30),
            OperationClass::Complex => Duration::from_secs(60),
            OperationClass::Research => Duration::from_secs(120),
            OperationClass::Streaming => Duration::from_secs(45),
        }
    }

    /// Stable name for logging and error payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::Simple => "simple",
            OperationClass::Standard => "standard",
            OperationClass::Complex => "complex",
            OperationClass::Research => "research",
            OperationClass::Streaming => "streaming",
        }
    }
}

const HEAVY_QUERY_MARKERS: [&str; 4] = ["research", "analyze", "comprehensive", "detailed"];

/// Compute an adaptive timeout for a query under the given operation class
///
/// Heuristic only: queries over 50 words or containing a heavy-work marker
/// get 3x the class budget, 20-50 words get 2x. Never shrinks the budget.
pub fn adaptive_timeout(class: OperationClass, query: &str) -> Duration {
    let base = class.base_timeout();
    let words = query.split_whitespace().count();
    let lower = query.to_lowercase();

    if words > 50 || HEAVY_QUERY_MARKERS.iter().any(|m| lower.contains(m)) {
        base * 3
    } else if words >= 20 {
        base * 2
    } else {
        base
    }
}
