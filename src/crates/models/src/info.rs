//! Per-model performance records

use crate::types::{ModelResult, ModelStatus, ModelTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Smoothing factor for response-time and throughput averages
const EWMA_ALPHA: f64 = 0.1;

/// Success rate window size
const SUCCESS_WINDOW: usize = 20;

/// Confidence history cap
const CONFIDENCE_CAP: usize = 100;

/// Performance record for one model
///
/// Response time and throughput use an exponential moving average so recent
/// behavior dominates without letting a single outlier swing the estimate.
/// The success rate looks at most [`SUCCESS_WINDOW`] observations back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub status: ModelStatus,
    pub tier: ModelTier,
    pub last_used: DateTime<Utc>,
    pub total_requests: u64,
    pub avg_response_time: f64,
    pub avg_tokens_per_second: f64,
    recent_outcomes: VecDeque<bool>,
    confidence_scores: VecDeque<f64>,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>, tier: ModelTier) -> Self {
        Self {
            name: name.into(),
            status: ModelStatus::Unknown,
            tier,
            last_used: Utc::now(),
            total_requests: 0,
            avg_response_time: 0.0,
            avg_tokens_per_second: 0.0,
            recent_outcomes: VecDeque::new(),
            confidence_scores: VecDeque::new(),
        }
    }

    pub fn with_status(mut self, status: ModelStatus) -> Self {
        self.status = status;
        self
    }

    /// Rolling success rate over the last [`SUCCESS_WINDOW`] calls
    ///
    /// Optimistic before any observation: a fresh model reports 1.0.
    pub fn success_rate(&self) -> f64 {
        if self.recent_outcomes.is_empty() {
            return 1.0;
        }
        let successes = self.recent_outcomes.iter().filter(|s| **s).count();
        successes as f64 / self.recent_outcomes.len() as f64
    }

    /// Fold one generation outcome into the record
    pub fn update_stats(&mut self, result: &ModelResult, confidence: f64) {
        self.total_requests += 1;
        self.last_used = Utc::now();

        if result.success {
            self.avg_response_time = ewma(self.avg_response_time, result.execution_time);
            if result.tokens_per_second > 0.0 {
                self.avg_tokens_per_second =
                    ewma(self.avg_tokens_per_second, result.tokens_per_second);
            }
            if confidence > 0.0 {
                self.confidence_scores.push_back(confidence.clamp(0.0, 1.0));
                while self.confidence_scores.len() > CONFIDENCE_CAP {
                    self.confidence_scores.pop_front();
                }
            }
        }

        self.recent_outcomes.push_back(result.success);
        while self.recent_outcomes.len() > SUCCESS_WINDOW {
            self.recent_outcomes.pop_front();
        }
    }

    /// Record a confidence observation on its own
    pub fn record_confidence(&mut self, confidence: f64) {
        self.confidence_scores.push_back(confidence.clamp(0.0, 1.0));
        while self.confidence_scores.len() > CONFIDENCE_CAP {
            self.confidence_scores.pop_front();
        }
    }

    /// Mean of the retained confidence observations
    pub fn avg_confidence(&self) -> f64 {
        if self.confidence_scores.is_empty() {
            return 0.0;
        }
        self.confidence_scores.iter().sum::<f64>() / self.confidence_scores.len() as f64
    }

    /// Composite selection score
    ///
    /// Strictly increasing in success rate, decreasing in response time and
    /// decreasing in idle time, so a model that has not been used recently is
    /// deprioritized but never starved.
    pub fn selection_score(&self, now: DateTime<Utc>) -> f64 {
        let idle_secs = (now - self.last_used).num_milliseconds().max(0) as f64 / 1000.0;
        self.success_rate() * 0.4
            + (1.0 / (self.avg_response_time + 1.0)) * 0.3
            + (1.0 / (idle_secs + 1.0)) * 0.3
    }
}

fn ewma(current: f64, observation: f64) -> f64 {
    if current == 0.0 {
        observation
    } else {
        EWMA_ALPHA * observation + (1.0 - EWMA_ALPHA) * current
    }
}
