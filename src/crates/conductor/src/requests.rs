//! Inbound request schemas and validation
//!
//! Validation happens before any state is created or work dispatched, so a
//! rejected request incurs zero cost.

use orchestrator::Methodology;
use serde::{Deserialize, Serialize};
use taskgraph_core::{ConversationTurn, QualityLevel};

/// Longest accepted query, in characters
pub const MAX_QUERY_CHARS: usize = 8192;

fn validate_query(query: &str) -> Result<(), String> {
    if query.trim().is_empty() {
        return Err("query must not be empty".to_string());
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(format!(
            "query exceeds the maximum length of {} characters",
            MAX_QUERY_CHARS
        ));
    }
    Ok(())
}

fn validate_budget(budget: f64) -> Result<(), String> {
    if !budget.is_finite() || budget < 0.0 {
        return Err("budget must be a non-negative number".to_string());
    }
    Ok(())
}

/// One chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub query: String,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
    #[serde(default)]
    pub quality: QualityLevel,
    /// Cost budget in currency units
    pub max_cost: f64,
    /// Time budget in seconds
    pub max_execution_time: f64,
    #[serde(default)]
    pub response_style: Option<String>,
    /// Include execution internals in the response
    #[serde(default)]
    pub include_debug_info: bool,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            session_id: None,
            query: query.into(),
            conversation_history: Vec::new(),
            quality: QualityLevel::Balanced,
            max_cost: 0.10,
            max_execution_time: 30.0,
            response_style: None,
            include_debug_info: false,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_query(&self.query)?;
        validate_budget(self.max_cost)?;
        if self.max_execution_time <= 0.0 {
            return Err("max_execution_time must be positive".to_string());
        }
        Ok(())
    }
}

/// One search request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub search_kind: Option<String>,
    #[serde(default)]
    pub quality: QualityLevel,
    /// Cost budget in currency units
    pub budget: f64,
    #[serde(default)]
    pub domains: Option<Vec<String>>,
}

fn default_max_results() -> usize {
    10
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, budget: f64) -> Self {
        Self {
            query: query.into(),
            max_results: default_max_results(),
            search_kind: None,
            quality: QualityLevel::Balanced,
            budget,
            domains: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_query(&self.query)?;
        validate_budget(self.budget)?;
        if self.max_results == 0 || self.max_results > 50 {
            return Err("max_results must be between 1 and 50".to_string());
        }
        Ok(())
    }
}

/// One research workflow request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub research_question: String,
    /// One of systematic, exploratory, comparative, meta-analysis
    #[serde(default = "default_methodology")]
    pub methodology: String,
    /// 1 (quick) to 5 (comprehensive)
    #[serde(default = "default_depth")]
    pub depth_level: u8,
    pub cost_budget: f64,
    /// Time budget in seconds
    pub time_budget: f64,
    #[serde(default)]
    pub sources: Vec<String>,
}

fn default_methodology() -> String {
    "exploratory".to_string()
}

fn default_depth() -> u8 {
    3
}

impl ResearchRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            research_question: question.into(),
            methodology: default_methodology(),
            depth_level: default_depth(),
            cost_budget: 1.0,
            time_budget: 120.0,
            sources: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_query(&self.research_question)?;
        validate_budget(self.cost_budget)?;
        if !(1..=5).contains(&self.depth_level) {
            return Err("depth_level must be between 1 and 5".to_string());
        }
        if self.time_budget <= 0.0 {
            return Err("time_budget must be positive".to_string());
        }
        self.parsed_methodology().map(|_| ())
    }

    pub fn parsed_methodology(&self) -> Result<Methodology, String> {
        self.methodology.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query_rejected() {
        let request = ChatRequest::new("   ");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_over_long_query_rejected() {
        let request = ChatRequest::new("x".repeat(MAX_QUERY_CHARS + 1));
        let err = request.validate().unwrap_err();
        assert!(err.contains("maximum length"));
    }

    #[test]
    fn test_valid_chat_request() {
        assert!(ChatRequest::new("Hello").validate().is_ok());
    }

    #[test]
    fn test_negative_budget_rejected() {
        let mut request = SearchRequest::new("q", -1.0);
        assert!(request.validate().is_err());
        request.budget = 0.0;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_max_results_bounds() {
        let mut request = SearchRequest::new("q", 1.0);
        request.max_results = 0;
        assert!(request.validate().is_err());
        request.max_results = 51;
        assert!(request.validate().is_err());
        request.max_results = 10;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_research_depth_bounds() {
        let mut request = ResearchRequest::new("why rust");
        request.depth_level = 0;
        assert!(request.validate().is_err());
        request.depth_level = 6;
        assert!(request.validate().is_err());
        request.depth_level = 5;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_unknown_methodology_rejected() {
        let mut request = ResearchRequest::new("why rust");
        request.methodology = "vibes".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_request_deserialization_defaults() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"query": "hi", "max_cost": 0.1, "max_execution_time": 30}"#)
                .unwrap();
        assert_eq!(request.quality, QualityLevel::Balanced);
        assert!(request.conversation_history.is_empty());
        assert!(!request.include_debug_info);
    }
}
