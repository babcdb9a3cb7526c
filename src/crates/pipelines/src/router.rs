//! Budget-aware search routing
//!
//! A pure function over `(query, budget, quality)`: analysis looks only at
//! the query text, the strategy decision only at the analysis and the
//! configured cost table. No I/O happens here; the graphs act on the
//! returned [`SearchStrategy`].

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use taskgraph_core::QualityLevel;

const EPSILON: f64 = 1e-9;

const COMPLEX_MARKERS: [&str; 5] = ["analyze", "compare", "research", "comprehensive", "detailed"];
const FRESH_MARKERS: [&str; 5] = ["recent", "latest", "current", "today", "news"];

/// Per-call provider costs, from configuration
#[derive(Debug, Clone)]
pub struct CostTable {
    pub primary_search: f64,
    pub enhancement_fetch: f64,
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            primary_search: 0.42,
            enhancement_fetch: 0.84,
        }
    }
}

/// Broad shape of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Instructional,
    Definitional,
    Comparative,
    General,
}

/// What the router learned from the query text alone
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnalysis {
    pub complexity: f64,
    pub requires_fresh_content: bool,
    pub kind: QueryKind,
}

/// The routing decision for one search request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStrategy {
    pub use_primary_search: bool,
    pub use_content_enhancement: bool,
    pub max_enhancement_fetches: usize,
    pub estimated_cost: f64,
    pub rationale: String,
    /// Take the direct no-external-call path
    pub skip_external: bool,
}

/// Query analysis and strategy selection
#[derive(Debug, Clone, Default)]
pub struct SmartRouter {
    costs: CostTable,
}

impl SmartRouter {
    pub fn new(costs: CostTable) -> Self {
        Self { costs }
    }

    pub fn costs(&self) -> &CostTable {
        &self.costs
    }

    /// Analyze query characteristics
    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        let lower = query.to_lowercase();

        let complexity = if COMPLEX_MARKERS.iter().any(|m| lower.contains(m)) {
            0.8
        } else {
            0.5
        };

        let this_year = Utc::now().year();
        let requires_fresh_content = FRESH_MARKERS.iter().any(|m| lower.contains(m))
            || lower.contains(&this_year.to_string())
            || lower.contains(&(this_year + 1).to_string());

        let kind = if ["how to", "tutorial", "guide"].iter().any(|m| lower.contains(m)) {
            QueryKind::Instructional
        } else if ["what is", "define", "meaning"].iter().any(|m| lower.contains(m)) {
            QueryKind::Definitional
        } else if ["compare", " vs ", "difference"].iter().any(|m| lower.contains(m)) {
            QueryKind::Comparative
        } else {
            QueryKind::General
        };

        QueryAnalysis {
            complexity,
            requires_fresh_content,
            kind,
        }
    }

    /// Decide the strategy for a query under a budget
    ///
    /// Precedence: an insufficient budget always wins and takes the direct
    /// path; premium quality buys full enhancement; a complex query buys
    /// partial enhancement; everything else is primary search only.
    pub fn decide(&self, query: &str, budget: f64, quality: QualityLevel) -> SearchStrategy {
        let analysis = self.analyze(query);
        let primary = self.costs.primary_search;
        let enhancement = self.costs.enhancement_fetch;

        if budget + EPSILON < primary {
            return SearchStrategy {
                use_primary_search: false,
                use_content_enhancement: false,
                max_enhancement_fetches: 0,
                estimated_cost: 0.0,
                rationale: "budget-constrained".to_string(),
                skip_external: true,
            };
        }

        if quality == QualityLevel::Premium && budget + EPSILON >= primary + 3.0 * enhancement {
            return SearchStrategy {
                use_primary_search: true,
                use_content_enhancement: true,
                max_enhancement_fetches: 3,
                estimated_cost: primary + 3.0 * enhancement,
                rationale: "premium quality with content enhancement".to_string(),
                skip_external: false,
            };
        }

        if analysis.complexity > 0.7 && budget + EPSILON >= primary + 2.0 * enhancement {
            return SearchStrategy {
                use_primary_search: true,
                use_content_enhancement: true,
                max_enhancement_fetches: 2,
                estimated_cost: primary + 2.0 * enhancement,
                rationale: "complex query requiring enhanced content".to_string(),
                skip_external: false,
            };
        }

        SearchStrategy {
            use_primary_search: true,
            use_content_enhancement: false,
            max_enhancement_fetches: 0,
            estimated_cost: primary,
            rationale: "standard search".to_string(),
            skip_external: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> SmartRouter {
        SmartRouter::default()
    }

    #[test]
    fn test_default_complexity() {
        let analysis = router().analyze("where do penguins live");
        assert_eq!(analysis.complexity, 0.5);
        assert!(!analysis.requires_fresh_content);
        assert_eq!(analysis.kind, QueryKind::General);
    }

    #[test]
    fn test_complex_markers_raise_complexity() {
        for query in [
            "analyze the housing market",
            "compare rust and go",
            "comprehensive overview of solar power",
        ] {
            assert_eq!(router().analyze(query).complexity, 0.8, "{}", query);
        }
    }

    #[test]
    fn test_freshness_detection() {
        assert!(router().analyze("latest AI news").requires_fresh_content);
        assert!(router().analyze("stock prices today").requires_fresh_content);
        let this_year = Utc::now().year().to_string();
        assert!(router()
            .analyze(&format!("elections {}", this_year))
            .requires_fresh_content);
        assert!(!router().analyze("history of rome").requires_fresh_content);
    }

    #[test]
    fn test_query_kind_rules() {
        assert_eq!(
            router().analyze("how to bake bread").kind,
            QueryKind::Instructional
        );
        assert_eq!(
            router().analyze("what is entropy").kind,
            QueryKind::Definitional
        );
        assert_eq!(
            router().analyze("python vs ruby performance").kind,
            QueryKind::Comparative
        );
    }

    #[test]
    fn test_budget_below_primary_takes_direct_path() {
        let strategy = router().decide("latest AI news", 0.001, QualityLevel::Balanced);
        assert!(strategy.skip_external);
        assert!(!strategy.use_primary_search);
        assert_eq!(strategy.estimated_cost, 0.0);
        assert_eq!(strategy.rationale, "budget-constrained");
    }

    #[test]
    fn test_budget_exactly_primary_searches_without_enhancement() {
        let strategy = router().decide("some ordinary query", 0.42, QualityLevel::Balanced);
        assert!(!strategy.skip_external);
        assert!(strategy.use_primary_search);
        assert!(!strategy.use_content_enhancement);
        assert_eq!(strategy.rationale, "standard search");
    }

    #[test]
    fn test_budget_one_unit_below_primary_is_direct() {
        let strategy = router().decide("some ordinary query", 0.41, QualityLevel::Balanced);
        assert!(strategy.skip_external);
    }

    #[test]
    fn test_premium_buys_full_enhancement() {
        let strategy = router().decide("compare react and vue", 5.0, QualityLevel::Premium);
        assert!(strategy.use_content_enhancement);
        assert_eq!(strategy.max_enhancement_fetches, 3);
        assert!((strategy.estimated_cost - (0.42 + 3.0 * 0.84)).abs() < 1e-9);
        assert_eq!(strategy.rationale, "premium quality with content enhancement");
    }

    #[test]
    fn test_premium_without_budget_falls_through() {
        // Enough for primary but not for three fetches
        let strategy = router().decide("plain question", 1.0, QualityLevel::Premium);
        assert!(!strategy.use_content_enhancement);
        assert!(strategy.use_primary_search);
    }

    #[test]
    fn test_complex_query_buys_partial_enhancement() {
        let strategy = router().decide("analyze the rust ecosystem", 3.0, QualityLevel::Balanced);
        assert!(strategy.use_content_enhancement);
        assert_eq!(strategy.max_enhancement_fetches, 2);
        assert_eq!(strategy.rationale, "complex query requiring enhanced content");
    }

    #[test]
    fn test_budget_precedence_beats_premium() {
        let strategy = router().decide("compare react and vue", 0.1, QualityLevel::Premium);
        assert!(strategy.skip_external);
        assert_eq!(strategy.rationale, "budget-constrained");
    }

    #[test]
    fn test_decision_is_pure_and_deterministic() {
        let a = router().decide("analyze this", 3.0, QualityLevel::High);
        let b = router().decide("analyze this", 3.0, QualityLevel::High);
        assert_eq!(a.rationale, b.rationale);
        assert_eq!(a.estimated_cost, b.estimated_cost);
        assert_eq!(a.max_enhancement_fetches, b.max_enhancement_fetches);
    }
}
