//! External search provider interface
//!
//! The concrete HTTP providers (web search, scraping) live at the edge; the
//! core depends only on this narrow trait. Provider failures are isolated
//! per call and never fail a graph run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Errors a provider call can produce
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider is not configured (missing API key, disabled)
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Provider is configured but unreachable or erroring
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The call itself failed
    #[error("Provider request failed: {0}")]
    Request(String),
}

/// One search result, optionally enriched with scraped page content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(default)]
    pub content: Option<String>,
    pub score: f64,
}

impl SearchHit {
    pub fn new(title: impl Into<String>, url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            content: None,
            score: 0.5,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }
}

/// External search collaborator
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError>;

    async fn scrape(&self, url: &str) -> Result<String, ProviderError>;
}

/// Stand-in for a provider with no credentials configured
///
/// Every call fails with `NotConfigured`, which the graphs treat as
/// zero results rather than a run failure.
#[derive(Debug, Default)]
pub struct UnavailableProvider;

#[async_trait]
impl SearchProvider for UnavailableProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn search(
        &self,
        _query: &str,
        _max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        Err(ProviderError::NotConfigured("no search provider".into()))
    }

    async fn scrape(&self, _url: &str) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured("no scrape provider".into()))
    }
}

/// Fixture provider serving canned results
///
/// Used by tests and local development; counts calls so callers can assert
/// on provider traffic.
#[derive(Debug, Default)]
pub struct StaticProvider {
    hits: Vec<SearchHit>,
    page_text: String,
    fail_scrape: bool,
    search_calls: AtomicUsize,
    scrape_calls: AtomicUsize,
}

impl StaticProvider {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            page_text: "Full page content for enhancement.".to_string(),
            ..Self::default()
        }
    }

    pub fn with_page_text(mut self, text: impl Into<String>) -> Self {
        self.page_text = text.into();
        self
    }

    pub fn failing_scrape(mut self) -> Self {
        self.fail_scrape = true;
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn scrape_calls(&self) -> usize {
        self.scrape_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(
        &self,
        _query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }

    async fn scrape(&self, url: &str) -> Result<String, ProviderError> {
        self.scrape_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_scrape {
            Err(ProviderError::Request(format!("scrape failed for {}", url)))
        } else {
            Ok(self.page_text.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_provider_fails_every_call() {
        let provider = UnavailableProvider;
        assert!(provider.search("q", 5).await.is_err());
        assert!(provider.scrape("http://x").await.is_err());
    }

    #[tokio::test]
    async fn test_static_provider_serves_and_counts() {
        let provider = StaticProvider::with_hits(vec![
            SearchHit::new("One", "http://a", "first"),
            SearchHit::new("Two", "http://b", "second"),
            SearchHit::new("Three", "http://c", "third"),
        ]);

        let hits = provider.search("anything", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(provider.search_calls(), 1);

        let text = provider.scrape("http://a").await.unwrap();
        assert!(!text.is_empty());
        assert_eq!(provider.scrape_calls(), 1);
    }

    #[tokio::test]
    async fn test_static_provider_failing_scrape() {
        let provider =
            StaticProvider::with_hits(vec![SearchHit::new("One", "http://a", "s")]).failing_scrape();
        assert!(provider.scrape("http://a").await.is_err());
        assert_eq!(provider.scrape_calls(), 1);
    }

    #[test]
    fn test_search_hit_roundtrips_through_json() {
        let hit = SearchHit::new("Title", "http://u", "snippet").with_score(0.9);
        let value = serde_json::to_value(&hit).unwrap();
        let back: SearchHit = serde_json::from_value(value).unwrap();
        assert_eq!(back.title, "Title");
        assert_eq!(back.score, 0.9);
        assert!(back.content.is_none());
    }
}
