//! Provider adapters
//!
//! Uniform capability interfaces over the external AI and search services the
//! pipeline depends on: query generation (LLM), web search, content scraping,
//! and contact extraction. Each adapter reports health and distinguishes
//! transient failures (network, timeout, rate limit) from permanent ones
//! (bad input, auth).

pub mod extractor;
pub mod health;
pub mod llm_client;
pub mod scraper_client;
pub mod web_search_client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{ExtractedContact, GeneratedQuery};
pub use health::{aggregate_health, HealthLevel, HealthTracker, ServiceHealth};

/// Provider adapter errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Transient errors may succeed on retry; permanent ones will not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_) | ProviderError::Timeout | ProviderError::RateLimited
        )
    }
}

/// Structured criteria passed to query generation
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryCriteria {
    pub countries: Vec<String>,
    pub categories: Vec<String>,
    pub beats: Vec<String>,
    pub languages: Vec<String>,
    pub topics: Vec<String>,
}

impl QueryCriteria {
    /// All criteria terms flattened, for prompt building and coverage scoring
    pub fn terms(&self) -> Vec<&str> {
        self.countries
            .iter()
            .chain(&self.categories)
            .chain(&self.beats)
            .chain(&self.languages)
            .chain(&self.topics)
            .map(String::as_str)
            .collect()
    }
}

/// A single web search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub rank: u32,
}

/// Raw page content returned by the scraper
#[derive(Debug, Clone)]
pub struct PageContent {
    pub url: String,
    pub title: Option<String>,
    pub content: String,
}

/// Options for contact extraction
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Seed query, used to judge relevance
    pub seed_query: String,
    /// Minimum confidence to keep a contact
    pub confidence_threshold: f64,
    /// Hard cap on extracted contacts
    pub max_contacts: u32,
}

/// Common surface all adapters expose
pub trait Provider: Send + Sync {
    /// Short adapter name used in health reports and logs
    fn name(&self) -> &str;

    /// Current health derived from recent request outcomes
    fn health(&self) -> ServiceHealth;
}

/// Query generation capability (LLM-backed)
#[async_trait]
pub trait QueryGeneration: Provider {
    async fn generate_queries(
        &self,
        search_id: uuid::Uuid,
        seed: &str,
        criteria: &QueryCriteria,
        count: usize,
    ) -> Result<Vec<GeneratedQuery>, ProviderError>;
}

/// Web search capability
#[async_trait]
pub trait WebSearch: Provider {
    async fn search_web(&self, query: &str) -> Result<Vec<SearchResultItem>, ProviderError>;
}

/// Content scraping capability
#[async_trait]
pub trait ContentScraping: Provider {
    async fn scrape_content(&self, url: &str) -> Result<PageContent, ProviderError>;
}

/// Contact extraction capability (LLM-backed)
#[async_trait]
pub trait ContactExtraction: Provider {
    async fn extract_contacts(
        &self,
        search_id: uuid::Uuid,
        pages: &[PageContent],
        options: &ExtractionOptions,
    ) -> Result<Vec<ExtractedContact>, ProviderError>;
}

/// The full set of adapters the orchestrator runs against
///
/// Constructed once per process and injected into the orchestrator; there is
/// no global provider state.
#[derive(Clone)]
pub struct ProviderSet {
    pub query_generator: Arc<dyn QueryGeneration>,
    pub web_search: Arc<dyn WebSearch>,
    pub scraper: Arc<dyn ContentScraping>,
    pub extractor: Arc<dyn ContactExtraction>,
}

impl ProviderSet {
    /// Health of every adapter, in a stable order
    pub fn health_statuses(&self) -> Vec<ServiceHealth> {
        vec![
            self.query_generator.health(),
            self.web_search.health(),
            self.scraper.health(),
            self.extractor.health(),
        ]
    }

    /// Worst-case aggregate across all adapters
    pub fn overall_health(&self) -> HealthLevel {
        aggregate_health(&self.health_statuses())
    }
}

/// Minimum-interval rate limiter shared by the HTTP adapters
pub(crate) struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub(crate) fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the minimum interval
    pub(crate) async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::RateLimited.is_transient());
        assert!(ProviderError::Network("reset".to_string()).is_transient());
        assert!(!ProviderError::Auth("bad key".to_string()).is_transient());
        assert!(!ProviderError::InvalidInput("empty".to_string()).is_transient());
    }

    #[tokio::test]
    async fn rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(100);

        let start = Instant::now();
        limiter.wait().await;
        let first = start.elapsed();
        limiter.wait().await;
        let second = start.elapsed();

        assert!(first < Duration::from_millis(50));
        assert!(second >= Duration::from_millis(90));
    }

    #[test]
    fn criteria_terms_flatten_all_fields() {
        let criteria = QueryCriteria {
            countries: vec!["Germany".to_string()],
            beats: vec!["technology".to_string()],
            topics: vec!["AI".to_string()],
            ..Default::default()
        };
        let terms = criteria.terms();
        assert_eq!(terms, vec!["Germany", "technology", "AI"]);
    }
}
