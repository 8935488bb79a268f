//! Web search adapter
//!
//! Queries a SerpAPI-compatible search endpoint and maps organic results
//! into [`SearchResultItem`]s.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mediascout_common::config::ProvidersConfig;

use super::{
    HealthTracker, Provider, ProviderError, RateLimiter, SearchResultItem, ServiceHealth,
    WebSearch,
};

const USER_AGENT: &str = "MediaScout/0.1.0 (https://github.com/mediascout/mediascout)";

#[derive(Debug, Deserialize)]
struct SearchApiResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    position: u32,
}

/// Web search API client
pub struct WebSearchClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    endpoint: String,
    api_key: Option<String>,
    health: HealthTracker,
}

impl WebSearchClient {
    pub fn new(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(config.min_request_interval_ms)),
            endpoint: config.search_endpoint.clone(),
            api_key: config.search_api_key.clone(),
            health: HealthTracker::new("web_search"),
        })
    }

    async fn request(&self, query: &str) -> Result<Vec<SearchResultItem>, ProviderError> {
        self.rate_limiter.wait().await;

        let mut params = vec![("q", query.to_string()), ("engine", "google".to_string())];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        tracing::debug!(query = %query, "Querying web search API");

        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(ProviderError::Auth(format!("status {}", status.as_u16())));
        }
        if status == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), error_text));
        }

        let parsed: SearchApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parsed
            .organic_results
            .into_iter()
            .map(|r| SearchResultItem {
                url: r.link,
                title: r.title,
                snippet: r.snippet,
                rank: r.position,
            })
            .collect())
    }
}

#[async_trait]
impl WebSearch for WebSearchClient {
    async fn search_web(&self, query: &str) -> Result<Vec<SearchResultItem>, ProviderError> {
        if query.trim().is_empty() {
            return Err(ProviderError::InvalidInput("empty query".to_string()));
        }

        let start = Instant::now();
        match self.request(query).await {
            Ok(results) => {
                self.health.record_success(start.elapsed().as_millis() as u64);
                tracing::info!(query = %query, results = results.len(), "Web search completed");
                Ok(results)
            }
            Err(e) => {
                self.health.record_failure(start.elapsed().as_millis() as u64);
                Err(e)
            }
        }
    }
}

impl Provider for WebSearchClient {
    fn name(&self) -> &str {
        "web_search"
    }

    fn health(&self) -> ServiceHealth {
        self.health.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = WebSearchClient::new(&ProvidersConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn empty_query_rejected_without_network() {
        let client = WebSearchClient::new(&ProvidersConfig::default()).unwrap();
        let err = client.search_web("   ").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInput(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn response_parsing_tolerates_missing_fields() {
        let json = r#"{"organic_results": [{"link": "https://example.com"}]}"#;
        let parsed: SearchApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.organic_results.len(), 1);
        assert_eq!(parsed.organic_results[0].title, "");
    }
}
