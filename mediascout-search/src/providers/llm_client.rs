//! LLM chat client and query generation adapter
//!
//! Speaks the OpenAI-compatible chat completions protocol. The shared
//! [`ChatClient`] handles transport, rate limiting, and health recording;
//! [`LlmQueryGenerator`] builds prompts, parses the model's output into
//! candidate queries, and scores them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use async_trait::async_trait;
use mediascout_common::config::ProvidersConfig;

use super::{
    HealthTracker, Provider, ProviderError, QueryCriteria, QueryGeneration, RateLimiter,
    ServiceHealth,
};
use crate::models::{GeneratedQuery, QueryScores};
use crate::similarity::{similarity, SimilarityMethod};

const USER_AGENT: &str = "MediaScout/0.1.0 (https://github.com/mediascout/mediascout)";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Shared OpenAI-compatible chat transport
///
/// Used by both query generation and contact extraction so they share a
/// connection pool, rate limiter, and credentials.
pub struct ChatClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl ChatClient {
    pub fn new(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(config.min_request_interval_ms)),
            endpoint: config.llm_endpoint.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a system + user prompt pair, returning the model's text reply
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        self.rate_limiter.wait().await;

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.7,
        };

        let mut builder = self.http_client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(endpoint = %self.endpoint, model = %self.model, "Sending chat completion request");

        let response = builder.send().await.map_err(|e| {
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

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Parse("response contained no choices".to_string()))
    }
}

/// Query generation adapter backed by the chat client
pub struct LlmQueryGenerator {
    chat: Arc<ChatClient>,
    health: HealthTracker,
}

impl LlmQueryGenerator {
    pub fn new(chat: Arc<ChatClient>) -> Self {
        Self {
            chat,
            health: HealthTracker::new("query_generator"),
        }
    }

    fn build_prompt(seed: &str, criteria: &QueryCriteria, count: usize) -> String {
        let mut prompt = format!(
            "Generate {} distinct web search queries to find media contacts \
             (journalists, reporters, editors) matching this request:\n\n{}\n",
            count, seed
        );
        let terms = criteria.terms();
        if !terms.is_empty() {
            prompt.push_str("\nConstraints: ");
            prompt.push_str(&terms.join(", "));
            prompt.push('\n');
        }
        prompt.push_str("\nReturn one query per line, no numbering, no commentary.");
        prompt
    }

    /// Score a generated query against its seed, siblings, and criteria.
    ///
    /// Relevance is similarity to the seed, diversity is distance from the
    /// closest earlier sibling, coverage is the fraction of criteria terms
    /// the query mentions.
    fn score(text: &str, seed: &str, earlier: &[String], criteria_terms: &[&str]) -> QueryScores {
        let relevance = similarity(text, seed, SimilarityMethod::Semantic);

        let diversity = if earlier.is_empty() {
            1.0
        } else {
            let closest = earlier
                .iter()
                .map(|e| similarity(text, e, SimilarityMethod::Hybrid))
                .fold(0.0_f64, f64::max);
            1.0 - closest
        };

        let coverage = if criteria_terms.is_empty() {
            1.0
        } else {
            let lower = text.to_lowercase();
            let mentioned = criteria_terms
                .iter()
                .filter(|t| lower.contains(&t.to_lowercase()))
                .count();
            mentioned as f64 / criteria_terms.len() as f64
        };

        QueryScores::new(relevance, diversity, coverage)
    }
}

#[async_trait]
impl QueryGeneration for LlmQueryGenerator {
    async fn generate_queries(
        &self,
        search_id: Uuid,
        seed: &str,
        criteria: &QueryCriteria,
        count: usize,
    ) -> Result<Vec<GeneratedQuery>, ProviderError> {
        let system = "You are a search strategist for a media contacts directory. \
                      You produce precise, varied web search queries.";
        let prompt = Self::build_prompt(seed, criteria, count);

        let start = Instant::now();
        let reply = match self.chat.complete(system, &prompt).await {
            Ok(reply) => {
                self.health.record_success(start.elapsed().as_millis() as u64);
                reply
            }
            Err(e) => {
                self.health.record_failure(start.elapsed().as_millis() as u64);
                return Err(e);
            }
        };

        let criteria_terms = criteria.terms();
        let mut queries = Vec::new();
        let mut earlier: Vec<String> = Vec::new();

        for line in reply.lines() {
            let text = line.trim().trim_start_matches(['-', '*', ' ']).trim();
            if text.is_empty() {
                continue;
            }
            let scores = Self::score(text, seed, &earlier, &criteria_terms);
            earlier.push(text.to_string());
            queries.push(GeneratedQuery::new(
                search_id,
                text.to_string(),
                seed.to_string(),
                scores,
                self.chat.model().to_string(),
            ));
            if queries.len() == count {
                break;
            }
        }

        if queries.is_empty() {
            return Err(ProviderError::Parse(
                "model reply contained no usable queries".to_string(),
            ));
        }

        tracing::info!(
            search_id = %search_id,
            generated = queries.len(),
            "Generated candidate queries"
        );
        Ok(queries)
    }
}

impl Provider for LlmQueryGenerator {
    fn name(&self) -> &str {
        "query_generator"
    }

    fn health(&self) -> ServiceHealth {
        self.health.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_seed_and_criteria() {
        let criteria = QueryCriteria {
            countries: vec!["Germany".to_string()],
            beats: vec!["technology".to_string()],
            ..Default::default()
        };
        let prompt = LlmQueryGenerator::build_prompt("AI reporters", &criteria, 5);
        assert!(prompt.contains("AI reporters"));
        assert!(prompt.contains("Germany"));
        assert!(prompt.contains("technology"));
    }

    #[test]
    fn first_query_gets_full_diversity() {
        let scores = LlmQueryGenerator::score("AI reporters in Berlin", "AI reporters", &[], &[]);
        assert_eq!(scores.diversity, 1.0);
        assert_eq!(scores.coverage, 1.0);
        assert!(scores.relevance > 0.0);
    }

    #[test]
    fn near_duplicate_sibling_lowers_diversity() {
        let earlier = vec!["AI reporters in Berlin".to_string()];
        let dup = LlmQueryGenerator::score("ai reporters in berlin", "AI reporters", &earlier, &[]);
        let fresh =
            LlmQueryGenerator::score("fintech columnists in London", "AI reporters", &earlier, &[]);
        assert!(dup.diversity < fresh.diversity);
    }

    #[test]
    fn coverage_counts_mentioned_terms() {
        let terms = ["Germany", "technology"];
        let scores =
            LlmQueryGenerator::score("technology reporters in Germany", "reporters", &[], &terms);
        assert_eq!(scores.coverage, 1.0);

        let partial = LlmQueryGenerator::score("technology reporters", "reporters", &[], &terms);
        assert_eq!(partial.coverage, 0.5);
    }
}
