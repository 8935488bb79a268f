//! Contact extraction adapter
//!
//! Sends scraped page text to the LLM and parses its JSON reply into
//! [`ExtractedContact`]s. Contacts below the configured confidence threshold
//! are dropped here so downstream stages only see viable candidates.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::llm_client::ChatClient;
use super::{
    ContactExtraction, ExtractionOptions, HealthTracker, PageContent, Provider, ProviderError,
    ServiceHealth,
};
use crate::models::{ExtractedContact, VerificationStatus};

/// Cap on page text included per extraction request, characters
const MAX_PROMPT_CHARS_PER_PAGE: usize = 6_000;

/// Shape the model is asked to reply with
#[derive(Debug, Deserialize)]
struct RawContact {
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    outlet: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    profile_url: Option<String>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    relevance: f64,
}

/// LLM-backed contact extractor
pub struct LlmContactExtractor {
    chat: Arc<ChatClient>,
    health: HealthTracker,
}

impl LlmContactExtractor {
    pub fn new(chat: Arc<ChatClient>) -> Self {
        Self {
            chat,
            health: HealthTracker::new("extractor"),
        }
    }

    fn build_prompt(pages: &[PageContent], options: &ExtractionOptions) -> String {
        let mut prompt = format!(
            "Extract media contacts (journalists, reporters, editors) relevant to \
             \"{}\" from the page text below. Reply with a JSON array; each element: \
             {{\"name\", \"title\", \"outlet\", \"email\", \"profile_url\", \
             \"confidence\", \"relevance\"}} with confidence and relevance in [0,1]. \
             Reply with [] if none are present.\n",
            options.seed_query
        );
        for page in pages {
            let excerpt: String = page.content.chars().take(MAX_PROMPT_CHARS_PER_PAGE).collect();
            prompt.push_str(&format!("\n--- {} ---\n{}\n", page.url, excerpt));
        }
        prompt
    }

    /// Fraction of optional contact fields that are populated
    fn quality(raw: &RawContact) -> f64 {
        let fields = [
            raw.title.is_some(),
            raw.outlet.is_some(),
            raw.email.is_some(),
            raw.profile_url.is_some(),
        ];
        fields.iter().filter(|f| **f).count() as f64 / fields.len() as f64
    }

    /// Parse the model reply, tolerating surrounding prose or code fences
    fn parse_reply(reply: &str) -> Result<Vec<RawContact>, ProviderError> {
        let start = reply.find('[');
        let end = reply.rfind(']');
        let json = match (start, end) {
            (Some(s), Some(e)) if s < e => &reply[s..=e],
            _ => {
                return Err(ProviderError::Parse(
                    "reply contained no JSON array".to_string(),
                ))
            }
        };
        serde_json::from_str(json).map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ContactExtraction for LlmContactExtractor {
    async fn extract_contacts(
        &self,
        search_id: Uuid,
        pages: &[PageContent],
        options: &ExtractionOptions,
    ) -> Result<Vec<ExtractedContact>, ProviderError> {
        if pages.is_empty() {
            return Ok(Vec::new());
        }

        let system = "You extract structured media-contact records from web page text. \
                      You reply only with JSON.";
        let prompt = Self::build_prompt(pages, options);

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

        let raw_contacts = Self::parse_reply(&reply)?;
        let source_url = pages[0].url.clone();

        let mut contacts: Vec<ExtractedContact> = raw_contacts
            .into_iter()
            .filter(|raw| !raw.name.trim().is_empty())
            .filter(|raw| raw.confidence >= options.confidence_threshold)
            .map(|raw| {
                let quality = Self::quality(&raw);
                ExtractedContact {
                    id: Uuid::new_v4(),
                    search_id,
                    name: raw.name,
                    title: raw.title,
                    outlet: raw.outlet,
                    email: raw.email,
                    profile_url: raw.profile_url,
                    confidence: raw.confidence.clamp(0.0, 1.0),
                    relevance: raw.relevance.clamp(0.0, 1.0),
                    quality,
                    verification: VerificationStatus::Unverified,
                    source_url: source_url.clone(),
                    extraction_method: self.chat.model().to_string(),
                    extracted_at: Utc::now(),
                }
            })
            .collect();

        contacts.truncate(options.max_contacts as usize);

        tracing::info!(
            search_id = %search_id,
            pages = pages.len(),
            contacts = contacts.len(),
            "Extracted contacts"
        );
        Ok(contacts)
    }
}

impl Provider for LlmContactExtractor {
    fn name(&self) -> &str {
        "extractor"
    }

    fn health(&self) -> ServiceHealth {
        self.health.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reply_tolerates_code_fences() {
        let reply = "Here are the contacts:\n```json\n[{\"name\": \"Jane Doe\", \
                     \"confidence\": 0.9, \"relevance\": 0.8}]\n```";
        let contacts = LlmContactExtractor::parse_reply(reply).unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].name, "Jane Doe");
    }

    #[test]
    fn parse_reply_rejects_non_json() {
        assert!(LlmContactExtractor::parse_reply("no contacts found, sorry").is_err());
    }

    #[test]
    fn empty_array_parses() {
        assert!(LlmContactExtractor::parse_reply("[]").unwrap().is_empty());
    }

    #[test]
    fn quality_reflects_field_completeness() {
        let full = RawContact {
            name: "Jane".to_string(),
            title: Some("Editor".to_string()),
            outlet: Some("Daily".to_string()),
            email: Some("jane@daily.example".to_string()),
            profile_url: Some("https://daily.example/jane".to_string()),
            confidence: 0.9,
            relevance: 0.9,
        };
        assert_eq!(LlmContactExtractor::quality(&full), 1.0);

        let sparse = RawContact {
            name: "John".to_string(),
            title: None,
            outlet: None,
            email: Some("john@daily.example".to_string()),
            profile_url: None,
            confidence: 0.9,
            relevance: 0.9,
        };
        assert_eq!(LlmContactExtractor::quality(&sparse), 0.25);
    }
}
