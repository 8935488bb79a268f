//! Content scraping adapter
//!
//! Fetches a page and reduces its HTML to plain text suitable for contact
//! extraction. Script and style blocks are dropped; remaining tags are
//! stripped and whitespace collapsed.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mediascout_common::config::ProvidersConfig;

use super::{
    ContentScraping, HealthTracker, PageContent, Provider, ProviderError, RateLimiter,
    ServiceHealth,
};

const USER_AGENT: &str = "MediaScout/0.1.0 (https://github.com/mediascout/mediascout)";

/// Cap on retained text per page, characters
const MAX_CONTENT_CHARS: usize = 20_000;

/// Page scraping client
pub struct ScraperClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    health: HealthTracker,
}

impl ScraperClient {
    pub fn new(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(config.min_request_interval_ms)),
            health: HealthTracker::new("scraper"),
        })
    }

    async fn fetch(&self, url: &str) -> Result<PageContent, ProviderError> {
        self.rate_limiter.wait().await;

        tracing::debug!(url = %url, "Fetching page");

        let response = self.http_client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::Api(
                status.as_u16(),
                format!("fetching {}", url),
            ));
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let title = extract_title(&html);
        let mut content = strip_html(&html);
        content.truncate(MAX_CONTENT_CHARS);

        if content.trim().is_empty() {
            return Err(ProviderError::Parse(format!("no text content at {}", url)));
        }

        Ok(PageContent {
            url: final_url,
            title,
            content,
        })
    }
}

#[async_trait]
impl ContentScraping for ScraperClient {
    async fn scrape_content(&self, url: &str) -> Result<PageContent, ProviderError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ProviderError::InvalidInput(format!(
                "unsupported URL scheme: {}",
                url
            )));
        }

        let start = Instant::now();
        match self.fetch(url).await {
            Ok(page) => {
                self.health.record_success(start.elapsed().as_millis() as u64);
                tracing::info!(url = %url, chars = page.content.len(), "Scraped page");
                Ok(page)
            }
            Err(e) => {
                self.health.record_failure(start.elapsed().as_millis() as u64);
                Err(e)
            }
        }
    }
}

impl Provider for ScraperClient {
    fn name(&self) -> &str {
        "scraper"
    }

    fn health(&self) -> ServiceHealth {
        self.health.snapshot()
    }
}

fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_lowercase();
    let start = lower.find("<title")?;
    let open_end = html[start..].find('>')? + start + 1;
    let close = lower[open_end..].find("</title>")? + open_end;
    let title = html[open_end..close].trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Drop script/style blocks, strip tags, collapse whitespace
fn strip_html(html: &str) -> String {
    let without_blocks = remove_blocks(html, "script");
    let without_blocks = remove_blocks(&without_blocks, "style");

    let mut text = String::with_capacity(without_blocks.len() / 2);
    let mut in_tag = false;
    for c in without_blocks.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn remove_blocks(html: &str, tag: &str) -> String {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let lower = html.to_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(start) = lower[pos..].find(&open) {
        let start = pos + start;
        out.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => {
                pos = html.len();
                break;
            }
        }
    }
    out.push_str(&html[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_http_url_rejected() {
        let client = ScraperClient::new(&ProvidersConfig::default()).unwrap();
        let err = client.scrape_content("ftp://example.com").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInput(_)));
    }

    #[test]
    fn strip_html_drops_scripts_and_tags() {
        let html = r#"<html><head><script>var x = 1;</script><style>p{color:red}</style>
            <title>Staff Directory</title></head>
            <body><p>Jane  Doe</p><p>Science Editor</p></body></html>"#;
        let text = strip_html(html);
        assert!(text.contains("Jane Doe"));
        assert!(text.contains("Science Editor"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("color:red"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn title_extraction() {
        assert_eq!(
            extract_title("<html><title>Newsroom</title></html>"),
            Some("Newsroom".to_string())
        );
        assert_eq!(extract_title("<html><body>no title</body></html>"), None);
    }

    #[test]
    fn unclosed_script_block_is_dropped() {
        let html = "<p>before</p><script>never closed";
        let text = strip_html(html);
        assert!(text.contains("before"));
        assert!(!text.contains("never closed"));
    }
}
