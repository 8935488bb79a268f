//! mediascout-search - Search Orchestration Service
//!
//! Turns natural-language media-contact requests into deduplicated, scored,
//! persisted contact sets by coordinating query generation, web search,
//! content scraping, and contact extraction providers.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use mediascout_common::config::ServiceConfig;
use mediascout_common::events::EventBus;
use mediascout_search::providers::{
    extractor::LlmContactExtractor, llm_client::ChatClient, llm_client::LlmQueryGenerator,
    scraper_client::ScraperClient, web_search_client::WebSearchClient, ProviderSet,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting mediascout-search (Search Orchestration) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration (MEDIASCOUT_CONFIG overrides the default path)
    let config_path = std::env::var("MEDIASCOUT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("mediascout.toml"));
    let config = Arc::new(
        ServiceConfig::load(Some(&config_path))
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?,
    );
    info!("Configuration loaded");

    // Initialize database connection pool
    let db_pool = mediascout_search::db::init_database_pool(&config.database_path).await?;
    info!("Database: {}", config.database_path.display());

    // Searches from a previous run can never progress; close them out
    let stale = mediascout_search::db::searches::cleanup_stale_searches(&db_pool).await?;
    if stale > 0 {
        info!("Cleaned up {} stale searches from previous run", stale);
    }

    // Create event bus for SSE broadcasting
    let event_bus = EventBus::new(config.event_bus_capacity);
    info!("Event bus initialized");

    // Construct provider adapters
    let chat = Arc::new(
        ChatClient::new(&config.providers)
            .map_err(|e| anyhow::anyhow!("Failed to create LLM client: {}", e))?,
    );
    let providers = ProviderSet {
        query_generator: Arc::new(LlmQueryGenerator::new(chat.clone())),
        web_search: Arc::new(
            WebSearchClient::new(&config.providers)
                .map_err(|e| anyhow::anyhow!("Failed to create web search client: {}", e))?,
        ),
        scraper: Arc::new(
            ScraperClient::new(&config.providers)
                .map_err(|e| anyhow::anyhow!("Failed to create scraper client: {}", e))?,
        ),
        extractor: Arc::new(LlmContactExtractor::new(chat)),
    };
    info!("Provider adapters initialized");

    // Create application state with its admission scheduler
    let bind = config.bind.clone();
    let state = mediascout_search::init_state(db_pool, event_bus, config, providers);

    // Build router
    let app = mediascout_search::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
