//! Search orchestration
//!
//! Drives a submitted search through the pipeline stages: query generation,
//! web search, content scraping, contact extraction, aggregation, and
//! finalization. Each stage runs under a timeout, checks for cooperative
//! cancellation at its checkpoints, and persists the session after every
//! transition so a restart never leaves silent in-memory-only state.

pub mod statistics;

use chrono::Utc;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use mediascout_common::events::ScoutEvent;
use mediascout_common::{Error, Result};

use crate::db;
use crate::models::{
    ExtractedContact, GeneratedQuery, SearchConfiguration, SearchSession, SearchSource,
    SearchStage, SearchStatus,
};
use crate::providers::{ExtractionOptions, PageContent, ProviderError, QueryCriteria};
use crate::services::query_deduplicator;
use crate::similarity::SimilarityMethod;
use crate::AppState;

/// Candidate queries requested from the generator
const GENERATED_QUERY_COUNT: usize = 8;

/// Similarity threshold for dropping near-duplicate queries
const DEDUP_THRESHOLD: f64 = 0.8;

/// Cap on pages fetched during content scraping
const MAX_SCRAPE_PAGES: usize = 12;

/// Why a stage stopped the pipeline
enum StageError {
    /// Unrecoverable failure within the stage
    Failed { stage: SearchStage, message: String },
    /// The stage exceeded its timeout
    TimedOut { stage: SearchStage },
    /// Cancellation observed at a checkpoint
    Cancelled,
}

impl StageError {
    fn failed(stage: SearchStage, message: impl Into<String>) -> Self {
        StageError::Failed {
            stage,
            message: message.into(),
        }
    }
}

/// Validate, persist, and enqueue a new search.
///
/// Returns the created session immediately; pipeline execution happens
/// asynchronously once the scheduler admits the search.
pub async fn submit_search(
    state: &AppState,
    user_id: Uuid,
    configuration: SearchConfiguration,
) -> Result<SearchSession> {
    configuration.validate()?;

    let session = SearchSession::new(user_id, configuration);
    db::searches::save_search(&state.db, &session).await?;

    // Register the cancellation token before enqueueing so cancel requests
    // arriving between admission and startup still have a token to trip
    let token = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(session.search_id, token);

    let scheduler = state.scheduler()?;
    scheduler.enqueue(session.search_id, session.configuration.options.priority);

    state.event_bus.emit_lossy(ScoutEvent::SearchSubmitted {
        search_id: session.search_id,
        user_id,
        query: session.configuration.query.clone(),
        timestamp: Utc::now(),
    });

    tracing::info!(
        search_id = %session.search_id,
        user_id = %user_id,
        priority = session.configuration.options.priority.as_str(),
        "Search submitted"
    );
    Ok(session)
}

/// Fetch a search, enforcing ownership at this boundary
pub async fn get_search(
    state: &AppState,
    search_id: Uuid,
    requesting_user: Uuid,
) -> Result<Option<SearchSession>> {
    let Some(session) = db::searches::load_search(&state.db, search_id).await? else {
        return Ok(None);
    };
    if session.user_id != requesting_user {
        // Leak nothing beyond the id the caller already has
        return Err(Error::AccessDenied(format!(
            "search {} belongs to another user",
            search_id
        )));
    }
    Ok(Some(session))
}

/// Outcome of a cancellation request
#[derive(Debug, serde::Serialize)]
pub struct CancelOutcome {
    pub success: bool,
    pub message: String,
}

/// Cancel a search if it is still non-terminal.
///
/// Failure to cancel (unknown id, already terminal) is reported in the
/// outcome, not as an error. The record's completion time is only stamped
/// when the cancellation actually takes effect.
pub async fn cancel_search(
    state: &AppState,
    search_id: Uuid,
    requesting_user: Uuid,
    reason: Option<String>,
) -> Result<CancelOutcome> {
    let Some(mut session) = db::searches::load_search(&state.db, search_id).await? else {
        return Ok(CancelOutcome {
            success: false,
            message: format!("Search {} not found", search_id),
        });
    };
    if session.user_id != requesting_user {
        return Err(Error::AccessDenied(format!(
            "search {} belongs to another user",
            search_id
        )));
    }
    if session.is_terminal() {
        return Ok(CancelOutcome {
            success: false,
            message: format!(
                "Search in state {:?} cannot be cancelled",
                session.status
            ),
        });
    }

    // Pull it out of the admission queue if it never started; trip the
    // token so a running pipeline stops at its next checkpoint
    if let Ok(scheduler) = state.scheduler() {
        scheduler.remove_queued(search_id);
    }
    if let Some(token) = state.cancellation_tokens.read().await.get(&search_id) {
        token.cancel();
    }

    session.transition_to(SearchStatus::Cancelled);
    if let Some(r) = &reason {
        session.record_error(format!("Cancelled: {}", r));
    }
    // Guarded save: if the pipeline persisted a terminal status since the
    // load above, that status stands and the cancellation reports failure
    if !db::searches::update_search_if_active(&state.db, &session).await? {
        return Ok(CancelOutcome {
            success: false,
            message: "Search finished before cancellation took effect".to_string(),
        });
    }

    state.event_bus.emit_lossy(ScoutEvent::SearchCancelled {
        search_id,
        reason,
        timestamp: Utc::now(),
    });

    tracing::info!(search_id = %search_id, "Search cancelled");
    Ok(CancelOutcome {
        success: true,
        message: "Search cancelled".to_string(),
    })
}

/// Pipeline entry point invoked by the scheduler for an admitted search
pub async fn run_search(state: AppState, search_id: Uuid) {
    if let Err(e) = run_search_inner(&state, search_id).await {
        tracing::error!(search_id = %search_id, error = %e, "Pipeline bookkeeping error");
        *state.last_error.write().await = Some(e.to_string());
    }

    state.cancellation_tokens.write().await.remove(&search_id);
}

async fn run_search_inner(state: &AppState, search_id: Uuid) -> Result<()> {
    let Some(mut session) = db::searches::load_search(&state.db, search_id).await? else {
        tracing::warn!(search_id = %search_id, "Admitted search no longer exists");
        return Ok(());
    };

    // Cancelled while still queued: the cancel operation already persisted
    // the terminal state, nothing to run
    if session.status != SearchStatus::Pending {
        tracing::debug!(search_id = %search_id, status = ?session.status, "Skipping admitted search");
        return Ok(());
    }

    let token = state
        .cancellation_tokens
        .read()
        .await
        .get(&search_id)
        .cloned()
        .unwrap_or_default();

    session.transition_to(SearchStatus::Processing);
    if !db::searches::update_search_if_active(&state.db, &session).await? {
        tracing::debug!(search_id = %search_id, "Search cancelled before processing began");
        return Ok(());
    }

    match execute_pipeline(state, &mut session, &token).await {
        Ok(()) => {
            session.enter_stage(SearchStage::Completed, "Search completed".to_string());
            session.transition_to(SearchStatus::Completed);
            if !db::searches::update_search_if_active(&state.db, &session).await? {
                // Cancellation persisted its terminal status mid-pipeline;
                // that status stands
                tracing::info!(search_id = %search_id, "Cancellation won the race against completion");
                return Ok(());
            }

            let duration = session
                .completed_at
                .zip(session.started_at)
                .map(|(end, start)| (end - start).num_seconds().max(0) as u64)
                .unwrap_or(0);
            state.event_bus.emit_lossy(ScoutEvent::SearchCompleted {
                search_id,
                contacts_found: session.contacts_found as usize,
                duration_seconds: duration,
                timestamp: Utc::now(),
            });
            tracing::info!(
                search_id = %search_id,
                contacts = session.contacts_imported,
                duration_seconds = duration,
                "Search completed"
            );
        }
        Err(StageError::Cancelled) => {
            // The cancel operation owns the terminal transition; work already
            // persisted for earlier stages is kept
            tracing::info!(search_id = %search_id, "Pipeline stopped at cancellation checkpoint");
        }
        Err(StageError::TimedOut { stage }) => {
            let message = format!("Stage {} timed out", stage.as_str());
            handle_failure(state, &mut session, stage, message).await?;
        }
        Err(StageError::Failed { stage, message }) => {
            handle_failure(state, &mut session, stage, message).await?;
        }
    }

    Ok(())
}

async fn handle_failure(
    state: &AppState,
    session: &mut SearchSession,
    stage: SearchStage,
    message: String,
) -> Result<()> {
    tracing::error!(
        search_id = %session.search_id,
        stage = stage.as_str(),
        error = %message,
        "Search failed"
    );

    session.transition_to(SearchStatus::Failed);
    session.record_error(message.clone());
    if !db::searches::update_search_if_active(&state.db, session).await? {
        tracing::info!(
            search_id = %session.search_id,
            "Search already terminal, keeping the stored status"
        );
        return Ok(());
    }

    *state.last_error.write().await = Some(message.clone());
    state.event_bus.emit_lossy(ScoutEvent::SearchFailed {
        search_id: session.search_id,
        stage: stage.as_str().to_string(),
        error: message,
        timestamp: Utc::now(),
    });
    Ok(())
}

fn broadcast_progress(state: &AppState, session: &SearchSession) {
    state.event_bus.emit_lossy(ScoutEvent::SearchProgress {
        search_id: session.search_id,
        stage: session.stage.as_str().to_string(),
        percentage: session.progress.percentage,
        message: session.progress.message.clone(),
        current_step: session.progress.current_step,
        total_steps: session.progress.total_steps,
        timestamp: Utc::now(),
    });
}

/// Persist and broadcast a stage transition.
///
/// The save is refused once the stored record is terminal, which happens
/// when a cancellation lands between two checkpoint checks; the pipeline
/// then stops as if it had observed the token itself.
async fn enter_stage(
    state: &AppState,
    session: &mut SearchSession,
    stage: SearchStage,
    message: &str,
) -> std::result::Result<(), StageError> {
    session.enter_stage(stage, message.to_string());
    let active = db::searches::update_search_if_active(&state.db, session)
        .await
        .map_err(|e| StageError::failed(stage, e.to_string()))?;
    if !active {
        return Err(StageError::Cancelled);
    }
    broadcast_progress(state, session);
    Ok(())
}

fn stage_timeout(session: &SearchSession, state: &AppState) -> Duration {
    let secs = session
        .configuration
        .options
        .stage_timeout_secs
        .unwrap_or(state.config.stage_timeout_secs);
    Duration::from_secs(secs)
}

/// Run a stage body under the configured timeout
async fn with_timeout<T, F>(
    timeout: Duration,
    stage: SearchStage,
    body: F,
) -> std::result::Result<T, StageError>
where
    F: std::future::Future<Output = std::result::Result<T, StageError>>,
{
    match tokio::time::timeout(timeout, body).await {
        Ok(result) => result,
        Err(_) => Err(StageError::TimedOut { stage }),
    }
}

async fn execute_pipeline(
    state: &AppState,
    session: &mut SearchSession,
    token: &CancellationToken,
) -> std::result::Result<(), StageError> {
    let timeout = stage_timeout(session, state);

    // INITIALIZING
    enter_stage(state, session, SearchStage::Initializing, "Preparing search").await?;

    // QUERY_GENERATION
    if token.is_cancelled() {
        return Err(StageError::Cancelled);
    }
    enter_stage(
        state,
        session,
        SearchStage::QueryGeneration,
        "Generating search queries",
    )
    .await?;

    let queries = with_timeout(
        timeout,
        SearchStage::QueryGeneration,
        generate_queries(state, session),
    )
    .await?;
    session.update_progress(1, 1, format!("{} queries after deduplication", queries.len()));
    broadcast_progress(state, session);

    // WEB_SEARCH
    if token.is_cancelled() {
        return Err(StageError::Cancelled);
    }
    enter_stage(state, session, SearchStage::WebSearch, "Searching the web").await?;

    let sources = with_timeout(
        timeout,
        SearchStage::WebSearch,
        search_web(state, session, &queries, token),
    )
    .await?;

    // CONTENT_SCRAPING
    if token.is_cancelled() {
        return Err(StageError::Cancelled);
    }
    enter_stage(
        state,
        session,
        SearchStage::ContentScraping,
        "Scraping source pages",
    )
    .await?;

    let pages = with_timeout(
        timeout,
        SearchStage::ContentScraping,
        scrape_sources(state, session, &sources, token),
    )
    .await?;

    // CONTACT_EXTRACTION
    if token.is_cancelled() {
        return Err(StageError::Cancelled);
    }
    enter_stage(
        state,
        session,
        SearchStage::ContactExtraction,
        "Extracting contacts",
    )
    .await?;

    let contacts = with_timeout(
        timeout,
        SearchStage::ContactExtraction,
        extract_contacts(state, session, &pages),
    )
    .await?;
    session.contacts_found = contacts.len() as u32;

    // RESULT_AGGREGATION
    if token.is_cancelled() {
        return Err(StageError::Cancelled);
    }
    enter_stage(
        state,
        session,
        SearchStage::ResultAggregation,
        "Aggregating results",
    )
    .await?;

    let max_results = session.configuration.options.max_results as usize;
    let aggregated = aggregate_contacts(contacts, max_results);

    // FINALIZATION
    if token.is_cancelled() {
        return Err(StageError::Cancelled);
    }
    enter_stage(state, session, SearchStage::Finalization, "Saving contacts").await?;

    db::searches::append_contacts(&state.db, &aggregated)
        .await
        .map_err(|e| StageError::failed(SearchStage::Finalization, e.to_string()))?;
    session.contacts_imported = aggregated.len() as u32;

    Ok(())
}

/// Query generation plus deduplication
async fn generate_queries(
    state: &AppState,
    session: &SearchSession,
) -> std::result::Result<Vec<GeneratedQuery>, StageError> {
    let config = &session.configuration;
    let criteria = QueryCriteria {
        countries: config.countries.clone(),
        categories: config.categories.clone(),
        beats: config.beats.clone(),
        languages: config.languages.clone(),
        topics: config.topics.clone(),
    };

    let generated = if config.options.ai_enhanced {
        state
            .providers
            .query_generator
            .generate_queries(session.search_id, &config.query, &criteria, GENERATED_QUERY_COUNT)
            .await
            .map_err(|e| provider_stage_error(SearchStage::QueryGeneration, e))?
    } else {
        // Enhancement disabled: the seed query is the only candidate
        vec![GeneratedQuery::new(
            session.search_id,
            config.query.clone(),
            config.query.clone(),
            crate::models::QueryScores::new(1.0, 1.0, 1.0),
            "none".to_string(),
        )]
    };

    let result = query_deduplicator::deduplicate(
        generated,
        SimilarityMethod::Hybrid,
        DEDUP_THRESHOLD,
        true,
    )
    .map_err(|e| StageError::failed(SearchStage::QueryGeneration, e.to_string()))?;

    tracing::info!(
        search_id = %session.search_id,
        unique = result.stats.unique_queries,
        removed = result.stats.duplicates_removed,
        "Query batch deduplicated"
    );
    Ok(result.unique_queries)
}

/// Run every unique query against the web search provider.
///
/// Per-query transient failures are logged and skipped; the stage fails only
/// when no query produces results.
async fn search_web(
    state: &AppState,
    session: &mut SearchSession,
    queries: &[GeneratedQuery],
    token: &CancellationToken,
) -> std::result::Result<Vec<SearchSource>, StageError> {
    let mut sources: Vec<SearchSource> = Vec::new();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut failures = 0usize;

    for (index, query) in queries.iter().enumerate() {
        if token.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        match state.providers.web_search.search_web(&query.text).await {
            Ok(results) => {
                for item in results {
                    if seen_urls.insert(item.url.clone()) {
                        sources.push(SearchSource {
                            id: Uuid::new_v4(),
                            search_id: session.search_id,
                            url: item.url,
                            title: item.title,
                            snippet: item.snippet,
                            query: query.text.clone(),
                            rank: item.rank,
                            discovered_at: Utc::now(),
                        });
                    }
                }
            }
            Err(e) if e.is_transient() => {
                failures += 1;
                tracing::warn!(
                    search_id = %session.search_id,
                    query = %query.text,
                    error = %e,
                    "Web search query failed, continuing"
                );
            }
            Err(e) => return Err(provider_stage_error(SearchStage::WebSearch, e)),
        }

        session.update_progress(
            index + 1,
            queries.len(),
            format!("Searched {} of {} queries", index + 1, queries.len()),
        );
        broadcast_progress(state, session);
    }

    if sources.is_empty() {
        return Err(StageError::failed(
            SearchStage::WebSearch,
            format!("no results from {} queries ({} failed)", queries.len(), failures),
        ));
    }

    db::searches::append_sources(&state.db, &sources)
        .await
        .map_err(|e| StageError::failed(SearchStage::WebSearch, e.to_string()))?;

    Ok(sources)
}

/// Scrape discovered sources, best ranked first, up to the page cap.
///
/// Cancellation is checked per URL. Transient fetch failures are skipped;
/// permanent provider errors fail the stage, matching the web search stage.
async fn scrape_sources(
    state: &AppState,
    session: &mut SearchSession,
    sources: &[SearchSource],
    token: &CancellationToken,
) -> std::result::Result<Vec<PageContent>, StageError> {
    let mut ordered: Vec<&SearchSource> = sources.iter().collect();
    ordered.sort_by_key(|s| s.rank);
    ordered.truncate(MAX_SCRAPE_PAGES);

    let mut pages = Vec::new();
    for (index, source) in ordered.iter().enumerate() {
        if token.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        match state.providers.scraper.scrape_content(&source.url).await {
            Ok(page) => pages.push(page),
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    search_id = %session.search_id,
                    url = %source.url,
                    error = %e,
                    "Scrape failed, skipping source"
                );
            }
            Err(e) => return Err(provider_stage_error(SearchStage::ContentScraping, e)),
        }

        session.update_progress(
            index + 1,
            ordered.len(),
            format!("Scraped {} of {} pages", index + 1, ordered.len()),
        );
        broadcast_progress(state, session);
    }

    if pages.is_empty() {
        return Err(StageError::failed(
            SearchStage::ContentScraping,
            format!("none of {} sources could be scraped", ordered.len()),
        ));
    }
    Ok(pages)
}

async fn extract_contacts(
    state: &AppState,
    session: &SearchSession,
    pages: &[PageContent],
) -> std::result::Result<Vec<ExtractedContact>, StageError> {
    let options = ExtractionOptions {
        seed_query: session.configuration.query.clone(),
        confidence_threshold: session.configuration.options.confidence_threshold,
        max_contacts: session.configuration.options.max_results * 2,
    };

    state
        .providers
        .extractor
        .extract_contacts(session.search_id, pages, &options)
        .await
        .map_err(|e| provider_stage_error(SearchStage::ContactExtraction, e))
}

/// Deduplicate contacts by identity and keep the most confident entries
fn aggregate_contacts(contacts: Vec<ExtractedContact>, max_results: usize) -> Vec<ExtractedContact> {
    let mut sorted = contacts;
    sorted.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen: HashSet<String> = HashSet::new();
    let mut aggregated = Vec::new();
    for contact in sorted {
        let identity = match &contact.email {
            Some(email) => email.to_lowercase(),
            None => contact.name.to_lowercase(),
        };
        if seen.insert(identity) {
            aggregated.push(contact);
        }
        if aggregated.len() == max_results {
            break;
        }
    }
    aggregated
}

fn provider_stage_error(stage: SearchStage, error: ProviderError) -> StageError {
    // Transient errors that reach this point exhausted the adapter's own
    // retry budget, so they fail the stage like permanent ones
    StageError::failed(stage, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VerificationStatus;

    fn contact(name: &str, email: Option<&str>, confidence: f64) -> ExtractedContact {
        ExtractedContact {
            id: Uuid::new_v4(),
            search_id: Uuid::new_v4(),
            name: name.to_string(),
            title: None,
            outlet: None,
            email: email.map(String::from),
            profile_url: None,
            confidence,
            relevance: 0.5,
            quality: 0.5,
            verification: VerificationStatus::Unverified,
            source_url: "https://example.com".to_string(),
            extraction_method: "test".to_string(),
            extracted_at: Utc::now(),
        }
    }

    #[test]
    fn aggregation_dedupes_by_email_keeping_most_confident() {
        let contacts = vec![
            contact("Jane Doe", Some("jane@example.com"), 0.6),
            contact("Jane D.", Some("JANE@example.com"), 0.9),
            contact("John Smith", Some("john@example.com"), 0.7),
        ];
        let result = aggregate_contacts(contacts, 10);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, "Jane D.");
        assert_eq!(result[0].confidence, 0.9);
    }

    #[test]
    fn aggregation_falls_back_to_name_identity() {
        let contacts = vec![
            contact("Jane Doe", None, 0.6),
            contact("jane doe", None, 0.8),
        ];
        let result = aggregate_contacts(contacts, 10);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].confidence, 0.8);
    }

    #[test]
    fn aggregation_caps_at_max_results() {
        let contacts = (0..5)
            .map(|i| contact(&format!("Person {}", i), None, 0.5))
            .collect();
        assert_eq!(aggregate_contacts(contacts, 3).len(), 3);
    }
}
