//! Historical search statistics
//!
//! Aggregates a user's persisted search records. All averages are zero-safe:
//! a user with no history gets an all-zero report, never a division error.

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use mediascout_common::Result;

use crate::db;
use crate::models::SearchStatus;

/// How many top queries to report
const TOP_QUERY_LIMIT: usize = 5;

/// A frequently submitted query
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TopQuery {
    pub query: String,
    pub count: u32,
}

/// Aggregated search history for one user
#[derive(Debug, Clone, Serialize)]
pub struct SearchStatistics {
    pub total_searches: u32,
    pub completed: u32,
    pub failed: u32,
    pub cancelled: u32,
    pub in_progress: u32,
    /// Mean wall-clock duration over all terminal searches, seconds
    pub average_processing_seconds: f64,
    /// Mean contacts found per completed search
    pub average_contacts_found: f64,
    pub top_queries: Vec<TopQuery>,
}

impl SearchStatistics {
    fn empty() -> Self {
        Self {
            total_searches: 0,
            completed: 0,
            failed: 0,
            cancelled: 0,
            in_progress: 0,
            average_processing_seconds: 0.0,
            average_contacts_found: 0.0,
            top_queries: Vec::new(),
        }
    }
}

/// Compute statistics over a user's searches, optionally windowed to the
/// last `days` days of submissions.
pub async fn compute(
    pool: &SqlitePool,
    user_id: Uuid,
    days: Option<u32>,
) -> Result<SearchStatistics> {
    let since = days.map(|d| Utc::now() - Duration::days(d as i64));
    let sessions = db::searches::list_user_searches(pool, user_id, since).await?;

    if sessions.is_empty() {
        return Ok(SearchStatistics::empty());
    }

    let mut stats = SearchStatistics::empty();
    stats.total_searches = sessions.len() as u32;

    let mut duration_sum = 0i64;
    let mut duration_count = 0u32;
    let mut contacts_sum = 0u64;
    let mut query_counts: HashMap<String, u32> = HashMap::new();

    for session in &sessions {
        match session.status {
            SearchStatus::Completed => {
                stats.completed += 1;
                contacts_sum += session.contacts_found as u64;
            }
            SearchStatus::Failed => stats.failed += 1,
            SearchStatus::Cancelled => stats.cancelled += 1,
            SearchStatus::Pending | SearchStatus::Processing => stats.in_progress += 1,
        }

        // Duration counts every terminal search, whatever its outcome
        if let (Some(start), Some(end)) = (session.started_at, session.completed_at) {
            duration_sum += (end - start).num_seconds().max(0);
            duration_count += 1;
        }

        *query_counts
            .entry(session.configuration.query.clone())
            .or_insert(0) += 1;
    }

    if duration_count > 0 {
        stats.average_processing_seconds = duration_sum as f64 / duration_count as f64;
    }
    if stats.completed > 0 {
        stats.average_contacts_found = contacts_sum as f64 / stats.completed as f64;
    }

    let mut top: Vec<TopQuery> = query_counts
        .into_iter()
        .map(|(query, count)| TopQuery { query, count })
        .collect();
    top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query)));
    top.truncate(TOP_QUERY_LIMIT);
    stats.top_queries = top;

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchConfiguration, SearchOptions, SearchSession};

    async fn setup_test_db() -> SqlitePool {
        // Single connection so every query sees the same in-memory database
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    fn session(user_id: Uuid, query: &str) -> SearchSession {
        SearchSession::new(
            user_id,
            SearchConfiguration {
                query: query.to_string(),
                countries: vec![],
                categories: vec![],
                beats: vec![],
                languages: vec![],
                topics: vec![],
                options: SearchOptions::default(),
            },
        )
    }

    #[tokio::test]
    async fn empty_history_is_all_zero() {
        let pool = setup_test_db().await;
        let stats = compute(&pool, Uuid::new_v4(), None).await.unwrap();
        assert_eq!(stats.total_searches, 0);
        assert_eq!(stats.average_processing_seconds, 0.0);
        assert_eq!(stats.average_contacts_found, 0.0);
        assert!(stats.top_queries.is_empty());
    }

    #[tokio::test]
    async fn counts_by_terminal_status() {
        let pool = setup_test_db().await;
        let user = Uuid::new_v4();

        let mut completed = session(user, "AI reporters");
        completed.transition_to(SearchStatus::Processing);
        completed.contacts_found = 10;
        completed.transition_to(SearchStatus::Completed);
        db::searches::save_search(&pool, &completed).await.unwrap();

        let mut failed = session(user, "AI reporters");
        failed.transition_to(SearchStatus::Processing);
        failed.transition_to(SearchStatus::Failed);
        db::searches::save_search(&pool, &failed).await.unwrap();

        let pending = session(user, "climate journalists");
        db::searches::save_search(&pool, &pending).await.unwrap();

        let stats = compute(&pool, user, None).await.unwrap();
        assert_eq!(stats.total_searches, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.average_contacts_found, 10.0);
        // Duration averaged over both terminal searches
        assert!(stats.average_processing_seconds >= 0.0);
    }

    #[tokio::test]
    async fn top_queries_ranked_by_frequency() {
        let pool = setup_test_db().await;
        let user = Uuid::new_v4();

        for _ in 0..3 {
            db::searches::save_search(&pool, &session(user, "AI reporters"))
                .await
                .unwrap();
        }
        db::searches::save_search(&pool, &session(user, "food critics"))
            .await
            .unwrap();

        let stats = compute(&pool, user, None).await.unwrap();
        assert_eq!(stats.top_queries[0].query, "AI reporters");
        assert_eq!(stats.top_queries[0].count, 3);
        assert_eq!(stats.top_queries[1].count, 1);
    }

    #[tokio::test]
    async fn other_users_are_excluded() {
        let pool = setup_test_db().await;
        let user = Uuid::new_v4();
        db::searches::save_search(&pool, &session(Uuid::new_v4(), "not mine"))
            .await
            .unwrap();

        let stats = compute(&pool, user, None).await.unwrap();
        assert_eq!(stats.total_searches, 0);
    }
}
