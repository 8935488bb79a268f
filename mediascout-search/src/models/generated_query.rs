//! Generated query candidates
//!
//! Produced by the query generation stage, scored, deduplicated, and then
//! consumed by web search. Queries are ephemeral; only summary counts are
//! persisted on the search record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Score components for a generated query, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryScores {
    /// How well the query matches the seed intent
    pub relevance: f64,
    /// How much the query differs from its siblings
    pub diversity: f64,
    /// How much of the structured criteria the query covers
    pub coverage: f64,
    /// Weighted combination, computed once at construction
    pub overall: f64,
}

impl QueryScores {
    /// Combine component scores with fixed weights:
    /// 0.5 relevance + 0.3 diversity + 0.2 coverage.
    pub fn new(relevance: f64, diversity: f64, coverage: f64) -> Self {
        let overall = 0.5 * relevance + 0.3 * diversity + 0.2 * coverage;
        Self {
            relevance,
            diversity,
            coverage,
            overall,
        }
    }
}

/// A candidate search query produced from a seed plus criteria
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuery {
    /// Query identifier (unique within a batch)
    pub id: Uuid,

    /// Parent search this query belongs to
    pub search_id: Uuid,

    /// Generated query text
    pub text: String,

    /// Seed query the generation started from
    pub seed: String,

    /// Quality scores
    pub scores: QueryScores,

    /// Model that produced this query
    pub model: String,

    /// Generation time
    pub generated_at: DateTime<Utc>,
}

impl GeneratedQuery {
    pub fn new(search_id: Uuid, text: String, seed: String, scores: QueryScores, model: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            search_id,
            text,
            seed,
            scores,
            model,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_is_deterministic_weighting() {
        let s = QueryScores::new(0.8, 0.6, 0.4);
        let expected = 0.5 * 0.8 + 0.3 * 0.6 + 0.2 * 0.4;
        assert!((s.overall - expected).abs() < 1e-12);
    }

    #[test]
    fn perfect_components_give_perfect_overall() {
        let s = QueryScores::new(1.0, 1.0, 1.0);
        assert!((s.overall - 1.0).abs() < 1e-12);
    }
}
