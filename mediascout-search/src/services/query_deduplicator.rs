//! Query deduplication
//!
//! Removes near-duplicate generated queries before the web search stage.
//! Comparison is O(n * u) against the accepted-unique list, acceptable
//! because per-search batches are tens of queries, not thousands.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::GeneratedQuery;
use crate::similarity::{similarity, SimilarityMethod};

/// Deduplication failed as a whole; no partial result is available
#[derive(Debug, Error)]
#[error("Deduplication failed for batch of {query_count} queries: {cause}")]
pub struct DeduplicationError {
    pub cause: String,
    pub query_count: usize,
}

/// A query judged to duplicate an already-accepted one
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateRecord {
    /// The rejected query
    pub query_id: Uuid,
    /// The accepted query it duplicates
    pub duplicate_of: Uuid,
    /// Similarity score that triggered rejection
    pub similarity: f64,
    /// Human-readable rejection reason
    pub reason: String,
}

/// Summary counters for one deduplication pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeduplicationStats {
    pub total_processed: usize,
    pub duplicates_removed: usize,
    pub unique_queries: usize,
}

/// Outcome of deduplicating one batch
#[derive(Debug, Clone, Serialize)]
pub struct DeduplicationResult {
    pub duplicates: Vec<DuplicateRecord>,
    pub unique_queries: Vec<GeneratedQuery>,
    pub stats: DeduplicationStats,
}

/// A pool entry similar to a target query
#[derive(Debug, Clone, Serialize)]
pub struct SimilarQuery {
    pub query_id: Uuid,
    pub text: String,
    pub similarity: f64,
}

fn reason_for(similarity: f64) -> String {
    let label = if similarity >= 0.95 {
        "nearly identical"
    } else if similarity >= 0.85 {
        "very similar"
    } else if similarity >= 0.75 {
        "similar"
    } else {
        "potentially duplicate"
    };
    format!("Query is {} to an existing query ({:.2})", label, similarity)
}

/// Deduplicate a batch of generated queries.
///
/// When `keep_highest_scored` is set, queries are stably sorted descending by
/// `scores.overall` first, so the best-scored member of each similarity
/// cluster is the one retained. Each rejected query is attributed to the
/// first accepted query it matched, not the best match.
pub fn deduplicate(
    queries: Vec<GeneratedQuery>,
    method: SimilarityMethod,
    threshold: f64,
    keep_highest_scored: bool,
) -> Result<DeduplicationResult, DeduplicationError> {
    let total = queries.len();

    for q in &queries {
        if q.scores.overall.is_nan() {
            return Err(DeduplicationError {
                cause: format!("query {} has a NaN overall score", q.id),
                query_count: total,
            });
        }
    }

    let mut ordered = queries;
    if keep_highest_scored {
        // Stable sort preserves submission order within equal scores
        ordered.sort_by(|a, b| {
            b.scores
                .overall
                .partial_cmp(&a.scores.overall)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    let mut unique_queries: Vec<GeneratedQuery> = Vec::new();
    let mut duplicates: Vec<DuplicateRecord> = Vec::new();

    for candidate in ordered {
        let matched = unique_queries.iter().find_map(|accepted| {
            let score = similarity(&candidate.text, &accepted.text, method);
            (score >= threshold).then_some((accepted.id, score))
        });

        match matched {
            Some((duplicate_of, score)) => duplicates.push(DuplicateRecord {
                query_id: candidate.id,
                duplicate_of,
                similarity: score,
                reason: reason_for(score),
            }),
            None => unique_queries.push(candidate),
        }
    }

    let stats = DeduplicationStats {
        total_processed: total,
        duplicates_removed: duplicates.len(),
        unique_queries: unique_queries.len(),
    };

    Ok(DeduplicationResult {
        duplicates,
        unique_queries,
        stats,
    })
}

/// Find pool entries similar to a target query.
///
/// Excludes exact text matches (the target compared against itself), filters
/// by threshold, sorts descending by similarity, and truncates.
pub fn find_similar_queries(
    target: &str,
    pool: &[GeneratedQuery],
    method: SimilarityMethod,
    threshold: f64,
    max_results: usize,
) -> Vec<SimilarQuery> {
    let mut matches: Vec<SimilarQuery> = pool
        .iter()
        .filter(|q| q.text != target)
        .filter_map(|q| {
            let score = similarity(target, &q.text, method);
            (score >= threshold).then(|| SimilarQuery {
                query_id: q.id,
                text: q.text.clone(),
                similarity: score,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(max_results);
    matches
}

/// Deduplicate several named batches independently
pub fn batch_deduplicate(
    batches: Vec<(String, Vec<GeneratedQuery>)>,
    method: SimilarityMethod,
    threshold: f64,
    keep_highest_scored: bool,
) -> Result<Vec<(String, DeduplicationResult)>, DeduplicationError> {
    batches
        .into_iter()
        .map(|(name, queries)| {
            deduplicate(queries, method, threshold, keep_highest_scored)
                .map(|result| (name, result))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryScores;

    fn query(text: &str, overall_components: f64) -> GeneratedQuery {
        GeneratedQuery::new(
            Uuid::new_v4(),
            text.to_string(),
            "seed".to_string(),
            QueryScores::new(overall_components, overall_components, overall_components),
            "test-model".to_string(),
        )
    }

    #[test]
    fn empty_batch_yields_empty_result() {
        let result = deduplicate(vec![], SimilarityMethod::Exact, 0.8, true).unwrap();
        assert!(result.duplicates.is_empty());
        assert!(result.unique_queries.is_empty());
        assert_eq!(
            result.stats,
            DeduplicationStats {
                total_processed: 0,
                duplicates_removed: 0,
                unique_queries: 0,
            }
        );
    }

    #[test]
    fn identical_text_pair_keeps_one() {
        let a = query("AI journalist", 0.9);
        let b = query("ai  journalist", 0.5);
        let a_id = a.id;
        let b_id = b.id;

        let result = deduplicate(vec![a, b], SimilarityMethod::Exact, 0.8, true).unwrap();
        assert_eq!(result.unique_queries.len(), 1);
        assert_eq!(result.duplicates.len(), 1);

        // Higher-scored entry retained, lower-scored attributed to it
        assert_eq!(result.unique_queries[0].id, a_id);
        assert_eq!(result.duplicates[0].query_id, b_id);
        assert_eq!(result.duplicates[0].duplicate_of, a_id);
        assert_eq!(result.duplicates[0].similarity, 1.0);
        assert!(result.duplicates[0].reason.contains("identical"));
    }

    #[test]
    fn keep_highest_scored_retains_cluster_maximum() {
        let low = query("climate change reporters", 0.3);
        let high = query("climate change reporters!", 0.9);
        let high_id = high.id;

        // Lower-scored entry comes first in submission order
        let result = deduplicate(vec![low, high], SimilarityMethod::Exact, 0.8, true).unwrap();
        assert_eq!(result.unique_queries.len(), 1);
        assert_eq!(result.unique_queries[0].id, high_id);
    }

    #[test]
    fn without_sorting_first_seen_wins() {
        let first = query("tech reporters", 0.2);
        let second = query("tech  reporters", 0.9);
        let first_id = first.id;

        let result = deduplicate(vec![first, second], SimilarityMethod::Exact, 0.8, false).unwrap();
        assert_eq!(result.unique_queries[0].id, first_id);
    }

    #[test]
    fn dissimilar_queries_all_retained() {
        let batch = vec![
            query("AI journalists in Germany", 0.8),
            query("gardening tips for beginners", 0.7),
            query("stock market analysts", 0.6),
        ];
        let result = deduplicate(batch, SimilarityMethod::Exact, 0.8, true).unwrap();
        assert_eq!(result.unique_queries.len(), 3);
        assert!(result.duplicates.is_empty());
    }

    #[test]
    fn nan_score_fails_whole_batch() {
        let mut bad = query("AI reporters", 0.5);
        bad.scores.overall = f64::NAN;
        let err = deduplicate(vec![bad], SimilarityMethod::Exact, 0.8, true).unwrap_err();
        assert_eq!(err.query_count, 1);
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn find_similar_excludes_exact_self_match() {
        let pool = vec![
            query("AI journalist", 0.9),
            query("AI journalists", 0.8),
            query("unrelated gardening", 0.7),
        ];
        let matches =
            find_similar_queries("AI journalist", &pool, SimilarityMethod::Exact, 0.5, 10);
        assert!(matches.iter().all(|m| m.text != "AI journalist"));
        assert!(matches.iter().any(|m| m.text == "AI journalists"));
        // Sorted descending
        for pair in matches.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[test]
    fn find_similar_truncates_to_max_results() {
        let pool = vec![
            query("AI reporter one", 0.9),
            query("AI reporter two", 0.8),
            query("AI reporter three", 0.7),
        ];
        let matches = find_similar_queries("AI reporter", &pool, SimilarityMethod::Exact, 0.1, 2);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn batches_deduplicate_independently() {
        let batches = vec![
            ("first".to_string(), vec![query("AI news", 0.9), query("ai news", 0.5)]),
            ("second".to_string(), vec![query("AI news", 0.9)]),
        ];
        let results =
            batch_deduplicate(batches, SimilarityMethod::Exact, 0.8, true).unwrap();
        assert_eq!(results.len(), 2);
        // Duplicate in the first batch does not affect the second
        assert_eq!(results[0].1.stats.duplicates_removed, 1);
        assert_eq!(results[1].1.stats.duplicates_removed, 0);
        assert_eq!(results[1].1.stats.unique_queries, 1);
    }
}
