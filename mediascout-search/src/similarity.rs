//! Query similarity scoring
//!
//! Pure string-similarity functions used by the deduplicator. Three methods:
//! `exact` (lexical: Jaccard word overlap plus normalized edit distance),
//! `semantic` (keyword and synonym overlap plus structural query features),
//! and `hybrid` (mean of the two).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Similarity scoring method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMethod {
    Exact,
    Semantic,
    Hybrid,
}

impl Default for SimilarityMethod {
    fn default() -> Self {
        SimilarityMethod::Hybrid
    }
}

/// Compute similarity between two query strings, in [0, 1]
pub fn similarity(a: &str, b: &str, method: SimilarityMethod) -> f64 {
    match method {
        SimilarityMethod::Exact => exact_similarity(a, b),
        SimilarityMethod::Semantic => semantic_similarity(a, b),
        SimilarityMethod::Hybrid => {
            (exact_similarity(a, b) + semantic_similarity(a, b)) / 2.0
        }
    }
}

/// Lowercase, map punctuation to spaces, collapse whitespace, trim
fn normalize(s: &str) -> String {
    let mapped: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Jaccard similarity of whitespace-tokenized word sets
fn jaccard(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / union as f64
}

/// Normalized edit-distance similarity over the raw (un-normalized) strings
fn edit_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - strsim::levenshtein(a, b) as f64 / max_len as f64
}

/// Lexical similarity: 0.7 Jaccard + 0.3 edit distance, with an exact
/// short-circuit after normalization.
fn exact_similarity(a: &str, b: &str) -> f64 {
    let norm_a = normalize(a);
    let norm_b = normalize(b);
    if norm_a == norm_b {
        return 1.0;
    }
    0.7 * jaccard(&norm_a, &norm_b) + 0.3 * edit_similarity(&norm_a, &norm_b)
}

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "that", "this", "are", "was", "have",
    "has", "not", "but", "all", "can", "who", "what", "when", "where", "how",
    "about", "into", "over", "than", "then", "them", "they", "their", "its",
];

/// Small static synonym table for the media-contacts domain
const SYNONYMS: &[(&str, &str)] = &[
    ("journalist", "reporter"),
    ("journalist", "correspondent"),
    ("reporter", "correspondent"),
    ("editor", "columnist"),
    ("writer", "author"),
    ("media", "press"),
    ("news", "journalism"),
    ("contact", "email"),
    ("outlet", "publication"),
    ("tech", "technology"),
    ("ai", "artificial"),
];

fn are_synonyms(a: &str, b: &str) -> bool {
    SYNONYMS
        .iter()
        .any(|(x, y)| (*x == a && *y == b) || (*x == b && *y == a))
}

/// Extract deduplicated keywords: lowercase alphanumeric tokens longer than
/// two characters, minus stop words.
fn keywords(s: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for token in normalize(s).split_whitespace() {
        if token.len() <= 2 || STOP_WORDS.contains(&token) {
            continue;
        }
        if seen.insert(token.to_string()) {
            out.push(token.to_string());
        }
    }
    out
}

/// Keyword similarity: 0.7 direct Jaccard overlap + 0.3 synonym overlap
fn keyword_similarity(kw_a: &[String], kw_b: &[String]) -> f64 {
    if kw_a.is_empty() && kw_b.is_empty() {
        return 1.0;
    }
    if kw_a.is_empty() || kw_b.is_empty() {
        return 0.0;
    }

    let set_a: HashSet<&str> = kw_a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = kw_b.iter().map(String::as_str).collect();
    let union = set_a.union(&set_b).count();
    let direct = set_a.intersection(&set_b).count() as f64 / union as f64;

    let comparisons = kw_a.len() * kw_b.len();
    let matches = kw_a
        .iter()
        .flat_map(|a| kw_b.iter().map(move |b| (a, b)))
        .filter(|(a, b)| a == b || are_synonyms(a, b))
        .count();
    let synonym = matches as f64 / comparisons as f64;

    0.7 * direct + 0.3 * synonym
}

/// Structural features of a search query string
#[derive(Debug, PartialEq)]
struct QueryFeatures {
    has_quoted_phrase: bool,
    has_site_operator: bool,
    has_boolean_operator: bool,
    has_exclusion: bool,
    word_count: usize,
    has_advanced_operator: bool,
}

fn extract_features(s: &str) -> QueryFeatures {
    let has_quoted_phrase = s.matches('"').count() >= 2;
    let lower = s.to_lowercase();
    let has_site_operator = lower.contains("site:") || lower.contains("filetype:");
    let has_boolean_operator = s
        .split_whitespace()
        .any(|w| w == "AND" || w == "OR" || w == "NOT");
    let has_exclusion = s
        .split_whitespace()
        .any(|w| w.len() > 1 && w.starts_with('-'));
    let word_count = s.split_whitespace().count();
    let has_advanced_operator =
        has_quoted_phrase || has_site_operator || has_boolean_operator || has_exclusion;
    QueryFeatures {
        has_quoted_phrase,
        has_site_operator,
        has_boolean_operator,
        has_exclusion,
        word_count,
        has_advanced_operator,
    }
}

/// Feature-by-feature equality ratio of the two queries' structure
fn structural_similarity(a: &str, b: &str) -> f64 {
    let fa = extract_features(a);
    let fb = extract_features(b);
    let checks = [
        fa.has_quoted_phrase == fb.has_quoted_phrase,
        fa.has_site_operator == fb.has_site_operator,
        fa.has_boolean_operator == fb.has_boolean_operator,
        fa.has_exclusion == fb.has_exclusion,
        fa.word_count == fb.word_count,
        fa.has_advanced_operator == fb.has_advanced_operator,
    ];
    checks.iter().filter(|m| **m).count() as f64 / checks.len() as f64
}

/// Semantic similarity: 0.6 keyword + 0.4 structural, with an exact
/// short-circuit after normalization so identical queries score 1.0.
fn semantic_similarity(a: &str, b: &str) -> f64 {
    if normalize(a) == normalize(b) {
        return 1.0;
    }
    let kw = keyword_similarity(&keywords(a), &keywords(b));
    0.6 * kw + 0.4 * structural_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const METHODS: [SimilarityMethod; 3] = [
        SimilarityMethod::Exact,
        SimilarityMethod::Semantic,
        SimilarityMethod::Hybrid,
    ];

    #[test]
    fn identity_is_one_for_every_method() {
        for s in ["AI reporters", "", "site:example.com \"tech news\" -spam"] {
            for method in METHODS {
                assert_eq!(similarity(s, s, method), 1.0, "{method:?} on {s:?}");
            }
        }
    }

    #[test]
    fn exact_is_symmetric() {
        let pairs = [
            ("AI journalist", "tech reporter"),
            ("climate change news", "climate reporters"),
            ("", "something"),
        ];
        for (a, b) in pairs {
            assert_eq!(
                similarity(a, b, SimilarityMethod::Exact),
                similarity(b, a, SimilarityMethod::Exact)
            );
        }
    }

    #[test]
    fn normalization_equates_case_and_whitespace() {
        assert_eq!(
            similarity("AI journalist", "ai  journalist", SimilarityMethod::Exact),
            1.0
        );
        assert_eq!(
            similarity("tech-news reporters", "tech news reporters", SimilarityMethod::Exact),
            1.0
        );
    }

    #[test]
    fn results_stay_in_unit_interval() {
        let samples = [
            "AI reporters",
            "site:nytimes.com climate",
            "\"exact phrase\" -exclude",
            "completely unrelated gardening tips",
            "",
        ];
        for a in samples {
            for b in samples {
                for method in METHODS {
                    let s = similarity(a, b, method);
                    assert!((0.0..=1.0).contains(&s), "{method:?}({a:?},{b:?}) = {s}");
                }
            }
        }
    }

    #[test]
    fn synonyms_raise_semantic_score() {
        let with_synonym = similarity(
            "technology journalist contacts",
            "technology reporter contacts",
            SimilarityMethod::Semantic,
        );
        let without = similarity(
            "technology journalist contacts",
            "technology gardener contacts",
            SimilarityMethod::Semantic,
        );
        assert!(with_synonym > without);
    }

    #[test]
    fn structural_features_detected() {
        let f = extract_features("site:example.com \"machine learning\" -jobs AND news");
        assert!(f.has_quoted_phrase);
        assert!(f.has_site_operator);
        assert!(f.has_boolean_operator);
        assert!(f.has_exclusion);
        assert!(f.has_advanced_operator);

        let plain = extract_features("machine learning news");
        assert!(!plain.has_advanced_operator);
        assert_eq!(plain.word_count, 3);
    }

    #[test]
    fn empty_keyword_sets() {
        // Both empty after stop-word filtering
        assert_eq!(keyword_similarity(&[], &[]), 1.0);
        assert_eq!(keyword_similarity(&["news".to_string()], &[]), 0.0);
    }

    #[test]
    fn hybrid_is_mean_of_exact_and_semantic() {
        let a = "AI journalist contacts";
        let b = "machine learning reporters";
        let expected = (similarity(a, b, SimilarityMethod::Exact)
            + similarity(a, b, SimilarityMethod::Semantic))
            / 2.0;
        assert!((similarity(a, b, SimilarityMethod::Hybrid) - expected).abs() < 1e-12);
    }
}
