// src/matching/similarity.rs
// Edit-distance based similarity metrics. All metrics lower-case both sides
// and report an integer percentage (0-100).

use rapidfuzz::fuzz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityStrategy {
    /// Tokens sorted alphabetically on both sides, then `Ratio`.
    TokenSort,
    /// Best `Ratio` of the shorter string against an equally long window of
    /// the longer one.
    Partial,
    /// Indel ratio of the full strings.
    Ratio,
}

impl SimilarityStrategy {
    pub const CANONICAL: [SimilarityStrategy; 3] = [
        SimilarityStrategy::TokenSort,
        SimilarityStrategy::Partial,
        SimilarityStrategy::Ratio,
    ];

    pub fn score(&self, term: &str, reference: &str) -> u8 {
        match self {
            SimilarityStrategy::TokenSort => token_sort_ratio(term, reference),
            SimilarityStrategy::Partial => partial_ratio(term, reference),
            SimilarityStrategy::Ratio => ratio(term, reference),
        }
    }
}

/// Scores a term against reference text with the best of several alignment
/// strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityScorer {
    strategies: BTreeSet<SimilarityStrategy>,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(SimilarityStrategy::CANONICAL)
    }
}

impl SimilarityScorer {
    pub fn new(strategies: impl IntoIterator<Item = SimilarityStrategy>) -> Self {
        Self {
            strategies: strategies.into_iter().collect(),
        }
    }

    /// Maximum percentage over the configured strategies. Empty reference text
    /// scores 0.
    pub fn score_percent(&self, term: &str, reference: &str) -> u8 {
        if reference.trim().is_empty() || term.trim().is_empty() {
            return 0;
        }
        self.strategies
            .iter()
            .map(|strategy| strategy.score(term, reference))
            .max()
            .unwrap_or(0)
    }

    /// Normalized score in [0, 1].
    pub fn score(&self, term: &str, reference: &str) -> f64 {
        f64::from(self.score_percent(term, reference)) / 100.0
    }
}

fn to_percent(similarity: f64) -> u8 {
    (similarity.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Indel ratio of two character sequences, 2 * LCS / (|a| + |b|).
fn indel_ratio(a: &[char], b: &[char]) -> f64 {
    fuzz::ratio(a.iter().copied(), b.iter().copied())
}

pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    to_percent(indel_ratio(&a, &b))
}

/// Best `ratio` of the shorter string against every equally long window of
/// the longer one.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if shorter.is_empty() {
        return 0;
    }
    if longer.contains(&shorter) {
        return 100;
    }

    let short: Vec<char> = shorter.chars().collect();
    let long: Vec<char> = longer.chars().collect();
    let best = long
        .windows(short.len())
        .map(|window| indel_ratio(&short, window))
        .fold(0.0f64, f64::max);
    to_percent(best)
}

fn sorted_tokens(s: &str) -> String {
    let cleaned: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    let a = sorted_tokens(a);
    let b = sorted_tokens(b);
    ratio(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_identity_and_disjoint() {
        assert_eq!(ratio("hypertension", "Hypertension"), 100);
        assert_eq!(ratio("abc", "xyz"), 0);
        assert_eq!(ratio("", "anything"), 0);
        // LCS("office visit", "office visits") = 12 -> 24 / 25
        assert_eq!(ratio("office visit", "office visits"), 96);
    }

    #[test]
    fn test_partial_ratio_finds_fragment() {
        assert_eq!(partial_ratio("hypertension", "essential (primary) hypertension"), 100);
        assert_eq!(partial_ratio("essential (primary) hypertension", "hypertension"), 100);
        assert!(partial_ratio("hypertensoin", "essential (primary) hypertension") >= 80);
        assert!(partial_ratio("gallstones", "calculus of gallbladder without obstruction") < 90);
    }

    #[test]
    fn test_partial_ratio_scans_every_window() {
        // "bronchitis" sits mid-word; LCS "ronchiti" = 8 -> 16 / 20
        assert_eq!(partial_ratio("pronchitiz", "acute tracheobronchitis, unspecified"), 80);
        // Best window "abcdefg" shares "bcdef" -> 10 / 14
        assert_eq!(partial_ratio("zbcdefz", "qqqqabcdefgqqqq"), 71);

        let exhaustive = |short: &str, long: &str| {
            let short: Vec<char> = short.chars().collect();
            let long: Vec<char> = long.chars().collect();
            long.windows(short.len())
                .map(|w| ratio(&short.iter().collect::<String>(), &w.iter().collect::<String>()))
                .max()
                .unwrap_or(0)
        };
        for (term, reference) in [
            ("hypertensoin", "essential (primary) hypertension"),
            ("cholecystits", "calculus of gallbladder with acute cholecystitis"),
            ("ekg", "electrocardiogram, routine ecg with at least 12 leads"),
        ] {
            assert_eq!(partial_ratio(term, reference), exhaustive(term, reference));
        }
    }

    #[test]
    fn test_token_sort_ignores_word_order_and_punctuation() {
        assert_eq!(token_sort_ratio("pain chest", "Chest pain"), 100);
        assert_eq!(token_sort_ratio("heart failure, congestive", "congestive heart failure"), 100);
        assert!(token_sort_ratio("chest pain", "pain in throat") < 75);
    }

    #[test]
    fn test_scorer_takes_best_strategy() {
        let scorer = SimilarityScorer::default();
        let reference = "essential (primary) hypertension";
        // Only the partial alignment sees a perfect fragment.
        assert!(ratio("hypertension", reference) < 100);
        assert!(token_sort_ratio("hypertension", reference) < 100);
        assert_eq!(scorer.score_percent("hypertension", reference), 100);
        assert_eq!(scorer.score("hypertension", reference), 1.0);

        let ratio_only = SimilarityScorer::new([SimilarityStrategy::Ratio]);
        assert!(ratio_only.score("hypertension", reference) < 1.0);
    }

    #[test]
    fn test_scorer_skips_empty_reference() {
        let scorer = SimilarityScorer::default();
        assert_eq!(scorer.score("hypertension", ""), 0.0);
        assert_eq!(scorer.score("hypertension", "   "), 0.0);
    }

    #[test]
    fn test_scores_are_bounded() {
        let scorer = SimilarityScorer::default();
        for (a, b) in [
            ("ekg", "electrocardiogram, routine ecg with at least 12 leads"),
            ("office visit", "office or other outpatient visit for the evaluation and management"),
            ("x", "y"),
        ] {
            let s = scorer.score(a, b);
            assert!((0.0..=1.0).contains(&s), "{} vs {} -> {}", a, b, s);
        }
    }
}
