//! Cosine-similarity ranking.

use crate::config::SearchSettings;
use crate::models::{Candidate, Descriptor, MatchResult};
use rayon::prelude::*;
use std::time::Instant;

/// Reference relevance threshold (exclusive).
pub const DEFAULT_THRESHOLD: f32 = 0.3;

/// Reference number of results returned per query.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Ranks candidate descriptors against a query descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityMatcher {
    threshold: f32,
    max_results: usize,
}

impl SimilarityMatcher {
    /// Creates a matcher with the reference threshold and result limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Sets the minimum score a candidate must exceed.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the maximum number of ranked results.
    #[must_use]
    pub const fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Returns the threshold.
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Returns the result limit.
    #[must_use]
    pub const fn max_results(&self) -> usize {
        self.max_results
    }

    /// Cosine similarity between two descriptors.
    ///
    /// Returns 0 when either side is absent, empty, or has zero norm, and
    /// when the result is not finite. Vectors of different lengths are both
    /// cut to the shorter length starting at index 0.
    #[must_use]
    pub fn similarity(a: Option<&[f32]>, b: Option<&[f32]>) -> f32 {
        let (Some(a), Some(b)) = (a, b) else {
            return 0.0;
        };

        let len = a.len().min(b.len());
        if len == 0 {
            return 0.0;
        }
        if a.len() != b.len() {
            tracing::debug!(
                left = a.len(),
                right = b.len(),
                "Descriptor length mismatch, truncating to common prefix"
            );
        }
        let (a, b) = (&a[..len], &b[..len]);

        let (dot, norm_a, norm_b) = a.iter().zip(b).fold(
            (0.0f64, 0.0f64, 0.0f64),
            |(dot, na, nb), (&x, &y)| {
                let (x, y) = (f64::from(x), f64::from(y));
                (dot + x * y, na + x * x, nb + y * y)
            },
        );

        let denominator = norm_a.sqrt() * norm_b.sqrt();
        if denominator == 0.0 || !denominator.is_finite() {
            return 0.0;
        }

        let score = dot / denominator;
        if !score.is_finite() {
            return 0.0;
        }
        #[allow(clippy::cast_possible_truncation)]
        let score = score.clamp(-1.0, 1.0) as f32;
        score
    }

    /// Scores every indexed candidate and keeps those above the threshold,
    /// best first.
    ///
    /// Candidates without a descriptor are skipped. Scoring runs in
    /// parallel; equal scores keep their candidate order.
    #[must_use]
    pub fn score_all(&self, query: &Descriptor, candidates: &[Candidate]) -> Vec<MatchResult> {
        let start = Instant::now();
        let query = query.as_slice();

        let mut matches: Vec<MatchResult> = candidates
            .par_iter()
            .filter_map(|candidate| {
                let descriptor = candidate.descriptor.as_ref()?;
                let score = Self::similarity(Some(query), Some(descriptor.as_slice()));
                (score > self.threshold).then(|| MatchResult {
                    id: candidate.id.clone(),
                    score,
                })
            })
            .collect();

        // Stable: ties stay in candidate order.
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));

        metrics::histogram!("similarity_rank_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(
            candidates = candidates.len(),
            matched = matches.len(),
            threshold = self.threshold,
            "Scored candidates"
        );
        matches
    }

    /// Returns at most `max_results` candidates above the threshold, best
    /// first.
    #[must_use]
    pub fn rank(&self, query: &Descriptor, candidates: &[Candidate]) -> Vec<MatchResult> {
        let mut matches = self.score_all(query, candidates);
        matches.truncate(self.max_results);
        matches
    }
}

impl Default for SimilarityMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&SearchSettings> for SimilarityMatcher {
    fn from(settings: &SearchSettings) -> Self {
        Self::new()
            .with_threshold(settings.threshold)
            .with_max_results(settings.max_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim(a: &[f32], b: &[f32]) -> f32 {
        SimilarityMatcher::similarity(Some(a), Some(b))
    }

    #[test]
    fn test_cosine_similarity() {
        // Same vector
        let v1 = [1.0, 0.0, 0.0];
        assert!((sim(&v1, &v1) - 1.0).abs() < 0.001);

        // Orthogonal vectors
        let v2 = [0.0, 1.0, 0.0];
        assert!(sim(&v1, &v2).abs() < 0.001);

        // Opposite vectors
        let v3 = [-1.0, 0.0, 0.0];
        assert!((sim(&v1, &v3) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_degenerate_inputs_score_zero() {
        let v = [0.5, 0.25];
        assert!(SimilarityMatcher::similarity(None, Some(&v)).abs() < f32::EPSILON);
        assert!(SimilarityMatcher::similarity(Some(&v), None).abs() < f32::EPSILON);
        assert!(sim(&v, &[0.0, 0.0]).abs() < f32::EPSILON);
        assert!(sim(&[], &[]).abs() < f32::EPSILON);
        assert!(sim(&[f32::NAN, 1.0], &[1.0, 1.0]).abs() < f32::EPSILON);
        assert!(sim(&[f32::INFINITY, 1.0], &[1.0, 1.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn test_length_mismatch_uses_common_prefix() {
        // Prefix [1, 0] vs [1, 0] is identical; the tail of `long` is ignored.
        let long = [1.0, 0.0, 5.0, 5.0];
        let short = [1.0, 0.0];
        assert!((sim(&long, &short) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rank_filters_sorts_and_limits() {
        let query = Descriptor::new(vec![1.0, 0.0]);
        let candidates = vec![
            Candidate::new("low", Descriptor::new(vec![0.2, 1.0])),
            Candidate::new("best", Descriptor::new(vec![1.0, 0.0])),
            Candidate::unindexed("pending"),
            Candidate::new("good", Descriptor::new(vec![1.0, 0.5])),
            Candidate::new("opposite", Descriptor::new(vec![-1.0, 0.0])),
        ];

        let ranked = SimilarityMatcher::new().rank(&query, &candidates);
        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["best", "good"]);
        assert!(ranked.iter().all(|m| m.score > DEFAULT_THRESHOLD));

        let limited = SimilarityMatcher::new()
            .with_max_results(1)
            .rank(&query, &candidates);
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id.as_str(), "best");
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // cos = 0.6 for (1, 0) vs (0.6, 0.8).
        let query = Descriptor::new(vec![1.0, 0.0]);
        let candidates = vec![Candidate::new("edge", Descriptor::new(vec![0.6, 0.8]))];
        let score = sim(&[1.0, 0.0], &[0.6, 0.8]);

        let at = SimilarityMatcher::new().with_threshold(score);
        assert!(at.rank(&query, &candidates).is_empty());

        let below = SimilarityMatcher::new().with_threshold(score - 0.01);
        assert_eq!(below.rank(&query, &candidates).len(), 1);
    }

    #[test]
    fn test_ties_keep_candidate_order() {
        let query = Descriptor::new(vec![1.0, 1.0]);
        let candidates: Vec<Candidate> = (0..50)
            .map(|i| Candidate::new(format!("item-{i:02}"), Descriptor::new(vec![2.0, 2.0])))
            .collect();

        let ranked = SimilarityMatcher::new()
            .with_max_results(50)
            .rank(&query, &candidates);
        let ids: Vec<String> = ranked.iter().map(|m| m.id.to_string()).collect();
        let expected: Vec<String> = (0..50).map(|i| format!("item-{i:02}")).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_rank_empty_candidates() {
        let query = Descriptor::new(vec![1.0]);
        assert!(SimilarityMatcher::new().rank(&query, &[]).is_empty());
    }
}
