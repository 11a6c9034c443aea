//! Score normalization for convex combination.
//!
//! Retrievers report scores on unrelated scales (BM25, cosine similarity,
//! distances turned into similarities). Before they can be mixed, each list is
//! mapped into [0, 1]: min-max scaling when every document has a score, and a
//! rank-based linear decay otherwise.

use rankfuse_core::{FusionError, RankDecaySettings, RankedList, Result};

/// Rank-based score synthesis: rank r gets `max(1 - (r - 1) * step, floor)`.
///
/// `floor` is strictly positive so a retriever's presence in the sum never
/// vanishes entirely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankDecay {
    step: f64,
    floor: f64,
}

impl RankDecay {
    /// Create a validated decay policy.
    pub fn new(step: f64, floor: f64) -> Result<Self> {
        if !step.is_finite() || step < 0.0 {
            return Err(FusionError::configuration(format!(
                "rank decay step must be a non-negative number, got {}",
                step
            )));
        }
        if !floor.is_finite() || floor <= 0.0 || floor > 1.0 {
            return Err(FusionError::configuration(format!(
                "rank decay floor must be in (0, 1], got {}",
                floor
            )));
        }
        Ok(Self { step, floor })
    }

    /// Build from file/CLI settings.
    pub fn from_settings(settings: &RankDecaySettings) -> Result<Self> {
        Self::new(settings.step, settings.floor)
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Synthesized score for a 1-based rank.
    pub fn score(&self, rank: usize) -> f64 {
        let decayed = 1.0 - rank.saturating_sub(1) as f64 * self.step;
        decayed.max(self.floor)
    }
}

impl Default for RankDecay {
    fn default() -> Self {
        Self {
            step: 0.1,
            floor: 0.1,
        }
    }
}

/// Where a list's normalized scores came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    /// Min-max scaling of retriever scores.
    MinMax,
    /// All retriever scores were equal; each document got `1 / n`.
    Uniform,
    /// At least one document lacked a score; scores were synthesized from rank
    /// for the whole list, discarding any explicit scores it did carry.
    RankDecay,
}

/// Positional scores for one ranked list.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedScores {
    pub scores: Vec<f64>,
    pub source: ScoreSource,
}

/// Normalize a ranked list into scores aligned with its documents.
pub fn normalize_scores(list: &RankedList, decay: &RankDecay) -> NormalizedScores {
    let raw: Option<Vec<f64>> = list.documents().iter().map(|d| d.score()).collect();

    match raw {
        Some(scores) => {
            let source = if is_degenerate(&scores) {
                ScoreSource::Uniform
            } else {
                ScoreSource::MinMax
            };
            NormalizedScores {
                scores: min_max(&scores),
                source,
            }
        }
        None => NormalizedScores {
            scores: list.ranked().map(|(rank, _)| decay.score(rank)).collect(),
            source: ScoreSource::RankDecay,
        },
    }
}

/// Min-max scale into [0, 1]. A list whose scores are all equal maps to `1 / n`.
pub fn min_max(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max == min {
        let uniform = 1.0 / scores.len() as f64;
        return vec![uniform; scores.len()];
    }

    let range = max - min;
    if range.is_finite() {
        return scores.iter().map(|s| (s - min) / range).collect();
    }

    // Spread wider than f64::MAX: halve both sides so the subtraction stays finite.
    let half_range = max / 2.0 - min / 2.0;
    scores
        .iter()
        .map(|s| (s / 2.0 - min / 2.0) / half_range)
        .collect()
}

fn is_degenerate(scores: &[f64]) -> bool {
    scores.windows(2).all(|w| w[0] == w[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rankfuse_core::Document;

    fn scored(scores: &[f64]) -> RankedList {
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| Document::new(format!("doc-{}", i)).with_score(*s))
            .collect()
    }

    fn unscored(n: usize) -> RankedList {
        (0..n).map(|i| Document::new(format!("doc-{}", i))).collect()
    }

    #[test]
    fn test_min_max_scaling() {
        let out = normalize_scores(&scored(&[12.0, 8.0, 4.0]), &RankDecay::default());
        assert_eq!(out.source, ScoreSource::MinMax);
        assert_eq!(out.scores, vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = min_max(&[0.0, 0.25, 1.0, 0.6]);
        assert_eq!(once, vec![0.0, 0.25, 1.0, 0.6]);
        assert_eq!(min_max(&once), once);
    }

    #[test]
    fn test_min_max_extreme_spread_stays_in_range() {
        let out = min_max(&[f64::MAX, 0.0, -f64::MAX]);
        assert_eq!(out, vec![1.0, 0.5, 0.0]);
        assert!(out.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_equal_scores_distribute_uniformly() {
        let out = normalize_scores(&scored(&[0.7, 0.7, 0.7, 0.7]), &RankDecay::default());
        assert_eq!(out.source, ScoreSource::Uniform);
        assert_eq!(out.scores, vec![0.25; 4]);
    }

    #[test]
    fn test_single_document_gets_full_share() {
        let out = normalize_scores(&scored(&[3.2]), &RankDecay::default());
        assert_eq!(out.scores, vec![1.0]);
    }

    #[test]
    fn test_empty_list() {
        let out = normalize_scores(&RankedList::empty(), &RankDecay::default());
        assert!(out.scores.is_empty());
    }

    #[test]
    fn test_rank_decay_without_scores() {
        let out = normalize_scores(&unscored(12), &RankDecay::default());
        assert_eq!(out.source, ScoreSource::RankDecay);
        assert!((out.scores[0] - 1.0).abs() < 1e-12);
        assert!((out.scores[1] - 0.9).abs() < 1e-12);
        assert!((out.scores[4] - 0.6).abs() < 1e-12);
        // Floor reached from rank 10 on, never zero.
        assert!((out.scores[9] - 0.1).abs() < 1e-12);
        assert!((out.scores[11] - 0.1).abs() < 1e-12);
        assert!(out.scores.iter().all(|s| *s > 0.0 && *s <= 1.0));
    }

    #[test]
    fn test_partially_scored_list_falls_back_to_rank() {
        let list: RankedList = vec![
            Document::new("a").with_score(5.0),
            Document::new("b"),
            Document::new("c").with_score(1.0),
        ]
        .into();
        let out = normalize_scores(&list, &RankDecay::default());
        assert_eq!(out.source, ScoreSource::RankDecay);
        assert_eq!(out.scores.len(), 3);
    }

    #[test]
    fn test_custom_decay() {
        let decay = RankDecay::new(0.25, 0.2).unwrap();
        assert_eq!(decay.score(1), 1.0);
        assert_eq!(decay.score(2), 0.75);
        assert_eq!(decay.score(4), 0.25);
        assert_eq!(decay.score(5), 0.2);
    }

    #[test]
    fn test_decay_validation() {
        assert!(RankDecay::new(-0.1, 0.1).is_err());
        assert!(RankDecay::new(0.1, 0.0).is_err());
        assert!(RankDecay::new(0.1, 1.5).is_err());
        assert!(RankDecay::new(f64::NAN, 0.1).is_err());
        assert!(RankDecay::new(0.0, 1.0).is_ok());
    }
}
