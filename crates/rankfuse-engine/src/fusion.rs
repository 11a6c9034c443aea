//! Rank fusion algorithms: Reciprocal Rank Fusion and Convex Combination.

use rankfuse_core::RankedList;

use crate::accumulator::{Contribution, ScoreAccumulator};
use crate::normalize::{normalize_scores, RankDecay};

/// RRF constant (commonly 60).
/// Higher values flatten the difference between top and lower ranks.
pub const DEFAULT_RRF_C: f64 = 60.0;

/// Fuse ranked lists using Reciprocal Rank Fusion.
///
/// RRF score = Σ (1 / (c + rank_i)) over every list containing the document,
/// with 1-based ranks. Documents returned by several lists accumulate the sum.
///
/// # Arguments
/// * `lists` - One ranked list per retriever, in retriever order
/// * `c` - RRF constant, must be positive
pub fn reciprocal_rank_fusion(lists: &[RankedList], c: f64) -> ScoreAccumulator {
    let mut acc = ScoreAccumulator::new();

    for (retriever, list) in lists.iter().enumerate() {
        for (rank, doc) in list.ranked() {
            let value = 1.0 / (c + rank as f64);
            acc.add(
                doc,
                Contribution {
                    retriever,
                    rank,
                    raw_score: doc.score(),
                    normalized: None,
                    weight: None,
                    value,
                },
            );
        }
    }

    acc
}

/// Fuse ranked lists using a convex combination of normalized scores.
///
/// CC score = Σ (w_i * norm_i(d)), where `norm_i` is the positional score from
/// [`normalize_scores`] and the weights sum to 1.
///
/// # Arguments
/// * `lists` - One ranked list per retriever, in retriever order
/// * `weights` - Resolved weights, one per list
/// * `decay` - Rank-based fallback for lists without scores
pub fn convex_combination(
    lists: &[RankedList],
    weights: &[f64],
    decay: &RankDecay,
) -> ScoreAccumulator {
    debug_assert_eq!(lists.len(), weights.len());
    let mut acc = ScoreAccumulator::new();

    for (retriever, (list, &weight)) in lists.iter().zip(weights).enumerate() {
        let normalized = normalize_scores(list, decay);

        for ((rank, doc), score) in list.ranked().zip(normalized.scores) {
            acc.add(
                doc,
                Contribution {
                    retriever,
                    rank,
                    raw_score: doc.score(),
                    normalized: Some(score),
                    weight: Some(weight),
                    value: weight * score,
                },
            );
        }
    }

    acc
}
