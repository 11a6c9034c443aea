//! Retriever weight resolution for convex combination.

use rankfuse_core::{FusionError, Result};

/// Resolve the final weight vector for `retriever_count` retrievers.
///
/// Absent weights become uniform `1 / n`. Supplied weights must match the
/// retriever count, be finite and non-negative, and have a positive sum; they
/// are divided by that sum so the result sums to 1.
pub fn resolve_weights(weights: Option<&[f64]>, retriever_count: usize) -> Result<Vec<f64>> {
    if retriever_count == 0 {
        return Err(FusionError::configuration(
            "at least one retriever is required",
        ));
    }

    let Some(weights) = weights else {
        return Ok(vec![1.0 / retriever_count as f64; retriever_count]);
    };

    if weights.len() != retriever_count {
        return Err(FusionError::configuration(format!(
            "weights length ({}) does not match retriever count ({})",
            weights.len(),
            retriever_count
        )));
    }

    if let Some((i, w)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
        return Err(FusionError::configuration(format!(
            "weight {} must be a non-negative number, got {}",
            i, w
        )));
    }

    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(FusionError::configuration("weights must not sum to zero"));
    }
    if total.is_finite() {
        return Ok(weights.iter().map(|w| w / total).collect());
    }

    // The sum overflowed: scale by the largest weight first.
    let largest = weights.iter().copied().fold(0.0, f64::max);
    let scaled: Vec<f64> = weights.iter().map(|w| w / largest).collect();
    let total: f64 = scaled.iter().sum();
    Ok(scaled.iter().map(|w| w / total).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(weights: &[f64]) -> f64 {
        weights.iter().sum()
    }

    #[test]
    fn test_uniform_default() {
        let weights = resolve_weights(None, 4).unwrap();
        assert_eq!(weights, vec![0.25; 4]);
    }

    #[test]
    fn test_normalizes_to_unit_sum() {
        let weights = resolve_weights(Some(&[3.0, 1.0]), 2).unwrap();
        assert_eq!(weights, vec![0.75, 0.25]);

        let weights = resolve_weights(Some(&[0.2, 0.3, 0.9]), 3).unwrap();
        assert!((sum(&weights) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_is_allowed() {
        let weights = resolve_weights(Some(&[1.0, 0.0]), 2).unwrap();
        assert_eq!(weights, vec![1.0, 0.0]);
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = resolve_weights(Some(&[0.5, 0.5]), 3).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("retriever count"));
    }

    #[test]
    fn test_rejects_negative_and_non_finite() {
        assert!(resolve_weights(Some(&[0.5, -0.1]), 2).is_err());
        assert!(resolve_weights(Some(&[f64::NAN, 1.0]), 2).is_err());
        assert!(resolve_weights(Some(&[f64::INFINITY, 1.0]), 2).is_err());
    }

    #[test]
    fn test_rejects_zero_sum() {
        let err = resolve_weights(Some(&[0.0, 0.0]), 2).unwrap_err();
        assert!(err.to_string().contains("zero"));
    }

    #[test]
    fn test_huge_weights_still_sum_to_one() {
        let weights = resolve_weights(Some(&[f64::MAX, f64::MAX]), 2).unwrap();
        assert_eq!(weights, vec![0.5, 0.5]);

        let weights = resolve_weights(Some(&[f64::MAX, f64::MAX / 4.0, 0.0]), 3).unwrap();
        assert!((sum(&weights) - 1.0).abs() < 1e-9);
        assert!((weights[0] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_no_retrievers() {
        assert!(resolve_weights(None, 0).is_err());
    }
}
