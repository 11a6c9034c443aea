//! Validated, immutable fusion configuration.

use std::time::Duration;

use rankfuse_core::{FusionError, FusionMethod, FusionSettings, Result};

use crate::normalize::RankDecay;
use crate::weights::resolve_weights;

/// Configuration for one or more fusion calls over a fixed set of retrievers.
///
/// Built once from [`FusionSettings`] and a retriever count; every field is
/// validated at construction so a fusion call never starts with bad input.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    method: FusionMethod,
    k: usize,
    c: f64,
    weights: Vec<f64>,
    partial_failure_tolerant: bool,
    rank_decay: RankDecay,
    timeout: Option<Duration>,
}

impl FusionConfig {
    /// Validate settings for `retriever_count` retrievers.
    pub fn from_settings(settings: &FusionSettings, retriever_count: usize) -> Result<Self> {
        if settings.k == 0 {
            return Err(FusionError::configuration("k must be at least 1"));
        }
        if !settings.c.is_finite() || settings.c <= 0.0 {
            return Err(FusionError::configuration(format!(
                "RRF constant c must be positive, got {}",
                settings.c
            )));
        }
        if settings.timeout_ms == Some(0) {
            return Err(FusionError::configuration("timeout_ms must be positive"));
        }

        let weights = resolve_weights(settings.weights.as_deref(), retriever_count)?;
        let rank_decay = RankDecay::from_settings(&settings.rank_decay)?;

        Ok(Self {
            method: settings.method,
            k: settings.k,
            c: settings.c,
            weights,
            partial_failure_tolerant: settings.partial_failure_tolerant,
            rank_decay,
            timeout: settings.timeout_ms.map(Duration::from_millis),
        })
    }

    /// Default RRF configuration.
    pub fn rrf(retriever_count: usize) -> Result<Self> {
        Self::from_settings(&FusionSettings::default(), retriever_count)
    }

    /// Convex combination with optional weights (uniform when `None`).
    pub fn convex(retriever_count: usize, weights: Option<Vec<f64>>) -> Result<Self> {
        let settings = FusionSettings {
            method: FusionMethod::Cc,
            weights,
            ..FusionSettings::default()
        };
        Self::from_settings(&settings, retriever_count)
    }

    /// Same configuration with a different result count.
    pub fn with_k(mut self, k: usize) -> Result<Self> {
        if k == 0 {
            return Err(FusionError::configuration("k must be at least 1"));
        }
        self.k = k;
        Ok(self)
    }

    /// Same configuration with a different method.
    pub fn with_method(mut self, method: FusionMethod) -> Self {
        self.method = method;
        self
    }

    /// Same configuration with failing retrievers tolerated (or not).
    pub fn with_partial_failure_tolerance(mut self, tolerant: bool) -> Self {
        self.partial_failure_tolerant = tolerant;
        self
    }

    /// Same configuration with an overall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(FusionError::configuration("timeout must be positive"));
        }
        self.timeout = Some(timeout);
        Ok(self)
    }

    pub fn method(&self) -> FusionMethod {
        self.method
    }

    /// Maximum number of fused results.
    pub fn k(&self) -> usize {
        self.k
    }

    /// RRF constant.
    pub fn c(&self) -> f64 {
        self.c
    }

    /// Normalized weights, one per retriever, summing to 1.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of retrievers this configuration was validated for.
    pub fn retriever_count(&self) -> usize {
        self.weights.len()
    }

    pub fn partial_failure_tolerant(&self) -> bool {
        self.partial_failure_tolerant
    }

    pub fn rank_decay(&self) -> &RankDecay {
        &self.rank_decay
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
