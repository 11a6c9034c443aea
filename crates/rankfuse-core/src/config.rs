//! File-level configuration for rankfuse.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FusionError, Result};
use crate::types::FusionMethod;

/// Main configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankfuseConfig {
    /// Fusion settings.
    #[serde(default)]
    pub fusion: FusionSettings,
}

/// Unvalidated fusion options as read from a file or command line.
///
/// Validation happens when these are resolved against a retriever count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionSettings {
    /// Fusion method.
    #[serde(default)]
    pub method: FusionMethod,

    /// Number of fused results to return.
    #[serde(default = "default_k")]
    pub k: usize,

    /// RRF constant `c`.
    #[serde(default = "default_rrf_c")]
    pub c: f64,

    /// Per-retriever weights (convex combination only). Uniform when absent.
    #[serde(default)]
    pub weights: Option<Vec<f64>>,

    /// Treat failing retrievers as empty lists instead of failing the call.
    #[serde(default)]
    pub partial_failure_tolerant: bool,

    /// Rank-based score synthesis for unscored lists.
    #[serde(default)]
    pub rank_decay: RankDecaySettings,

    /// Overall timeout for one fusion call, in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            method: FusionMethod::Rrf,
            k: default_k(),
            c: default_rrf_c(),
            weights: None,
            partial_failure_tolerant: false,
            rank_decay: RankDecaySettings::default(),
            timeout_ms: None,
        }
    }
}

/// Linear decay with a floor: rank r gets `max(1 - (r - 1) * step, floor)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankDecaySettings {
    /// Score lost per rank position.
    #[serde(default = "default_decay_step")]
    pub step: f64,

    /// Minimum synthesized score; must be strictly positive.
    #[serde(default = "default_decay_floor")]
    pub floor: f64,
}

impl Default for RankDecaySettings {
    fn default() -> Self {
        Self {
            step: default_decay_step(),
            floor: default_decay_floor(),
        }
    }
}

// Default value functions

fn default_k() -> usize {
    5
}

fn default_rrf_c() -> f64 {
    60.0
}

fn default_decay_step() -> f64 {
    0.1
}

fn default_decay_floor() -> f64 {
    0.1
}

impl RankfuseConfig {
    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| FusionError::configuration(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rankfuse").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        let local_config = PathBuf::from("rankfuse.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }
}
