//! rankfuse-engine - Rank fusion engine
//!
//! This crate merges ranked lists from independent retrievers (lexical,
//! vector, hybrid) into one ranking.
//!
//! # Features
//!
//! - Reciprocal Rank Fusion (RRF), robust to unrelated score scales
//! - Convex Combination (CC) of min-max normalized scores with weights
//! - Content-hash deduplication with deterministic tie-breaking
//! - Concurrent retriever calls with cancellation, timeout and optional
//!   partial-failure tolerance
//! - Score breakdowns explaining every fused score
//!
//! # Example
//!
//! ```rust,ignore
//! use rankfuse_engine::{FusionConfig, FusionEngine, StaticRetriever};
//!
//! let engine = FusionEngine::new(vec![])
//!     .with_retriever(bm25)
//!     .with_retriever(dense);
//! let config = FusionConfig::rrf(engine.len())?;
//! let results = engine.fuse("error handling", &config).await?;
//! ```

mod accumulator;
mod config;
mod engine;
mod fusion;
mod normalize;
mod retriever;
mod weights;

pub use accumulator::{Accumulated, Contribution, ScoreAccumulator};
pub use config::FusionConfig;
pub use engine::FusionEngine;
pub use fusion::{convex_combination, reciprocal_rank_fusion, DEFAULT_RRF_C};
pub use normalize::{min_max, normalize_scores, NormalizedScores, RankDecay, ScoreSource};
pub use retriever::StaticRetriever;
pub use weights::resolve_weights;

// Re-export for convenience
pub use rankfuse_core::{
    Document, FusionError, FusionMethod, FusionResult, FusionSettings, RankedList, Result,
    Retriever, ScoreBreakdown,
};
pub use tokio_util::sync::CancellationToken;
