//! Core traits defining the interfaces between components.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::RankedList;

/// A ranked-result provider (lexical index, vector store, hybrid heuristic).
///
/// Implementations receive only the query and must not depend on shared mutable
/// state; retry policy, if any, lives here rather than in the fusion engine.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Human-readable name used in logs, errors and score breakdowns.
    fn name(&self) -> &str;

    /// Produce an ordered list of documents for a query, best first.
    async fn search(&self, query: &str) -> Result<RankedList>;
}
