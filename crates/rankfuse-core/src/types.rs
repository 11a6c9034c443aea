//! Core domain types for rank fusion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key carrying a retriever-assigned or fused relevance score.
pub const SCORE_KEY: &str = "score";

/// Fusion strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionMethod {
    /// Reciprocal Rank Fusion: sums `1 / (c + rank)` across lists.
    #[default]
    Rrf,
    /// Convex Combination: weighted sum of normalized scores.
    Cc,
}

impl FusionMethod {
    /// Parse a method name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "rrf" | "reciprocal_rank_fusion" => Some(Self::Rrf),
            "cc" | "convex_combination" => Some(Self::Cc),
            _ => None,
        }
    }
}

impl std::str::FromStr for FusionMethod {
    type Err = crate::error::FusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            crate::error::FusionError::configuration(format!(
                "unknown fusion method '{}' (expected 'rrf' or 'cc')",
                s
            ))
        })
    }
}

impl std::fmt::Display for FusionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Rrf => "rrf",
            Self::Cc => "cc",
        };
        write!(f, "{}", s)
    }
}

/// Content-derived document identity (blake3 hash of the content bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(#[serde(with = "serde_hash")] [u8; 32]);

impl DocumentId {
    /// Derive the identity of a piece of content.
    pub fn from_content(content: &str) -> Self {
        Self(*blake3::hash(content.as_bytes()).as_bytes())
    }

    /// Raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Abbreviated hex form for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A retrievable unit of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Opaque text payload.
    pub content: String,

    /// Retriever-provided metadata, optionally including a numeric `score`.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    /// Create a document with empty metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Builder-style setter for the `score` metadata field.
    pub fn with_score(mut self, score: f64) -> Self {
        self.set_score(score);
        self
    }

    /// Builder-style setter for an arbitrary metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Identity used for deduplication across retrievers.
    pub fn id(&self) -> DocumentId {
        DocumentId::from_content(&self.content)
    }

    /// The retriever-assigned score, if present, numeric and finite.
    pub fn score(&self) -> Option<f64> {
        self.metadata
            .get(SCORE_KEY)
            .and_then(serde_json::Value::as_f64)
            .filter(|s| s.is_finite())
    }

    /// Overwrite the `score` metadata field.
    ///
    /// Non-finite values cannot be represented in JSON and are stored as null.
    pub fn set_score(&mut self, score: f64) {
        let value = serde_json::Number::from_f64(score)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
        self.metadata.insert(SCORE_KEY.to_string(), value);
    }
}

/// An ordered list of documents returned by one retriever for one query.
///
/// Position (1-based) is the retriever's ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedList {
    documents: Vec<Document>,
}

impl RankedList {
    /// Create a ranked list, preserving the given order.
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// An empty list.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents in rank order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Iterate `(rank, document)` pairs with 1-based ranks.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &Document)> {
        self.documents.iter().enumerate().map(|(i, d)| (i + 1, d))
    }

    /// Whether every document carries a usable score.
    pub fn fully_scored(&self) -> bool {
        self.documents.iter().all(|d| d.score().is_some())
    }
}

impl From<Vec<Document>> for RankedList {
    fn from(documents: Vec<Document>) -> Self {
        Self::new(documents)
    }
}

impl FromIterator<Document> for RankedList {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A fused document with its final rank and score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedDocument {
    /// Result rank (1-indexed).
    pub rank: u32,

    /// Fused score (higher is better).
    pub score: f64,

    /// Representative document; its metadata `score` holds the fused score.
    pub document: Document,
}

/// Output of one fusion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionResult {
    /// The original query.
    pub query: String,

    /// Method used to combine the lists.
    pub method: FusionMethod,

    /// Total results returned.
    pub total_results: usize,

    /// Fusion latency in milliseconds (including retriever calls).
    pub latency_ms: u64,

    /// Retrievers whose failures were tolerated and treated as empty lists.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_retrievers: Vec<String>,

    /// Fused results, best first.
    pub results: Vec<FusedDocument>,
}

impl FusionResult {
    /// Documents in fused order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.results.iter().map(|r| &r.document)
    }

    /// Fused scores in order.
    pub fn scores(&self) -> Vec<f64> {
        self.results.iter().map(|r| r.score).collect()
    }
}

/// One retriever's share of a document's fused score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreContribution {
    /// Name of the retriever that returned the document.
    pub retriever: String,

    /// Rank of the document in that retriever's list (1-based).
    pub rank: usize,

    /// Score the retriever reported, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_score: Option<f64>,

    /// Normalized score (convex combination only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_score: Option<f64>,

    /// Weight applied (convex combination only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    /// Amount added to the fused score.
    pub contribution: f64,
}

/// A fused document together with the contributions that produced its score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainedDocument {
    /// Result rank (1-indexed).
    pub rank: u32,

    /// Fused score.
    pub score: f64,

    /// Content-derived identity.
    pub id: DocumentId,

    /// Representative document.
    pub document: Document,

    /// Per-retriever contributions in accumulation order.
    pub contributions: Vec<ScoreContribution>,
}

/// Diagnostic view of a fusion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// The original query.
    pub query: String,

    /// Method used to combine the lists.
    pub method: FusionMethod,

    /// Retriever names in call order.
    pub retrievers: Vec<String>,

    /// Resolved weights (convex combination only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,

    /// Retrievers whose failures were tolerated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_retrievers: Vec<String>,

    /// Explained results, best first.
    pub results: Vec<ExplainedDocument>,
}

/// Hex (de)serialization for 32-byte hashes.
mod serde_hash {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        hex::encode(value).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        let bytes = hex::decode(&hex).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("invalid hash length"))
    }
}
