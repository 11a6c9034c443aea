//! Insertion-ordered score accumulation shared by both fusion methods.

use std::collections::HashMap;

use rankfuse_core::{Document, DocumentId};

/// One list's share of a document's fused score.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    /// Index of the retriever (call order).
    pub retriever: usize,

    /// 1-based rank within that retriever's list.
    pub rank: usize,

    /// Score reported by the retriever, if any.
    pub raw_score: Option<f64>,

    /// Normalized score (convex combination only).
    pub normalized: Option<f64>,

    /// Weight applied (convex combination only).
    pub weight: Option<f64>,

    /// Value added to the running total.
    pub value: f64,
}

/// A deduplicated document with its running score.
#[derive(Debug, Clone)]
pub struct Accumulated {
    pub id: DocumentId,

    /// First document seen with this identity.
    pub document: Document,

    pub score: f64,

    pub contributions: Vec<Contribution>,
}

/// Map from document identity to accumulated score that remembers first-insertion order.
#[derive(Debug, Default)]
pub struct ScoreAccumulator {
    index: HashMap<DocumentId, usize>,
    entries: Vec<Accumulated>,
}

impl ScoreAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contribution for `document`.
    ///
    /// The first document seen for an identity stays the representative; later
    /// encounters only add to the score.
    pub fn add(&mut self, document: &Document, contribution: Contribution) {
        let id = document.id();
        match self.index.get(&id) {
            Some(&slot) => {
                let entry = &mut self.entries[slot];
                entry.score += contribution.value;
                entry.contributions.push(contribution);
            }
            None => {
                self.index.insert(id, self.entries.len());
                self.entries.push(Accumulated {
                    id,
                    document: document.clone(),
                    score: contribution.value,
                    contributions: vec![contribution],
                });
            }
        }
    }

    /// Number of distinct documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current score for an identity.
    pub fn score_of(&self, id: &DocumentId) -> Option<f64> {
        self.index.get(id).map(|&slot| self.entries[slot].score)
    }

    /// All entries sorted by score descending; equal scores keep insertion order.
    pub fn into_ranked(self) -> Vec<Accumulated> {
        let mut entries = self.entries;
        // sort_by is stable, which is what makes ties deterministic.
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        entries
    }

    /// The best `k` entries.
    pub fn top(self, k: usize) -> Vec<Accumulated> {
        let mut ranked = self.into_ranked();
        ranked.truncate(k);
        ranked
    }
}
