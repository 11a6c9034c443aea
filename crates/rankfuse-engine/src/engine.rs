//! Fusion engine: fans a query out to retrievers and merges their rankings.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rankfuse_core::{
    ExplainedDocument, FusedDocument, FusionError, FusionMethod, FusionResult, FusionSettings,
    RankedList, Result, Retriever, ScoreBreakdown, ScoreContribution,
};

use crate::accumulator::{Accumulated, ScoreAccumulator};
use crate::config::FusionConfig;
use crate::fusion::{convex_combination, reciprocal_rank_fusion};

/// Rank fusion engine over an ordered set of retrievers.
///
/// The engine holds no per-query state: every call allocates its own
/// accumulator, so one engine can serve concurrent queries.
pub struct FusionEngine {
    retrievers: Vec<Arc<dyn Retriever>>,
}

/// Lists gathered from every retriever for one call.
struct Collected {
    lists: Vec<RankedList>,
    failed: Vec<String>,
}

impl FusionEngine {
    /// Create an engine; retriever order is significant for tie-breaking.
    pub fn new(retrievers: Vec<Arc<dyn Retriever>>) -> Self {
        Self { retrievers }
    }

    /// Append a retriever.
    pub fn with_retriever(mut self, retriever: impl Retriever + 'static) -> Self {
        self.retrievers.push(Arc::new(retriever));
        self
    }

    /// Number of retrievers.
    pub fn len(&self) -> usize {
        self.retrievers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retrievers.is_empty()
    }

    /// Retriever names in call order.
    pub fn retriever_names(&self) -> Vec<String> {
        self.retrievers.iter().map(|r| r.name().to_string()).collect()
    }

    /// Validate settings against this engine's retrievers.
    pub fn config(&self, settings: &FusionSettings) -> Result<FusionConfig> {
        FusionConfig::from_settings(settings, self.retrievers.len())
    }

    /// Fuse the retrievers' results for `query`.
    pub async fn fuse(&self, query: &str, config: &FusionConfig) -> Result<FusionResult> {
        self.fuse_with_cancellation(query, config, CancellationToken::new())
            .await
    }

    /// Fuse with a caller-controlled cancellation token.
    ///
    /// Cancelling the token stops outstanding retriever calls and returns
    /// [`FusionError::Cancelled`]; partial results are discarded.
    pub async fn fuse_with_cancellation(
        &self,
        query: &str,
        config: &FusionConfig,
        cancel: CancellationToken,
    ) -> Result<FusionResult> {
        let start = Instant::now();
        self.check_config(config)?;

        info!("Fusing results for: {:?} ({})", query, config.method());

        let collected = self.collect(query, config, &cancel).await?;
        let ranked = combine(&collected.lists, config).top(config.k());

        let results: Vec<FusedDocument> = ranked
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let mut document = entry.document;
                document.set_score(entry.score);
                FusedDocument {
                    rank: i as u32 + 1,
                    score: entry.score,
                    document,
                }
            })
            .collect();

        let latency_ms = start.elapsed().as_millis() as u64;

        info!(
            "Fusion completed in {}ms, returned {} results",
            latency_ms,
            results.len()
        );

        Ok(FusionResult {
            query: query.to_string(),
            method: config.method(),
            total_results: results.len(),
            latency_ms,
            failed_retrievers: collected.failed,
            results,
        })
    }

    /// Same ranking as [`fuse`](Self::fuse), with each result's per-retriever
    /// contributions attached for inspection.
    pub async fn score_breakdown(
        &self,
        query: &str,
        config: &FusionConfig,
    ) -> Result<ScoreBreakdown> {
        self.score_breakdown_with_cancellation(query, config, CancellationToken::new())
            .await
    }

    /// [`score_breakdown`](Self::score_breakdown) with a caller-controlled cancellation token.
    pub async fn score_breakdown_with_cancellation(
        &self,
        query: &str,
        config: &FusionConfig,
        cancel: CancellationToken,
    ) -> Result<ScoreBreakdown> {
        self.check_config(config)?;

        let collected = self.collect(query, config, &cancel).await?;
        let ranked = combine(&collected.lists, config).top(config.k());
        let names = self.retriever_names();

        let results = ranked
            .into_iter()
            .enumerate()
            .map(|(i, entry)| explain(i, entry, &names))
            .collect();

        let weights = match config.method() {
            FusionMethod::Cc => Some(config.weights().to_vec()),
            FusionMethod::Rrf => None,
        };

        Ok(ScoreBreakdown {
            query: query.to_string(),
            method: config.method(),
            retrievers: names,
            weights,
            failed_retrievers: collected.failed,
            results,
        })
    }

    fn check_config(&self, config: &FusionConfig) -> Result<()> {
        if config.retriever_count() != self.retrievers.len() {
            return Err(FusionError::configuration(format!(
                "configuration was built for {} retrievers, engine has {}",
                config.retriever_count(),
                self.retrievers.len()
            )));
        }
        Ok(())
    }

    /// Call every retriever concurrently and gather their lists in retriever order.
    async fn collect(
        &self,
        query: &str,
        config: &FusionConfig,
        cancel: &CancellationToken,
    ) -> Result<Collected> {
        let tasks = cancel.child_token();
        // Dropping this future (e.g. under an outer timeout) must stop the spawned tasks too.
        let _guard = tasks.clone().drop_guard();

        let handles: Vec<_> = self
            .retrievers
            .iter()
            .map(|retriever| {
                let retriever = Arc::clone(retriever);
                let query = query.to_string();
                let token = tasks.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => None,
                        result = retriever.search(&query) => Some(result),
                    }
                })
            })
            .collect();

        let gathered = join_all(handles);

        let outcome = match config.timeout() {
            Some(limit) => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(FusionError::cancelled("cancelled by caller")),
                joined = tokio::time::timeout(limit, gathered) => joined.map_err(|_| {
                    FusionError::cancelled(format!("timed out after {}ms", limit.as_millis()))
                }),
            },
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(FusionError::cancelled("cancelled by caller")),
                joined = gathered => Ok(joined),
            },
        };

        let joined = match outcome {
            Ok(joined) => joined,
            Err(err) => {
                tasks.cancel();
                warn!("Fusion for {:?} aborted: {}", query, err);
                return Err(err);
            }
        };

        let mut lists = Vec::with_capacity(self.retrievers.len());
        let mut failed = Vec::new();

        for (retriever, joined) in self.retrievers.iter().zip(joined) {
            let name = retriever.name();
            let result = match joined {
                Ok(Some(result)) => result,
                // Only reachable when cancellation fires after every task joined.
                Ok(None) => return Err(FusionError::cancelled("retriever call cancelled")),
                Err(e) => Err(FusionError::retriever(name, format!("task failed: {}", e))),
            };

            match result {
                Ok(list) => {
                    debug!("Retriever '{}' returned {} results", name, list.len());
                    lists.push(list);
                }
                Err(err) if config.partial_failure_tolerant() => {
                    warn!(
                        "Retriever '{}' failed, continuing with an empty list: {}",
                        name, err
                    );
                    failed.push(name.to_string());
                    lists.push(RankedList::empty());
                }
                Err(err) => return Err(as_retriever_error(name, err)),
            }
        }

        Ok(Collected { lists, failed })
    }
}

fn combine(lists: &[RankedList], config: &FusionConfig) -> ScoreAccumulator {
    let acc = match config.method() {
        FusionMethod::Rrf => reciprocal_rank_fusion(lists, config.c()),
        FusionMethod::Cc => convex_combination(lists, config.weights(), config.rank_decay()),
    };
    debug!("Accumulated {} distinct documents", acc.len());
    acc
}

fn explain(index: usize, entry: Accumulated, names: &[String]) -> ExplainedDocument {
    let contributions = entry
        .contributions
        .into_iter()
        .map(|c| ScoreContribution {
            retriever: names.get(c.retriever).cloned().unwrap_or_default(),
            rank: c.rank,
            raw_score: c.raw_score,
            normalized_score: c.normalized,
            weight: c.weight,
            contribution: c.value,
        })
        .collect();

    let mut document = entry.document;
    document.set_score(entry.score);

    ExplainedDocument {
        rank: index as u32 + 1,
        score: entry.score,
        id: entry.id,
        document,
        contributions,
    }
}

fn as_retriever_error(name: &str, err: FusionError) -> FusionError {
    match err {
        FusionError::Retriever { .. } => err,
        other => FusionError::retriever(name, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use rankfuse_core::Document;

    use crate::retriever::StaticRetriever;

    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        fn name(&self) -> &str {
            "broken"
        }

        async fn search(&self, _query: &str) -> Result<RankedList> {
            Err(FusionError::internal("index unavailable"))
        }
    }

    struct SlowRetriever {
        delay: Duration,
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Retriever for SlowRetriever {
        fn name(&self) -> &str {
            "slow"
        }

        async fn search(&self, query: &str) -> Result<RankedList> {
            tokio::time::sleep(self.delay).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(vec![Document::new(format!("slow result for {}", query))].into())
        }
    }

    fn slow(delay: Duration) -> (SlowRetriever, Arc<AtomicBool>) {
        let finished = Arc::new(AtomicBool::new(false));
        (
            SlowRetriever {
                delay,
                finished: Arc::clone(&finished),
            },
            finished,
        )
    }

    fn docs(names: &[&str]) -> Vec<Document> {
        names.iter().map(|n| Document::new(*n)).collect()
    }

    fn scenario_engine() -> FusionEngine {
        FusionEngine::new(vec![])
            .with_retriever(StaticRetriever::new("lexical", docs(&["D1", "D2", "D3"])))
            .with_retriever(StaticRetriever::new("dense", docs(&["D2", "D4", "D1"])))
    }

    fn contents(result: &FusionResult) -> Vec<&str> {
        result.documents().map(|d| d.content.as_str()).collect()
    }

    #[tokio::test]
    async fn test_rrf_scenario() {
        let engine = scenario_engine();
        let config = FusionConfig::rrf(2).unwrap().with_k(4).unwrap();

        let result = engine.fuse("query", &config).await.unwrap();

        assert_eq!(contents(&result), vec!["D2", "D1", "D4", "D3"]);
        assert_eq!(result.total_results, 4);
        assert_eq!(result.method, FusionMethod::Rrf);
        assert_eq!(result.results[0].rank, 1);
        for fused in &result.results {
            assert_eq!(fused.document.score(), Some(fused.score));
        }
    }

    #[tokio::test]
    async fn test_inputs_are_not_mutated() {
        let lexical = StaticRetriever::new("lexical", vec![Document::new("a").with_score(7.0)]);
        let engine = FusionEngine::new(vec![]).with_retriever(lexical.clone());
        let config = FusionConfig::rrf(1).unwrap();

        let result = engine.fuse("q", &config).await.unwrap();

        assert!((result.results[0].score - 1.0 / 61.0).abs() < 1e-12);
        assert_eq!(lexical.list().documents()[0].score(), Some(7.0));
    }

    #[tokio::test]
    async fn test_fuse_is_deterministic() {
        let engine = FusionEngine::new(vec![])
            .with_retriever(StaticRetriever::new("a", docs(&["x", "y", "z"])))
            .with_retriever(StaticRetriever::new("b", docs(&["z", "y", "x"])));
        let config = FusionConfig::rrf(2).unwrap();

        let first = engine.fuse("q", &config).await.unwrap();
        for _ in 0..5 {
            let again = engine.fuse("q", &config).await.unwrap();
            assert_eq!(contents(&first), contents(&again));
            assert_eq!(first.scores(), again.scores());
        }
        // x and z tie; x was inserted first.
        assert_eq!(contents(&first), vec!["x", "z", "y"]);
    }

    #[tokio::test]
    async fn test_k_truncation() {
        let engine = scenario_engine();

        for k in [1, 2, 4, 10] {
            let config = FusionConfig::rrf(2).unwrap().with_k(k).unwrap();
            let result = engine.fuse("q", &config).await.unwrap();
            assert_eq!(result.results.len(), k.min(4));
        }
    }

    #[tokio::test]
    async fn test_convex_combination_scenario() {
        let engine = FusionEngine::new(vec![])
            .with_retriever(StaticRetriever::new(
                "lexical",
                vec![
                    Document::new("D1").with_score(1.0),
                    Document::new("D2").with_score(0.0),
                ],
            ))
            .with_retriever(StaticRetriever::new(
                "dense",
                vec![
                    Document::new("D2").with_score(1.0),
                    Document::new("D1").with_score(0.0),
                ],
            ));
        let config = FusionConfig::convex(2, Some(vec![0.8, 0.2])).unwrap();

        let result = engine.fuse("q", &config).await.unwrap();

        assert_eq!(contents(&result), vec!["D1", "D2"]);
        assert!((result.results[0].score - 0.8).abs() < 1e-12);
        assert!((result.results[1].score - 0.2).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_retriever_error_propagates() {
        let engine = scenario_engine().with_retriever(FailingRetriever);
        let config = FusionConfig::rrf(3).unwrap();

        let err = engine.fuse("q", &config).await.unwrap_err();

        match err {
            FusionError::Retriever { retriever, message } => {
                assert_eq!(retriever, "broken");
                assert!(message.contains("index unavailable"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_partial_failure_tolerance() {
        let engine = scenario_engine().with_retriever(FailingRetriever);
        let config = FusionConfig::rrf(3)
            .unwrap()
            .with_partial_failure_tolerance(true);

        let result = engine.fuse("q", &config).await.unwrap();

        assert_eq!(result.failed_retrievers, vec!["broken".to_string()]);
        assert_eq!(contents(&result), vec!["D2", "D1", "D4", "D3"]);
    }

    #[tokio::test]
    async fn test_config_must_match_retriever_count() {
        let engine = scenario_engine();
        let config = FusionConfig::rrf(3).unwrap();

        let err = engine.fuse("q", &config).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrievers_run_concurrently() {
        let (first, _) = slow(Duration::from_millis(100));
        let (second, _) = slow(Duration::from_millis(100));
        let engine = FusionEngine::new(vec![])
            .with_retriever(first)
            .with_retriever(second);
        let config = FusionConfig::rrf(2).unwrap();

        let start = tokio::time::Instant::now();
        let result = engine.fuse("q", &config).await.unwrap();

        assert!(start.elapsed() < Duration::from_millis(150));
        // Both retrievers returned the same content, so it is fused once.
        assert_eq!(result.results.len(), 1);
        assert!((result.results[0].score - 2.0 / 61.0).abs() < 1e-12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_retrievers() {
        let (retriever, finished) = slow(Duration::from_secs(3600));
        let engine = FusionEngine::new(vec![]).with_retriever(retriever);
        let config = FusionConfig::rrf(1).unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = engine
            .fuse_with_cancellation("q", &config, cancel)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CANCELLED");

        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels() {
        let (retriever, finished) = slow(Duration::from_secs(60));
        let engine = FusionEngine::new(vec![])
            .with_retriever(StaticRetriever::new("fast", docs(&["a"])))
            .with_retriever(retriever);
        let config = FusionConfig::rrf(2)
            .unwrap()
            .with_timeout(Duration::from_millis(50))
            .unwrap();

        let err = engine.fuse("q", &config).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_fuse_stops_retrievers() {
        let (retriever, finished) = slow(Duration::from_secs(60));
        let engine = FusionEngine::new(vec![]).with_retriever(retriever);
        let config = FusionConfig::rrf(1).unwrap();

        let fuse = engine.fuse("q", &config);
        assert!(tokio::time::timeout(Duration::from_millis(10), fuse)
            .await
            .is_err());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_score_breakdown() {
        let engine = scenario_engine();
        let config = FusionConfig::rrf(2).unwrap().with_k(4).unwrap();

        let breakdown = engine.score_breakdown("q", &config).await.unwrap();
        let fused = engine.fuse("q", &config).await.unwrap();

        assert_eq!(breakdown.retrievers, vec!["lexical", "dense"]);
        assert!(breakdown.weights.is_none());
        assert_eq!(breakdown.results.len(), fused.results.len());

        let top = &breakdown.results[0];
        assert_eq!(top.document.content, "D2");
        assert_eq!(top.score, fused.results[0].score);
        assert_eq!(top.contributions.len(), 2);
        assert_eq!(top.contributions[0].retriever, "lexical");
        assert_eq!(top.contributions[0].rank, 2);
        assert_eq!(top.contributions[1].retriever, "dense");
        assert_eq!(top.contributions[1].rank, 1);

        let total: f64 = top.contributions.iter().map(|c| c.contribution).sum();
        assert!((total - top.score).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_score_breakdown_convex_reports_weights() {
        let engine = scenario_engine();
        let config = FusionConfig::convex(2, Some(vec![3.0, 1.0])).unwrap();

        let breakdown = engine.score_breakdown("q", &config).await.unwrap();

        assert_eq!(breakdown.weights, Some(vec![0.75, 0.25]));
        let first = &breakdown.results[0].contributions[0];
        assert_eq!(first.weight, Some(0.75));
        assert!(first.normalized_score.is_some());
    }
}
