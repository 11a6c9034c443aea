//! rankfuse CLI - Fuse ranked result lists from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rankfuse_core::{
    FusionMethod, FusionResult, FusionSettings, RankfuseConfig, Retriever, ScoreBreakdown,
};
use rankfuse_engine::{FusionEngine, StaticRetriever};

/// rankfuse - Merge ranked lists with Reciprocal Rank Fusion or Convex Combination
#[derive(Parser)]
#[command(name = "rankfuse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/rankfuse/config.toml or ./rankfuse.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fuse ranked lists into one ranking
    Fuse {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        fusion: FusionArgs,
    },

    /// Show how each fused score was computed
    Breakdown {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        fusion: FusionArgs,
    },

    /// Run RRF and CC on the same inputs and compare the rankings
    Compare {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        fusion: FusionArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Query the lists were produced for
    query: String,

    /// Ranked list files (JSON array of documents), one per retriever, in order
    #[arg(short, long = "input", required = true)]
    inputs: Vec<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args, Default)]
struct FusionArgs {
    /// Fusion method: rrf or cc
    #[arg(short, long)]
    method: Option<FusionMethod>,

    /// Number of fused results
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// RRF constant
    #[arg(long = "rrf-c")]
    rrf_c: Option<f64>,

    /// Comma-separated retriever weights (CC only)
    #[arg(short, long, value_delimiter = ',')]
    weights: Option<Vec<f64>>,

    /// Continue when a retriever fails
    #[arg(long)]
    tolerant: bool,

    /// Overall timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl FusionArgs {
    /// Overlay command-line options on file settings.
    fn apply(&self, mut settings: FusionSettings) -> FusionSettings {
        if let Some(method) = self.method {
            settings.method = method;
        }
        if let Some(k) = self.top_k {
            settings.k = k;
        }
        if let Some(c) = self.rrf_c {
            settings.c = c;
        }
        if let Some(weights) = &self.weights {
            settings.weights = Some(weights.clone());
        }
        if self.tolerant {
            settings.partial_failure_tolerant = true;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            settings.timeout_ms = Some(timeout_ms);
        }
        settings
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(path: Option<&Path>) -> rankfuse_core::Result<RankfuseConfig> {
    match path {
        Some(path) => RankfuseConfig::load(path),
        None => RankfuseConfig::load_default(),
    }
}

fn load_engine(inputs: &[PathBuf]) -> rankfuse_core::Result<FusionEngine> {
    let mut retrievers: Vec<Arc<dyn Retriever>> = Vec::with_capacity(inputs.len());
    for path in inputs {
        retrievers.push(Arc::new(StaticRetriever::from_file(path)?));
    }
    Ok(FusionEngine::new(retrievers))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    debug!("Loaded settings: {:?}", config.fusion);

    match cli.command {
        Commands::Fuse { input, fusion } => {
            let engine = load_engine(&input.inputs)?;
            let fusion_config = engine.config(&fusion.apply(config.fusion))?;
            let result = engine.fuse(&input.query, &fusion_config).await?;

            if input.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }
        Commands::Breakdown { input, fusion } => {
            let engine = load_engine(&input.inputs)?;
            let fusion_config = engine.config(&fusion.apply(config.fusion))?;
            let breakdown = engine.score_breakdown(&input.query, &fusion_config).await?;

            if input.json {
                println!("{}", serde_json::to_string_pretty(&breakdown)?);
            } else {
                print_breakdown(&breakdown);
            }
        }
        Commands::Compare { input, fusion } => {
            let engine = load_engine(&input.inputs)?;
            let base = engine.config(&fusion.apply(config.fusion))?;

            let rrf = engine
                .fuse(&input.query, &base.clone().with_method(FusionMethod::Rrf))
                .await?;
            let cc = engine
                .fuse(&input.query, &base.with_method(FusionMethod::Cc))
                .await?;

            if input.json {
                let both = serde_json::json!({ "rrf": rrf, "cc": cc });
                println!("{}", serde_json::to_string_pretty(&both)?);
            } else {
                print_result(&rrf);
                print_result(&cc);
                println!("{}", compare_top(&rrf, &cc));
            }
        }
    }

    Ok(())
}

fn print_result(result: &FusionResult) {
    println!(
        "== {} ({} results, {}ms)",
        method_label(result.method),
        result.total_results,
        result.latency_ms
    );
    if !result.failed_retrievers.is_empty() {
        println!(
            "   skipped failed retrievers: {}",
            result.failed_retrievers.join(", ")
        );
    }
    for fused in &result.results {
        println!(
            "[{}] {:.4}  {}",
            fused.rank,
            fused.score,
            preview(&fused.document.content, 80)
        );
    }
    println!();
}

fn print_breakdown(breakdown: &ScoreBreakdown) {
    println!(
        "== {} breakdown for {:?}",
        method_label(breakdown.method),
        breakdown.query
    );
    if let Some(weights) = &breakdown.weights {
        for (name, weight) in breakdown.retrievers.iter().zip(weights) {
            println!("   weight {:<16} {:.4}", name, weight);
        }
    }
    for explained in &breakdown.results {
        println!(
            "[{}] {:.4}  {}  ({})",
            explained.rank,
            explained.score,
            preview(&explained.document.content, 60),
            explained.id.short()
        );
        for c in &explained.contributions {
            match c.normalized_score {
                Some(norm) => println!(
                    "      {:<16} rank {:<3} norm {:.4}  +{:.4}",
                    c.retriever, c.rank, norm, c.contribution
                ),
                None => println!(
                    "      {:<16} rank {:<3} +{:.4}",
                    c.retriever, c.rank, c.contribution
                ),
            }
        }
    }
}

fn method_label(method: FusionMethod) -> &'static str {
    match method {
        FusionMethod::Rrf => "RRF (Reciprocal Rank Fusion)",
        FusionMethod::Cc => "CC (Convex Combination)",
    }
}

fn compare_top(rrf: &FusionResult, cc: &FusionResult) -> String {
    match (rrf.results.first(), cc.results.first()) {
        (Some(a), Some(b)) if a.document.id() == b.document.id() => {
            "RRF and CC agree on the top result".to_string()
        }
        (Some(a), Some(b)) => format!(
            "RRF and CC disagree on the top result:\n  RRF: {}\n  CC:  {}",
            preview(&a.document.content, 60),
            preview(&b.document.content, 60)
        ),
        _ => "No results to compare".to_string(),
    }
}

/// First `max_chars` characters of `text` on a single line.
fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
