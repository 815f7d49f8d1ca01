//! CLI driver: build an index, run a query batch in parallel, evaluate against ground truth.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use annsearch::dataset::load_vectors;
use annsearch::evaluation::{evaluate, EvaluationReport};
use annsearch::ivf::Silhouette;
use annsearch::persistence::serialization;
use annsearch::persistence::{CacheKey, GroundTruthCache};
use annsearch::{
    create_algorithm, run_parallel_search, AlgorithmConfig, AlgorithmKind, BruteForce, Metric,
    QueryParams, SearchAlgorithm, SearchResult, Vector,
};

#[derive(Parser)]
#[command(name = "annsearch")]
#[command(about = "Approximate nearest neighbor search and evaluation", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index, search every query and compare against exact results
    Run {
        #[command(flatten)]
        batch: BatchArgs,

        /// Algorithm: brute, lsh, hypercube, ivfflat or ivfpq
        #[arg(short, long, default_value = "brute")]
        algo: AlgorithmKind,

        #[command(flatten)]
        tuning: TuningArgs,

        /// Also report silhouette scores of the coarse clustering (IVF only)
        #[arg(long)]
        silhouette: bool,

        /// Write the JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compute exact ground truth only, filling the cache
    Truth {
        #[command(flatten)]
        batch: BatchArgs,
    },
}

/// Inputs shared by every command.
#[derive(Args)]
struct BatchArgs {
    /// Dataset file, one vector per line
    #[arg(short, long)]
    dataset: PathBuf,

    /// Query file, one vector per line
    #[arg(short, long)]
    queries: PathBuf,

    /// Distance metric: l1/manhattan or l2/euclidean
    #[arg(short, long, default_value = "l2")]
    metric: Metric,

    /// Number of nearest neighbors per query
    #[arg(short = 'N', long = "neighbors", default_value = "1")]
    n: usize,

    /// Collect all points within this radius
    #[arg(short = 'R', long)]
    radius: Option<f32>,

    /// Worker threads (0 = one per core)
    #[arg(short, long, default_value = "0")]
    threads: usize,

    /// Ground truth cache file
    #[arg(long)]
    truth_cache: Option<PathBuf>,
}

impl BatchArgs {
    fn query_params(&self) -> QueryParams {
        let params = QueryParams::top_n(self.n);
        match self.radius {
            Some(r) => params.with_range(r),
            None => params,
        }
    }
}

/// Algorithm tunables. Flags override values from `--config`.
#[derive(Args)]
struct TuningArgs {
    /// JSON file with algorithm parameters
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    /// LSH hash functions per table
    #[arg(short, long)]
    k: Option<usize>,
    /// LSH table count
    #[arg(short = 'L', long)]
    l: Option<usize>,
    /// Bucket window width (LSH, hypercube)
    #[arg(short, long)]
    w: Option<f32>,
    #[arg(long)]
    kproj: Option<usize>,
    /// Hypercube candidate limit (0 = unlimited)
    #[arg(long)]
    max_candidates: Option<usize>,
    #[arg(long)]
    max_probes: Option<usize>,
    #[arg(long)]
    kclusters: Option<usize>,
    #[arg(long)]
    nprobe: Option<usize>,
    #[arg(long)]
    max_iterations: Option<usize>,
    /// PQ sub-vector count
    #[arg(long = "pq-m")]
    pq_m: Option<usize>,
    #[arg(long)]
    nbits: Option<usize>,
    #[arg(long)]
    pq_iterations: Option<usize>,
}

impl TuningArgs {
    fn resolve(&self) -> Result<AlgorithmConfig> {
        let mut config = match &self.config {
            Some(path) => AlgorithmConfig::from_json_file(path)
                .with_context(|| format!("failed to read config {}", path.display()))?,
            None => AlgorithmConfig::default(),
        };
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.k {
            config.k = v;
        }
        if let Some(v) = self.l {
            config.l = v;
        }
        if let Some(v) = self.w {
            config.w = v;
        }
        if let Some(v) = self.kproj {
            config.kproj = v;
        }
        if let Some(v) = self.max_candidates {
            config.max_candidates = v;
        }
        if let Some(v) = self.max_probes {
            config.max_probes = v;
        }
        if let Some(v) = self.kclusters {
            config.kclusters = v;
        }
        if let Some(v) = self.nprobe {
            config.nprobe = v;
        }
        if let Some(v) = self.max_iterations {
            config.max_iterations = v;
        }
        if let Some(v) = self.pq_m {
            config.pq_m = v;
        }
        if let Some(v) = self.nbits {
            config.nbits = v;
        }
        if let Some(v) = self.pq_iterations {
            config.pq_iterations = v;
        }
        Ok(config)
    }
}

#[derive(Serialize)]
struct RunReport<'a> {
    algorithm: &'static str,
    metric: Metric,
    params: QueryParams,
    config: &'a AlgorithmConfig,
    build_ms: f64,
    evaluation: &'a EvaluationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    silhouette_fast: Option<Silhouette>,
    #[serde(skip_serializing_if = "Option::is_none")]
    silhouette: Option<Silhouette>,
    results: &'a [SearchResult],
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load(path: &Path, what: &str) -> Result<Vec<Vector>> {
    load_vectors(path).with_context(|| format!("failed to load {} from {}", what, path.display()))
}

/// Exact results for the batch, served from the cache when it matches.
fn ground_truth(
    batch: &BatchArgs,
    dataset: &[Vector],
    queries: &[Vector],
) -> Result<Vec<SearchResult>> {
    let params = batch.query_params();
    let cache = batch.truth_cache.as_ref().map(GroundTruthCache::new);
    let key = CacheKey::new(dataset, queries, batch.metric, &params);
    if let Some(cache) = &cache {
        if let Some(results) = cache.load(&key)? {
            return Ok(results);
        }
    }

    let mut exact = BruteForce::new();
    exact.build_index(dataset, batch.metric)?;
    let results = run_parallel_search(&exact, queries, batch.threads, &params)?;
    if let Some(cache) = &cache {
        cache
            .store(&key, &results)
            .with_context(|| format!("failed to write truth cache {}", cache.path().display()))?;
    }
    Ok(results)
}

fn run(
    batch: BatchArgs,
    algo: AlgorithmKind,
    tuning: TuningArgs,
    with_silhouette: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = tuning.resolve()?;
    let dataset = load(&batch.dataset, "dataset")?;
    let queries = load(&batch.queries, "queries")?;
    let params = batch.query_params();

    let mut index = create_algorithm(algo, &config);
    let build_started = Instant::now();
    index
        .build_index(&dataset, batch.metric)
        .with_context(|| format!("failed to build {} index", index.name()))?;
    let build_ms = build_started.elapsed().as_secs_f64() * 1000.0;

    let batch_started = Instant::now();
    let results = run_parallel_search(index.as_ref(), &queries, batch.threads, &params)?;
    let batch_elapsed = batch_started.elapsed();

    let truth = ground_truth(&batch, &dataset, &queries)?;
    let evaluation = evaluate(&results, &truth, batch.n, batch_elapsed);

    let (silhouette_fast, silhouette) = if with_silhouette {
        (index.silhouette_fast(), index.silhouette())
    } else {
        (None, None)
    };

    println!("Algorithm:     {}", index.name());
    println!("Queries:       {}", evaluation.queries);
    println!("Build time:    {:.2} ms", build_ms);
    println!("Recall@{}:     {:.4}", batch.n, evaluation.recall_at_n);
    println!("Average AF:    {:.4} ({} queries)", evaluation.average_af, evaluation.af_queries);
    println!("QPS:           {:.1}", evaluation.qps);
    println!(
        "Latency (ms):  approx avg {:.3}, p50 {:.3}, p99 {:.3}; exact avg {:.3}",
        evaluation.avg_approx_ms,
        evaluation.p50_approx_ms,
        evaluation.p99_approx_ms,
        evaluation.avg_true_ms
    );
    if let Some(s) = &silhouette_fast {
        println!("Silhouette:    fast {:.4}", s.overall);
    }
    if let Some(s) = &silhouette {
        println!("Silhouette:    exact {:.4}", s.overall);
    }

    if let Some(path) = output {
        let report = RunReport {
            algorithm: index.name(),
            metric: batch.metric,
            params,
            config: &config,
            build_ms,
            evaluation: &evaluation,
            silhouette_fast,
            silhouette,
            results: &results,
        };
        std::fs::write(&path, serialization::to_json_pretty(&report)?)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Run {
            batch,
            algo,
            tuning,
            silhouette,
            output,
        } => run(batch, algo, tuning, silhouette, output),
        Commands::Truth { batch } => {
            let dataset = load(&batch.dataset, "dataset")?;
            let queries = load(&batch.queries, "queries")?;
            let truth = ground_truth(&batch, &dataset, &queries)?;
            println!("Ground truth ready for {} queries", truth.len());
            Ok(())
        }
    }
}
