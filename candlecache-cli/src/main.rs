//! Candlecache CLI: replay range queries through the coalescing cache.
//!
//! Commands:
//! - `replay`: run a TOML scenario against a CSV dataset behind a slow upstream
//! - `query`: answer one range query straight from a CSV dataset
//! - `inspect`: report a dataset's size, layering and span

mod config;
mod dataset;
mod simulated;

use anyhow::{Context, Result};
use candlecache_core::{
    CacheStats, CachedSource, Candlestick, CandlestickSource, LocalSource, ScalarKind,
    SnapshotLimit,
};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use crate::config::{ReplayConfig, ResolvedQuery};
use crate::simulated::DelayedSource;

#[derive(Parser)]
#[command(
    name = "candlecache",
    about = "Candlecache CLI: coalescing range cache for candlestick series"
)]
struct Cli {
    /// Log every cache decision (same as RUST_LOG=debug).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario's queries through the cache and report what reached upstream.
    Replay {
        /// Path to a TOML scenario file.
        #[arg(long)]
        scenario: PathBuf,

        /// Print the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Answer one query from a CSV dataset.
    Query {
        /// CSV dataset (start,end,open,close,high,low).
        #[arg(long)]
        dataset: PathBuf,

        /// First x-axis value, inclusive.
        #[arg(long, allow_hyphen_values = true)]
        first: String,

        /// Last x-axis value, inclusive.
        #[arg(long, allow_hyphen_values = true)]
        last: String,

        /// Keep only the first N candlesticks.
        #[arg(long, conflicts_with = "tail")]
        head: Option<usize>,

        /// Keep only the last N candlesticks.
        #[arg(long)]
        tail: Option<usize>,

        /// x-axis kind: money, quantity, duration, timestamp.
        #[arg(long, default_value = "timestamp")]
        x_axis: ScalarKind,

        /// y-axis kind: money, quantity, duration, timestamp.
        #[arg(long, default_value = "money")]
        y_axis: ScalarKind,

        /// Print candlesticks as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Report record count, layer count and span of a CSV dataset.
    Inspect {
        /// CSV dataset (start,end,open,close,high,low).
        #[arg(long)]
        dataset: PathBuf,

        /// x-axis kind: money, quantity, duration, timestamp.
        #[arg(long, default_value = "timestamp")]
        x_axis: ScalarKind,

        /// y-axis kind: money, quantity, duration, timestamp.
        #[arg(long, default_value = "money")]
        y_axis: ScalarKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Replay { scenario, json } => run_replay(&scenario, json).await,
        Commands::Query {
            dataset,
            first,
            last,
            head,
            tail,
            x_axis,
            y_axis,
            json,
        } => {
            let limit = match (head, tail) {
                (Some(n), _) => SnapshotLimit::FromHead(n),
                (None, Some(n)) => SnapshotLimit::FromTail(n),
                (None, None) => SnapshotLimit::Unlimited,
            };
            run_query(&dataset, &first, &last, limit, x_axis, y_axis, json)
        }
        Commands::Inspect {
            dataset,
            x_axis,
            y_axis,
        } => run_inspect(&dataset, x_axis, y_axis),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_dataset(path: &Path, x_axis: ScalarKind, y_axis: ScalarKind) -> Result<LocalSource> {
    let sticks = dataset::load_csv(path, x_axis, y_axis)?;
    LocalSource::new(x_axis, y_axis, sticks)
        .with_context(|| format!("index dataset {}", path.display()))
}

// ── replay ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct QueryOutcome {
    label: String,
    limit: SnapshotLimit,
    count: usize,
    first_start: Option<String>,
    last_end: Option<String>,
    elapsed_ms: u64,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    dataset: PathBuf,
    concurrent: bool,
    queries: Vec<QueryOutcome>,
    stats: CacheStats,
    upstream_seen: u64,
    cached: Vec<String>,
    stored: usize,
    elapsed_ms: u64,
}

async fn run_replay(path: &Path, json: bool) -> Result<()> {
    let config = ReplayConfig::from_file(path)?;
    let queries = config.resolve_queries()?;
    let local = open_dataset(&config.dataset, config.x_axis, config.y_axis)?;
    tracing::info!(
        dataset = %config.dataset.display(),
        candlesticks = local.len(),
        layers = local.layer_count(),
        queries = queries.len(),
        concurrent = config.concurrent,
        "replaying scenario"
    );

    let cache = CachedSource::new(DelayedSource::new(local, &config.upstream));
    let started = Instant::now();
    let outcomes = if config.concurrent {
        join_all(queries.iter().map(|q| replay_one(&cache, q))).await
    } else {
        let mut outcomes = Vec::with_capacity(queries.len());
        for query in &queries {
            outcomes.push(replay_one(&cache, query).await);
        }
        outcomes
    };

    let x_axis = config.x_axis;
    let report = ReplayReport {
        dataset: config.dataset.clone(),
        concurrent: config.concurrent,
        queries: outcomes,
        stats: cache.stats(),
        upstream_seen: cache.source().request_count(),
        cached: cache
            .cached_intervals()
            .iter()
            .map(|c| format!("[{}, {}]", x_axis.format(c.lower), x_axis.format(c.upper)))
            .collect(),
        stored: cache.stored_len(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn replay_one<S: CandlestickSource>(
    cache: &CachedSource<S>,
    query: &ResolvedQuery,
) -> QueryOutcome {
    let x_axis = cache.x_axis();
    let started = Instant::now();
    let result = cache.load(query.first, query.last, query.limit).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(sticks) => QueryOutcome {
            label: query.label.clone(),
            limit: query.limit,
            count: sticks.len(),
            first_start: sticks.first().map(|c| x_axis.format(c.start)),
            last_end: sticks.last().map(|c| x_axis.format(c.end)),
            elapsed_ms,
            error: None,
        },
        Err(e) => {
            tracing::error!(query = %query.label, error = %e, "query failed");
            QueryOutcome {
                label: query.label.clone(),
                limit: query.limit,
                count: 0,
                first_start: None,
                last_end: None,
                elapsed_ms,
                error: Some(e.to_string()),
            }
        }
    }
}

fn format_limit(limit: SnapshotLimit) -> String {
    match limit {
        SnapshotLimit::Unlimited => "all".into(),
        SnapshotLimit::FromHead(n) => format!("head {n}"),
        SnapshotLimit::FromTail(n) => format!("tail {n}"),
    }
}

fn print_report(report: &ReplayReport) {
    println!();
    println!("=== Replay ===");
    println!("Dataset:        {}", report.dataset.display());
    println!(
        "Mode:           {}",
        if report.concurrent { "concurrent" } else { "sequential" }
    );
    println!("Elapsed:        {} ms", report.elapsed_ms);
    println!();
    println!(
        "{:<48} {:<10} {:>6} {:>9}  {}",
        "Query", "Limit", "Count", "Time", "Result"
    );
    println!("{}", "-".repeat(100));
    for q in &report.queries {
        let result = match (&q.error, &q.first_start, &q.last_end) {
            (Some(e), _, _) => format!("ERROR: {e}"),
            (None, Some(first), Some(last)) => format!("{first} .. {last}"),
            _ => "(empty)".into(),
        };
        println!(
            "{:<48} {:<10} {:>6} {:>6} ms  {}",
            q.label,
            format_limit(q.limit),
            q.count,
            q.elapsed_ms,
            result
        );
    }
    println!();
    println!("--- Cache ---");
    println!(
        "Upstream requests: {} (upstream saw {})",
        report.stats.upstream_requests, report.upstream_seen
    );
    println!("Served from store: {}", report.stats.served_from_store);
    println!("Coalesced waits:   {}", report.stats.coalesced_waits);
    println!("Upstream failures: {}", report.stats.upstream_failures);
    println!("Stored:            {} candlesticks", report.stored);
    for range in &report.cached {
        println!("Cached:            {range}");
    }
    println!();
}

// ── query ────────────────────────────────────────────────────────────

fn run_query(
    dataset: &Path,
    first: &str,
    last: &str,
    limit: SnapshotLimit,
    x_axis: ScalarKind,
    y_axis: ScalarKind,
    json: bool,
) -> Result<()> {
    let first = x_axis.parse(first).context("--first")?;
    let last = x_axis.parse(last).context("--last")?;
    let source = open_dataset(dataset, x_axis, y_axis)?;
    let sticks = source.load_now(first, last, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&sticks)?);
        return Ok(());
    }
    println!(
        "{:<26} {:<26} {:>12} {:>12} {:>12} {:>12}",
        "Start", "End", "Open", "Close", "High", "Low"
    );
    println!("{}", "-".repeat(105));
    for stick in &sticks {
        print_candlestick(stick, x_axis, y_axis);
    }
    println!("{} candlestick(s)", sticks.len());
    Ok(())
}

fn print_candlestick(stick: &Candlestick, x_axis: ScalarKind, y_axis: ScalarKind) {
    println!(
        "{:<26} {:<26} {:>12} {:>12} {:>12} {:>12}",
        x_axis.format(stick.start),
        x_axis.format(stick.end),
        y_axis.format(stick.open),
        y_axis.format(stick.close),
        y_axis.format(stick.high),
        y_axis.format(stick.low),
    );
}

// ── inspect ──────────────────────────────────────────────────────────

fn run_inspect(dataset: &Path, x_axis: ScalarKind, y_axis: ScalarKind) -> Result<()> {
    let source = open_dataset(dataset, x_axis, y_axis)?;
    println!("Dataset:      {}", dataset.display());
    println!("Axes:         {x_axis} / {y_axis}");
    println!("Candlesticks: {}", source.len());
    println!("Layers:       {}", source.layer_count());
    match source.span() {
        Some((start, end)) => println!(
            "Span:         {} .. {}",
            x_axis.format(start),
            x_axis.format(end)
        ),
        None => println!("Span:         (empty)"),
    }
    Ok(())
}
