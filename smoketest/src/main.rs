// ==============================================================================
// main.rs - Parquet Smoke Test Entry Point
// ==============================================================================
// Description: Point and range queries against one contig of a contig-
//              partitioned VRS Parquet dataset, built from sampled positions
//              so every query hits real rows; prints timing per query
// Author: Matt Barham
// Created: 2026-10-15
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Usage:
//   parquet-smoketest --dataset ./gnomad.genomes.v4.1.sites.VRS.parquet --contig chrY
//   parquet-smoketest --dataset ./out --contig chr1 --n-range-queries 8 --range-width 500000
//   parquet-smoketest --dataset ./out/contig=chr22 --local-file-stats
//   parquet-smoketest --dataset gs://my-bucket/gnomad.genomes.v4.1.sites.VRS.parquet --contig chr22
// ==============================================================================

use anyhow::{bail, Result};
use arrow::util::pretty::pretty_format_batches;
use clap::Parser;
use std::future::Future;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod dataset;
mod query_plan;
mod sampler;
mod scan;

use dataset::ContigDataset;
use query_plan::{PlannedQuery, PositionPool, QueryPlan};
use scan::{ContigScanner, ExecutionMode, PositionPredicate, CONTIG_COLUMN};

const EXAMPLE_COLUMNS: [&str; 4] = [CONTIG_COLUMN, "position", "alleles", "VRS_Allele_IDs"];

#[derive(Parser, Debug)]
#[command(author, version, about = "Smoke test for contig-partitioned VRS Parquet", long_about = None)]
struct Args {
    /// Dataset root (directory or gs:// prefix containing contig=... subdirs), or a contig=... directory
    #[arg(long)]
    dataset: String,

    /// Contig to query; defaults to chrY unless the dataset path is already contig=...
    #[arg(long)]
    contig: Option<String>,

    /// Seed for sampling files and positions
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Existing positions to query
    #[arg(long, default_value_t = 8)]
    n_point_queries: usize,

    /// Parquet files to sample positions from
    #[arg(long, default_value_t = 25)]
    sample_files: usize,

    /// Rows read from each sampled file
    #[arg(long, default_value_t = 100)]
    rows_per_file_sample: usize,

    /// Range queries to run
    #[arg(long, default_value_t = 5)]
    n_range_queries: usize,

    /// Width (bp) of each range query
    #[arg(long, default_value_t = 100_000)]
    range_width: i64,

    /// Max rows to print for example queries
    #[arg(long, default_value_t = 5)]
    limit: usize,

    /// Materialise surviving row groups before filtering instead of streaming batches
    #[arg(long)]
    no_streaming: bool,

    /// Print part-file size stats (local datasets only)
    #[arg(long)]
    local_file_stats: bool,
}

async fn time_it<T>(label: &str, work: impl Future<Output = Result<T>>) -> Result<T> {
    let started = Instant::now();
    let out = work.await?;
    println!("{}: {:.3}s", label, started.elapsed().as_secs_f64());
    Ok(out)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parquet_smoketest=info,vrs_parquet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let dataset = ContigDataset::resolve(&args.dataset, args.contig.as_deref()).await?;
    let contig = dataset.contig.clone();
    info!("{}: {} parquet files under {}", contig, dataset.files.len(), dataset.location);

    if args.local_file_stats {
        if dataset.location.is_local() {
            let stats = dataset.file_stats()?;
            println!("Parquet files under {}: {}", dataset.location, stats.count);
            println!("{}", stats);
        } else {
            warn!("--local-file-stats ignored for remote dataset {}", dataset.location);
        }
    }

    let mode = if args.no_streaming {
        ExecutionMode::Collect
    } else {
        ExecutionMode::Streaming
    };
    let scanner = ContigScanner::open(&contig, dataset.store.clone(), dataset.files.clone(), mode).await?;

    // Positions known to exist, without a full scan
    let sample = sampler::sample_positions(
        &dataset.store,
        &dataset.files,
        args.sample_files,
        args.rows_per_file_sample,
        args.seed,
    )
    .await;
    if sample.files_failed > 0 {
        info!(
            "{}: {} of {} sampled files could not be read",
            contig, sample.files_failed, sample.files_sampled
        );
    }

    let Some(pool) = PositionPool::from_samples(sample.positions) else {
        bail!(
            "No positions sampled for contig {}. Try increasing --sample-files and/or --rows-per-file-sample.",
            contig
        );
    };
    println!(
        "{}: sampled positions={} sampled_min={} sampled_max={}",
        contig,
        pool.len(),
        pool.min(),
        pool.max()
    );

    let plan = QueryPlan::build(
        &pool,
        args.n_point_queries,
        args.n_range_queries,
        args.range_width,
        args.seed,
    );
    println!("{}: point query positions ({}): {:?}", contig, plan.points.len(), plan.points);
    if !plan.ranges.is_empty() {
        println!("{}: range queries n={} width={}", contig, plan.ranges.len(), plan.range_width);
    }

    for query in plan.queries() {
        let (predicate, kind) = match query {
            PlannedQuery::Point(position) => (PositionPredicate::Eq(position), "point"),
            PlannedQuery::Range { start, end } => (PositionPredicate::Between(start, end), "range"),
        };
        run_query(&scanner, predicate, kind, args.limit).await?;
    }

    Ok(())
}

async fn run_query(scanner: &ContigScanner, predicate: PositionPredicate, kind: &str, limit: usize) -> Result<()> {
    let contig = scanner.contig();

    let (count, stats) = time_it(
        &format!("{}: {} count {}", contig, kind, predicate),
        scanner.count(predicate),
    )
    .await?;
    println!("n_rows={} ({})", count, stats);

    if limit > 0 {
        let label = match predicate {
            PositionPredicate::Eq(_) => format!("{}: examples {}", contig, predicate),
            PositionPredicate::Between(..) => format!("{}: examples range {}", contig, predicate),
        };
        let (examples, _) = time_it(&label, scanner.examples(predicate, &EXAMPLE_COLUMNS, limit)).await?;
        println!("{}", pretty_format_batches(&[examples])?);
    }

    Ok(())
}
