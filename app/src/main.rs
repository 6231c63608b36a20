// ==============================================================================
// main.rs - VRS Parquet Exporter Entry Point
// ==============================================================================
// Description: Exports VRS-annotated VCFs to a contig-partitioned Parquet
//              dataset (<out>/contig=<name>/part-*.parquet + _SUCCESS)
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vrs_parquet::engine::{Engine, EngineConfig, DEFAULT_ROWS_PER_PARTITION, DEFAULT_ROW_GROUP_SIZE};
use vrs_parquet::exporter::{ContigExporter, ExportOptions};
use vrs_parquet::models::ParquetCodec;
use vrs_parquet::parsers::VcfSource;
use vrs_parquet::partitioning::ShardPolicy;
use vrs_parquet::reference::{parse_contigs, ReferenceGenome};
use vrs_parquet::sync::StorageSync;
use vrs_parquet::units::ByteSize;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// VRS-annotated VCF (.vcf, .vcf.gz, .vcf.bgz); repeat for per-contig inputs
    #[arg(short, long, required = true)]
    input: Vec<PathBuf>,

    /// Output root; one contig=<name> directory is written per contig
    #[arg(short, long)]
    out: PathBuf,

    /// Reference genome (GRCh38 or GRCh37)
    #[arg(long, default_value = "GRCh38")]
    reference: ReferenceGenome,

    /// Contigs to export (repeatable and/or comma-separated; default: 1-22, X, Y; chrM/MT on request)
    #[arg(long)]
    contigs: Vec<String>,

    /// Parquet compression codec
    #[arg(long, value_enum, default_value_t = ParquetCodec::Zstd)]
    compression: ParquetCodec,

    /// Sort rows by position inside each file (tighter row-group statistics)
    #[arg(long)]
    sort_within_partitions: bool,

    /// Coalesce down to at most this many files per contig
    #[arg(long)]
    max_files_per_contig: Option<usize>,

    /// Range-repartition up to at least this many files per contig
    #[arg(long)]
    min_files_per_contig: Option<usize>,

    /// Split files larger than this many rows
    #[arg(long)]
    max_records_per_file: Option<usize>,

    /// Delete existing contig directories before writing
    #[arg(long)]
    overwrite: bool,

    /// Skip contig directories that already carry _SUCCESS
    #[arg(long)]
    resume: bool,

    /// Scratch directory for staged part files
    #[arg(long, env = "VRS_PARQUET_TMP_DIR", default_value = "~/tmp/vrs-parquet")]
    tmp_dir: PathBuf,

    /// Memory budget for one contig's rows (e.g. 6g)
    #[arg(long, env = "VRS_PARQUET_DRIVER_MEMORY", default_value = "6g")]
    driver_memory: ByteSize,

    /// Buffer budget shared by concurrent file writers (e.g. 6g)
    #[arg(long, env = "VRS_PARQUET_EXECUTOR_MEMORY", default_value = "6g")]
    executor_memory: ByteSize,

    /// Rows per natural shard before coalesce/widen
    #[arg(long, env = "VRS_PARQUET_ROWS_PER_PARTITION", default_value_t = DEFAULT_ROWS_PER_PARTITION)]
    rows_per_partition: usize,

    /// Maximum rows per Parquet row group
    #[arg(long, default_value_t = DEFAULT_ROW_GROUP_SIZE)]
    row_group_size: usize,

    /// Files written concurrently (default: available cores)
    #[arg(long, env = "VRS_PARQUET_WRITE_THREADS")]
    write_threads: Option<usize>,

    /// Bad VCF records tolerated before failing
    #[arg(long, default_value_t = 1000)]
    max_errors: usize,

    /// Mirror the output root to gs://... or s3://... when done
    #[arg(long)]
    sync_to: Option<String>,

    /// With --sync-to, delete remote objects missing locally
    #[arg(long, requires = "sync_to")]
    sync_delete: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vrs_parquet=info,export_vrs_parquet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Validate the sync destination before spending time on the export
    let sync = args
        .sync_to
        .as_deref()
        .map(|dest| StorageSync::new(dest, args.sync_delete))
        .transpose()?;

    let defaults = EngineConfig::default();
    let engine = Engine::init(EngineConfig {
        tmp_dir: args.tmp_dir,
        driver_memory: Some(args.driver_memory),
        executor_memory: Some(args.executor_memory),
        codec: args.compression,
        rows_per_partition: args.rows_per_partition,
        row_group_size: args.row_group_size,
        write_threads: args.write_threads.unwrap_or(defaults.write_threads),
    })?;

    let contigs = parse_contigs(&args.contigs, args.reference);
    info!("Contigs: {}", contigs.join(","));

    let source = VcfSource::new(args.input).with_max_errors(args.max_errors);
    let options = ExportOptions {
        out_root: args.out.clone(),
        reference: args.reference,
        contigs,
        policy: ShardPolicy {
            max_files: args.max_files_per_contig,
            min_files: args.min_files_per_contig,
            sort_within: args.sort_within_partitions,
            max_records_per_file: args.max_records_per_file,
        },
        overwrite: args.overwrite,
        resume: args.resume,
    };

    let mut exporter = ContigExporter::new(source, &engine, options);
    exporter.run().await.context("Export failed")?;

    let source = exporter.source();
    if source.error_count > 0 {
        info!("Bad records skipped: {}", source.error_count);
    }

    if let Some(sync) = sync {
        sync.run(&args.out).await?;
    }

    info!("Done.");
    Ok(())
}
