// ==============================================================================
// exporter.rs - Contig-Partitioned Export Driver
// ==============================================================================
// Description: Per-contig loop: gate -> read -> shard -> write -> _SUCCESS
// Author: Matt Barham
// Created: 2026-10-14
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::engine::Engine;
use crate::layout;
use crate::output::ContigWriter;
use crate::partitioning::{ShardPolicy, Shards};
use crate::reference::{LocusInterval, ReferenceGenome};
use crate::resume::{prepare_output_dir, WriteDecision};
use crate::source::{RowBudget, VariantSource};
use crate::units::human_bytes;

/// Everything the driver needs besides the source and the engine
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub out_root: PathBuf,
    pub reference: ReferenceGenome,
    pub contigs: Vec<String>,
    pub policy: ShardPolicy,
    pub overwrite: bool,
    pub resume: bool,
}

/// Result of one contig
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigOutcome {
    pub contig: String,
    pub dir: PathBuf,
    pub rows: usize,
    pub files: usize,
}

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub written: Vec<ContigOutcome>,
    pub skipped: Vec<String>,
}

impl ExportSummary {
    pub fn total_rows(&self) -> usize {
        self.written.iter().map(|c| c.rows).sum()
    }
}

pub struct ContigExporter<'a, S: VariantSource> {
    source: S,
    engine: &'a Engine,
    options: ExportOptions,
}

impl<'a, S: VariantSource> ContigExporter<'a, S> {
    pub fn new(source: S, engine: &'a Engine, options: ExportOptions) -> Self {
        Self {
            source,
            engine,
            options,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Export every requested contig in order
    ///
    /// Contigs are validated against the reference before anything is written,
    /// and the source schema is checked once up front.
    pub async fn run(&mut self) -> Result<ExportSummary> {
        let intervals = self
            .options
            .contigs
            .iter()
            .map(|contig| LocusInterval::whole_contig(contig, self.options.reference))
            .collect::<Result<Vec<_>, _>>()?;

        info!("Input: {}", self.source.describe());
        self.source.validate_schema()?;

        std::fs::create_dir_all(&self.options.out_root).with_context(|| {
            format!("Failed to create output root {}", self.options.out_root.display())
        })?;

        info!(
            "Exporting {} contigs ({}) to {}",
            intervals.len(),
            self.options.reference,
            self.options.out_root.display()
        );

        let mut summary = ExportSummary::default();
        for interval in &intervals {
            match self.export_contig(interval).await? {
                Some(outcome) => summary.written.push(outcome),
                None => summary.skipped.push(interval.contig.clone()),
            }
        }

        info!(
            "Export complete: {} contigs written ({} rows), {} skipped",
            summary.written.len(),
            summary.total_rows(),
            summary.skipped.len()
        );
        Ok(summary)
    }

    async fn export_contig(&mut self, interval: &LocusInterval) -> Result<Option<ContigOutcome>> {
        let contig = interval.contig.as_str();
        let out_dir = layout::contig_dir(&self.options.out_root, contig);

        if prepare_output_dir(&out_dir, self.options.overwrite, self.options.resume)?
            == WriteDecision::Skip
        {
            return Ok(None);
        }

        info!("=== {} ===", contig);
        let mut budget = self.engine.row_budget();
        let rows = self
            .source
            .read_interval(interval, &mut budget)
            .with_context(|| format!("Failed to read {}", interval))?;
        debug!("{}: ~{} buffered for {} rows", contig, human_bytes(budget.used()), rows.len());
        let row_count = rows.len();

        let policy = &self.options.policy;
        let shards = Shards::natural(rows, self.engine.config().rows_per_partition).apply(contig, policy);
        let files = shards.into_files(policy.max_records_per_file);

        let writer = ContigWriter::new(self.engine, self.options.reference, policy.sort_within);
        let manifest = writer.write(contig, &out_dir, files).await?;

        info!("Wrote: {}", out_dir.display());
        Ok(Some(ContigOutcome {
            contig: contig.to_string(),
            dir: out_dir,
            rows: row_count,
            files: manifest.files.len(),
        }))
    }
}
