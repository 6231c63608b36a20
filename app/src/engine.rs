// ==============================================================================
// engine.rs - Local Write Engine Configuration
// ==============================================================================
// Description: Explicit resource configuration (tmp dir, memory budgets,
//              parallelism, codec) handed once to the engine handle
// Author: Matt Barham
// Created: 2026-10-13
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::models::ParquetCodec;
use crate::source::RowBudget;
use crate::units::ByteSize;

pub const DEFAULT_ROWS_PER_PARTITION: usize = 100_000;
pub const DEFAULT_ROW_GROUP_SIZE: usize = 64 * 1024;

/// Resource settings for one exporter run
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Scratch space for staging part files before they are published
    pub tmp_dir: PathBuf,

    /// Budget for one contig's rows held by the driver
    pub driver_memory: Option<ByteSize>,

    /// Budget shared by concurrent shard writers before they flush a row group
    pub executor_memory: Option<ByteSize>,

    pub codec: ParquetCodec,

    /// Rows per natural shard of a contig
    pub rows_per_partition: usize,

    /// Maximum rows per Parquet row group
    pub row_group_size: usize,

    /// Maximum shard files written concurrently
    pub write_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tmp_dir: expand_home(Path::new("~/tmp/vrs-parquet")),
            driver_memory: None,
            executor_memory: None,
            codec: ParquetCodec::default(),
            rows_per_partition: DEFAULT_ROWS_PER_PARTITION,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            write_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// Initialized engine handle; all write paths go through it
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Validate the configuration and create the scratch directory
    pub fn init(mut config: EngineConfig) -> Result<Self> {
        config.tmp_dir = expand_home(&config.tmp_dir);
        config.rows_per_partition = config.rows_per_partition.max(1);
        config.row_group_size = config.row_group_size.max(1);
        config.write_threads = config.write_threads.max(1);

        std::fs::create_dir_all(&config.tmp_dir).with_context(|| {
            format!("Failed to create tmp dir {}", config.tmp_dir.display())
        })?;

        info!(
            "Engine initialized: tmp_dir={} codec={} write_threads={} rows_per_partition={} row_group_size={}",
            config.tmp_dir.display(),
            config.codec.as_str(),
            config.write_threads,
            config.rows_per_partition,
            config.row_group_size,
        );
        if let Some(memory) = config.driver_memory {
            info!("Driver memory budget: {}", memory);
        }
        if let Some(memory) = config.executor_memory {
            info!("Executor memory budget: {}", memory);
        }

        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fresh staging directory for one contig write
    pub fn staging_dir(&self, run_id: &Uuid) -> PathBuf {
        self.config.tmp_dir.join("_staging").join(run_id.to_string())
    }

    /// Buffered bytes after which a single writer flushes its row group
    pub fn writer_flush_budget(&self) -> Option<usize> {
        self.config.executor_memory.map(|memory| {
            let per_writer = memory.bytes() / self.config.write_threads as u64;
            usize::try_from(per_writer).unwrap_or(usize::MAX).max(1)
        })
    }

    /// Fresh budget for buffering one contig's rows, capped by the driver memory
    pub fn row_budget(&self) -> RowBudget {
        RowBudget::new(self.config.driver_memory)
    }
}

/// Expand a leading `~` to `$HOME`
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
