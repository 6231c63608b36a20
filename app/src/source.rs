// ==============================================================================
// source.rs - Variant Source Abstraction
// ==============================================================================
// Description: The keyed table of variant rows the exporter reads one contig
//              interval at a time, and the driver memory budget those reads
//              are charged against
// Author: Matt Barham
// Created: 2026-10-13
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use anyhow::Result;
use thiserror::Error;

use crate::models::VariantRow;
use crate::reference::LocusInterval;
use crate::units::ByteSize;

/// A table of variant rows keyed by locus
pub trait VariantSource {
    /// Human-readable description for logs
    fn describe(&self) -> String;

    /// Fail if the source lacks any field the flattened schema needs
    fn validate_schema(&mut self) -> Result<()>;

    /// All rows inside `interval`, in key order
    ///
    /// Every kept row is charged to `budget` before it is buffered; the read
    /// fails as soon as the budget is exceeded.
    fn read_interval(&mut self, interval: &LocusInterval, budget: &mut RowBudget) -> Result<Vec<VariantRow>>;
}

#[derive(Error, Debug, PartialEq)]
#[error(
    "{contig}: buffered rows exceed --driver-memory {limit} (~{used} after {rows} rows); \
     raise --driver-memory or export fewer rows per run (e.g. one --contigs value at a time)"
)]
pub struct DriverMemoryExceeded {
    pub contig: String,
    pub limit: ByteSize,
    pub used: ByteSize,
    pub rows: usize,
}

/// Estimated driver memory held by one contig's buffered rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowBudget {
    limit: Option<ByteSize>,
    used: u64,
    rows: usize,
}

impl RowBudget {
    pub fn new(limit: Option<ByteSize>) -> Self {
        Self {
            limit,
            used: 0,
            rows: 0,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Account for one row about to be buffered
    pub fn charge(&mut self, contig: &str, row: &VariantRow) -> Result<(), DriverMemoryExceeded> {
        self.used += row.estimated_size() as u64;
        self.rows += 1;

        match self.limit {
            Some(limit) if self.used > limit.bytes() => Err(DriverMemoryExceeded {
                contig: contig.to_string(),
                limit,
                used: ByteSize(self.used),
                rows: self.rows,
            }),
            _ => Ok(()),
        }
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}
