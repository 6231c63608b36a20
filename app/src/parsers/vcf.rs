// ==============================================================================
// parsers/vcf.rs - VRS-Annotated VCF Source
// ==============================================================================
// Description: Reads VRS-annotated VCF files with noodles-vcf and flattens each
//              record to a VariantRow (position, alleles, VRS_* INFO arrays)
// Author: Matt Barham
// Created: 2026-10-13
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// References:
// - VCF 4.3 Spec: https://samtools.github.io/hts-specs/VCFv4.3.pdf
// - noodles-vcf: https://docs.rs/noodles-vcf/0.81.0/noodles_vcf/
// ==============================================================================

use anyhow::Result;
use noodles_vcf as vcf;
use noodles_vcf::variant::record::info::field::value::Array;
use noodles_vcf::variant::record::info::field::Value;
use noodles_vcf::variant::record::AlternateBases;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{VariantRow, VRS_INFO_FIELDS};
use crate::reference::LocusInterval;
use crate::source::{DriverMemoryExceeded, RowBudget, VariantSource};

/// VCF reading errors
#[derive(Error, Debug)]
pub enum VrsVcfError {
    #[error("Failed to open VCF file {}: {source}", .path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read VCF header of {}: {source}", .path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Input table is missing expected fields: {} ({})", .fields.join(", "), .path.display())]
    MissingFields { path: PathBuf, fields: Vec<String> },

    #[error("Position {0} does not fit in a 32-bit signed integer")]
    InvalidPosition(u64),

    #[error("Record has no position")]
    MissingPosition,

    #[error("Invalid {field} value: {source}")]
    InvalidInfoValue {
        field: String,
        #[source]
        source: io::Error,
    },

    #[error("{field} is not a {expected} field")]
    UnexpectedInfoType { field: String, expected: &'static str },

    #[error(
        "Inputs overlap on {contig}: both {} and {} contain rows for it",
        .first.display(),
        .second.display()
    )]
    OverlappingInputs {
        contig: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Duplicate site {contig}:{position} {} in {}", .alleles.join("/"), .path.display())]
    DuplicateSite {
        contig: String,
        position: i32,
        alleles: Vec<String>,
        path: PathBuf,
    },

    #[error(transparent)]
    DriverMemory(#[from] DriverMemoryExceeded),

    #[error("Too many bad records ({count} > {max})")]
    TooManyErrors { count: usize, max: usize },
}

/// One or more coordinate-sorted VRS-annotated VCFs (.vcf, .vcf.gz, .vcf.bgz)
///
/// Inputs are a union of disjoint tables: each contig must come from a single
/// file, and a `(position, alleles)` key may appear only once.
#[derive(Debug)]
pub struct VcfSource {
    paths: Vec<PathBuf>,

    /// Maximum number of bad records before failing
    pub max_errors: usize,

    /// Records on the contig but outside its interval (for reporting)
    pub skipped_count: usize,

    /// Bad records (for reporting)
    pub error_count: usize,
}

/// Alleles already seen at the current position of a sorted contig block
#[derive(Debug, Default)]
struct SiteTracker {
    position: Option<i32>,
    alleles: Vec<Vec<String>>,
}

impl SiteTracker {
    /// False when `row` repeats a key seen in this block
    fn insert(&mut self, row: &VariantRow) -> bool {
        if self.position != Some(row.position) {
            self.position = Some(row.position);
            self.alleles.clear();
        }
        if self.alleles.contains(&row.alleles) {
            return false;
        }
        self.alleles.push(row.alleles.clone());
        true
    }
}

impl VcfSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            max_errors: 1000,
            skipped_count: 0,
            error_count: 0,
        }
    }

    /// Set maximum allowed bad records
    pub fn with_max_errors(mut self, max: usize) -> Self {
        self.max_errors = max;
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn open(path: &Path) -> Result<(vcf::io::Reader<Box<dyn io::BufRead>>, vcf::Header), VrsVcfError> {
        let mut reader = vcf::io::reader::Builder::default()
            .build_from_path(path)
            .map_err(|source| VrsVcfError::FileOpen {
                path: path.to_path_buf(),
                source,
            })?;

        let header = reader.read_header().map_err(|source| VrsVcfError::Header {
            path: path.to_path_buf(),
            source,
        })?;

        Ok((reader, header))
    }

    /// Count a bad record, failing once the budget is exhausted
    fn record_error(&mut self, path: &Path, line_num: usize, message: &str) -> Result<(), VrsVcfError> {
        warn!("{}: record {}: {}", path.display(), line_num + 1, message);
        self.error_count += 1;

        if self.error_count > self.max_errors {
            return Err(VrsVcfError::TooManyErrors {
                count: self.error_count,
                max: self.max_errors,
            });
        }
        Ok(())
    }

    fn read_file_interval(
        &mut self,
        path: &Path,
        interval: &LocusInterval,
        budget: &mut RowBudget,
        rows: &mut Vec<VariantRow>,
    ) -> Result<(), VrsVcfError> {
        let (mut reader, header) = Self::open(path)?;
        let mut in_contig = false;
        let mut sites = SiteTracker::default();

        for (line_num, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    self.record_error(path, line_num, &format!("Failed to read record: {}", e))?;
                    continue;
                }
            };

            if record.reference_sequence_name() != interval.contig {
                // Sorted input: once the contig block is behind us nothing else matches
                if in_contig {
                    break;
                }
                continue;
            }
            in_contig = true;

            let position = match record.variant_start() {
                Some(Ok(pos)) => pos.get() as u64,
                Some(Err(e)) => {
                    self.record_error(path, line_num, &format!("Failed to get position: {}", e))?;
                    continue;
                }
                None => {
                    self.record_error(path, line_num, &VrsVcfError::MissingPosition.to_string())?;
                    continue;
                }
            };

            if !interval.contains(&interval.contig, position) {
                self.skipped_count += 1;
                continue;
            }

            let reference_bases = record.reference_bases().to_string();
            let alternate_bases = match record
                .alternate_bases()
                .iter()
                .map(|alt| alt.map(|a| a.to_string()))
                .collect::<io::Result<Vec<String>>>()
            {
                Ok(alts) => alts,
                Err(e) => {
                    self.record_error(path, line_num, &format!("Failed to get ALT alleles: {}", e))?;
                    continue;
                }
            };

            let row = match row_from_record(position, reference_bases, alternate_bases, &header, &record.info()) {
                Ok(row) => row,
                Err(e) => {
                    self.record_error(path, line_num, &e.to_string())?;
                    continue;
                }
            };

            if !sites.insert(&row) {
                return Err(VrsVcfError::DuplicateSite {
                    contig: interval.contig.clone(),
                    position: row.position,
                    alleles: row.alleles,
                    path: path.to_path_buf(),
                });
            }
            budget.charge(&interval.contig, &row)?;
            rows.push(row);
        }

        Ok(())
    }
}

impl VariantSource for VcfSource {
    fn describe(&self) -> String {
        match self.paths.as_slice() {
            [single] => single.display().to_string(),
            paths => format!("{} VCF files", paths.len()),
        }
    }

    fn validate_schema(&mut self) -> Result<()> {
        for path in &self.paths {
            let (_reader, header) = Self::open(path)?;
            check_header(path, &header)?;
            debug!("Header OK: {}", path.display());
        }
        Ok(())
    }

    // TODO: seek with the tabix index when one sits next to the VCF instead of streaming to the contig
    fn read_interval(&mut self, interval: &LocusInterval, budget: &mut RowBudget) -> Result<Vec<VariantRow>> {
        let mut rows = Vec::new();
        let mut contributor: Option<PathBuf> = None;
        let paths = self.paths.clone();

        for path in &paths {
            let before = rows.len();
            self.read_file_interval(path, interval, budget, &mut rows)?;
            let added = rows.len() - before;
            debug!("{}: {} rows from {}", interval.contig, added, path.display());

            if added == 0 {
                continue;
            }
            if let Some(first) = &contributor {
                return Err(VrsVcfError::OverlappingInputs {
                    contig: interval.contig.clone(),
                    first: first.clone(),
                    second: path.clone(),
                }
                .into());
            }
            contributor = Some(path.clone());
        }

        info!(
            "{}: {} rows read ({} outside interval, {} bad records so far)",
            interval, rows.len(), self.skipped_count, self.error_count
        );
        Ok(rows)
    }
}

/// Every VRS INFO field must be declared in the header
fn check_header(path: &Path, header: &vcf::Header) -> Result<(), VrsVcfError> {
    let missing: Vec<String> = VRS_INFO_FIELDS
        .iter()
        .filter(|field| !header.infos().contains_key(**field))
        .map(|field| format!("info.{}", field))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(VrsVcfError::MissingFields {
            path: path.to_path_buf(),
            fields: missing,
        })
    }
}

/// Build a flattened row from one record, decoding VRS INFO values by their header types
fn row_from_record(
    position: u64,
    reference_bases: String,
    alternate_bases: Vec<String>,
    header: &vcf::Header,
    info: &vcf::record::Info<'_>,
) -> Result<VariantRow, VrsVcfError> {
    let mut alleles = Vec::with_capacity(alternate_bases.len() + 1);
    alleles.push(reference_bases);
    alleles.extend(alternate_bases);

    Ok(VariantRow {
        position: position_i32(position)?,
        alleles,
        vrs_allele_ids: string_list(header, info, "VRS_Allele_IDs")?,
        vrs_error: string_list(header, info, "VRS_Error")?,
        vrs_starts: int_list(header, info, "VRS_Starts")?,
        vrs_ends: int_list(header, info, "VRS_Ends")?,
        vrs_states: string_list(header, info, "VRS_States")?,
        vrs_lengths: int_list(header, info, "VRS_Lengths")?,
        vrs_repeat_subunit_lengths: int_list(header, info, "VRS_RepeatSubunitLengths")?,
    })
}

fn position_i32(position: u64) -> Result<i32, VrsVcfError> {
    i32::try_from(position).map_err(|_| VrsVcfError::InvalidPosition(position))
}

/// Typed INFO value; absent keys and `.` are `None`
fn info_value<'r>(
    header: &'r vcf::Header,
    info: &'r vcf::record::Info<'r>,
    key: &str,
) -> Result<Option<Value<'r>>, VrsVcfError> {
    info.get(header, key)
        .transpose()
        .map(Option::flatten)
        .map_err(|source| VrsVcfError::InvalidInfoValue {
            field: key.to_string(),
            source,
        })
}

fn string_list(
    header: &vcf::Header,
    info: &vcf::record::Info<'_>,
    key: &str,
) -> Result<Option<Vec<Option<String>>>, VrsVcfError> {
    let invalid = |source| VrsVcfError::InvalidInfoValue {
        field: key.to_string(),
        source,
    };

    match info_value(header, info, key)? {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(vec![Some(value.into_owned())])),
        Some(Value::Array(Array::String(values))) => values
            .iter()
            .map(|item| item.map(|value| value.map(|s| s.into_owned())))
            .collect::<io::Result<Vec<_>>>()
            .map(Some)
            .map_err(invalid),
        Some(_) => Err(VrsVcfError::UnexpectedInfoType {
            field: key.to_string(),
            expected: "String",
        }),
    }
}

fn int_list(
    header: &vcf::Header,
    info: &vcf::record::Info<'_>,
    key: &str,
) -> Result<Option<Vec<Option<i32>>>, VrsVcfError> {
    let invalid = |source| VrsVcfError::InvalidInfoValue {
        field: key.to_string(),
        source,
    };

    match info_value(header, info, key)? {
        None => Ok(None),
        Some(Value::Integer(value)) => Ok(Some(vec![Some(value)])),
        Some(Value::Array(Array::Integer(values))) => values
            .iter()
            .collect::<io::Result<Vec<_>>>()
            .map(Some)
            .map_err(invalid),
        Some(_) => Err(VrsVcfError::UnexpectedInfoType {
            field: key.to_string(),
            expected: "Integer",
        }),
    }
}
