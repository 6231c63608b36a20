// ==============================================================================
// models.rs - Flattened Variant Data Models
// ==============================================================================
// Description: Row and codec types for the contig-partitioned VRS dataset
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-15
// Version: 1.0.0
// ==============================================================================

use parquet::basic::{Compression, ZstdLevel};
use serde::{Deserialize, Serialize};

/// INFO fields every input must declare, in output column order
pub const VRS_INFO_FIELDS: [&str; 7] = [
    "VRS_Allele_IDs",
    "VRS_Error",
    "VRS_Starts",
    "VRS_Ends",
    "VRS_States",
    "VRS_Lengths",
    "VRS_RepeatSubunitLengths",
];

/// One variant site with the locus flattened to its position
///
/// The contig is not stored: it is encoded by the `contig=<name>` directory the
/// row is written under.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantRow {
    /// 1-based position on the contig
    pub position: i32,

    /// REF followed by each ALT allele
    pub alleles: Vec<String>,

    pub vrs_allele_ids: Option<Vec<Option<String>>>,
    pub vrs_error: Option<Vec<Option<String>>>,
    pub vrs_starts: Option<Vec<Option<i32>>>,
    pub vrs_ends: Option<Vec<Option<i32>>>,
    pub vrs_states: Option<Vec<Option<String>>>,
    pub vrs_lengths: Option<Vec<Option<i32>>>,
    pub vrs_repeat_subunit_lengths: Option<Vec<Option<i32>>>,
}

impl VariantRow {
    /// Rough in-memory footprint, used to check the driver memory budget
    pub fn estimated_size(&self) -> usize {
        fn strings(values: &Option<Vec<Option<String>>>) -> usize {
            values.as_ref().map_or(0, |v| {
                v.iter()
                    .map(|s| std::mem::size_of::<Option<String>>() + s.as_ref().map_or(0, String::len))
                    .sum()
            })
        }
        fn ints(values: &Option<Vec<Option<i32>>>) -> usize {
            values
                .as_ref()
                .map_or(0, |v| v.len() * std::mem::size_of::<Option<i32>>())
        }

        std::mem::size_of::<Self>()
            + self
                .alleles
                .iter()
                .map(|a| std::mem::size_of::<String>() + a.len())
                .sum::<usize>()
            + strings(&self.vrs_allele_ids)
            + strings(&self.vrs_error)
            + ints(&self.vrs_starts)
            + ints(&self.vrs_ends)
            + strings(&self.vrs_states)
            + ints(&self.vrs_lengths)
            + ints(&self.vrs_repeat_subunit_lengths)
    }
}

/// Parquet compression codec for written part files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCodec {
    #[default]
    Zstd,
    Snappy,
}

impl ParquetCodec {
    /// Tag used in part-file names (`part-00000-<uuid>-c000.zstd.parquet`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ParquetCodec::Zstd => "zstd",
            ParquetCodec::Snappy => "snappy",
        }
    }

    pub fn compression(&self) -> Compression {
        match self {
            ParquetCodec::Zstd => Compression::ZSTD(ZstdLevel::default()),
            ParquetCodec::Snappy => Compression::SNAPPY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_names() {
        assert_eq!(ParquetCodec::default(), ParquetCodec::Zstd);
        assert_eq!(ParquetCodec::Zstd.as_str(), "zstd");
        assert_eq!(ParquetCodec::Snappy.as_str(), "snappy");
        assert_eq!(ParquetCodec::Snappy.compression(), Compression::SNAPPY);
    }

    #[test]
    fn test_codec_serde() {
        let json = serde_json::to_string(&ParquetCodec::Snappy).unwrap();
        assert_eq!(json, "\"snappy\"");
    }

    #[test]
    fn test_estimated_size_grows_with_content() {
        let empty = VariantRow::default();
        let row = VariantRow {
            position: 10,
            alleles: vec!["A".to_string(), "ATTT".to_string()],
            vrs_allele_ids: Some(vec![Some("ga4gh:VA.abc".to_string()), None]),
            vrs_starts: Some(vec![Some(9), Some(9)]),
            ..Default::default()
        };
        assert!(row.estimated_size() > empty.estimated_size());
    }
}
