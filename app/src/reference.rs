// ==============================================================================
// reference.rs - Reference Genomes and Contig Selection
// ==============================================================================
// Description: Primary and mitochondrial contigs for GRCh37/GRCh38, contig
//              list parsing, and whole-contig locus intervals used to filter
//              the variant source
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// GRCh38 primary assembly (UCSC-style names)
const GRCH38_CONTIGS: [(&str, u32); 24] = [
    ("chr1", 248_956_422),
    ("chr2", 242_193_529),
    ("chr3", 198_295_559),
    ("chr4", 190_214_555),
    ("chr5", 181_538_259),
    ("chr6", 170_805_979),
    ("chr7", 159_345_973),
    ("chr8", 145_138_636),
    ("chr9", 138_394_717),
    ("chr10", 133_797_422),
    ("chr11", 135_086_622),
    ("chr12", 133_275_309),
    ("chr13", 114_364_328),
    ("chr14", 107_043_718),
    ("chr15", 101_991_189),
    ("chr16", 90_338_345),
    ("chr17", 83_257_441),
    ("chr18", 80_373_285),
    ("chr19", 58_617_616),
    ("chr20", 64_444_167),
    ("chr21", 46_709_983),
    ("chr22", 50_818_468),
    ("chrX", 156_040_895),
    ("chrY", 57_227_415),
];

/// GRCh37 primary assembly (Ensembl-style names)
const GRCH37_CONTIGS: [(&str, u32); 24] = [
    ("1", 249_250_621),
    ("2", 243_199_373),
    ("3", 198_022_430),
    ("4", 191_154_276),
    ("5", 180_915_260),
    ("6", 171_115_067),
    ("7", 159_138_663),
    ("8", 146_364_022),
    ("9", 141_213_431),
    ("10", 135_534_747),
    ("11", 135_006_516),
    ("12", 133_851_895),
    ("13", 115_169_878),
    ("14", 107_349_540),
    ("15", 102_531_392),
    ("16", 90_354_753),
    ("17", 81_195_210),
    ("18", 78_077_248),
    ("19", 59_128_983),
    ("20", 63_025_520),
    ("21", 48_129_895),
    ("22", 51_304_566),
    ("X", 155_270_560),
    ("Y", 59_373_566),
];

/// rCRS length; both builds use the same mitochondrial sequence
const MITOCHONDRIAL_LENGTH: u32 = 16_569;

#[derive(Error, Debug, PartialEq)]
pub enum ReferenceError {
    #[error("Unknown reference genome: {0} (expected GRCh38 or GRCh37)")]
    UnknownReference(String),

    #[error("Contig {contig} is not a primary or mitochondrial contig of {reference}")]
    UnknownContig { contig: String, reference: String },
}

/// Reference genome the variant coordinates are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceGenome {
    GRCh37,
    GRCh38,
}

impl ReferenceGenome {
    pub fn name(&self) -> &'static str {
        match self {
            ReferenceGenome::GRCh37 => "GRCh37",
            ReferenceGenome::GRCh38 => "GRCh38",
        }
    }

    /// Primary contigs (1-22, X, Y) with their lengths, in karyotype order
    pub fn contigs(&self) -> &'static [(&'static str, u32)] {
        match self {
            ReferenceGenome::GRCh37 => &GRCH37_CONTIGS,
            ReferenceGenome::GRCh38 => &GRCH38_CONTIGS,
        }
    }

    /// Mitochondrial contig name; exportable but not part of the default set
    pub fn mitochondrial_contig(&self) -> &'static str {
        match self {
            ReferenceGenome::GRCh37 => "MT",
            ReferenceGenome::GRCh38 => "chrM",
        }
    }

    pub fn contig_length(&self, contig: &str) -> Option<u32> {
        if contig == self.mitochondrial_contig() {
            return Some(MITOCHONDRIAL_LENGTH);
        }
        self.contigs()
            .iter()
            .find(|(name, _)| *name == contig)
            .map(|(_, length)| *length)
    }

    /// The fixed 24-contig human set exported when no contigs are requested
    pub fn default_contigs(&self) -> Vec<String> {
        self.contigs()
            .iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

impl FromStr for ReferenceGenome {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "grch38" | "hg38" => Ok(ReferenceGenome::GRCh38),
            "grch37" | "hg19" => Ok(ReferenceGenome::GRCh37),
            _ => Err(ReferenceError::UnknownReference(s.to_string())),
        }
    }
}

impl fmt::Display for ReferenceGenome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expand repeated and/or comma-separated contig arguments
///
/// `["chr1,chr2", " chrX "]` becomes `["chr1", "chr2", "chrX"]`. Empty items are
/// dropped; if nothing remains the reference's default contig set is returned.
pub fn parse_contigs(args: &[String], reference: ReferenceGenome) -> Vec<String> {
    let contigs: Vec<String> = args
        .iter()
        .flat_map(|item| item.split(','))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();

    if contigs.is_empty() {
        reference.default_contigs()
    } else {
        contigs
    }
}

/// Closed 1-based interval on a single contig
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocusInterval {
    pub contig: String,
    pub start: u32,
    pub end: u32,
}

impl LocusInterval {
    /// Interval spanning the entire contig, validated against the reference
    pub fn whole_contig(contig: &str, reference: ReferenceGenome) -> Result<Self, ReferenceError> {
        let length = reference
            .contig_length(contig)
            .ok_or_else(|| ReferenceError::UnknownContig {
                contig: contig.to_string(),
                reference: reference.name().to_string(),
            })?;

        Ok(Self {
            contig: contig.to_string(),
            start: 1,
            end: length,
        })
    }

    pub fn contains(&self, contig: &str, position: u64) -> bool {
        contig == self.contig && position >= u64::from(self.start) && position <= u64::from(self.end)
    }
}

impl fmt::Display for LocusInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}
