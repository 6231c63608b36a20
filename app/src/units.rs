// ==============================================================================
// units.rs - Byte Size Parsing and Formatting
// ==============================================================================
// Description: Memory settings like "6g" and human-readable file sizes
// Author: Matt Barham
// Created: 2026-10-13
// Modified: 2026-10-13
// Version: 1.0.0
// ==============================================================================

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const KIB: u64 = 1024;

#[derive(Error, Debug, PartialEq)]
pub enum ByteSizeError {
    #[error("Empty byte size")]
    Empty,

    #[error("Invalid byte size: {0} (expected e.g. 512m, 6g)")]
    Invalid(String),
}

/// A size in bytes, parsed from engine-style strings (`512`, `64k`, `6g`, `1tb`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn bytes(&self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = ByteSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        if trimmed.is_empty() {
            return Err(ByteSizeError::Empty);
        }

        let unit_start = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(unit_start);

        let value: u64 = digits
            .parse()
            .map_err(|_| ByteSizeError::Invalid(s.to_string()))?;

        let multiplier = match unit.trim_end_matches("ib").trim_end_matches('b') {
            "" => 1,
            "k" => KIB,
            "m" => KIB.pow(2),
            "g" => KIB.pow(3),
            "t" => KIB.pow(4),
            _ => return Err(ByteSizeError::Invalid(s.to_string())),
        };

        value
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| ByteSizeError::Invalid(s.to_string()))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&human_bytes(self.0))
    }
}

/// Format a byte count with binary units: `512 B`, `1.50 KiB`, `6.00 GiB`
pub fn human_bytes(num_bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = num_bytes as f64;
    for (idx, unit) in UNITS.iter().enumerate() {
        if value < 1024.0 || idx == UNITS.len() - 1 {
            if idx == 0 {
                return format!("{} {}", num_bytes, unit);
            }
            return format!("{:.2} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{} B", num_bytes)
}
