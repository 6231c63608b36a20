// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for variant input formats
// Author: Matt Barham
// Created: 2026-10-13
// Modified: 2026-10-13
// Version: 1.0.0
// ==============================================================================

pub mod vcf;

pub use vcf::{VcfSource, VrsVcfError};
