// ==============================================================================
// lib.rs - VRS Parquet Library
// ==============================================================================
// Description: Library interface for the contig-partitioned VRS exporter; the
//              layout, schema, and byte-size helpers are shared with the
//              smoke test
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

pub mod engine;
pub mod exporter;
pub mod layout;
pub mod models;
pub mod output;
pub mod parsers;
pub mod partitioning;
pub mod reference;
pub mod resume;
pub mod source;
pub mod sync;
pub mod units;
