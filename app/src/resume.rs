// ==============================================================================
// resume.rs - Resume/Overwrite Gate for Contig Outputs
// ==============================================================================
// Description: Decides whether a contig directory should be (re)written,
//              skipped as already complete, or rejected as a conflict
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::layout::success_marker_exists;

/// Outcome of the gate for one contig directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDecision {
    Proceed,
    Skip,
}

#[derive(Error, Debug)]
pub enum OutputConflict {
    #[error("Output path already exists (use --overwrite to replace or --resume to skip): {}", .0.display())]
    Exists(PathBuf),

    #[error("Failed to delete existing output directory {}: {source}", .path.display())]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Gate a contig output directory before writing
///
/// Order of checks:
/// 1. Path absent → proceed
/// 2. `resume` and the completion marker present → skip (directory untouched)
/// 3. `overwrite` → delete recursively, then proceed
/// 4. Otherwise → conflict naming both remedies
///
/// Resume is checked before overwrite, so with both set a complete directory is
/// skipped, not deleted.
pub fn prepare_output_dir(
    path: &Path,
    overwrite: bool,
    resume: bool,
) -> Result<WriteDecision, OutputConflict> {
    if !path.exists() {
        return Ok(WriteDecision::Proceed);
    }

    if resume && success_marker_exists(path) {
        info!("Output exists and looks complete; skipping: {}", path.display());
        return Ok(WriteDecision::Skip);
    }

    if overwrite {
        info!("Deleting existing output directory: {}", path.display());
        std::fs::remove_dir_all(path).map_err(|source| OutputConflict::DeleteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(WriteDecision::Proceed);
    }

    Err(OutputConflict::Exists(path.to_path_buf()))
}
