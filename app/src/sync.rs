// ==============================================================================
// sync.rs - Object Storage Sync
// ==============================================================================
// Description: Mirrors the local output root to gs:// or s3:// with
//              `gcloud storage rsync`
// Author: Matt Barham
// Created: 2026-10-15
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

const SUPPORTED_SCHEMES: [&str; 2] = ["gs://", "s3://"];

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Unsupported sync destination {0} (expected gs://... or s3://...)")]
    UnsupportedScheme(String),

    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },
}

/// Remote mirror of a local directory tree
#[derive(Debug, Clone)]
pub struct StorageSync {
    program: String,
    destination: String,
    delete_unmatched: bool,
}

impl StorageSync {
    /// `delete_unmatched` removes remote objects that no longer exist locally
    pub fn new(destination: &str, delete_unmatched: bool) -> Result<Self, SyncError> {
        if !SUPPORTED_SCHEMES.iter().any(|scheme| destination.starts_with(scheme)) {
            return Err(SyncError::UnsupportedScheme(destination.to_string()));
        }
        Ok(Self {
            program: "gcloud".to_string(),
            destination: destination.trim_end_matches('/').to_string(),
            delete_unmatched,
        })
    }

    /// Use a different executable (same argument layout)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn args(&self, source: &Path) -> Vec<String> {
        let mut args = vec!["storage".to_string(), "rsync".to_string(), "-r".to_string()];
        if self.delete_unmatched {
            args.push("--delete-unmatched-destination-objects".to_string());
        }
        args.push(format!("{}/", source.display().to_string().trim_end_matches('/')));
        args.push(format!("{}/", self.destination));
        args
    }

    /// Run the sync and wait for it; a non-zero exit is an error
    pub async fn run(&self, source: &Path) -> Result<(), SyncError> {
        let args = self.args(source);
        info!("Syncing: {} {}", self.program, args.join(" "));

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .await
            .map_err(|source| SyncError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(SyncError::Failed {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }

        info!("Synced {} -> {}", source.display(), self.destination);
        Ok(())
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}
