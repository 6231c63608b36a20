// ==============================================================================
// sampler.rs - Bounded Position Sampler
// ==============================================================================
// Description: Reads a few rows of the position column from a few randomly
//              chosen files instead of scanning the whole contig
// Author: Matt Barham
// Created: 2026-10-15
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use arrow::array::AsArray;
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type};
use arrow::error::ArrowError;
use futures::TryStreamExt;
use object_store::{ObjectMeta, ObjectStore};
use parquet::arrow::async_reader::ParquetObjectReader;
use parquet::arrow::{ParquetRecordBatchStreamBuilder, ProjectionMask};
use parquet::errors::ParquetError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use vrs_parquet::output::POSITION_COLUMN;

/// Why one sampled file contributed nothing
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("Failed to read Parquet {location}: {source}")]
    Parquet {
        location: String,
        #[source]
        source: ParquetError,
    },

    #[error("Failed to decode positions in {location}: {source}")]
    Arrow {
        location: String,
        #[source]
        source: ArrowError,
    },

    #[error("No 'position' column in {0}")]
    MissingPosition(String),
}

/// Raw sampler output; positions may repeat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleOutcome {
    pub positions: Vec<i64>,
    pub files_sampled: usize,
    pub files_failed: usize,
}

/// Sample positions from `min(n_files, files.len())` distinct files chosen with a seeded RNG
///
/// Unreadable files are counted in `files_failed` and otherwise ignored.
pub async fn sample_positions(
    store: &Arc<dyn ObjectStore>,
    files: &[ObjectMeta],
    n_files: usize,
    n_rows_per_file: usize,
    seed: u64,
) -> SampleOutcome {
    let chosen = choose_files(files, n_files, seed);

    let mut outcome = SampleOutcome {
        files_sampled: chosen.len(),
        ..Default::default()
    };

    for meta in &chosen {
        match read_positions(store.clone(), meta, n_rows_per_file).await {
            Ok(positions) => outcome.positions.extend(positions),
            Err(e) => {
                debug!("Skipping sample file: {}", e);
                outcome.files_failed += 1;
            }
        }
    }

    outcome
}

/// Files `sample_positions` would read, in choice order
pub fn choose_files<T: Clone>(files: &[T], n_files: usize, seed: u64) -> Vec<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    files
        .choose_multiple(&mut rng, n_files.min(files.len()))
        .cloned()
        .collect()
}

/// Non-null positions from the first `n_rows` rows of one file
pub async fn read_positions(
    store: Arc<dyn ObjectStore>,
    meta: &ObjectMeta,
    n_rows: usize,
) -> Result<Vec<i64>, SampleError> {
    let location = meta.location.to_string();
    let parquet_err = |source| SampleError::Parquet {
        location: location.clone(),
        source,
    };
    let arrow_err = |source| SampleError::Arrow {
        location: location.clone(),
        source,
    };

    let reader = ParquetObjectReader::new(store, meta.clone());
    let builder = ParquetRecordBatchStreamBuilder::new(reader)
        .await
        .map_err(parquet_err)?;
    let index = builder
        .schema()
        .index_of(POSITION_COLUMN)
        .map_err(|_| SampleError::MissingPosition(location.clone()))?;
    let mask = ProjectionMask::roots(builder.parquet_schema(), [index]);

    let mut stream = builder
        .with_projection(mask)
        .with_limit(n_rows)
        .build()
        .map_err(parquet_err)?;

    let mut positions = Vec::with_capacity(n_rows);
    while let Some(batch) = stream.try_next().await.map_err(parquet_err)? {
        let column = cast(batch.column(0), &DataType::Int64).map_err(arrow_err)?;
        positions.extend(column.as_primitive::<Int64Type>().iter().flatten());
    }
    positions.truncate(n_rows);

    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::list_parquet_objects;
    use object_store::local::LocalFileSystem;
    use object_store::memory::InMemory;
    use object_store::path::Path as ObjectPath;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;
    use vrs_parquet::models::{ParquetCodec, VariantRow};
    use vrs_parquet::output::{write_part_file, WriteSettings};

    fn write_file(path: &Path, positions: &[i32]) {
        let rows: Vec<VariantRow> = positions
            .iter()
            .map(|&position| VariantRow {
                position,
                alleles: vec!["C".to_string(), "T".to_string()],
                ..Default::default()
            })
            .collect();
        let settings = WriteSettings {
            codec: ParquetCodec::Snappy,
            row_group_size: 4,
            flush_budget: None,
        };
        write_part_file(path, &rows, &settings).unwrap();
    }

    /// Local store and the parquet objects under `dir`
    async fn local(dir: &Path) -> (Arc<dyn ObjectStore>, Vec<ObjectMeta>) {
        let store: Arc<dyn ObjectStore> = Arc::new(LocalFileSystem::new());
        let prefix = ObjectPath::from_filesystem_path(dir).unwrap();
        let files = list_parquet_objects(store.as_ref(), &prefix).await.unwrap();
        (store, files)
    }

    fn ten_files(dir: &Path) {
        for i in 0..10 {
            let base = i * 1000;
            write_file(
                &dir.join(format!("part-{:05}.parquet", i)),
                &[base + 1, base + 2, base + 3, base + 4, base + 5, base + 6],
            );
        }
    }

    #[test]
    fn test_choose_files_is_seeded_and_distinct() {
        let files: Vec<PathBuf> = (0..10).map(|i| PathBuf::from(format!("f{}.parquet", i))).collect();
        let first = choose_files(&files, 3, 42);
        assert_eq!(first.len(), 3);
        assert_eq!(first, choose_files(&files, 3, 42));

        let mut unique = first.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3);

        assert_eq!(choose_files(&files, 50, 42).len(), 10);
    }

    #[tokio::test]
    async fn test_sample_is_deterministic() {
        let tmp = tempdir().unwrap();
        ten_files(tmp.path());
        let (store, files) = local(tmp.path()).await;
        assert_eq!(files.len(), 10);

        let first = sample_positions(&store, &files, 3, 4, 42).await;
        assert_eq!(first.files_sampled, 3);
        assert_eq!(first.files_failed, 0);
        assert_eq!(first.positions.len(), 12);
        assert_eq!(first, sample_positions(&store, &files, 3, 4, 42).await);
    }

    #[tokio::test]
    async fn test_read_positions_respects_row_bound() {
        let tmp = tempdir().unwrap();
        write_file(&tmp.path().join("part.parquet"), &[5, 6, 7, 8, 9, 10, 11, 12, 13]);
        let (store, files) = local(tmp.path()).await;
        let meta = &files[0];

        assert_eq!(read_positions(store.clone(), meta, 3).await.unwrap(), vec![5, 6, 7]);
        assert_eq!(read_positions(store.clone(), meta, 100).await.unwrap().len(), 9);
        assert!(read_positions(store, meta, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_files_are_counted_not_fatal() {
        let tmp = tempdir().unwrap();
        write_file(&tmp.path().join("good.parquet"), &[100, 200]);
        fs::write(tmp.path().join("bad.parquet"), b"not parquet at all").unwrap();
        let (store, files) = local(tmp.path()).await;

        let outcome = sample_positions(&store, &files, 2, 10, 1).await;
        assert_eq!(outcome.files_sampled, 2);
        assert_eq!(outcome.files_failed, 1);

        let mut positions = outcome.positions;
        positions.sort();
        assert_eq!(positions, vec![100, 200]);
    }

    #[tokio::test]
    async fn test_all_failures_yield_no_positions() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("bad.parquet"), b"PAR1").unwrap();
        write_file(&tmp.path().join("gone.parquet"), &[1, 2, 3]);
        let (store, files) = local(tmp.path()).await;
        // Listed, then removed before sampling
        fs::remove_file(tmp.path().join("gone.parquet")).unwrap();

        let outcome = sample_positions(&store, &files, 5, 10, 9).await;
        assert!(outcome.positions.is_empty());
        assert_eq!(outcome.files_failed, 2);
    }

    #[tokio::test]
    async fn test_samples_from_object_store() {
        let tmp = tempdir().unwrap();
        let local_file = tmp.path().join("part.parquet");
        write_file(&local_file, &[40, 50, 60]);

        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let location = ObjectPath::from("gnomad/contig=chrY/part-00000.parquet");
        store.put(&location, fs::read(&local_file).unwrap().into()).await.unwrap();
        let files = list_parquet_objects(store.as_ref(), &ObjectPath::from("gnomad/contig=chrY"))
            .await
            .unwrap();

        let outcome = sample_positions(&store, &files, 25, 100, 1).await;
        assert_eq!(outcome.files_failed, 0);
        assert_eq!(outcome.positions, vec![40, 50, 60]);
    }
}
