// ==============================================================================
// output.rs - Contig Parquet Output
// ==============================================================================
// Description: Arrow schema for flattened VRS rows, part-file writer, and the
//              staged contig write (stage -> publish -> manifest -> _SUCCESS)
// Author: Matt Barham
// Created: 2026-10-13
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

// Apache Arrow/Parquet for columnar data
use arrow::array::{ArrayRef, Int32Array, Int32Builder, ListBuilder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::{EnabledStatistics, WriterProperties};

use crate::engine::Engine;
use crate::layout::{self, MANIFEST_FILE, SUCCESS_MARKER};
use crate::models::{ParquetCodec, VariantRow};
use crate::reference::ReferenceGenome;

/// Position column name; readers prune row groups on it
pub const POSITION_COLUMN: &str = "position";
pub const ALLELES_COLUMN: &str = "alleles";

/// Schema of every part file: position, alleles, then the VRS annotation lists
pub fn variant_schema() -> SchemaRef {
    let list_of = |data_type: DataType| {
        DataType::List(Arc::new(Field::new("item", data_type, true)))
    };

    Arc::new(Schema::new(vec![
        Field::new(POSITION_COLUMN, DataType::Int32, false),
        Field::new(ALLELES_COLUMN, list_of(DataType::Utf8), true),
        Field::new("VRS_Allele_IDs", list_of(DataType::Utf8), true),
        Field::new("VRS_Error", list_of(DataType::Utf8), true),
        Field::new("VRS_Starts", list_of(DataType::Int32), true),
        Field::new("VRS_Ends", list_of(DataType::Int32), true),
        Field::new("VRS_States", list_of(DataType::Utf8), true),
        Field::new("VRS_Lengths", list_of(DataType::Int32), true),
        Field::new("VRS_RepeatSubunitLengths", list_of(DataType::Int32), true),
    ]))
}

fn string_lists<'a>(values: impl Iterator<Item = Option<&'a Vec<Option<String>>>>) -> ArrayRef {
    let mut builder = ListBuilder::new(StringBuilder::new());
    for value in values {
        match value {
            Some(items) => {
                for item in items {
                    builder.values().append_option(item.as_deref());
                }
                builder.append(true);
            }
            None => builder.append(false),
        }
    }
    Arc::new(builder.finish())
}

fn int_lists<'a>(values: impl Iterator<Item = Option<&'a Vec<Option<i32>>>>) -> ArrayRef {
    let mut builder = ListBuilder::new(Int32Builder::new());
    for value in values {
        match value {
            Some(items) => {
                for item in items {
                    builder.values().append_option(*item);
                }
                builder.append(true);
            }
            None => builder.append(false),
        }
    }
    Arc::new(builder.finish())
}

/// Convert rows to a RecordBatch in `variant_schema()` column order
pub fn rows_to_batch(rows: &[VariantRow]) -> Result<RecordBatch> {
    let position: ArrayRef = Arc::new(Int32Array::from(
        rows.iter().map(|r| r.position).collect::<Vec<_>>(),
    ));

    let mut alleles = ListBuilder::new(StringBuilder::new());
    for row in rows {
        for allele in &row.alleles {
            alleles.values().append_value(allele);
        }
        alleles.append(true);
    }
    let alleles: ArrayRef = Arc::new(alleles.finish());

    RecordBatch::try_new(
        variant_schema(),
        vec![
            position,
            alleles,
            string_lists(rows.iter().map(|r| r.vrs_allele_ids.as_ref())),
            string_lists(rows.iter().map(|r| r.vrs_error.as_ref())),
            int_lists(rows.iter().map(|r| r.vrs_starts.as_ref())),
            int_lists(rows.iter().map(|r| r.vrs_ends.as_ref())),
            string_lists(rows.iter().map(|r| r.vrs_states.as_ref())),
            int_lists(rows.iter().map(|r| r.vrs_lengths.as_ref())),
            int_lists(rows.iter().map(|r| r.vrs_repeat_subunit_lengths.as_ref())),
        ],
    )
    .context("Failed to create Arrow RecordBatch")
}

/// Per-writer settings derived from the engine
#[derive(Debug, Clone, Copy)]
pub struct WriteSettings {
    pub codec: ParquetCodec,
    pub row_group_size: usize,
    /// Buffered bytes after which the writer flushes a row group early
    pub flush_budget: Option<usize>,
}

impl WriteSettings {
    pub fn from_engine(engine: &Engine) -> Self {
        let config = engine.config();
        Self {
            codec: config.codec,
            row_group_size: config.row_group_size,
            flush_budget: engine.writer_flush_budget(),
        }
    }

    fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.codec.compression())
            .set_max_row_group_size(self.row_group_size)
            .set_statistics_enabled(EnabledStatistics::Chunk)
            .build()
    }
}

/// One written part file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartFileSummary {
    /// Current location (staging until published)
    #[serde(skip)]
    pub path: PathBuf,

    pub file_name: String,
    pub rows: usize,
    pub bytes: u64,
    pub min_position: Option<i32>,
    pub max_position: Option<i32>,
}

/// Write one part file; an empty `rows` still produces a valid file carrying the schema
pub fn write_part_file(path: &Path, rows: &[VariantRow], settings: &WriteSettings) -> Result<PartFileSummary> {
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create Parquet file {}", path.display()))?;

    let mut writer = ArrowWriter::try_new(file, variant_schema(), Some(settings.writer_properties()))
        .context("Failed to create Parquet writer")?;

    for chunk in rows.chunks(settings.row_group_size.max(1)) {
        let batch = rows_to_batch(chunk)?;
        writer.write(&batch).context("Failed to write Parquet data")?;

        if let Some(budget) = settings.flush_budget {
            if writer.in_progress_size() >= budget {
                debug!(
                    "{}: flushing row group at {} buffered bytes",
                    path.display(),
                    writer.in_progress_size()
                );
                writer.flush().context("Failed to flush Parquet row group")?;
            }
        }
    }
    writer.close().context("Failed to close Parquet writer")?;

    let bytes = fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(PartFileSummary {
        path: path.to_path_buf(),
        file_name,
        rows: rows.len(),
        bytes,
        min_position: rows.iter().map(|r| r.position).min(),
        max_position: rows.iter().map(|r| r.position).max(),
    })
}

/// Summary of one contig directory, written as `_MANIFEST.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContigManifest {
    pub contig: String,
    pub reference: String,
    pub run_id: Uuid,
    pub codec: ParquetCodec,
    pub sorted_within_partitions: bool,
    pub total_rows: usize,
    pub files: Vec<PartFileSummary>,
    pub written_at: DateTime<Utc>,
}

impl ContigManifest {
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let raw = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_slice(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }
}

/// Writes the files of one contig through a staging directory
pub struct ContigWriter<'a> {
    engine: &'a Engine,
    reference: ReferenceGenome,
    sorted_within_partitions: bool,
}

impl<'a> ContigWriter<'a> {
    pub fn new(engine: &'a Engine, reference: ReferenceGenome, sorted_within_partitions: bool) -> Self {
        Self {
            engine,
            reference,
            sorted_within_partitions,
        }
    }

    /// Write `files` (one part file each) into `out_dir`
    ///
    /// Part files are written concurrently into a fresh staging directory,
    /// bounded by the engine's write threads, then moved into `out_dir`. The
    /// manifest follows and `_SUCCESS` is written last.
    pub async fn write(&self, contig: &str, out_dir: &Path, files: Vec<Vec<VariantRow>>) -> Result<ContigManifest> {
        let run_id = Uuid::new_v4();
        let staging = self.engine.staging_dir(&run_id);
        fs::create_dir_all(&staging)
            .with_context(|| format!("Failed to create staging dir {}", staging.display()))?;

        let result = self.write_staged(contig, &staging, &run_id, files).await;
        let summaries = match result {
            Ok(summaries) => summaries,
            Err(e) => {
                remove_staging(&staging);
                return Err(e);
            }
        };

        let published = publish(&staging, out_dir, summaries);
        remove_staging(&staging);
        let files = published?;

        let manifest = ContigManifest {
            contig: contig.to_string(),
            reference: self.reference.name().to_string(),
            run_id,
            codec: self.engine.config().codec,
            sorted_within_partitions: self.sorted_within_partitions,
            total_rows: files.iter().map(|f| f.rows).sum(),
            files,
            written_at: Utc::now(),
        };

        let manifest_path = out_dir.join(MANIFEST_FILE);
        let json = serde_json::to_vec_pretty(&manifest).context("Failed to serialize manifest")?;
        fs::write(&manifest_path, json)
            .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

        let marker = out_dir.join(SUCCESS_MARKER);
        fs::write(&marker, b"").with_context(|| format!("Failed to write {}", marker.display()))?;

        info!(
            "{}: {} rows in {} files ({} bytes)",
            contig,
            manifest.total_rows,
            manifest.files.len(),
            manifest.total_bytes()
        );
        Ok(manifest)
    }

    async fn write_staged(
        &self,
        contig: &str,
        staging: &Path,
        run_id: &Uuid,
        files: Vec<Vec<VariantRow>>,
    ) -> Result<Vec<PartFileSummary>> {
        let settings = WriteSettings::from_engine(self.engine);
        let permits = Arc::new(Semaphore::new(self.engine.config().write_threads));
        let mut handles = Vec::with_capacity(files.len());

        for (index, rows) in files.into_iter().enumerate() {
            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .context("Write semaphore closed")?;
            let path = staging.join(layout::part_file_name(index, run_id, settings.codec));

            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                write_part_file(&path, &rows, &settings)
            }));
        }

        let summaries = join_writers(handles).await?;
        for summary in &summaries {
            debug!("{}: staged {} ({} rows)", contig, summary.file_name, summary.rows);
        }
        Ok(summaries)
    }
}

/// Await every writer task, then report the first failure
///
/// Nothing may still be writing into the staging directory when the caller
/// removes it.
async fn join_writers<T>(handles: Vec<JoinHandle<Result<T>>>) -> Result<Vec<T>> {
    let mut outputs = Vec::with_capacity(handles.len());
    let mut first_error = None;

    for handle in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(anyhow::Error::new(e).context("Part-file writer task failed")),
        };
        match result {
            Ok(output) => outputs.push(output),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(outputs),
    }
}

/// Move staged part files into the contig directory
fn publish(staging: &Path, out_dir: &Path, summaries: Vec<PartFileSummary>) -> Result<Vec<PartFileSummary>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output dir {}", out_dir.display()))?;

    summaries
        .into_iter()
        .map(|mut summary| {
            let dest = out_dir.join(&summary.file_name);
            move_file(&staging.join(&summary.file_name), &dest)?;
            summary.path = dest;
            Ok(summary)
        })
        .collect()
}

/// Rename, falling back to copy + remove when the rename crosses devices
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)
        .with_context(|| format!("Failed to publish {} to {}", from.display(), to.display()))?;
    fs::remove_file(from).with_context(|| format!("Failed to remove staged {}", from.display()))?;
    Ok(())
}

fn remove_staging(staging: &Path) {
    if let Err(e) = fs::remove_dir_all(staging) {
        warn!("Failed to remove staging dir {}: {}", staging.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use arrow::array::{Array, ListArray, StringArray};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::tempdir;

    fn row(position: i32) -> VariantRow {
        VariantRow {
            position,
            alleles: vec!["A".to_string(), "G".to_string()],
            vrs_allele_ids: Some(vec![
                Some(format!("ga4gh:VA.ref{}", position)),
                Some(format!("ga4gh:VA.alt{}", position)),
            ]),
            vrs_starts: Some(vec![Some(position - 1), None]),
            ..Default::default()
        }
    }

    fn settings(row_group_size: usize) -> WriteSettings {
        WriteSettings {
            codec: ParquetCodec::Zstd,
            row_group_size,
            flush_budget: None,
        }
    }

    #[test]
    fn test_rows_to_batch_nulls() {
        let rows = vec![row(10), VariantRow { position: 20, ..Default::default() }];
        let batch = rows_to_batch(&rows).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 9);

        let ids = batch
            .column_by_name("VRS_Allele_IDs")
            .unwrap()
            .as_any()
            .downcast_ref::<ListArray>()
            .unwrap();
        assert!(ids.is_valid(0));
        assert!(ids.is_null(1));

        let first = ids.value(0);
        let first = first.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(first.value(1), "ga4gh:VA.alt10");
    }

    #[test]
    fn test_write_part_file_row_groups_and_summary() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("part-00000.parquet");
        let rows: Vec<VariantRow> = (1..=10).map(|p| row(p * 100)).collect();

        let summary = write_part_file(&path, &rows, &settings(4)).unwrap();
        assert_eq!(summary.rows, 10);
        assert_eq!(summary.min_position, Some(100));
        assert_eq!(summary.max_position, Some(1000));
        assert!(summary.bytes > 0);

        let builder = ParquetRecordBatchReaderBuilder::try_new(fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(builder.metadata().num_row_groups(), 3);
        assert_eq!(builder.schema().field(0).name(), POSITION_COLUMN);
        let total: usize = builder.build().unwrap().map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_write_empty_part_file_keeps_schema() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("empty.parquet");
        let summary = write_part_file(&path, &[], &settings(16)).unwrap();
        assert_eq!(summary.rows, 0);
        assert_eq!(summary.min_position, None);

        let builder = ParquetRecordBatchReaderBuilder::try_new(fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(builder.schema().fields().len(), 9);
    }

    #[tokio::test]
    async fn test_contig_write_publishes_then_marks_success() {
        let tmp = tempdir().unwrap();
        let engine = Engine::init(EngineConfig {
            tmp_dir: tmp.path().join("tmp"),
            write_threads: 2,
            ..Default::default()
        })
        .unwrap();
        let out_dir = layout::contig_dir(&tmp.path().join("out"), "chrY");

        let writer = ContigWriter::new(&engine, ReferenceGenome::GRCh38, true);
        let files = vec![vec![row(1), row(2)], vec![row(3)], vec![row(4), row(5), row(6)]];
        let manifest = writer.write("chrY", &out_dir, files).await.unwrap();

        assert_eq!(manifest.total_rows, 6);
        assert_eq!(manifest.files.len(), 3);
        assert!(layout::success_marker_exists(&out_dir));
        assert_eq!(layout::list_parquet_files(&out_dir).unwrap().len(), 3);

        // Staging is cleaned up
        let staging_root = tmp.path().join("tmp").join("_staging");
        assert_eq!(fs::read_dir(&staging_root).unwrap().count(), 0);

        let on_disk = ContigManifest::read(&out_dir).unwrap();
        assert_eq!(on_disk.run_id, manifest.run_id);
        assert_eq!(on_disk.reference, "GRCh38");
        assert!(on_disk.sorted_within_partitions);
        assert_eq!(on_disk.files[2].min_position, Some(4));
    }

    #[tokio::test]
    async fn test_join_writers_waits_for_slow_writers_before_failing() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::time::Duration;

        let finished = Arc::new(AtomicBool::new(false));
        let slow_finished = finished.clone();

        let handles: Vec<JoinHandle<Result<usize>>> = vec![
            tokio::task::spawn_blocking(|| -> Result<usize> { anyhow::bail!("disk full") }),
            tokio::task::spawn_blocking(move || {
                std::thread::sleep(Duration::from_millis(200));
                slow_finished.store(true, Ordering::SeqCst);
                Ok(1)
            }),
        ];

        let err = join_writers(handles).await.unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_contig_write_cleans_staging() {
        let tmp = tempdir().unwrap();
        let engine = Engine::init(EngineConfig {
            tmp_dir: tmp.path().join("tmp"),
            write_threads: 2,
            ..Default::default()
        })
        .unwrap();
        // A file where the output directory should be
        let out_root = tmp.path().join("out");
        fs::write(&out_root, b"not a dir").unwrap();

        let writer = ContigWriter::new(&engine, ReferenceGenome::GRCh38, false);
        let files = vec![vec![row(1)], vec![row(2)]];
        assert!(writer
            .write("chrY", &layout::contig_dir(&out_root, "chrY"), files)
            .await
            .is_err());

        let staging_root = tmp.path().join("tmp").join("_staging");
        assert_eq!(fs::read_dir(&staging_root).unwrap().count(), 0);
    }
}
