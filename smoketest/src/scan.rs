// ==============================================================================
// scan.rs - Pruning Position Scans
// ==============================================================================
// Description: Point and range predicates on `position` over one contig's
//              part files, skipping row groups by their min/max statistics
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, AsArray, BooleanArray, Int64Array, StringArray};
use arrow::compute::kernels::cmp::{eq, gt_eq, lt_eq};
use arrow::compute::{and, cast, concat_batches, filter_record_batch};
use arrow::datatypes::{DataType, Field, Int64Type, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use object_store::{ObjectMeta, ObjectStore};
use parquet::arrow::async_reader::{ParquetObjectReader, ParquetRecordBatchStream};
use parquet::arrow::{ParquetRecordBatchStreamBuilder, ProjectionMask};
use parquet::file::metadata::RowGroupMetaData;
use parquet::file::statistics::Statistics;
use std::fmt;
use std::ops::AddAssign;
use std::sync::Arc;
use tracing::debug;

use vrs_parquet::output::POSITION_COLUMN;

/// Hive partition column prepended to example rows
pub const CONTIG_COLUMN: &str = "contig";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionPredicate {
    Eq(i64),
    /// Inclusive on both ends
    Between(i64, i64),
}

impl PositionPredicate {
    /// Whether a row group with these position bounds can contain a match
    pub fn may_match(&self, min: i64, max: i64) -> bool {
        match *self {
            PositionPredicate::Eq(p) => min <= p && p <= max,
            PositionPredicate::Between(start, end) => min <= end && start <= max,
        }
    }

    pub fn evaluate(&self, positions: &Int64Array) -> Result<BooleanArray> {
        let mask = match *self {
            PositionPredicate::Eq(p) => eq(positions, &Int64Array::new_scalar(p))?,
            PositionPredicate::Between(start, end) => and(
                &gt_eq(positions, &Int64Array::new_scalar(start))?,
                &lt_eq(positions, &Int64Array::new_scalar(end))?,
            )?,
        };
        Ok(mask)
    }
}

impl fmt::Display for PositionPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionPredicate::Eq(p) => write!(f, "position={}", p),
            PositionPredicate::Between(start, end) => write!(f, "{}-{}", start, end),
        }
    }
}

/// How matching rows are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Filter batch by batch and stop as soon as enough rows are found
    #[default]
    Streaming,
    /// Materialise every surviving row group of a file, then filter
    Collect,
}

/// What a query touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub files_pruned: usize,
    pub row_groups_scanned: usize,
    pub row_groups_pruned: usize,
}

impl AddAssign for ScanStats {
    fn add_assign(&mut self, other: Self) {
        self.files_scanned += other.files_scanned;
        self.files_pruned += other.files_pruned;
        self.row_groups_scanned += other.row_groups_scanned;
        self.row_groups_pruned += other.row_groups_pruned;
    }
}

impl fmt::Display for ScanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files scanned={} pruned={}, row groups scanned={} pruned={}",
            self.files_scanned, self.files_pruned, self.row_groups_scanned, self.row_groups_pruned
        )
    }
}

type PartStream = ParquetRecordBatchStream<ParquetObjectReader>;

/// Query runner over the part files of one contig
pub struct ContigScanner {
    contig: String,
    store: Arc<dyn ObjectStore>,
    files: Vec<ObjectMeta>,
    mode: ExecutionMode,
    schema: SchemaRef,
}

impl ContigScanner {
    /// Reads the schema of the first file; fails without a `position` column
    pub async fn open(
        contig: &str,
        store: Arc<dyn ObjectStore>,
        files: Vec<ObjectMeta>,
        mode: ExecutionMode,
    ) -> Result<Self> {
        let Some(first) = files.first() else {
            bail!("No parquet files to scan for contig {}", contig);
        };
        let schema = ParquetRecordBatchStreamBuilder::new(ParquetObjectReader::new(store.clone(), first.clone()))
            .await
            .with_context(|| format!("Failed to read Parquet metadata of {}", first.location))?
            .schema()
            .clone();

        if schema.column_with_name(POSITION_COLUMN).is_none() {
            bail!("No '{}' column found in Parquet dataset.", POSITION_COLUMN);
        }

        Ok(Self {
            contig: contig.to_string(),
            store,
            files,
            mode,
            schema,
        })
    }

    pub fn contig(&self) -> &str {
        &self.contig
    }

    /// Whether a column is available to queries (the Hive contig column always is)
    pub fn has_column(&self, name: &str) -> bool {
        name == CONTIG_COLUMN || self.schema.column_with_name(name).is_some()
    }

    /// Number of rows matching `predicate`
    pub async fn count(&self, predicate: PositionPredicate) -> Result<(usize, ScanStats)> {
        let mut total = 0;
        let mut stats = ScanStats::default();

        for meta in &self.files {
            let (stream, file_stats) = open_pruned(&self.store, meta, predicate, &[POSITION_COLUMN]).await?;
            stats += file_stats;
            let Some(mut stream) = stream else { continue };

            match self.mode {
                ExecutionMode::Streaming => {
                    while let Some(batch) = next_batch(&mut stream, meta).await? {
                        total += position_mask(&batch, predicate)?.true_count();
                    }
                }
                ExecutionMode::Collect => {
                    let batch = collect_file(stream, meta).await?;
                    total += position_mask(&batch, predicate)?.true_count();
                }
            }
        }

        debug!("{}: count {} -> {} ({})", self.contig, predicate, total, stats);
        Ok((total, stats))
    }

    /// Up to `limit` matching rows, projected to `columns`
    ///
    /// Unknown columns are dropped. `contig` is filled from the scanner's
    /// contig rather than read from the files.
    pub async fn examples(
        &self,
        predicate: PositionPredicate,
        columns: &[&str],
        limit: usize,
    ) -> Result<(RecordBatch, ScanStats)> {
        let columns: Vec<&str> = columns.iter().copied().filter(|c| self.has_column(c)).collect();
        let file_columns: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| *c != CONTIG_COLUMN)
            .chain(std::iter::once(POSITION_COLUMN))
            .collect();
        let out_schema = self.output_schema(&columns)?;

        let mut found: Vec<RecordBatch> = Vec::new();
        let mut rows = 0;
        let mut stats = ScanStats::default();

        for meta in &self.files {
            if rows >= limit {
                break;
            }
            let (stream, file_stats) = open_pruned(&self.store, meta, predicate, &file_columns).await?;
            stats += file_stats;
            let Some(mut stream) = stream else { continue };

            match self.mode {
                ExecutionMode::Streaming => {
                    while let Some(batch) = next_batch(&mut stream, meta).await? {
                        let matched = filter_record_batch(&batch, &position_mask(&batch, predicate)?)?;
                        rows += matched.num_rows();
                        found.push(self.project(&matched, &out_schema)?);
                        if rows >= limit {
                            break;
                        }
                    }
                }
                ExecutionMode::Collect => {
                    let batch = collect_file(stream, meta).await?;
                    let matched = filter_record_batch(&batch, &position_mask(&batch, predicate)?)?;
                    rows += matched.num_rows();
                    found.push(self.project(&matched, &out_schema)?);
                }
            }
        }

        let all = concat_batches(&out_schema, &found)?;
        Ok((all.slice(0, limit.min(all.num_rows())), stats))
    }

    fn output_schema(&self, columns: &[&str]) -> Result<SchemaRef> {
        let fields = columns
            .iter()
            .map(|name| {
                if *name == CONTIG_COLUMN {
                    Ok(Field::new(CONTIG_COLUMN, DataType::Utf8, false))
                } else {
                    Ok(self.schema.field_with_name(name)?.clone())
                }
            })
            .collect::<Result<Vec<Field>>>()?;
        Ok(Arc::new(Schema::new(fields)))
    }

    /// Reorder a file batch into `schema`, filling the contig column
    fn project(&self, batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
        let arrays = schema
            .fields()
            .iter()
            .map(|field| {
                if field.name() == CONTIG_COLUMN {
                    let contig: ArrayRef =
                        Arc::new(StringArray::from(vec![self.contig.as_str(); batch.num_rows()]));
                    Ok(contig)
                } else {
                    batch
                        .column_by_name(field.name())
                        .cloned()
                        .with_context(|| format!("Column {} missing from batch", field.name()))
                }
            })
            .collect::<Result<Vec<ArrayRef>>>()?;
        Ok(RecordBatch::try_new(schema.clone(), arrays)?)
    }
}

/// Position bounds of a row group, if its statistics carry them
fn position_bounds(row_group: &RowGroupMetaData, column: usize) -> Option<(i64, i64)> {
    match row_group.column(column).statistics()? {
        Statistics::Int32(s) => Some((i64::from(*s.min_opt()?), i64::from(*s.max_opt()?))),
        Statistics::Int64(s) => Some((*s.min_opt()?, *s.max_opt()?)),
        _ => None,
    }
}

/// Stream over the row groups of one part file that may match, or `None` when all are pruned
async fn open_pruned(
    store: &Arc<dyn ObjectStore>,
    meta: &ObjectMeta,
    predicate: PositionPredicate,
    columns: &[&str],
) -> Result<(Option<PartStream>, ScanStats)> {
    let builder = ParquetRecordBatchStreamBuilder::new(ParquetObjectReader::new(store.clone(), meta.clone()))
        .await
        .with_context(|| format!("Failed to read Parquet metadata of {}", meta.location))?;

    let position_leaf = builder
        .parquet_schema()
        .columns()
        .iter()
        .position(|c| c.path().string() == POSITION_COLUMN)
        .with_context(|| format!("No '{}' column in {}", POSITION_COLUMN, meta.location))?;

    let mut stats = ScanStats::default();
    let keep: Vec<usize> = builder
        .metadata()
        .row_groups()
        .iter()
        .enumerate()
        .filter(|(_, rg)| match position_bounds(rg, position_leaf) {
            Some((min, max)) => predicate.may_match(min, max),
            // No statistics: cannot prune
            None => true,
        })
        .map(|(idx, _)| idx)
        .collect();

    let total = builder.metadata().num_row_groups();
    stats.row_groups_scanned = keep.len();
    stats.row_groups_pruned = total - keep.len();

    if keep.is_empty() {
        stats.files_pruned = 1;
        return Ok((None, stats));
    }
    stats.files_scanned = 1;

    let roots: Vec<usize> = columns
        .iter()
        .filter_map(|name| builder.schema().index_of(name).ok())
        .collect();
    let mask = ProjectionMask::roots(builder.parquet_schema(), roots);

    let stream = builder
        .with_row_groups(keep)
        .with_projection(mask)
        .build()
        .with_context(|| format!("Failed to build reader for {}", meta.location))?;
    Ok((Some(stream), stats))
}

async fn next_batch(stream: &mut PartStream, meta: &ObjectMeta) -> Result<Option<RecordBatch>> {
    stream
        .try_next()
        .await
        .with_context(|| format!("Failed to read {}", meta.location))
}

async fn collect_file(stream: PartStream, meta: &ObjectMeta) -> Result<RecordBatch> {
    let schema = stream.schema().clone();
    let batches: Vec<RecordBatch> = stream
        .try_collect()
        .await
        .with_context(|| format!("Failed to read {}", meta.location))?;
    Ok(concat_batches(&schema, &batches)?)
}

fn position_mask(batch: &RecordBatch, predicate: PositionPredicate) -> Result<BooleanArray> {
    let column = batch
        .column_by_name(POSITION_COLUMN)
        .with_context(|| format!("No '{}' column in batch", POSITION_COLUMN))?;
    let positions = cast(column, &DataType::Int64)?;
    predicate.evaluate(positions.as_primitive::<Int64Type>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::list_parquet_objects;
    use arrow::array::Int32Array;
    use object_store::local::LocalFileSystem;
    use object_store::memory::InMemory;
    use object_store::path::Path as ObjectPath;
    use std::fs::File;
    use std::path::Path;
    use tempfile::tempdir;
    use vrs_parquet::models::{ParquetCodec, VariantRow};
    use vrs_parquet::output::{write_part_file, WriteSettings};

    /// Three files of sorted positions, row groups of 10 rows
    fn write_fixture(dir: &Path) {
        let settings = WriteSettings {
            codec: ParquetCodec::Zstd,
            row_group_size: 10,
            flush_budget: None,
        };
        for file in 0..3 {
            let rows: Vec<VariantRow> = (0..30)
                .map(|i| VariantRow {
                    position: file * 1_000 + i * 10,
                    alleles: vec!["A".to_string(), "C".to_string()],
                    vrs_allele_ids: Some(vec![Some(format!("ga4gh:VA.{}", file * 1_000 + i * 10)), None]),
                    ..Default::default()
                })
                .collect();
            write_part_file(&dir.join(format!("part-{:05}.parquet", file)), &rows, &settings).unwrap();
        }
    }

    async fn local_files(dir: &Path) -> (Arc<dyn ObjectStore>, Vec<ObjectMeta>) {
        let store: Arc<dyn ObjectStore> = Arc::new(LocalFileSystem::new());
        let prefix = ObjectPath::from_filesystem_path(dir).unwrap();
        let files = list_parquet_objects(store.as_ref(), &prefix).await.unwrap();
        (store, files)
    }

    async fn scanner(dir: &Path, mode: ExecutionMode) -> ContigScanner {
        write_fixture(dir);
        let (store, files) = local_files(dir).await;
        ContigScanner::open("chrY", store, files, mode).await.unwrap()
    }

    #[test]
    fn test_predicate_bounds() {
        assert!(PositionPredicate::Eq(5).may_match(5, 5));
        assert!(!PositionPredicate::Eq(4).may_match(5, 9));
        assert!(PositionPredicate::Between(1, 5).may_match(5, 9));
        assert!(!PositionPredicate::Between(10, 20).may_match(21, 30));
        assert_eq!(PositionPredicate::Between(3, 8).to_string(), "3-8");
    }

    #[tokio::test]
    async fn test_point_count_prunes_row_groups() {
        let tmp = tempdir().unwrap();
        let scanner = scanner(tmp.path(), ExecutionMode::Streaming).await;

        let (count, stats) = scanner.count(PositionPredicate::Eq(1_150)).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(stats.files_scanned, 1);
        assert_eq!(stats.files_pruned, 2);
        assert_eq!(stats.row_groups_scanned, 1);
        assert_eq!(stats.row_groups_pruned, 8);
    }

    #[tokio::test]
    async fn test_modes_agree_on_range_count() {
        let tmp = tempdir().unwrap();
        write_fixture(tmp.path());
        let (store, files) = local_files(tmp.path()).await;
        let predicate = PositionPredicate::Between(250, 1_045);

        let streaming = ContigScanner::open("chrY", store.clone(), files.clone(), ExecutionMode::Streaming)
            .await
            .unwrap();
        let collect = ContigScanner::open("chrY", store, files, ExecutionMode::Collect)
            .await
            .unwrap();

        // 250..=290 from file 0, 1000..=1040 from file 1
        assert_eq!(streaming.count(predicate).await.unwrap().0, 10);
        assert_eq!(collect.count(predicate).await.unwrap().0, 10);
    }

    #[tokio::test]
    async fn test_examples_prepend_contig_and_limit() {
        let tmp = tempdir().unwrap();
        let scanner = scanner(tmp.path(), ExecutionMode::Streaming).await;

        let columns = ["contig", "position", "alleles", "VRS_Allele_IDs", "not_a_column"];
        let (batch, _) = scanner
            .examples(PositionPredicate::Between(0, 2_000), &columns, 5)
            .await
            .unwrap();

        assert_eq!(batch.num_rows(), 5);
        let names: Vec<&str> = batch.schema_ref().fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["contig", "position", "alleles", "VRS_Allele_IDs"]);

        let contig = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(contig.value(4), "chrY");
        let positions = batch.column(1).as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(positions.value(0), 0);
    }

    #[tokio::test]
    async fn test_examples_empty_result_keeps_schema() {
        let tmp = tempdir().unwrap();
        let scanner = scanner(tmp.path(), ExecutionMode::Collect).await;
        let (batch, stats) = scanner
            .examples(PositionPredicate::Eq(5), &["contig", "position"], 5)
            .await
            .unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 2);
        // 5 is inside the first row group's bounds but matches nothing
        assert_eq!(stats.row_groups_scanned, 1);
    }

    #[tokio::test]
    async fn test_scans_remote_style_store() {
        let tmp = tempdir().unwrap();
        write_fixture(tmp.path());

        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        for file in 0..3 {
            let name = format!("part-{:05}.parquet", file);
            let bytes = std::fs::read(tmp.path().join(&name)).unwrap();
            let location = ObjectPath::from(format!("ds/contig=chrY/{}", name));
            store.put(&location, bytes.into()).await.unwrap();
        }
        let files = list_parquet_objects(store.as_ref(), &ObjectPath::from("ds/contig=chrY"))
            .await
            .unwrap();

        let scanner = ContigScanner::open("chrY", store, files, ExecutionMode::Streaming)
            .await
            .unwrap();
        let (count, stats) = scanner.count(PositionPredicate::Between(2_000, 2_095)).await.unwrap();
        assert_eq!(count, 10);
        assert_eq!(stats.files_pruned, 2);
    }

    #[tokio::test]
    async fn test_missing_position_column_is_fatal() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("other.parquet");
        let schema = Arc::new(Schema::new(vec![Field::new("pos", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap();
        let mut writer = parquet::arrow::ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let (store, files) = local_files(tmp.path()).await;
        let err = ContigScanner::open("chrY", store, files, ExecutionMode::Streaming)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("No 'position' column"));
    }
}
