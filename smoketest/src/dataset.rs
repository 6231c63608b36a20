// ==============================================================================
// dataset.rs - Dataset Location and Contig Resolution
// ==============================================================================
// Description: Resolves the --dataset/--contig pair to a contig=<name>
//              directory (local or gs://) and lists its part files through
//              object_store
// Author: Matt Barham
// Created: 2026-10-15
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use futures::TryStreamExt;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use vrs_parquet::layout;
use vrs_parquet::units::human_bytes;

pub const DEFAULT_CONTIG: &str = "chrY";

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Unsupported dataset URL scheme: {0:?} (expected a local path, file:// or gs://)")]
    UnsupportedScheme(String),

    #[error("Invalid dataset URL: {0}")]
    InvalidUrl(String),

    #[error("--contig {requested:?} does not match dataset path contig {in_path:?}")]
    ContigMismatch { requested: String, in_path: String },

    #[error("Path does not exist: {}", .0.display())]
    Missing(PathBuf),

    #[error("No parquet files found under: {0}")]
    NoFiles(String),

    #[error("Cannot address {} as an object path: {source}", .path.display())]
    InvalidLocalPath {
        path: PathBuf,
        #[source]
        source: object_store::path::Error,
    },

    #[error("Failed to list {location}: {source}")]
    Store {
        location: String,
        #[source]
        source: object_store::Error,
    },

    #[error("--local-file-stats only applies to local datasets, not {0}")]
    RemoteFileStats(String),
}

/// Where a dataset (or one of its contig directories) lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetLocation {
    Local(PathBuf),
    /// `gs://<bucket>/<prefix>`; `prefix` has no leading or trailing `/`
    Gcs { bucket: String, prefix: String },
}

impl DatasetLocation {
    /// Plain path, `file://` URL or `gs://bucket/prefix`
    pub fn parse(dataset: &str) -> Result<Self, DatasetError> {
        match dataset.split_once("://") {
            None => Ok(DatasetLocation::Local(PathBuf::from(dataset))),
            Some(("file", path)) => Ok(DatasetLocation::Local(PathBuf::from(path))),
            Some(("gs", rest)) => {
                let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
                if bucket.is_empty() {
                    return Err(DatasetError::InvalidUrl(dataset.to_string()));
                }
                Ok(DatasetLocation::Gcs {
                    bucket: bucket.to_string(),
                    prefix: prefix.trim_matches('/').to_string(),
                })
            }
            Some((scheme, _)) => Err(DatasetError::UnsupportedScheme(scheme.to_string())),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, DatasetLocation::Local(_))
    }

    /// The contig directory under this location, and its contig
    ///
    /// A location ending in `contig=<name>` fixes the contig; otherwise
    /// `requested` (default chrY) selects the subdirectory.
    pub fn contig_location(&self, requested: Option<&str>) -> Result<(Self, String), DatasetError> {
        match self {
            DatasetLocation::Local(path) => {
                let in_path = layout::contig_from_dir_name(path);
                let (contig, fixed) = select_contig(in_path, requested)?;
                let dir = if fixed {
                    path.clone()
                } else {
                    layout::contig_dir(path, &contig)
                };
                Ok((DatasetLocation::Local(dir), contig))
            }
            DatasetLocation::Gcs { bucket, prefix } => {
                let last = prefix.rsplit('/').next().unwrap_or_default();
                let (contig, fixed) = select_contig(layout::contig_from_segment(last), requested)?;
                let prefix = match (fixed, prefix.is_empty()) {
                    (true, _) => prefix.clone(),
                    (false, true) => layout::contig_dir_name(&contig),
                    (false, false) => format!("{}/{}", prefix, layout::contig_dir_name(&contig)),
                };
                Ok((
                    DatasetLocation::Gcs {
                        bucket: bucket.clone(),
                        prefix,
                    },
                    contig,
                ))
            }
        }
    }

    /// Store serving this location and the object prefix of its files
    fn open_store(&self) -> Result<(Arc<dyn ObjectStore>, ObjectPath), DatasetError> {
        match self {
            DatasetLocation::Local(dir) => {
                if !dir.exists() {
                    return Err(DatasetError::Missing(dir.clone()));
                }
                let prefix = ObjectPath::from_filesystem_path(dir).map_err(|source| DatasetError::InvalidLocalPath {
                    path: dir.clone(),
                    source,
                })?;
                Ok((Arc::new(LocalFileSystem::new()), prefix))
            }
            DatasetLocation::Gcs { bucket, prefix } => {
                let store = GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(|source| DatasetError::Store {
                        location: self.to_string(),
                        source,
                    })?;
                Ok((Arc::new(store), ObjectPath::from(prefix.as_str())))
            }
        }
    }
}

impl fmt::Display for DatasetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetLocation::Local(path) => write!(f, "{}", path.display()),
            DatasetLocation::Gcs { bucket, prefix } if prefix.is_empty() => write!(f, "gs://{}", bucket),
            DatasetLocation::Gcs { bucket, prefix } => write!(f, "gs://{}/{}", bucket, prefix),
        }
    }
}

/// Contig from the path (checked against `requested`) or `requested`/default;
/// the flag is true when the path already named it
fn select_contig(in_path: Option<&str>, requested: Option<&str>) -> Result<(String, bool), DatasetError> {
    match (in_path, requested) {
        (Some(in_path), Some(requested)) if requested != in_path => Err(DatasetError::ContigMismatch {
            requested: requested.to_string(),
            in_path: in_path.to_string(),
        }),
        (Some(in_path), _) => Ok((in_path.to_string(), true)),
        (None, requested) => Ok((requested.unwrap_or(DEFAULT_CONTIG).to_string(), false)),
    }
}

/// Every `*.parquet` object under `prefix` (recursive), sorted by location
pub async fn list_parquet_objects(
    store: &dyn ObjectStore,
    prefix: &ObjectPath,
) -> object_store::Result<Vec<ObjectMeta>> {
    let mut files: Vec<ObjectMeta> = store
        .list(Some(prefix))
        .try_filter(|meta| {
            let is_parquet = meta
                .location
                .filename()
                .is_some_and(|name| name.ends_with(".parquet"));
            futures::future::ready(is_parquet)
        })
        .try_collect()
        .await?;
    files.sort_by(|a, b| a.location.as_ref().cmp(b.location.as_ref()));
    Ok(files)
}

/// One contig directory of the dataset and its part files
#[derive(Debug, Clone)]
pub struct ContigDataset {
    pub contig: String,
    pub location: DatasetLocation,
    pub store: Arc<dyn ObjectStore>,
    pub files: Vec<ObjectMeta>,
}

impl ContigDataset {
    pub async fn resolve(dataset: &str, contig: Option<&str>) -> Result<Self, DatasetError> {
        let (location, contig) = DatasetLocation::parse(dataset)?.contig_location(contig)?;
        let (store, prefix) = location.open_store()?;

        let files = list_parquet_objects(store.as_ref(), &prefix)
            .await
            .map_err(|source| DatasetError::Store {
                location: location.to_string(),
                source,
            })?;
        if files.is_empty() {
            return Err(DatasetError::NoFiles(location.to_string()));
        }

        Ok(Self {
            contig,
            location,
            store,
            files,
        })
    }

    /// Size summary of the part files; local datasets only
    pub fn file_stats(&self) -> Result<FileStats, DatasetError> {
        if !self.location.is_local() {
            return Err(DatasetError::RemoteFileStats(self.location.to_string()));
        }
        Ok(FileStats::from_sizes(
            self.files.iter().map(|meta| meta.size as u64).collect(),
        ))
    }
}

/// Size summary of a contig's part files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    pub count: usize,
    pub total: u64,
    pub min: u64,
    pub median: u64,
    pub max: u64,
}

impl FileStats {
    /// Median of an even count is the truncated mean of the middle pair
    pub fn from_sizes(mut sizes: Vec<u64>) -> Self {
        sizes.sort_unstable();
        let count = sizes.len();
        let median = match count {
            0 => 0,
            n if n % 2 == 1 => sizes[n / 2],
            n => (sizes[n / 2 - 1] + sizes[n / 2]) / 2,
        };

        Self {
            count,
            total: sizes.iter().sum(),
            min: sizes.first().copied().unwrap_or(0),
            median,
            max: sizes.last().copied().unwrap_or(0),
        }
    }
}

impl fmt::Display for FileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File sizes: total={} min={} p50={} max={}",
            human_bytes(self.total),
            human_bytes(self.min),
            human_bytes(self.median),
            human_bytes(self.max)
        )
    }
}
