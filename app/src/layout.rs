// ==============================================================================
// layout.rs - Hive-Style Dataset Layout
// ==============================================================================
// Description: Directory and file naming contract shared by the exporter and
//              the smoke test: <root>/contig=<name>/part-*.parquet + _SUCCESS
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::ParquetCodec;

/// Hive partition key prefix for contig directories
pub const CONTIG_DIR_PREFIX: &str = "contig=";

/// Zero-byte marker written last; its presence means the contig is complete
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Per-contig export summary written just before the marker
pub const MANIFEST_FILE: &str = "_MANIFEST.json";

/// State of a contig output directory before writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDirState {
    Absent,
    /// Exists and carries the completion marker
    Complete,
    /// Exists without a marker (interrupted or foreign content)
    Incomplete,
}

/// `contig=<name>`; also the last segment of remote contig prefixes
pub fn contig_dir_name(contig: &str) -> String {
    format!("{}{}", CONTIG_DIR_PREFIX, contig)
}

pub fn contig_dir(root: &Path, contig: &str) -> PathBuf {
    root.join(contig_dir_name(contig))
}

/// Contig named by a single `contig=<name>` segment
pub fn contig_from_segment(segment: &str) -> Option<&str> {
    segment
        .strip_prefix(CONTIG_DIR_PREFIX)
        .filter(|name| !name.is_empty())
}

/// Contig named by a `contig=<name>` path component, if the last component is one
pub fn contig_from_dir_name(path: &Path) -> Option<&str> {
    contig_from_segment(path.file_name()?.to_str()?)
}

pub fn success_marker_exists(dir: &Path) -> bool {
    dir.join(SUCCESS_MARKER).is_file()
}

pub fn dir_state(dir: &Path) -> OutputDirState {
    if !dir.exists() {
        OutputDirState::Absent
    } else if success_marker_exists(dir) {
        OutputDirState::Complete
    } else {
        OutputDirState::Incomplete
    }
}

/// Part-file name for shard `index` of a write identified by `run_id`
pub fn part_file_name(index: usize, run_id: &Uuid, codec: ParquetCodec) -> String {
    format!("part-{:05}-{}-c000.{}.parquet", index, run_id, codec.as_str())
}

/// All `.parquet` files under `dir` (recursively), sorted by path
pub fn list_parquet_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "parquet")
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_contig_dir_round_trip() {
        let dir = contig_dir(Path::new("/data/out"), "chr1");
        assert_eq!(dir, PathBuf::from("/data/out/contig=chr1"));
        assert_eq!(contig_from_dir_name(&dir), Some("chr1"));
        assert_eq!(contig_from_dir_name(Path::new("/data/out")), None);
        assert_eq!(contig_from_dir_name(Path::new("/data/contig=")), None);
        assert_eq!(contig_from_segment(&contig_dir_name("chrX")), Some("chrX"));
    }

    #[test]
    fn test_dir_state() {
        let tmp = tempdir().unwrap();
        let dir = contig_dir(tmp.path(), "chrY");
        assert_eq!(dir_state(&dir), OutputDirState::Absent);

        fs::create_dir_all(&dir).unwrap();
        assert_eq!(dir_state(&dir), OutputDirState::Incomplete);

        fs::write(dir.join(SUCCESS_MARKER), b"").unwrap();
        assert_eq!(dir_state(&dir), OutputDirState::Complete);
    }

    #[test]
    fn test_part_file_name() {
        let run_id = Uuid::nil();
        assert_eq!(
            part_file_name(3, &run_id, ParquetCodec::Zstd),
            "part-00003-00000000-0000-0000-0000-000000000000-c000.zstd.parquet"
        );
    }

    #[test]
    fn test_list_parquet_files_recursive_and_sorted() {
        let tmp = tempdir().unwrap();
        let nested = tmp.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join("b.parquet"), b"x").unwrap();
        fs::write(tmp.path().join("a.parquet"), b"x").unwrap();
        fs::write(nested.join("c.parquet"), b"x").unwrap();
        fs::write(tmp.path().join(SUCCESS_MARKER), b"").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"x").unwrap();

        let files = list_parquet_files(tmp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.parquet"),
                PathBuf::from("b.parquet"),
                PathBuf::from("nested/c.parquet"),
            ]
        );
    }
}
