// ==============================================================================
// partitioning.rs - Per-Contig Shard Layout
// ==============================================================================
// Description: Natural shards, coalesce (narrowing), range repartition
//              (widening) on position, per-shard sort, and file splitting
// Author: Matt Barham
// Created: 2026-10-13
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use tracing::info;

use crate::models::VariantRow;

/// Anything that can be laid out by genomic position
pub trait Positioned {
    fn position(&self) -> i64;
}

impl Positioned for VariantRow {
    fn position(&self) -> i64 {
        i64::from(self.position)
    }
}

/// How a contig's shards are adjusted before writing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardPolicy {
    /// Coalesce down to at most this many shards
    pub max_files: Option<usize>,
    /// Range-repartition up to at least this many shards
    pub min_files: Option<usize>,
    /// Stable sort by position inside each final shard
    pub sort_within: bool,
    /// Split shards into files of at most this many rows
    pub max_records_per_file: Option<usize>,
}

/// Ordered shards of one contig; shard order is file order
#[derive(Debug, Clone, PartialEq)]
pub struct Shards<T> {
    shards: Vec<Vec<T>>,
}

impl<T: Positioned> Shards<T> {
    pub fn from_shards(shards: Vec<Vec<T>>) -> Self {
        Self { shards }
    }

    /// Chunk rows, in source order, into shards of `rows_per_shard` rows
    pub fn natural(rows: Vec<T>, rows_per_shard: usize) -> Self {
        let rows_per_shard = rows_per_shard.max(1);
        let mut shards = Vec::with_capacity(rows.len().div_ceil(rows_per_shard));
        let mut current = Vec::with_capacity(rows_per_shard.min(rows.len()));

        for row in rows {
            current.push(row);
            if current.len() == rows_per_shard {
                shards.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            shards.push(current);
        }

        Self { shards }
    }

    pub fn count(&self) -> usize {
        self.shards.len()
    }

    pub fn total_rows(&self) -> usize {
        self.shards.iter().map(Vec::len).sum()
    }

    pub fn shard_sizes(&self) -> Vec<usize> {
        self.shards.iter().map(Vec::len).collect()
    }

    pub fn shards(&self) -> &[Vec<T>] {
        &self.shards
    }

    /// Merge runs of adjacent shards into exactly `max` shards
    ///
    /// Only narrows: a no-op unless the current count exceeds `max`. Rows keep
    /// their order, so no data moves between position ranges.
    pub fn coalesce(self, max: usize) -> Self {
        let max = max.max(1);
        let count = self.shards.len();
        if count <= max {
            return self;
        }

        let mut grouped: Vec<Vec<T>> = (0..max).map(|_| Vec::new()).collect();
        for (idx, shard) in self.shards.into_iter().enumerate() {
            // Even split of consecutive shard indices across `max` groups
            let group = idx * max / count;
            grouped[group].extend(shard);
        }

        Self { shards: grouped }
    }

    /// Redistribute rows into exactly `min` position-contiguous shards
    ///
    /// Only widens: a no-op unless the current count is below `min`. Boundaries
    /// sit at evenly spaced quantiles of the sorted positions and each row goes
    /// to the shard whose range contains it, keeping relative row order.
    pub fn repartition_by_range(self, min: usize) -> Self {
        let count = self.shards.len();
        if min == 0 || count >= min {
            return self;
        }

        let rows: Vec<T> = self.shards.into_iter().flatten().collect();
        let boundaries = range_boundaries(&rows, min);

        let mut shards: Vec<Vec<T>> = (0..min).map(|_| Vec::new()).collect();
        for row in rows {
            let position = row.position();
            let idx = boundaries.partition_point(|bound| *bound <= position);
            shards[idx].push(row);
        }

        Self { shards }
    }

    /// Stable sort by position inside each shard
    pub fn sort_within(&mut self) {
        for shard in &mut self.shards {
            shard.sort_by_key(|row| row.position());
        }
    }

    /// Apply a policy in order: coalesce, widen, sort
    pub fn apply(self, contig: &str, policy: &ShardPolicy) -> Self {
        let mut shards = self;
        info!("{}: partitions before write: {}", contig, shards.count());

        if let Some(max) = policy.max_files {
            if shards.count() > max {
                info!("{}: coalesce -> {}", contig, max);
                shards = shards.coalesce(max);
                info!("{}: partitions after coalesce: {}", contig, shards.count());
            }
        }

        if let Some(min) = policy.min_files {
            if shards.count() < min {
                info!("{}: repartition by range -> {} (contig-scoped)", contig, min);
                shards = shards.repartition_by_range(min);
                info!("{}: partitions after range repartition: {}", contig, shards.count());
            }
        }

        if policy.sort_within {
            shards.sort_within();
        }

        shards
    }

    /// Turn shards into file contents
    ///
    /// Empty shards produce no file, and a shard larger than
    /// `max_records_per_file` is split into consecutive chunks. When every
    /// shard is empty a single empty file is kept so the schema stays
    /// discoverable.
    pub fn into_files(self, max_records_per_file: Option<usize>) -> Vec<Vec<T>> {
        let mut files = Vec::new();
        for shard in self.shards.into_iter().filter(|s| !s.is_empty()) {
            match max_records_per_file {
                Some(limit) if limit > 0 && shard.len() > limit => {
                    let mut rest = shard;
                    while rest.len() > limit {
                        let tail = rest.split_off(limit);
                        files.push(rest);
                        rest = tail;
                    }
                    files.push(rest);
                }
                _ => files.push(shard),
            }
        }

        if files.is_empty() {
            files.push(Vec::new());
        }
        files
    }
}

/// `parts - 1` split points at evenly spaced quantiles of the row positions
fn range_boundaries<T: Positioned>(rows: &[T], parts: usize) -> Vec<i64> {
    if rows.is_empty() {
        return Vec::new();
    }

    let mut positions: Vec<i64> = rows.iter().map(|row| row.position()).collect();
    positions.sort_unstable();

    (1..parts)
        .map(|i| positions[i * positions.len() / parts])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Positioned for i64 {
        fn position(&self) -> i64 {
            *self
        }
    }

    fn shards_of(sizes: &[usize]) -> Shards<i64> {
        let mut next = 0i64;
        let shards = sizes
            .iter()
            .map(|&n| {
                (0..n)
                    .map(|_| {
                        next += 10;
                        next
                    })
                    .collect()
            })
            .collect();
        Shards::from_shards(shards)
    }

    #[test]
    fn test_natural_chunks_in_source_order() {
        let shards = Shards::natural((1..=7).collect::<Vec<i64>>(), 3);
        assert_eq!(shards.shard_sizes(), vec![3, 3, 1]);
        assert_eq!(shards.shards()[2], vec![7]);

        let empty: Shards<i64> = Shards::natural(Vec::new(), 3);
        assert_eq!(empty.count(), 0);
    }

    #[test]
    fn test_coalesce_never_increases() {
        let shards = shards_of(&[2, 2, 2, 2, 2]);
        let merged = shards.coalesce(2);
        assert_eq!(merged.count(), 2);
        assert_eq!(merged.total_rows(), 10);

        let few = shards_of(&[2, 2]);
        assert_eq!(few.clone().coalesce(5), few);
    }

    #[test]
    fn test_coalesce_preserves_row_order() {
        let shards = shards_of(&[1, 1, 1, 1, 1, 1, 1]);
        let merged = shards.coalesce(3);
        let flattened: Vec<i64> = merged.shards().iter().flatten().copied().collect();
        assert_eq!(flattened, vec![10, 20, 30, 40, 50, 60, 70]);
    }

    #[test]
    fn test_widen_produces_contiguous_ranges() {
        let rows: Vec<i64> = vec![50, 10, 90, 30, 70, 20, 80, 40, 60, 100];
        let shards = Shards::from_shards(vec![rows]).repartition_by_range(4);
        assert_eq!(shards.count(), 4);
        assert_eq!(shards.total_rows(), 10);

        let ranges: Vec<(i64, i64)> = shards
            .shards()
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| (*s.iter().min().unwrap(), *s.iter().max().unwrap()))
            .collect();
        for pair in ranges.windows(2) {
            assert!(pair[0].1 < pair[1].0, "ranges overlap: {:?}", ranges);
        }
    }

    #[test]
    fn test_widen_never_decreases() {
        let shards = shards_of(&[1, 1, 1, 1]);
        assert_eq!(shards.clone().repartition_by_range(2), shards);
        assert_eq!(shards.repartition_by_range(6).count(), 6);
    }

    #[test]
    fn test_coalesce_then_widen_reaches_min() {
        let policy = ShardPolicy {
            max_files: Some(2),
            min_files: Some(3),
            ..Default::default()
        };
        let shards = shards_of(&[5, 5, 5, 5, 5]).apply("chrT", &policy);
        assert_eq!(shards.count(), 3);
        assert_eq!(shards.total_rows(), 25);
    }

    #[test]
    fn test_apply_without_knobs_is_noop() {
        let shards = shards_of(&[3, 1, 2]);
        assert_eq!(shards.clone().apply("chrT", &ShardPolicy::default()), shards);
    }

    #[test]
    fn test_sort_within_is_per_shard() {
        let mut shards = Shards::from_shards(vec![vec![30i64, 10, 20], vec![5, 1]]);
        shards.sort_within();
        assert_eq!(shards.shards(), &[vec![10, 20, 30], vec![1, 5]]);
    }

    #[test]
    fn test_into_files_splits_and_drops_empty() {
        let shards = Shards::from_shards(vec![vec![1i64, 2, 3, 4, 5], Vec::new(), vec![6]]);
        let files = shards.into_files(Some(2));
        assert_eq!(files, vec![vec![1, 2], vec![3, 4], vec![5], vec![6]]);
    }

    #[test]
    fn test_into_files_keeps_one_empty_file() {
        let shards: Shards<i64> = Shards::from_shards(vec![Vec::new(), Vec::new()]);
        assert_eq!(shards.into_files(None), vec![Vec::<i64>::new()]);
    }
}
