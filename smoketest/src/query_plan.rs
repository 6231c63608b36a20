// ==============================================================================
// query_plan.rs - Point and Range Query Construction
// ==============================================================================
// Description: Builds point and range queries from a pool of sampled,
//              known-existing positions so every query hits real rows
// Author: Matt Barham
// Created: 2026-10-15
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Sorted, deduplicated, non-empty set of positions that exist in the dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionPool {
    positions: Vec<i64>,
}

impl PositionPool {
    /// `None` when nothing was sampled
    pub fn from_samples(mut samples: Vec<i64>) -> Option<Self> {
        samples.sort_unstable();
        samples.dedup();
        (!samples.is_empty()).then_some(Self { positions: samples })
    }

    pub fn positions(&self) -> &[i64] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn min(&self) -> i64 {
        self.positions[0]
    }

    pub fn max(&self) -> i64 {
        self.positions[self.positions.len() - 1]
    }
}

/// Up to `k` pool members: the minimum, the maximum, then a seeded shuffle of the rest
pub fn point_positions(pool: &PositionPool, k: usize, seed: u64) -> Vec<i64> {
    if k == 0 {
        return Vec::new();
    }

    let mut chosen = vec![pool.min()];
    if pool.max() != pool.min() {
        chosen.push(pool.max());
    }

    let mut remaining: Vec<i64> = pool
        .positions()
        .iter()
        .copied()
        .filter(|p| !chosen.contains(p))
        .collect();
    let mut rng = StdRng::seed_from_u64(seed);
    remaining.shuffle(&mut rng);

    let fill = k.saturating_sub(chosen.len());
    chosen.extend(remaining.into_iter().take(fill));

    chosen.sort_unstable();
    chosen.dedup();
    chosen.truncate(k);
    chosen
}

/// Pool indices at evenly spaced quantiles; `k == 1` maps to index 0
pub fn range_center_indices(pool_len: usize, k: usize) -> Vec<usize> {
    if pool_len == 0 {
        return Vec::new();
    }
    let span = (pool_len - 1) as f64;
    let steps = k.saturating_sub(1).max(1) as f64;
    (0..k)
        .map(|i| ((i as f64 * span / steps).round_ties_even() as usize).min(pool_len - 1))
        .collect()
}

pub fn range_centers(pool: &PositionPool, k: usize) -> Vec<i64> {
    range_center_indices(pool.len(), k)
        .into_iter()
        .map(|idx| pool.positions()[idx])
        .collect()
}

/// Inclusive window of at most `width` positions around `center`, kept inside `[min, max]`
///
/// A window crossing `min` is shifted right to start at `min`. A window
/// crossing `max` is clipped at `max` and comes out narrower than `width`.
/// `center` always stays inside.
pub fn range_window(center: i64, width: i64, min: i64, max: i64) -> (i64, i64) {
    let width = width.max(1);
    let start = min.max(center - (width - 1) / 2);
    let end = max.min(start + width - 1);
    let start = min.max(start.min(end));
    (start, end)
}

/// A query against one contig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedQuery {
    Point(i64),
    Range { start: i64, end: i64 },
}

/// All queries for one run, derived from the pool and the seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub points: Vec<i64>,
    pub ranges: Vec<(i64, i64)>,
    pub range_width: i64,
}

impl QueryPlan {
    pub fn build(pool: &PositionPool, n_points: usize, n_ranges: usize, range_width: i64, seed: u64) -> Self {
        let range_width = range_width.max(1);
        let ranges = range_centers(pool, n_ranges)
            .into_iter()
            .map(|center| range_window(center, range_width, pool.min(), pool.max()))
            .collect();

        Self {
            points: point_positions(pool, n_points, seed),
            ranges,
            range_width,
        }
    }

    pub fn queries(&self) -> impl Iterator<Item = PlannedQuery> + '_ {
        self.points
            .iter()
            .map(|&p| PlannedQuery::Point(p))
            .chain(self.ranges.iter().map(|&(start, end)| PlannedQuery::Range { start, end }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(values: &[i64]) -> PositionPool {
        PositionPool::from_samples(values.to_vec()).unwrap()
    }

    #[test]
    fn test_pool_sorts_and_dedups() {
        let pool = pool(&[500, 100, 300, 100, 500]);
        assert_eq!(pool.positions(), &[100, 300, 500]);
        assert_eq!(pool.min(), 100);
        assert_eq!(pool.max(), 500);
        assert!(PositionPool::from_samples(Vec::new()).is_none());
    }

    #[test]
    fn test_point_positions_include_bounds() {
        let pool = pool(&(1..=50).map(|p| p * 10).collect::<Vec<_>>());
        let points = point_positions(&pool, 8, 1);
        assert_eq!(points.len(), 8);
        assert_eq!(points[0], 10);
        assert_eq!(points[7], 500);
        assert!(points.windows(2).all(|w| w[0] < w[1]));
        assert!(points.iter().all(|p| pool.positions().contains(p)));
    }

    #[test]
    fn test_point_positions_are_seeded() {
        let pool = pool(&(1..=200).collect::<Vec<_>>());
        assert_eq!(point_positions(&pool, 10, 7), point_positions(&pool, 10, 7));
    }

    #[test]
    fn test_point_positions_small_pool_and_k() {
        let single = pool(&[42]);
        assert_eq!(point_positions(&single, 8, 1), vec![42]);

        let two = pool(&[1, 2, 3]);
        assert_eq!(point_positions(&two, 1, 1), vec![1]);
        assert!(point_positions(&two, 0, 1).is_empty());
        assert_eq!(point_positions(&two, 10, 1), vec![1, 2, 3]);
    }

    #[test]
    fn test_range_center_indices() {
        assert_eq!(range_center_indices(5, 3), vec![0, 2, 4]);
        assert_eq!(range_center_indices(5, 1), vec![0]);
        assert_eq!(range_center_indices(1, 4), vec![0, 0, 0, 0]);
        assert!(range_center_indices(5, 0).is_empty());
        // 0.5 and 2.5 round to even
        assert_eq!(range_center_indices(2, 3), vec![0, 0, 1]);
        assert_eq!(range_center_indices(6, 3), vec![0, 2, 5]);
    }

    #[test]
    fn test_range_windows_clip_to_pool_bounds() {
        let pool = pool(&[100, 200, 300, 400, 500]);
        let plan = QueryPlan::build(&pool, 0, 3, 100, 1);
        assert_eq!(range_centers(&pool, 3), vec![100, 300, 500]);
        assert_eq!(plan.ranges, vec![(100, 199), (251, 350), (451, 500)]);
    }

    #[test]
    fn test_range_windows_stay_in_bounds() {
        let pool = pool(&[7, 19, 23, 1_000, 5_000, 5_001]);
        for width in [1, 2, 3, 10, 999, 100_000] {
            let plan = QueryPlan::build(&pool, 0, 4, width, 3);
            for (center, (start, end)) in range_centers(&pool, 4).into_iter().zip(plan.ranges) {
                assert!(start <= end);
                assert!(start >= pool.min() && end <= pool.max());
                assert!(end - start + 1 <= width);
                assert!(start <= center && center <= end);
            }
        }
    }

    #[test]
    fn test_window_shifts_at_min_and_clips_at_max() {
        // Full width at the lower bound
        assert_eq!(range_window(100, 100, 100, 500), (100, 199));
        // Narrower at the upper bound, inside a pool wider than the window
        let (start, end) = range_window(500, 100, 100, 500);
        assert_eq!((start, end), (451, 500));
        assert_eq!(end - start + 1, 50);
    }

    #[test]
    fn test_zero_width_is_clamped() {
        assert_eq!(range_window(300, 0, 100, 500), (300, 300));
    }

    #[test]
    fn test_queries_lists_points_then_ranges() {
        let pool = pool(&[10, 20]);
        let plan = QueryPlan::build(&pool, 2, 1, 5, 1);
        let queries: Vec<PlannedQuery> = plan.queries().collect();
        assert_eq!(
            queries,
            vec![
                PlannedQuery::Point(10),
                PlannedQuery::Point(20),
                PlannedQuery::Range { start: 10, end: 14 },
            ]
        );
    }
}
