//! Space-time close-pair counting.
//!
//! A [`PairCounter`] is built once per run from the incident positions and
//! then asked to count close pairs under many time assignments: the true
//! one and every permutation. Every strategy confirms a candidate with
//! [`Position::distance_m`] and [`Thresholds::within_time`], so they return
//! identical counts on identical input.

use crime_risk_knox_models::{KnoxConfig, PairStrategy};

use crate::distance::Position;
use crate::index::{SpatialGrid, TimeSortedBucket};
use crate::rtree::RTreePairCounter;

/// Closeness thresholds for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Maximum great-circle distance in meters, inclusive.
    pub distance_m: f64,
    /// Maximum absolute time difference in milliseconds, inclusive.
    pub time_ms: i64,
}

impl Thresholds {
    /// Thresholds taken from a validated config.
    #[must_use]
    pub fn from_config(config: &KnoxConfig) -> Self {
        Self {
            distance_m: config.distance_threshold_m,
            time_ms: config.time_threshold_millis(),
        }
    }

    /// Whether two timestamps are within the time threshold.
    #[must_use]
    pub const fn within_time(&self, a: i64, b: i64) -> bool {
        a.abs_diff(b) <= self.time_ms.unsigned_abs()
    }

    /// Whether two positions are within the distance threshold.
    #[must_use]
    pub fn within_distance(&self, a: &Position, b: &Position) -> bool {
        a.distance_m(b) <= self.distance_m
    }
}

/// Counts unordered close pairs for a fixed set of positions.
pub trait PairCounter: Send + Sync {
    /// Number of incidents the counter was built over.
    fn incident_count(&self) -> usize;

    /// Close pairs when incident `i` occurs at `times[i]` (epoch millis).
    ///
    /// `times` must have exactly [`Self::incident_count`] entries.
    fn count_pairs(&self, times: &[i64]) -> u64;
}

/// Builds the counter for `strategy`.
#[must_use]
pub fn build_counter(
    strategy: PairStrategy,
    positions: Vec<Position>,
    thresholds: Thresholds,
) -> Box<dyn PairCounter> {
    log::debug!(
        "Building {strategy} pair counter over {} incidents",
        positions.len()
    );
    match strategy {
        PairStrategy::Naive => Box::new(NaivePairCounter::new(positions, thresholds)),
        PairStrategy::Grid => Box::new(GridPairCounter::new(positions, thresholds)),
        PairStrategy::RTree => Box::new(RTreePairCounter::new(&positions, thresholds)),
    }
}

/// Checks every pair. Quadratic; the reference the other strategies are
/// tested against.
pub struct NaivePairCounter {
    positions: Vec<Position>,
    thresholds: Thresholds,
}

impl NaivePairCounter {
    #[must_use]
    pub const fn new(positions: Vec<Position>, thresholds: Thresholds) -> Self {
        Self {
            positions,
            thresholds,
        }
    }
}

impl PairCounter for NaivePairCounter {
    fn incident_count(&self) -> usize {
        self.positions.len()
    }

    fn count_pairs(&self, times: &[i64]) -> u64 {
        let mut count = 0;
        for (i, a) in self.positions.iter().enumerate() {
            for (j, b) in self.positions.iter().enumerate().skip(i + 1) {
                if self.thresholds.within_time(times[i], times[j])
                    && self.thresholds.within_distance(a, b)
                {
                    count += 1;
                }
            }
        }
        count
    }
}

/// Spatial grid with time-sorted buckets.
///
/// Within a bucket a sliding window stops at the first member past the time
/// threshold. Across neighboring buckets a binary search bounds the time
/// range. Each pair of buckets is visited once, from the smaller key.
pub struct GridPairCounter {
    positions: Vec<Position>,
    thresholds: Thresholds,
    grid: SpatialGrid,
}

impl GridPairCounter {
    #[must_use]
    pub fn new(positions: Vec<Position>, thresholds: Thresholds) -> Self {
        let grid = SpatialGrid::build(&positions, thresholds.distance_m);
        Self {
            positions,
            thresholds,
            grid,
        }
    }

    fn close(&self, i: usize, j: usize) -> bool {
        self.thresholds
            .within_distance(&self.positions[i], &self.positions[j])
    }

    fn count_within(&self, bucket: &TimeSortedBucket) -> u64 {
        let tau = self.thresholds.time_ms.unsigned_abs();
        let mut count = 0;
        for (a, &(ta, i)) in bucket.iter().enumerate() {
            for &(tb, j) in &bucket[a + 1..] {
                if tb.abs_diff(ta) > tau {
                    break;
                }
                if self.close(i, j) {
                    count += 1;
                }
            }
        }
        count
    }

    fn count_across(&self, bucket: &TimeSortedBucket, other: &TimeSortedBucket) -> u64 {
        let tau = self.thresholds.time_ms;
        let mut count = 0;
        for &(t, i) in bucket {
            let lo = other.partition_point(|&(u, _)| u < t.saturating_sub(tau));
            let hi = other.partition_point(|&(u, _)| u <= t.saturating_add(tau));
            for &(_, j) in &other[lo..hi] {
                if self.close(i, j) {
                    count += 1;
                }
            }
        }
        count
    }
}

impl PairCounter for GridPairCounter {
    fn incident_count(&self) -> usize {
        self.positions.len()
    }

    fn count_pairs(&self, times: &[i64]) -> u64 {
        let buckets = self.grid.time_sorted(times);
        let mut count = 0;
        for (&key, bucket) in &buckets {
            count += self.count_within(bucket);
            for neighbor in self.grid.neighbors(key) {
                if neighbor <= key {
                    continue;
                }
                if let Some(other) = buckets.get(&neighbor) {
                    count += self.count_across(bucket, other);
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use rand::seq::SliceRandom;

    use super::*;
    use crate::test_support::{clustered_fixture, uniform_fixture};

    const DAY: i64 = 86_400_000;

    fn thresholds(distance_m: f64, days: i64) -> Thresholds {
        Thresholds {
            distance_m,
            time_ms: days * DAY,
        }
    }

    fn all_counts(positions: &[Position], times: &[i64], t: Thresholds) -> [u64; 3] {
        [PairStrategy::Naive, PairStrategy::Grid, PairStrategy::RTree]
            .map(|s| build_counter(s, positions.to_vec(), t).count_pairs(times))
    }

    #[test]
    fn counts_simple_pairs() {
        let positions = vec![
            Position::from_degrees(43.6500, -79.3800),
            Position::from_degrees(43.6505, -79.3800),
            Position::from_degrees(43.7000, -79.3800),
        ];
        // 0 and 1 are ~56 m apart; 2 is ~5.5 km away.
        let times = [0, 3 * DAY, 0];
        for count in all_counts(&positions, &times, thresholds(250.0, 14)) {
            assert_eq!(count, 1);
        }
        for count in all_counts(&positions, &times, thresholds(250.0, 2)) {
            assert_eq!(count, 0);
        }
    }

    #[test]
    fn thresholds_are_inclusive() {
        let a = Position::from_degrees(0.0, 0.0);
        let b = Position::from_degrees(0.0, 0.001);
        let d = a.distance_m(&b);
        let t = Thresholds {
            distance_m: d,
            time_ms: DAY,
        };
        for count in all_counts(&[a, b], &[0, DAY], t) {
            assert_eq!(count, 1);
        }
    }

    #[test]
    fn empty_and_single_inputs_count_zero() {
        for count in all_counts(&[], &[], thresholds(250.0, 14)) {
            assert_eq!(count, 0);
        }
        let one = [Position::from_degrees(43.65, -79.38)];
        for count in all_counts(&one, &[0], thresholds(250.0, 14)) {
            assert_eq!(count, 0);
        }
    }

    #[test]
    fn zero_thresholds_count_exact_duplicates() {
        let p = Position::from_degrees(43.65, -79.38);
        let positions = vec![p, p, p, Position::from_degrees(43.66, -79.38)];
        let times = [5, 5, 6, 5];
        // Only (0, 1) shares both position and time.
        for count in all_counts(&positions, &times, thresholds(0.0, 0)) {
            assert_eq!(count, 1);
        }
    }

    #[test]
    fn strategies_agree_on_clustered_data() {
        let (positions, times) = clustered_fixture(7, 400);
        let t = thresholds(250.0, 14);
        let [naive, grid, rtree] = all_counts(&positions, &times, t);
        assert!(naive > 0);
        assert_eq!(naive, grid);
        assert_eq!(naive, rtree);
    }

    #[test]
    fn strategies_agree_on_shuffled_times() {
        let (positions, mut times) = clustered_fixture(11, 300);
        let t = thresholds(300.0, 7);
        let counters: Vec<_> = [PairStrategy::Naive, PairStrategy::Grid, PairStrategy::RTree]
            .into_iter()
            .map(|s| build_counter(s, positions.clone(), t))
            .collect();
        let mut rng = crate::test_support::rng(3);
        for _ in 0..10 {
            times.shuffle(&mut rng);
            let expected = counters[0].count_pairs(&times);
            for counter in &counters[1..] {
                assert_eq!(counter.count_pairs(&times), expected);
            }
        }
    }

    #[test]
    fn strategies_agree_across_antimeridian_and_poles() {
        let positions = vec![
            Position::from_degrees(-16.0, 179.9990),
            Position::from_degrees(-16.0, -179.9990),
            Position::from_degrees(-16.0005, 179.9998),
            Position::from_degrees(89.9995, 10.0),
            Position::from_degrees(89.9995, -170.0),
            Position::from_degrees(89.9990, 100.0),
        ];
        let times = [0, DAY, 2 * DAY, 0, DAY, 2 * DAY];
        let [naive, grid, rtree] = all_counts(&positions, &times, thresholds(250.0, 14));
        assert_eq!(naive, 6);
        assert_eq!(grid, naive);
        assert_eq!(rtree, naive);
    }

    #[test]
    fn count_is_invariant_under_reordering() {
        let (positions, times) = uniform_fixture(5, 200);
        let t = thresholds(500.0, 10);
        let base = build_counter(PairStrategy::Grid, positions.clone(), t).count_pairs(&times);

        let mut order: Vec<usize> = (0..positions.len()).collect();
        order.reverse();
        let reordered_positions: Vec<_> = order.iter().map(|&i| positions[i]).collect();
        let reordered_times: Vec<_> = order.iter().map(|&i| times[i]).collect();
        let reordered = build_counter(PairStrategy::Grid, reordered_positions, t)
            .count_pairs(&reordered_times);
        assert_eq!(base, reordered);
    }

    #[test]
    fn count_is_monotonic_in_thresholds() {
        let (positions, times) = uniform_fixture(9, 250);
        let mut previous = 0;
        for (distance_m, days) in [(100.0, 3), (250.0, 7), (500.0, 14), (1000.0, 30)] {
            let counter =
                build_counter(PairStrategy::Grid, positions.clone(), thresholds(distance_m, days));
            let count = counter.count_pairs(&times);
            assert!(count >= previous);
            previous = count;
        }
    }

    #[test]
    fn time_check_does_not_overflow() {
        let p = Position::from_degrees(43.65, -79.38);
        let t = Thresholds {
            distance_m: 10.0,
            time_ms: i64::MAX,
        };
        for count in all_counts(&[p, p], &[i64::MIN / 2, i64::MAX / 2], t) {
            assert_eq!(count, 1);
        }
    }
}
