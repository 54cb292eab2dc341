//! R-tree pair strategy.
//!
//! Positions are indexed as points on a sphere in 3D Cartesian space, where
//! a great-circle distance bound maps to a straight-line chord bound with no
//! distortion near the poles or the antimeridian. Spatially close pairs are
//! found once at construction; each count only filters them by time.

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::counter::{PairCounter, Thresholds};
use crate::distance::{Position, chord_for_arc};

/// Relative and absolute widening of the chord query radius, in meters.
const CHORD_SLACK: f64 = 1.0 + 1e-9;
const CHORD_MARGIN_M: f64 = 1e-3;

/// An incident position stored in the R-tree with its index.
struct SpherePoint {
    xyz: [f64; 3],
    idx: usize,
}

impl RTreeObject for SpherePoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.xyz)
    }
}

impl PointDistance for SpherePoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        self.xyz
            .iter()
            .zip(point)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// Precomputed spatially close pairs, filtered by time on each count.
pub struct RTreePairCounter {
    incident_count: usize,
    pairs: Vec<(usize, usize)>,
    thresholds: Thresholds,
}

impl RTreePairCounter {
    /// Indexes `positions` and collects every pair within the distance
    /// threshold.
    #[must_use]
    pub fn new(positions: &[Position], thresholds: Thresholds) -> Self {
        let tree = RTree::bulk_load(
            positions
                .iter()
                .enumerate()
                .map(|(idx, p)| SpherePoint {
                    xyz: p.to_cartesian(),
                    idx,
                })
                .collect(),
        );

        let radius = chord_for_arc(thresholds.distance_m).mul_add(CHORD_SLACK, CHORD_MARGIN_M);
        let radius_2 = radius * radius;

        let mut pairs = Vec::new();
        for (i, p) in positions.iter().enumerate() {
            for candidate in tree.locate_within_distance(p.to_cartesian(), radius_2) {
                let j = candidate.idx;
                if j > i && thresholds.within_distance(p, &positions[j]) {
                    pairs.push((i, j));
                }
            }
        }
        pairs.sort_unstable();

        log::debug!(
            "R-tree found {} spatially close pairs among {} incidents",
            pairs.len(),
            positions.len()
        );

        Self {
            incident_count: positions.len(),
            pairs,
            thresholds,
        }
    }

    /// Spatially close pairs, ignoring time.
    #[must_use]
    pub fn spatial_pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }
}

impl PairCounter for RTreePairCounter {
    fn incident_count(&self) -> usize {
        self.incident_count
    }

    fn count_pairs(&self, times: &[i64]) -> u64 {
        let mut count = 0;
        for &(i, j) in &self.pairs {
            if self.thresholds.within_time(times[i], times[j]) {
                count += 1;
            }
        }
        count
    }
}
