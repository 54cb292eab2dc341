//! Spatial and temporal indexing for pair-candidate generation.
//!
//! [`SpatialGrid`] buckets incidents into coarse latitude/longitude cells
//! sized so that any two incidents within the distance threshold share a
//! cell or sit in adjacent cells. Row height is the threshold's central
//! angle, since the great-circle angle between two points is at least their
//! latitude difference. Column width follows from the haversine bound
//! `hav(θ) >= cos²(φmax) · hav(Δλ)`, where `φmax` is the largest absolute
//! latitude in the data. Columns wrap at the antimeridian.
//!
//! Positions never change within a run, so the grid is built once.
//! Permutation trials reassign times, so the time-sorted buckets are rebuilt
//! from the grid on every count.

use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::distance::{EARTH_RADIUS_M, Position};

/// Smallest cell size in radians, so a zero threshold still gets a grid.
const MIN_CELL_RAD: f64 = 1e-9;

/// Relative widening of every cell to absorb floating-point error at the
/// threshold boundary.
const CELL_SLACK: f64 = 1.0 + 1e-6;

/// A grid cell as `(row, column)`.
pub type CellKey = (i64, i64);

/// Bucket members as `(time, incident index)`, ascending by time.
pub type TimeSortedBucket = Vec<(i64, usize)>;

/// Coarse latitude/longitude grid over incident positions.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    row_height: f64,
    columns: i64,
    column_width: f64,
    buckets: BTreeMap<CellKey, Vec<usize>>,
}

impl SpatialGrid {
    /// Buckets `positions` for pairs at most `distance_m` apart.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn build(positions: &[Position], distance_m: f64) -> Self {
        let angle = (distance_m / EARTH_RADIUS_M).max(0.0);
        let row_height = (angle * CELL_SLACK).max(MIN_CELL_RAD);

        let max_abs_lat = positions.iter().map(|p| p.lat.abs()).fold(0.0, f64::max);
        let columns = column_count(angle, max_abs_lat);
        let column_width = TAU / columns as f64;

        let mut buckets: BTreeMap<CellKey, Vec<usize>> = BTreeMap::new();
        for (idx, p) in positions.iter().enumerate() {
            let row = ((p.lat + FRAC_PI_2) / row_height).floor() as i64;
            let col = (((p.lng + PI) / column_width).floor() as i64).rem_euclid(columns);
            buckets.entry((row, col)).or_default().push(idx);
        }

        log::debug!(
            "Spatial grid: {} occupied cells, {columns} columns, row height {:.1} m",
            buckets.len(),
            row_height * EARTH_RADIUS_M
        );

        Self {
            row_height,
            columns,
            column_width,
            buckets,
        }
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.buckets.len()
    }

    /// Number of longitude columns (1 when the grid collapses).
    #[must_use]
    pub const fn columns(&self) -> i64 {
        self.columns
    }

    /// `key` and every adjacent cell, without duplicates.
    #[must_use]
    pub fn neighbors(&self, key: CellKey) -> Vec<CellKey> {
        let (row, col) = key;
        let mut cols: Vec<i64> = (-1..=1)
            .map(|dc| (col + dc).rem_euclid(self.columns))
            .collect();
        cols.sort_unstable();
        cols.dedup();

        (-1..=1)
            .flat_map(|dr| cols.iter().map(move |&c| (row + dr, c)))
            .collect()
    }

    /// The grid's buckets with members ordered by `times`.
    ///
    /// Ties are broken by incident index so the layout is deterministic.
    #[must_use]
    pub fn time_sorted(&self, times: &[i64]) -> BTreeMap<CellKey, TimeSortedBucket> {
        self.buckets
            .iter()
            .map(|(&key, members)| {
                let mut bucket: TimeSortedBucket =
                    members.iter().map(|&idx| (times[idx], idx)).collect();
                bucket.sort_unstable();
                (key, bucket)
            })
            .collect()
    }

    /// Row height in radians.
    #[must_use]
    pub const fn row_height(&self) -> f64 {
        self.row_height
    }

    /// Column width in radians.
    #[must_use]
    pub const fn column_width(&self) -> f64 {
        self.column_width
    }
}

/// Longitude columns such that a pair within `angle` radians never spans
/// more than one column boundary at latitudes up to `max_abs_lat`.
#[allow(clippy::cast_possible_truncation)]
fn column_count(angle: f64, max_abs_lat: f64) -> i64 {
    if angle >= PI {
        return 1;
    }
    let ratio = (angle / 2.0).sin() / max_abs_lat.cos();
    if ratio.is_nan() || ratio >= 1.0 {
        return 1;
    }
    let width = (2.0 * ratio.asin() * CELL_SLACK).max(MIN_CELL_RAD);
    let columns = (TAU / width).floor();
    // Fewer than three columns would make every column adjacent to itself
    // across the wrap.
    if columns < 3.0 { 1 } else { columns as i64 }
}
