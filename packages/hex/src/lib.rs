#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Hexagonal cell resolution for coverage surfaces.
//!
//! [`HexResolver`] is the seam between the analytics and the hex grid: it
//! maps a point to its host cell, expands a cell to its k-disk, and yields
//! the cell's boundary polygon. [`H3Resolver`] implements it on top of
//! `h3o` at one fixed resolution.

use geo::{LineString, Polygon};
use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};

/// Finest H3 resolution.
pub const MAX_RESOLUTION: u8 = 15;

/// Errors raised by a hex resolver.
#[derive(Debug, thiserror::Error)]
pub enum HexError {
    /// Resolution outside the supported range.
    #[error("Invalid H3 resolution {resolution}: expected 0-{MAX_RESOLUTION}")]
    InvalidResolution {
        /// The rejected resolution.
        resolution: u8,
    },

    /// Coordinates the grid cannot index.
    #[error("Invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate {
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lng: f64,
    },

    /// A raw index that is not a valid cell.
    #[error("Invalid cell index {0:#x}")]
    InvalidCell(u64),
}

/// A hex cell identifier.
///
/// Wraps the raw 64-bit H3 index and displays as the canonical lowercase
/// hex string (e.g. `892b9bc5a4bffff`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub u64);

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl From<CellIndex> for CellId {
    fn from(cell: CellIndex) -> Self {
        Self(u64::from(cell))
    }
}

/// Point-to-cell resolution, ring expansion, and cell geometry.
pub trait HexResolver: Send + Sync {
    /// The grid resolution this resolver indexes at.
    fn resolution(&self) -> u8;

    /// The cell containing the point.
    ///
    /// # Errors
    ///
    /// Returns [`HexError::InvalidCoordinate`] for coordinates the grid
    /// cannot index.
    fn cell_of(&self, lat: f64, lng: f64) -> Result<CellId, HexError>;

    /// `cell` plus every cell within `k` steps of it.
    ///
    /// # Errors
    ///
    /// Returns [`HexError::InvalidCell`] if `cell` is not a valid index.
    fn disk(&self, cell: CellId, k: u32) -> Result<Vec<CellId>, HexError>;

    /// The cell boundary as a closed polygon in (lng, lat) order.
    ///
    /// # Errors
    ///
    /// Returns [`HexError::InvalidCell`] if `cell` is not a valid index.
    fn boundary(&self, cell: CellId) -> Result<Polygon<f64>, HexError>;
}

/// [`HexResolver`] backed by the H3 grid.
#[derive(Debug, Clone, Copy)]
pub struct H3Resolver {
    resolution: Resolution,
}

impl H3Resolver {
    /// Creates a resolver at `resolution` (0-15; 9 gives ~175 m edges).
    ///
    /// # Errors
    ///
    /// Returns [`HexError::InvalidResolution`] if `resolution` exceeds 15.
    pub fn new(resolution: u8) -> Result<Self, HexError> {
        let resolution =
            Resolution::try_from(resolution).map_err(|_| HexError::InvalidResolution { resolution })?;
        Ok(Self { resolution })
    }

    fn cell_index(cell: CellId) -> Result<CellIndex, HexError> {
        CellIndex::try_from(cell.0).map_err(|_| HexError::InvalidCell(cell.0))
    }
}

impl HexResolver for H3Resolver {
    fn resolution(&self) -> u8 {
        u8::from(self.resolution)
    }

    fn cell_of(&self, lat: f64, lng: f64) -> Result<CellId, HexError> {
        let coord = LatLng::new(lat, lng).map_err(|_| HexError::InvalidCoordinate { lat, lng })?;
        Ok(coord.to_cell(self.resolution).into())
    }

    fn disk(&self, cell: CellId, k: u32) -> Result<Vec<CellId>, HexError> {
        let index = Self::cell_index(cell)?;
        Ok(index
            .grid_disk::<Vec<_>>(k)
            .into_iter()
            .map(CellId::from)
            .collect())
    }

    fn boundary(&self, cell: CellId) -> Result<Polygon<f64>, HexError> {
        let index = Self::cell_index(cell)?;
        let ring: Vec<(f64, f64)> = index
            .boundary()
            .iter()
            .map(|v| (v.lng(), v.lat()))
            .collect();

        // `Polygon::new` closes the ring.
        Ok(Polygon::new(LineString::from(ring), vec![]))
    }
}
