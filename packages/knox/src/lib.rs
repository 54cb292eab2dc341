#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Near-repeat Knox engine.
//!
//! Counts incident pairs that are close in both space and time, tests the
//! count against a Monte-Carlo null built by permuting timestamps across
//! fixed positions, and expands the most recent incidents into a hex
//! coverage surface for mapping.
//!
//! The stages are independent and can be used on their own:
//!
//! * [`index`] buckets positions on a coarse spatial grid
//! * [`counter`] counts close pairs behind the [`PairCounter`] trait
//! * [`permutation`] draws the null distribution in parallel
//! * [`significance`] derives the p-value and z-score
//! * [`coverage`] tallies k-disk coverage of the recent window
//! * [`assemble`] builds the `GeoJSON` feature collection
//!
//! [`run`] wires them together for one configuration.

pub mod assemble;
pub mod counter;
pub mod coverage;
pub mod distance;
pub mod index;
pub mod permutation;
pub mod pipeline;
pub mod progress;
pub mod rtree;
pub mod significance;

#[cfg(test)]
mod test_support;

pub use counter::{PairCounter, Thresholds, build_counter};
pub use permutation::PermutationEngine;
pub use pipeline::{NearRepeatRun, run};
pub use progress::{NullProgress, ProgressCallback, null_progress};

use crime_risk_hex::HexError;
use crime_risk_knox_models::ConfigError;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum KnoxError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The hex resolver failed.
    #[error("Hex resolver error: {0}")]
    Hex(#[from] HexError),

    /// Output serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Fewer null samples came back than trials were requested.
    #[error("Null distribution incomplete: expected {expected} samples, got {actual}")]
    IncompleteNull {
        /// Trials requested.
        expected: usize,
        /// Samples collected.
        actual: usize,
    },
}
