#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Configuration, result, and output schema types for the near-repeat
//! Knox engine.
//!
//! [`KnoxConfig`] is the full configuration surface of one run and loads
//! from TOML. [`KnoxResult`] is the global significance summary, and
//! [`NearRepeatProperties`] is the per-feature property schema that map
//! clients read from the emitted `GeoJSON`.

use chrono::{DateTime, Utc};
use crime_risk_hex::CellId;
use crime_risk_incident_models::{MILLIS_PER_DAY, TimeWindow};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Errors raised by configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A threshold is negative, NaN, or infinite.
    #[error("Invalid {name}: {value} (must be a finite, non-negative number)")]
    InvalidThreshold {
        /// Which threshold.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// The permutation count is zero.
    #[error("Permutation count must be at least 1")]
    ZeroPermutations,

    /// H3 resolution outside 0-15.
    #[error("Invalid H3 resolution {resolution}: expected 0-15")]
    InvalidResolution {
        /// The rejected resolution.
        resolution: u8,
    },

    /// A time window of zero days.
    #[error("{name} must cover at least one day")]
    EmptyWindow {
        /// Which window.
        name: &'static str,
    },

    /// The supplied hex resolver indexes at a different resolution than
    /// configured.
    #[error("Hex resolver resolution {actual} does not match configured resolution {expected}")]
    ResolutionMismatch {
        /// Configured resolution.
        expected: u8,
        /// Resolver's resolution.
        actual: u8,
    },

    /// The TOML configuration could not be parsed.
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How the pair counter prunes candidate pairs.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PairStrategy {
    /// Every pair checked; the reference implementation.
    Naive,
    /// Coarse spatial grid with time-sorted buckets.
    #[default]
    Grid,
    /// R-tree spatial candidates, filtered by time on each count.
    #[serde(rename = "rtree")]
    #[strum(serialize = "rtree")]
    RTree,
}

/// Configuration for one near-repeat run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KnoxConfig {
    /// H3 resolution of the coverage surface.
    pub resolution: u8,
    /// Pair distance threshold in meters.
    pub distance_threshold_m: f64,
    /// Pair time threshold in days.
    pub time_threshold_days: f64,
    /// Window used for the significance test, in days back from the anchor.
    pub lookback_days: u32,
    /// Window used for the coverage surface, in days back from the anchor.
    pub recent_days: u32,
    /// Ring radius for coverage expansion.
    pub k: u32,
    /// Number of permutation trials.
    pub permutations: usize,
    /// Base seed for the permutation trials; drawn from entropy when unset.
    pub seed: Option<u64>,
    /// Case-insensitive offence category substring.
    pub offence_filter: Option<String>,
    /// Pair counting strategy.
    pub strategy: PairStrategy,
}

impl Default for KnoxConfig {
    fn default() -> Self {
        Self {
            resolution: 9,
            distance_threshold_m: 250.0,
            time_threshold_days: 14.0,
            lookback_days: 90,
            recent_days: 14,
            k: 1,
            permutations: 500,
            seed: None,
            offence_filter: None,
            strategy: PairStrategy::Grid,
        }
    }
}

impl KnoxConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown keys.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(toml_str)?)
    }

    /// Checks every field before any computation starts.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("distance threshold", self.distance_threshold_m),
            ("time threshold", self.time_threshold_days),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if self.permutations == 0 {
            return Err(ConfigError::ZeroPermutations);
        }
        if self.resolution > crime_risk_hex::MAX_RESOLUTION {
            return Err(ConfigError::InvalidResolution {
                resolution: self.resolution,
            });
        }
        if self.lookback_days == 0 {
            return Err(ConfigError::EmptyWindow {
                name: "lookback window",
            });
        }
        if self.recent_days == 0 {
            return Err(ConfigError::EmptyWindow {
                name: "recent window",
            });
        }
        Ok(())
    }

    /// The time threshold in milliseconds, rounded to the nearest one.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn time_threshold_millis(&self) -> i64 {
        (self.time_threshold_days * MILLIS_PER_DAY as f64).round() as i64
    }
}

/// A z-score, or the explicit sentinel for a zero-variance null.
///
/// Serializes as a number, or as `null` when undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZScore {
    /// `(observed - mean) / std` with `std > 0`.
    Value(f64),
    /// The null distribution had no spread (or no samples).
    Undefined,
}

impl ZScore {
    /// The numeric value, if defined.
    #[must_use]
    pub const fn as_f64(self) -> Option<f64> {
        match self {
            Self::Value(z) => Some(z),
            Self::Undefined => None,
        }
    }
}

impl std::fmt::Display for ZScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(z) => write!(f, "{z:.2}"),
            Self::Undefined => write!(f, "undefined"),
        }
    }
}

/// Why a [`KnoxResult`] is degenerate.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DegenerateReason {
    /// Fewer than two incidents in the lookback window.
    TooFewIncidents,
    /// Every null sample was identical.
    ZeroVariance,
}

/// The empirical null distribution of pair counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullDistribution {
    /// One pair count per trial, in trial order.
    pub samples: Vec<u64>,
    /// Base seed the trials were drawn with.
    pub seed: u64,
}

impl NullDistribution {
    /// A distribution with no samples.
    #[must_use]
    pub const fn empty(seed: u64) -> Self {
        Self {
            samples: Vec::new(),
            seed,
        }
    }

    /// Number of samples.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether there are no samples.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Arithmetic mean, or 0 when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|&s| s as f64).sum::<f64>() / self.samples.len() as f64
    }

    /// Population standard deviation, or 0 when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn population_std(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .samples
            .iter()
            .map(|&s| {
                let d = s as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / self.samples.len() as f64;
        variance.sqrt()
    }

    /// Number of samples greater than or equal to `observed`.
    #[must_use]
    pub fn count_at_least(&self, observed: u64) -> usize {
        self.samples.iter().filter(|&&s| s >= observed).count()
    }
}

/// Global significance summary of one Knox test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnoxResult {
    /// Incidents in the lookback window.
    pub incident_count: usize,
    /// Close pairs under the true space-time assignment.
    pub observed_count: u64,
    /// Mean of the null samples.
    pub null_mean: f64,
    /// Population standard deviation of the null samples.
    pub null_std: f64,
    /// Standardized observed count.
    pub z_score: ZScore,
    /// One-sided Monte-Carlo p-value, `(1 + #{null >= observed}) / (1 + R)`.
    pub p_value: f64,
    /// Null samples drawn.
    pub permutations: usize,
    /// Base seed of the permutation trials.
    pub seed: u64,
    /// Set when the statistic is degenerate.
    pub degenerate: Option<DegenerateReason>,
}

impl KnoxResult {
    /// Whether the result carries a degenerate flag.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.degenerate.is_some()
    }
}

/// Coverage tally for one hex cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexCoverageCell {
    /// The cell.
    pub cell: CellId,
    /// Ring expansions landing on the cell.
    pub coverage: u32,
}

/// Properties carried by every emitted hex feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearRepeatProperties {
    /// H3 index string.
    pub h3: String,
    /// Ring expansions landing on the cell (at least 1).
    pub coverage: u32,
    /// Run-global p-value.
    pub p_value: f64,
    /// Run-global z-score, `null` when undefined.
    pub z_score: ZScore,
    /// Ring radius used.
    pub k: u32,
    /// Recent window length in days.
    pub window_days: u32,
    /// Whether the run-global statistic is degenerate.
    pub degenerate: bool,
}

impl NearRepeatProperties {
    /// Properties for one cell of a run.
    #[must_use]
    pub fn new(cell: &HexCoverageCell, result: &KnoxResult, k: u32, window_days: u32) -> Self {
        Self {
            h3: cell.cell.to_string(),
            coverage: cell.coverage,
            p_value: result.p_value,
            z_score: result.z_score,
            k,
            window_days,
            degenerate: result.is_degenerate(),
        }
    }
}

/// Run metadata attached to the feature collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearRepeatSummary {
    /// Latest timestamp in the input, if any.
    pub anchor: Option<DateTime<Utc>>,
    /// Window used for the significance test.
    pub lookback: Option<TimeWindow>,
    /// Window used for the coverage surface.
    pub recent: Option<TimeWindow>,
    /// Incidents in the recent window.
    pub recent_incident_count: usize,
    /// Cells in the coverage surface.
    pub cell_count: usize,
    /// Distance threshold in meters.
    pub distance_threshold_m: f64,
    /// Time threshold in days.
    pub time_threshold_days: f64,
    /// H3 resolution.
    pub resolution: u8,
    /// Ring radius.
    pub k: u32,
    /// Offence filter applied upstream.
    pub offence_filter: Option<String>,
    /// Pair counting strategy used.
    pub strategy: PairStrategy,
    /// The significance summary.
    pub result: KnoxResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = KnoxConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_threshold_millis(), 14 * MILLIS_PER_DAY);
    }

    #[test]
    fn rejects_negative_and_non_finite_thresholds() {
        let config = KnoxConfig {
            distance_threshold_m: -1.0,
            ..KnoxConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold {
                name: "distance threshold",
                ..
            })
        ));

        let config = KnoxConfig {
            time_threshold_days: f64::NAN,
            ..KnoxConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold {
                name: "time threshold",
                ..
            })
        ));
    }

    #[test]
    fn rejects_zero_permutations_and_bad_resolution() {
        let config = KnoxConfig {
            permutations: 0,
            ..KnoxConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroPermutations)
        ));

        let config = KnoxConfig {
            resolution: 16,
            ..KnoxConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidResolution { resolution: 16 })
        ));
    }

    #[test]
    fn rejects_empty_windows() {
        let config = KnoxConfig {
            recent_days: 0,
            ..KnoxConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyWindow { .. })
        ));
    }

    #[test]
    fn loads_partial_toml() {
        let config = KnoxConfig::from_toml(
            r#"
            distance_threshold_m = 400.0
            permutations = 99
            seed = 42
            strategy = "rtree"
            "#,
        )
        .unwrap();
        assert!((config.distance_threshold_m - 400.0).abs() < f64::EPSILON);
        assert_eq!(config.permutations, 99);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.strategy, PairStrategy::RTree);
        assert_eq!(config.lookback_days, 90);
    }

    #[test]
    fn rejects_unknown_toml_keys() {
        assert!(matches!(
            KnoxConfig::from_toml("distance = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn strategy_parses_from_str() {
        assert_eq!("grid".parse::<PairStrategy>().unwrap(), PairStrategy::Grid);
        assert_eq!("rtree".parse::<PairStrategy>().unwrap(), PairStrategy::RTree);
        assert_eq!(PairStrategy::Naive.to_string(), "naive");
    }

    #[test]
    fn null_statistics_use_population_std() {
        let null = NullDistribution {
            samples: vec![2, 4, 4, 4, 5, 5, 7, 9],
            seed: 0,
        };
        assert!((null.mean() - 5.0).abs() < 1e-12);
        assert!((null.population_std() - 2.0).abs() < 1e-12);
        assert_eq!(null.count_at_least(5), 4);
    }

    #[test]
    fn empty_null_statistics_are_zero() {
        let null = NullDistribution::empty(7);
        assert!(null.is_empty());
        assert!(null.mean().abs() < f64::EPSILON);
        assert!(null.population_std().abs() < f64::EPSILON);
    }

    #[test]
    fn z_score_serializes_as_number_or_null() {
        assert_eq!(serde_json::to_string(&ZScore::Value(1.5)).unwrap(), "1.5");
        assert_eq!(serde_json::to_string(&ZScore::Undefined).unwrap(), "null");
        assert_eq!(
            serde_json::from_str::<ZScore>("null").unwrap(),
            ZScore::Undefined
        );
        assert_eq!(ZScore::Undefined.to_string(), "undefined");
    }
}
