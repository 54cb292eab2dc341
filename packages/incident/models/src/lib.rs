#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Incident record types and anchor-relative time windows.
//!
//! An [`Incident`] is one geotagged crime record. Every relative window used
//! by the analytics is measured back from an [`AnchorDate`], the latest
//! timestamp in the loaded data, never from the wall clock.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of milliseconds in one day.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// One geotagged crime record.
///
/// Immutable once loaded. Construct through [`Incident::new`] so that the
/// position invariants hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    /// Opaque unique identifier from the source.
    pub id: String,
    /// Latitude in degrees, -90..=90.
    pub latitude: f64,
    /// Longitude in degrees, -180..=180.
    pub longitude: f64,
    /// When the incident occurred.
    pub occurred_at: DateTime<Utc>,
    /// Offence category label, if the source provides one.
    pub category: Option<String>,
}

/// Why a source record was left out of the loaded incident set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExclusionReason {
    /// Latitude or longitude absent or unparseable.
    MissingPosition,
    /// Latitude or longitude is NaN or infinite.
    NonFinitePosition,
    /// Latitude outside -90..=90 or longitude outside -180..=180.
    OutOfRangePosition,
    /// Both coordinates are exactly zero, a placeholder for suppressed
    /// locations in several open-data feeds.
    NullIsland,
    /// Timestamp absent or unparseable.
    MissingTimestamp,
}

impl Incident {
    /// Creates an incident after validating its position.
    ///
    /// # Errors
    ///
    /// Returns the [`ExclusionReason`] describing why the position is
    /// unusable.
    pub fn new(
        id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        occurred_at: DateTime<Utc>,
        category: Option<String>,
    ) -> Result<Self, ExclusionReason> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(ExclusionReason::NonFinitePosition);
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(ExclusionReason::OutOfRangePosition);
        }
        if latitude == 0.0 && longitude == 0.0 {
            return Err(ExclusionReason::NullIsland);
        }

        Ok(Self {
            id: id.into(),
            latitude,
            longitude,
            occurred_at,
            category,
        })
    }

    /// Milliseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp_millis(&self) -> i64 {
        self.occurred_at.timestamp_millis()
    }

    /// Case-insensitive substring match against the category label.
    ///
    /// Incidents without a category never match.
    #[must_use]
    pub fn matches_category(&self, filter: &str) -> bool {
        let needle = filter.trim().to_lowercase();
        self.category
            .as_deref()
            .is_some_and(|c| c.to_lowercase().contains(&needle))
    }
}

/// Keeps only incidents whose category matches `filter`.
///
/// A missing or blank filter keeps everything.
#[must_use]
pub fn filter_by_category(incidents: &[Incident], filter: Option<&str>) -> Vec<Incident> {
    match filter.map(str::trim) {
        Some(f) if !f.is_empty() => incidents
            .iter()
            .filter(|i| i.matches_category(f))
            .cloned()
            .collect(),
        _ => incidents.to_vec(),
    }
}

/// The latest timestamp in a dataset; the reference point for every
/// relative window in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnchorDate(DateTime<Utc>);

impl AnchorDate {
    /// Wraps an explicit instant.
    #[must_use]
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Maximum `occurred_at` across `incidents`, or `None` when empty.
    #[must_use]
    pub fn from_incidents(incidents: &[Incident]) -> Option<Self> {
        incidents.iter().map(|i| i.occurred_at).max().map(Self)
    }

    /// The anchor instant.
    #[must_use]
    pub const fn at(self) -> DateTime<Utc> {
        self.0
    }

    /// The window `[anchor - days, anchor]`.
    #[must_use]
    pub fn window(self, days: u32) -> TimeWindow {
        let start = self
            .0
            .checked_sub_signed(TimeDelta::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        TimeWindow {
            start,
            end: self.0,
            days,
        }
    }
}

impl std::fmt::Display for AnchorDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

/// A closed time interval measured back from an [`AnchorDate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Inclusive upper bound (the anchor).
    pub end: DateTime<Utc>,
    /// Window length in days.
    pub days: u32,
}

impl TimeWindow {
    /// Whether `at` falls inside the window, bounds included.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    /// Incidents inside the window, in input order.
    #[must_use]
    pub fn select<'a>(&self, incidents: &'a [Incident]) -> Vec<&'a Incident> {
        incidents
            .iter()
            .filter(|i| self.contains(i.occurred_at))
            .collect()
    }
}
