#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CSV ingestion for geotagged crime incidents.
//!
//! Reads a police open-data CSV export, resolves the latitude, longitude,
//! date, time, offence, and id columns (guessed by name or given
//! explicitly), and produces validated [`Incident`]s. Records with an
//! unusable position or timestamp are excluded rather than failing the load,
//! and the exclusions are tallied per [`ExclusionReason`] in the
//! [`LoadReport`].

pub mod columns;
pub mod parsing;

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};
use crime_risk_incident_models::{ExclusionReason, Incident};

pub use columns::{ColumnMapping, ColumnOverrides};

/// Errors that can occur while loading incidents.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// I/O error opening the source file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV could not be read.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Required columns could not be resolved.
    #[error("Required columns missing ({missing}). Saw: {seen}")]
    MissingColumns {
        /// Logical columns that could not be resolved.
        missing: String,
        /// Header names present in the file.
        seen: String,
    },

    /// The configured UTC offset is out of range.
    #[error("Invalid UTC offset: {minutes} minutes")]
    InvalidUtcOffset {
        /// The rejected offset.
        minutes: i32,
    },
}

/// Options controlling how a CSV is interpreted.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Explicit header names.
    pub columns: ColumnOverrides,
    /// Offset applied to timestamps that carry none, in minutes east of UTC.
    pub utc_offset_minutes: i32,
}

impl IngestOptions {
    fn offset(&self) -> Result<FixedOffset, IngestError> {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).ok_or(
            IngestError::InvalidUtcOffset {
                minutes: self.utc_offset_minutes,
            },
        )
    }
}

/// Outcome of loading one CSV.
#[derive(Debug, Clone)]
pub struct LoadReport {
    /// Valid incidents in file order.
    pub incidents: Vec<Incident>,
    /// Excluded record counts by reason.
    pub excluded: BTreeMap<ExclusionReason, u64>,
    /// Data rows read, excluded ones included.
    pub total_rows: u64,
    /// How the headers were resolved.
    pub columns: ColumnMapping,
}

impl LoadReport {
    /// Total excluded records.
    #[must_use]
    pub fn excluded_total(&self) -> u64 {
        self.excluded.values().sum()
    }

    /// Earliest and latest incident timestamps, or `None` when empty.
    #[must_use]
    pub fn data_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let min = self.incidents.iter().map(|i| i.occurred_at).min()?;
        let max = self.incidents.iter().map(|i| i.occurred_at).max()?;
        Some((min, max))
    }
}

/// Loads incidents from a CSV file on disk.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened, the CSV is
/// malformed, or required columns are missing.
pub fn load_csv(path: &Path, options: &IngestOptions) -> Result<LoadReport, IngestError> {
    log::info!("Reading incidents from {}", path.display());
    let file = std::fs::File::open(path)?;
    load_reader(file, options)
}

/// Loads incidents from any CSV byte stream.
///
/// # Errors
///
/// Returns [`IngestError`] if the CSV is malformed or required columns are
/// missing.
pub fn load_reader<R: Read>(reader: R, options: &IngestOptions) -> Result<LoadReport, IngestError> {
    let offset = options.offset()?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let header_names: Vec<&str> = headers.iter().collect();
    let columns = ColumnMapping::resolve(&header_names, &options.columns)?;
    log::debug!("Resolved columns: {:?}", columns.names);

    let mut incidents = Vec::new();
    let mut excluded: BTreeMap<ExclusionReason, u64> = BTreeMap::new();
    let mut total_rows: u64 = 0;

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        total_rows += 1;

        match parse_record(&record, row + 1, &columns, offset) {
            Ok(incident) => incidents.push(incident),
            Err(reason) => *excluded.entry(reason).or_default() += 1,
        }
    }

    let report = LoadReport {
        incidents,
        excluded,
        total_rows,
        columns,
    };

    log::info!(
        "Loaded {} incidents from {} rows ({} excluded)",
        report.incidents.len(),
        report.total_rows,
        report.excluded_total()
    );
    for (reason, count) in &report.excluded {
        log::warn!("Excluded {count} records: {reason}");
    }

    Ok(report)
}

fn parse_record(
    record: &csv::StringRecord,
    row: usize,
    columns: &ColumnMapping,
    offset: FixedOffset,
) -> Result<Incident, ExclusionReason> {
    let field = |idx: usize| record.get(idx).unwrap_or("");
    let optional = |idx: Option<usize>| {
        idx.and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let latitude = parsing::parse_coordinate(field(columns.latitude));
    let longitude = parsing::parse_coordinate(field(columns.longitude));
    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        return Err(ExclusionReason::MissingPosition);
    };

    let time = columns.time.map(field);
    let occurred_at = parsing::parse_occurrence(field(columns.date), time, offset)
        .ok_or(ExclusionReason::MissingTimestamp)?;

    let id = optional(columns.id).map_or_else(|| row.to_string(), str::to_string);
    let category = optional(columns.offence).map(str::to_string);

    Incident::new(id, latitude, longitude, occurred_at, category)
}
