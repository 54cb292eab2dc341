//! Column resolution for incident CSV exports.
//!
//! Open-data portals name the same fields differently (`LAT_WGS84`,
//! `latitude`, `y`, ...). Each logical column has a pool of candidate header
//! names, compared case-insensitively in pool order. Explicit overrides
//! always win.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::IngestError;

const LAT_CANDIDATES: &[&str] = &["lat_wgs84", "latitude", "lat", "y"];
const LON_CANDIDATES: &[&str] = &["long_wgs84", "longitude", "long", "lon", "x"];
const DATE_CANDIDATES: &[&str] = &[
    "occ_date",
    "occurrencedate",
    "occurrence_date",
    "report_date",
    "date",
];
const TIME_CANDIDATES: &[&str] = &[
    "occ_hour",
    "occurrencetime",
    "occurrence_time",
    "report_hour",
    "time",
    "hour",
];
const OFFENCE_CANDIDATES: &[&str] = &["mci_category", "offence", "offense", "mci"];
const ID_CANDIDATES: &[&str] = &["event_unique_id", "id", "objectid", "incident_id"];

/// User-specified header names that bypass guessing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnOverrides {
    /// Latitude header.
    pub latitude: Option<String>,
    /// Longitude header.
    pub longitude: Option<String>,
    /// Occurrence date header.
    pub date: Option<String>,
    /// Occurrence hour or time-of-day header.
    pub time: Option<String>,
    /// Offence category header.
    pub offence: Option<String>,
    /// Record identifier header.
    pub id: Option<String>,
}

/// Resolved header positions for one CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    /// Latitude column index.
    pub latitude: usize,
    /// Longitude column index.
    pub longitude: usize,
    /// Date column index.
    pub date: usize,
    /// Optional time column index.
    pub time: Option<usize>,
    /// Optional offence column index.
    pub offence: Option<usize>,
    /// Optional id column index.
    pub id: Option<usize>,
    /// Header names keyed by logical column, for logging.
    pub names: BTreeMap<&'static str, String>,
}

impl ColumnMapping {
    /// Resolves every logical column against `headers`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::MissingColumns`] if latitude, longitude, or
    /// date cannot be resolved, or if an override names a header that does
    /// not exist.
    pub fn resolve(headers: &[&str], overrides: &ColumnOverrides) -> Result<Self, IngestError> {
        let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let mut missing = Vec::new();
        let mut names = BTreeMap::new();

        let mut find = |logical: &'static str,
                        explicit: Option<&String>,
                        pool: &[&str],
                        required: bool|
         -> Option<usize> {
            let found = explicit.map_or_else(
                || pick(&lowered, pool),
                |name| {
                    let wanted = name.trim().to_lowercase();
                    lowered.iter().position(|h| *h == wanted)
                },
            );
            match found {
                Some(idx) => {
                    names.insert(logical, headers[idx].to_string());
                }
                None if required || explicit.is_some() => missing.push(logical),
                None => {}
            }
            found
        };

        let latitude = find("latitude", overrides.latitude.as_ref(), LAT_CANDIDATES, true);
        let longitude = find("longitude", overrides.longitude.as_ref(), LON_CANDIDATES, true);
        let date = find("date", overrides.date.as_ref(), DATE_CANDIDATES, true);
        let time = find("time", overrides.time.as_ref(), TIME_CANDIDATES, false);
        let offence = find("offence", overrides.offence.as_ref(), OFFENCE_CANDIDATES, false);
        let id = find("id", overrides.id.as_ref(), ID_CANDIDATES, false);

        match (latitude, longitude, date) {
            (Some(latitude), Some(longitude), Some(date)) if missing.is_empty() => Ok(Self {
                latitude,
                longitude,
                date,
                time,
                offence,
                id,
                names,
            }),
            _ => Err(IngestError::MissingColumns {
                missing: missing.join(", "),
                seen: headers.join(", "),
            }),
        }
    }
}

/// First candidate in `pool` present in `lowered`, by pool order.
fn pick(lowered: &[String], pool: &[&str]) -> Option<usize> {
    pool.iter()
        .find_map(|candidate| lowered.iter().position(|h| h == candidate))
}
