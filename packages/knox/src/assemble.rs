//! `GeoJSON` assembly of the coverage surface.

use crime_risk_hex::HexResolver;
use crime_risk_knox_models::{HexCoverageCell, NearRepeatProperties, NearRepeatSummary};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, feature::Id};

use crate::KnoxError;

/// Foreign member of the collection carrying the run summary.
pub const SUMMARY_MEMBER: &str = "knox";

/// Builds one polygon feature per covered cell.
///
/// Features are ordered by coverage, highest first, then by cell id. Every
/// feature carries the run-global significance in its properties, and the
/// collection carries `summary` under [`SUMMARY_MEMBER`].
///
/// # Errors
///
/// Returns [`KnoxError::Hex`] if a cell boundary cannot be resolved, or
/// [`KnoxError::Json`] if the properties fail to serialize.
pub fn assemble(
    cells: &[HexCoverageCell],
    summary: &NearRepeatSummary,
    window_days: u32,
    resolver: &dyn HexResolver,
) -> Result<FeatureCollection, KnoxError> {
    let mut ordered = cells.to_vec();
    ordered.sort_by(|a, b| b.coverage.cmp(&a.coverage).then(a.cell.cmp(&b.cell)));

    let features = ordered
        .iter()
        .map(|cell| -> Result<Feature, KnoxError> {
            let polygon = resolver.boundary(cell.cell)?;
            let properties =
                NearRepeatProperties::new(cell, &summary.result, summary.k, window_days);
            Ok(Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&polygon))),
                id: Some(Id::String(properties.h3.clone())),
                properties: Some(to_object(&properties)?),
                foreign_members: None,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut foreign_members = JsonObject::new();
    foreign_members.insert(SUMMARY_MEMBER.to_string(), serde_json::to_value(summary)?);

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    })
}

fn to_object(properties: &NearRepeatProperties) -> Result<JsonObject, serde_json::Error> {
    match serde_json::to_value(properties)? {
        serde_json::Value::Object(map) => Ok(map),
        other => {
            let mut map = JsonObject::new();
            map.insert("value".to_string(), other);
            Ok(map)
        }
    }
}
