//! Writes run outputs to disk.

use std::io::{BufWriter, Write as _};
use std::path::Path;

use crime_risk_knox_models::NearRepeatSummary;
use geojson::FeatureCollection;

/// Writes `value` as JSON to `path`, creating parent directories.
fn write_json<T: serde::Serialize>(
    path: &Path,
    value: &T,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Writes the feature collection.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created or written.
pub fn write_geojson(
    path: &Path,
    collection: &FeatureCollection,
) -> Result<(), Box<dyn std::error::Error>> {
    write_json(path, collection, false)?;
    log::info!(
        "Wrote {} ({} cells)",
        path.display(),
        collection.features.len()
    );
    Ok(())
}

/// Writes the run summary as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created or written.
pub fn write_summary(
    path: &Path,
    summary: &NearRepeatSummary,
) -> Result<(), Box<dyn std::error::Error>> {
    write_json(path, summary, true)?;
    log::info!("Wrote summary to {}", path.display());
    Ok(())
}
