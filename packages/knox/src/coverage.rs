//! Hex coverage surface of the recent window.

use std::collections::BTreeMap;

use crime_risk_hex::{CellId, HexError, HexResolver};
use crime_risk_incident_models::Incident;
use crime_risk_knox_models::HexCoverageCell;

/// Tallies, for every cell, how many incidents' k-disks contain it.
///
/// Each incident contributes at most once to a cell. Cells come back in
/// ascending id order, and only cells with non-zero coverage appear.
///
/// # Errors
///
/// Returns the first [`HexError`] raised by the resolver.
pub fn aggregate_coverage(
    incidents: &[&Incident],
    resolver: &dyn HexResolver,
    k: u32,
) -> Result<Vec<HexCoverageCell>, HexError> {
    let mut tally: BTreeMap<CellId, u32> = BTreeMap::new();

    for incident in incidents {
        let host = resolver.cell_of(incident.latitude, incident.longitude)?;
        let mut disk = resolver.disk(host, k)?;
        disk.sort_unstable();
        disk.dedup();
        for cell in disk {
            *tally.entry(cell).or_default() += 1;
        }
    }

    log::debug!(
        "Coverage: {} incidents expanded to {} cells (k={k})",
        incidents.len(),
        tally.len()
    );

    Ok(tally
        .into_iter()
        .map(|(cell, coverage)| HexCoverageCell { cell, coverage })
        .collect())
}
