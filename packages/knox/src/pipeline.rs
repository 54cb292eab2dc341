//! One near-repeat run, from incidents to the emitted feature collection.

use std::sync::Arc;

use crime_risk_hex::HexResolver;
use crime_risk_incident_models::{AnchorDate, Incident, filter_by_category};
use crime_risk_knox_models::{
    ConfigError, HexCoverageCell, KnoxConfig, NearRepeatSummary, NullDistribution,
};
use geojson::FeatureCollection;

use crate::KnoxError;
use crate::assemble::assemble;
use crate::counter::{Thresholds, build_counter};
use crate::coverage::aggregate_coverage;
use crate::distance::Position;
use crate::permutation::PermutationEngine;
use crate::progress::ProgressCallback;
use crate::significance::summarize;

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct NearRepeatRun {
    /// Run metadata and the global significance summary.
    pub summary: NearRepeatSummary,
    /// Coverage surface of the recent window, ascending by cell id.
    pub cells: Vec<HexCoverageCell>,
    /// The emitted feature collection.
    pub collection: FeatureCollection,
}

/// Runs the Knox test and builds the recent-window coverage surface.
///
/// The configured offence filter is applied first. The anchor is the latest
/// timestamp of the filtered incidents, and both the lookback and the recent
/// window are cut from that same filtered set. Nothing is computed until the
/// configuration validates.
///
/// # Errors
///
/// * [`KnoxError::Config`] for an invalid configuration, or a resolver at a
///   different resolution than configured
/// * [`KnoxError::Hex`] if the resolver fails
/// * [`KnoxError::IncompleteNull`] if the null distribution comes back short
/// * [`KnoxError::Json`] if the output fails to serialize
pub fn run(
    incidents: &[Incident],
    config: &KnoxConfig,
    resolver: &dyn HexResolver,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<NearRepeatRun, KnoxError> {
    config.validate()?;
    if resolver.resolution() != config.resolution {
        return Err(ConfigError::ResolutionMismatch {
            expected: config.resolution,
            actual: resolver.resolution(),
        }
        .into());
    }

    let filtered = filter_by_category(incidents, config.offence_filter.as_deref());
    if let Some(filter) = &config.offence_filter {
        log::info!(
            "Offence filter '{filter}': {} of {} incidents",
            filtered.len(),
            incidents.len()
        );
    }

    let anchor = AnchorDate::from_incidents(&filtered);
    let lookback = anchor.map(|a| a.window(config.lookback_days));
    let recent = anchor.map(|a| a.window(config.recent_days));
    match anchor {
        Some(anchor) => log::info!("Anchor date: {anchor}"),
        None => log::warn!("No incidents to analyze"),
    }

    let lookback_set = lookback.map_or_else(Vec::new, |w| w.select(&filtered));
    log::info!(
        "Lookback window ({} days): {} incidents",
        config.lookback_days,
        lookback_set.len()
    );

    let positions: Vec<Position> = lookback_set
        .iter()
        .map(|i| Position::from_degrees(i.latitude, i.longitude))
        .collect();
    let times: Vec<i64> = lookback_set.iter().map(|i| i.timestamp_millis()).collect();

    let engine = PermutationEngine::new(config.permutations, config.seed);
    let (observed, null) = if lookback_set.len() < 2 {
        (0, NullDistribution::empty(engine.seed()))
    } else {
        let counter = build_counter(
            config.strategy,
            positions,
            Thresholds::from_config(config),
        );
        let observed = counter.count_pairs(&times);
        log::info!(
            "Observed close pairs (<= {} m, <= {} days): {observed}",
            config.distance_threshold_m,
            config.time_threshold_days
        );
        let null = engine.sample(counter.as_ref(), &times, progress)?;
        (observed, null)
    };

    let result = summarize(observed, &null, lookback_set.len());
    log::info!(
        "Null mean {:.2} \u{b1} {:.2}; p = {:.4}, z = {}",
        result.null_mean,
        result.null_std,
        result.p_value,
        result.z_score
    );
    if let Some(reason) = result.degenerate {
        log::warn!("Degenerate Knox statistic: {reason}");
    }

    let recent_set = recent.map_or_else(Vec::new, |w| w.select(&filtered));
    if recent_set.is_empty() {
        log::warn!("No incidents in the recent window; coverage surface is empty");
    }
    let cells = aggregate_coverage(&recent_set, resolver, config.k)?;
    log::info!(
        "Recent window ({} days): {} incidents -> {} cells (k={})",
        config.recent_days,
        recent_set.len(),
        cells.len(),
        config.k
    );

    let summary = NearRepeatSummary {
        anchor: anchor.map(AnchorDate::at),
        lookback,
        recent,
        recent_incident_count: recent_set.len(),
        cell_count: cells.len(),
        distance_threshold_m: config.distance_threshold_m,
        time_threshold_days: config.time_threshold_days,
        resolution: config.resolution,
        k: config.k,
        offence_filter: config.offence_filter.clone(),
        strategy: config.strategy,
        result,
    };

    let collection = assemble(&cells, &summary, config.recent_days, resolver)?;

    Ok(NearRepeatRun {
        summary,
        cells,
        collection,
    })
}
