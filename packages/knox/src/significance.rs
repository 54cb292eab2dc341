//! Knox significance from an observed count and its null distribution.

use crime_risk_knox_models::{DegenerateReason, KnoxResult, NullDistribution, ZScore};

/// Summarizes one Knox test.
///
/// The p-value is `(1 + #{sample >= observed}) / (1 + R)`, which is never
/// zero and equals 1 when every sample reaches the observed count. With
/// fewer than two incidents the result is degenerate with `p = 1`. A null
/// with zero spread leaves the z-score undefined.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize(observed: u64, null: &NullDistribution, incident_count: usize) -> KnoxResult {
    if incident_count < 2 {
        return KnoxResult {
            incident_count,
            observed_count: 0,
            null_mean: 0.0,
            null_std: 0.0,
            z_score: ZScore::Undefined,
            p_value: 1.0,
            permutations: null.len(),
            seed: null.seed,
            degenerate: Some(DegenerateReason::TooFewIncidents),
        };
    }

    let null_mean = null.mean();
    let null_std = null.population_std();
    let (z_score, degenerate) = if null_std > 0.0 {
        (ZScore::Value((observed as f64 - null_mean) / null_std), None)
    } else {
        (ZScore::Undefined, Some(DegenerateReason::ZeroVariance))
    };

    let at_least = null.count_at_least(observed);
    let p_value = (1 + at_least) as f64 / (1 + null.len()) as f64;

    KnoxResult {
        incident_count,
        observed_count: observed,
        null_mean,
        null_std,
        z_score,
        p_value,
        permutations: null.len(),
        seed: null.seed,
        degenerate,
    }
}
