//! Deterministic synthetic fixtures for the engine's tests.

use chrono::{DateTime, TimeDelta, TimeZone as _, Utc};
use crime_risk_incident_models::Incident;
use rand::{Rng as _, SeedableRng as _};
use rand_chacha::ChaCha8Rng;

use crate::distance::Position;

pub const TORONTO: (f64, f64) = (43.6532, -79.3832);
pub const DAY_MS: i64 = 86_400_000;
const EPOCH_MS: i64 = 1_704_067_200_000;

pub fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn uniform_point(rng: &mut ChaCha8Rng) -> (Position, i64) {
    let lat = TORONTO.0 + rng.gen_range(-0.05..0.05);
    let lng = TORONTO.1 + rng.gen_range(-0.07..0.07);
    let t = EPOCH_MS + rng.gen_range(0..90 * DAY_MS);
    (Position::from_degrees(lat, lng), t)
}

/// `n` incidents spread over ~11 km and 90 days.
pub fn uniform_fixture(seed: u64, n: usize) -> (Vec<Position>, Vec<i64>) {
    let mut rng = rng(seed);
    (0..n).map(|_| uniform_point(&mut rng)).unzip()
}

/// `n` incidents, half of them jittered around ten space-time hot spots.
pub fn clustered_fixture(seed: u64, n: usize) -> (Vec<Position>, Vec<i64>) {
    let mut rng = rng(seed);
    let centers: Vec<(f64, f64, i64)> = (0..10)
        .map(|_| {
            (
                TORONTO.0 + rng.gen_range(-0.04..0.04),
                TORONTO.1 + rng.gen_range(-0.06..0.06),
                EPOCH_MS + rng.gen_range(0..80 * DAY_MS),
            )
        })
        .collect();

    (0..n)
        .map(|i| {
            if i % 2 == 1 {
                return uniform_point(&mut rng);
            }
            let (lat, lng, t) = centers[(i / 2) % centers.len()];
            (
                Position::from_degrees(
                    lat + rng.gen_range(-0.001..0.001),
                    lng + rng.gen_range(-0.0013..0.0013),
                ),
                t + rng.gen_range(0..4 * DAY_MS),
            )
        })
        .unzip()
}

/// An incident `day` days after 2024-01-01.
pub fn incident_at(id: &str, lat: f64, lng: f64, day: i64, category: &str) -> Incident {
    Incident::new(
        id,
        lat,
        lng,
        base() + TimeDelta::days(day),
        Some(category.to_string()),
    )
    .unwrap()
}

/// 50 incidents over 85 days: 35 scattered across the city plus three
/// tight clusters of five (each within 100 m and 5 days).
///
/// Cluster members are "Break and Enter"; the background alternates
/// "Assault" and "Auto Theft".
pub fn synthetic_incidents(seed: u64) -> Vec<Incident> {
    let mut rng = rng(seed);
    let mut incidents = Vec::with_capacity(50);

    for c in 0..3_i32 {
        let lat = TORONTO.0 + 0.03 * f64::from(c - 1);
        let lng = TORONTO.1 + 0.02 * f64::from(c);
        let start = base() + TimeDelta::days(10 + 25 * i64::from(c));
        for m in 0..5 {
            let at = start + TimeDelta::hours(rng.gen_range(0..5 * 24));
            incidents.push(
                Incident::new(
                    format!("cluster-{c}-{m}"),
                    lat + rng.gen_range(-0.0003..0.0003),
                    lng + rng.gen_range(-0.0004..0.0004),
                    at,
                    Some("Break and Enter".to_string()),
                )
                .unwrap(),
            );
        }
    }

    for b in 0..35 {
        let category = if b % 2 == 0 { "Assault" } else { "Auto Theft" };
        incidents.push(
            Incident::new(
                format!("background-{b}"),
                TORONTO.0 + rng.gen_range(-0.08..0.08),
                TORONTO.1 + rng.gen_range(-0.1..0.1),
                base() + TimeDelta::hours(rng.gen_range(0..85 * 24)),
                Some(category.to_string()),
            )
            .unwrap(),
        );
    }

    incidents
}
