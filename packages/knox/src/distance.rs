//! Great-circle distance between incident positions.
//!
//! All pair strategies make the final inclusion decision with
//! [`Position::distance_m`], so they agree exactly at the threshold.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A point on the sphere, stored in radians with its latitude cosine
/// precomputed for the haversine formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Latitude in radians.
    pub lat: f64,
    /// Longitude in radians.
    pub lng: f64,
    cos_lat: f64,
}

impl Position {
    /// Builds a position from degrees.
    #[must_use]
    pub fn from_degrees(lat: f64, lng: f64) -> Self {
        let lat = lat.to_radians();
        Self {
            lat,
            lng: lng.to_radians(),
            cos_lat: lat.cos(),
        }
    }

    /// Haversine distance in meters.
    #[must_use]
    pub fn distance_m(&self, other: &Self) -> f64 {
        let half_dlat = (other.lat - self.lat) / 2.0;
        let half_dlng = (other.lng - self.lng) / 2.0;
        let a = half_dlat.sin().powi(2)
            + self.cos_lat * other.cos_lat * half_dlng.sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }

    /// Position on a sphere of radius [`EARTH_RADIUS_M`], in meters.
    #[must_use]
    pub fn to_cartesian(&self) -> [f64; 3] {
        [
            EARTH_RADIUS_M * self.cos_lat * self.lng.cos(),
            EARTH_RADIUS_M * self.cos_lat * self.lng.sin(),
            EARTH_RADIUS_M * self.lat.sin(),
        ]
    }
}

/// Straight-line chord length between two points `distance_m` apart along
/// the great circle.
#[must_use]
pub fn chord_for_arc(distance_m: f64) -> f64 {
    let angle = (distance_m / EARTH_RADIUS_M).min(std::f64::consts::PI);
    2.0 * EARTH_RADIUS_M * (angle / 2.0).sin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_degree_of_equator() {
        let a = Position::from_degrees(0.0, 0.0);
        let b = Position::from_degrees(0.0, 1.0);
        let expected = EARTH_RADIUS_M * 1.0_f64.to_radians();
        assert!((a.distance_m(&b) - expected).abs() < 1e-6);
    }

    #[test]
    fn quarter_meridian() {
        let equator = Position::from_degrees(0.0, 30.0);
        let pole = Position::from_degrees(90.0, 30.0);
        let expected = EARTH_RADIUS_M * std::f64::consts::FRAC_PI_2;
        assert!((equator.distance_m(&pole) - expected).abs() < 1e-6);
    }

    #[test]
    fn one_degree_of_longitude_at_sixty_north() {
        // Shorter than half the equatorial degree: the great circle bows
        // poleward of the parallel.
        let a = Position::from_degrees(60.0, 10.0);
        let b = Position::from_degrees(60.0, 11.0);
        let d = a.distance_m(&b);
        assert!((d - 55_596.934).abs() < 0.01, "got {d}");
    }

    #[test]
    fn is_symmetric_and_zero_on_self() {
        let a = Position::from_degrees(43.6532, -79.3832);
        let b = Position::from_degrees(43.6555, -79.3790);
        assert!((a.distance_m(&b) - b.distance_m(&a)).abs() < 1e-9);
        assert!(a.distance_m(&a).abs() < f64::EPSILON);
    }

    #[test]
    fn chord_is_shorter_than_arc_and_matches_cartesian() {
        let a = Position::from_degrees(43.6532, -79.3832);
        let b = Position::from_degrees(43.6630, -79.3950);
        let arc = a.distance_m(&b);
        let [ax, ay, az] = a.to_cartesian();
        let [bx, by, bz] = b.to_cartesian();
        let chord = ((ax - bx).powi(2) + (ay - by).powi(2) + (az - bz).powi(2)).sqrt();
        assert!(chord <= arc);
        assert!((chord_for_arc(arc) - chord).abs() < 1e-4);
    }
}
