//! Great-circle distance between node positions.

use mesh_events::GeoPoint;

/// Mean Earth radius in metres
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in metres.
pub fn great_circle_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = GeoPoint::new(41.486, -71.526);
        assert_eq!(great_circle_distance(p, p), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let a = GeoPoint::new(41.480, -71.537);
        let b = GeoPoint::new(41.492, -71.516);
        let ab = great_circle_distance(a, b);
        let ba = great_circle_distance(b, a);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = great_circle_distance(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 10.0, "got {}", d);
    }

    #[test]
    fn test_campus_diagonal_is_about_two_kilometres() {
        let d = great_circle_distance(
            GeoPoint::new(41.480, -71.537),
            GeoPoint::new(41.492, -71.516),
        );
        assert!(d > 1_800.0 && d < 2_500.0, "got {}", d);
    }
}
