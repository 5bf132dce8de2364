//! Geometry kernel shared by every fleet system.
//!
//! Coordinates are expressed in decimal degrees. Trigonometry runs in radians
//! on a sphere whose radius matches the WGS84 equatorial radius, which keeps
//! the per-tick displacements (tens of metres) numerically stable.

use std::time::Duration;

use crate::LatLng;

/// Radius of the reference sphere measured in metres.
pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

const SECONDS_PER_HOUR: f64 = 3_600.0;
const METERS_PER_KILOMETER: f64 = 1_000.0;

/// Reports whether `point` lies inside the closed ring described by `vertices`.
///
/// Uses the ray-casting parity rule with longitude as `x` and latitude as `y`.
/// The ring is implicitly closed; the last vertex connects back to the first.
/// Points lying exactly on an edge fall on either side of the test, and rings
/// with fewer than three vertices never contain anything.
#[must_use]
pub fn point_in_polygon(point: LatLng, vertices: &[LatLng]) -> bool {
    let Some(last) = vertices.last() else {
        return false;
    };

    let x = point.longitude();
    let y = point.latitude();
    let mut inside = false;
    let mut previous = *last;

    for current in vertices {
        let (xi, yi) = (current.longitude(), current.latitude());
        let (xj, yj) = (previous.longitude(), previous.latitude());

        let straddles = (yi > y) != (yj > y);
        if straddles && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }

        previous = *current;
    }

    inside
}

/// Projects the point reached after travelling `distance_meters` from `origin`
/// along the initial bearing `bearing_degrees` (clockwise from north).
#[must_use]
pub fn destination_point(origin: LatLng, distance_meters: f64, bearing_degrees: f64) -> LatLng {
    let angular = distance_meters / EARTH_RADIUS_METERS;
    let theta = bearing_degrees.to_radians();
    let phi1 = origin.latitude().to_radians();
    let lambda1 = origin.longitude().to_radians();

    let phi2 = (phi1.sin() * angular.cos() + phi1.cos() * angular.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * angular.sin() * phi1.cos()).atan2(angular.cos() - phi1.sin() * phi2.sin());

    LatLng::new(phi2.to_degrees(), lambda2.to_degrees())
}

/// Great-circle distance between two points using the haversine formula.
#[must_use]
pub fn distance_meters(from: LatLng, to: LatLng) -> f64 {
    let phi1 = from.latitude().to_radians();
    let phi2 = to.latitude().to_radians();
    let delta_phi = phi2 - phi1;
    let delta_lambda = (to.longitude() - from.longitude()).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Initial bearing in degrees within `[0, 360)` for the great circle from `from` to `to`.
#[must_use]
pub fn initial_bearing(from: LatLng, to: LatLng) -> f64 {
    let phi1 = from.latitude().to_radians();
    let phi2 = to.latitude().to_radians();
    let delta_lambda = (to.longitude() - from.longitude()).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Distance covered in `interval` at `speed_kmh`, rounded to the nearest metre.
#[must_use]
pub fn displacement_meters(speed_kmh: u32, interval: Duration) -> u32 {
    let raw = f64::from(speed_kmh) * (interval.as_secs_f64() / SECONDS_PER_HOUR) * METERS_PER_KILOMETER;
    raw.round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn square() -> Vec<LatLng> {
        vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 1.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(1.0, 0.0),
        ]
    }

    fn concave() -> Vec<LatLng> {
        vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 4.0),
            LatLng::new(4.0, 4.0),
            LatLng::new(4.0, 3.0),
            LatLng::new(1.0, 3.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(4.0, 1.0),
            LatLng::new(4.0, 0.0),
        ]
    }

    #[test]
    fn square_contains_its_centre() {
        assert!(point_in_polygon(LatLng::new(0.5, 0.5), &square()));
    }

    #[test]
    fn square_excludes_outside_points() {
        assert!(!point_in_polygon(LatLng::new(1.5, 0.5), &square()));
        assert!(!point_in_polygon(LatLng::new(0.5, -0.1), &square()));
    }

    #[test]
    fn concave_notch_is_outside() {
        let ring = concave();
        assert!(point_in_polygon(LatLng::new(0.5, 2.0), &ring));
        assert!(!point_in_polygon(LatLng::new(2.5, 2.0), &ring));
        assert!(point_in_polygon(LatLng::new(2.5, 3.5), &ring));
    }

    #[test]
    fn degenerate_rings_contain_nothing() {
        assert!(!point_in_polygon(LatLng::new(0.0, 0.0), &[]));
        let line = [
            LatLng::new(0.0, 0.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(2.0, 2.0),
        ];
        assert!(!point_in_polygon(LatLng::new(1.0, 1.0), &line));
        assert!(!point_in_polygon(LatLng::new(0.5, 0.6), &line));
    }

    #[test]
    fn zero_distance_returns_origin() {
        let origin = LatLng::new(40.7580, -73.9855);
        let projected = destination_point(origin, 0.0, 135.0);
        assert!((projected.latitude() - origin.latitude()).abs() < 1e-12);
        assert!((projected.longitude() - origin.longitude()).abs() < 1e-12);
    }

    #[test]
    fn northward_projection_only_changes_latitude() {
        let origin = LatLng::new(40.7580, -73.9855);
        let projected = destination_point(origin, 33.0, 0.0);
        let expected_delta = (33.0 / EARTH_RADIUS_METERS).to_degrees();
        assert!((projected.latitude() - origin.latitude() - expected_delta).abs() < 1e-12);
        assert!((projected.longitude() - origin.longitude()).abs() < 1e-12);
    }

    #[test]
    fn eastward_projection_increases_longitude() {
        let origin = LatLng::new(40.7580, -73.9855);
        let projected = destination_point(origin, 25.0, 90.0);
        assert!(projected.longitude() > origin.longitude());
        assert!((projected.latitude() - origin.latitude()).abs() < 1e-8);
    }

    #[test]
    fn displacement_matches_tick_arithmetic() {
        let tick = Duration::from_secs(5);
        assert_eq!(displacement_meters(10, tick), 14);
        assert_eq!(displacement_meters(18, tick), 25);
        assert_eq!(displacement_meters(24, tick), 33);
        assert_eq!(displacement_meters(1, tick), 1);
        assert_eq!(displacement_meters(0, tick), 0);
    }

    proptest! {
        #[test]
        fn containment_is_invariant_under_rotation_and_reversal(
            lat in -0.5f64..4.5,
            lng in -0.5f64..4.5,
            shift in 0usize..8,
        ) {
            let ring = concave();
            let point = LatLng::new(lat, lng);
            let expected = point_in_polygon(point, &ring);

            let mut rotated = ring.clone();
            rotated.rotate_left(shift % ring.len());
            prop_assert_eq!(point_in_polygon(point, &rotated), expected);

            let mut reversed = ring.clone();
            reversed.reverse();
            prop_assert_eq!(point_in_polygon(point, &reversed), expected);
        }

        #[test]
        fn projection_preserves_distance_and_bearing(
            lat in 40.70f64..40.78,
            lng in -74.02f64..-73.95,
            distance in 0.5f64..50.0,
            octant in 0u32..8,
        ) {
            let origin = LatLng::new(lat, lng);
            let bearing = f64::from(octant) * 45.0;
            let projected = destination_point(origin, distance, bearing);

            prop_assert!((distance_meters(origin, projected) - distance).abs() < 1e-3);
            let measured = initial_bearing(origin, projected);
            let delta = (measured - bearing + 540.0) % 360.0 - 180.0;
            prop_assert!(delta.abs() < 1e-3);
        }
    }
}
