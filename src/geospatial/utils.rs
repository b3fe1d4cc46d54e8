// src/geospatial/utils.rs
//
// Utility functions for geospatial calculations

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers (Haversine).
/// Inputs are degrees and must be finite.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::round_km;

    #[test]
    fn same_point_is_zero() {
        let d = haversine_km(51.5074, -0.1278, 51.5074, -0.1278);
        assert_eq!(round_km(d), 0.0);
    }

    #[test]
    fn antipodal_points_are_half_circumference() {
        let d = haversine_km(0.0, 0.0, 0.0, 180.0);
        assert_eq!(round_km(d), 20015.087);
    }

    #[test]
    fn london_to_paris() {
        let d = haversine_km(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((343.0..=344.0).contains(&d), "got {}", d);
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let d = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.195).abs() < 0.001, "got {}", d);
    }

    #[test]
    fn distance_is_symmetric() {
        let ab = haversine_km(40.7128, -74.0060, 34.0522, -118.2437);
        let ba = haversine_km(34.0522, -118.2437, 40.7128, -74.0060);
        assert!((ab - ba).abs() < 1e-9);
    }
}
