// src/geospatial/bounding_box.rs
//
// Cheap pre-filter run before the Haversine check. It may admit pairs that
// turn out to be too far apart but never rejects a pair within range.

use super::utils::EARTH_RADIUS_KM;
use crate::models::GeoPoint;

/// Flat-earth kilometers per degree of latitude. Slightly under the true
/// 111.195 so the latitude bound is never too tight.
const KM_PER_DEGREE: f64 = 111.0;

/// Floor for |cos(latitude)| near the poles
const MIN_COS_LATITUDE: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct BoundingBoxFilter {
    max_distance_km: f64,
    max_lat_diff_deg: f64,
    // Angular radius of the search cap and its sine, for the fallback test
    cap_radius_deg: f64,
    sin_cap_radius: f64,
}

impl BoundingBoxFilter {
    pub fn new(max_distance_km: f64) -> Self {
        let cap_radius_rad = max_distance_km / EARTH_RADIUS_KM;
        Self {
            max_distance_km,
            max_lat_diff_deg: max_distance_km / KM_PER_DEGREE,
            cap_radius_deg: cap_radius_rad.to_degrees(),
            sin_cap_radius: cap_radius_rad.min(std::f64::consts::FRAC_PI_2).sin(),
        }
    }

    pub fn max_distance_km(&self) -> f64 {
        self.max_distance_km
    }

    pub fn max_lat_diff_deg(&self) -> f64 {
        self.max_lat_diff_deg
    }

    /// Longitude tolerance at a latitude using the 111 km/degree approximation.
    pub fn max_lon_diff_deg(&self, at_latitude_deg: f64) -> f64 {
        let cos = at_latitude_deg.to_radians().cos().abs().max(MIN_COS_LATITUDE);
        self.max_distance_km / (KM_PER_DEGREE * cos)
    }

    /// Returns `true` if the pair may be within range and needs the exact check.
    pub fn admits(&self, a: &GeoPoint, b: &GeoPoint) -> bool {
        if (a.lat - b.lat).abs() > self.max_lat_diff_deg {
            return false;
        }

        let lon_diff = wrapped_lon_diff(a.lon, b.lon);
        let avg_lat = (a.lat + b.lat) / 2.0;
        if lon_diff <= self.max_lon_diff_deg(avg_lat) {
            return true;
        }

        // The flat bound at the mean latitude ignores the poleward bow of the
        // great circle, so a pair it rejects is only dropped once it is also
        // outside the longitude extent of the spherical cap around `a`.
        lon_diff <= self.cap_lon_extent_deg(a.lat)
    }

    /// Widest longitude offset of any point within the cap centered at
    /// `center_lat_deg`. 180 when the cap contains a pole.
    fn cap_lon_extent_deg(&self, center_lat_deg: f64) -> f64 {
        if center_lat_deg.abs() + self.cap_radius_deg >= 90.0 {
            return 180.0;
        }
        let cos = center_lat_deg.to_radians().cos().max(MIN_COS_LATITUDE);
        let ratio = self.sin_cap_radius / cos;
        if ratio >= 1.0 {
            180.0
        } else {
            ratio.asin().to_degrees()
        }
    }
}

/// Absolute longitude difference folded into [0, 180].
fn wrapped_lon_diff(lon1: f64, lon2: f64) -> f64 {
    let diff = (lon1 - lon2).rem_euclid(360.0);
    if diff > 180.0 { 360.0 - diff } else { diff }
}
