// src/models.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Tag written on every generated row so curated distances can be told apart.
pub const GENERATED_SOURCE: &str = "generated";

//------------------------------------------------------------------------------
// IDENTIFIER TYPES
//------------------------------------------------------------------------------

/// Strongly typed identifier for city records
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityId(pub String);

impl fmt::Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CityId {
    fn from(s: &str) -> Self {
        CityId(s.to_string())
    }
}

/// Orders two ids lexicographically, returning `(lo, hi)`.
pub fn canonical_order<'a>(a: &'a CityId, b: &'a CityId) -> (&'a CityId, &'a CityId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Unordered pair of city ids. `PairKey::new(a, b) == PairKey::new(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    lo: CityId,
    hi: CityId,
}

impl PairKey {
    pub fn new(a: &CityId, b: &CityId) -> Self {
        let (lo, hi) = canonical_order(a, b);
        Self {
            lo: lo.clone(),
            hi: hi.clone(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.lo, self.hi)
    }
}

//------------------------------------------------------------------------------
// CORE DOMAIN MODELS
//------------------------------------------------------------------------------

/// A city with usable coordinates. Only built through [`GeoPoint::from_row`]
/// or [`GeoPoint::new`], so `lat`/`lon` are always finite.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint {
    pub id: CityId,
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Returns `None` when either coordinate is not finite.
    pub fn new(id: impl Into<String>, lat: f64, lon: f64) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        Some(Self {
            id: CityId(id.into()),
            name: None,
            lat,
            lon,
        })
    }

    /// Validates a raw `cities` row. Rows without an id or with a missing,
    /// non-numeric or non-finite coordinate yield `None`.
    pub fn from_row(row: CityRow) -> Option<Self> {
        let id = row.id.and_then(|v| json_id(&v))?;
        let lat = row.lat.as_ref().and_then(coerce_f64)?;
        let lon = row.lon.as_ref().and_then(coerce_f64)?;
        let mut point = GeoPoint::new(id, lat, lon)?;
        point.name = row.city_name;
        Some(point)
    }

    /// Name for log lines, falling back to the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id.0)
    }
}

/// A row destined for the `city_distances` collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceRecord {
    pub city_a_id: CityId,
    pub city_b_id: CityId,
    pub distance_km: f64,
    pub source: String,
}

impl DistanceRecord {
    /// Builds a generated record with endpoints in canonical order and the
    /// distance rounded to three decimals.
    pub fn generated(a: &CityId, b: &CityId, distance_km: f64) -> Self {
        let (lo, hi) = canonical_order(a, b);
        Self {
            city_a_id: lo.clone(),
            city_b_id: hi.clone(),
            distance_km: round_km(distance_km),
            source: GENERATED_SOURCE.to_string(),
        }
    }

    pub fn pair_key(&self) -> PairKey {
        PairKey::new(&self.city_a_id, &self.city_b_id)
    }
}

/// Rounds to three decimal places, half away from zero.
///
/// Uses `f64::round` on the scaled value rather than decimal string
/// formatting. The two can disagree only for values a hair below a
/// half-thousandth, where this rounds on the binary value.
pub fn round_km(km: f64) -> f64 {
    (km * 1000.0).round() / 1000.0
}

//------------------------------------------------------------------------------
// RAW STORE ROWS
//------------------------------------------------------------------------------

/// Loosely typed `cities` row as returned by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct CityRow {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub city_name: Option<String>,
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lon: Option<Value>,
}

/// Endpoint ids of an existing `city_distances` row.
#[derive(Debug, Clone, Deserialize)]
pub struct DistancePairRow {
    #[serde(default)]
    pub city_a_id: Option<Value>,
    #[serde(default)]
    pub city_b_id: Option<Value>,
}

impl DistancePairRow {
    /// Canonical key for the row, or `None` if an endpoint is null or empty.
    pub fn pair_key(&self) -> Option<PairKey> {
        let a = self.city_a_id.as_ref().and_then(json_id)?;
        let b = self.city_b_id.as_ref().and_then(json_id)?;
        Some(PairKey::new(&CityId(a), &CityId(b)))
    }
}

/// Numbers and numeric strings are accepted; everything else is `None`.
fn coerce_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Ids are compared by their string form; integer ids are stringified.
fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> CityRow {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn pair_key_is_symmetric() {
        let a = CityId::from("b7e1");
        let b = CityId::from("03fa");
        assert_eq!(PairKey::new(&a, &b), PairKey::new(&b, &a));
        assert_eq!(PairKey::new(&a, &b).to_string(), "03fa|b7e1");
    }

    #[test]
    fn generated_record_is_canonical_and_rounded() {
        let a = CityId::from("zagreb");
        let b = CityId::from("amsterdam");
        let ab = DistanceRecord::generated(&a, &b, 343.21958);
        let ba = DistanceRecord::generated(&b, &a, 343.21958);
        assert_eq!(ab, ba);
        assert_eq!(ab.city_a_id, b);
        assert_eq!(ab.distance_km, 343.220);
        assert_eq!(ab.source, "generated");
    }

    #[test]
    fn round_km_matches_three_decimals() {
        assert_eq!(round_km(111.19492664455873), 111.195);
        assert_eq!(round_km(0.0), 0.0);
        assert_eq!(round_km(20015.086796020572), 20015.087);
        assert_eq!(round_km(2.0004), 2.0);
        assert_eq!(round_km(-1.23456), -1.235);
    }

    #[test]
    fn city_row_coerces_numeric_strings() {
        let p = GeoPoint::from_row(row(json!({
            "id": "c1", "city_name": "Lyon", "lat": "45.764", "lon": 4.8357
        })))
        .unwrap();
        assert_eq!(p.lat, 45.764);
        assert_eq!(p.lon, 4.8357);
        assert_eq!(p.label(), "Lyon");
    }

    #[test]
    fn malformed_city_rows_are_rejected() {
        assert!(GeoPoint::from_row(row(json!({"id": "c1", "lat": null, "lon": 1.0}))).is_none());
        assert!(GeoPoint::from_row(row(json!({"id": "c1", "lat": "abc", "lon": 1.0}))).is_none());
        assert!(GeoPoint::from_row(row(json!({"lat": 1.0, "lon": 1.0}))).is_none());
        assert!(GeoPoint::from_row(row(json!({"id": "", "lat": 1.0, "lon": 1.0}))).is_none());
        assert!(GeoPoint::new("c1", f64::NAN, 0.0).is_none());
    }

    #[test]
    fn integer_ids_are_stringified() {
        let p = GeoPoint::from_row(row(json!({"id": 42, "lat": 0, "lon": 0}))).unwrap();
        assert_eq!(p.id, CityId::from("42"));
    }

    #[test]
    fn distance_pair_rows_without_endpoints_are_ignored() {
        let r: DistancePairRow = serde_json::from_value(json!({"city_a_id": "x", "city_b_id": null})).unwrap();
        assert!(r.pair_key().is_none());
        let r: DistancePairRow = serde_json::from_value(json!({"city_a_id": "y", "city_b_id": "x"})).unwrap();
        assert_eq!(r.pair_key().unwrap().to_string(), "x|y");
    }
}
