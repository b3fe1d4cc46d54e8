// src/loader.rs

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::HashSet;

use crate::models::{GeoPoint, PairKey};
use crate::store::DistanceStore;

/// Cities with usable coordinates plus how many rows were dropped.
#[derive(Debug, Default)]
pub struct LoadedPoints {
    pub points: Vec<GeoPoint>,
    pub skipped: usize,
}

/// Fetches every city with both coordinates and validates the rows once.
/// Malformed rows are skipped, never fatal. A failed request is.
pub async fn load_points(store: &dyn DistanceStore) -> Result<LoadedPoints> {
    let rows = store
        .fetch_cities()
        .await
        .context("Failed to fetch cities")?;

    let total = rows.len();
    let points: Vec<GeoPoint> = rows.into_iter().filter_map(GeoPoint::from_row).collect();
    let skipped = total - points.len();
    if skipped > 0 {
        debug!("Skipped {} city rows with unusable id or coordinates", skipped);
    }

    info!("Loaded {} cities with coordinates", points.len());
    Ok(LoadedPoints { points, skipped })
}

/// Snapshot of the canonical pairs already present in `city_distances`.
///
/// The request is capped at `limit` rows and not paginated. Pairs beyond
/// the cap are re-proposed and come back as conflicts on insert.
pub async fn load_existing_pairs(store: &dyn DistanceStore, limit: usize) -> Result<HashSet<PairKey>> {
    let rows = store
        .fetch_existing_pairs(limit)
        .await
        .context("Failed to fetch existing distances")?;

    if limit > 0 && rows.len() >= limit {
        warn!(
            "Existing pairs request returned {} rows, the configured cap; the snapshot may be incomplete",
            rows.len()
        );
    }

    let pairs: HashSet<PairKey> = rows.iter().filter_map(|row| row.pair_key()).collect();
    info!("Loaded {} existing pairs", pairs.len());
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CityRow, DistanceRecord};
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn skips_malformed_rows() {
        let rows: Vec<CityRow> = serde_json::from_value(json!([
            {"id": "a", "city_name": "Berlin", "lat": 52.52, "lon": 13.405},
            {"id": "b", "lat": "not a number", "lon": 1.0},
            {"id": "c", "lat": 48.1351, "lon": "11.582"},
            {"lat": 1.0, "lon": 1.0}
        ]))
        .unwrap();
        let store = MemoryStore::new(rows);

        let loaded = load_points(&store).await.unwrap();
        let ids: Vec<&str> = loaded.points.iter().map(|p| p.id.0.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(loaded.skipped, 2);
    }

    #[tokio::test]
    async fn existing_pairs_are_canonical() {
        let store = MemoryStore::default();
        store
            .seed_distance(DistanceRecord::generated(&"b".into(), &"a".into(), 10.0))
            .await;

        let pairs = load_existing_pairs(&store, 100).await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert!(pairs.contains(&PairKey::new(&"a".into(), &"b".into())));
        assert!(pairs.contains(&PairKey::new(&"b".into(), &"a".into())));
    }

    #[tokio::test]
    async fn failed_requests_are_fatal() {
        let store = MemoryStore::with_points(&[("a", 0.0, 0.0)]);
        store.fail_loads().await;

        let err = load_points(&store).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to fetch cities"));
        assert!(format!("{:#}", err).contains("503"));

        let err = load_existing_pairs(&store, 10).await.unwrap_err();
        assert!(err.to_string().contains("Failed to fetch existing distances"));
    }
}
