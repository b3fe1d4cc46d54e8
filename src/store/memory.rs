// src/store/memory.rs

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;

use super::{DistanceStore, StoreError};
use crate::models::{CityId, CityRow, DistancePairRow, DistanceRecord, PairKey};

#[derive(Default)]
struct MemoryState {
    cities: Vec<CityRow>,
    distances: Vec<DistanceRecord>,
    keys: HashSet<PairKey>,
    insert_calls: usize,
    batch_sizes: Vec<usize>,
    failing_inserts: HashSet<usize>,
    fail_loads: bool,
}

/// In-process store with the same uniqueness rule as `city_distances`.
///
/// Rows colliding with an existing pair are skipped. When every row in a
/// batch collides the insert fails with [`StoreError::Conflict`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new(cities: Vec<CityRow>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                cities,
                ..Default::default()
            }),
        }
    }

    /// Convenience constructor from `(id, lat, lon)` triples.
    pub fn with_points(points: &[(&str, f64, f64)]) -> Self {
        let rows = points
            .iter()
            .map(|(id, lat, lon)| CityRow {
                id: Some((*id).into()),
                city_name: None,
                lat: Some((*lat).into()),
                lon: Some((*lon).into()),
            })
            .collect();
        Self::new(rows)
    }

    /// Seeds an existing distance row, bypassing the insert counters.
    pub async fn seed_distance(&self, record: DistanceRecord) {
        let mut state = self.state.lock().await;
        if state.keys.insert(record.pair_key()) {
            state.distances.push(record);
        }
    }

    /// Makes the insert call with the given 1-based index fail with a 500.
    pub async fn fail_insert(&self, call: usize) {
        self.state.lock().await.failing_inserts.insert(call);
    }

    /// Makes both load requests fail with a 503.
    pub async fn fail_loads(&self) {
        self.state.lock().await.fail_loads = true;
    }

    pub async fn distances(&self) -> Vec<DistanceRecord> {
        self.state.lock().await.distances.clone()
    }

    pub async fn insert_calls(&self) -> usize {
        self.state.lock().await.insert_calls
    }

    /// Size of every insert request received, in order.
    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().await.batch_sizes.clone()
    }

    pub async fn contains(&self, a: &str, b: &str) -> bool {
        let key = PairKey::new(&CityId::from(a), &CityId::from(b));
        self.state.lock().await.keys.contains(&key)
    }
}

fn unavailable() -> StoreError {
    StoreError::Status {
        status: 503,
        message: "service unavailable".to_string(),
    }
}

#[async_trait]
impl DistanceStore for MemoryStore {
    async fn fetch_cities(&self) -> Result<Vec<CityRow>, StoreError> {
        let state = self.state.lock().await;
        if state.fail_loads {
            return Err(unavailable());
        }
        Ok(state
            .cities
            .iter()
            .filter(|row| {
                row.lat.as_ref().is_some_and(|v| !v.is_null())
                    && row.lon.as_ref().is_some_and(|v| !v.is_null())
            })
            .cloned()
            .collect())
    }

    async fn fetch_existing_pairs(&self, limit: usize) -> Result<Vec<DistancePairRow>, StoreError> {
        let state = self.state.lock().await;
        if state.fail_loads {
            return Err(unavailable());
        }
        Ok(state
            .distances
            .iter()
            .take(limit)
            .map(|r| DistancePairRow {
                city_a_id: Some(r.city_a_id.0.clone().into()),
                city_b_id: Some(r.city_b_id.0.clone().into()),
            })
            .collect())
    }

    async fn insert_distances(&self, records: &[DistanceRecord]) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        state.insert_calls += 1;
        state.batch_sizes.push(records.len());

        let call = state.insert_calls;
        if state.failing_inserts.contains(&call) {
            return Err(StoreError::Status {
                status: 500,
                message: format!("insert {} rejected", call),
            });
        }

        let mut created = 0;
        for record in records {
            if state.keys.insert(record.pair_key()) {
                state.distances.push(record.clone());
                created += 1;
            }
        }

        if created == 0 && !records.is_empty() {
            return Err(StoreError::Conflict {
                message: "duplicate key value violates unique constraint".to_string(),
            });
        }
        Ok(created)
    }
}
