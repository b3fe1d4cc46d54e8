// src/store/mod.rs

// Remote tabular store holding `cities` and `city_distances`

mod memory;
mod postgrest;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

use async_trait::async_trait;

use crate::models::{CityRow, DistancePairRow, DistanceRecord};

/// Error type for store requests
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Uniqueness conflict: {message}")]
    Conflict { message: String },

    #[error("Failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

#[async_trait]
pub trait DistanceStore: Send + Sync {
    /// Rows of `cities` whose coordinates are both non-null.
    async fn fetch_cities(&self) -> Result<Vec<CityRow>, StoreError>;

    /// Endpoint ids of existing `city_distances` rows, capped at `limit`.
    async fn fetch_existing_pairs(&self, limit: usize) -> Result<Vec<DistancePairRow>, StoreError>;

    /// Bulk insert. Returns how many rows the store confirms were created.
    async fn insert_distances(&self, records: &[DistanceRecord]) -> Result<usize, StoreError>;
}
