// src/lib.rs
pub mod config;
pub mod geospatial;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod results;
pub mod store;
pub mod writer;

// Re-export common types for easier access
pub use models::{CityId, DistanceRecord, GeoPoint, PairKey};

// Re-export important functionality
pub use config::PipelineConfig;
pub use results::{BatchOutcome, RunSummary};
pub use store::{DistanceStore, MemoryStore, PostgrestStore, StoreError};
