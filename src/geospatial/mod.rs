// src/geospatial/mod.rs

// Distance math: the cheap bounding-box pre-filter and the exact Haversine check

mod bounding_box;
mod utils;

pub use bounding_box::BoundingBoxFilter;
pub use utils::haversine_km;
