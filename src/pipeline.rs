// src/pipeline.rs

// Orchestrates one run: load -> (filter -> distance -> write) over all pairs -> final flush

use anyhow::Result;
use chrono::Utc;
use log::{debug, info};
use std::collections::HashSet;
use std::time::Instant;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::geospatial::{BoundingBoxFilter, haversine_km};
use crate::loader;
use crate::models::{GeoPoint, PairKey};
use crate::results::{PairStats, RunSummary};
use crate::store::DistanceStore;
use crate::writer::BatchWriter;

/// What happened to one candidate pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PairVerdict {
    /// Rejected by the bounding-box filter.
    OutsideBoundingBox,
    /// Passed the filter but a row already exists or was scheduled earlier.
    AlreadyKnown,
    /// Passed the filter, exact distance above the threshold.
    BeyondThreshold(f64),
    /// New pair within range. Unrounded distance in km.
    Within(f64),
}

/// Every unordered pair `(points[i], points[j])` with `i < j`, outer index first.
pub fn unordered_pairs(points: &[GeoPoint]) -> impl Iterator<Item = (&GeoPoint, &GeoPoint)> + '_ {
    (0..points.len())
        .flat_map(move |i| (i + 1..points.len()).map(move |j| (&points[i], &points[j])))
}

/// Runs the per-pair checks. The known-pairs lookup happens before the exact
/// distance so existing pairs never pay for the trigonometry.
pub fn evaluate_pair(
    filter: &BoundingBoxFilter,
    known_pairs: &HashSet<PairKey>,
    a: &GeoPoint,
    b: &GeoPoint,
) -> PairVerdict {
    if !filter.admits(a, b) {
        return PairVerdict::OutsideBoundingBox;
    }
    if known_pairs.contains(&PairKey::new(&a.id, &b.id)) {
        return PairVerdict::AlreadyKnown;
    }
    let distance_km = haversine_km(a.lat, a.lon, b.lat, b.lon);
    if distance_km > filter.max_distance_km() {
        PairVerdict::BeyondThreshold(distance_km)
    } else {
        PairVerdict::Within(distance_km)
    }
}

/// Enumerates every pair of `points`, buffering and flushing new rows
/// through `writer`. Flushes the remainder before returning.
pub async fn compute_distances(
    points: &[GeoPoint],
    filter: &BoundingBoxFilter,
    writer: &mut BatchWriter<'_>,
) -> PairStats {
    let mut stats = PairStats::default();

    for (a, b) in unordered_pairs(points) {
        match evaluate_pair(filter, writer.known_pairs(), a, b) {
            PairVerdict::OutsideBoundingBox => stats.filtered_out += 1,
            PairVerdict::AlreadyKnown | PairVerdict::BeyondThreshold(_) => stats.candidates += 1,
            PairVerdict::Within(distance_km) => {
                stats.candidates += 1;
                if writer.propose_distance(a, b, distance_km) {
                    stats.haversine_passed += 1;
                    debug!("{} <-> {}: {:.3} km", a.label(), b.label(), distance_km);
                    writer.flush_if_full().await;
                }
            }
        }
    }

    writer.flush_remaining().await;
    stats
}

/// Runs the whole pipeline once against `store`.
///
/// Only load failures are returned as errors. Batch failures are folded
/// into the summary and the run carries on.
pub async fn run(config: &PipelineConfig, store: &dyn DistanceStore) -> Result<RunSummary> {
    let started = Instant::now();
    let mut summary = RunSummary::new(Uuid::new_v4(), Utc::now());

    info!("Loading cities with coordinates...");
    let loaded = loader::load_points(store).await?;
    summary.total_points = loaded.points.len();
    summary.skipped_points = loaded.skipped;

    if loaded.points.len() < 2 {
        info!("Not enough cities with coordinates. Exiting.");
        summary.finished_at = Utc::now();
        return Ok(summary);
    }

    info!("Found {} cities. Loading existing pairs...", loaded.points.len());
    let existing = loader::load_existing_pairs(store, config.existing_pairs_limit).await?;
    summary.existing_pairs = existing.len();
    info!(
        "Loaded {} existing pairs. Starting pairwise computation (max {} km)...",
        existing.len(),
        config.max_distance_km
    );

    let filter = BoundingBoxFilter::new(config.max_distance_km);
    let mut writer = BatchWriter::new(store, existing, config.batch_size, config.batch_delay());
    summary.pairs = compute_distances(&loaded.points, &filter, &mut writer).await;
    summary.writes = writer.finish();
    summary.finished_at = Utc::now();

    info!(
        "Pairwise computation complete: {} rows inserted in {:.2?}",
        summary.writes.inserted,
        started.elapsed()
    );
    Ok(summary)
}
