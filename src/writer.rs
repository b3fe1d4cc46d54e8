// src/writer.rs

use log::{debug, error, warn};
use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::models::{DistanceRecord, GeoPoint, PairKey};
use crate::results::{BatchOutcome, WriteStats};
use crate::store::DistanceStore;

/// Buffers new distance rows and sends them to the store in bounded batches.
///
/// `known_pairs` starts as the loaded snapshot and grows as rows are
/// scheduled, so a pair is proposed at most once per run. Additions are not
/// rolled back when a batch fails.
pub struct BatchWriter<'a> {
    store: &'a dyn DistanceStore,
    known_pairs: HashSet<PairKey>,
    pending: Vec<DistanceRecord>,
    batch_size: usize,
    batch_delay: Duration,
    stats: WriteStats,
}

impl<'a> BatchWriter<'a> {
    pub fn new(
        store: &'a dyn DistanceStore,
        known_pairs: HashSet<PairKey>,
        batch_size: usize,
        batch_delay: Duration,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            known_pairs,
            pending: Vec::new(),
            batch_size,
            batch_delay,
            stats: WriteStats::default(),
        }
    }

    pub fn known_pairs(&self) -> &HashSet<PairKey> {
        &self.known_pairs
    }

    pub fn pending(&self) -> &[DistanceRecord] {
        &self.pending
    }

    /// Schedules a row for the pair unless it is already known.
    /// Returns `true` if a row was buffered.
    pub fn propose_distance(&mut self, a: &GeoPoint, b: &GeoPoint, distance_km: f64) -> bool {
        if !self.known_pairs.insert(PairKey::new(&a.id, &b.id)) {
            return false;
        }
        self.pending
            .push(DistanceRecord::generated(&a.id, &b.id, distance_km));
        true
    }

    /// Flushes once the buffer reaches `batch_size`, then waits
    /// `batch_delay` if the store answered.
    pub async fn flush_if_full(&mut self) -> Option<BatchOutcome> {
        if self.pending.len() < self.batch_size {
            return None;
        }
        let outcome = self.flush().await;
        if outcome.reached_store() && !self.batch_delay.is_zero() {
            tokio::time::sleep(self.batch_delay).await;
        }
        Some(outcome)
    }

    /// Sends whatever is left in the buffer. `None` if it was empty.
    pub async fn flush_remaining(&mut self) -> Option<BatchOutcome> {
        if self.pending.is_empty() {
            return None;
        }
        Some(self.flush().await)
    }

    /// Consumes the writer, returning the accumulated flush totals.
    pub fn finish(self) -> WriteStats {
        if !self.pending.is_empty() {
            warn!(
                "Writer finished with {} unflushed rows",
                self.pending.len()
            );
        }
        self.stats
    }

    async fn flush(&mut self) -> BatchOutcome {
        let batch = std::mem::take(&mut self.pending);
        let batch_number = self.stats.batches_flushed + 1;
        let started = Instant::now();

        let outcome = match self.store.insert_distances(&batch).await {
            Ok(created) => {
                debug!(
                    "Batch {}: {} of {} rows inserted in {:.2?}",
                    batch_number,
                    created,
                    batch.len(),
                    started.elapsed()
                );
                BatchOutcome::Inserted(created)
            }
            Err(err) if err.is_conflict() => {
                warn!(
                    "Batch {} insert conflict (some rows already exist): {}",
                    batch_number, err
                );
                BatchOutcome::Conflict
            }
            Err(err) => {
                error!(
                    "Batch {} insert failed, dropping {} rows: {}",
                    batch_number,
                    batch.len(),
                    err
                );
                BatchOutcome::Failed(err.to_string())
            }
        };

        self.stats.record(batch_number, batch.len(), &outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn p(id: &str) -> GeoPoint {
        GeoPoint::new(id, 0.0, 0.0).unwrap()
    }

    #[tokio::test]
    async fn duplicate_proposals_are_buffered_once() {
        let store = MemoryStore::default();
        let mut writer = BatchWriter::new(&store, HashSet::new(), 10, Duration::ZERO);

        assert!(writer.propose_distance(&p("a"), &p("b"), 12.3456));
        assert!(!writer.propose_distance(&p("b"), &p("a"), 12.3456));
        assert!(!writer.propose_distance(&p("a"), &p("b"), 99.0));

        assert_eq!(writer.pending().len(), 1);
        let record = &writer.pending()[0];
        assert_eq!(record.city_a_id.0, "a");
        assert_eq!(record.city_b_id.0, "b");
        assert_eq!(record.distance_km, 12.346);
    }

    #[tokio::test]
    async fn pairs_in_snapshot_are_skipped() {
        let store = MemoryStore::default();
        let known: HashSet<PairKey> = [PairKey::new(&"b".into(), &"a".into())].into_iter().collect();
        let mut writer = BatchWriter::new(&store, known, 10, Duration::ZERO);

        assert!(!writer.propose_distance(&p("a"), &p("b"), 1.0));
        assert!(writer.pending().is_empty());
    }

    #[tokio::test]
    async fn flushes_exactly_at_batch_size() {
        let store = MemoryStore::default();
        let mut writer = BatchWriter::new(&store, HashSet::new(), 2, Duration::ZERO);

        writer.propose_distance(&p("a"), &p("b"), 1.0);
        assert_eq!(writer.flush_if_full().await, None);

        writer.propose_distance(&p("a"), &p("c"), 2.0);
        assert_eq!(writer.flush_if_full().await, Some(BatchOutcome::Inserted(2)));
        assert!(writer.pending().is_empty());

        writer.propose_distance(&p("b"), &p("c"), 3.0);
        assert_eq!(writer.flush_if_full().await, None);
        assert_eq!(writer.flush_remaining().await, Some(BatchOutcome::Inserted(1)));
        assert_eq!(writer.flush_remaining().await, None);

        assert_eq!(store.batch_sizes().await, vec![2, 1]);
        assert_eq!(writer.finish().inserted, 3);
    }

    #[tokio::test]
    async fn conflict_batches_count_as_zero() {
        let store = MemoryStore::default();
        store
            .seed_distance(DistanceRecord::generated(&"a".into(), &"b".into(), 1.0))
            .await;
        // Writer does not know about the seeded row, as if it were beyond the snapshot cap
        let mut writer = BatchWriter::new(&store, HashSet::new(), 1, Duration::ZERO);

        writer.propose_distance(&p("a"), &p("b"), 1.0);
        assert_eq!(writer.flush_if_full().await, Some(BatchOutcome::Conflict));

        writer.propose_distance(&p("a"), &p("c"), 1.0);
        assert_eq!(writer.flush_if_full().await, Some(BatchOutcome::Inserted(1)));

        let stats = writer.finish();
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.conflict_batches, 1);
        assert_eq!(stats.warnings.len(), 1);
    }

    #[tokio::test]
    async fn partial_conflicts_count_confirmed_rows() {
        let store = MemoryStore::default();
        store
            .seed_distance(DistanceRecord::generated(&"a".into(), &"b".into(), 1.0))
            .await;
        let mut writer = BatchWriter::new(&store, HashSet::new(), 3, Duration::ZERO);

        writer.propose_distance(&p("a"), &p("b"), 1.0);
        writer.propose_distance(&p("a"), &p("c"), 1.0);
        writer.propose_distance(&p("b"), &p("c"), 1.0);
        assert_eq!(writer.flush_if_full().await, Some(BatchOutcome::Inserted(2)));
    }

    #[tokio::test]
    async fn failed_batch_is_dropped_and_run_continues() {
        let store = MemoryStore::default();
        store.fail_insert(1).await;
        let mut writer = BatchWriter::new(&store, HashSet::new(), 1, Duration::ZERO);

        writer.propose_distance(&p("a"), &p("b"), 1.0);
        let outcome = writer.flush_if_full().await;
        assert!(matches!(outcome, Some(BatchOutcome::Failed(ref msg)) if msg.contains("500")));
        assert!(writer.pending().is_empty());
        // Still marked known for the rest of the run
        assert!(!writer.propose_distance(&p("a"), &p("b"), 1.0));

        writer.propose_distance(&p("a"), &p("c"), 1.0);
        assert_eq!(writer.flush_if_full().await, Some(BatchOutcome::Inserted(1)));

        let stats = writer.finish();
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.inserted, 1);
        assert!(!store.contains("a", "b").await);
    }

    #[tokio::test]
    async fn oversized_batch_size_buffers_without_preallocating() {
        let store = MemoryStore::default();
        let mut writer = BatchWriter::new(&store, HashSet::new(), usize::MAX, Duration::ZERO);

        writer.propose_distance(&p("a"), &p("b"), 1.0);
        writer.propose_distance(&p("a"), &p("c"), 2.0);
        assert_eq!(writer.flush_if_full().await, None);
        assert_eq!(writer.flush_remaining().await, Some(BatchOutcome::Inserted(2)));
        assert_eq!(store.batch_sizes().await, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn full_batches_are_paced() {
        let store = MemoryStore::default();
        let mut writer = BatchWriter::new(&store, HashSet::new(), 1, Duration::from_millis(25));

        let started = tokio::time::Instant::now();
        writer.propose_distance(&p("a"), &p("b"), 1.0);
        writer.flush_if_full().await;
        writer.propose_distance(&p("a"), &p("c"), 1.0);
        writer.flush_if_full().await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
