// src/results.rs

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Result of sending one batch to the store
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Store confirmed this many new rows (may be fewer than were sent).
    Inserted(usize),
    /// Whole batch collided with the uniqueness constraint. Zero new rows.
    Conflict,
    /// Any other failure. The batch was dropped.
    Failed(String),
}

impl BatchOutcome {
    /// The store answered, even if with a conflict.
    pub fn reached_store(&self) -> bool {
        !matches!(self, BatchOutcome::Failed(_))
    }
}

/// Totals across every flush of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteStats {
    pub inserted: usize,
    pub batches_flushed: usize,
    pub conflict_batches: usize,
    pub failed_batches: usize,
    /// One line per conflict or failed batch.
    pub warnings: Vec<String>,
}

impl WriteStats {
    pub fn record(&mut self, batch_number: usize, rows: usize, outcome: &BatchOutcome) {
        self.batches_flushed += 1;
        match outcome {
            BatchOutcome::Inserted(n) => self.inserted += n,
            BatchOutcome::Conflict => {
                self.conflict_batches += 1;
                self.warnings.push(format!(
                    "Batch {} ({} rows): conflict, some rows already exist",
                    batch_number, rows
                ));
            }
            BatchOutcome::Failed(detail) => {
                self.failed_batches += 1;
                self.warnings.push(format!(
                    "Batch {} ({} rows): insert failed: {}",
                    batch_number, rows, detail
                ));
            }
        }
    }
}

/// Per-pair counters of the filter -> distance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairStats {
    /// Pairs that passed the bounding-box filter.
    pub candidates: usize,
    /// Pairs rejected by the bounding-box filter.
    pub filtered_out: usize,
    /// New pairs within the exact threshold, scheduled for insert.
    pub haversine_passed: usize,
}

/// Complete run statistics
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    pub total_points: usize,
    pub skipped_points: usize,
    pub existing_pairs: usize,

    pub pairs: PairStats,
    pub writes: WriteStats,
}

impl RunSummary {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: started_at,
            total_points: 0,
            skipped_points: 0,
            existing_pairs: 0,
            pairs: PairStats::default(),
            writes: WriteStats::default(),
        }
    }

    pub fn inserted(&self) -> usize {
        self.writes.inserted
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Summary ---")?;
        writeln!(f, "Run: {}", self.run_id)?;
        writeln!(f, "Cities: {}", self.total_points)?;
        if self.skipped_points > 0 {
            writeln!(f, "Skipped cities (bad coordinates): {}", self.skipped_points)?;
        }
        writeln!(f, "Existing pairs: {}", self.existing_pairs)?;
        writeln!(f, "Candidates passed cheap filters: {}", self.pairs.candidates)?;
        writeln!(f, "Filtered-out by cheap checks: {}", self.pairs.filtered_out)?;
        writeln!(f, "Passed Haversine and buffered: {}", self.pairs.haversine_passed)?;
        writeln!(
            f,
            "Batches: {} flushed, {} conflicts, {} failed",
            self.writes.batches_flushed, self.writes.conflict_batches, self.writes.failed_batches
        )?;
        write!(f, "Inserted rows: {}", self.writes.inserted)
    }
}
