//! Batched, paced execution of per-entity actions.

use crate::reconcile::{EntityOutcome, TagOutcome};
use std::future::Future;
use std::ops::AddAssign;
use std::time::Duration;

/// Default number of entities per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default pause between batches.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(2);

/// Counters for one batch, one application, or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub total_tables: usize,
    pub existing_tables: usize,
    pub missing_tables: usize,
    pub already_tagged: usize,
    pub newly_tagged: usize,
    pub simulated: usize,
    pub failed_tag_applications: usize,
}

impl BatchStats {
    /// Count one entity outcome.
    pub fn record(&mut self, outcome: &EntityOutcome) {
        self.total_tables += 1;
        match outcome {
            EntityOutcome::Missing => self.missing_tables += 1,
            EntityOutcome::Reconciled(result) => {
                self.existing_tables += 1;
                match result {
                    TagOutcome::AlreadyTagged => self.already_tagged += 1,
                    TagOutcome::Applied => self.newly_tagged += 1,
                    TagOutcome::Simulated => self.simulated += 1,
                    TagOutcome::Failed(_) => self.failed_tag_applications += 1,
                }
            }
        }
    }

    /// Fold another accumulator into this one.
    pub fn merge(&mut self, other: &BatchStats) {
        self.total_tables += other.total_tables;
        self.existing_tables += other.existing_tables;
        self.missing_tables += other.missing_tables;
        self.already_tagged += other.already_tagged;
        self.newly_tagged += other.newly_tagged;
        self.simulated += other.simulated;
        self.failed_tag_applications += other.failed_tag_applications;
    }
}

impl AddAssign<&BatchStats> for BatchStats {
    fn add_assign(&mut self, other: &BatchStats) {
        self.merge(other);
    }
}

/// What a batch run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub stats: BatchStats,
    pub batches: usize,
    pub pauses: usize,
}

/// Splits work into fixed-size batches with a pause between them.
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    batch_size: usize,
    delay: Duration,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_BATCH_DELAY)
    }
}

impl BatchRunner {
    /// A batch size of 0 is treated as 1.
    pub fn new(batch_size: usize, delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            delay,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run `action` over every item, in order, one at a time.
    ///
    /// Sleeps for the configured delay between consecutive batches and never
    /// after the last one.
    pub async fn run<'a, T, F, Fut>(&self, items: &'a [T], mut action: F) -> BatchReport
    where
        F: FnMut(&'a T) -> Fut,
        Fut: Future<Output = EntityOutcome>,
    {
        let mut report = BatchReport::default();
        let total_batches = items.len().div_ceil(self.batch_size);

        for (index, chunk) in items.chunks(self.batch_size).enumerate() {
            let batch_no = index + 1;
            tracing::info!(
                batch = batch_no,
                of = total_batches,
                size = chunk.len(),
                "Processing batch"
            );

            let mut stats = BatchStats::default();
            for item in chunk {
                let outcome = action(item).await;
                stats.record(&outcome);
            }

            tracing::info!(
                batch = batch_no,
                existing = stats.existing_tables,
                missing = stats.missing_tables,
                already_tagged = stats.already_tagged,
                applied = stats.newly_tagged,
                simulated = stats.simulated,
                failed = stats.failed_tag_applications,
                "Batch complete"
            );

            report.stats += &stats;
            report.batches += 1;

            if batch_no < total_batches && !self.delay.is_zero() {
                tracing::debug!(delay_ms = %self.delay.as_millis(), "Pausing before next batch");
                tokio::time::sleep(self.delay).await;
                report.pauses += 1;
            }
        }

        report
    }
}
