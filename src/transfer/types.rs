use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::Error;
use crate::store::Item;

/// Largest batch `BatchWriteItem` accepts
pub const MAX_BATCH_SIZE: usize = 25;

/// Items requested per scan page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Items between two progress log lines
pub const PROGRESS_LOG_INTERVAL: u64 = 1000;

/// Retry configuration for unprocessed batch items
///
/// Delays grow as `initial_delay * 2^attempt`, capped at `max_delay`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry rounds per batch
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    /// 5 retries: 100ms, 200ms, 400ms, 800ms, 1600ms
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1600),
        }
    }
}

/// Client-side write pacing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Throttle {
    /// Pause after this many items, `0` disables pacing
    pub every: usize,
    /// Length of each pause
    pub pause: Duration,
}

impl Throttle {
    /// No pacing at all
    pub const DISABLED: Throttle = Throttle {
        every: 0,
        pause: Duration::ZERO,
    };
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            every: 100,
            pause: Duration::from_millis(10),
        }
    }
}

/// Batch writer settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteConfig {
    /// Items per `BatchWriteItem` request, `1..=25`
    pub batch_size: usize,
    /// Retry policy for unprocessed items
    pub retry: RetryConfig,
    /// Client-side pacing
    pub throttle: Throttle,
    /// Batches in flight at once
    pub concurrency: usize,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            retry: RetryConfig::default(),
            throttle: Throttle::default(),
            concurrency: 1,
        }
    }
}

impl WriteConfig {
    /// Default settings with the given batch size
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    /// Reject batch sizes outside `1..=25`
    ///
    /// # Example
    ///
    /// ```
    /// use dynamo_transfer::{Error, WriteConfig};
    ///
    /// assert!(WriteConfig::with_batch_size(25).validate().is_ok());
    /// assert!(matches!(
    ///     WriteConfig::with_batch_size(26).validate(),
    ///     Err(Error::InvalidBatchSize(26))
    /// ));
    /// ```
    pub fn validate(&self) -> Result<(), Error> {
        if (1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            Ok(())
        } else {
            Err(Error::InvalidBatchSize(self.batch_size))
        }
    }
}

/// Outcome of a single `BatchWriteItem` submission
#[must_use = "unprocessed items are lost unless resubmitted"]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchResult {
    /// Items the store accepted
    pub accepted: usize,
    /// Items the store returned for resubmission
    pub unprocessed: Vec<Item>,
}

impl BatchResult {
    /// Whether every item was accepted
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }
}

/// Totals accumulated by a batch writer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    /// Batches submitted, not counting resubmissions
    pub batches: usize,
    /// Items accepted by the store
    pub written: usize,
    /// Items abandoned after retries or a rejected request
    pub failed: usize,
    /// Resubmission rounds across all batches
    pub retries: usize,
}

impl WriteStats {
    pub(crate) fn merge(&mut self, other: &WriteStats) {
        self.batches += other.batches;
        self.written += other.written;
        self.failed += other.failed;
        self.retries += other.retries;
    }
}

/// Live transfer counters
///
/// Shared through an `Arc` with whatever renders progress. Only the owning
/// orchestrator increments them.
#[derive(Debug, Default)]
pub struct Progress {
    items_read: AtomicU64,
    items_written: AtomicU64,
    items_failed: AtomicU64,
}

/// Point-in-time copy of [`Progress`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Items read from the source
    pub items_read: u64,
    /// Items accepted by the destination
    pub items_written: u64,
    /// Items given up on
    pub items_failed: u64,
}

impl Progress {
    /// Read all counters
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            items_read: self.items_read.load(Ordering::Relaxed),
            items_written: self.items_written.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
        }
    }

    /// Count `count` read items, returning the previous total
    pub(crate) fn add_read(&self, count: u64) -> u64 {
        self.items_read.fetch_add(count, Ordering::Relaxed)
    }

    pub(crate) fn add_write_stats(&self, stats: &WriteStats) {
        let _ = self
            .items_written
            .fetch_add(stats.written as u64, Ordering::Relaxed);
        let _ = self
            .items_failed
            .fetch_add(stats.failed as u64, Ordering::Relaxed);
    }
}

/// Whether adding `added` items to `previous` crosses a log interval
pub(crate) fn crosses_interval(previous: u64, added: u64) -> bool {
    added > 0 && previous / PROGRESS_LOG_INTERVAL != (previous + added) / PROGRESS_LOG_INTERVAL
}
