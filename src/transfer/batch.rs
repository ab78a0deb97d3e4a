use futures_util::StreamExt;
use std::sync::Arc;
use std::{cmp, mem};
use tokio::time::sleep;
use tokio_stream as stream;
use tracing::{debug, error, warn};

use super::helpers::retry_config;
use super::types::{BatchResult, MAX_BATCH_SIZE, Progress, RetryConfig, WriteConfig, WriteStats};
use crate::error::Error;
use crate::store::{Item, TableStore};

/// Submit one batch without retrying
///
/// Unprocessed items are handed back in the [`BatchResult`]; the caller
/// decides whether to resubmit them.
///
/// # Errors
///
/// [`Error::InvalidBatchSize`] for more than 25 items, otherwise whatever the
/// store reports for the request as a whole.
pub async fn write_batch<S>(store: &S, table: &str, items: &[Item]) -> Result<BatchResult, Error>
where
    S: TableStore + ?Sized,
{
    if items.len() > MAX_BATCH_SIZE {
        return Err(Error::InvalidBatchSize(items.len()));
    }

    if items.is_empty() {
        return Ok(BatchResult::default());
    }

    let unprocessed = store.batch_write(table, items).await?;

    Ok(BatchResult {
        accepted: items.len().saturating_sub(unprocessed.len()),
        unprocessed,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Submitted,
    Throttled,
    Rejected,
}

async fn submit_once<S>(
    store: &S,
    table: &str,
    pending: &mut Vec<Item>,
    stats: &mut WriteStats,
) -> Outcome
where
    S: TableStore + ?Sized,
{
    match write_batch(store, table, pending).await {
        Ok(result) => {
            stats.written += result.accepted;
            *pending = result.unprocessed;
            Outcome::Submitted
        }
        Err(e) if e.is_throttled() => {
            warn!(table, items = pending.len(), error = %e, "Batch write throttled");
            Outcome::Throttled
        }
        Err(e) => {
            error!(table, items = pending.len(), error = %e, "Batch write failed");
            Outcome::Rejected
        }
    }
}

/// Write one batch, resubmitting unprocessed items with exponential backoff
///
/// Never fails: whatever is left after the retry budget, or after a
/// non-throttling request failure, is counted as failed.
async fn submit_with_retry<S>(
    store: &S,
    table: &str,
    batch: Vec<Item>,
    retries: &RetryConfig,
) -> WriteStats
where
    S: TableStore + ?Sized,
{
    let mut stats = WriteStats {
        batches: 1,
        ..WriteStats::default()
    };
    let mut pending = batch;
    let mut outcome = submit_once(store, table, &mut pending, &mut stats).await;

    // Retry loop for unprocessed items
    let mut retry_count = 0;

    while outcome != Outcome::Rejected && !pending.is_empty() && retry_count < retries.max_retries
    {
        // Wait with exponential backoff
        sleep(retry_config::retry_delay(
            retry_count,
            retries.initial_delay,
            retries.max_delay,
        ))
        .await;

        retry_count += 1;
        debug!(
            table,
            attempt = retry_count,
            items = pending.len(),
            "Retrying unprocessed items"
        );

        outcome = submit_once(store, table, &mut pending, &mut stats).await;
    }

    if !pending.is_empty() {
        warn!(
            table,
            failed = pending.len(),
            retries = retry_count,
            "Giving up on items"
        );
    }

    stats.retries = retry_count;
    stats.failed = pending.len();
    stats
}

/// Buffered writer feeding a table in bounded batches
///
/// Lifecycle is `new → put* → flush → finish`. `finish` always flushes what
/// is buffered; dropping a writer that still holds items logs a warning and
/// loses them.
///
/// # Example
///
/// ```
/// # async fn example() -> Result<(), dynamo_transfer::Error> {
/// use aws_sdk_dynamodb::types::AttributeValue;
/// use dynamo_transfer::schema::{AttributeType, TableSchema};
/// use dynamo_transfer::store::{Item, MemoryStore};
/// use dynamo_transfer::{BatchWriter, WriteConfig};
///
/// let store = MemoryStore::new().with_table("users", TableSchema::new("id", AttributeType::String));
/// let mut writer = BatchWriter::new(&store, "users", WriteConfig::with_batch_size(2))?;
///
/// for id in ["a", "b", "c"] {
///     writer
///         .put(Item::from([("id".to_string(), AttributeValue::S(id.into()))]))
///         .await;
/// }
///
/// let stats = writer.finish().await;
/// assert_eq!(stats.written, 3);
/// assert_eq!(stats.batches, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BatchWriter<'a, S: TableStore + ?Sized> {
    store: &'a S,
    table: String,
    config: WriteConfig,
    buffer: Vec<Item>,
    stats: WriteStats,
    progress: Option<Arc<Progress>>,
    since_pause: usize,
}

impl<'a, S: TableStore + ?Sized> BatchWriter<'a, S> {
    /// Open a writer for `table`
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBatchSize`] when `config.batch_size` is outside `1..=25`.
    pub fn new(store: &'a S, table: impl Into<String>, config: WriteConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self::unchecked(store, table, config))
    }

    /// Open a writer whose config was validated by the caller
    pub(crate) fn unchecked(store: &'a S, table: impl Into<String>, config: WriteConfig) -> Self {
        let capacity = config.batch_size * cmp::max(1, config.concurrency);
        Self {
            store,
            table: table.into(),
            config,
            buffer: Vec::with_capacity(capacity),
            stats: WriteStats::default(),
            progress: None,
            since_pause: 0,
        }
    }

    /// Report written and failed items to `progress`
    pub fn with_progress(mut self, progress: Arc<Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Buffer an item, flushing once enough batches are ready
    pub async fn put(&mut self, item: Item) {
        self.buffer.push(item);

        let throttle = self.config.throttle;
        if throttle.every > 0 {
            self.since_pause += 1;
            if self.since_pause >= throttle.every {
                self.since_pause = 0;
                sleep(throttle.pause).await;
            }
        }

        if self.buffer.len() >= self.config.batch_size * cmp::max(1, self.config.concurrency) {
            self.flush().await;
        }
    }

    /// Submit everything buffered
    ///
    /// Up to `concurrency` batches are in flight at once, each with its own
    /// retry state.
    pub async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let items = mem::take(&mut self.buffer);

        let batches: Vec<Vec<Item>> = items
            .chunks(self.config.batch_size)
            .map(|data| data.to_vec())
            .collect();

        let concurrency = cmp::max(1, batches.len().min(self.config.concurrency));
        let store = self.store;
        let table = self.table.as_str();
        let retries = &self.config.retry;

        let results: Vec<WriteStats> = stream::iter(
            batches
                .into_iter()
                .map(|batch| submit_with_retry(store, table, batch, retries)),
        )
        .buffer_unordered(concurrency)
        .collect()
        .await;

        for result in &results {
            self.stats.merge(result);
            if let Some(progress) = &self.progress {
                progress.add_write_stats(result);
            }
        }

        debug!(
            table = %self.table,
            written = self.stats.written,
            failed = self.stats.failed,
            "Flushed batches"
        );
    }

    /// Number of items waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Totals so far
    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    /// Flush and close the writer
    pub async fn finish(mut self) -> WriteStats {
        self.flush().await;
        self.stats
    }
}

impl<S: TableStore + ?Sized> Drop for BatchWriter<'_, S> {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            warn!(
                table = %self.table,
                items = self.buffer.len(),
                "Batch writer dropped with unflushed items"
            );
        }
    }
}
