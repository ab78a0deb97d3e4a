use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::{fmt, time::Instant};
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::batch::BatchWriter;
use super::helpers::retry_config::retry_delay;
use super::scan::{Scanner, approximate_count};
use super::types::{
    DEFAULT_PAGE_SIZE, Progress, RetryConfig, WriteConfig, WriteStats, crosses_interval,
};
use super::validate::{ValidationReport, validate_copy};
use crate::error::Error;
use crate::schema::{self, PollConfig, TableSchema};
use crate::store::{ScanPage, TableStore};

/// Yes/no prompt consulted before destructive steps
pub trait Confirm: fmt::Debug + Send + Sync {
    /// Ask `prompt`, returning whether the answer was yes
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers yes without asking
#[derive(Clone, Copy, Debug, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, prompt: &str) -> bool {
        info!(prompt, "Confirmed in advance");
        true
    }
}

/// Asks on the terminal; only `y` or `yes` count as yes
#[derive(Clone, Copy, Debug, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        let mut stdout = io::stdout();
        if write!(stdout, "{prompt} (y/n): ")
            .and_then(|()| stdout.flush())
            .is_err()
        {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

/// What to do when the destination table already exists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExistingTable {
    /// Abort with [`Error::SchemaMismatch`] unless both key schemas match
    #[default]
    RequireMatchingKeys,
    /// Write into the table without comparing schemas
    SkipSchemaCheck,
}

/// Settings of one table copy
#[derive(Clone, Debug)]
pub struct CopyOptions {
    /// Table to read from
    pub source_table: String,
    /// Table to write to
    pub dest_table: String,
    /// Delete and re-create an existing destination
    pub overwrite: bool,
    /// Compare item counts after copying
    pub validate: bool,
    /// Delete the source after copying, subject to confirmation
    pub delete_source: bool,
    /// Handling of an existing destination that is not overwritten
    pub existing: ExistingTable,
    /// Items requested per scan page
    pub page_size: usize,
    /// Batch writer settings
    pub write: WriteConfig,
    /// Wait for a created table to become active
    pub create_poll: PollConfig,
    /// Wait for a deleted table to disappear
    pub delete_poll: PollConfig,
}

impl CopyOptions {
    /// Default settings for copying `source_table` into `dest_table`
    pub fn new(source_table: impl Into<String>, dest_table: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            dest_table: dest_table.into(),
            overwrite: false,
            validate: false,
            delete_source: false,
            existing: ExistingTable::default(),
            page_size: DEFAULT_PAGE_SIZE,
            write: WriteConfig::default(),
            create_poll: PollConfig::CREATE,
            delete_poll: PollConfig::DELETE,
        }
    }
}

/// Steps of a table copy, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CopyStage {
    /// Read the source schema and look for the destination
    CheckDestination,
    /// Remove an existing destination
    DeleteExisting,
    /// Create the destination from the source schema
    CreateDestination,
    /// Scan the source into the destination
    CopyData,
    /// Compare item counts
    Validate,
    /// Remove the source
    DeleteSource,
    /// Finished
    Done,
}

impl fmt::Display for CopyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CopyStage::CheckDestination => "check-destination",
            CopyStage::DeleteExisting => "delete-existing",
            CopyStage::CreateDestination => "create-destination",
            CopyStage::CopyData => "copy-data",
            CopyStage::Validate => "validate",
            CopyStage::DeleteSource => "delete-source",
            CopyStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed copy
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CopySummary {
    /// Items read from the source
    pub items_read: u64,
    /// Destination write totals
    pub write: WriteStats,
    /// Whether the destination was created by this run
    pub created_destination: bool,
    /// Count comparison, when requested and both counts could be read
    pub validation: Option<ValidationReport>,
    /// Whether the source table was deleted
    pub source_deleted: bool,
}

/// Copies one table into another, schema first
///
/// Fatal failures (schema read, table creation, wait timeouts, schema
/// mismatch) abort before or between stages. Item write failures are counted
/// in the summary and never abort.
#[derive(Debug)]
pub struct TableCopier<'a> {
    source: &'a dyn TableStore,
    dest: &'a dyn TableStore,
    options: CopyOptions,
    confirm: Box<dyn Confirm>,
    progress: Arc<Progress>,
}

impl<'a> TableCopier<'a> {
    /// Prepare a copy between two stores
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBatchSize`] for a batch size outside `1..=25`.
    pub fn new(
        source: &'a dyn TableStore,
        dest: &'a dyn TableStore,
        options: CopyOptions,
        confirm: Box<dyn Confirm>,
    ) -> Result<Self, Error> {
        options.write.validate()?;

        Ok(Self {
            source,
            dest,
            options,
            confirm,
            progress: Arc::new(Progress::default()),
        })
    }

    /// Live counters of this copy
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    fn enter(&self, stage: CopyStage) {
        info!(
            %stage,
            source_table = %self.options.source_table,
            dest_table = %self.options.dest_table,
            "Copy stage"
        );
    }

    /// Run every stage
    pub async fn run(&self) -> Result<CopySummary, Error> {
        let started = Instant::now();
        let options = &self.options;
        let mut summary = CopySummary::default();

        self.enter(CopyStage::CheckDestination);
        let source_schema = schema::fetch_schema(self.source, &options.source_table).await?;
        let mut dest_exists = self.dest.table_exists(&options.dest_table).await?;

        if dest_exists && options.overwrite {
            self.enter(CopyStage::DeleteExisting);
            schema::delete_table(self.dest, &options.dest_table, options.delete_poll).await?;
            dest_exists = false;
        } else if dest_exists {
            self.check_existing(&source_schema).await?;
        }

        if !dest_exists {
            self.enter(CopyStage::CreateDestination);
            schema::create_table(
                self.dest,
                &options.dest_table,
                &source_schema,
                options.create_poll,
            )
            .await?;
            summary.created_destination = true;
        }

        self.enter(CopyStage::CopyData);
        let (items_read, write) = self.copy_data().await?;
        summary.items_read = items_read;
        summary.write = write;

        info!(
            items = items_read,
            written = write.written,
            failed = write.failed,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Copied data"
        );

        if options.validate {
            self.enter(CopyStage::Validate);
            summary.validation = match validate_copy(
                self.source,
                &options.source_table,
                self.dest,
                &options.dest_table,
            )
            .await
            {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "Could not validate item counts");
                    None
                }
            };
        }

        if options.delete_source {
            self.enter(CopyStage::DeleteSource);
            let prompt = format!("Delete source table {}?", options.source_table);

            if self.confirm.confirm(&prompt) {
                schema::delete_table(self.source, &options.source_table, options.delete_poll)
                    .await?;
                summary.source_deleted = true;
            } else {
                info!(table = %options.source_table, "Keeping source table");
            }
        }

        self.enter(CopyStage::Done);
        Ok(summary)
    }

    async fn check_existing(&self, source_schema: &TableSchema) -> Result<(), Error> {
        let options = &self.options;

        match options.existing {
            ExistingTable::SkipSchemaCheck => {
                warn!(
                    table = %options.dest_table,
                    "Destination exists, writing without a schema check"
                );
                Ok(())
            }
            ExistingTable::RequireMatchingKeys => {
                let dest_schema = schema::fetch_schema(self.dest, &options.dest_table).await?;

                if source_schema.key_schema_matches(&dest_schema) {
                    info!(table = %options.dest_table, "Destination exists with matching keys");
                    Ok(())
                } else {
                    Err(Error::SchemaMismatch {
                        source_table: options.source_table.clone(),
                        dest_table: options.dest_table.clone(),
                    })
                }
            }
        }
    }

    async fn copy_data(&self) -> Result<(u64, WriteStats), Error> {
        let options = &self.options;
        let mut scanner = Scanner::new(self.source, &options.source_table, options.page_size);
        let mut writer = BatchWriter::unchecked(self.dest, &options.dest_table, options.write.clone())
            .with_progress(self.progress());
        let mut items_read = 0u64;

        match approximate_count(self.source, &options.source_table).await {
            Ok(total) => {
                info!(table = %options.source_table, approximate_items = total, "Scanning source");
            }
            Err(e) => {
                warn!(table = %options.source_table, error = %e, "Couldn't get item count");
            }
        }

        loop {
            let page = match next_page_with_retry(&mut scanner, &options.write.retry).await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => {
                    // Retries exhausted or not retryable; keep what was written
                    let write = writer.finish().await;
                    error!(
                        table = %options.source_table,
                        items = items_read,
                        written = write.written,
                        error = %e,
                        "Scan failed"
                    );
                    return Err(e);
                }
            };

            let count = page.items.len() as u64;
            let previous = self.progress.add_read(count);
            items_read += count;

            for item in page.items {
                writer.put(item).await;
            }

            if crosses_interval(previous, count) {
                let snapshot = self.progress.snapshot();
                info!(
                    read = snapshot.items_read,
                    written = snapshot.items_written,
                    failed = snapshot.items_failed,
                    "Copy progress"
                );
            }
        }

        Ok((items_read, writer.finish().await))
    }
}

/// Fetch the next page, retrying throttled scans with backoff
///
/// A failed `next_page` leaves the cursor in place, so the retry resumes at
/// the same page.
async fn next_page_with_retry<S>(
    scanner: &mut Scanner<'_, S>,
    retry: &RetryConfig,
) -> Result<Option<ScanPage>, Error>
where
    S: TableStore + ?Sized,
{
    let mut attempt = 0;

    loop {
        match scanner.next_page().await {
            Err(e) if e.is_throttled() && attempt < retry.max_retries => {
                let delay = retry_delay(attempt, retry.initial_delay, retry.max_delay);
                warn!(
                    attempt = attempt + 1,
                    delay_secs = delay.as_secs_f64(),
                    error = %e,
                    "Scan throttled, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
