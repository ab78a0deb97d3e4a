use aws_sdk_dynamodb::types::AttributeValue;
use serde::Serialize;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::batch::BatchWriter;
use super::types::{Progress, WriteConfig, crosses_interval};
use crate::encode::encode_item;
use crate::error::Error;
use crate::store::{Item, TableStore};

/// Identifier attribute filled in when a record lacks one
pub const DEFAULT_ID_FIELD: &str = "id";

/// Extension of the files picked up from the data directory
pub const INPUT_EXTENSION: &str = "json";

/// Settings of one import run
#[derive(Clone, Debug)]
pub struct ImportOptions {
    /// Destination table
    pub table: String,
    /// Identifier attribute to backfill
    pub id_field: String,
    /// Batch writer settings
    pub write: WriteConfig,
}

impl ImportOptions {
    /// Default settings for importing into `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_field: DEFAULT_ID_FIELD.to_string(),
            write: WriteConfig::default(),
        }
    }
}

/// Totals for one input file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FileReport {
    /// Records parsed
    pub items: usize,
    /// Batches submitted
    pub batches: usize,
    /// Bad lines plus items that could not be written
    pub errors: usize,
}

/// Totals for a whole import run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Files processed
    pub files: usize,
    /// Records parsed
    pub items: usize,
    /// Batches submitted
    pub batches: usize,
    /// Bad lines, unreadable files, and failed writes
    pub errors: usize,
}

impl ImportSummary {
    fn add(&mut self, report: &FileReport) {
        self.files += 1;
        self.items += report.items;
        self.batches += report.batches;
        self.errors += report.errors;
    }
}

/// `*.json` files directly inside `dir`, sorted by path
///
/// # Errors
///
/// [`Error::Io`] when the directory cannot be listed.
pub async fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_input = path
            .extension()
            .is_some_and(|extension| extension == INPUT_EXTENSION);

        if is_input && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Give `item` a fresh UUID v4 string under `field` when the attribute is
/// missing, `NULL`, or an empty string
///
/// Runs on the encoded item, so DynamoDB JSON input such as `{"S": ""}` or
/// `{"NULL": true}` is treated like a missing identifier. Returns whether an
/// identifier was generated.
///
/// # Example
///
/// ```
/// use dynamo_transfer::encode::encode_item;
/// use dynamo_transfer::transfer::backfill_id;
/// use serde_json::json;
///
/// let record = json!({"name": "widget"});
/// let mut item = encode_item(record.as_object().unwrap());
/// assert!(backfill_id(&mut item, "id"));
/// assert!(!backfill_id(&mut item, "id"));
/// ```
pub fn backfill_id(item: &mut Item, field: &str) -> bool {
    let missing = match item.get(field) {
        None | Some(AttributeValue::Null(_)) => true,
        Some(AttributeValue::S(s)) => s.is_empty(),
        Some(_) => false,
    };

    if missing {
        let _ = item.insert(field.to_string(), AttributeValue::S(Uuid::new_v4().to_string()));
    }

    missing
}

/// Loads newline-delimited JSON files into a table
///
/// Each non-blank line is one record. Bad lines are logged and counted,
/// never fatal.
#[derive(Debug)]
pub struct Importer<'a> {
    store: &'a dyn TableStore,
    options: ImportOptions,
    progress: Arc<Progress>,
}

impl<'a> Importer<'a> {
    /// Prepare an import into `options.table`
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBatchSize`] for a batch size outside `1..=25`.
    pub fn new(store: &'a dyn TableStore, options: ImportOptions) -> Result<Self, Error> {
        options.write.validate()?;

        Ok(Self {
            store,
            options,
            progress: Arc::new(Progress::default()),
        })
    }

    /// Live counters of this import
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Import every input file in `dir`
    ///
    /// # Errors
    ///
    /// Only listing an existing `dir` can fail; a missing directory is
    /// logged and yields an empty summary, per-file problems are counted.
    pub async fn run(&self, dir: &Path) -> Result<ImportSummary, Error> {
        let mut summary = ImportSummary::default();
        let files = match discover_files(dir).await {
            Ok(files) => files,
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                warn!(dir = %dir.display(), "Data directory does not exist, nothing to import");
                return Ok(summary);
            }
            Err(e) => return Err(e),
        };

        if files.is_empty() {
            warn!(dir = %dir.display(), "No JSON files found");
            return Ok(summary);
        }

        info!(dir = %dir.display(), files = files.len(), "Found JSON files");

        for (index, path) in files.iter().enumerate() {
            info!(
                file = %path.display(),
                "Processing file {}/{}",
                index + 1,
                files.len()
            );

            let report = self.process_file(path).await;
            info!(
                items = report.items,
                batches = report.batches,
                errors = report.errors,
                "Finished file"
            );
            summary.add(&report);
        }

        info!(
            files = summary.files,
            items = summary.items,
            errors = summary.errors,
            "Import completed"
        );
        if summary.errors > 0 {
            warn!(errors = summary.errors, "Errors encountered during import");
        }

        Ok(summary)
    }

    /// Import one file
    ///
    /// A file that cannot be opened counts as one error. A read failure
    /// part-way through counts one error and keeps the records before it.
    pub async fn process_file(&self, path: &Path) -> FileReport {
        let mut report = FileReport::default();

        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                error!(file = %path.display(), error = %e, "Cannot open file");
                report.errors = 1;
                return report;
            }
        };

        let mut writer =
            BatchWriter::unchecked(self.store, &self.options.table, self.options.write.clone())
                .with_progress(self.progress());
        let mut lines = BufReader::new(file).split(b'\n');
        let mut line_number = 0usize;

        loop {
            let line = match lines.next_segment().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!(file = %path.display(), line = line_number + 1, error = %e, "Read failed");
                    report.errors += 1;
                    break;
                }
            };
            line_number += 1;

            let line = line.trim_ascii();
            if line.is_empty() {
                continue;
            }

            let record = match serde_json::from_slice::<Value>(line) {
                Ok(Value::Object(record)) => record,
                Ok(_) => {
                    error!(file = %path.display(), line = line_number, "Record is not a JSON object");
                    report.errors += 1;
                    continue;
                }
                Err(e) => {
                    error!(file = %path.display(), line = line_number, error = %e, "JSON error");
                    report.errors += 1;
                    continue;
                }
            };

            let mut item = encode_item(&record);
            let _ = backfill_id(&mut item, &self.options.id_field);
            report.items += 1;

            let previous = self.progress.add_read(1);
            if crosses_interval(previous, 1) {
                info!(read = previous + 1, "Import progress");
            }

            writer.put(item).await;
        }

        let stats = writer.finish().await;
        report.batches = stats.batches;
        report.errors += stats.failed;
        report
    }
}
