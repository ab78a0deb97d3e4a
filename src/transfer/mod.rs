//! Bulk transfer engine
//!
//! [`Scanner`] reads a table page by page, [`BatchWriter`] writes items in
//! bounded batches with retry, and the two orchestrators tie them together:
//! [`TableCopier`] copies a table (schema first) and [`Importer`] loads
//! newline-delimited JSON files.

mod batch;
mod copy;
mod helpers;
mod import;
mod scan;
mod types;
mod validate;

pub use batch::{BatchWriter, write_batch};
pub use copy::{
    AssumeYes, Confirm, CopyOptions, CopyStage, CopySummary, ExistingTable, StdinConfirm,
    TableCopier,
};
pub use import::{
    DEFAULT_ID_FIELD, FileReport, INPUT_EXTENSION, ImportOptions, ImportSummary, Importer,
    backfill_id, discover_files,
};
pub use scan::{Scanner, approximate_count};
pub use types::{
    BatchResult, DEFAULT_PAGE_SIZE, MAX_BATCH_SIZE, PROGRESS_LOG_INTERVAL, Progress,
    ProgressSnapshot, RetryConfig, Throttle, WriteConfig, WriteStats,
};
pub use validate::{ValidationReport, validate_copy};
