//! # DynamoDB Bulk Transfer
//!
//! Copies tables between DynamoDB endpoints and imports newline-delimited
//! JSON into tables, with:
//! - Schema transfer (keys, attribute types, billing mode, secondary indexes)
//! - Paginated scans
//! - Batched writes with retry of unprocessed items and exponential backoff
//! - JSON to attribute value encoding with pass-through of DynamoDB JSON
//! - Item count validation
//!
//! ## Features
//!
//! - **Store agnostic**: the engine runs against any [`TableStore`];
//!   [`DynamoStore`] talks to DynamoDB, [`MemoryStore`] keeps tables in memory
//! - **Async-first**: Built on `tokio` and `aws-sdk-dynamodb`
//! - **Bounded batches**: never more than 25 items per request
//! - **Failure isolation**: bad lines and rejected items are counted, not fatal
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dynamo_transfer::client::ClientConfig;
//! use dynamo_transfer::{AssumeYes, CopyOptions, DynamoStore, Error, TableCopier};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let store = DynamoStore::connect(&ClientConfig::default()).await;
//!
//!     let mut options = CopyOptions::new("users", "users_backup");
//!     options.validate = true;
//!
//!     let copier = TableCopier::new(&store, &store, options, Box::new(AssumeYes))?;
//!     let summary = copier.run().await?;
//!     println!("copied {} items", summary.write.written);
//!
//!     Ok(())
//! }
//! ```
#![deny(
    warnings,
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    deprecated,
    unknown_lints,
    unreachable_code,
    unused_mut
)]

mod error;
pub use error::{Error, ErrorKind};

/// JSON to attribute value encoding
pub mod encode;

/// Table schemas and schema transfer
pub mod schema;

/// Table store abstraction and implementations
pub mod store;

/// Scanner, batch writer, and copy/import orchestrators
pub mod transfer;

/// Endpoint, region, and credential settings
pub mod client;

/// Argument parsing and logging setup for the binaries
pub mod cli;

// Re-export main types for convenience
pub use schema::TableSchema;
pub use store::{DynamoStore, Item, MemoryStore, TableStore};
pub use transfer::{
    AssumeYes, BatchWriter, CopyOptions, CopySummary, ImportOptions, ImportSummary, Importer,
    MAX_BATCH_SIZE, Scanner, TableCopier, WriteConfig,
};
