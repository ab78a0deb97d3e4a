//! Remote table store contract
//!
//! The engine only needs six operations from a store: `ListTables`,
//! `DescribeTable`, `CreateTable`, `DeleteTable`, `Scan`, and
//! `BatchWriteItem`. [`TableStore`] captures exactly that surface so the
//! orchestrators run unchanged against DynamoDB ([`DynamoStore`]) or the
//! in-process [`MemoryStore`].

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;
use std::fmt;

use crate::error::Error;
use crate::schema::TableSchema;

mod dynamo;
mod memory;

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

/// A single item: attribute name to typed value
pub type Item = HashMap<String, AttributeValue>;

/// Opaque scan cursor pointing after the last item of a page
#[derive(Clone, Debug, PartialEq)]
pub struct ContinuationToken(Item);

impl ContinuationToken {
    /// Wrap the key of the last evaluated item
    pub fn from_key(key: Item) -> Self {
        Self(key)
    }

    /// Borrow the wrapped key
    pub fn key(&self) -> &Item {
        &self.0
    }

    /// Unwrap into the key the store expects as exclusive start key
    pub fn into_key(self) -> Item {
        self.0
    }
}

/// One page of a table scan
#[must_use = "scan pages carry the items read from the source table"]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanPage {
    /// Items in store order
    pub items: Vec<Item>,
    /// Where the next page starts, `None` on the final page
    pub next: Option<ContinuationToken>,
}

impl ScanPage {
    /// Whether no page follows this one
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

/// Lifecycle state of a table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableStatus {
    /// Being created, not writable yet
    Creating,
    /// Ready for reads and writes
    Active,
    /// Schema or throughput change in progress
    Updating,
    /// Being deleted
    Deleting,
    /// Any state this crate does not act on
    Other,
}

/// Result of describing a table
#[derive(Clone, Debug, PartialEq)]
pub struct TableDescription {
    /// Table name
    pub name: String,
    /// Key schema, attribute definitions, billing mode, and indexes
    pub schema: TableSchema,
    /// Current lifecycle state
    pub status: TableStatus,
    /// Approximate number of items, refreshed periodically by the store
    pub item_count: u64,
}

/// Operations the transfer engine consumes from a table store
#[async_trait]
pub trait TableStore: fmt::Debug + Send + Sync {
    /// Names of all tables
    async fn list_tables(&self) -> Result<Vec<String>, Error>;

    /// Describe one table; a missing table yields a `NotFound` error
    async fn describe_table(&self, table: &str) -> Result<TableDescription, Error>;

    /// Issue table creation; does not wait for the table to become active
    async fn create_table(&self, table: &str, schema: &TableSchema) -> Result<(), Error>;

    /// Issue table deletion; does not wait for the table to disappear
    async fn delete_table(&self, table: &str) -> Result<(), Error>;

    /// Read one page of at most `limit` items, starting after `start`
    async fn scan(
        &self,
        table: &str,
        limit: usize,
        start: Option<ContinuationToken>,
    ) -> Result<ScanPage, Error>;

    /// Put a batch of items, returning the items the store did not process
    async fn batch_write(&self, table: &str, items: &[Item]) -> Result<Vec<Item>, Error>;

    /// Whether `table` appears in the table listing
    async fn table_exists(&self, table: &str) -> Result<bool, Error> {
        Ok(self.list_tables().await?.iter().any(|name| name == table))
    }
}
