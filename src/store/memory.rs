use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Bound;

use super::{ContinuationToken, Item, ScanPage, TableDescription, TableStatus, TableStore};
use crate::encode::to_json;
use crate::error::{Error, ErrorKind};
use crate::schema::TableSchema;

/// In-process table store
///
/// Keeps items ordered by their rendered primary key, which makes scan order
/// deterministic. Fault injection hooks simulate the failure modes the
/// engine has to survive: unprocessed items, throttled scans, throttled or
/// rejected batch requests, slow table activation, and deletions that never
/// complete.
///
/// # Example
///
/// ```
/// use dynamo_transfer::schema::{AttributeType, TableSchema};
/// use dynamo_transfer::store::MemoryStore;
///
/// let store = MemoryStore::new().with_table("users", TableSchema::new("id", AttributeType::String));
/// store.reject_next_batches(2);
/// assert_eq!(store.item_count("users"), 0);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, MemoryTable>,
    faults: Faults,
    batch_log: Vec<(String, usize)>,
}

#[derive(Debug, Default)]
struct Faults {
    reject_batches: usize,
    throttle_batches: usize,
    fail_batches: usize,
    scans_before_throttle: usize,
    throttle_scans: usize,
    activation_polls: u32,
    keep_deleted: bool,
}

#[derive(Debug)]
struct MemoryTable {
    schema: TableSchema,
    items: BTreeMap<String, Item>,
    pending_polls: u32,
    deleting: bool,
    reported_count: Option<u64>,
}

impl MemoryTable {
    fn new(schema: TableSchema, pending_polls: u32) -> Self {
        Self {
            schema,
            items: BTreeMap::new(),
            pending_polls,
            deleting: false,
            reported_count: None,
        }
    }

    /// Render the primary key of `item`, `None` if a key attribute is missing
    fn key_of(&self, item: &Item) -> Option<String> {
        self.schema
            .key_schema
            .iter()
            .map(|element| item.get(&element.attribute).map(|v| to_json(v).to_string()))
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join("|"))
    }

    fn key_attributes(&self, item: &Item) -> Item {
        self.schema
            .key_schema
            .iter()
            .filter_map(|element| {
                item.get(&element.attribute)
                    .map(|v| (element.attribute.clone(), v.clone()))
            })
            .collect()
    }
}

fn not_found(table: &str) -> Error {
    Error::service(
        ErrorKind::NotFound,
        format!("Requested resource not found: Table: {table} not found"),
    )
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an active, empty table
    pub fn with_table(mut self, table: impl Into<String>, schema: TableSchema) -> Self {
        let _ = self
            .state
            .get_mut()
            .tables
            .insert(table.into(), MemoryTable::new(schema, 0));
        self
    }

    /// Insert items directly, bypassing batch limits and faults
    ///
    /// # Panics
    ///
    /// Panics if the table does not exist or an item lacks a key attribute.
    pub fn insert_items(&self, table: &str, items: impl IntoIterator<Item = Item>) {
        let mut state = self.state.lock();
        let entry = state
            .tables
            .get_mut(table)
            .unwrap_or_else(|| panic!("unknown table {table}"));

        for item in items {
            let key = entry
                .key_of(&item)
                .unwrap_or_else(|| panic!("item without key for table {table}"));
            let _ = entry.items.insert(key, item);
        }
    }

    /// All items of a table in key order
    pub fn items(&self, table: &str) -> Vec<Item> {
        self.state
            .lock()
            .tables
            .get(table)
            .map(|entry| entry.items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Exact number of items stored in a table
    pub fn item_count(&self, table: &str) -> usize {
        self.state
            .lock()
            .tables
            .get(table)
            .map_or(0, |entry| entry.items.len())
    }

    /// Size of every `BatchWriteItem` call made against `table`, in order
    ///
    /// Retries of unprocessed items are separate calls.
    pub fn batch_sizes(&self, table: &str) -> Vec<usize> {
        self.state
            .lock()
            .batch_log
            .iter()
            .filter(|(name, _)| name == table)
            .map(|(_, size)| *size)
            .collect()
    }

    /// The next `count` batch writes process nothing
    pub fn reject_next_batches(&self, count: usize) {
        self.state.lock().faults.reject_batches = count;
    }

    /// The next `count` batch writes fail with a throttling error
    pub fn throttle_next_batches(&self, count: usize) {
        self.state.lock().faults.throttle_batches = count;
    }

    /// The next `count` batch writes fail with a validation error
    pub fn fail_next_batches(&self, count: usize) {
        self.state.lock().faults.fail_batches = count;
    }

    /// After `pages` more successful scan calls, the next `count` fail with a
    /// throttling error
    pub fn throttle_scans_after(&self, pages: usize, count: usize) {
        let mut state = self.state.lock();
        state.faults.scans_before_throttle = pages;
        state.faults.throttle_scans = count;
    }

    /// Tables created from now on stay `Creating` for `polls` describe calls
    pub fn delay_activation(&self, polls: u32) {
        self.state.lock().faults.activation_polls = polls;
    }

    /// Deleted tables stay in `Deleting` state forever
    pub fn keep_deleted_tables(&self) {
        self.state.lock().faults.keep_deleted = true;
    }

    /// Report `count` as the approximate item count of `table`
    pub fn set_reported_count(&self, table: &str, count: u64) {
        if let Some(entry) = self.state.lock().tables.get_mut(table) {
            entry.reported_count = Some(count);
        }
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn list_tables(&self) -> Result<Vec<String>, Error> {
        Ok(self.state.lock().tables.keys().cloned().collect())
    }

    async fn describe_table(&self, table: &str) -> Result<TableDescription, Error> {
        let mut state = self.state.lock();
        let entry = state.tables.get_mut(table).ok_or_else(|| not_found(table))?;

        let status = if entry.deleting {
            TableStatus::Deleting
        } else if entry.pending_polls > 0 {
            entry.pending_polls -= 1;
            TableStatus::Creating
        } else {
            TableStatus::Active
        };

        Ok(TableDescription {
            name: table.to_string(),
            schema: entry.schema.clone(),
            status,
            item_count: entry
                .reported_count
                .unwrap_or(entry.items.len() as u64),
        })
    }

    async fn create_table(&self, table: &str, schema: &TableSchema) -> Result<(), Error> {
        let mut state = self.state.lock();
        if state.tables.contains_key(table) {
            return Err(Error::service(
                ErrorKind::Validation,
                format!("Table already exists: {table}"),
            ));
        }

        let polls = state.faults.activation_polls;
        let _ = state
            .tables
            .insert(table.to_string(), MemoryTable::new(schema.clone(), polls));
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> Result<(), Error> {
        let mut state = self.state.lock();
        if state.faults.keep_deleted {
            let entry = state.tables.get_mut(table).ok_or_else(|| not_found(table))?;
            entry.deleting = true;
            return Ok(());
        }

        state
            .tables
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| not_found(table))
    }

    async fn scan(
        &self,
        table: &str,
        limit: usize,
        start: Option<ContinuationToken>,
    ) -> Result<ScanPage, Error> {
        let mut state = self.state.lock();
        if state.faults.scans_before_throttle > 0 {
            state.faults.scans_before_throttle -= 1;
        } else if state.faults.throttle_scans > 0 {
            state.faults.throttle_scans -= 1;
            return Err(Error::service(
                ErrorKind::Throttled,
                "The level of configured provisioned throughput for the table was exceeded",
            ));
        }
        let entry = state.tables.get(table).ok_or_else(|| not_found(table))?;

        let lower = match start {
            Some(token) => {
                let key = entry.key_of(token.key()).ok_or_else(|| {
                    Error::service(ErrorKind::Validation, "The provided starting key is invalid")
                })?;
                Bound::Excluded(key)
            }
            None => Bound::Unbounded,
        };

        let mut remaining = entry.items.range((lower, Bound::Unbounded));
        let items: Vec<Item> = remaining
            .by_ref()
            .take(limit.max(1))
            .map(|(_, item)| item.clone())
            .collect();

        let next = match (remaining.next(), items.last()) {
            (Some(_), Some(last)) => Some(ContinuationToken::from_key(entry.key_attributes(last))),
            _ => None,
        };

        Ok(ScanPage { items, next })
    }

    async fn batch_write(&self, table: &str, items: &[Item]) -> Result<Vec<Item>, Error> {
        let mut state = self.state.lock();
        state.batch_log.push((table.to_string(), items.len()));

        if state.faults.throttle_batches > 0 {
            state.faults.throttle_batches -= 1;
            return Err(Error::service(
                ErrorKind::Throttled,
                "The level of configured provisioned throughput for the table was exceeded",
            ));
        }

        if state.faults.fail_batches > 0 {
            state.faults.fail_batches -= 1;
            return Err(Error::service(
                ErrorKind::Validation,
                "One or more parameter values were invalid",
            ));
        }

        if state.faults.reject_batches > 0 {
            state.faults.reject_batches -= 1;
            return Ok(items.to_vec());
        }

        let entry = state.tables.get_mut(table).ok_or_else(|| not_found(table))?;

        let keyed = items
            .iter()
            .map(|item| entry.key_of(item).map(|key| (key, item.clone())))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                Error::service(
                    ErrorKind::Validation,
                    "The provided key element does not match the schema",
                )
            })?;

        entry.items.extend(keyed);
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeType;
    use aws_sdk_dynamodb::types::AttributeValue;

    fn item(id: &str) -> Item {
        Item::from([("id".to_string(), AttributeValue::S(id.to_string()))])
    }

    fn store() -> MemoryStore {
        MemoryStore::new().with_table("t", TableSchema::new("id", AttributeType::String))
    }

    #[tokio::test]
    async fn test_scan_pages_in_key_order() {
        let store = store();
        store.insert_items("t", ["c", "a", "b"].map(item));

        let first = store.scan("t", 2, None).await.unwrap();
        assert_eq!(first.items, vec![item("a"), item("b")]);
        assert_eq!(first.next.as_ref().map(ContinuationToken::key), Some(&item("b")));

        let second = store.scan("t", 2, first.next).await.unwrap();
        assert_eq!(second.items, vec![item("c")]);
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn test_batch_write_requires_key() {
        let store = store();
        let keyless = Item::from([("name".to_string(), AttributeValue::S("x".into()))]);

        let err = store.batch_write("t", &[keyless]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.item_count("t"), 0);
    }

    #[tokio::test]
    async fn test_rejected_batches_are_returned_unprocessed() {
        let store = store();
        store.reject_next_batches(1);

        let unprocessed = store.batch_write("t", &[item("a")]).await.unwrap();
        assert_eq!(unprocessed, vec![item("a")]);

        let unprocessed = store.batch_write("t", &[item("a")]).await.unwrap();
        assert!(unprocessed.is_empty());
        assert_eq!(store.batch_sizes("t"), vec![1, 1]);
    }

    #[tokio::test]
    async fn test_reported_count_overrides_item_count() {
        let store = store();
        store.insert_items("t", [item("a")]);
        store.set_reported_count("t", 10);

        assert_eq!(store.describe_table("t").await.unwrap().item_count, 10);
    }
}
