//! Table schema model and schema transfer
//!
//! [`fetch_schema`] reads everything needed to re-create a table,
//! [`create_table`] creates the copy and blocks until it is active, and
//! [`delete_table`] removes a table and blocks until it is gone. Both waits are
//! bounded by a [`PollConfig`].

use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::store::{TableStatus, TableStore};

/// Role of a key attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum KeyRole {
    /// Partition (hash) key
    Partition,
    /// Sort (range) key
    Sort,
}

/// One element of a key schema
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyElement {
    /// Attribute name
    pub attribute: String,
    /// Partition or sort
    pub role: KeyRole,
}

/// Scalar type of a key attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AttributeType {
    /// `S`
    String,
    /// `N`
    Number,
    /// `B`
    Binary,
}

/// Type declaration of an attribute used in a key schema
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttributeDefinition {
    /// Attribute name
    pub name: String,
    /// Scalar type
    pub kind: AttributeType,
}

/// Provisioned read and write capacity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Throughput {
    /// Read capacity units
    pub read_capacity: i64,
    /// Write capacity units
    pub write_capacity: i64,
}

/// Capacity model of a table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BillingMode {
    /// Fixed provisioned throughput
    Provisioned(Throughput),
    /// Pay per request
    OnDemand,
}

/// Whether an index is global or local
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum IndexScope {
    /// Global secondary index
    Global,
    /// Local secondary index
    Local,
}

/// Attributes copied into a secondary index
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Projection {
    /// Every attribute
    All,
    /// Only table and index keys
    KeysOnly,
    /// Keys plus the listed attributes
    Include(Vec<String>),
}

/// Secondary index descriptor
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SecondaryIndex {
    /// Index name
    pub name: String,
    /// Global or local
    pub scope: IndexScope,
    /// Index key schema
    pub key_schema: Vec<KeyElement>,
    /// Projected attributes
    pub projection: Projection,
    /// Provisioned capacity of a global index on a provisioned table
    pub throughput: Option<Throughput>,
}

/// Everything needed to create an equivalent table
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    /// Ordered key elements, partition key first
    pub key_schema: Vec<KeyElement>,
    /// Types of the key attributes of the table and its indexes
    pub attributes: Vec<AttributeDefinition>,
    /// Capacity model
    pub billing_mode: BillingMode,
    /// Global and local secondary indexes
    pub indexes: Vec<SecondaryIndex>,
}

impl TableSchema {
    /// On-demand schema with a single partition key
    ///
    /// # Example
    ///
    /// ```
    /// use dynamo_transfer::schema::{AttributeType, TableSchema};
    ///
    /// let schema = TableSchema::new("id", AttributeType::String)
    ///     .with_sort_key("created_at", AttributeType::Number);
    /// assert_eq!(schema.partition_key(), Some("id"));
    /// assert_eq!(schema.sort_key(), Some("created_at"));
    /// ```
    pub fn new(partition_key: impl Into<String>, kind: AttributeType) -> Self {
        let name = partition_key.into();
        Self {
            key_schema: vec![KeyElement {
                attribute: name.clone(),
                role: KeyRole::Partition,
            }],
            attributes: vec![AttributeDefinition { name, kind }],
            billing_mode: BillingMode::OnDemand,
            indexes: Vec::new(),
        }
    }

    /// Add a sort key
    pub fn with_sort_key(mut self, sort_key: impl Into<String>, kind: AttributeType) -> Self {
        let name = sort_key.into();
        self.key_schema.push(KeyElement {
            attribute: name.clone(),
            role: KeyRole::Sort,
        });
        self.define(name, kind);
        self
    }

    /// Replace the billing mode
    pub fn with_billing_mode(mut self, billing_mode: BillingMode) -> Self {
        self.billing_mode = billing_mode;
        self
    }

    /// Add a secondary index, declaring its key attributes as strings when
    /// they are not declared yet
    pub fn with_index(mut self, index: SecondaryIndex) -> Self {
        for element in &index.key_schema {
            if self.attribute_type(&element.attribute).is_none() {
                self.define(element.attribute.clone(), AttributeType::String);
            }
        }
        self.indexes.push(index);
        self
    }

    fn define(&mut self, name: String, kind: AttributeType) {
        if self.attribute_type(&name).is_none() {
            self.attributes.push(AttributeDefinition { name, kind });
        }
    }

    /// Partition key attribute name
    pub fn partition_key(&self) -> Option<&str> {
        self.key_for(KeyRole::Partition)
    }

    /// Sort key attribute name
    pub fn sort_key(&self) -> Option<&str> {
        self.key_for(KeyRole::Sort)
    }

    fn key_for(&self, role: KeyRole) -> Option<&str> {
        self.key_schema
            .iter()
            .find(|element| element.role == role)
            .map(|element| element.attribute.as_str())
    }

    /// Declared type of an attribute
    pub fn attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.attributes
            .iter()
            .find(|definition| definition.name == name)
            .map(|definition| definition.kind)
    }

    /// Whether both schemas key items the same way
    ///
    /// Compares key attribute names, roles, and declared types. Billing mode
    /// and indexes do not affect whether copied items land correctly.
    pub fn key_schema_matches(&self, other: &TableSchema) -> bool {
        self.key_schema == other.key_schema
            && self.key_schema.iter().all(|element| {
                self.attribute_type(&element.attribute) == other.attribute_type(&element.attribute)
            })
    }
}

/// Bounded polling for table state changes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two status checks
    pub interval: Duration,
    /// Number of status checks before giving up
    pub max_attempts: u32,
}

impl PollConfig {
    /// Waiting for a created table to become active: 1s x 30
    pub const CREATE: PollConfig = PollConfig {
        interval: Duration::from_secs(1),
        max_attempts: 30,
    };

    /// Waiting for a deleted table to disappear: 20s x 25
    pub const DELETE: PollConfig = PollConfig {
        interval: Duration::from_secs(20),
        max_attempts: 25,
    };
}

/// Read the schema of `table`
///
/// Any failure is wrapped in [`Error::SchemaFetch`].
pub async fn fetch_schema<S>(store: &S, table: &str) -> Result<TableSchema, Error>
where
    S: TableStore + ?Sized,
{
    let description = store
        .describe_table(table)
        .await
        .map_err(|e| Error::SchemaFetch {
            table: table.to_string(),
            source: Box::new(e),
        })?;

    if let Ok(json) = serde_json::to_string(&description.schema) {
        debug!(table, schema = %json, "Fetched table schema");
    }

    Ok(description.schema)
}

/// Create `table` with `schema` and wait until it is active
///
/// A rejected creation is [`Error::TableCreate`]; exhausting `poll` is
/// [`Error::TableNotReady`].
pub async fn create_table<S>(
    store: &S,
    table: &str,
    schema: &TableSchema,
    poll: PollConfig,
) -> Result<(), Error>
where
    S: TableStore + ?Sized,
{
    info!(table, "Creating table");

    store
        .create_table(table, schema)
        .await
        .map_err(|e| Error::TableCreate {
            table: table.to_string(),
            source: Box::new(e),
        })?;

    wait_until_active(store, table, poll).await?;

    info!(table, "Table created and active");
    Ok(())
}

/// Poll until `table` reports [`TableStatus::Active`]
pub async fn wait_until_active<S>(store: &S, table: &str, poll: PollConfig) -> Result<(), Error>
where
    S: TableStore + ?Sized,
{
    for attempt in 1..=poll.max_attempts {
        match store.describe_table(table).await {
            Ok(description) if description.status == TableStatus::Active => return Ok(()),
            Ok(description) => {
                debug!(table, attempt, status = ?description.status, "Waiting for table");
            }
            // Creation may not be visible yet
            Err(e) if e.is_not_found() => debug!(table, attempt, "Table not visible yet"),
            Err(e) => {
                return Err(Error::TableCreate {
                    table: table.to_string(),
                    source: Box::new(e),
                });
            }
        }

        if attempt < poll.max_attempts {
            sleep(poll.interval).await;
        }
    }

    Err(Error::TableNotReady {
        table: table.to_string(),
        attempts: poll.max_attempts,
    })
}

/// Delete `table` and wait until it no longer exists
pub async fn delete_table<S>(store: &S, table: &str, poll: PollConfig) -> Result<(), Error>
where
    S: TableStore + ?Sized,
{
    warn!(table, "Deleting table");
    store.delete_table(table).await?;
    wait_until_deleted(store, table, poll).await
}

/// Poll until describing `table` reports it missing
pub async fn wait_until_deleted<S>(store: &S, table: &str, poll: PollConfig) -> Result<(), Error>
where
    S: TableStore + ?Sized,
{
    for attempt in 1..=poll.max_attempts {
        match store.describe_table(table).await {
            Err(e) if e.is_not_found() => {
                info!(table, "Table deleted");
                return Ok(());
            }
            Err(e) => return Err(e),
            Ok(description) => {
                debug!(table, attempt, status = ?description.status, "Waiting for deletion");
            }
        }

        if attempt < poll.max_attempts {
            sleep(poll.interval).await;
        }
    }

    Err(Error::DeleteTimeout {
        table: table.to_string(),
        attempts: poll.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const FAST: PollConfig = PollConfig {
        interval: Duration::from_millis(10),
        max_attempts: 5,
    };

    fn orders_schema() -> TableSchema {
        TableSchema::new("customer", AttributeType::String)
            .with_sort_key("order_id", AttributeType::Number)
            .with_billing_mode(BillingMode::Provisioned(Throughput {
                read_capacity: 5,
                write_capacity: 7,
            }))
            .with_index(SecondaryIndex {
                name: "by-status".into(),
                scope: IndexScope::Global,
                key_schema: vec![KeyElement {
                    attribute: "status".into(),
                    role: KeyRole::Partition,
                }],
                projection: Projection::KeysOnly,
                throughput: None,
            })
    }

    #[test]
    fn test_index_keys_are_declared() {
        let schema = orders_schema();
        assert_eq!(schema.attribute_type("status"), Some(AttributeType::String));
        assert_eq!(schema.attributes.len(), 3);
    }

    #[test]
    fn test_key_schema_matches_ignores_billing_and_indexes() {
        let a = orders_schema();
        let b = TableSchema::new("customer", AttributeType::String)
            .with_sort_key("order_id", AttributeType::Number);
        assert!(a.key_schema_matches(&b));

        let c = TableSchema::new("customer", AttributeType::String)
            .with_sort_key("order_id", AttributeType::String);
        assert!(!a.key_schema_matches(&c));

        let d = TableSchema::new("customer", AttributeType::String);
        assert!(!a.key_schema_matches(&d));
    }

    #[tokio::test]
    async fn test_fetch_schema_of_missing_table_fails() {
        let store = MemoryStore::new();
        let err = fetch_schema(&store, "missing").await.unwrap_err();
        assert!(matches!(err, Error::SchemaFetch { .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_table_transfers_schema() {
        let store = MemoryStore::new();
        let schema = orders_schema();

        create_table(&store, "orders_copy", &schema, FAST)
            .await
            .unwrap();

        assert_eq!(fetch_schema(&store, "orders_copy").await.unwrap(), schema);
    }

    #[tokio::test]
    async fn test_create_existing_table_is_rejected() {
        let store = MemoryStore::new().with_table("orders", orders_schema());
        let err = create_table(&store, "orders", &orders_schema(), FAST)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TableCreate { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_for_activation() {
        let store = MemoryStore::new();
        store.delay_activation(3);

        create_table(&store, "slow", &orders_schema(), FAST)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_times_out_when_never_active() {
        let store = MemoryStore::new();
        store.delay_activation(100);

        let err = create_table(&store, "stuck", &orders_schema(), FAST)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::TableNotReady { attempts: 5, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_table_waits_until_gone() {
        let store = MemoryStore::new().with_table("old", orders_schema());

        delete_table(&store, "old", FAST).await.unwrap();
        assert!(!store.table_exists("old").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_table_times_out() {
        let store = MemoryStore::new().with_table("sticky", orders_schema());
        store.keep_deleted_tables();

        let err = delete_table(&store, "sticky", FAST).await.unwrap_err();
        assert!(matches!(err, Error::DeleteTimeout { .. }));
    }
}
