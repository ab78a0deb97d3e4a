/// Test helpers and fixtures for transfer integration tests
///
/// This module provides common test utilities, fixtures, and helper functions
/// used across all integration tests.
pub mod fixtures;

pub use dynamo_transfer::schema::PollConfig;
pub use dynamo_transfer::store::MemoryStore;
pub use dynamo_transfer::transfer::{
    CopyOptions, ImportOptions, RetryConfig, Throttle, WriteConfig,
};
pub use serde::{Deserialize, Serialize};

#[allow(unused_imports)]
pub use dynamo_transfer::store::TableStore;
#[allow(unused_imports)]
pub use dynamo_transfer::{Error, Item};

// Re-export common fixtures
pub use fixtures::TestOrder;

#[allow(unused_imports)]
pub use fixtures::TestProduct;

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Polling fast enough for tests
pub const FAST_POLL: PollConfig = PollConfig {
    interval: Duration::from_millis(10),
    max_attempts: 5,
};

/// Generate a unique test prefix for isolation
///
/// Returns a timestamp-based prefix to avoid test data conflicts
#[allow(dead_code)]
pub fn unique_test_prefix(name: &str) -> String {
    format!(
        "{}_{}_",
        name,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis()
    )
}

/// Writer settings without pacing and with short backoff
#[allow(dead_code)]
pub fn fast_write_config(batch_size: usize) -> WriteConfig {
    WriteConfig {
        batch_size,
        retry: RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(16),
        },
        throttle: Throttle::DISABLED,
        concurrency: 1,
    }
}

/// Copy settings with fast polling
#[allow(dead_code)]
pub fn fast_copy_options(source: &str, dest: &str, batch_size: usize) -> CopyOptions {
    CopyOptions {
        write: fast_write_config(batch_size),
        create_poll: FAST_POLL,
        delete_poll: FAST_POLL,
        ..CopyOptions::new(source, dest)
    }
}

/// Import settings with a fast writer
#[allow(dead_code)]
pub fn fast_import_options(table: &str, batch_size: usize) -> ImportOptions {
    ImportOptions {
        write: fast_write_config(batch_size),
        ..ImportOptions::new(table)
    }
}

/// Store holding the orders table with `count` orders
#[allow(dead_code)]
pub fn seeded_orders(count: u32) -> MemoryStore {
    let store = MemoryStore::new().with_table(TestOrder::TABLE, TestOrder::schema());
    store.insert_items(
        TestOrder::TABLE,
        (0..count).map(|n| TestOrder::new(&format!("customer-{}", n % 3), n).item()),
    );
    store
}

/// Write `lines` to `dir/name`, one per line
#[allow(dead_code)]
pub async fn write_lines(dir: &Path, name: &str, lines: &[&str]) {
    let mut contents = lines.join("\n");
    contents.push('\n');
    tokio::fs::write(dir.join(name), contents).await.unwrap();
}

/// Decode every item of a table back into a typed record
#[allow(dead_code)]
pub fn typed_items<T>(store: &MemoryStore, table: &str) -> Vec<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_dynamo::from_items(store.items(table)).unwrap()
}
