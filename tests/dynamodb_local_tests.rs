/// DynamoDB Local Tests
///
/// Runs the transfer engine against DynamoDB Local on `localhost:8000`.
/// Start it with `docker run -p 8000:8000 amazon/dynamodb-local` and run
/// `cargo test -- --ignored`.
use dynamo_transfer::client::ClientConfig;
use dynamo_transfer::schema::{self, fetch_schema};
use dynamo_transfer::store::DynamoStore;
use dynamo_transfer::transfer::{AssumeYes, Importer, Scanner, TableCopier};
use serial_test::serial;

mod helpers;
use helpers::*;

async fn local_store() -> DynamoStore {
    DynamoStore::connect(&ClientConfig::default()).await
}

async fn drop_table(store: &DynamoStore, table: &str) {
    if store.table_exists(table).await.unwrap() {
        schema::delete_table(store, table, FAST_POLL).await.unwrap();
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires DynamoDB Local"]
async fn test_schema_round_trip() {
    let store = local_store().await;
    let table = format!("{}orders", unique_test_prefix("schema"));

    schema::create_table(&store, &table, &TestOrder::schema(), PollConfig::CREATE)
        .await
        .unwrap();

    let fetched = fetch_schema(&store, &table).await.unwrap();
    assert!(fetched.key_schema_matches(&TestOrder::schema()));
    assert_eq!(fetched.billing_mode, TestOrder::schema().billing_mode);
    assert_eq!(fetched.indexes.len(), 1);

    drop_table(&store, &table).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires DynamoDB Local"]
async fn test_copy_between_tables() {
    let store = local_store().await;
    let prefix = unique_test_prefix("copy");
    let source = format!("{prefix}source");
    let dest = format!("{prefix}dest");

    schema::create_table(&store, &source, &TestOrder::schema(), PollConfig::CREATE)
        .await
        .unwrap();
    let mut writer = dynamo_transfer::BatchWriter::new(&store, &source, fast_write_config(25))
        .unwrap();
    for n in 0..60 {
        writer.put(TestOrder::new("local", n).item()).await;
    }
    assert_eq!(writer.finish().await.written, 60);

    let mut options = fast_copy_options(&source, &dest, 25);
    options.create_poll = PollConfig::CREATE;
    options.page_size = 20;
    let summary = TableCopier::new(&store, &store, options, Box::new(AssumeYes))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.items_read, 60);
    assert_eq!(summary.write.written, 60);

    let mut scanner = Scanner::new(&store, &dest, 100);
    let mut copied = 0;
    while let Some(page) = scanner.next_page().await.unwrap() {
        copied += page.items.len();
    }
    assert_eq!(copied, 60);

    drop_table(&store, &source).await;
    drop_table(&store, &dest).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires DynamoDB Local"]
async fn test_import_directory() {
    let store = local_store().await;
    let table = format!("{}products", unique_test_prefix("import"));
    schema::create_table(&store, &table, &TestProduct::schema(), PollConfig::CREATE)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    write_lines(
        dir.path(),
        "products.json",
        &[
            r#"{"id": "p-1", "name": "one", "price": 100}"#,
            r#"{"name": "no id", "price": 5}"#,
            "{broken",
        ],
    )
    .await;

    let summary = Importer::new(&store, fast_import_options(&table, 25))
        .unwrap()
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.items, 2);
    assert_eq!(summary.errors, 1);

    drop_table(&store, &table).await;
}
