/// Table Copy Tests
///
/// End-to-end copies between in-memory stores: schema transfer, batching,
/// existing destinations, validation, and source deletion.
use dynamo_transfer::schema::{AttributeType, TableSchema, fetch_schema};
use dynamo_transfer::transfer::{AssumeYes, Confirm, CopyStage, ExistingTable, TableCopier};

mod helpers;
use helpers::*;

const DEST: &str = "tests_orders_copy";

/// Always answers no
#[derive(Debug)]
struct Decline;

impl Confirm for Decline {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

#[tokio::test(start_paused = true)]
async fn test_copy_creates_destination_and_batches_items() {
    let store = seeded_orders(3);

    let copier = TableCopier::new(
        &store,
        &store,
        fast_copy_options(TestOrder::TABLE, DEST, 2),
        Box::new(AssumeYes),
    )
    .unwrap();
    let summary = copier.run().await.unwrap();

    assert!(summary.created_destination);
    assert_eq!(summary.items_read, 3);
    assert_eq!(summary.write.written, 3);
    assert_eq!(store.batch_sizes(DEST), vec![2, 1]);

    assert_eq!(
        fetch_schema(&store, DEST).await.unwrap(),
        TestOrder::schema()
    );

    let mut copied: Vec<TestOrder> = typed_items(&store, DEST);
    let mut original: Vec<TestOrder> = typed_items(&store, TestOrder::TABLE);
    copied.sort_by_key(|order| order.order_id);
    original.sort_by_key(|order| order.order_id);
    assert_eq!(copied, original);

    assert_eq!(copier.progress().snapshot().items_written, 3);
}

#[tokio::test(start_paused = true)]
async fn test_copy_across_stores_with_small_pages() {
    let source = seeded_orders(57);
    let dest = MemoryStore::new();

    let mut options = fast_copy_options(TestOrder::TABLE, DEST, 25);
    options.page_size = 10;

    let summary = TableCopier::new(&source, &dest, options, Box::new(AssumeYes))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.items_read, 57);
    assert_eq!(dest.item_count(DEST), 57);
    assert_eq!(dest.batch_sizes(DEST), vec![25, 25, 7]);
}

#[tokio::test(start_paused = true)]
async fn test_throttled_scan_page_is_retried() {
    let source = seeded_orders(30);
    source.throttle_scans_after(1, 2);
    let dest = MemoryStore::new();

    let mut options = fast_copy_options(TestOrder::TABLE, DEST, 25);
    options.page_size = 10;

    let summary = TableCopier::new(&source, &dest, options, Box::new(AssumeYes))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.items_read, 30);
    assert_eq!(summary.write.written, 30);
    assert_eq!(dest.item_count(DEST), 30);
}

#[tokio::test(start_paused = true)]
async fn test_scan_throttled_past_retry_budget_is_fatal() {
    let source = seeded_orders(30);
    source.throttle_scans_after(1, 100);
    let dest = MemoryStore::new();

    let mut options = fast_copy_options(TestOrder::TABLE, DEST, 25);
    options.page_size = 10;

    let err = TableCopier::new(&source, &dest, options, Box::new(AssumeYes))
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert!(err.is_throttled());
    // Items from the page read before the throttling are still written
    assert_eq!(dest.item_count(DEST), 10);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_batch_size_aborts_before_any_work() {
    let source = seeded_orders(3);
    let dest = MemoryStore::new();

    let err = TableCopier::new(
        &source,
        &dest,
        fast_copy_options(TestOrder::TABLE, DEST, 26),
        Box::new(AssumeYes),
    )
    .unwrap_err();

    assert!(matches!(err, Error::InvalidBatchSize(26)));
    assert!(dest.list_tables().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_source_is_fatal() {
    let source = MemoryStore::new();
    let dest = MemoryStore::new();

    let err = TableCopier::new(
        &source,
        &dest,
        fast_copy_options("missing", DEST, 25),
        Box::new(AssumeYes),
    )
    .unwrap()
    .run()
    .await
    .unwrap_err();

    assert!(matches!(err, Error::SchemaFetch { .. }));
    assert!(err.is_fatal());
    assert!(!dest.table_exists(DEST).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_overwrite_replaces_destination() {
    let source = seeded_orders(4);
    let dest = MemoryStore::new().with_table(DEST, TestOrder::schema());
    dest.insert_items(DEST, [TestOrder::new("stale", 99).item()]);

    let mut options = fast_copy_options(TestOrder::TABLE, DEST, 25);
    options.overwrite = true;

    let summary = TableCopier::new(&source, &dest, options, Box::new(AssumeYes))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(summary.created_destination);
    assert_eq!(dest.item_count(DEST), 4);
    assert!(
        typed_items::<TestOrder>(&dest, DEST)
            .iter()
            .all(|order| order.customer != "stale")
    );
}

#[tokio::test(start_paused = true)]
async fn test_existing_destination_with_matching_keys_is_reused() {
    let source = seeded_orders(4);
    let dest_schema = TableSchema::new("customer", AttributeType::String)
        .with_sort_key("order_id", AttributeType::Number);
    let dest = MemoryStore::new().with_table(DEST, dest_schema);
    dest.insert_items(DEST, [TestOrder::new("kept", 99).item()]);

    let summary = TableCopier::new(
        &source,
        &dest,
        fast_copy_options(TestOrder::TABLE, DEST, 25),
        Box::new(AssumeYes),
    )
    .unwrap()
    .run()
    .await
    .unwrap();

    assert!(!summary.created_destination);
    assert_eq!(dest.item_count(DEST), 5);
}

#[tokio::test(start_paused = true)]
async fn test_schema_mismatch_aborts_before_writing() {
    let source = seeded_orders(4);
    let dest = MemoryStore::new().with_table(DEST, TestProduct::schema());

    let err = TableCopier::new(
        &source,
        &dest,
        fast_copy_options(TestOrder::TABLE, DEST, 25),
        Box::new(AssumeYes),
    )
    .unwrap()
    .run()
    .await
    .unwrap_err();

    assert!(matches!(err, Error::SchemaMismatch { .. }));
    assert!(dest.batch_sizes(DEST).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_skip_schema_check_writes_anyway() {
    let source = seeded_orders(2);
    let dest_schema = TableSchema::new("customer", AttributeType::String)
        .with_sort_key("order_id", AttributeType::String);
    let dest = MemoryStore::new().with_table(DEST, dest_schema);

    let mut options = fast_copy_options(TestOrder::TABLE, DEST, 25);
    options.existing = ExistingTable::SkipSchemaCheck;

    let summary = TableCopier::new(&source, &dest, options, Box::new(AssumeYes))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.write.written, 2);
}

#[tokio::test(start_paused = true)]
async fn test_validation_mismatch_is_advisory() {
    let source = seeded_orders(10);
    let dest = MemoryStore::new().with_table(DEST, TestOrder::schema());
    source.set_reported_count(TestOrder::TABLE, 10);
    dest.set_reported_count(DEST, 8);

    let mut options = fast_copy_options(TestOrder::TABLE, DEST, 25);
    options.validate = true;

    let summary = TableCopier::new(&source, &dest, options, Box::new(AssumeYes))
        .unwrap()
        .run()
        .await
        .unwrap();

    let report = summary.validation.unwrap();
    assert_eq!(report.source_count, 10);
    assert_eq!(report.dest_count, 8);
    assert!(!report.is_match());
    assert_eq!(dest.item_count(DEST), 10);
}

#[tokio::test(start_paused = true)]
async fn test_item_failures_do_not_abort_copy() {
    let source = seeded_orders(6);
    let dest = MemoryStore::new();
    dest.fail_next_batches(1);

    let summary = TableCopier::new(
        &source,
        &dest,
        fast_copy_options(TestOrder::TABLE, DEST, 3),
        Box::new(AssumeYes),
    )
    .unwrap()
    .run()
    .await
    .unwrap();

    assert_eq!(summary.items_read, 6);
    assert_eq!(summary.write.failed, 3);
    assert_eq!(summary.write.written, 3);
}

#[tokio::test(start_paused = true)]
async fn test_delete_source_after_confirmation() {
    let source = seeded_orders(3);
    let dest = MemoryStore::new();

    let mut options = fast_copy_options(TestOrder::TABLE, DEST, 25);
    options.delete_source = true;

    let summary = TableCopier::new(&source, &dest, options, Box::new(AssumeYes))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(summary.source_deleted);
    assert!(!source.table_exists(TestOrder::TABLE).await.unwrap());
    assert_eq!(dest.item_count(DEST), 3);
}

#[tokio::test(start_paused = true)]
async fn test_declined_confirmation_keeps_source() {
    let source = seeded_orders(3);
    let dest = MemoryStore::new();

    let mut options = fast_copy_options(TestOrder::TABLE, DEST, 25);
    options.delete_source = true;

    let summary = TableCopier::new(&source, &dest, options, Box::new(Decline))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(!summary.source_deleted);
    assert!(source.table_exists(TestOrder::TABLE).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_stuck_source_deletion_is_fatal() {
    let source = seeded_orders(1);
    source.keep_deleted_tables();
    let dest = MemoryStore::new();

    let mut options = fast_copy_options(TestOrder::TABLE, DEST, 25);
    options.delete_source = true;

    let err = TableCopier::new(&source, &dest, options, Box::new(AssumeYes))
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DeleteTimeout { .. }));
    assert_eq!(dest.item_count(DEST), 1);
}

#[test]
fn test_stage_order() {
    let stages = [
        CopyStage::CheckDestination,
        CopyStage::DeleteExisting,
        CopyStage::CreateDestination,
        CopyStage::CopyData,
        CopyStage::Validate,
        CopyStage::DeleteSource,
        CopyStage::Done,
    ];
    let names: Vec<String> = stages.iter().map(ToString::to_string).collect();
    assert_eq!(names.first().map(String::as_str), Some("check-destination"));
    assert_eq!(names.last().map(String::as_str), Some("done"));
}
