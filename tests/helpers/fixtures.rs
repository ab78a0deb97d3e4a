//! Common test fixtures and data structures
//!
//! Typed records turned into items through `serde_dynamo`, plus the table
//! schemas they belong to.
#![allow(dead_code)]

use super::{Deserialize, Serialize};
use dynamo_transfer::Item;
use dynamo_transfer::schema::{
    AttributeType, BillingMode, IndexScope, KeyElement, KeyRole, Projection, SecondaryIndex,
    TableSchema, Throughput,
};

/// Order keyed by customer and order number
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct TestOrder {
    pub customer: String,
    pub order_id: u32,
    pub status: String,
    pub total: f64,
    pub lines: Vec<String>,
}

impl TestOrder {
    pub const TABLE: &'static str = "tests_orders";

    pub fn new(customer: &str, order_id: u32) -> Self {
        Self {
            customer: customer.to_string(),
            order_id,
            status: if order_id % 2 == 0 { "open" } else { "shipped" }.to_string(),
            total: f64::from(order_id) * 1.5,
            lines: vec![format!("sku-{order_id}")],
        }
    }

    /// Provisioned table with a sort key and a status index
    pub fn schema() -> TableSchema {
        TableSchema::new("customer", AttributeType::String)
            .with_sort_key("order_id", AttributeType::Number)
            .with_billing_mode(BillingMode::Provisioned(Throughput {
                read_capacity: 5,
                write_capacity: 5,
            }))
            .with_index(SecondaryIndex {
                name: "by-status".into(),
                scope: IndexScope::Global,
                key_schema: vec![KeyElement {
                    attribute: "status".into(),
                    role: KeyRole::Partition,
                }],
                projection: Projection::All,
                throughput: None,
            })
    }

    pub fn item(&self) -> Item {
        serde_dynamo::to_item(self).unwrap()
    }
}

/// Product keyed by SKU only
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct TestProduct {
    pub id: String,
    pub name: String,
    pub price: u64,
}

impl TestProduct {
    pub const TABLE: &'static str = "tests_products";

    pub fn schema() -> TableSchema {
        TableSchema::new("id", AttributeType::String)
    }
}
