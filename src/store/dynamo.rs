use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_dynamodb::types::{
    self as sdk, BillingMode as SdkBillingMode, KeyType, ProjectionType, PutRequest,
    ScalarAttributeType, WriteRequest,
};
use aws_smithy_types_convert::stream::PaginationStreamExt;
use futures_util::TryStreamExt;

use super::{ContinuationToken, Item, ScanPage, TableDescription, TableStatus, TableStore};
use crate::client::ClientConfig;
use crate::error::{Error, ErrorKind};
use crate::schema::{
    AttributeDefinition, AttributeType, BillingMode, IndexScope, KeyElement, KeyRole, Projection,
    SecondaryIndex, TableSchema, Throughput,
};

/// Table store backed by the DynamoDB API
///
/// Works against AWS as well as DynamoDB Local and other emulators reachable
/// through a custom endpoint.
#[derive(Clone, Debug)]
pub struct DynamoStore {
    client: DynamoDbClient,
}

impl DynamoStore {
    /// Wrap an existing SDK client
    pub fn new(client: DynamoDbClient) -> Self {
        Self { client }
    }

    /// Build a client from `config`
    pub async fn connect(config: &ClientConfig) -> Self {
        Self::new(config.connect().await)
    }

    /// Underlying SDK client
    pub fn client(&self) -> &DynamoDbClient {
        &self.client
    }
}

#[async_trait]
impl TableStore for DynamoStore {
    async fn list_tables(&self) -> Result<Vec<String>, Error> {
        let names = self
            .client
            .list_tables()
            .into_paginator()
            .items()
            .send()
            .into_stream_03x()
            .map_err(Into::<Error>::into)
            .try_collect::<Vec<String>>()
            .await?;

        Ok(names)
    }

    async fn describe_table(&self, table: &str) -> Result<TableDescription, Error> {
        let output = self.client.describe_table().table_name(table).send().await?;

        let description = output.table.ok_or_else(|| {
            Error::service(
                ErrorKind::NotFound,
                format!("DescribeTable returned no description for {table}"),
            )
        })?;

        Ok(from_sdk::table_description(table, &description))
    }

    async fn create_table(&self, table: &str, schema: &TableSchema) -> Result<(), Error> {
        let mut builder = self
            .client
            .create_table()
            .table_name(table)
            .set_key_schema(Some(to_sdk::key_schema(&schema.key_schema)?))
            .set_attribute_definitions(Some(
                schema
                    .attributes
                    .iter()
                    .map(to_sdk::attribute_definition)
                    .collect::<Result<Vec<_>, _>>()?,
            ));

        let table_throughput = match schema.billing_mode {
            BillingMode::OnDemand => {
                builder = builder.billing_mode(SdkBillingMode::PayPerRequest);
                None
            }
            BillingMode::Provisioned(throughput) => {
                builder = builder
                    .billing_mode(SdkBillingMode::Provisioned)
                    .provisioned_throughput(to_sdk::throughput(throughput)?);
                Some(throughput)
            }
        };

        let mut global = Vec::new();
        let mut local = Vec::new();

        for index in &schema.indexes {
            match index.scope {
                IndexScope::Global => global.push(to_sdk::global_index(index, table_throughput)?),
                IndexScope::Local => local.push(to_sdk::local_index(index)?),
            }
        }

        // CreateTable rejects empty index lists
        if !global.is_empty() {
            builder = builder.set_global_secondary_indexes(Some(global));
        }
        if !local.is_empty() {
            builder = builder.set_local_secondary_indexes(Some(local));
        }

        let _ = builder.send().await?;
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> Result<(), Error> {
        let _ = self.client.delete_table().table_name(table).send().await?;
        Ok(())
    }

    async fn scan(
        &self,
        table: &str,
        limit: usize,
        start: Option<ContinuationToken>,
    ) -> Result<ScanPage, Error> {
        let output = self
            .client
            .scan()
            .table_name(table)
            .select(sdk::Select::AllAttributes)
            .limit(i32::try_from(limit.max(1)).unwrap_or(i32::MAX))
            .set_exclusive_start_key(start.map(ContinuationToken::into_key))
            .send()
            .await?;

        Ok(ScanPage {
            items: output.items.unwrap_or_default(),
            next: output
                .last_evaluated_key
                .filter(|key| !key.is_empty())
                .map(ContinuationToken::from_key),
        })
    }

    async fn batch_write(&self, table: &str, items: &[Item]) -> Result<Vec<Item>, Error> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut write_ops: Vec<WriteRequest> = Vec::with_capacity(items.len());

        for item in items {
            let put_request = PutRequest::builder().set_item(Some(item.clone())).build()?;

            write_ops.push(
                WriteRequest::builder()
                    .set_put_request(Some(put_request))
                    .build(),
            );
        }

        let output = self
            .client
            .batch_write_item()
            .request_items(table, write_ops)
            .send()
            .await?;

        let unprocessed = output
            .unprocessed_items
            .and_then(|mut tables| tables.remove(table))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|request| request.put_request.map(|put| put.item))
            .collect();

        Ok(unprocessed)
    }
}

/// Conversions from DescribeTable output
mod from_sdk {
    use super::*;

    pub(super) fn table_description(
        table: &str,
        description: &sdk::TableDescription,
    ) -> TableDescription {
        let status = match description.table_status() {
            Some(sdk::TableStatus::Active) => TableStatus::Active,
            Some(sdk::TableStatus::Creating) => TableStatus::Creating,
            Some(sdk::TableStatus::Updating) => TableStatus::Updating,
            Some(sdk::TableStatus::Deleting) => TableStatus::Deleting,
            _ => TableStatus::Other,
        };

        TableDescription {
            name: description.table_name().unwrap_or(table).to_string(),
            schema: schema(description),
            status,
            item_count: description
                .item_count()
                .and_then(|count| u64::try_from(count).ok())
                .unwrap_or(0),
        }
    }

    fn schema(description: &sdk::TableDescription) -> TableSchema {
        let on_demand = matches!(
            description
                .billing_mode_summary()
                .and_then(|summary| summary.billing_mode()),
            Some(SdkBillingMode::PayPerRequest)
        );

        // Provisioned tables created without an explicit billing mode carry no summary
        let billing_mode = match throughput(description.provisioned_throughput()) {
            Some(throughput) if !on_demand => BillingMode::Provisioned(throughput),
            _ => BillingMode::OnDemand,
        };

        let mut indexes: Vec<SecondaryIndex> = description
            .global_secondary_indexes()
            .iter()
            .map(|index| SecondaryIndex {
                name: index.index_name().unwrap_or_default().to_string(),
                scope: IndexScope::Global,
                key_schema: key_schema(index.key_schema()),
                projection: projection(index.projection()),
                throughput: if on_demand {
                    None
                } else {
                    throughput(index.provisioned_throughput())
                },
            })
            .collect();

        indexes.extend(
            description
                .local_secondary_indexes()
                .iter()
                .map(|index| SecondaryIndex {
                    name: index.index_name().unwrap_or_default().to_string(),
                    scope: IndexScope::Local,
                    key_schema: key_schema(index.key_schema()),
                    projection: projection(index.projection()),
                    throughput: None,
                }),
        );

        TableSchema {
            key_schema: key_schema(description.key_schema()),
            attributes: description
                .attribute_definitions()
                .iter()
                .map(|definition| AttributeDefinition {
                    name: definition.attribute_name().to_string(),
                    kind: match definition.attribute_type() {
                        ScalarAttributeType::N => AttributeType::Number,
                        ScalarAttributeType::B => AttributeType::Binary,
                        _ => AttributeType::String,
                    },
                })
                .collect(),
            billing_mode,
            indexes,
        }
    }

    fn key_schema(elements: &[sdk::KeySchemaElement]) -> Vec<KeyElement> {
        elements
            .iter()
            .map(|element| KeyElement {
                attribute: element.attribute_name().to_string(),
                role: match element.key_type() {
                    KeyType::Hash => KeyRole::Partition,
                    _ => KeyRole::Sort,
                },
            })
            .collect()
    }

    fn projection(projection: Option<&sdk::Projection>) -> Projection {
        match projection.and_then(|p| p.projection_type()) {
            Some(ProjectionType::KeysOnly) => Projection::KeysOnly,
            Some(ProjectionType::Include) => Projection::Include(
                projection
                    .map(|p| p.non_key_attributes().to_vec())
                    .unwrap_or_default(),
            ),
            _ => Projection::All,
        }
    }

    fn throughput(
        description: Option<&sdk::ProvisionedThroughputDescription>,
    ) -> Option<Throughput> {
        let description = description?;
        let read_capacity = description.read_capacity_units().unwrap_or(0);
        let write_capacity = description.write_capacity_units().unwrap_or(0);

        // On-demand tables report zero capacity
        (read_capacity > 0 && write_capacity > 0).then_some(Throughput {
            read_capacity,
            write_capacity,
        })
    }
}

/// Conversions into CreateTable input
mod to_sdk {
    use super::*;
    use aws_sdk_dynamodb::error::BuildError;

    pub(super) fn key_schema(elements: &[KeyElement]) -> Result<Vec<sdk::KeySchemaElement>, BuildError> {
        elements
            .iter()
            .map(|element| {
                sdk::KeySchemaElement::builder()
                    .attribute_name(&element.attribute)
                    .key_type(match element.role {
                        KeyRole::Partition => KeyType::Hash,
                        KeyRole::Sort => KeyType::Range,
                    })
                    .build()
            })
            .collect()
    }

    pub(super) fn attribute_definition(
        definition: &AttributeDefinition,
    ) -> Result<sdk::AttributeDefinition, BuildError> {
        sdk::AttributeDefinition::builder()
            .attribute_name(&definition.name)
            .attribute_type(match definition.kind {
                AttributeType::String => ScalarAttributeType::S,
                AttributeType::Number => ScalarAttributeType::N,
                AttributeType::Binary => ScalarAttributeType::B,
            })
            .build()
    }

    pub(super) fn throughput(
        throughput: Throughput,
    ) -> Result<sdk::ProvisionedThroughput, BuildError> {
        sdk::ProvisionedThroughput::builder()
            .read_capacity_units(throughput.read_capacity)
            .write_capacity_units(throughput.write_capacity)
            .build()
    }

    fn projection(projection: &Projection) -> sdk::Projection {
        match projection {
            Projection::All => sdk::Projection::builder()
                .projection_type(ProjectionType::All)
                .build(),
            Projection::KeysOnly => sdk::Projection::builder()
                .projection_type(ProjectionType::KeysOnly)
                .build(),
            Projection::Include(attributes) => sdk::Projection::builder()
                .projection_type(ProjectionType::Include)
                .set_non_key_attributes(Some(attributes.clone()))
                .build(),
        }
    }

    /// A global index on a provisioned table needs its own capacity; fall
    /// back to the table's when the source did not report one
    pub(super) fn global_index(
        index: &SecondaryIndex,
        table_throughput: Option<Throughput>,
    ) -> Result<sdk::GlobalSecondaryIndex, BuildError> {
        let capacity = match table_throughput {
            Some(table) => Some(throughput(index.throughput.unwrap_or(table))?),
            None => None,
        };

        sdk::GlobalSecondaryIndex::builder()
            .index_name(&index.name)
            .set_key_schema(Some(key_schema(&index.key_schema)?))
            .projection(projection(&index.projection))
            .set_provisioned_throughput(capacity)
            .build()
    }

    pub(super) fn local_index(
        index: &SecondaryIndex,
    ) -> Result<sdk::LocalSecondaryIndex, BuildError> {
        sdk::LocalSecondaryIndex::builder()
            .index_name(&index.name)
            .set_key_schema(Some(key_schema(&index.key_schema)?))
            .projection(projection(&index.projection))
            .build()
    }
}
