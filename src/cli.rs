//! Command line surface shared by the `dynamo-copy` and `dynamo-import`
//! binaries

use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::client::{ClientConfig, DEFAULT_ENDPOINT, DEFAULT_REGION};
use crate::transfer::{
    CopyOptions, DEFAULT_ID_FIELD, DEFAULT_PAGE_SIZE, ExistingTable, ImportOptions,
    MAX_BATCH_SIZE, WriteConfig,
};

/// Logging verbosity
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    /// Per-page and per-retry detail
    Debug,
    /// Stage transitions and totals
    Info,
    /// Recoverable problems only
    Warning,
    /// Failures only
    Error,
}

impl LogLevel {
    /// Matching tracing filter
    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Install the global fmt subscriber
///
/// `level` is the default; directives in `RUST_LOG` refine it.
pub fn init_logging(level: LogLevel) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::builder()
        .with_default_directive(level.filter().into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
}

/// Write settings shared by both tools
#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct WriteArgs {
    /// Items per BatchWriteItem request (1-25)
    #[arg(long, default_value_t = MAX_BATCH_SIZE)]
    pub batch_size: usize,

    /// Batches written concurrently
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}

impl WriteArgs {
    /// Writer configuration, not yet validated
    pub fn write_config(&self) -> WriteConfig {
        WriteConfig {
            batch_size: self.batch_size,
            concurrency: self.concurrency.max(1),
            ..WriteConfig::default()
        }
    }
}

/// Copy a DynamoDB table, schema and data, to another table or endpoint
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
#[command(name = "dynamo-copy", version, about)]
pub struct CopyArgs {
    /// Table to copy from
    #[arg(long)]
    pub source_table: String,

    /// Table to copy into
    #[arg(long)]
    pub dest_table: String,

    /// Source endpoint URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub source_endpoint: String,

    /// Destination endpoint URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub dest_endpoint: String,

    /// Source region
    #[arg(long, default_value = DEFAULT_REGION)]
    pub source_region: String,

    /// Destination region
    #[arg(long, default_value = DEFAULT_REGION)]
    pub dest_region: String,

    /// Named profile for the source
    #[arg(long)]
    pub source_profile: Option<String>,

    /// Named profile for the destination
    #[arg(long)]
    pub dest_profile: Option<String>,

    /// Delete and re-create the destination if it exists
    #[arg(long)]
    pub overwrite_dest: bool,

    /// Compare item counts after copying
    #[arg(long)]
    pub validate: bool,

    /// Delete the source table after copying (asks first)
    #[arg(long)]
    pub delete_source: bool,

    /// Answer yes to the delete-source question
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Write into an existing destination without comparing key schemas
    #[arg(long)]
    pub skip_schema_check: bool,

    /// Items requested per scan page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub write: WriteArgs,

    /// Logging level
    #[arg(long, value_enum, ignore_case = true, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

impl CopyArgs {
    /// Source connection, credentials from `SOURCE_AWS_*`
    pub fn source_client(&self) -> ClientConfig {
        ClientConfig::for_env(
            "SOURCE_",
            Some(self.source_endpoint.clone()),
            &self.source_region,
            self.source_profile.clone(),
        )
    }

    /// Destination connection, credentials from `DEST_AWS_*`
    pub fn dest_client(&self) -> ClientConfig {
        ClientConfig::for_env(
            "DEST_",
            Some(self.dest_endpoint.clone()),
            &self.dest_region,
            self.dest_profile.clone(),
        )
    }

    /// Copy settings
    pub fn options(&self) -> CopyOptions {
        CopyOptions {
            overwrite: self.overwrite_dest,
            validate: self.validate,
            delete_source: self.delete_source,
            existing: if self.skip_schema_check {
                ExistingTable::SkipSchemaCheck
            } else {
                ExistingTable::RequireMatchingKeys
            },
            page_size: self.page_size,
            write: self.write.write_config(),
            ..CopyOptions::new(&self.source_table, &self.dest_table)
        }
    }
}

/// Import newline-delimited JSON files into a DynamoDB table
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
#[command(name = "dynamo-import", version, about)]
pub struct ImportArgs {
    /// Destination table
    #[arg(long)]
    pub table_name: String,

    /// Directory holding the *.json input files
    #[arg(long)]
    pub data_dir: PathBuf,

    /// Endpoint URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint_url: String,

    /// Region
    #[arg(long, default_value = DEFAULT_REGION)]
    pub region: String,

    /// Attribute given a generated UUID when missing or empty
    #[arg(long, default_value = DEFAULT_ID_FIELD)]
    pub id_field: String,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub write: WriteArgs,

    /// Logging level
    #[arg(long, value_enum, ignore_case = true, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

impl ImportArgs {
    /// Connection, credentials from `AWS_*`
    pub fn client(&self) -> ClientConfig {
        ClientConfig::for_env("", Some(self.endpoint_url.clone()), &self.region, None)
    }

    /// Import settings
    pub fn options(&self) -> ImportOptions {
        ImportOptions {
            id_field: self.id_field.clone(),
            write: self.write.write_config(),
            ..ImportOptions::new(&self.table_name)
        }
    }
}
