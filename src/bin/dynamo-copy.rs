//! Copy a DynamoDB table, schema and data, to another table or endpoint

use anyhow::Context;
use clap::Parser;
use dynamo_transfer::cli::{CopyArgs, init_logging};
use dynamo_transfer::transfer::{AssumeYes, Confirm, StdinConfirm, TableCopier};
use dynamo_transfer::{DynamoStore, Error};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CopyArgs::parse();
    init_logging(args.log_level).map_err(|e| anyhow::anyhow!(e))?;

    let options = args.options();
    if let Err(e) = options.write.validate() {
        error!(error = %e, "Invalid arguments");
        return Err(e.into());
    }

    let source = DynamoStore::connect(&args.source_client()).await;
    let dest = DynamoStore::connect(&args.dest_client()).await;

    let confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(StdinConfirm)
    };

    let copier = TableCopier::new(&source, &dest, options, confirm)?;
    let summary = copier.run().await.inspect_err(|e: &Error| {
        error!(error = %e, "Copy failed");
    })?;

    info!(
        items = summary.items_read,
        written = summary.write.written,
        failed = summary.write.failed,
        "Copy completed"
    );

    if let Some(report) = summary.validation {
        info!(
            source_count = report.source_count,
            dest_count = report.dest_count,
            matched = report.is_match(),
            "Validation"
        );
    }

    let json = serde_json::to_string(&summary).context("rendering copy summary")?;
    println!("{json}");

    Ok(())
}
