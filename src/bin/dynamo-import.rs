//! Import newline-delimited JSON files into a DynamoDB table

use anyhow::Context;
use clap::Parser;
use dynamo_transfer::cli::{ImportArgs, init_logging};
use dynamo_transfer::{DynamoStore, Error, Importer};
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ImportArgs::parse();
    init_logging(args.log_level).map_err(|e| anyhow::anyhow!(e))?;

    let options = args.options();
    if let Err(e) = options.write.validate() {
        error!(error = %e, "Invalid arguments");
        return Err(e.into());
    }

    let store = DynamoStore::connect(&args.client()).await;
    let importer = Importer::new(&store, options)?;

    let summary = importer
        .run(&args.data_dir)
        .await
        .inspect_err(|e: &Error| error!(error = %e, "Import failed"))
        .with_context(|| format!("importing {}", args.data_dir.display()))?;

    let json = serde_json::to_string(&summary).context("rendering import summary")?;
    println!("{json}");

    Ok(())
}
