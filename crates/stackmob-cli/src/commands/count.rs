//! Count command implementation.

use anyhow::{Context, Result};
use clap::Args;

use super::FilterArgs;
use crate::cli::ConnectionArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct CountArgs {
    /// Schema name
    pub schema: String,

    #[command(flatten)]
    pub filter: FilterArgs,
}

pub async fn run(args: CountArgs, connection: &ConnectionArgs) -> Result<()> {
    let client = context::client(connection)?;

    let count = client
        .schema(&args.schema)
        .count(&args.filter.to_query())
        .await
        .context("Failed to count objects")?;

    output::count(count);
    Ok(())
}
