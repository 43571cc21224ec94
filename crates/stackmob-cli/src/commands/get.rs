//! Get command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::ConnectionArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Schema name
    pub schema: String,

    /// Primary key of the object
    pub id: String,

    /// Expand related objects this many levels deep (0-3)
    #[arg(long)]
    pub expand: Option<u8>,
}

pub async fn run(args: GetArgs, connection: &ConnectionArgs) -> Result<()> {
    let client = context::client(connection)?;
    let schema = client.schema(&args.schema);

    let object = match args.expand {
        Some(depth) => schema.fetch_expanded(&args.id, depth).await,
        None => schema.fetch(&args.id).await,
    }
    .context("Failed to fetch object")?;

    output::object(&object)?;
    Ok(())
}
