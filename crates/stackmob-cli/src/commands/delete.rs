//! Delete command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::ConnectionArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Schema name
    pub schema: String,

    /// Primary key of the object
    pub id: String,
}

pub async fn run(args: DeleteArgs, connection: &ConnectionArgs) -> Result<()> {
    let client = context::client(connection)?;

    client
        .schema(&args.schema)
        .destroy(&args.id)
        .await
        .context("Failed to delete object")?;

    output::success(&format!("Deleted {}/{}", args.schema, args.id));
    Ok(())
}
