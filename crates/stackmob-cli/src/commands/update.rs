//! Update command implementation.

use anyhow::{Context, Result};
use clap::Args;

use super::parse_object;
use crate::cli::ConnectionArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Schema name
    pub schema: String,

    /// Primary key of the object
    pub id: String,

    /// Changed fields as a JSON object
    pub body: String,
}

pub async fn run(args: UpdateArgs, connection: &ConnectionArgs) -> Result<()> {
    let changes = parse_object(&args.body)?;
    let client = context::client(connection)?;

    let updated = client
        .schema(&args.schema)
        .update(&args.id, changes)
        .await
        .context("Failed to update object")?;

    output::object(&updated)?;
    Ok(())
}
