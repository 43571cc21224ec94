//! Create command implementation.

use anyhow::{Context, Result};
use clap::Args;

use super::parse_object;
use crate::cli::ConnectionArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Schema name
    pub schema: String,

    /// Object as a JSON object
    pub body: String,
}

pub async fn run(args: CreateArgs, connection: &ConnectionArgs) -> Result<()> {
    let body = parse_object(&args.body)?;
    let client = context::client(connection)?;

    let created = client
        .schema(&args.schema)
        .create(body)
        .await
        .context("Failed to create object")?;

    output::object(&created)?;
    Ok(())
}
