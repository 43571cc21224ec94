//! Logout command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::ConnectionArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(_args: LogoutArgs, connection: &ConnectionArgs) -> Result<()> {
    let client = context::client(connection)?;

    client
        .logout()
        .await
        .context("Logout request failed; local credentials were cleared anyway")?;

    output::success("Logged out");
    Ok(())
}
