//! Refresh command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::ConnectionArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct RefreshArgs {}

pub async fn run(_args: RefreshArgs, connection: &ConnectionArgs) -> Result<()> {
    let client = context::client(connection)?;

    let credentials = client
        .refresh_session()
        .await
        .context("Failed to refresh session")?;

    output::success("Session refreshed");
    println!();
    output::field("User", &credentials.user);
    output::field("Expires", &credentials.expires_at.to_rfc3339());

    Ok(())
}
