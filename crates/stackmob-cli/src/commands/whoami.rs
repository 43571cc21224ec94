//! Whoami command implementation.

use anyhow::{Result, bail};
use clap::Args;

use crate::cli::ConnectionArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct WhoamiArgs {}

pub async fn run(_args: WhoamiArgs, connection: &ConnectionArgs) -> Result<()> {
    let client = context::client(connection)?;
    let session = client.session();

    let state = session.state();
    let Some(user) = session.logged_in_user() else {
        bail!("No active session. Run 'stackmob login' first.");
    };

    output::field("User", &user);
    output::field("State", output::state_label(state));
    if let Some(expires) = session.expires_at() {
        output::field("Expires", &expires.to_rfc3339());
    }

    Ok(())
}
