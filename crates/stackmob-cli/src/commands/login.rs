//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use stackmob::Login;

use crate::cli::ConnectionArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Value of the user schema's login field
    #[arg(long)]
    pub username: String,

    /// Account password
    #[arg(long, env = "STACKMOB_PASSWORD")]
    pub password: String,

    /// Refresh the session automatically once it expires
    #[arg(long)]
    pub keep_logged_in: bool,

    /// Set this new password after logging in with a temporary one
    #[arg(long)]
    pub new_password: Option<String>,
}

pub async fn run(args: LoginArgs, connection: &ConnectionArgs) -> Result<()> {
    let client = context::client(connection)?;
    let login = Login::new(&args.username, &args.password);

    eprintln!("{}", "Logging in...".dimmed());

    let user = match &args.new_password {
        Some(new_password) => client
            .login_with_temp_and_set_new_password(&login, new_password, args.keep_logged_in)
            .await
            .context("Failed to login")?,
        None => client
            .login(&login, args.keep_logged_in)
            .await
            .context("Failed to login")?,
    };

    output::success("Logged in successfully");
    println!();
    output::field("User", &args.username);
    if let Some(expires) = client.session().expires_at() {
        output::field("Expires", &expires.to_rfc3339());
    }
    if !user.is_null() {
        output::object(&user)?;
    }

    Ok(())
}
