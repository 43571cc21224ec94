//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser};
use stackmob::SecurityMode;

use crate::commands::Command;

/// StackMob command-line client.
#[derive(Parser, Debug)]
#[command(name = "stackmob")]
#[command(author, version = env!("STACKMOB_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Where and how to reach the API.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Application public key; without one requests go out in proxy mode
    #[arg(long, env = "STACKMOB_PUBLIC_KEY", global = true)]
    pub public_key: Option<String>,

    /// API domain as host[:port], without a scheme
    #[arg(long, env = "STACKMOB_API_DOMAIN", global = true)]
    pub domain: Option<String>,

    /// API version (0 is development)
    #[arg(long, env = "STACKMOB_API_VERSION", default_value_t = 0, global = true)]
    pub api_version: u32,

    /// Which requests use HTTPS: always, never or mixed
    #[arg(
        long,
        env = "STACKMOB_SECURITY",
        default_value = "mixed",
        value_parser = parse_security,
        global = true
    )]
    pub security: SecurityMode,

    /// Credential file (defaults to the user data directory)
    #[arg(long, env = "STACKMOB_CREDENTIALS", global = true)]
    pub credentials: Option<PathBuf>,
}

fn parse_security(value: &str) -> Result<SecurityMode, String> {
    value.parse().map_err(|e: stackmob::Error| e.to_string())
}
