//! Custom code command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use clap::Args;
use serde_json::Value;
use stackmob::Method;

use super::parse_pair;
use crate::cli::ConnectionArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Custom code method name
    pub method: String,

    /// HTTP verb: GET, POST, PUT or DELETE
    #[arg(long, default_value = "GET")]
    pub verb: String,

    /// Parameter as KEY=VALUE (repeatable)
    #[arg(long = "param", value_parser = parse_pair)]
    pub params: Vec<(String, Value)>,
}

pub async fn run(args: CallArgs, connection: &ConnectionArgs) -> Result<()> {
    let verb = match args.verb.to_ascii_uppercase().as_str() {
        "GET" => Method::GET,
        "POST" => Method::POST,
        "PUT" => Method::PUT,
        "DELETE" => Method::DELETE,
        other => bail!("Unsupported verb '{}'", other),
    };
    let params: BTreeMap<String, Value> = args.params.into_iter().collect();
    let client = context::client(connection)?;

    let response = client
        .custom_code(&args.method, params, Some(verb))
        .await
        .context("Custom code call failed")?;

    tracing::debug!(status = %response.status, "Custom code answered");
    output::object(&response.into_value())?;
    Ok(())
}
