//! Subcommand implementations.

mod call;
mod count;
mod create;
mod delete;
mod get;
mod login;
mod logout;
mod query;
mod refresh;
mod update;
mod whoami;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use serde_json::Value;
use stackmob::Query;

use crate::cli::ConnectionArgs;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session
    Login(login::LoginArgs),

    /// Log out and forget the stored session
    Logout(logout::LogoutArgs),

    /// Display the stored session
    Whoami(whoami::WhoamiArgs),

    /// Trade the refresh token for new credentials
    Refresh(refresh::RefreshArgs),

    /// Fetch one object by primary key
    Get(get::GetArgs),

    /// List objects matching filters
    Query(query::QueryArgs),

    /// Count objects matching filters
    Count(count::CountArgs),

    /// Create an object from JSON
    Create(create::CreateArgs),

    /// Update fields of an object from JSON
    Update(update::UpdateArgs),

    /// Delete an object
    Delete(delete::DeleteArgs),

    /// Call a custom code method
    Call(call::CallArgs),
}

pub async fn handle(cmd: Command, connection: &ConnectionArgs) -> Result<()> {
    match cmd {
        Command::Login(args) => login::run(args, connection).await,
        Command::Logout(args) => logout::run(args, connection).await,
        Command::Whoami(args) => whoami::run(args, connection).await,
        Command::Refresh(args) => refresh::run(args, connection).await,
        Command::Get(args) => get::run(args, connection).await,
        Command::Query(args) => query::run(args, connection).await,
        Command::Count(args) => count::run(args, connection).await,
        Command::Create(args) => create::run(args, connection).await,
        Command::Update(args) => update::run(args, connection).await,
        Command::Delete(args) => delete::run(args, connection).await,
        Command::Call(args) => call::run(args, connection).await,
    }
}

/// Filter flags shared by `query` and `count`.
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Parameter as KEY=VALUE, e.g. `age[lt]=25` or `[or1].name=bob`
    #[arg(long = "filter", value_parser = parse_pair)]
    pub filters: Vec<(String, Value)>,
}

impl FilterArgs {
    pub fn to_query(&self) -> Query {
        self.filters
            .iter()
            .fold(Query::new(), |query, (key, value)| {
                query.add_param(key.clone(), value.clone())
            })
    }
}

/// Parse `KEY=VALUE`; the value is read as JSON when it parses, else as a
/// plain string.
pub fn parse_pair(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), parse_value(value)))
}

pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parse a JSON object argument.
pub fn parse_object(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("Body is not valid JSON")?;
    if !value.is_object() {
        bail!("Body must be a JSON object");
    }
    Ok(value)
}

/// Parse `START-END` into an inclusive range.
pub fn parse_range(raw: &str) -> Result<(u64, u64), String> {
    let (start, end) = raw
        .split_once('-')
        .ok_or_else(|| format!("expected START-END, got '{raw}'"))?;
    let start: u64 = start.trim().parse().map_err(|_| format!("bad range start '{start}'"))?;
    let end: u64 = end.trim().parse().map_err(|_| format!("bad range end '{end}'"))?;
    if end < start {
        return Err(format!("range end {end} is before start {start}"));
    }
    Ok((start, end))
}
