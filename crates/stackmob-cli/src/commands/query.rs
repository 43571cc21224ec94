//! Query command implementation.

use anyhow::{Context, Result};
use clap::Args;

use super::{FilterArgs, parse_range};
use crate::cli::ConnectionArgs;
use crate::context;
use crate::output;

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Schema name
    pub schema: String,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Sort by FIELD or FIELD:desc (repeatable)
    #[arg(long = "order")]
    pub order: Vec<String>,

    /// Only return these fields (repeatable)
    #[arg(long = "select")]
    pub select: Vec<String>,

    /// Inclusive object range START-END
    #[arg(long, value_parser = parse_range)]
    pub range: Option<(u64, u64)>,
}

pub async fn run(args: QueryArgs, connection: &ConnectionArgs) -> Result<()> {
    let client = context::client(connection)?;

    let mut query = args.filter.to_query();
    for order in &args.order {
        query = match order.split_once(':') {
            Some((field, "desc")) => query.order_desc(field),
            Some((field, _)) => query.order_asc(field),
            None => query.order_asc(order),
        };
    }
    for field in &args.select {
        query = query.select(field.as_str());
    }
    if let Some((start, end)) = args.range {
        query = query.set_range(start, end);
    }

    let objects = client
        .schema(&args.schema)
        .query(&query)
        .await
        .context("Failed to query objects")?;

    output::objects(&objects)
}
