//! Search command - find hospitalizations by patient name.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Args;
use evmias_records::SearchQuery;

use super::authenticated_api;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

const DATE_FORMAT: &str = "%d.%m.%Y";

/// Arguments for the search command.
#[derive(Args)]
pub struct SearchArgs {
    /// Patient last name.
    #[arg(long)]
    pub last_name: String,

    /// Patient first name.
    #[arg(long)]
    pub first_name: Option<String>,

    /// Patient middle name.
    #[arg(long)]
    pub middle_name: Option<String>,

    /// Birthday (dd.mm.yyyy).
    #[arg(long)]
    pub birthday: Option<String>,

    /// Earliest discharge date (dd.mm.yyyy).
    #[arg(long, requires = "to", conflicts_with = "range")]
    pub from: Option<String>,

    /// Latest discharge date (dd.mm.yyyy).
    #[arg(long, requires = "from", conflicts_with = "range")]
    pub to: Option<String>,

    /// Raw discharge range as the portal expects it.
    #[arg(long)]
    pub range: Option<String>,
}

/// Runs the search command.
pub async fn run(args: &SearchArgs, cli: &Cli) -> Result<()> {
    let query = build_query(args)?;
    let (api, cookies) = authenticated_api(cli).await?;
    let rows = api.search(&cookies, &query).await?;

    match cli.format {
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).render(&rows)?),
        OutputFormat::Text => println!("{}", TextFormatter::new(!cli.no_color).format_search(&rows)),
    }
    Ok(())
}

fn build_query(args: &SearchArgs) -> Result<SearchQuery> {
    let mut query = SearchQuery::new(&args.last_name);
    if let Some(value) = &args.first_name {
        query = query.first_name(value);
    }
    if let Some(value) = &args.middle_name {
        query = query.middle_name(value);
    }
    if let Some(value) = &args.birthday {
        query = query.birthday(value);
    }

    match (&args.from, &args.to, &args.range) {
        (Some(from), Some(to), None) => {
            query = query.discharge_between(parse_date(from)?, parse_date(to)?)?;
        }
        (None, None, Some(range)) => query = query.discharge_range(range),
        (None, None, None) => {}
        _ => bail!("use either --from/--to or --range"),
    }
    Ok(query)
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .with_context(|| format!("'{value}' is not a dd.mm.yyyy date"))
}
