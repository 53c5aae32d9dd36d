//! Call command - post a form to any controller method.

use anyhow::{Result, bail};
use clap::Args;

use super::authenticated_api;
use crate::output::JsonFormatter;
use crate::Cli;

/// Arguments for the call command.
#[derive(Args)]
pub struct CallArgs {
    /// Controller name (`c` query parameter).
    #[arg(long)]
    pub controller: String,

    /// Method name (`m` query parameter).
    #[arg(long)]
    pub method: String,

    /// Form field as `name=value`. Repeatable.
    #[arg(long = "form", value_name = "NAME=VALUE")]
    pub form: Vec<String>,
}

/// Runs the call command. The payload is always printed as JSON.
pub async fn run(args: &CallArgs, cli: &Cli) -> Result<()> {
    let form = parse_form(&args.form)?;
    let (api, cookies) = authenticated_api(cli).await?;
    let payload = api.call(&cookies, &args.controller, &args.method, form).await?;
    println!("{}", JsonFormatter::new(cli.pretty).render(&payload)?);
    Ok(())
}

fn parse_form(fields: &[String]) -> Result<Vec<(String, String)>> {
    fields
        .iter()
        .map(|field| match field.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
            _ => bail!("form field '{field}' must look like name=value"),
        })
        .collect()
}
