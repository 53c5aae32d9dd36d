//! Bundle command - fetch every record of one hospitalization.

use anyhow::Result;
use clap::Args;
use evmias_records::fetch_bundle;
use std::time::Duration;
use tracing::info;

use super::authenticated_api;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the bundle command.
#[derive(Args)]
pub struct BundleArgs {
    /// Hospitalization identifier (`EvnPS_id`).
    #[arg(long)]
    pub event_id: String,

    /// Patient identifier (`Person_id`).
    #[arg(long)]
    pub person_id: String,

    /// Give up on sub-fetches still running after this many seconds.
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

/// Runs the bundle command.
pub async fn run(args: &BundleArgs, cli: &Cli) -> Result<()> {
    let (api, cookies) = authenticated_api(cli).await?;
    let deadline = args
        .deadline_secs
        .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));

    let bundle = fetch_bundle(&api, &cookies, &args.event_id, &args.person_id, deadline).await;
    info!(failures = bundle.failures.len(), "Bundle fetched");

    match cli.format {
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).render(&bundle)?),
        OutputFormat::Text => println!("{}", TextFormatter::new(!cli.no_color).format_bundle(&bundle)),
    }
    Ok(())
}
