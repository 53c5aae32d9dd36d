//! Session commands - show, refresh, invalidate and probe the cached session.

use anyhow::Result;
use tracing::info;

use super::session_manager;
use crate::output::{JsonFormatter, ProbeOutput, SessionOutput, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Prints a valid session, acquiring one if needed.
pub async fn show(cli: &Cli) -> Result<()> {
    let (_, manager) = session_manager(cli)?;
    let cookies = manager.get_valid_session().await?;
    print_session(cli, &SessionOutput::new(manager.store(), &cookies))
}

/// Forces a new acquisition.
pub async fn refresh(cli: &Cli) -> Result<()> {
    let (_, manager) = session_manager(cli)?;
    info!("Forcing session refresh");
    let cookies = manager.refresh().await?;
    print_session(cli, &SessionOutput::new(manager.store(), &cookies))
}

/// Deletes the cached session.
pub async fn invalidate(cli: &Cli) -> Result<()> {
    let (_, manager) = session_manager(cli)?;
    manager.invalidate().await?;

    match cli.format {
        OutputFormat::Json => {
            let value = serde_json::json!({ "invalidated": manager.store().key() });
            println!("{}", JsonFormatter::new(cli.pretty).render(&value)?);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("Deleted cached session '{}'", manager.store().key());
            }
        }
    }
    Ok(())
}

/// Validates the cached session without acquiring a new one.
///
/// Exits with [`ExitCode::SessionRejected`] when there is nothing cached or
/// the portal rejects it.
pub async fn probe(cli: &Cli) -> Result<()> {
    let (_, manager) = session_manager(cli)?;
    let cached = manager.store().load().await;
    let valid = match &cached {
        Some(cookies) => manager.validate(cookies).await,
        None => false,
    };
    let report = ProbeOutput {
        key: manager.store().key().to_string(),
        cached: cached.is_some(),
        valid,
    };

    match cli.format {
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).render(&report)?),
        OutputFormat::Text => println!("{}", TextFormatter::new(!cli.no_color).format_probe(&report)),
    }

    if !valid {
        std::process::exit(ExitCode::SessionRejected as i32);
    }
    Ok(())
}

fn print_session(cli: &Cli, session: &SessionOutput) -> Result<()> {
    match cli.format {
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).render(session)?),
        OutputFormat::Text => {
            println!("{}", TextFormatter::new(!cli.no_color).format_session(session));
        }
    }
    Ok(())
}
