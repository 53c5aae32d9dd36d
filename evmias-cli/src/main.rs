// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! EVMIAS CLI - operator tooling for the portal session bridge.
//!
//! # Examples
//!
//! ```bash
//! # Print a valid session (cached or freshly acquired)
//! evmias session
//!
//! # Force a new logon
//! evmias refresh
//!
//! # Check whether the cached session is still accepted
//! evmias probe
//!
//! # Fetch everything known about one hospitalization
//! evmias bundle --event-id 3010101000012345 --person-id 3010101000054321
//!
//! # Search hospitalizations by patient name
//! evmias search --last-name Ivanov --from 01.01.2025 --to 31.03.2025
//!
//! # Call an arbitrary controller method
//! evmias call --controller Common --method getCurrentDateTime --form is_activerules=true
//!
//! # JSON output
//! evmias --format json --pretty bundle --event-id 1 --person-id 2
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{bundle, call, search, session};

// ============================================================================
// CLI Definition
// ============================================================================

/// EVMIAS CLI - portal session bridge.
#[derive(Parser)]
#[command(name = "evmias")]
#[command(about = "EVMIAS portal session bridge CLI")]
#[command(long_about = r#"
Keeps an authenticated EVMIAS portal session in the configured cache and
reads hospitalization records with it.

Configuration comes from the environment (BASE_URL, EVMIAS_LOGIN, ...)
unless --config points at a JSON settings file.

Examples:
  evmias session                 # Valid session, cached or fresh
  evmias probe                   # Is the cached session accepted?
  evmias refresh                 # Force a new logon
  evmias bundle --event-id ID --person-id ID
  evmias search --last-name NAME
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'session'.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// JSON settings file (defaults to environment variables).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Print a valid session (default if no command specified).
    #[command(visible_alias = "s")]
    Session,

    /// Acquire a new session and cache it.
    #[command(visible_alias = "r")]
    Refresh,

    /// Delete the cached session.
    Invalidate,

    /// Check the cached session against the portal.
    #[command(visible_alias = "p")]
    Probe,

    /// Post a form to any controller method.
    Call(call::CallArgs),

    /// Fetch all records of one hospitalization.
    #[command(visible_alias = "b")]
    Bundle(bundle::BundleArgs),

    /// Search hospitalizations by patient name.
    Search(search::SearchArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// General error.
    Error = 1,
    /// No session could be acquired.
    SessionUnavailable = 2,
    /// The portal rejected the cached session.
    SessionRejected = 3,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("evmias=debug,info")
    } else {
        EnvFilter::new("evmias=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Session) | None => session::show(&cli).await,
        Some(Commands::Refresh) => session::refresh(&cli).await,
        Some(Commands::Invalidate) => session::invalidate(&cli).await,
        Some(Commands::Probe) => session::probe(&cli).await,
        Some(Commands::Call(args)) => call::run(args, &cli).await,
        Some(Commands::Bundle(args)) => bundle::run(args, &cli).await,
        Some(Commands::Search(args)) => search::run(args, &cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        let acquisition_failed = e
            .downcast_ref::<evmias_session::SessionError>()
            .is_some_and(|e| e.step().is_some());
        let code = if acquisition_failed {
            ExitCode::SessionUnavailable
        } else {
            ExitCode::Error
        };
        std::process::exit(code as i32);
    }

    Ok(())
}
