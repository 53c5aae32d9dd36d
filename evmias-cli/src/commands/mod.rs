//! CLI command implementations.

pub mod bundle;
pub mod call;
pub mod search;
pub mod session;

use anyhow::{Context, Result};
use evmias_core::{CookieSet, Settings};
use evmias_records::UpstreamApi;
use evmias_session::SessionManager;
use tracing::debug;

use crate::Cli;

/// Loads settings from `--config` or the environment.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    match &cli.config {
        Some(path) => {
            debug!(path = %path.display(), "Loading settings file");
            Settings::load_from(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))
        }
        None => Settings::from_env().context("failed to read settings from the environment"),
    }
}

/// Builds the session manager from the configured settings.
pub fn session_manager(cli: &Cli) -> Result<(Settings, SessionManager)> {
    let settings = load_settings(cli)?;
    let manager = SessionManager::from_settings(&settings)?;
    Ok((settings, manager))
}

/// Obtains a valid session and a record reader sharing its client.
pub async fn authenticated_api(cli: &Cli) -> Result<(UpstreamApi, CookieSet)> {
    let (settings, manager) = session_manager(cli)?;
    let cookies = manager.get_valid_session().await?;
    let api = UpstreamApi::new(manager.client().clone(), settings.upstream);
    Ok((api, cookies))
}
