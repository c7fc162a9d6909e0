//! CLI command handlers.

pub mod config;
pub mod reload;
pub mod start;
pub mod status;
pub mod upload;

use std::path::Path;

use anyhow::{Context as _, Result};
use hotstage_config::LoadedConfig;
use hotstage_config::discovery::ConfigSource;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Server URL to connect to.
    pub server_url: String,
    /// Bearer token for the server API.
    pub token: Option<String>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Configuration as loaded at startup.
    pub loaded: LoadedConfig,
}

/// Load an explicit config file, or discover and merge the usual layers.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let Some(path) = explicit else {
        return hotstage_config::load_config(None).context("Failed to load configuration");
    };

    let config = hotstage_config::load_config_file(path)
        .with_context(|| format!("Failed to load config file {}", path.display()))?;
    Ok(LoadedConfig {
        config,
        sources: vec![ConfigSource {
            path: path.to_path_buf(),
            loaded: true,
        }],
        warnings: Vec::new(),
    })
}
