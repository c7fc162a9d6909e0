//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use hotstage_config::{HotstageConfig, PROJECT_CONFIG_FILE};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./hotstage.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Init { local } => cmd_init(local),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;

    // Fill every section so the output documents the effective values.
    let effective = HotstageConfig {
        server: Some(loaded.config.server_or_default()),
        session: Some(loaded.config.session_or_default()),
        reload: Some(loaded.config.reload_or_default()),
        logging: Some(loaded.config.logging_or_default()),
    };

    if ctx.json_output {
        let sources: Vec<String> = loaded
            .loaded_from()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let output = serde_json::json!({
            "sources": sources,
            "config": effective,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# hotstage configuration\n");
    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)\n");
    } else {
        for source in &sources {
            println!("# from {}", source.display());
        }
        println!();
    }
    print!("{}", effective.to_toml()?);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    println!("Config files (lowest precedence first):");
    for source in &ctx.loaded.sources {
        let marker = if source.loaded { "✓" } else { "·" };
        println!("  {} {}", marker, source.path.display());
    }
    Ok(())
}

fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        PathBuf::from(PROJECT_CONFIG_FILE)
    } else {
        hotstage_config::user_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    let defaults = HotstageConfig {
        server: Some(Default::default()),
        session: Some(Default::default()),
        reload: Some(Default::default()),
        logging: Some(Default::default()),
    };
    hotstage_config::save_config(&defaults, &path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created config file: {}", path.display());
    Ok(())
}

fn cmd_path() -> Result<()> {
    if let Some(path) = hotstage_config::user_config_path() {
        println!("{}", path.display());
    } else {
        eprintln!("Could not determine config directory");
    }
    Ok(())
}
