//! Start command - launches the staging server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;

use hotstage_reload::{ConsoleReloadExecutor, ReloadCoordinator, ReloadSettings, RoleTable};
use hotstage_server::{Server, ServerConfig};
use hotstage_session::{ExpiringSessionStore, StoreConfig};

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Root of the file tree to serve and stage into (overrides config)
    #[arg(long)]
    pub root: Option<PathBuf>,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;
    loaded.config.validate().context("Invalid configuration")?;

    if ctx.verbose {
        let sources = loaded.loaded_from();
        if sources.is_empty() {
            println!("No config files found, using defaults + CLI args");
        } else {
            for source in sources {
                println!("Loaded config: {}", source.display());
            }
        }
    }

    let server_cfg = loaded.config.server_or_default();
    let session_cfg = loaded.config.session_or_default();
    let reload_cfg = loaded.config.reload_or_default();

    // ── Server settings ─────────────────────────────────────────────────

    let port = args.port.unwrap_or(server_cfg.port);
    let bind = args.bind.clone().unwrap_or_else(|| server_cfg.bind.clone());
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let root = args
        .root
        .clone()
        .or_else(|| server_cfg.root.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let root = root
        .canonicalize()
        .with_context(|| format!("Staging root {} is not accessible", root.display()))?;

    let auth_token = ctx.token.clone().or_else(|| server_cfg.auth_token.clone());
    if auth_token.is_none() && !addr.ip().is_loopback() {
        eprintln!(
            "warning: no auth token configured while listening on {}",
            addr.ip()
        );
    }

    let config = ServerConfig::new(auth_token)
        .with_bind_address(addr)
        .with_root(&root)
        .with_rate_limiting(server_cfg.rate_limiting)
        .with_api_rpm(server_cfg.api_rpm)
        .with_request_logging(server_cfg.request_logging)
        .with_max_body_size(server_cfg.max_body_size);

    // ── Session store ───────────────────────────────────────────────────

    let store = ExpiringSessionStore::new(
        StoreConfig::new()
            .with_capacity(session_cfg.capacity)
            .with_sweep_interval(Duration::from_millis(session_cfg.sweep_interval_ms))
            .with_queue_capacity(session_cfg.queue_capacity),
    );

    // ── Reload ──────────────────────────────────────────────────────────

    let roles = RoleTable::builtin()
        .with_overrides(&reload_cfg.roles)
        .context("Invalid [reload.roles] pattern")?;
    let manifest = reload_cfg.manifest_path(&root);
    let settings = ReloadSettings::new(&manifest)
        .with_roles(roles)
        .with_skip_roles(reload_cfg.skip_roles.clone())
        .with_session_ttl_secs(session_cfg.ttl_secs);

    let executor = ConsoleReloadExecutor::new(reload_cfg.working_dir_path(&root))?
        .with_script(reload_cfg.script.clone())
        .with_timeout(Duration::from_secs(reload_cfg.timeout_secs));

    if ctx.verbose {
        println!("Root: {}", root.display());
        println!("Manifest: {}", manifest.display());
        println!(
            "Reload: sh {} in {}",
            reload_cfg.script,
            executor.working_dir().display()
        );
        println!("Session TTL: {}s", session_cfg.ttl_secs);
    }

    let coordinator = ReloadCoordinator::new(store, Arc::new(executor), settings);
    let server = Server::new(config, coordinator);

    println!("hotstage server starting on http://{}", addr);
    println!("Press Ctrl+C to stop");

    server.run().await?;
    Ok(())
}
