//! Upload command - stages a configuration file on the server.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::Style;

use super::Context;
use crate::client::Client;
use crate::state::ClientState;

/// Remote directories configuration may be uploaded into.
const ALLOWED_DIRS: [&str; 2] = ["/wedo/ClientConfig", "/wedo/ServerConfig"];

/// Arguments for the upload command.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local configuration file to upload
    #[arg(short, long)]
    pub file: PathBuf,

    /// Remote directory, starting with /wedo/ClientConfig or /wedo/ServerConfig
    #[arg(short, long)]
    pub dir: String,

    /// Fail instead of replacing an existing remote file
    #[arg(long)]
    pub no_overwrite: bool,
}

/// Run the upload command.
pub async fn run(args: UploadArgs, ctx: &Context) -> Result<()> {
    validate_dir(&args.dir)?;
    if !args.file.is_file() {
        anyhow::bail!("{} is not a file", args.file.display());
    }

    let mut state = ClientState::load()?;
    let uuid = state.token_or_create(&ctx.server_url);
    state.save()?;

    let client = Client::new(&ctx.server_url, ctx.token.clone())?;
    let uploaded = client
        .upload(&uuid, &args.dir, &args.file, !args.no_overwrite)
        .await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&uploaded)?);
        return Ok(());
    }

    let green = Style::new().green();
    let dim = Style::new().dim();
    println!(
        "{} {}",
        green.apply_to("✓ uploaded"),
        uploaded.path
    );
    if let Some(ref category) = uploaded.category {
        println!("  {} {}", dim.apply_to("Category:"), category);
    }
    if let Some(ref backup) = uploaded.backup_dir {
        println!("  {} {}", dim.apply_to("Backup:"), backup);
    }
    if ctx.verbose {
        println!("  {} {}", dim.apply_to("Session:"), uuid);
    }
    Ok(())
}

/// Only the client and server configuration trees may be uploaded into.
fn validate_dir(dir: &str) -> Result<()> {
    if ALLOWED_DIRS.iter().any(|prefix| dir.starts_with(prefix)) {
        Ok(())
    } else {
        anyhow::bail!(
            "the upload directory must start with {} or {}",
            ALLOWED_DIRS[0],
            ALLOWED_DIRS[1]
        )
    }
}
