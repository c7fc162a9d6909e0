//! Reload command - reloads every process affected by the session's uploads.

use anyhow::Result;
use clap::Args;
use console::Style;

use super::Context;
use crate::client::Client;
use crate::state::ClientState;

/// Arguments for the reload command.
#[derive(Args, Debug)]
pub struct ReloadArgs {}

/// Run the reload command.
///
/// The stored session token is dropped whatever the outcome: the server
/// releases the session once a reload has run.
pub async fn run(_args: ReloadArgs, ctx: &Context) -> Result<()> {
    let mut state = ClientState::load()?;
    let Some(uuid) = state.token(&ctx.server_url).map(str::to_string) else {
        anyhow::bail!(
            "no session for {}: upload files first",
            ctx.server_url
        );
    };

    let client = Client::new(&ctx.server_url, ctx.token.clone())?;
    let result = client.reload(&uuid).await;

    state.reset(&ctx.server_url);
    state.save()?;

    let report = result?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let green = Style::new().green();
        let red = Style::new().red();
        let dim = Style::new().dim();

        if !report.target.is_empty() {
            println!("  {} {}", dim.apply_to("Target:"), report.target);
        }
        for line in &report.msg {
            println!("  {}", line);
        }
        if report.succeeded() {
            println!("{}", green.apply_to("✓ reload succeeded"));
        } else {
            println!("{}", red.apply_to("✗ reload failed"));
        }
    }

    if !report.succeeded() {
        anyhow::bail!("reload failed");
    }
    Ok(())
}
