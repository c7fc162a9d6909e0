//! Status command - shows server and session status.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use super::Context;
use crate::client::{Client, SessionInfo};
use crate::state::ClientState;

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {}

/// Status response for JSON output.
#[derive(Debug, Serialize)]
struct StatusOutput {
    running: bool,
    version: Option<String>,
    server_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionInfo>,
}

/// Run the status command.
pub async fn run(_args: StatusArgs, ctx: &Context) -> Result<()> {
    let client = Client::new(&ctx.server_url, ctx.token.clone())?;
    let state = ClientState::load()?;
    let uuid = state.token(&ctx.server_url).unwrap_or_default().to_string();

    let health = client.health().await;
    let session = match health {
        Ok(_) => match client.session(&uuid).await {
            Ok(info) => Some(info),
            Err(e) => {
                if ctx.verbose {
                    eprintln!("warning: failed to read session status: {}", e);
                }
                None
            }
        },
        Err(_) => None,
    };

    if ctx.json_output {
        let output = StatusOutput {
            running: health.is_ok(),
            version: health.as_ref().ok().map(|h| h.version.clone()),
            server_url: ctx.server_url.clone(),
            session,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let green = Style::new().green();
    let red = Style::new().red();
    let dim = Style::new().dim();

    println!();
    println!("{}", style("hotstage Server Status").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();

    match health {
        Ok(health) => {
            println!("  {} {}", dim.apply_to("Status:"), green.apply_to("● running"));
            println!("  {} {}", dim.apply_to("Version:"), health.version);
            if ctx.verbose {
                println!("  {} {}", dim.apply_to("Health:"), health.status);
            }
            println!("  {} {}", dim.apply_to("Server:"), ctx.server_url);

            if let Some(session) = session {
                println!();
                print_session(&session, &uuid);
            }
        }
        Err(e) => {
            println!(
                "  {} {}",
                dim.apply_to("Status:"),
                red.apply_to("● not running")
            );
            println!("  {} {}", dim.apply_to("Server:"), ctx.server_url);

            if ctx.verbose {
                println!();
                println!("  {} {}", dim.apply_to("Error:"), e);
            }

            println!();
            println!(
                "  {}",
                dim.apply_to("Start the server with: hotstage start")
            );
        }
    }

    println!();
    Ok(())
}

fn print_session(session: &SessionInfo, uuid: &str) {
    let dim = Style::new().dim();

    println!("  {} {}", dim.apply_to("Phase:"), session.phase);
    println!(
        "  {} {}/{}",
        dim.apply_to("Sessions:"),
        session.store.live,
        session.store.capacity
    );

    if uuid.is_empty() {
        println!("  {} none", dim.apply_to("Your session:"));
        return;
    }
    if !session.live {
        println!("  {} {} (not live)", dim.apply_to("Your session:"), uuid);
        return;
    }

    println!("  {} {}", dim.apply_to("Your session:"), uuid);
    if let Some(ttl) = session.ttl_secs {
        println!("  {} {}s", dim.apply_to("Expires in:"), ttl);
    }
    for dir in &session.directories {
        println!(
            "    {}  db={} xml={} svr={}",
            dir.dir, dir.db_files, dir.xml_files, dir.server_files
        );
    }
}
