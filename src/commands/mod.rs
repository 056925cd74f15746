// Read-only views
pub mod servers;

// Views plus reconcilers
pub mod alerts;
pub mod firewall;

// Fan-out
pub mod command;

use anyhow::{Context as _, Result};
use fleetkit::Server;
use indicatif::ProgressBar;

use crate::Context;
use crate::cli::TargetArgs;
use crate::progress;

/// Spinner that stays hidden in quiet mode
fn spinner(ctx: &Context, msg: &str) -> ProgressBar {
    if ctx.quiet {
        ProgressBar::hidden()
    } else {
        progress::spinner(msg)
    }
}

/// List the servers selected by `--tag`, sorted by name
pub fn list_targets(ctx: &Context, target: &TargetArgs) -> Result<Vec<Server>> {
    let filter = target.filter();
    let pb = spinner(ctx, &format!("Listing servers in {}", ctx.settings.region));
    let listed = fleetkit::list_servers(ctx.provider.as_ref(), filter.as_ref());
    progress::finish_clear(&pb);

    let mut servers = listed.context("Could not list servers")?;
    servers.sort_by(|a, b| a.name.cmp(&b.name));

    if filter.is_some() {
        log::info!("{} servers match --tag={}", servers.len(), target.tag);
    } else {
        log::info!("{} servers", servers.len());
    }
    Ok(servers)
}

/// `a, b, c`
fn server_names(servers: &[Server]) -> String {
    servers
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
