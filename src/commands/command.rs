use anyhow::{Context as _, Result};
use colored::Colorize;
use dialoguer::Input;
use fleetkit::{CommandOutcome, CredentialProvider, KeyStore, run_on_fleet};
use indicatif::ProgressBar;
use std::sync::Arc;

use crate::Context;
use crate::cli::CommandArgs;
use crate::progress;
use crate::ssh::SshExecutor;
use crate::ui;

fn prompt_command() -> Result<String> {
    Input::<String>::new()
        .with_prompt("Type the command")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read the command")
}

/// Header and body lines for one outcome, uncolored
fn outcome_lines(outcome: &CommandOutcome) -> (String, Vec<String>) {
    let header = format!("--- {} ---", outcome.display_address);
    let body = match &outcome.result {
        Ok(lines) => lines.clone(),
        Err(e) => vec![format!("[{}] {}", e.kind(), e)],
    };
    (header, body)
}

fn print_outcome(outcome: &CommandOutcome) {
    let (header, body) = outcome_lines(outcome);
    println!("{}", header.bold());
    for line in body {
        if outcome.is_success() {
            println!("{line}");
        } else {
            println!("{}", line.red());
        }
    }
}

/// Run one command on every targeted server and stream the results
pub fn run(ctx: &Context, args: &CommandArgs) -> Result<()> {
    let command = if args.command.trim().is_empty() {
        prompt_command()?
    } else {
        args.command.clone()
    };
    if command.trim().is_empty() {
        ui::info("No command given, nothing to run");
        return Ok(());
    }

    let servers = super::list_targets(ctx, &args.target)?;
    if servers.is_empty() {
        ui::warn("No servers match");
        return Ok(());
    }

    let keys = KeyStore::new(Arc::clone(&ctx.provider), &ctx.state_dir, &ctx.settings.region);
    // fail once here rather than once per server
    keys.private_key_path().context("Could not provision the SSH key")?;

    let executor = Arc::new(SshExecutor::new(&ctx.settings.ssh, Arc::new(keys)));
    let options = ctx.settings.fanout_options(args.jobs);
    log::info!(
        "Running {:?} on {} servers ({:?} workers)",
        command,
        servers.len(),
        options.workers
    );

    let mut run = run_on_fleet(executor, &servers, &command, &options);
    let pb = if ctx.quiet {
        ProgressBar::hidden()
    } else {
        progress::counter(run.total(), &command)
    };

    for outcome in run.by_ref() {
        pb.suspend(|| print_outcome(&outcome));
        pb.inc(1);
    }
    progress::finish_clear(&pb);

    let counts = run.counts();
    if !ctx.quiet {
        let summary = format!("{} succeeded, {} failed", counts.succeeded, counts.failed);
        if counts.failed == 0 {
            ui::success(&summary);
        } else {
            ui::warn(&summary);
        }
    }
    Ok(())
}
