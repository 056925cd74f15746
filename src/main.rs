mod aws;
mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod runner;
mod ssh;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::Settings;
use fleetkit::CloudProvider;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub settings: Settings,
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
    pub provider: Arc<dyn CloudProvider>,
}

impl Context {
    fn load(quiet: bool, region: Option<String>, profile: Option<String>) -> Result<Self> {
        let config_dir = paths::config_dir()?;
        let state_dir = paths::state_dir()?;

        let mut settings = Settings::load_default(&config_dir)?;
        if let Some(region) = region {
            settings.region = region;
        }
        if profile.is_some() {
            settings.profile = profile;
        }

        let provider = aws::AwsCliProvider::new(&settings.region, settings.profile.as_deref());
        if !provider.is_available() {
            ui::warn("The aws CLI was not found on PATH; provider calls will fail");
        }
        log::info!("Managing region {}", provider.region());

        Ok(Self {
            quiet,
            settings,
            config_dir,
            state_dir,
            provider: Arc::new(provider),
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let start = Instant::now();
    let Cli {
        quiet,
        region,
        profile,
        command,
        ..
    } = cli;
    let ctx = || Context::load(quiet, region.clone(), profile.clone());

    let result = match command {
        Command::Servers(target) => commands::servers::run(&ctx()?, &target),
        Command::Firewall(target) => commands::firewall::show(&ctx()?, &target),
        Command::SetFirewall(target) => commands::firewall::apply(&ctx()?, &target),
        Command::Alerts(target) => commands::alerts::show(&ctx()?, &target),
        Command::SetAlerts(target) => commands::alerts::apply(&ctx()?, &target),
        Command::Command(args) => commands::command::run(&ctx()?, &args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "sailfleet", &mut io::stdout());
            return Ok(());
        }
    };

    if !quiet {
        println!("Time: {}", ui::format_elapsed(start.elapsed()));
    }
    result
}
