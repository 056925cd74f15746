use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use fleetkit::TagFilter;

#[derive(Parser)]
#[command(name = "sailfleet")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Lightsail fleet helper - servers, firewalls, alarms and remote commands", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Region to manage (defaults to the configured region)
    #[arg(long, global = true, env = "SAILFLEET_REGION")]
    pub region: Option<String>,

    /// AWS CLI profile to use
    #[arg(long, global = true, env = "SAILFLEET_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List servers with their addresses and tags
    Servers(TargetArgs),

    /// Show the public firewall rules of each server
    Firewall(TargetArgs),

    /// Replace each server's firewall with the declared rules
    #[command(name = "setFirewall", alias = "set-firewall")]
    SetFirewall(TargetArgs),

    /// Show alarms and their state
    Alerts(TargetArgs),

    /// Converge alarms to the declared definitions
    #[command(name = "setAlerts", alias = "set-alerts")]
    SetAlerts(TargetArgs),

    /// Run a shell command on every server in parallel
    Command(CommandArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Clone, Default)]
pub struct TargetArgs {
    /// Only servers carrying this tag, as `key` or `key:value`
    #[arg(long, default_value = "")]
    pub tag: String,
}

impl TargetArgs {
    pub fn filter(&self) -> Option<TagFilter> {
        TagFilter::parse(&self.tag)
    }
}

#[derive(Args, Clone)]
pub struct CommandArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Command to run on each server; empty prompts for one
    #[arg(long, default_value = "hostname")]
    pub command: String,

    /// Maximum concurrent connections (0 = one per server)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}
