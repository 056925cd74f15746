//! `sailfleet.toml` - application settings
//!
//! Every field is optional; a missing file gives the defaults.
//!
//! ```toml
//! region = "eu-west-3"
//! profile = "ops"
//!
//! [ssh]
//! user = "ubuntu"
//! connect_timeout_secs = 10
//! command_timeout_secs = 120
//!
//! [fanout]
//! jobs = 0              # 0 = one thread per server
//! poll_interval_ms = 100
//!
//! [policies]
//! firewall = "firewall_rules.json"
//! alarms = "alarms.json"
//! ```

use anyhow::{Context, Result};
use fleetkit::{FanoutOptions, WorkerLimit};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "sailfleet.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub region: String,
    pub profile: Option<String>,
    pub ssh: SshSettings,
    pub fanout: FanoutSettings,
    pub policies: PolicyFiles,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub user: String,
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutSettings {
    pub jobs: usize,
    pub poll_interval_ms: u64,
}

/// Policy documents, relative to the config directory unless absolute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyFiles {
    pub firewall: String,
    pub alarms: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region: "us-west-2".to_string(),
            profile: None,
            ssh: SshSettings::default(),
            fanout: FanoutSettings::default(),
            policies: PolicyFiles::default(),
        }
    }
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: "ubuntu".to_string(),
            connect_timeout_secs: 10,
            command_timeout_secs: 120,
        }
    }
}

impl Default for FanoutSettings {
    fn default() -> Self {
        Self {
            jobs: 0,
            poll_interval_ms: 100,
        }
    }
}

impl Default for PolicyFiles {
    fn default() -> Self {
        Self {
            firewall: "firewall_rules.json".to_string(),
            alarms: "alarms.json".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid {}", path.display()))
    }

    /// Load `sailfleet.toml` from the config directory
    pub fn load_default(config_dir: &Path) -> Result<Self> {
        Self::load(&config_dir.join(CONFIG_FILE))
    }

    pub fn firewall_policy_path(&self, config_dir: &Path) -> PathBuf {
        paths::resolve_in(config_dir, &self.policies.firewall)
    }

    pub fn alarm_policy_path(&self, config_dir: &Path) -> PathBuf {
        paths::resolve_in(config_dir, &self.policies.alarms)
    }

    /// Fan-out options, with `jobs` overriding the configured worker count
    pub fn fanout_options(&self, jobs: Option<usize>) -> FanoutOptions {
        FanoutOptions {
            workers: WorkerLimit::from_jobs(jobs.unwrap_or(self.fanout.jobs)),
            poll_interval: Duration::from_millis(self.fanout.poll_interval_ms.max(1)),
        }
    }
}
