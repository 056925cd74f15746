//! Collaborator traits
//!
//! The core never talks to the cloud or to SSH directly. These traits are
//! the seams: the binary supplies real implementations, tests supply mocks.

use crate::catalog::Instance;
use crate::error::{Result, TransportError};
use crate::types::{Alarm, AlarmDefinition, Page, PortRule};
use std::path::PathBuf;

/// Cloud provider API used by the catalog and the reconcilers.
pub trait CloudProvider: Send + Sync {
    /// List one page of instances
    fn list_instances(&self, page_token: Option<&str>) -> Result<Page<Instance>>;

    /// List one page of alarms
    fn list_alarms(&self, page_token: Option<&str>) -> Result<Page<Alarm>>;

    /// Create or update an alarm
    fn put_alarm(&self, definition: &AlarmDefinition) -> Result<()>;

    /// Delete an alarm by name
    fn delete_alarm(&self, name: &str) -> Result<()>;

    /// Replace every public port rule of an instance
    fn set_instance_ports(&self, server: &str, rules: &[PortRule]) -> Result<()>;

    /// Download the region's default key pair, returning the private key material
    fn download_default_key_pair(&self) -> Result<String>;

    /// Fetch every alarm, following continuation tokens
    fn list_all_alarms(&self) -> Result<Vec<Alarm>> {
        let mut alarms = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.list_alarms(token.as_deref())?;
            alarms.extend(page.items);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(alarms)
    }
}

/// Runs a single command on a single host.
pub trait RemoteExecutor: Send + Sync {
    /// Execute `command` on `host`, returning stdout split into lines
    fn execute(&self, host: &str, command: &str) -> std::result::Result<Vec<String>, TransportError>;
}

/// Supplies the private key used by the remote executor.
pub trait CredentialProvider: Send + Sync {
    /// Path to the private key file, provisioning it on first use
    fn private_key_path(&self) -> Result<PathBuf>;
}
