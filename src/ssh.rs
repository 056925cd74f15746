//! Remote execution over the system `ssh` client

use fleetkit::{CredentialProvider, RemoteExecutor, TransportError};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SshSettings;
use crate::runner;

pub struct SshExecutor {
    program: String,
    user: String,
    connect_timeout: Duration,
    command_timeout: Duration,
    credentials: Arc<dyn CredentialProvider>,
}

impl SshExecutor {
    pub fn new(settings: &SshSettings, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            program: "ssh".to_string(),
            user: settings.user.clone(),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            command_timeout: Duration::from_secs(settings.command_timeout_secs),
            credentials,
        }
    }

    fn args(&self, key: &Path, host: &str, command: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            key.display().to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs()),
            format!("{}@{}", self.user, host),
            command.to_string(),
        ]
    }
}

impl RemoteExecutor for SshExecutor {
    fn execute(&self, host: &str, command: &str) -> Result<Vec<String>, TransportError> {
        let key = self
            .credentials
            .private_key_path()
            .map_err(|e| TransportError::Credentials(e.to_string()))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(&key, host, command));

        let output = runner::capture_with_timeout(&mut cmd, self.command_timeout)
            .map_err(|e| TransportError::Spawn(e.to_string()))?
            .ok_or(TransportError::Timeout {
                secs: self.command_timeout.as_secs(),
            })?;

        if !output.status.success() {
            return Err(TransportError::NonZeroExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(ToString::to_string)
            .collect())
    }
}
