//! Lightsail provider backed by the `aws` CLI
//!
//! Every call is `aws lightsail <operation> --region <r> [--profile <p>]
//! --output json --no-paginate`, one page per call.

use fleetkit::{Alarm, AlarmDefinition, CloudProvider, Error, Instance, Page, PortRule, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::process::Command;

use crate::runner;

/// Optional access key id, forwarded as `AWS_ACCESS_KEY_ID`
pub const ENV_ACCOUNT: &str = "LIGHTSAIL_ACCOUNT";

/// Optional secret key, forwarded as `AWS_SECRET_ACCESS_KEY`
pub const ENV_SECRET: &str = "LIGHTSAIL_SECRET";

#[derive(Debug, Clone)]
pub struct AwsCliProvider {
    program: String,
    region: String,
    profile: Option<String>,
    credentials: Option<(String, String)>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstancesResponse {
    #[serde(default)]
    instances: Vec<Instance>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlarmsResponse {
    #[serde(default)]
    alarms: Vec<Alarm>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyPairResponse {
    private_key_base64: String,
}

impl AwsCliProvider {
    pub fn new(region: &str, profile: Option<&str>) -> Self {
        let credentials = match (std::env::var(ENV_ACCOUNT), std::env::var(ENV_SECRET)) {
            (Ok(account), Ok(secret)) if !account.is_empty() && !secret.is_empty() => {
                log::debug!("Using credentials from {ENV_ACCOUNT}/{ENV_SECRET}");
                Some((account, secret))
            }
            _ => None,
        };

        Self {
            program: "aws".to_string(),
            region: region.to_string(),
            profile: profile.map(ToString::to_string),
            credentials,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Whether the `aws` executable is on PATH
    pub fn is_available(&self) -> bool {
        runner::command_exists(&self.program)
    }

    fn base_args(&self, operation: &str) -> Vec<String> {
        let mut args = vec![
            "lightsail".to_string(),
            operation.to_string(),
            "--region".to_string(),
            self.region.clone(),
        ];
        if let Some(profile) = &self.profile {
            args.extend(["--profile".to_string(), profile.clone()]);
        }
        args.extend(["--output", "json", "--no-paginate"].map(String::from));
        args
    }

    fn command(&self, operation: &str, extra: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.base_args(operation)).args(extra);
        if let Some((account, secret)) = &self.credentials {
            cmd.env("AWS_ACCESS_KEY_ID", account)
                .env("AWS_SECRET_ACCESS_KEY", secret);
        }
        cmd
    }

    fn call(&self, operation: &str, extra: &[String]) -> Result<String> {
        let mut cmd = self.command(operation, extra);
        let output =
            runner::capture(&mut cmd).map_err(|e| Error::provider(operation, format!("{e:#}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::provider(operation, stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn call_json<T: DeserializeOwned>(&self, operation: &str, extra: &[String]) -> Result<T> {
        let stdout = self.call(operation, extra)?;
        serde_json::from_str(&stdout)
            .map_err(|e| Error::provider(operation, format!("unexpected response: {e}")))
    }
}

fn page_args(page_token: Option<&str>) -> Vec<String> {
    page_token
        .map(|t| vec!["--page-token".to_string(), t.to_string()])
        .unwrap_or_default()
}

fn put_alarm_args(definition: &AlarmDefinition) -> Vec<String> {
    let mut args = vec![
        "--alarm-name".to_string(),
        definition.name.clone(),
        "--metric-name".to_string(),
        definition.metric.clone(),
        "--monitored-resource-name".to_string(),
        definition.server.clone(),
        "--comparison-operator".to_string(),
        definition.operator.as_str().to_string(),
        "--threshold".to_string(),
        definition.threshold.to_string(),
        "--evaluation-periods".to_string(),
        definition.evaluation_periods.to_string(),
        "--datapoints-to-alarm".to_string(),
        definition.datapoints_to_alarm.to_string(),
        "--treat-missing-data".to_string(),
        definition.treat_missing_data.clone(),
    ];

    if !definition.contact_protocols.is_empty() {
        args.push("--contact-protocols".to_string());
        args.extend(definition.contact_protocols.iter().cloned());
    }
    if !definition.notification_triggers.is_empty() {
        args.push("--notification-triggers".to_string());
        args.extend(definition.notification_triggers.iter().cloned());
    }
    args.push(if definition.notification_enabled {
        "--notification-enabled".to_string()
    } else {
        "--no-notification-enabled".to_string()
    });
    args
}

fn port_args(server: &str, rules: &[PortRule]) -> Result<Vec<String>> {
    Ok(vec![
        "--instance-name".to_string(),
        server.to_string(),
        "--port-infos".to_string(),
        serde_json::to_string(rules)?,
    ])
}

impl CloudProvider for AwsCliProvider {
    fn list_instances(&self, page_token: Option<&str>) -> Result<Page<Instance>> {
        let response: InstancesResponse = self.call_json("get-instances", &page_args(page_token))?;
        log::debug!("get-instances returned {} instances", response.instances.len());
        Ok(Page {
            items: response.instances,
            next_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    fn list_alarms(&self, page_token: Option<&str>) -> Result<Page<Alarm>> {
        let response: AlarmsResponse = self.call_json("get-alarms", &page_args(page_token))?;
        log::debug!("get-alarms returned {} alarms", response.alarms.len());
        Ok(Page {
            items: response.alarms,
            next_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    fn put_alarm(&self, definition: &AlarmDefinition) -> Result<()> {
        self.call("put-alarm", &put_alarm_args(definition))?;
        Ok(())
    }

    fn delete_alarm(&self, name: &str) -> Result<()> {
        self.call("delete-alarm", &["--alarm-name".to_string(), name.to_string()])?;
        Ok(())
    }

    fn set_instance_ports(&self, server: &str, rules: &[PortRule]) -> Result<()> {
        self.call("put-instance-public-ports", &port_args(server, rules)?)?;
        Ok(())
    }

    fn download_default_key_pair(&self) -> Result<String> {
        let response: KeyPairResponse = self.call_json("download-default-key-pair", &[])?;
        Ok(response.private_key_base64)
    }
}
