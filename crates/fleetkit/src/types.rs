//! Core types for fleet management

use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// CIDR meaning "every IPv4 address"
pub const OPEN_IPV4: &str = "0.0.0.0/0";

/// CIDR meaning "every IPv6 address"
pub const OPEN_IPV6: &str = "::/0";

/// A tag attached to a server.
///
/// Flag tags carry only a key (`critical`); pair tags carry a key and a
/// value (`env:prod`). Scope resolution treats the two differently, so they
/// are distinct variants rather than an optional value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Tag with no value
    Flag { key: String },
    /// Tag with a key and a value
    Pair { key: String, value: String },
}

impl Tag {
    /// Build a tag from the provider's loose key/optional-value shape.
    ///
    /// A missing or empty value yields a flag tag.
    pub fn from_parts(key: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => Self::Pair {
                key: key.into(),
                value: v.to_string(),
            },
            _ => Self::Flag { key: key.into() },
        }
    }

    pub fn flag(key: impl Into<String>) -> Self {
        Self::Flag { key: key.into() }
    }

    pub fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Pair {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The tag key, for either variant
    pub fn key(&self) -> &str {
        match self {
            Self::Flag { key } | Self::Pair { key, .. } => key,
        }
    }

    /// The tag value, if this is a pair tag
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Flag { .. } => None,
            Self::Pair { value, .. } => Some(value),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag { key } => write!(f, "{key}"),
            Self::Pair { key, value } => write!(f, "{key}:{value}"),
        }
    }
}

/// One inbound firewall rule, in the provider's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRule {
    /// ICMP rules carry the type here and may use -1
    pub from_port: i32,
    pub to_port: i32,
    pub protocol: String,
    #[serde(default)]
    pub cidrs: Vec<String>,
    #[serde(default)]
    pub ipv6_cidrs: Vec<String>,
    #[serde(default)]
    pub cidr_list_aliases: Vec<String>,
}

impl PortRule {
    pub fn new(from_port: i32, to_port: i32, protocol: &str, cidrs: &[&str]) -> Self {
        Self {
            from_port,
            to_port,
            protocol: protocol.to_string(),
            cidrs: cidrs.iter().map(|c| (*c).to_string()).collect(),
            ipv6_cidrs: Vec::new(),
            cidr_list_aliases: Vec::new(),
        }
    }

    /// Whether the rule admits every source address
    pub fn is_open_to_all(&self) -> bool {
        self.cidrs.iter().any(|c| c == OPEN_IPV4) || self.ipv6_cidrs.iter().any(|c| c == OPEN_IPV6)
    }

    /// Sources for display: `["all"]` for open rules, otherwise CIDRs then aliases.
    pub fn sources(&self) -> Vec<String> {
        if self.is_open_to_all() {
            return vec!["all".to_string()];
        }
        self.cidrs
            .iter()
            .chain(&self.ipv6_cidrs)
            .chain(&self.cidr_list_aliases)
            .cloned()
            .collect()
    }
}

/// A fleet member, normalized from a provider instance record.
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub name: String,
    /// Sorted by key
    pub tags: Vec<Tag>,
    pub internal_ip: String,
    /// Stopped instances have no public address
    pub external_ip: Option<String>,
    pub cpu_count: u32,
    pub memory_gb: f64,
    pub firewall_rules: Vec<PortRule>,
    pub state: String,
}

impl Server {
    /// Flag tags, comma separated
    pub fn flag_tags(&self) -> String {
        self.tags
            .iter()
            .filter(|t| matches!(t, Tag::Flag { .. }))
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Pair tags as `key:value`, comma separated
    pub fn pair_tags(&self) -> String {
        self.tags
            .iter()
            .filter(|t| matches!(t, Tag::Pair { .. }))
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `name (ip)`, used to label command output
    pub fn display_address(&self) -> String {
        format!(
            "{} ({})",
            self.name,
            self.external_ip.as_deref().unwrap_or("no public IP")
        )
    }

    /// Whether the server carries the pair tag `key:value`
    pub fn has_pair(&self, key: &str, value: &str) -> bool {
        self.tags
            .iter()
            .any(|t| t.key() == key && t.value() == Some(value))
    }

    /// Whether the server carries any tag with this key
    pub fn has_key(&self, key: &str) -> bool {
        self.tags.iter().any(|t| t.key() == key)
    }
}

/// Comparison operators supported by the provider's alarms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    GreaterThanOrEqualToThreshold,
    GreaterThanThreshold,
    LessThanThreshold,
    LessThanOrEqualToThreshold,
}

impl ComparisonOperator {
    /// Wire name, as accepted by the provider API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GreaterThanOrEqualToThreshold => "GreaterThanOrEqualToThreshold",
            Self::GreaterThanThreshold => "GreaterThanThreshold",
            Self::LessThanThreshold => "LessThanThreshold",
            Self::LessThanOrEqualToThreshold => "LessThanOrEqualToThreshold",
        }
    }

    /// Short symbol for tables
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::GreaterThanOrEqualToThreshold => ">=",
            Self::GreaterThanThreshold => ">",
            Self::LessThanThreshold => "<",
            Self::LessThanOrEqualToThreshold => "<=",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn default_treat_missing_data() -> String {
    "breaching".to_string()
}

pub(crate) fn default_contact_protocols() -> Vec<String> {
    vec!["Email".to_string()]
}

pub(crate) fn default_notification_triggers() -> Vec<String> {
    vec!["OK".to_string(), "ALARM".to_string()]
}

const fn default_true() -> bool {
    true
}

/// A concrete alarm bound to one server.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmDefinition {
    /// `<server>_<alarm base name>`
    pub name: String,
    pub server: String,
    pub metric: String,
    pub operator: ComparisonOperator,
    pub threshold: f64,
    pub evaluation_periods: u32,
    pub datapoints_to_alarm: u32,
    pub treat_missing_data: String,
    pub contact_protocols: Vec<String>,
    pub notification_triggers: Vec<String>,
    pub notification_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredResource {
    pub name: String,
}

/// An alarm as it currently exists at the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub name: String,
    #[serde(rename = "monitoredResourceInfo")]
    pub monitored_resource: MonitoredResource,
    #[serde(rename = "metricName")]
    pub metric: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub period: u32,
    #[serde(default)]
    pub statistic: String,
    pub threshold: f64,
    #[serde(default)]
    pub unit: String,
    pub datapoints_to_alarm: u32,
    pub evaluation_periods: u32,
    #[serde(rename = "comparisonOperator")]
    pub operator: ComparisonOperator,
    #[serde(default = "default_treat_missing_data")]
    pub treat_missing_data: String,
    #[serde(default)]
    pub contact_protocols: Vec<String>,
    #[serde(default)]
    pub notification_triggers: Vec<String>,
    #[serde(default = "default_true")]
    pub notification_enabled: bool,
}

impl Alarm {
    /// Name of the server this alarm watches
    pub fn server(&self) -> &str {
        &self.monitored_resource.name
    }

    /// Whether the alarm is currently OK
    pub fn is_ok(&self) -> bool {
        self.state == "OK"
    }

    /// Project the live alarm onto the definition it would have been created from.
    pub fn definition(&self) -> AlarmDefinition {
        AlarmDefinition {
            name: self.name.clone(),
            server: self.monitored_resource.name.clone(),
            metric: self.metric.clone(),
            operator: self.operator,
            threshold: self.threshold,
            evaluation_periods: self.evaluation_periods,
            datapoints_to_alarm: self.datapoints_to_alarm,
            treat_missing_data: self.treat_missing_data.clone(),
            contact_protocols: self.contact_protocols.clone(),
            notification_triggers: self.notification_triggers.clone(),
            notification_enabled: self.notification_enabled,
        }
    }
}

/// One page of a paginated provider listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A page with no continuation
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// Result of running a command on one server.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub server: String,
    pub display_address: String,
    pub result: Result<Vec<String>, TransportError>,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Lifecycle of one fan-out worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}
