//! Alarm reconciler - fingerprint-based diff against live alarms
//!
//! 1. Bind every matched template to its server (`<server>_<alarm>`)
//! 2. List live alarms for exactly those servers
//! 3. Skip alarms whose fingerprint already matches, upsert the rest
//! 4. Delete live alarms nothing declares anymore

use crate::error::Result;
use crate::policy::PolicySet;
use crate::provider::CloudProvider;
use crate::types::{
    Alarm, AlarmDefinition, ComparisonOperator, Server, default_contact_protocols,
    default_notification_triggers, default_treat_missing_data,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// An alarm declared in a policy document, not yet bound to a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmTemplate {
    pub alarm_name: String,
    pub metric_name: String,
    pub comparison_operator: ComparisonOperator,
    pub threshold: f64,
    pub evaluation_periods: u32,
    pub datapoints_to_alarm: u32,
    #[serde(default = "default_treat_missing_data")]
    pub treat_missing_data: String,
}

impl AlarmTemplate {
    /// Instantiate the template for one server
    pub fn bind(&self, server: &str) -> AlarmDefinition {
        AlarmDefinition {
            name: format!("{}_{}", server, self.alarm_name),
            server: server.to_string(),
            metric: self.metric_name.clone(),
            operator: self.comparison_operator,
            threshold: self.threshold,
            evaluation_periods: self.evaluation_periods,
            datapoints_to_alarm: self.datapoints_to_alarm,
            treat_missing_data: self.treat_missing_data.clone(),
            contact_protocols: default_contact_protocols(),
            notification_triggers: default_notification_triggers(),
            notification_enabled: true,
        }
    }
}

/// Content digest of an alarm's configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AlarmDefinition {
    /// Canonical wire representation, without the alarm name.
    ///
    /// Keys are emitted sorted and list fields are sorted, so the same
    /// configuration always serializes to the same bytes.
    pub fn canonical(&self) -> serde_json::Value {
        let mut protocols = self.contact_protocols.clone();
        protocols.sort();
        let mut triggers = self.notification_triggers.clone();
        triggers.sort();

        serde_json::json!({
            "comparisonOperator": self.operator.as_str(),
            "contactProtocols": protocols,
            "datapointsToAlarm": self.datapoints_to_alarm,
            "evaluationPeriods": self.evaluation_periods,
            "metricName": self.metric,
            "monitoredResourceName": self.server,
            "notificationEnabled": self.notification_enabled,
            "notificationTriggers": triggers,
            "threshold": self.threshold,
            "treatMissingData": self.treat_missing_data,
        })
    }

    /// blake3 digest of [`canonical`](Self::canonical)
    pub fn fingerprint(&self) -> Fingerprint {
        let canonical = self.canonical().to_string();
        Fingerprint(blake3::hash(canonical.as_bytes()).to_hex().to_string())
    }
}

/// Every alarm the policies declare for `servers`.
///
/// When two scopes declare the same derived name for one server, the later
/// scope's definition replaces the earlier one in place.
pub fn desired_alarms(servers: &[Server], policies: &PolicySet<AlarmTemplate>) -> Vec<AlarmDefinition> {
    let mut alarms: Vec<AlarmDefinition> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for server in servers {
        for (scope, templates) in policies.matching(server) {
            for template in templates {
                let definition = template.bind(&server.name);
                match index.get(&definition.name) {
                    Some(&at) => {
                        log::warn!(
                            "Alarm {} redeclared by scope {}; keeping the later definition",
                            definition.name,
                            scope
                        );
                        alarms[at] = definition;
                    }
                    None => {
                        index.insert(definition.name.clone(), alarms.len());
                        alarms.push(definition);
                    }
                }
            }
        }
    }
    alarms
}

/// One step of an alarm plan
#[derive(Debug, Clone, PartialEq)]
pub enum AlarmOp {
    /// Live alarm already matches
    Skip(String),
    /// Create or update; `exists` tells which
    Upsert {
        definition: AlarmDefinition,
        exists: bool,
    },
    /// Orphaned live alarm
    Delete(String),
}

impl AlarmOp {
    pub fn name(&self) -> &str {
        match self {
            Self::Skip(name) | Self::Delete(name) => name,
            Self::Upsert { definition, .. } => &definition.name,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Skip(_))
    }
}

/// Ordered operations converging live alarms to the desired set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmPlan {
    pub ops: Vec<AlarmOp>,
}

impl AlarmPlan {
    /// Number of provider calls the plan will issue
    pub fn mutations(&self) -> usize {
        self.ops.iter().filter(|op| op.is_mutation()).count()
    }
}

/// Three-way diff of desired alarms against live ones.
///
/// `live` must already be restricted to the servers being reconciled.
/// Desired alarms are processed in order; orphans are deleted last, sorted
/// by name.
pub fn plan(desired: &[AlarmDefinition], live: &[Alarm]) -> AlarmPlan {
    let mut remaining: BTreeMap<&str, Fingerprint> = live
        .iter()
        .map(|alarm| (alarm.name.as_str(), alarm.definition().fingerprint()))
        .collect();

    let mut ops = Vec::with_capacity(desired.len() + remaining.len());
    for definition in desired {
        match remaining.remove(definition.name.as_str()) {
            Some(existing) if existing == definition.fingerprint() => {
                ops.push(AlarmOp::Skip(definition.name.clone()));
            }
            Some(_) => ops.push(AlarmOp::Upsert {
                definition: definition.clone(),
                exists: true,
            }),
            None => ops.push(AlarmOp::Upsert {
                definition: definition.clone(),
                exists: false,
            }),
        }
    }

    ops.extend(remaining.into_keys().map(|name| AlarmOp::Delete(name.to_string())));
    AlarmPlan { ops }
}

/// Outcome of applying one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmChange {
    NoChange,
    Created,
    Updated,
    Deleted,
    Failed { error: String },
}

/// Per-alarm results of a reconciliation
#[derive(Debug, Clone, Default)]
pub struct AlarmReport {
    pub changes: Vec<(String, AlarmChange)>,
}

impl AlarmReport {
    fn count(&self, f: impl Fn(&AlarmChange) -> bool) -> usize {
        self.changes.iter().filter(|(_, c)| f(c)).count()
    }

    pub fn unchanged(&self) -> usize {
        self.count(|c| matches!(c, AlarmChange::NoChange))
    }

    pub fn created(&self) -> usize {
        self.count(|c| matches!(c, AlarmChange::Created))
    }

    pub fn updated(&self) -> usize {
        self.count(|c| matches!(c, AlarmChange::Updated))
    }

    pub fn deleted(&self) -> usize {
        self.count(|c| matches!(c, AlarmChange::Deleted))
    }

    /// Names and errors of the operations that failed
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.changes
            .iter()
            .filter_map(|(name, change)| match change {
                AlarmChange::Failed { error } => Some((name.as_str(), error.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failures().is_empty()
    }
}

/// Live alarms watching one of `servers`
pub fn live_alarms(provider: &dyn CloudProvider, servers: &[Server]) -> Result<Vec<Alarm>> {
    let names: HashSet<&str> = servers.iter().map(|s| s.name.as_str()).collect();
    let alarms: Vec<Alarm> = provider
        .list_all_alarms()?
        .into_iter()
        .filter(|alarm| names.contains(alarm.server()))
        .collect();
    Ok(alarms)
}

/// Apply a plan, recording failures without stopping.
pub fn apply(provider: &dyn CloudProvider, plan: &AlarmPlan) -> AlarmReport {
    let mut report = AlarmReport::default();
    for op in &plan.ops {
        let change = match op {
            AlarmOp::Skip(_) => AlarmChange::NoChange,
            AlarmOp::Upsert { definition, exists } => match provider.put_alarm(definition) {
                Ok(()) if *exists => AlarmChange::Updated,
                Ok(()) => AlarmChange::Created,
                Err(e) => AlarmChange::Failed {
                    error: e.to_string(),
                },
            },
            AlarmOp::Delete(name) => match provider.delete_alarm(name) {
                Ok(()) => AlarmChange::Deleted,
                Err(e) => AlarmChange::Failed {
                    error: e.to_string(),
                },
            },
        };

        if let AlarmChange::Failed { error } = &change {
            log::warn!("Alarm {} failed: {}", op.name(), error);
        } else {
            log::debug!("Alarm {}: {:?}", op.name(), change);
        }
        report.changes.push((op.name().to_string(), change));
    }
    report
}

/// Converge the alarms of `servers` to what `policies` declare.
///
/// Fails only when the live alarms cannot be listed; individual upsert and
/// delete failures are reported in the returned [`AlarmReport`].
pub fn reconcile(
    provider: &dyn CloudProvider,
    servers: &[Server],
    policies: &PolicySet<AlarmTemplate>,
) -> Result<AlarmReport> {
    let desired = desired_alarms(servers, policies);
    let live = live_alarms(provider, servers)?;
    let plan = plan(&desired, &live);
    log::info!(
        "{} desired alarms, {} live, {} changes",
        desired.len(),
        live.len(),
        plan.mutations()
    );
    Ok(apply(provider, &plan))
}
