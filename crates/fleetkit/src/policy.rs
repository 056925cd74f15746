//! Policy documents - declared firewall rules and alarms, keyed by tag scope
//!
//! A policy document is a JSON array. Every record names an optional
//! `tagKey`/`tagValue` pair selecting the servers it applies to, plus the
//! fields of the item itself:
//!
//! ```json
//! [
//!   {"tagKey": "",    "tagValue": "",     "fromPort": 22,  "toPort": 22,  "protocol": "tcp", "cidrs": ["10.0.0.0/8"]},
//!   {"tagKey": "env", "tagValue": "prod", "fromPort": 443, "toPort": 443, "protocol": "tcp", "cidrs": ["0.0.0.0/0"]}
//! ]
//! ```

use crate::error::{Error, Result};
use crate::matcher::resolve_scopes;
use crate::types::Server;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Which servers a policy entry applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeKey {
    /// Every server
    All,
    /// Servers carrying a flag tag with this key
    Key(String),
    /// Servers carrying exactly this pair tag
    Pair { key: String, value: String },
}

impl ScopeKey {
    /// Resolve the scope of a declared entry.
    ///
    /// Empty key means all servers; the value is ignored unless a key is set.
    pub fn from_declaration(tag_key: Option<&str>, tag_value: Option<&str>) -> Self {
        let key = tag_key.map(str::trim).unwrap_or_default();
        let value = tag_value.map(str::trim).unwrap_or_default();
        match (key.is_empty(), value.is_empty()) {
            (true, _) => Self::All,
            (false, true) => Self::Key(key.to_string()),
            (false, false) => Self::Pair {
                key: key.to_string(),
                value: value.to_string(),
            },
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Key(key) => f.write_str(key),
            Self::Pair { key, value } => write!(f, "{key}:{value}"),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scoped<T> {
    #[serde(default)]
    tag_key: Option<String>,
    #[serde(default)]
    tag_value: Option<String>,
    #[serde(flatten)]
    item: T,
}

/// Declared items grouped by scope, in declaration order within each scope.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySet<T> {
    scopes: BTreeMap<ScopeKey, Vec<T>>,
}

impl<T> Default for PolicySet<T> {
    fn default() -> Self {
        Self {
            scopes: BTreeMap::new(),
        }
    }
}

impl<T> PolicySet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item to a scope
    pub fn insert(&mut self, scope: ScopeKey, item: T) {
        self.scopes.entry(scope).or_default().push(item);
    }

    /// Items declared for exactly this scope
    pub fn get(&self, scope: &ScopeKey) -> &[T] {
        self.scopes.get(scope).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, scope: &ScopeKey) -> bool {
        self.scopes.contains_key(scope)
    }

    /// Total number of declared items
    pub fn len(&self) -> usize {
        self.scopes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scopes that apply to `server`, in application order, with their items.
    ///
    /// Scopes absent from the set are skipped.
    pub fn matching<'a>(
        &'a self,
        server: &Server,
    ) -> impl Iterator<Item = (ScopeKey, &'a [T])> + use<'a, T> {
        resolve_scopes(server)
            .into_iter()
            .filter_map(|scope| self.scopes.get(&scope).map(|items| (scope, items.as_slice())))
    }
}

impl<T: DeserializeOwned> PolicySet<T> {
    /// Parse a JSON policy document
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        let records: Vec<Scoped<T>> = serde_json::from_str(content)?;
        let mut set = Self::new();
        for record in records {
            let scope =
                ScopeKey::from_declaration(record.tag_key.as_deref(), record.tag_value.as_deref());
            set.insert(scope, record.item);
        }
        Ok(set)
    }

    /// Load a policy document.
    ///
    /// A missing file is an empty policy; an unreadable or malformed one is
    /// an [`Error::PolicyLoad`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No policy document at {}", path.display());
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::PolicyLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let set = Self::from_json(&content).map_err(|e| Error::PolicyLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        log::debug!("Loaded {} policy entries from {}", set.len(), path.display());
        Ok(set)
    }

    /// Load a policy document, degrading any failure to an empty policy.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(set) => set,
            Err(e) => {
                log::warn!("{e}; continuing with an empty policy");
                Self::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::AlarmTemplate;
    use crate::types::{ComparisonOperator, PortRule};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scope_from_declaration() {
        assert_eq!(ScopeKey::from_declaration(None, None), ScopeKey::All);
        assert_eq!(ScopeKey::from_declaration(Some(""), Some("prod")), ScopeKey::All);
        assert_eq!(
            ScopeKey::from_declaration(Some("critical"), Some("")),
            ScopeKey::Key("critical".into())
        );
        assert_eq!(
            ScopeKey::from_declaration(Some("env"), Some("prod")),
            ScopeKey::Pair {
                key: "env".into(),
                value: "prod".into()
            }
        );
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(ScopeKey::All.to_string(), "*");
        assert_eq!(ScopeKey::Key("critical".into()).to_string(), "critical");
        assert_eq!(
            ScopeKey::from_declaration(Some("env"), Some("prod")).to_string(),
            "env:prod"
        );
    }

    #[test]
    fn test_firewall_document() {
        let doc = r#"[
            {"tagKey": "", "tagValue": "", "fromPort": 22, "toPort": 22, "protocol": "tcp", "cidrs": ["10.0.0.0/8"]},
            {"tagKey": "env", "tagValue": "prod", "fromPort": 443, "toPort": 443, "protocol": "tcp", "cidrs": ["0.0.0.0/0"]},
            {"tagKey": "env", "tagValue": "prod", "fromPort": 80, "toPort": 80, "protocol": "tcp", "cidrs": ["0.0.0.0/0"]},
            {"tagKey": null, "fromPort": 3000, "toPort": 3000, "protocol": "udp", "cidrs": []}
        ]"#;
        let set = PolicySet::<PortRule>::from_json(doc).unwrap();

        assert_eq!(set.len(), 4);
        let all: Vec<_> = set.get(&ScopeKey::All).iter().map(|r| r.to_port).collect();
        assert_eq!(all, vec![22, 3000]);
        let prod: Vec<_> = set
            .get(&ScopeKey::from_declaration(Some("env"), Some("prod")))
            .iter()
            .map(|r| r.to_port)
            .collect();
        assert_eq!(prod, vec![443, 80]);
    }

    #[test]
    fn test_alarm_document() {
        let doc = r#"[
            {"tagKey": "", "tagValue": "", "alarmName": "cpu", "metricName": "CPUUtilization",
             "threshold": 80, "evaluationPeriods": 3, "datapointsToAlarm": 2,
             "comparisonOperator": "GreaterThanOrEqualToThreshold"}
        ]"#;
        let set = PolicySet::<AlarmTemplate>::from_json(doc).unwrap();
        let cpu = &set.get(&ScopeKey::All)[0];
        assert_eq!(cpu.alarm_name, "cpu");
        assert!((cpu.threshold - 80.0).abs() < f64::EPSILON);
        assert_eq!(cpu.comparison_operator, ComparisonOperator::GreaterThanOrEqualToThreshold);
        assert_eq!(cpu.treat_missing_data, "breaching");
    }

    #[test]
    fn test_missing_document_is_empty() {
        let dir = TempDir::new().unwrap();
        let set = PolicySet::<PortRule>::load(&dir.path().join("absent.json")).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_malformed_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("firewall_rules.json");
        fs::write(&path, "[{\"fromPort\": \"twenty-two\"}]").unwrap();

        let err = PolicySet::<PortRule>::load(&path).unwrap_err();
        assert!(matches!(err, Error::PolicyLoad { .. }));
        assert!(PolicySet::<PortRule>::load_or_empty(&path).is_empty());
    }
}
