//! Fleet catalog - list instances and normalize them into [`Server`]s

use crate::error::Result;
use crate::provider::CloudProvider;
use crate::types::{PortRule, Server, Tag};
use serde::{Deserialize, Serialize};

/// Raw instance record as returned by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<RawTag>,
    #[serde(default)]
    pub private_ip_address: String,
    #[serde(default)]
    pub public_ip_address: Option<String>,
    #[serde(default)]
    pub state: InstanceState,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub networking: Networking,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTag {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceState {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hardware {
    #[serde(default)]
    pub cpu_count: u32,
    #[serde(default)]
    pub ram_size_in_gb: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Networking {
    #[serde(default)]
    pub ports: Vec<PortRule>,
}

impl From<Instance> for Server {
    fn from(instance: Instance) -> Self {
        let mut tags: Vec<Tag> = instance
            .tags
            .iter()
            .map(|t| Tag::from_parts(t.key.clone(), t.value.as_deref()))
            .collect();
        // stable: equal keys keep provider order
        tags.sort_by(|a, b| a.key().cmp(b.key()));

        Self {
            name: instance.name,
            tags,
            internal_ip: instance.private_ip_address,
            external_ip: instance.public_ip_address.filter(|ip| !ip.is_empty()),
            cpu_count: instance.hardware.cpu_count,
            memory_gb: instance.hardware.ram_size_in_gb,
            firewall_rules: instance.networking.ports,
            state: instance.state.name,
        }
    }
}

/// Tag selector from `--tag=key[:value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub key: String,
    pub value: Option<String>,
}

impl TagFilter {
    /// Parse `key` or `key:value`. Returns `None` for an empty key.
    ///
    /// Only the first `:` separates key from value.
    pub fn parse(spec: &str) -> Option<Self> {
        let (key, value) = match spec.split_once(':') {
            Some((k, v)) => (k, Some(v)),
            None => (spec, None),
        };
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self {
            key: key.to_string(),
            value: value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string),
        })
    }

    /// Whether a server is selected by this filter
    pub fn matches(&self, server: &Server) -> bool {
        match &self.value {
            Some(value) => server.has_pair(&self.key, value),
            None => server.has_key(&self.key),
        }
    }
}

/// List every server, optionally filtered by tag.
///
/// All pages are fetched before filtering; any failing page aborts the
/// listing.
pub fn list_servers(provider: &dyn CloudProvider, filter: Option<&TagFilter>) -> Result<Vec<Server>> {
    let mut instances = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = provider.list_instances(token.as_deref())?;
        log::debug!("Fetched {} instances", page.items.len());
        instances.extend(page.items);
        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    let servers: Vec<Server> = instances
        .into_iter()
        .map(Server::from)
        .filter(|s| filter.is_none_or(|f| f.matches(s)))
        .collect();

    log::info!("{} servers selected", servers.len());
    Ok(servers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockProvider, instance};

    #[test]
    fn test_tag_filter_parse() {
        assert_eq!(
            TagFilter::parse("team:payments"),
            Some(TagFilter {
                key: "team".into(),
                value: Some("payments".into())
            })
        );
        assert_eq!(
            TagFilter::parse("critical"),
            Some(TagFilter {
                key: "critical".into(),
                value: None
            })
        );
        assert_eq!(
            TagFilter::parse("url:http://x"),
            Some(TagFilter {
                key: "url".into(),
                value: Some("http://x".into())
            })
        );
        assert_eq!(TagFilter::parse(""), None);
        assert_eq!(TagFilter::parse(":prod"), None);
        assert_eq!(TagFilter::parse("critical:").unwrap().value, None);
    }

    fn payments_fleet() -> MockProvider {
        MockProvider::with_instance_pages(vec![
            vec![
                instance("api-1", &[("team", Some("payments"))]),
                instance("api-2", &[("team", Some("search"))]),
                instance("db-1", &[("team", None)]),
            ],
            vec![
                instance("worker-1", &[("env", Some("prod")), ("team", Some("payments"))]),
                instance("worker-2", &[]),
            ],
        ])
    }

    #[test]
    fn test_list_servers_pair_filter() {
        let provider = payments_fleet();
        let filter = TagFilter::parse("team:payments");
        let servers = list_servers(&provider, filter.as_ref()).unwrap();

        let names: Vec<_> = servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["api-1", "worker-1"]);
    }

    #[test]
    fn test_list_servers_without_filter_returns_all_pages() {
        let provider = payments_fleet();
        let servers = list_servers(&provider, TagFilter::parse("").as_ref()).unwrap();
        assert_eq!(servers.len(), 5);
        assert_eq!(provider.instance_calls(), 2);
    }

    #[test]
    fn test_flag_tags_never_match_value_filter() {
        let provider = MockProvider::with_instance_pages(vec![vec![instance(
            "db-1",
            &[("payments", None)],
        )]]);
        let filter = TagFilter::parse("payments:payments");
        assert!(list_servers(&provider, filter.as_ref()).unwrap().is_empty());
    }

    #[test]
    fn test_key_only_filter_matches_flags_and_pairs() {
        let provider = payments_fleet();
        let filter = TagFilter::parse("team");
        let servers = list_servers(&provider, filter.as_ref()).unwrap();
        assert_eq!(servers.len(), 4);
    }

    #[test]
    fn test_tags_sorted_by_key() {
        let provider = MockProvider::with_instance_pages(vec![vec![instance(
            "web-1",
            &[("zone", Some("a")), ("critical", None), ("env", Some("prod"))],
        )]]);
        let servers = list_servers(&provider, None).unwrap();
        let keys: Vec<_> = servers[0].tags.iter().map(Tag::key).collect();
        assert_eq!(keys, vec!["critical", "env", "zone"]);
    }

    #[test]
    fn test_listing_failure_on_later_page_propagates() {
        let mut provider = payments_fleet();
        provider.fail_instance_page = Some(1);
        let err = list_servers(&provider, None).unwrap_err();
        assert!(err.is_provider());
    }

    #[test]
    fn test_instance_deserializes_provider_shape() {
        let json = r#"{
            "name": "web-1",
            "tags": [{"key": "env", "value": "prod"}, {"key": "critical"}],
            "privateIpAddress": "172.26.0.10",
            "publicIpAddress": "3.3.3.3",
            "state": {"code": 16, "name": "running"},
            "hardware": {"cpuCount": 2, "ramSizeInGb": 4.0},
            "networking": {"ports": [
                {"fromPort": 22, "toPort": 22, "protocol": "tcp", "accessFrom": "Anywhere",
                 "cidrs": ["0.0.0.0/0"], "ipv6Cidrs": ["::/0"], "cidrListAliases": []}
            ]}
        }"#;
        let server = Server::from(serde_json::from_str::<Instance>(json).unwrap());
        assert_eq!(server.tags, vec![Tag::flag("critical"), Tag::pair("env", "prod")]);
        assert_eq!(server.external_ip.as_deref(), Some("3.3.3.3"));
        assert_eq!(server.cpu_count, 2);
        assert_eq!(server.state, "running");
        assert!(server.firewall_rules[0].is_open_to_all());
    }
}
