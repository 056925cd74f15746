//! Firewall reconciler - full replacement of a server's public ports

use crate::error::Result;
use crate::policy::PolicySet;
use crate::provider::CloudProvider;
use crate::types::{PortRule, Server};

/// Alias granting the provider's browser console access to a port
pub const CONSOLE_ALIAS: &str = "lightsail-connect";

/// Management port that must always stay reachable from the console
pub const SSH_PORT: i32 = 22;

/// Rules every matched scope declares for `server`, in matcher order.
///
/// Rules accumulate across scopes without deduplication. Any rule ending on
/// the SSH port also admits the console alias.
pub fn desired_rules(server: &Server, policies: &PolicySet<PortRule>) -> Vec<PortRule> {
    let mut rules = Vec::new();
    for (scope, declared) in policies.matching(server) {
        log::debug!("{}: {} rules from scope {}", server.name, declared.len(), scope);
        rules.extend(declared.iter().cloned());
    }

    for rule in &mut rules {
        if rule.to_port == SSH_PORT && !rule.cidr_list_aliases.iter().any(|a| a == CONSOLE_ALIAS) {
            rule.cidr_list_aliases.push(CONSOLE_ALIAS.to_string());
        }
    }
    rules
}

/// Push the complete desired rule set to the provider.
///
/// Always a full replace, even when nothing changed. Returns the applied
/// rules.
pub fn reconcile(
    provider: &dyn CloudProvider,
    server: &Server,
    policies: &PolicySet<PortRule>,
) -> Result<Vec<PortRule>> {
    let rules = desired_rules(server, policies);
    log::info!("Setting {} port rules on {}", rules.len(), server.name);
    provider.set_instance_ports(&server.name, &rules)?;
    Ok(rules)
}
