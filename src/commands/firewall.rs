use anyhow::{Result, bail};
use fleetkit::{PolicySet, PortRule, Server, firewall};

use crate::Context;
use crate::cli::TargetArgs;
use crate::progress;
use crate::ui::{self, Align, Column};

/// One port rule of one server, as displayed
#[derive(Debug, Clone, PartialEq, Eq)]
struct RuleRow {
    server: String,
    from_port: i32,
    to_port: i32,
    protocol: String,
    sources: Vec<String>,
}

impl RuleRow {
    fn port(&self) -> String {
        if self.from_port == self.to_port {
            self.to_port.to_string()
        } else {
            format!("{}-{}", self.from_port, self.to_port)
        }
    }
}

fn rule_rows(servers: &[Server]) -> Vec<RuleRow> {
    let mut rows: Vec<RuleRow> = servers
        .iter()
        .flat_map(|server| {
            server.firewall_rules.iter().map(|rule| RuleRow {
                server: server.name.clone(),
                from_port: rule.from_port,
                to_port: rule.to_port,
                protocol: rule.protocol.clone(),
                sources: rule.sources(),
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        (&a.server, a.to_port, a.from_port).cmp(&(&b.server, b.to_port, b.from_port))
    });
    rows
}

fn columns<'a>() -> Vec<Column<'a, RuleRow>> {
    vec![
        Column::new("server", Align::Left, 32, |r: &RuleRow| r.server.clone()),
        Column::new("port", Align::Right, 5, RuleRow::port),
        Column::new("protocol", Align::Center, 5, |r: &RuleRow| r.protocol.clone()),
        Column::new("limited to", Align::Left, 5, |r: &RuleRow| r.sources.join(",")),
    ]
}

/// Show the public firewall of each targeted server
pub fn show(ctx: &Context, target: &TargetArgs) -> Result<()> {
    let servers = super::list_targets(ctx, target)?;
    ui::print_table(&columns(), &rule_rows(&servers));
    Ok(())
}

/// Replace each targeted server's firewall with the declared rules, then show the result
pub fn apply(ctx: &Context, target: &TargetArgs) -> Result<()> {
    let path = ctx.settings.firewall_policy_path(&ctx.config_dir);
    let policies = PolicySet::<PortRule>::load_or_empty(&path);
    if policies.is_empty() {
        // a full replace with nothing would close every port
        bail!(
            "No firewall rules declared in {}; refusing to close every port",
            path.display()
        );
    }

    let servers = super::list_targets(ctx, target)?;
    let mut failed = Vec::new();
    for server in &servers {
        let pb = super::spinner(ctx, &format!("Setting firewall on {}", server.name));
        match firewall::reconcile(ctx.provider.as_ref(), server, &policies) {
            Ok(rules) => {
                progress::finish_clear(&pb);
                log::info!("{}: {} rules applied", server.name, rules.len());
            }
            Err(e) => {
                progress::finish_error(&pb, &format!("{}: {}", server.name, e));
                failed.push(server.name.clone());
            }
        }
    }

    show(ctx, target)?;

    if !failed.is_empty() {
        bail!(
            "Firewall update failed on {} of {} servers: {}",
            failed.len(),
            servers.len(),
            failed.join(", ")
        );
    }
    if !ctx.quiet {
        ui::success(&format!("Firewall set on {} servers", servers.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetkit::Tag;

    fn server(name: &str, rules: Vec<PortRule>) -> Server {
        Server {
            name: name.into(),
            tags: vec![Tag::flag("web")],
            internal_ip: "172.26.0.1".into(),
            external_ip: Some("3.0.0.1".into()),
            cpu_count: 1,
            memory_gb: 1.0,
            firewall_rules: rules,
            state: "running".into(),
        }
    }

    #[test]
    fn test_rows_sorted_by_server_then_port() {
        let servers = vec![
            server(
                "web-2",
                vec![
                    PortRule::new(443, 443, "tcp", &["0.0.0.0/0"]),
                    PortRule::new(22, 22, "tcp", &["10.0.0.0/8"]),
                ],
            ),
            server("web-1", vec![PortRule::new(8000, 8100, "tcp", &["10.1.0.0/16", "10.2.0.0/16"])]),
        ];

        let rows = rule_rows(&servers);
        let summary: Vec<(String, String, String)> = rows
            .iter()
            .map(|r| (r.server.clone(), r.port(), r.sources.join(",")))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("web-1".into(), "8000-8100".into(), "10.1.0.0/16,10.2.0.0/16".into()),
                ("web-2".into(), "22".into(), "10.0.0.0/8".into()),
                ("web-2".into(), "443".into(), "all".into()),
            ]
        );
    }

    #[test]
    fn test_console_alias_is_listed() {
        let mut ssh = PortRule::new(22, 22, "tcp", &["10.0.0.0/8"]);
        ssh.cidr_list_aliases.push(firewall::CONSOLE_ALIAS.into());
        let rows = rule_rows(&[server("web-1", vec![ssh])]);
        assert_eq!(rows[0].sources, vec!["10.0.0.0/8", "lightsail-connect"]);
    }
}
