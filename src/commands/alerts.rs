use anyhow::{Context as _, Result, bail};
use fleetkit::{Alarm, AlarmChange, AlarmTemplate, PolicySet, alarms};

use crate::Context;
use crate::cli::TargetArgs;
use crate::progress;
use crate::ui::{self, Align, Column};

fn metric_label(metric: &str) -> &str {
    match metric {
        "CPUUtilization" => "CPU",
        "BurstCapacityPercentage" => "Burst",
        other => other,
    }
}

fn unit_label(unit: &str) -> &str {
    match unit {
        "Percent" => "%",
        _ => "?",
    }
}

fn columns<'a>() -> Vec<Column<'a, Alarm>> {
    vec![
        Column::new("server", Align::Left, 32, |a: &Alarm| a.server().to_string()),
        Column::new("metric", Align::Right, 32, |a: &Alarm| metric_label(&a.metric).to_string()),
        Column::new("state", Align::Center, 6, |a: &Alarm| {
            if a.is_ok() { String::new() } else { "!!".to_string() }
        }),
        Column::new("operator", Align::Center, 3, |a: &Alarm| a.operator.symbol().to_string()),
        Column::new("threshold", Align::Right, 5, |a: &Alarm| a.threshold.to_string()),
        Column::new("unit", Align::Center, 3, |a: &Alarm| unit_label(&a.unit).to_string()),
        Column::new("incidents", Align::Center, 3, |a: &Alarm| a.datapoints_to_alarm.to_string()),
        Column::new("period (sec.)", Align::Right, 3, |a: &Alarm| {
            (u64::from(a.period) * u64::from(a.evaluation_periods)).to_string()
        }),
    ]
}

fn sort_alarms(alarms: &mut [Alarm]) {
    alarms.sort_by(|a, b| {
        (a.server(), a.metric.as_str(), a.name.as_str()).cmp(&(b.server(), b.metric.as_str(), b.name.as_str()))
    });
}

/// Show the alarms of the targeted servers
pub fn show(ctx: &Context, target: &TargetArgs) -> Result<()> {
    let servers = super::list_targets(ctx, target)?;

    let pb = super::spinner(ctx, "Fetching alarms");
    let listed = alarms::live_alarms(ctx.provider.as_ref(), &servers);
    progress::finish_clear(&pb);

    let mut live = listed.context("Could not list alarms")?;
    sort_alarms(&mut live);

    ui::print_table(&columns(), &live);
    println!("Servers: {}", super::server_names(&servers));
    Ok(())
}

/// Converge the targeted servers' alarms to the declared ones, then show them
pub fn apply(ctx: &Context, target: &TargetArgs) -> Result<()> {
    let path = ctx.settings.alarm_policy_path(&ctx.config_dir);
    let policies = PolicySet::<AlarmTemplate>::load_or_empty(&path);
    let servers = super::list_targets(ctx, target)?;

    if policies.is_empty() && !servers.is_empty() {
        ui::warn(&format!(
            "No alarms declared in {}; existing alarms on {} servers will be deleted",
            path.display(),
            servers.len()
        ));
    }

    let pb = super::spinner(ctx, "Reconciling alarms");
    let reconciled = alarms::reconcile(ctx.provider.as_ref(), &servers, &policies);
    progress::finish_clear(&pb);
    let report = reconciled.context("Could not reconcile alarms")?;

    for (name, change) in &report.changes {
        match change {
            AlarmChange::NoChange => log::debug!("{name}: unchanged"),
            AlarmChange::Created => log::info!("{name}: created"),
            AlarmChange::Updated => log::info!("{name}: updated"),
            AlarmChange::Deleted => log::info!("{name}: deleted"),
            AlarmChange::Failed { error } => ui::error(&format!("{name}: {error}")),
        }
    }

    show(ctx, target)?;

    if !ctx.quiet {
        ui::info(&format!(
            "{} created, {} updated, {} deleted, {} unchanged",
            report.created(),
            report.updated(),
            report.deleted(),
            report.unchanged()
        ));
    }

    if !report.is_success() {
        bail!("{} alarm changes failed", report.failures().len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetkit::ComparisonOperator;

    fn alarm(server: &str, metric: &str, state: &str) -> Alarm {
        serde_json::from_value(serde_json::json!({
            "name": format!("{server}_{metric}"),
            "monitoredResourceInfo": {"name": server},
            "metricName": metric,
            "state": state,
            "period": 300,
            "threshold": 80.0,
            "unit": "Percent",
            "datapointsToAlarm": 2,
            "evaluationPeriods": 3,
            "comparisonOperator": "GreaterThanOrEqualToThreshold"
        }))
        .unwrap()
    }

    #[test]
    fn test_labels() {
        assert_eq!(metric_label("CPUUtilization"), "CPU");
        assert_eq!(metric_label("BurstCapacityPercentage"), "Burst");
        assert_eq!(metric_label("NetworkIn"), "NetworkIn");
        assert_eq!(unit_label("Percent"), "%");
        assert_eq!(unit_label("Bytes"), "?");
    }

    #[test]
    fn test_sort_by_server_then_metric() {
        let mut alarms = vec![
            alarm("web-2", "CPUUtilization", "OK"),
            alarm("web-1", "StatusCheckFailed", "OK"),
            alarm("web-1", "CPUUtilization", "ALARM"),
        ];
        sort_alarms(&mut alarms);
        let names: Vec<&str> = alarms.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["web-1_CPUUtilization", "web-1_StatusCheckFailed", "web-2_CPUUtilization"]
        );
    }

    #[test]
    fn test_alarm_row() {
        let live = alarm("web-1", "CPUUtilization", "ALARM");
        assert_eq!(live.operator, ComparisonOperator::GreaterThanOrEqualToThreshold);

        let table = ui::render_table(&columns(), &[live]);
        let row = table.lines().nth(3).unwrap();
        let cells: Vec<&str> = row.trim_matches('|').split('|').map(str::trim).collect();
        assert_eq!(cells, vec!["web-1", "CPU", "!!", ">=", "80", "%", "2", "900"]);
    }
}
