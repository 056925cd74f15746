use anyhow::Result;
use fleetkit::Server;

use crate::Context;
use crate::cli::TargetArgs;
use crate::ui::{self, Align, Column};

fn columns<'a>() -> Vec<Column<'a, Server>> {
    vec![
        Column::new("server", Align::Left, 32, |s: &Server| s.name.clone()),
        Column::new("cpu", Align::Right, 3, |s: &Server| s.cpu_count.to_string()),
        Column::new("RAM (Gb)", Align::Center, 6, |s: &Server| s.memory_gb.to_string()),
        Column::new("public IP", Align::Left, 16, |s: &Server| {
            s.external_ip.clone().unwrap_or_default()
        }),
        Column::new("private IP", Align::Left, 16, |s: &Server| s.internal_ip.clone()),
        Column::new("state", Align::Center, 7, |s: &Server| s.state.clone()),
        Column::new("flags", Align::Left, 5, Server::flag_tags),
        Column::new("tags", Align::Left, 5, Server::pair_tags),
    ]
}

pub fn run(ctx: &Context, target: &TargetArgs) -> Result<()> {
    let servers = super::list_targets(ctx, target)?;
    if servers.is_empty() {
        ui::warn("No servers match");
        return Ok(());
    }

    ui::print_table(&columns(), &servers);
    Ok(())
}
