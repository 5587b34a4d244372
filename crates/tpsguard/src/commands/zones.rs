//! Zone command handlers.

use tabled::Tabled;

use tpsguard_api::appliance::ZoneSummary;

use crate::cli::{GlobalOpts, OutputFormat, ZonesArgs, ZonesCommand};
use crate::config::{self, Runtime};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ZoneRow {
    #[tabled(rename = "Zone")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Mode")]
    mode: String,
}

fn zone_row(zone: &ZoneSummary, color: bool) -> ZoneRow {
    ZoneRow {
        name: zone.zone_name.clone(),
        id: zone.id.clone(),
        mode: output::paint_mode(zone.operational_mode.as_deref().unwrap_or("unknown"), color),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ZonesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let runtime = Runtime::from_config(&cfg)?;
    let reconciler = runtime.reconciler();
    let color = output::should_color(global.color);

    match args.command {
        ZonesCommand::List(page) => {
            let listing = reconciler.list_zones(page.page, page.items).await?;
            let out = if global.output == OutputFormat::Table {
                let table = output::render_list(global.output, &listing.zones, |z| zone_row(z, color))?;
                format!(
                    "{table}\nPage {} ({} per page), {} zones in total",
                    listing.page, listing.items, listing.total
                )
            } else {
                output::render_single(global.output, &listing, |_| String::new())?
            };
            output::print_output(&out);
        }

        ZonesCommand::Status { ip } => {
            let status = reconciler.zone_status(&ip).await?;
            let out = output::render_single(global.output, &status, |s| {
                output::detail_block(&[
                    ("Zone", s.zone_name.clone()),
                    ("Zone ID", s.zone_id.clone()),
                    ("Mode", output::paint_mode(&s.operational_mode, color)),
                    ("Services", s.services_count.to_string()),
                    ("IPs", s.ip_list.join(", ")),
                ])
            })?;
            output::print_output(&out);
        }
    }
    Ok(())
}
