//! Incident command handlers.

use tabled::Tabled;

use tpsguard_api::appliance::Incident;
use tpsguard_core::incidents::short_id;

use crate::cli::{GlobalOpts, IncidentsArgs, IncidentsCommand, OutputFormat};
use crate::config::{self, Runtime};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct IncidentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Zone")]
    zone: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn incident_row(incident: &Incident, color: bool) -> IncidentRow {
    let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
    IncidentRow {
        id: incident.incident_id.as_deref().map_or_else(|| "-".into(), short_id),
        zone: or_dash(&incident.zone_name),
        severity: output::paint_severity(incident.severity.as_deref().unwrap_or("-"), color),
        started: or_dash(&incident.start_time),
        status: or_dash(&incident.status),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: IncidentsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let runtime = Runtime::from_config(&cfg)?;
    let client = runtime.client();

    match args.command {
        None => {
            let page = client.ongoing_incidents(args.page.page, args.page.items).await?;
            let color = output::should_color(global.color);
            let mut out = output::render_list(global.output, &page.incident_list, |i| incident_row(i, color))?;
            if global.output == OutputFormat::Table {
                out.push_str(&format!("\n{} ongoing incidents", page.total_items));
            }
            output::print_output(&out);
        }

        Some(IncidentsCommand::Show { id }) => {
            let detail = client.incident_detail(&id).await?;
            // The detail record has no fixed shape; tables fall back to pretty JSON
            let out = match global.output {
                OutputFormat::JsonCompact => serde_json::to_string(&detail)?,
                OutputFormat::Table | OutputFormat::Json => serde_json::to_string_pretty(&detail)?,
            };
            output::print_output(&out);
        }
    }
    Ok(())
}
