//! `system`: appliance identity (also a quick credentials check), device
//! inventory and license.

use tabled::Tabled;

use tpsguard_api::appliance::Device;

use crate::cli::{GlobalOpts, SystemArgs, SystemCommand};
use crate::config::{self, Runtime};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Mgmt IP")]
    mgmt_ip: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Firmware")]
    firmware: String,
    #[tabled(rename = "Admin")]
    admin: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            name: show(d.dns_name.as_deref()),
            mgmt_ip: show(d.mgmt_ip_address.as_deref()),
            model: show(d.model.as_deref()),
            firmware: show(d.firmware_version.as_deref()),
            admin: show(d.admin_status_label.as_deref()),
            status: show(d.oper_status_label.as_deref()),
        }
    }
}

fn show(v: Option<&str>) -> String {
    v.unwrap_or("-").to_owned()
}

pub async fn handle(args: SystemArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let runtime = Runtime::from_config(&cfg)?;
    let client = runtime.client();

    let out = match args.command {
        None => {
            let info = client.system_info().await?;
            output::render_single(global.output, &info, |i| {
                output::detail_block(&[
                    ("Appliance", client.base_url().to_string()),
                    ("Hostname", show(i.hostname.as_deref())),
                    ("Product", show(i.product_name.as_deref())),
                    ("Version", show(i.version.as_deref())),
                    ("Serial", show(i.serial_number.as_deref())),
                    ("Uptime", show(i.uptime.as_deref())),
                ])
            })?
        }

        Some(SystemCommand::Devices) => {
            let devices = client.devices().await?;
            output::render_list(global.output, &devices.object_list, |d| DeviceRow::from(d))?
        }

        Some(SystemCommand::License) => {
            let license = client.license().await?;
            output::render_single(global.output, &license, |l| {
                let count = |v: Option<u64>| v.map_or_else(|| "-".into(), |n| n.to_string());
                output::detail_block(&[
                    ("Type", show(l.license_type.as_deref())),
                    ("Max Devices", count(l.max_devices)),
                    ("Max Objects", count(l.max_objects)),
                    ("Usage", show(l.remaining.as_deref())),
                    ("Expires", show(l.expires_at.as_deref())),
                ])
            })?
        }
    };
    output::print_output(&out);
    Ok(())
}
