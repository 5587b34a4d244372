// ── Mitigation reconciler ──
//
// Brings a target IP into the protected state whatever its prior state:
// an existing zone is re-synced with the template's monitor payload, a
// missing zone is created from the template first. Zone creation config
// of an existing zone is never touched.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use tpsguard_api::ApplianceClient;
use tpsguard_api::appliance::ZoneSummary;

use crate::config::NotifyFlags;
use crate::error::CoreError;
use crate::notify::{EventType, Level, Notification, SharedSink};
use crate::template::{Template, TemplateStore, service_list_len};

/// Result of [`Reconciler::ensure_mitigation`]. Callers branch on this
/// rather than on an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MitigationOutcome {
    Success { zone_id: String, message: String },
    #[serde(rename = "error")]
    Failure { message: String },
}

impl MitigationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Failure { message } => message,
        }
    }
}

/// Terminal state reported by [`Reconciler::remove_zone`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RemovalStatus {
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneRemoval {
    pub status: RemovalStatus,
    pub zone_id: String,
    pub message: String,
}

/// One page of zones as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneListing {
    pub total: u64,
    pub page: u32,
    pub items: u32,
    pub zones: Vec<ZoneSummary>,
}

/// Current protection status of one IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneStatus {
    pub zone_name: String,
    pub zone_id: String,
    pub operational_mode: String,
    pub services_count: usize,
    pub ip_list: Vec<String>,
}

/// Idempotent create-or-sync of mitigation zones.
pub struct Reconciler {
    client: Arc<ApplianceClient>,
    templates: Arc<dyn TemplateStore>,
    sink: SharedSink,
    notify: NotifyFlags,
}

impl Reconciler {
    pub fn new(
        client: Arc<ApplianceClient>,
        templates: Arc<dyn TemplateStore>,
        sink: SharedSink,
        notify: NotifyFlags,
    ) -> Self {
        Self {
            client,
            templates,
            sink,
            notify,
        }
    }

    /// Ensure `ip` is protected, creating its zone from a template if needed.
    ///
    /// Never returns an error: every failure is folded into
    /// [`MitigationOutcome::Failure`].
    pub async fn ensure_mitigation(&self, ip: &str, template: Option<&str>) -> MitigationOutcome {
        match self.try_ensure(ip, template).await {
            Ok((zone_id, message)) => MitigationOutcome::Success { zone_id, message },
            Err(e) => MitigationOutcome::Failure {
                message: format!("Error ensuring mitigation for {ip}: {e}"),
            },
        }
    }

    async fn try_ensure(&self, ip: &str, template: Option<&str>) -> Result<(String, String), CoreError> {
        let template = self.select_template(template)?;

        match self.client.find_zone_by_ip(ip).await? {
            Some(existing) => self.resync(ip, &existing, &template).await,
            None => self.create(ip, &template).await,
        }
    }

    /// Named template, or the only stored one when no name is given.
    fn select_template(&self, name: Option<&str>) -> Result<Template, CoreError> {
        if let Some(name) = name {
            return self.templates.get(name);
        }
        let mut available = self.templates.list()?;
        match available.len() {
            0 => Err(CoreError::NoTemplates),
            1 => {
                let only = available.remove(0);
                info!(template = %only.name, "auto-selected the only template");
                self.templates.get(&only.name)
            }
            _ => Err(CoreError::AmbiguousTemplate {
                names: available.into_iter().map(|t| t.name).collect(),
            }),
        }
    }

    async fn resync(
        &self,
        ip: &str,
        zone: &ZoneSummary,
        template: &Template,
    ) -> Result<(String, String), CoreError> {
        let details = self.client.get_zone(&zone.id).await?;
        let mode = str_or(&details, "operational_mode", "unknown");
        let services = count_services(&details);
        let profile = str_or(&details, "profile_name", "N/A");

        self.client
            .enable_monitor(&zone.id, &Value::Object(template.monitor_payload.clone()))
            .await?;

        info!(
            target: "audit",
            ip, zone_id = %zone.id, mode = %mode, template = %template.name,
            "zone re-deployed"
        );

        if self.notify.mitigation_start {
            self.sink.notify(
                Notification::new(
                    EventType::MitigationStart,
                    Level::Info,
                    "Mitigation Re-deployed",
                    format!("Protection re-synced for existing zone (was in {mode} mode)"),
                )
                .field("IP", ip)
                .field("Template", &template.name)
                .field("Zone ID", short_zone_id(&zone.id))
                .field("Mode", &mode)
                .field("Services", services.to_string())
                .field("Profile", profile),
            );
        }

        Ok((
            zone.id.clone(),
            format!("Zone {ip} already exists (mode: {mode}). Re-deployed and synced to TPS devices."),
        ))
    }

    async fn create(&self, ip: &str, template: &Template) -> Result<(String, String), CoreError> {
        let mut payload = template.zone_payload.clone();
        payload.insert("zone_name".into(), Value::from(ip));
        payload.insert("ip_list".into(), Value::from(vec![ip]));
        payload.insert("input_ips".into(), Value::from(vec![ip]));
        let services = service_list_len(&payload);
        let profile = str_or(&payload, "profile_name", "N/A");

        let created = self.client.create_zone(&Value::Object(payload)).await?;
        let zone_id = created
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CoreError::ReconciliationFailed {
                message: format!(
                    "zone create response carried no id: {}",
                    Value::Object(created.extra)
                ),
            })?;

        self.client
            .enable_monitor(&zone_id, &Value::Object(template.monitor_payload.clone()))
            .await?;

        info!(
            target: "audit",
            ip, zone_id = %zone_id, template = %template.name,
            "zone created and deployed"
        );

        if self.notify.mitigation_start {
            self.sink.notify(
                Notification::new(
                    EventType::MitigationStart,
                    Level::Warning,
                    "Mitigation Started",
                    format!("Protection activated using template '{}'", template.name),
                )
                .field("IP", ip)
                .field("Template", &template.name)
                .field("Zone ID", short_zone_id(&zone_id))
                .field("Services", services.to_string())
                .field("Profile", profile),
            );
        }

        let message = format!(
            "Started mitigation for {ip}. Created from template '{}' and deployed to TPS.",
            template.name
        );
        Ok((zone_id, message))
    }

    /// Delete the zone protecting `ip`.
    ///
    /// Fails with [`CoreError::ZoneNotFound`] when no zone matches.
    pub async fn remove_zone(&self, ip: &str) -> Result<ZoneRemoval, CoreError> {
        let zone = self
            .client
            .find_zone_by_ip(ip)
            .await?
            .ok_or_else(|| CoreError::ZoneNotFound { ip: ip.to_owned() })?;
        let mode = zone.operational_mode.clone().unwrap_or_else(|| "N/A".into());

        self.client.delete_zone(&zone.id, &zone.zone_name).await?;
        info!(target: "audit", ip, zone_id = %zone.id, "zone deleted");

        if self.notify.mitigation_stop {
            self.sink.notify(
                Notification::new(
                    EventType::MitigationStop,
                    Level::Error,
                    "Mitigation Stopped",
                    format!("Protection removed (zone was in {mode} mode)"),
                )
                .field("IP", ip)
                .field("Zone ID", short_zone_id(&zone.id))
                .field("Mode", mode),
            );
        }

        Ok(ZoneRemoval {
            status: RemovalStatus::Deleted,
            zone_id: zone.id,
            message: format!("Zone {ip} removed successfully"),
        })
    }

    /// One page of the zone listing.
    pub async fn list_zones(&self, page: u32, items: u32) -> Result<ZoneListing, CoreError> {
        let raw = self.client.list_zones(page, items).await?;
        Ok(ZoneListing {
            total: raw.total,
            page,
            items,
            zones: raw.object_list.iter().filter_map(ZoneSummary::from_row).collect(),
        })
    }

    /// Protection status of the zone for `ip`.
    pub async fn zone_status(&self, ip: &str) -> Result<ZoneStatus, CoreError> {
        let zone = self
            .client
            .find_zone_by_ip(ip)
            .await?
            .ok_or_else(|| CoreError::ZoneNotFound { ip: ip.to_owned() })?;
        let details = self.client.get_zone(&zone.id).await?;

        let ip_list = details
            .get("ip_list")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_else(|| vec![ip.to_owned()]);

        Ok(ZoneStatus {
            zone_name: ip.to_owned(),
            zone_id: zone.id,
            operational_mode: str_or(&details, "operational_mode", "unknown"),
            services_count: count_services(&details),
            ip_list,
        })
    }
}

/// Services on a zone: `zone_service_list`, or failing that the largest
/// per-device service map under `uuid_dict`.
fn count_services(details: &Map<String, Value>) -> usize {
    let listed = details
        .get("zone_service_list")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    if listed > 0 {
        return listed;
    }
    details
        .get("uuid_dict")
        .and_then(Value::as_object)
        .map_or(0, |devices| {
            devices
                .values()
                .filter_map(|device| device.get("service"))
                .map(|service| match service {
                    Value::Object(map) => map.len(),
                    Value::Array(list) => list.len(),
                    _ => 0,
                })
                .max()
                .unwrap_or(0)
        })
}

fn str_or(map: &Map<String, Value>, key: &str, default: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_owned()
}

fn short_zone_id(id: &str) -> String {
    id.chars().take(8).collect()
}
