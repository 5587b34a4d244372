// ── Template library ──
//
// Write side of template management: save, delete, and import from a live
// zone. Every change is logged to the audit target and, when the
// `template_changes` category is enabled, announced to the sink.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use tpsguard_api::ApplianceClient;
use tpsguard_api::appliance::zones::LOOKUP_PAGE_SIZE;

use crate::config::NotifyFlags;
use crate::error::CoreError;
use crate::incidents::short_id;
use crate::notify::{EventType, Level, Notification, SharedSink};
use crate::template::{Template, TemplateWriter};

/// Manages stored templates on behalf of operators.
pub struct TemplateLibrary {
    store: Arc<dyn TemplateWriter>,
    sink: SharedSink,
    notify: NotifyFlags,
}

impl TemplateLibrary {
    pub fn new(store: Arc<dyn TemplateWriter>, sink: SharedSink, notify: NotifyFlags) -> Self {
        Self {
            store,
            sink,
            notify,
        }
    }

    pub fn get(&self, name: &str) -> Result<Template, CoreError> {
        self.store.get(name)
    }

    /// Validate and store `template`. Returns whether it replaced one.
    pub fn save(&self, template: &Template) -> Result<bool, CoreError> {
        let replaced = self.store.save(template)?;
        info!(
            target: "audit",
            template = %template.name,
            services = template.services_count(),
            protection_values = template.protection_values_count(),
            profile = template.profile_name(),
            action = if replaced { "update" } else { "create" },
            "template saved"
        );

        if self.notify.template_changes {
            let (event, title, verb) = if replaced {
                (EventType::TemplateUpdated, "Template Updated", "updated")
            } else {
                (EventType::TemplateCreated, "Template Created", "created")
            };
            self.sink.notify(
                Notification::new(
                    event,
                    Level::Info,
                    title,
                    format!("Template '{}' {verb} successfully", template.name),
                )
                .field("Services", template.services_count().to_string())
                .field("Protection Values", template.protection_values_count().to_string())
                .field("Profile", template.profile_name())
                .field("Device Group", short_id(template.device_group())),
            );
        }
        Ok(replaced)
    }

    pub fn delete(&self, name: &str) -> Result<(), CoreError> {
        self.store.delete(name)?;
        info!(target: "audit", template = name, "template deleted");

        if self.notify.template_changes {
            self.sink.notify(
                Notification::new(
                    EventType::TemplateDeleted,
                    Level::Info,
                    "Template Deleted",
                    format!("Template '{name}' deleted successfully"),
                )
                .field("Template", name)
                .field("Action", "Deleted"),
            );
        }
        Ok(())
    }

    /// Capture the zone protecting `ip` as template `name`.
    ///
    /// The zone is looked up by exact name over the first
    /// [`LOOKUP_PAGE_SIZE`] zones; its listing row is the source.
    pub async fn import_from_zone(
        &self,
        client: &ApplianceClient,
        ip: &str,
        name: &str,
    ) -> Result<Template, CoreError> {
        let page = client.list_zones(1, LOOKUP_PAGE_SIZE).await?;
        let zone = page
            .object_list
            .iter()
            .find(|row| row.get("zone_name").and_then(Value::as_str) == Some(ip))
            .ok_or_else(|| CoreError::ZoneNotFound { ip: ip.to_owned() })?;

        let template = Template::from_zone(name, zone);
        let replaced = self.store.save(&template)?;
        info!(
            target: "audit",
            template = name,
            source_ip = ip,
            services = template.protection_values_count(),
            replaced,
            "template imported"
        );

        if self.notify.template_changes {
            self.sink.notify(
                Notification::new(
                    EventType::TemplateImported,
                    Level::Info,
                    "Template Imported",
                    format!("Template '{name}' imported from zone {ip}"),
                )
                .field("Source Zone", ip)
                .field("Services", template.protection_values_count().to_string()),
            );
        }
        Ok(template)
    }
}
