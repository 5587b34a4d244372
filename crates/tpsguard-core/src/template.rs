// ── Zone templates ──
//
// A template pairs a zone creation payload with a monitor/deploy payload.
// The reconciler reads templates through `TemplateStore`; writes go through
// `TemplateWriter`, which only the template library holds.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::CoreError;

/// Template that can never be deleted.
pub const PROTECTED_TEMPLATE: &str = "default";

/// Zone fields bound to one address or one moment, dropped on import.
const ZONE_SPECIFIC_FIELDS: [&str; 7] = [
    "id",
    "zone_name",
    "ip_list",
    "input_ips",
    "created_at",
    "updated_at",
    "status",
];

/// A named pair of appliance payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub zone_payload: Map<String, Value>,
    pub monitor_payload: Map<String, Value>,
}

impl Template {
    /// Build a template from a live zone row.
    ///
    /// Address-bound fields are dropped and one protection value is derived
    /// per service in `port.zone_service_list`.
    pub fn from_zone(name: &str, zone: &Map<String, Value>) -> Self {
        let mut zone_payload = zone.clone();
        for key in ZONE_SPECIFIC_FIELDS {
            zone_payload.remove(key);
        }

        let protection_values: Vec<Value> = zone_payload
            .get("port")
            .and_then(|p| p.get("zone_service_list"))
            .and_then(Value::as_array)
            .map(|services| services.iter().map(protection_value).collect())
            .unwrap_or_default();

        let mut monitor_payload = Map::new();
        monitor_payload.insert("algorithm".into(), "max".into());
        monitor_payload.insert("sensitivity".into(), "medium".into());
        monitor_payload.insert("manual_thresholds".into(), false.into());
        monitor_payload.insert("deployZone".into(), true.into());
        monitor_payload.insert("protection_values".into(), Value::Array(protection_values));

        Self {
            name: name.to_owned(),
            zone_payload,
            monitor_payload,
        }
    }

    /// Number of services in the zone payload (`port.zone_service_list`).
    pub fn services_count(&self) -> usize {
        service_list_len(&self.zone_payload)
    }

    pub fn protection_values_count(&self) -> usize {
        self.monitor_payload
            .get("protection_values")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    pub fn device_group(&self) -> &str {
        self.zone_payload
            .get("device_group")
            .and_then(Value::as_str)
            .unwrap_or("N/A")
    }

    /// Structural check of both payloads: every service and protection
    /// value names its protocol, and every indicator has a name.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |reason: String| CoreError::TemplateInvalid {
            name: self.name.clone(),
            reason,
        };

        let services = self
            .zone_payload
            .get("port")
            .and_then(|p| p.get("zone_service_list"))
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("zone_payload.port.zone_service_list must be a list".into()))?;
        for (i, service) in services.iter().enumerate() {
            if service.get("protocol").and_then(Value::as_str).is_none() {
                return Err(invalid(format!("service {i} has no protocol")));
            }
        }

        let values = self
            .monitor_payload
            .get("protection_values")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("monitor_payload.protection_values must be a list".into()))?;
        for (i, value) in values.iter().enumerate() {
            if value.get("protocol").and_then(Value::as_str).is_none() {
                return Err(invalid(format!("protection value {i} has no protocol")));
            }
            let indicators = value
                .get("indicators")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid(format!("protection value {i} has no indicators list")))?;
            if indicators
                .iter()
                .any(|ind| ind.get("name").and_then(Value::as_str).is_none())
            {
                return Err(invalid(format!("protection value {i} has an unnamed indicator")));
            }
        }
        Ok(())
    }

    /// The stored form: `{name, zone_payload, monitor_payload}`.
    pub fn to_document(&self) -> Value {
        json!({
            "name": self.name,
            "zone_payload": self.zone_payload,
            "monitor_payload": self.monitor_payload,
        })
    }

    pub fn profile_name(&self) -> &str {
        self.zone_payload
            .get("profile_name")
            .and_then(Value::as_str)
            .unwrap_or("N/A")
    }
}

/// Listing entry for a stored template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateSummary {
    pub name: String,
    pub profile_name: String,
    pub device_group: String,
    pub services_count: usize,
    pub protection_values_count: usize,
}

/// Read-only source of templates.
pub trait TemplateStore: Send + Sync {
    /// Load one template by name.
    fn get(&self, name: &str) -> Result<Template, CoreError>;

    /// Summaries of all readable templates, sorted by name.
    fn list(&self) -> Result<Vec<TemplateSummary>, CoreError>;
}

/// Template storage that accepts writes.
pub trait TemplateWriter: TemplateStore {
    /// Validate and persist `template`, replacing any stored version.
    /// Returns whether one was replaced.
    fn save(&self, template: &Template) -> Result<bool, CoreError>;

    /// Remove a stored template. [`PROTECTED_TEMPLATE`] is refused.
    fn delete(&self, name: &str) -> Result<(), CoreError>;
}

/// On-disk shape of `<name>.json`.
#[derive(Debug, Deserialize)]
struct TemplateFile {
    zone_payload: Option<Value>,
    monitor_payload: Option<Value>,
}

/// Directory of `<name>.json` template files.
#[derive(Debug, Clone)]
pub struct FileTemplateStore {
    dir: PathBuf,
}

impl FileTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing template `name`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, CoreError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(CoreError::TemplateInvalid {
                name: name.to_owned(),
                reason: "template names must be plain file stems".into(),
            });
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    fn read(name: &str, path: &Path) -> Result<Template, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::TemplateNotFound {
                    name: name.to_owned(),
                }
            } else {
                CoreError::TemplateInvalid {
                    name: name.to_owned(),
                    reason: e.to_string(),
                }
            }
        })?;

        let invalid = |reason: String| CoreError::TemplateInvalid {
            name: name.to_owned(),
            reason,
        };
        let file: TemplateFile =
            serde_json::from_str(&raw).map_err(|e| invalid(format!("invalid JSON: {e}")))?;

        let zone_payload = match file.zone_payload {
            Some(Value::Object(map)) => map,
            _ => return Err(invalid("missing zone_payload object".into())),
        };
        let monitor_payload = match file.monitor_payload {
            Some(Value::Object(map)) => map,
            _ => return Err(invalid("missing monitor_payload object".into())),
        };

        debug!(template = name, path = %path.display(), "loaded template");
        Ok(Template {
            name: name.to_owned(),
            zone_payload,
            monitor_payload,
        })
    }
}

impl TemplateStore for FileTemplateStore {
    fn get(&self, name: &str) -> Result<Template, CoreError> {
        let path = self.path_for(name)?;
        Self::read(name, &path)
    }

    fn list(&self) -> Result<Vec<TemplateSummary>, CoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CoreError::Config {
                    message: format!("cannot read template dir {}: {e}", self.dir.display()),
                });
            }
        };

        let mut summaries = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match Self::read(name, &path) {
                Ok(template) => summaries.push(summarize(&template)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable template"),
            }
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }
}

impl TemplateWriter for FileTemplateStore {
    fn save(&self, template: &Template) -> Result<bool, CoreError> {
        template.validate()?;
        let path = self.path_for(&template.name)?;
        let storage = |reason: String| CoreError::TemplateStorage {
            name: template.name.clone(),
            reason,
        };

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| storage(format!("cannot create {}: {e}", self.dir.display())))?;
        let replaced = path.exists();
        let mut body = serde_json::to_string_pretty(&template.to_document())
            .map_err(|e| storage(e.to_string()))?;
        body.push('\n');
        std::fs::write(&path, body).map_err(|e| storage(format!("cannot write {}: {e}", path.display())))?;

        debug!(template = %template.name, path = %path.display(), replaced, "saved template");
        Ok(replaced)
    }

    fn delete(&self, name: &str) -> Result<(), CoreError> {
        if name == PROTECTED_TEMPLATE {
            return Err(CoreError::TemplateProtected {
                name: name.to_owned(),
            });
        }
        let path = self.path_for(name)?;
        std::fs::remove_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::TemplateNotFound {
                    name: name.to_owned(),
                }
            } else {
                CoreError::TemplateStorage {
                    name: name.to_owned(),
                    reason: format!("cannot remove {}: {e}", path.display()),
                }
            }
        })?;
        debug!(template = name, path = %path.display(), "deleted template");
        Ok(())
    }
}

/// Protection value for one zone service. Port forms: a number, a numeric
/// string, `"start-end"`, or `"other"`.
fn protection_value(service: &Value) -> Value {
    let mut value = Map::new();
    value.insert(
        "protocol".into(),
        service.get("protocol").cloned().unwrap_or(Value::Null),
    );
    value.insert("zone_escalation_score".into(), 10.into());
    value.insert(
        "indicators".into(),
        json!([{"name": "pkt-rate", "value": 0, "score": 20}]),
    );

    match service.get("port") {
        Some(Value::Number(port)) => {
            value.insert("port".into(), Value::Number(port.clone()));
        }
        Some(Value::String(port)) => {
            let range = port
                .split_once('-')
                .and_then(|(start, end)| Some((start.trim().parse::<u64>().ok()?, end.trim().parse::<u64>().ok()?)));
            if let Some((start, end)) = range {
                value.insert("port_range_start".into(), start.into());
                value.insert("port_range_end".into(), end.into());
            } else if port == "other" {
                value.insert("port_other".into(), "other".into());
            } else if let Ok(number) = port.parse::<u64>() {
                value.insert("port".into(), number.into());
            } else {
                value.insert("port".into(), port.clone().into());
            }
        }
        _ => {}
    }
    Value::Object(value)
}

fn summarize(template: &Template) -> TemplateSummary {
    let str_field = |key: &str| {
        template
            .zone_payload
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("N/A")
            .to_owned()
    };
    TemplateSummary {
        name: template.name.clone(),
        profile_name: str_field("profile_name"),
        device_group: str_field("device_group"),
        services_count: template.services_count(),
        protection_values_count: template.protection_values_count(),
    }
}

pub(crate) fn service_list_len(zone_payload: &Map<String, Value>) -> usize {
    zone_payload
        .get("port")
        .and_then(|p| p.get("zone_service_list"))
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}
