// Response shapes for the appliance endpoints the guardian consumes.
//
// Zone and incident payloads are only partially typed: the fields the
// guardian reads are named, the rest is kept as raw JSON so snapshots and
// templates round-trip unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Paginated zone listing: `{total, object_list}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZonePage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub object_list: Vec<Map<String, Value>>,
}

/// The subset of a zone row the reconciler needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSummary {
    pub id: String,
    pub zone_name: String,
    #[serde(default)]
    pub operational_mode: Option<String>,
}

impl ZoneSummary {
    /// Extract from a raw listing row. Rows without an id are skipped.
    pub fn from_row(row: &Map<String, Value>) -> Option<Self> {
        let id = row.get("id")?.as_str()?.to_owned();
        let zone_name = row
            .get("zone_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let operational_mode = row
            .get("operational_mode")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Some(Self {
            id,
            zone_name,
            operational_mode,
        })
    }
}

/// Response of the zone create call. Only the new id is required.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedZone {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One ongoing incident row.
///
/// Firmware versions disagree on field types (numeric severity, epoch
/// start times), so every field accepts a string, number, or bool and
/// anything else reads as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    #[serde(default, deserialize_with = "lenient_string")]
    pub incident_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub zone_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub zone_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub start_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

/// Ongoing incident listing: `{total_items, incident_list}`.
///
/// Rows that are not objects are dropped instead of failing the page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentPage {
    #[serde(default)]
    pub total_items: u64,
    #[serde(default, deserialize_with = "lenient_rows")]
    pub incident_list: Vec<Incident>,
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_rows<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Incident>, D::Error> {
    let rows = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(rows
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|row| Incident::deserialize(row).ok())
        .collect())
}

/// Traffic statistics for an incident. Every field is optional upstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentStats {
    #[serde(default)]
    pub peak_pps: Option<u64>,
    #[serde(default)]
    pub peak_bps: Option<u64>,
    #[serde(default)]
    pub attack_types: Vec<String>,
}

/// A single audit-log entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    /// JSON-encoded string on most firmware, an object on some.
    #[serde(default)]
    pub event_data: Value,
}

impl AuditEvent {
    fn data(&self) -> Option<Map<String, Value>> {
        match &self.event_data {
            Value::Object(map) => Some(map.clone()),
            Value::String(raw) if !raw.is_empty() => match serde_json::from_str(raw) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            },
            _ => None,
        }
    }

    fn data_field(&self, key: &str) -> Option<String> {
        self.data()?
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    }

    pub fn zone_id(&self) -> Option<String> {
        self.data_field("zone_id")
    }

    pub fn user_id(&self) -> Option<String> {
        self.data_field("user_id")
    }
}

/// Audit listing: `{object_list}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditPage {
    #[serde(default)]
    pub object_list: Vec<AuditEvent>,
}

/// Flattened system information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub hostname: Option<String>,
    pub uptime: Option<String>,
    pub product_name: Option<String>,
    pub version: Option<String>,
    pub serial_number: Option<String>,
}

impl SystemInfo {
    /// Platform fields may be nested under `platform` or sit at the top level.
    pub fn from_raw(raw: &Value) -> Self {
        let top = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_owned);
        let nested = |key: &str| {
            raw.get("platform")
                .and_then(|p| p.get(key))
                .and_then(Value::as_str)
                .map(str::to_owned)
        };
        Self {
            hostname: top("hostname"),
            uptime: top("uptime"),
            product_name: nested("product_name").or_else(|| top("product_name")),
            version: nested("agalaxy_version").or_else(|| top("agalaxy_version")),
            serial_number: nested("serial_number").or_else(|| top("serial_number")),
        }
    }
}

/// One managed enforcement device from the inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dns_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mgmt_ip_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub firmware_version: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub serial_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub admin_status_label: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub oper_status_label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Device inventory: `{total, object_list}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceList {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub object_list: Vec<Device>,
}

/// License entitlement of the management node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LicenseInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub license_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub max_devices: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub max_objects: Option<u64>,
    /// Usage summary such as `"2 out of 2"`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub remaining: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub expires_at: Option<String>,
}
