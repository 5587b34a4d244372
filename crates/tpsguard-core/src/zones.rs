// ── Zone change detector ──
//
// Polls every zone's full configuration and compares it with the previous
// cycle to find zones created, modified or deleted on the appliance
// itself. Each change is attributed through the audit log; changes made
// by the guardian's own service account are not reported.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use tpsguard_api::ApplianceClient;
use tpsguard_api::appliance::AuditEvent;

use crate::config::NotifyFlags;
use crate::error::CoreError;
use crate::notify::{EventType, Level, Notification, SharedSink};

/// Zones per listing page when fetching everything.
pub const ZONE_PAGE_SIZE: u32 = 100;

/// Top-level keys that change without any configuration change.
pub const VOLATILE_FIELDS: [&str; 9] = [
    "created",
    "created_time",
    "modified",
    "modified_time",
    "last_modified",
    "updated_at",
    "stats",
    "counters",
    "runtime_stats",
];

/// Raw zone configuration as returned by the appliance.
pub type Snapshot = Map<String, Value>;

/// Copy of `zone` without [`VOLATILE_FIELDS`].
pub fn normalize(zone: &Snapshot) -> Snapshot {
    zone.iter()
        .filter(|(key, _)| !VOLATILE_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// A zone as remembered between cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownZone {
    pub snapshot: Snapshot,
    pub first_seen: DateTime<Utc>,
}

impl KnownZone {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            first_seen: Utc::now(),
        }
    }
}

/// The three disjoint change sets of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneChanges {
    pub new: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    pub modified: BTreeSet<String>,
}

impl ZoneChanges {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

/// Compare `current` with `known`. Volatile fields never count as a change.
pub fn detect_changes(
    known: &BTreeMap<String, KnownZone>,
    current: &BTreeMap<String, Snapshot>,
) -> ZoneChanges {
    let mut changes = ZoneChanges::default();
    for (id, snapshot) in current {
        match known.get(id) {
            None => {
                changes.new.insert(id.clone());
            }
            Some(previous) if normalize(&previous.snapshot) != normalize(snapshot) => {
                changes.modified.insert(id.clone());
            }
            Some(_) => {}
        }
    }
    changes.deleted = known
        .keys()
        .filter(|id| !current.contains_key(*id))
        .cloned()
        .collect();
    changes
}

/// Category of a zone change, as recorded by the appliance's audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn audit_event_type(self) -> &'static str {
        match self {
            Self::Created => "a10.agalaxy.tps.ddos.zone.created",
            Self::Updated => "a10.agalaxy.tps.ddos.zone.updated",
            Self::Deleted => "a10.agalaxy.tps.ddos.zone.deleted",
        }
    }

    fn enabled(self, flags: &NotifyFlags) -> bool {
        match self {
            Self::Created => flags.zone_created,
            Self::Updated => flags.zone_modified,
            Self::Deleted => flags.zone_deleted,
        }
    }
}

/// Who made a change, according to the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// Another account made the change.
    External(String),
    /// The guardian's own service account made the change.
    SelfCaused,
    /// No matching audit entry; treated like a self-caused change.
    Unattributed,
}

/// Find the first audit event of `kind` for `zone_id` that names a user.
pub fn attribute(
    events: &[AuditEvent],
    zone_id: &str,
    kind: ChangeKind,
    service_account: &str,
) -> Attribution {
    let target = kind.audit_event_type();
    let user = events
        .iter()
        .filter(|event| event.event_type == target)
        .filter(|event| event.zone_id().as_deref() == Some(zone_id))
        .find_map(AuditEvent::user_id);

    match user {
        Some(user) if user == service_account => Attribution::SelfCaused,
        Some(user) => Attribution::External(user),
        None => Attribution::Unattributed,
    }
}

/// Polling diff engine over zone configurations.
pub struct ZoneChangeDetector {
    client: Arc<ApplianceClient>,
    sink: SharedSink,
    notify: NotifyFlags,
    service_account: String,
    known: BTreeMap<String, KnownZone>,
}

impl ZoneChangeDetector {
    pub fn new(
        client: Arc<ApplianceClient>,
        sink: SharedSink,
        notify: NotifyFlags,
        service_account: impl Into<String>,
    ) -> Self {
        Self {
            client,
            sink,
            notify,
            service_account: service_account.into(),
            known: BTreeMap::new(),
        }
    }

    pub fn known(&self) -> &BTreeMap<String, KnownZone> {
        &self.known
    }

    /// Fetch every zone's configuration.
    ///
    /// Pages through the listing until a short page, then fetches each
    /// zone's detail. A zone whose detail fetch fails keeps its summary row.
    pub async fn fetch_all_zones(&self) -> Result<BTreeMap<String, Snapshot>, CoreError> {
        let mut zones = BTreeMap::new();
        let mut page = 1;

        loop {
            let listing = self.client.list_zones(page, ZONE_PAGE_SIZE).await?;
            let rows = listing.object_list;
            if rows.is_empty() {
                break;
            }
            let full_page = rows.len() >= usize::try_from(ZONE_PAGE_SIZE).unwrap_or(usize::MAX);

            for row in rows {
                let Some(id) = row.get("id").and_then(Value::as_str).map(str::to_owned) else {
                    continue;
                };
                let snapshot = match self.client.get_zone(&id).await {
                    Ok(detail) if !detail.is_empty() => detail,
                    Ok(_) => row,
                    Err(e) => {
                        warn!(zone_id = %id, error = %e, "zone detail fetch failed, using summary row");
                        row
                    }
                };
                zones.insert(id, snapshot);
            }

            if !full_page {
                break;
            }
            page += 1;
        }

        debug!(zones = zones.len(), "fetched all zones");
        Ok(zones)
    }

    /// Record the current zones as the baseline without notifying.
    pub async fn seed(&mut self) -> Result<usize, CoreError> {
        let zones = self.fetch_all_zones().await?;
        self.known = zones
            .into_iter()
            .map(|(id, snapshot)| (id, KnownZone::new(snapshot)))
            .collect();
        info!(zones = self.known.len(), "zone baseline established");
        Ok(self.known.len())
    }

    /// One poll cycle: fetch, diff, report and update the known set.
    pub async fn cycle(&mut self) -> Result<ZoneChanges, CoreError> {
        let current = self.fetch_all_zones().await?;
        let changes = detect_changes(&self.known, &current);

        for id in &changes.new {
            if let Some(snapshot) = current.get(id) {
                self.report(ChangeKind::Created, id, None, snapshot).await;
                self.known.insert(id.clone(), KnownZone::new(snapshot.clone()));
            }
        }

        for id in &changes.modified {
            let (Some(snapshot), Some(previous)) = (current.get(id), self.known.get(id)) else {
                continue;
            };
            self.report(ChangeKind::Updated, id, Some(&previous.snapshot), snapshot)
                .await;
            if let Some(entry) = self.known.get_mut(id) {
                entry.snapshot = snapshot.clone();
            }
        }

        for id in &changes.deleted {
            if let Some(previous) = self.known.get(id) {
                self.report(ChangeKind::Deleted, id, None, &previous.snapshot)
                    .await;
            }
            self.known.remove(id);
        }

        if !changes.is_empty() {
            debug!(
                new = changes.new.len(),
                modified = changes.modified.len(),
                deleted = changes.deleted.len(),
                "zone changes processed"
            );
        }
        Ok(changes)
    }

    async fn attribution(&self, zone_id: &str, kind: ChangeKind) -> Attribution {
        match self.client.recent_audit_events().await {
            Ok(page) => attribute(&page.object_list, zone_id, kind, &self.service_account),
            Err(e) => {
                warn!(zone_id, error = %e, "audit lookup failed");
                Attribution::Unattributed
            }
        }
    }

    /// Attribute and, for external changes, notify. `zone` is the current
    /// snapshot, or the last known one for deletions.
    async fn report(&self, kind: ChangeKind, zone_id: &str, previous: Option<&Snapshot>, zone: &Snapshot) {
        if !kind.enabled(&self.notify) {
            return;
        }
        let user = match self.attribution(zone_id, kind).await {
            Attribution::External(user) => user,
            Attribution::SelfCaused => {
                debug!(zone_id = %short_zone_id(zone_id), %kind, "change made by service account, not reported");
                return;
            }
            Attribution::Unattributed => {
                debug!(zone_id = %short_zone_id(zone_id), %kind, "no audit entry for change, not reported");
                return;
            }
        };

        let ip = ip_from_zone_name(text(zone, "zone_name", "Unknown"));
        let mode = text(zone, "operational_mode", "Unknown");
        let profile = text(zone, "profile_name", "None");

        let notification = match kind {
            ChangeKind::Created => {
                let services = service_count(zone);
                info!(
                    target: "audit",
                    %ip, zone_id, mode, services, %user,
                    "zone created outside the guardian"
                );
                Notification::new(
                    EventType::ZoneCreated,
                    Level::Success,
                    "Zone Created",
                    "New protection zone detected (created outside the guardian)",
                )
                .field("IP", ip)
                .field("Zone ID", short_zone_id(zone_id))
                .field("Mode", mode)
                .field("Profile", profile)
                .field("Services", services.to_string())
                .field("Created By", user)
            }
            ChangeKind::Updated => {
                let summary = previous.map_or_else(
                    || "Configuration updated".to_owned(),
                    |old| change_summary(old, zone),
                );
                info!(
                    target: "audit",
                    %ip, zone_id, changes = %summary, %user,
                    "zone modified outside the guardian"
                );
                Notification::new(
                    EventType::ZoneModified,
                    Level::Info,
                    "Zone Modified",
                    "Configuration changed (modified outside the guardian)",
                )
                .field("IP", ip)
                .field("Zone ID", short_zone_id(zone_id))
                .field("Changes", summary)
                .field("Current Mode", mode)
                .field("Profile", profile)
                .field("Modified By", user)
            }
            ChangeKind::Deleted => {
                info!(
                    target: "audit",
                    %ip, zone_id, mode, %user,
                    "zone deleted outside the guardian"
                );
                Notification::new(
                    EventType::ZoneDeleted,
                    Level::Warning,
                    "Zone Deleted",
                    "Protection zone removed (deleted outside the guardian)",
                )
                .field("IP", ip)
                .field("Zone ID", short_zone_id(zone_id))
                .field("Previous Mode", mode)
                .field("Deleted By", user)
            }
        };
        self.sink.notify(notification);
    }
}

/// Human summary of what changed between two snapshots of one zone.
pub fn change_summary(old: &Snapshot, new: &Snapshot) -> String {
    let mut changes = Vec::new();
    for (key, label) in [
        ("operational_mode", "Mode"),
        ("profile_name", "Profile"),
        ("zone_oper_policy", "Policy"),
    ] {
        let (before, after) = (old.get(key), new.get(key));
        if before != after {
            changes.push(format!("{label}: {} → {}", display(before), display(after)));
        }
    }
    let (before, after) = (service_count(old), service_count(new));
    if before != after {
        changes.push(format!("Services: {before} → {after}"));
    }

    if changes.is_empty() {
        "Configuration updated".to_owned()
    } else {
        changes.join(", ")
    }
}

/// Zone names are `<ip>` or `<ip>-<suffix>`.
pub fn ip_from_zone_name(zone_name: &str) -> String {
    zone_name.split('-').next().unwrap_or(zone_name).to_owned()
}

fn service_count(zone: &Snapshot) -> usize {
    zone.get("zone_services")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

fn text<'a>(zone: &'a Snapshot, key: &str, default: &'a str) -> &'a str {
    zone.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "None".to_owned(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn short_zone_id(id: &str) -> String {
    if id.chars().count() > 12 {
        format!("{}...", id.chars().take(12).collect::<String>())
    } else {
        id.to_owned()
    }
}
