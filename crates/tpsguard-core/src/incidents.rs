// ── Attack incident tracker ──
//
// Diffs the appliance's ongoing-incident list against the incidents seen
// on earlier cycles. Each incident moves Unknown → Active → Gone; the
// tracker emits `attack_detected` on the first transition and
// `attack_mitigated` on the second.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use tpsguard_api::ApplianceClient;
use tpsguard_api::appliance::{Incident, IncidentStats};

use crate::config::NotifyFlags;
use crate::error::CoreError;
use crate::notify::{EventType, Level, Notification, SharedSink};

/// Incidents fetched per cycle (first page only).
pub const INCIDENT_PAGE_SIZE: u32 = 100;

/// Period of the "still ongoing" reminder, in seconds.
///
/// The reminder fires only when the elapsed time is an exact multiple of
/// this value, so it never fires if the poll interval does not divide it.
pub const ONGOING_PERIOD_SECS: u64 = 900;

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone)]
struct KnownIncident {
    first_seen: Instant,
    start_time: Option<String>,
    zone_name: String,
    severity: String,
}

/// Polling diff engine over ongoing incidents.
pub struct IncidentTracker {
    client: Arc<ApplianceClient>,
    sink: SharedSink,
    notify: NotifyFlags,
    known: HashMap<String, KnownIncident>,
}

impl IncidentTracker {
    pub fn new(client: Arc<ApplianceClient>, sink: SharedSink, notify: NotifyFlags) -> Self {
        Self {
            client,
            sink,
            notify,
            known: HashMap::new(),
        }
    }

    /// Number of incidents currently considered active.
    pub fn active_count(&self) -> usize {
        self.known.len()
    }

    pub fn is_active(&self, incident_id: &str) -> bool {
        self.known.contains_key(incident_id)
    }

    /// One poll cycle: fetch the ongoing list and diff it.
    pub async fn cycle(&mut self) -> Result<(), CoreError> {
        let page = self.client.ongoing_incidents(1, INCIDENT_PAGE_SIZE).await?;
        debug!(
            fetched = page.incident_list.len(),
            total = page.total_items,
            "fetched ongoing incidents"
        );
        self.process(&page.incident_list, Instant::now()).await;
        Ok(())
    }

    /// Diff `incidents` against the known set as of `now`.
    pub async fn process(&mut self, incidents: &[Incident], now: Instant) {
        let mut seen = HashSet::new();

        for incident in incidents {
            let Some(id) = incident.incident_id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };
            seen.insert(id.to_owned());

            match self.known.get(id) {
                None => {
                    self.detected(id, incident).await;
                    self.known.insert(
                        id.to_owned(),
                        KnownIncident {
                            first_seen: now,
                            start_time: incident.start_time.clone(),
                            zone_name: or_unknown(incident.zone_name.as_ref()),
                            severity: or_unknown(incident.severity.as_ref()),
                        },
                    );
                }
                Some(entry) if self.notify.attack_ongoing => {
                    let elapsed = now.saturating_duration_since(entry.first_seen).as_secs();
                    if elapsed > 0 && elapsed % ONGOING_PERIOD_SECS == 0 {
                        self.ongoing(id, incident, elapsed);
                    }
                }
                Some(_) => {}
            }
        }

        let gone: Vec<String> = self
            .known
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        for id in gone {
            if let Some(entry) = self.known.remove(&id) {
                let elapsed = now.saturating_duration_since(entry.first_seen).as_secs();
                self.mitigated(&id, &entry, elapsed);
            }
        }
    }

    async fn detected(&self, id: &str, incident: &Incident) {
        let zone_name = or_unknown(incident.zone_name.as_ref());
        let severity = or_unknown(incident.severity.as_ref());
        warn!(
            target: "audit",
            incident_id = id, zone = %zone_name, severity = %severity,
            "attack detected"
        );
        if !self.notify.attack_detected {
            return;
        }

        let mut notification = Notification::new(
            EventType::AttackDetected,
            Level::Error,
            "DDoS Attack Detected",
            format!("High-volume attack detected on {zone_name} - mitigation activated"),
        )
        .field("Target IP", &zone_name)
        .field("Severity", severity)
        .field("Started", or_unknown(incident.start_time.as_ref()))
        .field("Incident ID", short_id(id));

        // Enrichment is best-effort; detection is reported either way.
        match self.client.incident_stats(id).await {
            Ok(stats) => notification = enrich(notification, &stats),
            Err(e) => debug!(incident_id = id, error = %e, "incident stats unavailable"),
        }

        self.sink.notify(notification);
    }

    fn ongoing(&self, id: &str, incident: &Incident, elapsed_secs: u64) {
        let zone_name = or_unknown(incident.zone_name.as_ref());
        let duration = format_duration(elapsed_secs);
        warn!(target: "audit", incident_id = id, zone = %zone_name, %duration, "attack ongoing");

        self.sink.notify(
            Notification::new(
                EventType::AttackOngoing,
                Level::Warning,
                "Attack Still Ongoing",
                format!("Attack on {zone_name} continues - mitigation active for {duration}"),
            )
            .field("Target IP", &zone_name)
            .field("Severity", or_unknown(incident.severity.as_ref()))
            .field("Duration", &duration)
            .field("Status", "Still under attack")
            .field("Incident ID", short_id(id)),
        );
    }

    fn mitigated(&self, id: &str, entry: &KnownIncident, elapsed_secs: u64) {
        let duration = format_duration(elapsed_secs);
        info!(
            target: "audit",
            incident_id = id, zone = %entry.zone_name, %duration,
            started = entry.start_time.as_deref().unwrap_or(UNKNOWN),
            "attack mitigated"
        );
        if !self.notify.attack_mitigated {
            return;
        }

        self.sink.notify(
            Notification::new(
                EventType::AttackMitigated,
                Level::Success,
                "Attack Mitigated",
                format!(
                    "Attack on {} successfully mitigated after {duration}",
                    entry.zone_name
                ),
            )
            .field("Target IP", &entry.zone_name)
            .field("Severity", &entry.severity)
            .field("Duration", &duration)
            .field("Incident ID", short_id(id)),
        );
    }
}

fn enrich(notification: Notification, stats: &IncidentStats) -> Notification {
    let mut notification = notification;
    if let Some(pps) = stats.peak_pps {
        notification = notification.field("Peak Traffic", format!("{} pps", group_thousands(pps)));
    }
    if !stats.attack_types.is_empty() {
        let top: Vec<&str> = stats.attack_types.iter().take(3).map(String::as_str).collect();
        notification = notification.field("Attack Types", top.join(", "));
    }
    notification
}

fn or_unknown(value: Option<&String>) -> String {
    value.map_or_else(|| UNKNOWN.to_owned(), Clone::clone)
}

/// `"{h}h {m}m"` from one hour up, `"{m}m"` below.
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// First 8 characters of an incident id, with an ellipsis when truncated.
pub fn short_id(id: &str) -> String {
    if id.chars().count() > 8 {
        format!("{}...", id.chars().take(8).collect::<String>())
    } else {
        id.to_owned()
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
