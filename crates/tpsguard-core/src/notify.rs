// ── Notification sinks ──
//
// Components hand finished `Notification`s to a `NotificationSink` and
// move on. Sinks never block the caller and never report delivery
// failures back; they log them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

/// Pending notifications buffered ahead of the delivery task.
const WEBHOOK_QUEUE_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Level {
    Info,
    Warning,
    Error,
    Success,
}

/// Tag identifying what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    MitigationStart,
    MitigationStop,
    AttackDetected,
    AttackOngoing,
    AttackMitigated,
    ZoneCreated,
    ZoneModified,
    ZoneDeleted,
    ApplianceOffline,
    ApplianceRecovered,
    TemplateCreated,
    TemplateUpdated,
    TemplateDeleted,
    TemplateImported,
}

/// A platform-neutral notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub level: Level,
    /// Ordered key/value details, rendered in insertion order.
    pub fields: IndexMap<String, String>,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        event_type: EventType,
        level: Level,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            level,
            fields: IndexMap::new(),
            event_type,
            timestamp: Utc::now(),
        }
    }

    /// Append a field, keeping insertion order.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Destination for notifications.
pub trait NotificationSink: Send + Sync {
    /// Queue or emit `notification`. Must not block and must not fail.
    fn notify(&self, notification: Notification);
}

/// Shared handle to a sink, as held by every component.
pub type SharedSink = Arc<dyn NotificationSink>;

// ── LogSink ──────────────────────────────────────────────────────────

/// Writes notifications as structured tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, n: Notification) {
        let fields = n
            .fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" | ");
        match n.level {
            Level::Error => error!(target: "notify", event = %n.event_type, %fields, "{}: {}", n.title, n.message),
            Level::Warning => warn!(target: "notify", event = %n.event_type, %fields, "{}: {}", n.title, n.message),
            Level::Info | Level::Success => {
                info!(target: "notify", event = %n.event_type, %fields, "{}: {}", n.title, n.message);
            }
        }
    }
}

// ── WebhookSink ──────────────────────────────────────────────────────

/// JSON document posted to each webhook URL.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    username: &'a str,
    #[serde(flatten)]
    notification: &'a Notification,
}

/// Posts notifications to webhook URLs from a background task.
///
/// `notify` only enqueues. When the queue is full the notification is
/// dropped with a warning. The delivery task ends once every sink handle
/// has been dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    tx: mpsc::Sender<Notification>,
}

impl WebhookSink {
    /// Start the delivery task. Must be called inside a tokio runtime.
    pub fn spawn(
        urls: Vec<Url>,
        username: String,
        http: reqwest::Client,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(WEBHOOK_QUEUE_SIZE);
        let handle = tokio::spawn(delivery_task(rx, urls, username, http));
        (Self { tx }, handle)
    }
}

impl NotificationSink for WebhookSink {
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.tx.try_send(notification) {
            warn!(error = %e, "webhook queue unavailable, notification dropped");
        }
    }
}

async fn delivery_task(
    mut rx: mpsc::Receiver<Notification>,
    urls: Vec<Url>,
    username: String,
    http: reqwest::Client,
) {
    while let Some(notification) = rx.recv().await {
        let payload = WebhookPayload {
            username: &username,
            notification: &notification,
        };
        for url in &urls {
            match http.post(url.clone()).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(event = %notification.event_type, "webhook delivered");
                }
                Ok(resp) => warn!(
                    status = %resp.status(),
                    event = %notification.event_type,
                    "webhook rejected notification"
                ),
                Err(e) => warn!(error = %e, event = %notification.event_type, "webhook delivery failed"),
            }
        }
    }
    debug!("webhook delivery task finished");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn event_types_render_snake_case() {
        assert_eq!(EventType::MitigationStart.to_string(), "mitigation_start");
        assert_eq!(EventType::ApplianceRecovered.as_ref(), "appliance_recovered");
        assert_eq!(EventType::from_str("zone_deleted").unwrap(), EventType::ZoneDeleted);
        assert_eq!(Level::Success.to_string(), "success");
    }

    #[test]
    fn fields_keep_insertion_order() {
        let n = Notification::new(EventType::AttackDetected, Level::Error, "t", "m")
            .field("Target IP", "1.2.3.4")
            .field("Severity", "High")
            .field("Incident ID", "abc");
        let keys: Vec<_> = n.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, ["Target IP", "Severity", "Incident ID"]);
    }

    #[test]
    fn webhook_payload_is_flat() {
        let n = Notification::new(EventType::ZoneCreated, Level::Success, "Zone Created", "m")
            .field("IP", "1.2.3.4");
        let payload = WebhookPayload {
            username: "tpsguard",
            notification: &n,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["username"], "tpsguard");
        assert_eq!(json["event_type"], "zone_created");
        assert_eq!(json["level"], "success");
        assert_eq!(json["fields"]["IP"], "1.2.3.4");
    }
}
