// ── Appliance health monitor ──

use std::sync::Arc;

use tracing::{debug, error, info};

use tpsguard_api::ApplianceClient;

use crate::notify::{EventType, Level, Notification, SharedSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "PascalCase")]
pub enum HealthState {
    Online,
    Offline,
}

/// Reachability tracker. Notifies on state transitions only; the first
/// observation establishes the baseline silently.
pub struct HealthMonitor {
    client: Arc<ApplianceClient>,
    sink: SharedSink,
    last: Option<HealthState>,
}

impl HealthMonitor {
    pub fn new(client: Arc<ApplianceClient>, sink: SharedSink) -> Self {
        Self {
            client,
            sink,
            last: None,
        }
    }

    pub fn state(&self) -> Option<HealthState> {
        self.last
    }

    /// Probe the appliance by (re)connecting.
    pub async fn cycle(&mut self) {
        let state = match self.client.connect().await {
            Ok(()) => HealthState::Online,
            Err(e) => {
                debug!(error = %e, "health probe failed");
                HealthState::Offline
            }
        };
        self.observe(state);
    }

    /// Record `state`, notifying if it differs from the previous one.
    pub fn observe(&mut self, state: HealthState) -> bool {
        let previous = self.last.replace(state);
        let Some(previous) = previous.filter(|p| *p != state) else {
            return false;
        };

        let device = self.client.base_url().to_string();
        let notification = match state {
            HealthState::Offline => {
                error!(target: "audit", %device, "appliance offline");
                Notification::new(
                    EventType::ApplianceOffline,
                    Level::Error,
                    "Appliance Offline",
                    "The TPS appliance is not responding",
                )
            }
            HealthState::Online => {
                info!(target: "audit", %device, "appliance recovered");
                Notification::new(
                    EventType::ApplianceRecovered,
                    Level::Success,
                    "Appliance Recovered",
                    "Connection to the TPS appliance restored",
                )
            }
        };
        self.sink.notify(
            notification
                .field("Device", device)
                .field("Status", state.to_string())
                .field("Previous", previous.to_string()),
        );
        true
    }
}
