// Incident endpoints

use serde_json::Value;

use super::client::ApplianceClient;
use super::models::{IncidentPage, IncidentStats};
use crate::error::Error;

impl ApplianceClient {
    /// Ongoing incidents, newest first.
    pub async fn ongoing_incidents(&self, page: u32, items: u32) -> Result<IncidentPage, Error> {
        self.get(
            "/tps/zone/incident/ongoing/json/",
            &[
                ("page", page.to_string()),
                ("items", items.to_string()),
                ("tps_incident_active", "Ongoing".to_owned()),
                ("sort_ordering", "DESC".to_owned()),
            ],
        )
        .await
    }

    pub async fn incident_stats(&self, incident_id: &str) -> Result<IncidentStats, Error> {
        self.get(&format!("/tps/zone/incident/{incident_id}/stats/"), &[])
            .await
    }

    pub async fn incident_detail(&self, incident_id: &str) -> Result<Value, Error> {
        self.get(&format!("/tps/zone/incident/{incident_id}/json/"), &[])
            .await
    }
}
