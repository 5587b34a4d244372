// Protected-zone endpoints

use serde_json::{Map, Value, json};
use tracing::debug;

use super::client::ApplianceClient;
use super::models::{CreatedZone, ZonePage, ZoneSummary};
use crate::error::Error;

const ZONES: &str = "/tps/protected_objects/zones/api/";

/// Page size used for lookup by IP. Large enough for any realistic
/// deployment; the listing is not paginated further.
pub const LOOKUP_PAGE_SIZE: u32 = 1000;

impl ApplianceClient {
    /// One page of the zone listing.
    pub async fn list_zones(&self, page: u32, items: u32) -> Result<ZonePage, Error> {
        self.get(ZONES, &[("page", page.to_string()), ("items", items.to_string())])
            .await
    }

    /// Exact match of `ip` against zone names over the first
    /// [`LOOKUP_PAGE_SIZE`] zones.
    pub async fn find_zone_by_ip(&self, ip: &str) -> Result<Option<ZoneSummary>, Error> {
        let page = self.list_zones(1, LOOKUP_PAGE_SIZE).await?;
        let found = page
            .object_list
            .iter()
            .filter_map(ZoneSummary::from_row)
            .find(|zone| zone.zone_name == ip);
        debug!(ip, found = found.is_some(), "zone lookup");
        Ok(found)
    }

    /// Full configuration of one zone.
    pub async fn get_zone(&self, zone_id: &str) -> Result<Map<String, Value>, Error> {
        self.get(&format!("{ZONES}{zone_id}/"), &[]).await
    }

    pub async fn create_zone(&self, payload: &Value) -> Result<CreatedZone, Error> {
        self.post(&format!("{ZONES}create/"), payload).await
    }

    /// Apply detection thresholds and deploy the zone to enforcement devices.
    pub async fn enable_monitor(&self, zone_id: &str, payload: &Value) -> Result<Value, Error> {
        self.post(&format!("{ZONES}{zone_id}/monitor/"), payload).await
    }

    /// Delete a zone by id and name (no forced delete).
    pub async fn delete_zone(&self, zone_id: &str, zone_name: &str) -> Result<Value, Error> {
        let body = json!({
            "object_ids": [{
                "detector_id": null,
                "id": zone_id,
                "zone_name": zone_name,
            }]
        });
        self.delete(ZONES, &[("force_delete", "false".to_owned())], Some(&body))
            .await
    }
}
