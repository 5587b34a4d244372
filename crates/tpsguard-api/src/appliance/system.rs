use serde::Deserialize;
use serde_json::Value;

use super::client::ApplianceClient;
use super::models::{DeviceList, LicenseInfo, SystemInfo};
use crate::error::Error;

impl ApplianceClient {
    /// Hostname, uptime, and platform version of the management node.
    pub async fn system_info(&self) -> Result<SystemInfo, Error> {
        let raw: Value = self.get("/dashboard/info/", &[]).await?;
        Ok(SystemInfo::from_raw(&raw))
    }

    /// Every enforcement device in the inventory.
    pub async fn devices(&self) -> Result<DeviceList, Error> {
        self.get("/inventory/device_list/json/", &[("get_all", "true".to_owned())])
            .await
    }

    /// License type, limits, and expiry. Missing `license` reads as empty.
    pub async fn license(&self) -> Result<LicenseInfo, Error> {
        let raw: Value = self.get("/system/license/get_license/", &[]).await?;
        match raw.get("license") {
            Some(license) if !license.is_null() => {
                LicenseInfo::deserialize(license).map_err(|e| Error::Deserialization {
                    message: e.to_string(),
                    body: license.to_string(),
                })
            }
            _ => Ok(LicenseInfo::default()),
        }
    }
}
