use super::client::ApplianceClient;
use super::models::AuditPage;
use crate::error::Error;

/// Number of most recent audit events searched for attribution.
pub const AUDIT_WINDOW: u32 = 100;

impl ApplianceClient {
    /// The most recent [`AUDIT_WINDOW`] audit events.
    pub async fn recent_audit_events(&self) -> Result<AuditPage, Error> {
        self.get(
            "/dashboard/audit/events/json/",
            &[("page", "1".to_owned()), ("items", AUDIT_WINDOW.to_string())],
        )
        .await
    }
}
