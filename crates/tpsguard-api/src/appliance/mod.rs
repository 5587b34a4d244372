// Appliance web API client
//
// `client` holds the request executor; the remaining modules add endpoint
// wrappers as inherent methods on `ApplianceClient`.

pub mod audit;
pub mod client;
pub mod incidents;
pub mod models;
pub mod system;
pub mod zones;

pub use client::ApplianceClient;
pub use models::{
    AuditEvent, AuditPage, CreatedZone, Device, DeviceList, Incident, IncidentPage, IncidentStats,
    LicenseInfo, SystemInfo, ZonePage, ZoneSummary,
};
