//! Control loop between `tpsguard-api` and the operator surfaces.
//!
//! This crate owns the guardian's business logic:
//!
//! - **[`Reconciler`]** — Idempotent create-or-sync of mitigation zones.
//!   [`ensure_mitigation()`](Reconciler::ensure_mitigation) returns a tagged
//!   [`MitigationOutcome`] instead of failing; [`remove_zone()`](Reconciler::remove_zone)
//!   reports a missing zone as [`CoreError::ZoneNotFound`].
//!
//! - **Pollers** — [`IncidentTracker`] (attack detected / ongoing / mitigated),
//!   [`ZoneChangeDetector`] (out-of-band zone changes, attributed through the
//!   appliance audit log) and [`HealthMonitor`] (reachability transitions).
//!   [`Guardian`] runs the enabled ones as independent tasks, each with its
//!   own session.
//!
//! - **Collaborators** — [`TemplateStore`] supplies zone templates and
//!   [`NotificationSink`] receives every event. [`TemplateLibrary`] owns the
//!   write side: save, delete, and import from a live zone.
//!
//! Configuration arrives fully resolved as a [`GuardianConfig`]; this crate
//! never reads files or environment variables for it.

pub mod config;
pub mod error;
pub mod health;
pub mod incidents;
pub mod library;
pub mod mitigation;
pub mod notify;
pub mod supervisor;
pub mod template;
pub mod zones;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{GuardianConfig, NotifyFlags, TlsVerification};
pub use error::CoreError;
pub use health::{HealthMonitor, HealthState};
pub use incidents::IncidentTracker;
pub use library::TemplateLibrary;
pub use mitigation::{MitigationOutcome, Reconciler, RemovalStatus, ZoneListing, ZoneRemoval, ZoneStatus};
pub use notify::{EventType, Level, LogSink, Notification, NotificationSink, SharedSink, WebhookSink};
pub use supervisor::{Guardian, Poller};
pub use template::{
    FileTemplateStore, PROTECTED_TEMPLATE, Template, TemplateStore, TemplateSummary, TemplateWriter,
};
pub use zones::{Attribution, ChangeKind, ZoneChangeDetector, ZoneChanges};
