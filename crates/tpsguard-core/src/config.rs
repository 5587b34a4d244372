// ── Runtime guardian configuration ──
//
// Built once at startup (by tpsguard-config or a test) and shared by
// reference. Core never reads config files or environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Serialize;
use url::Url;

use tpsguard_api::{ApplianceClient, Credentials, RetryConfig, SessionCache, TlsMode, TransportConfig};

/// Lower bound for poller intervals.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Upper bound for poller intervals.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Appliances ship with self-signed certificates.
    #[default]
    DangerAcceptInvalid,
}

/// Which notification categories are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct NotifyFlags {
    pub mitigation_start: bool,
    pub mitigation_stop: bool,
    pub attack_detected: bool,
    pub attack_mitigated: bool,
    pub attack_ongoing: bool,
    pub zone_created: bool,
    pub zone_modified: bool,
    pub zone_deleted: bool,
    pub system_health: bool,
    pub template_changes: bool,
}

impl Default for NotifyFlags {
    fn default() -> Self {
        Self {
            mitigation_start: true,
            mitigation_stop: true,
            attack_detected: true,
            attack_mitigated: true,
            attack_ongoing: false,
            zone_created: true,
            zone_modified: true,
            zone_deleted: true,
            system_health: false,
            template_changes: true,
        }
    }
}

impl NotifyFlags {
    /// The incident tracker runs only if it has something to report.
    pub fn attack_tracking(&self) -> bool {
        self.attack_detected || self.attack_mitigated
    }

    pub fn zone_tracking(&self) -> bool {
        self.zone_created || self.zone_modified || self.zone_deleted
    }
}

/// Clamp a configured poll interval into `[MIN_POLL_INTERVAL, MAX_POLL_INTERVAL]`.
pub fn clamp_interval(secs: u64) -> Duration {
    Duration::from_secs(secs).clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}

/// Immutable configuration for every guardian component.
#[derive(Debug, Clone)]
pub struct GuardianConfig {
    /// Appliance management URL (e.g. `https://tps.example:17489`).
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    pub tls: TlsVerification,
    pub timeout: Duration,
    pub retry: RetryConfig,
    /// Where the session cookie set is persisted. `None` disables caching.
    pub session_cache: Option<PathBuf>,
    pub notify: NotifyFlags,
    /// Changes attributed to this account are treated as self-caused.
    /// Defaults to the login username.
    pub service_account: String,
    pub health_interval: Duration,
    attack_interval: Duration,
    zone_interval: Duration,
}

impl GuardianConfig {
    pub fn new(url: Url, username: impl Into<String>, password: SecretString) -> Self {
        let username = username.into();
        Self {
            url,
            service_account: username.clone(),
            username,
            password,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(20),
            retry: RetryConfig::default(),
            session_cache: None,
            notify: NotifyFlags::default(),
            health_interval: Duration::from_secs(60),
            attack_interval: Duration::from_secs(30),
            zone_interval: Duration::from_secs(30),
        }
    }

    /// Set the incident poll interval, clamped to 10–300 s.
    pub fn with_attack_interval(mut self, secs: u64) -> Self {
        self.attack_interval = clamp_interval(secs);
        self
    }

    /// Set the zone poll interval, clamped to 10–300 s.
    pub fn with_zone_interval(mut self, secs: u64) -> Self {
        self.zone_interval = clamp_interval(secs);
        self
    }

    pub fn attack_interval(&self) -> Duration {
        self.attack_interval
    }

    pub fn zone_interval(&self) -> Duration {
        self.zone_interval
    }

    pub fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
            retry: self.retry.clone(),
        }
    }

    /// A fresh client with its own session manager.
    pub fn client(&self) -> ApplianceClient {
        let cache = self
            .session_cache
            .as_ref()
            .map_or_else(SessionCache::disabled, SessionCache::file);
        ApplianceClient::new(
            self.url.clone(),
            Credentials::new(self.username.clone(), self.password.clone()),
            self.transport(),
            cache,
        )
    }
}
