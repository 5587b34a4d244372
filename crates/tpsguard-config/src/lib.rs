//! Configuration for the tpsguard daemon and CLI.
//!
//! TOML file + `TPSGUARD_` environment overlay, credential resolution
//! (env var → keyring → plaintext), and translation to the core's
//! immutable `tpsguard_core::GuardianConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use tpsguard_api::RetryConfig;
use tpsguard_core::{GuardianConfig, NotifyFlags, TlsVerification};

/// Keyring service name for stored appliance passwords.
pub const KEYRING_SERVICE: &str = "tpsguard";

/// Environment variable consulted after `appliance.password_env`.
pub const PASSWORD_ENV: &str = "TPSGUARD_PASSWORD";

const ENV_PREFIX: &str = "TPSGUARD_";
const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for appliance user '{username}'")]
    NoCredentials { username: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub appliance: ApplianceSection,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub monitoring: MonitoringSection,

    #[serde(default)]
    pub notify: NotifySection,

    #[serde(default)]
    pub webhook: WebhookSection,

    #[serde(default)]
    pub templates: TemplatesSection,
}

/// `[appliance]`: where and how to reach the TPS management API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApplianceSection {
    /// Base URL (e.g., "https://tps.example.net").
    pub url: Option<String>,

    pub username: Option<String>,

    /// Plaintext password (prefer keyring or an env var).
    pub password: Option<String>,

    /// Name of an environment variable holding the password.
    pub password_env: Option<String>,

    /// Skip certificate verification. Defaults to true: appliances ship
    /// with self-signed certificates.
    #[serde(default = "default_insecure")]
    pub insecure: bool,

    /// Custom CA certificate; takes precedence over `insecure`.
    pub ca_cert: Option<PathBuf>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Retries for transient server errors.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Initial retry backoff in seconds, doubled per attempt.
    #[serde(default = "default_backoff")]
    pub backoff: u64,

    /// Upper bound for the retry backoff in seconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff: u64,

    /// Account whose changes are not reported. Defaults to `username`.
    pub service_account: Option<String>,
}

impl Default for ApplianceSection {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            password_env: None,
            insecure: default_insecure(),
            ca_cert: None,
            timeout: default_timeout(),
            retries: default_retries(),
            backoff: default_backoff(),
            max_backoff: default_max_backoff(),
            service_account: None,
        }
    }
}

fn default_insecure() -> bool {
    true
}
fn default_timeout() -> u64 {
    20
}
fn default_retries() -> u32 {
    3
}
fn default_backoff() -> u64 {
    1
}
fn default_max_backoff() -> u64 {
    8
}

/// `[session]`: on-disk session cookie cache.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSection {
    #[serde(default = "default_true")]
    pub cache: bool,

    /// Defaults to `session.json` in the platform cache directory.
    pub cache_file: Option<PathBuf>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            cache: true,
            cache_file: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[monitoring]`: poll intervals in seconds. Attack and zone intervals
/// are clamped to 10–300.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringSection {
    #[serde(default = "default_poll")]
    pub attack_interval: u64,

    #[serde(default = "default_poll")]
    pub zone_interval: u64,

    #[serde(default = "default_health_interval")]
    pub health_interval: u64,
}

impl Default for MonitoringSection {
    fn default() -> Self {
        Self {
            attack_interval: default_poll(),
            zone_interval: default_poll(),
            health_interval: default_health_interval(),
        }
    }
}

fn default_poll() -> u64 {
    30
}
fn default_health_interval() -> u64 {
    60
}

/// `[notify]`: per-category notification switches.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct NotifySection {
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

impl Default for NotifySection {
    fn default() -> Self {
        Self::from(NotifyFlags::default())
    }
}

impl From<NotifyFlags> for NotifySection {
    fn from(f: NotifyFlags) -> Self {
        Self {
            mitigation_start: f.mitigation_start,
            mitigation_stop: f.mitigation_stop,
            attack_detected: f.attack_detected,
            attack_mitigated: f.attack_mitigated,
            attack_ongoing: f.attack_ongoing,
            zone_created: f.zone_created,
            zone_modified: f.zone_modified,
            zone_deleted: f.zone_deleted,
            system_health: f.system_health,
            template_changes: f.template_changes,
        }
    }
}

impl From<NotifySection> for NotifyFlags {
    fn from(s: NotifySection) -> Self {
        Self {
            mitigation_start: s.mitigation_start,
            mitigation_stop: s.mitigation_stop,
            attack_detected: s.attack_detected,
            attack_mitigated: s.attack_mitigated,
            attack_ongoing: s.attack_ongoing,
            zone_created: s.zone_created,
            zone_modified: s.zone_modified,
            zone_deleted: s.zone_deleted,
            system_health: s.system_health,
            template_changes: s.template_changes,
        }
    }
}

/// `[webhook]`: JSON webhook delivery. No URLs means log-only.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookSection {
    #[serde(default)]
    pub urls: Vec<String>,

    #[serde(default = "default_webhook_username")]
    pub username: String,
}

impl Default for WebhookSection {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            username: default_webhook_username(),
        }
    }
}

fn default_webhook_username() -> String {
    "tpsguard".into()
}

/// `[templates]`: template directory.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TemplatesSection {
    /// Defaults to `templates/` in the platform data directory.
    pub dir: Option<PathBuf>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("net", "tpsguard", "tpsguard")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tpsguard");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn default_cache_file() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("session.json"),
        |dirs| dirs.cache_dir().join("session.json"),
    )
}

fn default_template_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("templates"),
        |dirs| dirs.data_dir().join("templates"),
    )
}

// ── Loading and saving ──────────────────────────────────────────────

/// Load from the canonical config path merged with the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` merged with `TPSGUARD_`-prefixed environment variables.
///
/// Nested keys use a double underscore: `TPSGUARD_APPLIANCE__URL`.
/// A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    Ok(config)
}

/// Serialize `cfg` to TOML at `path`, creating parent directories.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the appliance password.
///
/// Order: `appliance.password_env` → `TPSGUARD_PASSWORD` → system keyring
/// (service `tpsguard`, account = username) → plaintext `appliance.password`.
pub fn resolve_password(appliance: &ApplianceSection, username: &str) -> Result<SecretString, ConfigError> {
    // 1. Named env var
    if let Some(ref env_name) = appliance.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Well-known env var
    if let Ok(val) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(val));
    }

    // 3. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, username) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 4. Plaintext in config
    if let Some(ref pw) = appliance.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        username: username.into(),
    })
}

/// Store `password` in the system keyring for `username`.
pub fn store_password(username: &str, password: &SecretString) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, username)?;
    entry.set_password(password.expose_secret())?;
    Ok(())
}

// ── Translation to core config ──────────────────────────────────────

impl Config {
    /// Base URL of the appliance.
    pub fn appliance_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .appliance
            .url
            .as_deref()
            .ok_or_else(|| ConfigError::Validation {
                field: "appliance.url".into(),
                reason: "not set".into(),
            })?;
        raw.parse().map_err(|_| ConfigError::Validation {
            field: "appliance.url".into(),
            reason: format!("invalid URL: {raw}"),
        })
    }

    pub fn username(&self) -> Result<&str, ConfigError> {
        self.appliance
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ConfigError::Validation {
                field: "appliance.username".into(),
                reason: "not set".into(),
            })
    }

    pub fn tls(&self) -> TlsVerification {
        if let Some(ref ca) = self.appliance.ca_cert {
            TlsVerification::CustomCa(ca.clone())
        } else if self.appliance.insecure {
            TlsVerification::DangerAcceptInvalid
        } else {
            TlsVerification::SystemDefaults
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.appliance.retries,
            initial_delay: Duration::from_secs(self.appliance.backoff),
            max_delay: Duration::from_secs(self.appliance.max_backoff.max(self.appliance.backoff)),
            ..RetryConfig::default()
        }
    }

    /// Session cache path, or `None` when caching is disabled.
    pub fn session_cache(&self) -> Option<PathBuf> {
        self.session
            .cache
            .then(|| self.session.cache_file.clone().unwrap_or_else(default_cache_file))
    }

    pub fn template_dir(&self) -> PathBuf {
        self.templates.dir.clone().unwrap_or_else(default_template_dir)
    }

    /// Parsed webhook URLs.
    pub fn webhook_urls(&self) -> Result<Vec<Url>, ConfigError> {
        self.webhook
            .urls
            .iter()
            .map(|raw| {
                raw.parse().map_err(|_| ConfigError::Validation {
                    field: "webhook.urls".into(),
                    reason: format!("invalid URL: {raw}"),
                })
            })
            .collect()
    }

    /// Build the core configuration, resolving the password.
    pub fn to_guardian_config(&self) -> Result<GuardianConfig, ConfigError> {
        let url = self.appliance_url()?;
        let username = self.username()?;
        let password = resolve_password(&self.appliance, username)?;
        Ok(self.guardian_config_with(url, username, password))
    }

    fn guardian_config_with(&self, url: Url, username: &str, password: SecretString) -> GuardianConfig {
        let mut config = GuardianConfig::new(url, username, password)
            .with_attack_interval(self.monitoring.attack_interval)
            .with_zone_interval(self.monitoring.zone_interval);
        config.tls = self.tls();
        config.timeout = Duration::from_secs(self.appliance.timeout);
        config.retry = self.retry();
        config.session_cache = self.session_cache();
        config.notify = self.notify.into();
        config.health_interval = Duration::from_secs(self.monitoring.health_interval.max(1));
        if let Some(ref account) = self.appliance.service_account {
            config.service_account.clone_from(account);
        }
        config
    }

    /// Copy safe to print: the plaintext password is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.appliance.password.is_some() {
            copy.appliance.password = Some(REDACTED.into());
        }
        copy
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.appliance.insecure);
        assert_eq!(cfg.appliance.timeout, 20);
        assert_eq!(cfg.monitoring.attack_interval, 30);
        assert_eq!(cfg.webhook.username, "tpsguard");
        assert!(!cfg.notify.attack_ongoing);
    }

    #[test]
    fn sections_are_read_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"
[appliance]
url = "https://tps.example.net"
username = "guardian"
password = "plain"
insecure = false
retries = 5

[monitoring]
attack_interval = 5
zone_interval = 600

[notify]
attack_ongoing = true
zone_deleted = false

[webhook]
urls = ["https://hooks.example.net/a"]

[templates]
dir = "/srv/tpsguard/templates"
"#,
        );
        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.appliance.url.as_deref(), Some("https://tps.example.net"));
        assert_eq!(cfg.appliance.retries, 5);
        assert!(cfg.notify.attack_ongoing);
        assert!(!cfg.notify.zone_deleted);
        assert!(cfg.notify.zone_created);
        assert_eq!(cfg.template_dir(), PathBuf::from("/srv/tpsguard/templates"));
        assert_eq!(cfg.webhook_urls().unwrap().len(), 1);
        assert_eq!(cfg.tls(), TlsVerification::SystemDefaults);
    }

    #[test]
    fn guardian_config_clamps_intervals_and_copies_flags() {
        let mut cfg = Config::default();
        cfg.monitoring.attack_interval = 5;
        cfg.monitoring.zone_interval = 600;
        cfg.notify.system_health = true;
        cfg.appliance.service_account = Some("svc-api".into());

        let guardian = cfg.guardian_config_with(
            "https://tps.example.net".parse().unwrap(),
            "guardian",
            SecretString::from("pw".to_owned()),
        );
        assert_eq!(guardian.attack_interval(), Duration::from_secs(10));
        assert_eq!(guardian.zone_interval(), Duration::from_secs(300));
        assert!(guardian.notify.system_health);
        assert_eq!(guardian.service_account, "svc-api");
        assert_eq!(guardian.retry.max_retries, 3);
        assert_eq!(guardian.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn missing_url_is_a_validation_error() {
        let err = Config::default().to_guardian_config().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "appliance.url"));
    }

    #[test]
    fn ca_cert_wins_over_insecure() {
        let mut cfg = Config::default();
        cfg.appliance.ca_cert = Some(PathBuf::from("/etc/tps-ca.pem"));
        assert_eq!(cfg.tls(), TlsVerification::CustomCa(PathBuf::from("/etc/tps-ca.pem")));
    }

    #[test]
    fn session_cache_can_be_disabled() {
        let mut cfg = Config::default();
        cfg.session.cache_file = Some(PathBuf::from("/tmp/s.json"));
        assert_eq!(cfg.session_cache(), Some(PathBuf::from("/tmp/s.json")));
        cfg.session.cache = false;
        assert_eq!(cfg.session_cache(), None);
    }

    #[test]
    fn redaction_masks_plaintext_password() {
        let mut cfg = Config::default();
        cfg.appliance.password = Some("hunter2".into());
        let shown = toml::to_string(&cfg.redacted()).unwrap();
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains(REDACTED));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.appliance.url = Some("https://tps.example.net".into());
        cfg.webhook.urls = vec!["https://hooks.example.net/x".into()];
        save_config(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.appliance.url, cfg.appliance.url);
        assert_eq!(loaded.webhook.urls, cfg.webhook.urls);
    }
}
