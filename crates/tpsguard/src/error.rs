//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use tpsguard_config::ConfigError;
use tpsguard_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to appliance at {url}")]
    #[diagnostic(
        code(tpsguard::connection_failed),
        help(
            "Check that the appliance management interface is reachable.\n\
             Reason: {reason}\n\
             Self-signed certificate? Try --insecure (-k) or set appliance.ca_cert."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(tpsguard::auth_failed),
        help(
            "Verify appliance.username and the stored password.\n\
             Run: tpsguard config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No password configured for '{username}'")]
    #[diagnostic(
        code(tpsguard::no_credentials),
        help(
            "Store one with: tpsguard config set-password\n\
             Or set the TPSGUARD_PASSWORD environment variable."
        )
    )]
    NoCredentials { username: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(tpsguard::not_found),
        help("Run: tpsguard {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Templates ────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(tpsguard::template),
        help(
            "Templates are <name>.json files holding zone_payload and monitor_payload.\n\
             Run: tpsguard templates list"
        )
    )]
    Template { message: String },

    // ── Mitigation ───────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(tpsguard::mitigation_failed))]
    MitigationFailed { message: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Appliance error (HTTP {status})")]
    #[diagnostic(code(tpsguard::api_error), help("{body}"))]
    ApiError { status: u16, body: String },

    #[error("{message}")]
    #[diagnostic(code(tpsguard::internal))]
    Internal { message: String },

    // ── Validation / configuration ───────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(tpsguard::validation),
        help("Check {field} in config.toml or the matching TPSGUARD_ environment variable.")
    )]
    Validation { field: String, reason: String },

    #[error("Could not load configuration: {0}")]
    #[diagnostic(code(tpsguard::config))]
    Config(#[source] ConfigError),

    #[error("System keyring unavailable: {reason}")]
    #[diagnostic(
        code(tpsguard::keyring),
        help("Set TPSGUARD_PASSWORD or appliance.password_env instead.")
    )]
    Keyring { reason: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(tpsguard::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } | Self::Keyring { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::SessionExpired => CliError::AuthFailed {
                message: "session expired again after re-authentication".into(),
            },

            CoreError::ZoneNotFound { ip } => CliError::NotFound {
                resource_type: "zone".into(),
                identifier: ip,
                list_command: "zones list".into(),
            },

            CoreError::TemplateNotFound { name } => CliError::NotFound {
                resource_type: "template".into(),
                identifier: name,
                list_command: "templates list".into(),
            },

            err @ (CoreError::TemplateInvalid { .. }
            | CoreError::TemplateProtected { .. }
            | CoreError::TemplateStorage { .. }
            | CoreError::NoTemplates
            | CoreError::AmbiguousTemplate { .. }) => CliError::Template {
                message: err.to_string(),
            },

            CoreError::RequestFailed { status, body } => CliError::ApiError { status, body },

            CoreError::ReconciliationFailed { message } => CliError::MitigationFailed { message },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal { message },
        }
    }
}

impl From<tpsguard_api::Error> for CliError {
    fn from(err: tpsguard_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { username } => CliError::NoCredentials { username },
            ConfigError::Keyring(e) => CliError::Keyring { reason: e.to_string() },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other),
        }
    }
}
