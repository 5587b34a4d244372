// ── Core error types ──
//
// Domain errors for the guardian. Callers never match on reqwest or
// serde errors directly; `From<tpsguard_api::Error>` folds transport
// failures into the variants below.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Cannot connect to appliance at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session expired again after re-authentication")]
    SessionExpired,

    #[error("Appliance rejected request (HTTP {status}): {}", preview(.body))]
    RequestFailed { status: u16, body: String },

    // ── Lookups ──────────────────────────────────────────────────────
    #[error("Zone not found for IP: {ip}")]
    ZoneNotFound { ip: String },

    // ── Templates ────────────────────────────────────────────────────
    #[error("Template '{name}' not found")]
    TemplateNotFound { name: String },

    #[error("Template '{name}' is invalid: {reason}")]
    TemplateInvalid { name: String, reason: String },

    #[error("Template '{name}' is protected and cannot be deleted")]
    TemplateProtected { name: String },

    #[error("Cannot store template '{name}': {reason}")]
    TemplateStorage { name: String, reason: String },

    #[error("No templates configured. Create at least one template in the template directory")]
    NoTemplates,

    #[error("Multiple templates available ({}). Please specify one: {}", .names.len(), .names.join(", "))]
    AmbiguousTemplate { names: Vec<String> },

    // ── Operations ───────────────────────────────────────────────────
    #[error("Reconciliation failed: {message}")]
    ReconciliationFailed { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the error means "the thing asked for does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ZoneNotFound { .. }
                | Self::TemplateNotFound { .. }
                | Self::RequestFailed { status: 404, .. }
        )
    }
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(idx, _)| idx);
    &body[..end]
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tpsguard_api::Error> for CoreError {
    fn from(err: tpsguard_api::Error) -> Self {
        match err {
            tpsguard_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            tpsguard_api::Error::SessionExpired => CoreError::SessionExpired,
            tpsguard_api::Error::Transport(e) => CoreError::ConnectionFailed {
                url: e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
                reason: e.to_string(),
            },
            tpsguard_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            tpsguard_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            tpsguard_api::Error::Request { status, body } => {
                CoreError::RequestFailed { status, body }
            }
            tpsguard_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Unexpected response shape: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_template_lists_names() {
        let err = CoreError::AmbiguousTemplate {
            names: vec!["alpha".into(), "beta".into()],
        };
        assert_eq!(
            err.to_string(),
            "Multiple templates available (2). Please specify one: alpha, beta"
        );
    }

    #[test]
    fn api_request_errors_keep_status() {
        let err: CoreError = tpsguard_api::Error::Request {
            status: 404,
            body: "gone".into(),
        }
        .into();
        assert!(err.is_not_found());
        assert!(matches!(err, CoreError::RequestFailed { status: 404, .. }));
    }

    #[test]
    fn api_auth_errors_map_to_authentication_failed() {
        let err: CoreError = tpsguard_api::Error::Authentication {
            message: "bad password".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Authentication failed: bad password");
    }
}
