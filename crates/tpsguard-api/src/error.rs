use thiserror::Error;

/// Statuses the transport layer treats as transient and retries on its own.
pub const TRANSIENT_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Top-level error type for the `tpsguard-api` crate.
///
/// Covers every failure mode of the appliance web API: login, session
/// expiry, transport, non-2xx responses, and body decoding.
/// `tpsguard-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login page unreachable, anti-forgery token missing, or credentials rejected.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The appliance bounced the request to its login page again after a
    /// fresh login and replay.
    #[error("Session expired -- replay after re-authentication was also rejected")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Responses ───────────────────────────────────────────────────
    /// Non-2xx response after transport retries and session recovery.
    #[error("Request failed (HTTP {status}): {}", preview(.body))]
    Request { status: u16, body: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error came out of the login flow itself.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Request { status, .. } => TRANSIENT_STATUSES.contains(status),
            _ => false,
        }
    }

    /// Returns `true` if the appliance answered 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Request { status: 404, .. } => true,
            _ => false,
        }
    }

    /// HTTP status of the failed request, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(idx, _)| idx);
    &body[..end]
}
