// Shared transport configuration for building reqwest::Client instances.
//
// Session login, the validation probe, and the request executor all build
// their clients from here so TLS, timeout, cookie, and retry settings
// stay in one place.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{Method, redirect};

use crate::error::{Error, TRANSIENT_STATUSES};

const USER_AGENT: &str = concat!("tpsguard/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (appliances ship with self-signed certs).
    DangerAcceptInvalid,
}

/// Whether a built client follows redirects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirects {
    Follow,
    /// Used by the session probe, which must see the raw 302 to the login page.
    None,
}

/// Exponential backoff for transient server errors.
///
/// Applied inside the request executor, below session-expiry handling.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Upper bound on backoff delay. Default: 8s.
    pub max_delay: Duration,
    /// Statuses that trigger a retry.
    pub statuses: Vec<u16>,
    /// Methods whose requests may be replayed after a transient status or
    /// a timeout. Connect failures are retried for every method since the
    /// request never reached the appliance.
    pub methods: Vec<Method>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            statuses: TRANSIENT_STATUSES.to_vec(),
            methods: vec![Method::GET, Method::HEAD, Method::PUT, Method::DELETE],
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn should_retry_status(&self, status: reqwest::StatusCode) -> bool {
        self.statuses.contains(&status.as_u16())
    }

    /// Whether a request that may already have been processed can be sent again.
    pub fn may_replay(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// `delay = min(initial * 2^attempt, max)`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(20),
            retry: RetryConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` bound to the given cookie jar.
    pub fn build_client(
        &self,
        jar: &Arc<Jar>,
        redirects: Redirects,
    ) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .cookie_provider(Arc::clone(jar));

        builder = match redirects {
            Redirects::Follow => builder.redirect(redirect::Policy::limited(10)),
            Redirects::None => builder.redirect(redirect::Policy::none()),
        };

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.statuses, vec![500, 502, 503, 504]);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff(0), Duration::from_secs(1));
        assert_eq!(config.backoff(1), Duration::from_secs(2));
        assert_eq!(config.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff(3), Duration::from_secs(8));
        assert_eq!(config.backoff(40), Duration::from_secs(8));
    }

    #[test]
    fn only_listed_statuses_retry() {
        let config = RetryConfig::default();
        assert!(config.should_retry_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!config.should_retry_status(reqwest::StatusCode::FORBIDDEN));
        assert!(!config.should_retry_status(reqwest::StatusCode::NOT_IMPLEMENTED));
    }

    #[test]
    fn only_idempotent_methods_replay() {
        let config = RetryConfig::default();
        assert!(config.may_replay(&Method::GET));
        assert!(config.may_replay(&Method::DELETE));
        assert!(!config.may_replay(&Method::POST));
        assert!(!config.may_replay(&Method::PATCH));
    }
}
