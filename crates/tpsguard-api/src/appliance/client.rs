// Appliance request executor
//
// Wraps a `SessionManager` with anti-forgery header injection, transport
// retry for transient server errors (idempotent verbs only), and one-shot
// recovery from session expiry. Endpoint modules (zones, incidents, audit,
// system) add inherent methods on `ApplianceClient` in their own files.

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::auth::{AppliancePaths, Credentials};
use crate::error::Error;
use crate::session::{Session, SessionCache, SessionManager};
use crate::transport::{RetryConfig, TransportConfig};

/// Query string pairs for a request.
pub type Query<'a> = &'a [(&'a str, String)];

/// Session-authenticated client for the appliance web API.
///
/// Safe to share between tasks. (Re-)authentication is serialized behind
/// an async mutex; callers that observe the same expired session wait for
/// a single re-login and reuse its result.
pub struct ApplianceClient {
    base_url: Url,
    paths: AppliancePaths,
    retry: RetryConfig,
    sessions: Mutex<SessionManager>,
}

impl ApplianceClient {
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: TransportConfig,
        cache: SessionCache,
    ) -> Self {
        let retry = transport.retry.clone();
        let manager = SessionManager::new(base_url.clone(), credentials, transport, cache);
        Self::from_manager(manager, retry)
    }

    /// Build a client around an existing manager (custom paths, tests).
    pub fn from_manager(manager: SessionManager, retry: RetryConfig) -> Self {
        Self {
            base_url: manager.base_url().clone(),
            paths: manager.paths().clone(),
            retry,
            sessions: Mutex::new(manager),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Force a connect: revalidate the cached session or log in afresh.
    pub async fn connect(&self) -> Result<(), Error> {
        self.sessions.lock().await.connect().await.map(|_| ())
    }

    /// Drop the current session and its cache entry.
    pub async fn invalidate(&self) {
        self.sessions.lock().await.invalidate();
    }

    // ── Typed helpers ────────────────────────────────────────────────

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: Query<'_>) -> Result<T, Error> {
        let value = self.execute(Method::GET, endpoint, query, None).await?;
        decode(value)
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let body = encode(body)?;
        let value = self.execute(Method::POST, endpoint, &[], Some(&body)).await?;
        decode(value)
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: Query<'_>,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<T, Error> {
        let body = body.map(encode).transpose()?;
        let value = self
            .execute(Method::DELETE, endpoint, query, body.as_ref())
            .await?;
        decode(value)
    }

    // ── Executor ─────────────────────────────────────────────────────

    /// Issue one logical request and return its JSON body.
    ///
    /// A 204 or empty body yields an empty JSON object.
    pub async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        query: Query<'_>,
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        let url = self.base_url.join(endpoint)?;
        let session = self.sessions.lock().await.ensure().await?;

        let resp = self
            .send_with_retry(&session, &method, &url, query, body)
            .await?;

        let resp = if self.is_expired(&resp) {
            warn!(status = %resp.status(), "{method} {url}: session expired, re-authenticating");
            let session = self.recover(session.generation()).await?;
            let replay = self
                .send_with_retry(&session, &method, &url, query, body)
                .await?;
            if replay.status().is_success() && self.paths.is_login_url(replay.url()) {
                return Err(Error::SessionExpired);
            }
            replay
        } else {
            resp
        };

        into_json(resp).await
    }

    /// Re-authenticate after `stale` was found expired.
    ///
    /// If another caller already replaced that session, its successor is
    /// returned without logging in again.
    async fn recover(&self, stale: u64) -> Result<Session, Error> {
        let mut manager = self.sessions.lock().await;
        if manager.generation() != stale {
            if let Some(session) = manager.current() {
                debug!("session already refreshed by another caller");
                return Ok(session.clone());
            }
        }
        manager.invalidate();
        manager.connect().await
    }

    fn is_expired(&self, resp: &reqwest::Response) -> bool {
        let status = resp.status();
        status == StatusCode::FORBIDDEN
            || (status == StatusCode::OK && self.paths.is_login_url(resp.url()))
    }

    async fn send_with_retry(
        &self,
        session: &Session,
        method: &Method,
        url: &Url,
        query: Query<'_>,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, Error> {
        let mut attempt = 0;
        loop {
            debug!("{method} {url}");
            let mut builder = session.http().request(method.clone(), url.clone());
            if !query.is_empty() {
                builder = builder.query(query);
            }
            if is_state_changing(method) {
                builder = self.apply_csrf(session, builder);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let can_retry = attempt < self.retry.max_retries;
            let can_replay = can_retry && self.retry.may_replay(method);
            match builder.send().await {
                Ok(resp) if can_replay && self.retry.should_retry_status(resp.status()) => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        status = %resp.status(),
                        attempt = attempt + 1,
                        "transient server error, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(resp) => return Ok(resp),
                Err(e) if (can_retry && e.is_connect()) || (can_replay && e.is_timeout()) => {
                    let delay = self.retry.backoff(attempt);
                    warn!(error = %e, attempt = attempt + 1, "transport error, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(Error::Transport(e)),
            }
            attempt += 1;
        }
    }

    /// Anti-forgery token plus the headers the appliance expects from its
    /// own browser UI on state-changing requests.
    fn apply_csrf(&self, session: &Session, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let origin = self.base_url.as_str().trim_end_matches('/');
        let mut builder = builder
            .header("X-Requested-With", "XMLHttpRequest")
            .header(reqwest::header::ORIGIN, origin)
            .header(reqwest::header::REFERER, format!("{origin}/"));
        match session.csrf_token() {
            Some(token) => builder = builder.header(self.paths.csrf_header.as_str(), token),
            None => warn!("no anti-forgery token in session cookies; sending without it"),
        }
        builder
    }
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

async fn into_json(resp: reqwest::Response) -> Result<Value, Error> {
    let status = resp.status();
    if status == StatusCode::NO_CONTENT {
        return Ok(Value::Object(serde_json::Map::new()));
    }

    let body = resp.text().await.map_err(Error::Transport)?;
    if !status.is_success() {
        return Err(Error::Request {
            status: status.as_u16(),
            body,
        });
    }
    if body.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

fn encode(body: &(impl Serialize + Sync)) -> Result<Value, Error> {
    serde_json::to_value(body).map_err(|e| Error::Deserialization {
        message: format!("cannot encode request body: {e}"),
        body: String::new(),
    })
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    T::deserialize(&value).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: value.to_string(),
    })
}
