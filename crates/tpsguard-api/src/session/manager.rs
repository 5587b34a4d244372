// Session manager
//
// Owns the appliance login flow: cached-session revalidation, form login
// with the anti-forgery token scraped from the login page, and persistence
// of the resulting cookie set. One manager holds at most one current session.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use reqwest::cookie::{CookieStore, Jar};
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{AppliancePaths, Credentials};
use crate::error::Error;
use crate::session::cache::{CookieMap, SessionCache};
use crate::transport::{Redirects, TransportConfig};

/// Hidden form field carrying the login page's anti-forgery token.
/// Tolerates either quoting style.
static CSRF_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name=['"]csrfmiddlewaretoken['"]\s+value=['"]([^'"]+)['"]"#)
        .expect("invalid CSRF field regex")
});

static REGION_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name=['"]region['"]\s+value=['"]([^'"]+)['"]"#)
        .expect("invalid region field regex")
});

/// An authenticated cookie session.
///
/// Cheap to clone: the jar and the client are both reference counted.
/// Requests issued through [`Session::http`] carry the session cookies.
#[derive(Debug, Clone)]
pub struct Session {
    jar: Arc<Jar>,
    http: reqwest::Client,
    base_url: Url,
    csrf_cookie: String,
    generation: u64,
}

impl Session {
    /// Redirect-following client bound to this session's cookie jar.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Monotonic counter identifying which login produced this session.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// All cookies the jar would send to the appliance root.
    pub fn cookies(&self) -> CookieMap {
        cookies_for(&self.jar, &self.base_url)
    }

    /// Anti-forgery token from the session cookies, if the appliance set one.
    pub fn csrf_token(&self) -> Option<String> {
        self.cookies().remove(&self.csrf_cookie)
    }
}

/// Manages the lifecycle of a single appliance session.
pub struct SessionManager {
    base_url: Url,
    credentials: Credentials,
    paths: AppliancePaths,
    transport: TransportConfig,
    cache: SessionCache,
    current: Option<Session>,
    generation: u64,
}

impl SessionManager {
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: TransportConfig,
        cache: SessionCache,
    ) -> Self {
        Self {
            base_url,
            credentials,
            paths: AppliancePaths::default(),
            transport,
            cache,
            current: None,
            generation: 0,
        }
    }

    pub fn with_paths(mut self, paths: AppliancePaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn paths(&self) -> &AppliancePaths {
        &self.paths
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    /// The session currently held, if any.
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Generation of the most recent successful connect. `0` before the first.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Establish a usable session: reuse the cached one if it still
    /// validates, otherwise perform a full login.
    pub async fn connect(&mut self) -> Result<Session, Error> {
        if let Some(cookies) = self.cache.load() {
            let jar = self.jar_with(&cookies);
            if self.validate(&jar).await {
                info!("reusing cached appliance session");
                return self.adopt(jar);
            }
            debug!("cached session rejected by appliance");
        }

        let jar = Arc::new(Jar::default());
        self.login(&jar).await?;
        self.cache.store(&cookies_for(&jar, &self.base_url));
        self.adopt(jar)
    }

    /// Connect only if no session is held.
    pub async fn ensure(&mut self) -> Result<Session, Error> {
        match &self.current {
            Some(session) => Ok(session.clone()),
            None => self.connect().await,
        }
    }

    /// Drop the in-memory session and the persisted cache.
    pub fn invalidate(&mut self) {
        if self.current.take().is_some() {
            debug!("session invalidated");
        }
        self.cache.clear();
    }

    fn adopt(&mut self, jar: Arc<Jar>) -> Result<Session, Error> {
        let http = self.transport.build_client(&jar, Redirects::Follow)?;
        self.generation += 1;
        let session = Session {
            jar,
            http,
            base_url: self.base_url.clone(),
            csrf_cookie: self.paths.csrf_cookie.clone(),
            generation: self.generation,
        };
        self.current = Some(session.clone());
        Ok(session)
    }

    fn jar_with(&self, cookies: &CookieMap) -> Arc<Jar> {
        let jar = Jar::default();
        for (name, value) in cookies {
            jar.add_cookie_str(&format!("{name}={value}; Path=/"), &self.base_url);
        }
        Arc::new(jar)
    }

    // ── Validation probe ─────────────────────────────────────────────

    /// Probe an authenticated-only page without following redirects.
    ///
    /// 2xx without the login form is valid; a redirect toward the login
    /// page (or a 200 that still renders it) is not. Any other redirect is
    /// accepted. Errors and other statuses count as invalid.
    async fn validate(&self, jar: &Arc<Jar>) -> bool {
        let client = match self.transport.build_client(jar, Redirects::None) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "cannot build probe client");
                return false;
            }
        };
        let Ok(url) = self.base_url.join(&self.paths.probe) else {
            return false;
        };

        let resp = match client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(error = %e, "session probe failed");
                return false;
            }
        };

        let status = resp.status();
        if status.is_redirection() {
            let to_login = resp
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|loc| self.paths.is_login_location(loc));
            return !to_login;
        }
        if !status.is_success() {
            return false;
        }
        match resp.text().await {
            Ok(body) => !self.paths.is_login_page(&body),
            Err(_) => false,
        }
    }

    // ── Form login ───────────────────────────────────────────────────

    async fn login(&self, jar: &Arc<Jar>) -> Result<(), Error> {
        let http = self.transport.build_client(jar, Redirects::Follow)?;
        let login_url = self.base_url.join(&self.paths.login)?;

        debug!("fetching login page at {}", login_url);
        let page = http
            .get(login_url.clone())
            .send()
            .await
            .map_err(|e| auth_error(format!("login page unreachable: {e}")))?;
        if !page.status().is_success() {
            return Err(auth_error(format!(
                "login page returned HTTP {}",
                page.status()
            )));
        }
        let page = page
            .text()
            .await
            .map_err(|e| auth_error(format!("failed to read login page: {e}")))?;

        let token = extract_csrf_token(&page)
            .ok_or_else(|| auth_error("anti-forgery token not found on login page".into()))?;
        let region =
            extract_region(&page).unwrap_or_else(|| self.paths.default_region.clone());

        debug!(username = %self.credentials.username, "submitting login form");
        let form = [
            ("csrfmiddlewaretoken", token.as_str()),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.expose_secret()),
            ("region", region.as_str()),
        ];
        let resp = http
            .post(login_url.clone())
            .header(reqwest::header::REFERER, login_url.as_str())
            .form(&form)
            .send()
            .await
            .map_err(|e| auth_error(format!("login request failed: {e}")))?;

        let status = resp.status();
        let final_url = resp.url().clone();
        let body = resp
            .text()
            .await
            .map_err(|e| auth_error(format!("failed to read login response: {e}")))?;

        if !status.is_success() {
            return Err(auth_error(format!("login rejected (HTTP {status})")));
        }
        if self.paths.is_login_url(&final_url) || self.paths.is_login_page(&body) {
            return Err(auth_error("invalid credentials".into()));
        }

        info!(username = %self.credentials.username, "logged in to appliance");
        Ok(())
    }
}

fn auth_error(message: String) -> Error {
    Error::Authentication { message }
}

pub(crate) fn extract_csrf_token(page: &str) -> Option<String> {
    CSRF_FIELD
        .captures(page)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
}

pub(crate) fn extract_region(page: &str) -> Option<String> {
    REGION_FIELD
        .captures(page)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
}

fn cookies_for(jar: &Jar, url: &Url) -> CookieMap {
    let Some(header) = jar.cookies(url) else {
        return CookieMap::new();
    };
    let Ok(header) = header.to_str() else {
        return CookieMap::new();
    };
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.to_owned(), value.to_owned()))
        })
        .collect()
}
