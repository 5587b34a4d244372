use secrecy::SecretString;
use url::Url;

/// Username/password pair for the appliance's form login.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

/// Appliance-specific names used by the session layer.
///
/// The defaults match the TPS management console. They are exposed as a
/// struct so a deployment with a differently mounted console can override
/// them without touching the session logic.
#[derive(Debug, Clone)]
pub struct AppliancePaths {
    /// Login form page. GET returns the form, POST submits it.
    pub login: String,
    /// Authenticated-only page probed (without following redirects) to
    /// validate a cached session.
    pub probe: String,
    /// Substring present only on the login page.
    pub login_marker: String,
    /// Cookie holding the anti-forgery token.
    pub csrf_cookie: String,
    /// Header the token is echoed back in on state-changing requests.
    pub csrf_header: String,
    /// Used when the login form carries no `region` field.
    pub default_region: String,
}

impl Default for AppliancePaths {
    fn default() -> Self {
        Self {
            login: "/auth/login/".into(),
            probe: "/dashboard/".into(),
            login_marker: "id_username".into(),
            csrf_cookie: "csrftoken".into(),
            csrf_header: "X-CSRFToken".into(),
            default_region: "http://127.0.0.1:5000/v3".into(),
        }
    }
}

impl AppliancePaths {
    /// Whether `url` points at the login page (query string ignored).
    pub fn is_login_url(&self, url: &Url) -> bool {
        url.path().trim_end_matches('/') == self.login.trim_end_matches('/')
    }

    /// Whether a redirect `Location` header value targets the login page.
    ///
    /// Accepts both absolute and relative locations.
    pub fn is_login_location(&self, location: &str) -> bool {
        let path = Url::parse(location)
            .map(|u| u.path().to_owned())
            .unwrap_or_else(|_| location.split('?').next().unwrap_or_default().to_owned());
        path.trim_end_matches('/') == self.login.trim_end_matches('/')
    }

    /// Whether a response body is the login form.
    pub fn is_login_page(&self, body: &str) -> bool {
        body.contains(&self.login_marker)
    }
}
