// Durable session cache
//
// A flat JSON object of `{cookie_name: value}` for the appliance host.
// Every failure here is soft: an unreadable cache is treated as absent and
// a failed write only costs a fresh login next time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Cookie name → value, as persisted on disk.
pub type CookieMap = BTreeMap<String, String>;

/// File-backed session cache. A cache without a path is a no-op.
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
    path: Option<PathBuf>,
}

impl SessionCache {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A cache that never loads and never writes.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the cached cookie set. `None` when absent, unreadable, or empty.
    pub fn load(&self) -> Option<CookieMap> {
        let path = self.path.as_ref()?;
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cached session");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "session cache unreadable");
                return None;
            }
        };

        match serde_json::from_str::<CookieMap>(&raw) {
            Ok(cookies) if cookies.is_empty() => None,
            Ok(cookies) => {
                debug!(path = %path.display(), count = cookies.len(), "loaded cached session");
                Some(cookies)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "session cache is not valid JSON");
                None
            }
        }
    }

    /// Overwrite the cache with `cookies`. Failures are logged, not returned.
    pub fn store(&self, cookies: &CookieMap) {
        let Some(path) = self.path.as_ref() else {
            return;
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %path.display(), error = %e, "cannot create session cache dir");
                return;
            }
        }

        let json = match serde_json::to_string(cookies) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "cannot serialize session cookies");
                return;
            }
        };

        match std::fs::write(path, json) {
            Ok(()) => debug!(path = %path.display(), "session cached"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to write session cache"),
        }
    }

    /// Remove the cache file if present.
    pub fn clear(&self) {
        let Some(path) = self.path.as_ref() else {
            return;
        };
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "session cache cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove session cache"),
        }
    }
}
