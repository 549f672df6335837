//! Client-side session state injection.
//!
//! The application reads its session token from `localStorage` while it
//! initializes, so the token has to be in place for the origin before the
//! target view loads. Two ways to get it there:
//!
//! - [`StorageEntry::write_script`]: evaluated in an already-loaded page of
//!   the origin (storage is per-origin and unavailable on `about:blank`).
//! - [`StorageEntry::seed_script`]: registered to run before any page script
//!   of every new document.

use crate::result::{FireshotError, FireshotResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Storage key the asset application reads its Google ID token from
pub const SESSION_TOKEN_KEY: &str = "asset-google-id-token";

/// Token value accepted by construction; the backend is mocked anyway
pub const MOCK_SESSION_TOKEN: &str = "mock-token";

/// A key/value pair destined for `localStorage`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    /// Storage key
    pub key: String,
    /// Stored string value
    pub value: String,
}

impl StorageEntry {
    /// Create a new entry
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The simulated logged-in session of the asset application
    #[must_use]
    pub fn session_token() -> Self {
        Self::new(SESSION_TOKEN_KEY, MOCK_SESSION_TOKEN)
    }

    /// Script writing the entry into the current document's storage
    #[must_use]
    pub fn write_script(&self) -> String {
        format!(
            "window.localStorage.setItem({}, {})",
            js_string(&self.key),
            js_string(&self.value)
        )
    }

    /// Script for `Page.addScriptToEvaluateOnNewDocument`.
    ///
    /// Runs on every document including `about:blank`, where storage access
    /// throws, hence the guard.
    #[must_use]
    pub fn seed_script(&self) -> String {
        format!(
            "(() => {{ try {{ {}; }} catch (_) {{}} }})()",
            self.write_script()
        )
    }

    /// Script reading the entry back (`null` when absent)
    #[must_use]
    pub fn read_script(&self) -> String {
        format!("window.localStorage.getItem({})", js_string(&self.key))
    }
}

/// `s` as a JavaScript string literal
pub(crate) fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

/// Origin (`scheme://host[:port]`) that owns storage for `url`.
///
/// Fails for opaque origins such as `about:blank` or `data:` URLs, where
/// writing `localStorage` is a `SecurityError`.
pub fn storage_origin(url: &str) -> FireshotResult<String> {
    let parsed = Url::parse(url).map_err(|e| FireshotError::InvalidState {
        message: format!("cannot derive storage origin from {url:?}: {e}"),
    })?;
    let origin = parsed.origin();
    if !origin.is_tuple() {
        return Err(FireshotError::InvalidState {
            message: format!("{url} has an opaque origin; load a page of the target origin first"),
        });
    }
    Ok(origin.ascii_serialization())
}
