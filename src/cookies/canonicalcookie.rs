//! Browser cookie and change-notification shapes.

use serde::{Deserialize, Serialize};

/// Store id Chromium assigns to the incognito cookie jar.
pub const INCOGNITO_STORE_ID: &str = "1";

/// Store id Firefox assigns to the private-browsing cookie jar.
pub const FIREFOX_PRIVATE_STORE_ID: &str = "firefox-private";

/// A cookie as reported by the browser's cookie store.
/// Modeled after the `cookies.Cookie` object of the WebExtensions API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserCookie {
    pub name: String,
    #[serde(default)]
    pub value: String,
    pub domain: String,
    pub path: String,
    pub store_id: String,
    #[serde(default)]
    pub host_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub same_site: SameSite,
    #[serde(default)]
    pub session: bool,
    /// Expiry in seconds since the epoch; `None` for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<PartitionKey>,
}

/// CHIPS partition key of a partitioned cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_level_site: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameSite {
    #[default]
    Unspecified,
    NoRestriction,
    Lax,
    Strict,
}

/// A change notification from the cookie store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieChange {
    pub cookie: BrowserCookie,
    pub removed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl BrowserCookie {
    /// Session cookie in the default store with `/` path.
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
            store_id: "0".to_string(),
            host_only: true,
            secure: false,
            http_only: false,
            same_site: SameSite::Unspecified,
            session: true,
            expiration_date: None,
            partition_key: None,
        }
    }

    pub fn with_store(mut self, store_id: impl Into<String>) -> Self {
        self.store_id = store_id.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Mark the cookie as partitioned under `top_level_site`.
    pub fn partitioned(mut self, top_level_site: impl Into<String>) -> Self {
        self.partition_key = Some(PartitionKey {
            top_level_site: Some(top_level_site.into()),
        });
        self
    }

    pub fn is_partitioned(&self) -> bool {
        self.partition_key.is_some()
    }

    /// Whether the cookie lives in a private-browsing store.
    pub fn is_private(&self) -> bool {
        is_private_store(&self.store_id)
    }

    /// Top-level site the cookie is partitioned under, if any.
    pub fn partition_site(&self) -> Option<&str> {
        self.partition_key
            .as_ref()
            .and_then(|k| k.top_level_site.as_deref())
    }
}

impl CookieChange {
    pub fn added(cookie: BrowserCookie) -> Self {
        Self {
            cookie,
            removed: false,
            cause: Some("explicit".to_string()),
        }
    }

    pub fn removed(cookie: BrowserCookie) -> Self {
        Self {
            cookie,
            removed: true,
            cause: Some("explicit".to_string()),
        }
    }
}

/// Whether `store_id` names a private-browsing cookie store.
pub fn is_private_store(store_id: &str) -> bool {
    store_id == INCOGNITO_STORE_ID || store_id == FIREFOX_PRIVATE_STORE_ID
}
