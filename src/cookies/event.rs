//! The canonical cookie event record.
//!
//! One record per identity lives in the monitor's live index; the same
//! shape is appended to durable history and shipped to the presentation
//! layer.

use crate::base::clock::Millis;
use crate::cookies::canonicalcookie::{BrowserCookie, SameSite};
use crate::cookies::classifier::RiskTier;
use crate::cookies::psl::registrable_domain;
use crate::cookies::sanitize::sanitize_input;
use serde::{Deserialize, Serialize};

/// Marker written in place of cookie values in redacted exports.
pub const REDACTED_VALUE: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieAction {
    Added,
    Removed,
    Hydrated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieEvent {
    pub identity_hash: String,
    pub timestamp: Millis,
    pub action: CookieAction,
    #[serde(default = "default_cause")]
    pub cause: String,
    pub name: String,
    pub domain: String,
    pub path: String,
    /// Registrable domain (eTLD+1) of `domain`.
    #[serde(rename = "etld")]
    pub registrable_domain: String,
    pub store_id: String,
    pub risk_level: RiskTier,
    pub is_third_party: bool,
    pub is_partitioned: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub same_site: SameSite,
    #[serde(default)]
    pub session: bool,
    pub change_count: u64,
    pub last_seen: Millis,
    pub is_incognito: bool,
    /// Sanitized value, captured for history while developer mode is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

fn default_cause() -> String {
    "unknown".to_string()
}

impl CookieEvent {
    /// Build a first-sight record for `cookie`.
    ///
    /// Risk and third-party status start at `Low`/`false`; the caller fills
    /// them in after classification.
    pub fn from_cookie(identity_hash: String, cookie: &BrowserCookie, action: CookieAction, now: Millis) -> Self {
        Self {
            identity_hash,
            timestamp: now,
            action,
            cause: default_cause(),
            name: sanitize_input(&cookie.name),
            domain: sanitize_input(&cookie.domain),
            path: sanitize_input(&cookie.path),
            registrable_domain: registrable_domain(cookie.domain.trim_start_matches('.')),
            store_id: cookie.store_id.clone(),
            risk_level: RiskTier::Low,
            is_third_party: false,
            is_partitioned: cookie.is_partitioned(),
            secure: cookie.secure,
            http_only: cookie.http_only,
            same_site: cookie.same_site,
            session: cookie.session,
            change_count: 1,
            last_seen: now,
            is_incognito: cookie.is_private(),
            value: None,
        }
    }

    /// Record a repeated "added" notification for this identity.
    pub fn touch(&mut self, now: Millis) {
        self.change_count += 1;
        self.last_seen = now;
    }

    /// Copy of the record with the value replaced by [`REDACTED_VALUE`].
    pub fn redacted(&self) -> Self {
        Self {
            value: Some(REDACTED_VALUE.to_string()),
            ..self.clone()
        }
    }
}
