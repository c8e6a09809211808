//! In-memory browser cookie store that emits change notifications.
//!
//! Plays the role of the browser's cookie jar for embedding hosts and
//! tests: every insert, overwrite and removal is broadcast as a
//! [`CookieChange`], and the full contents can be listed for hydration.

use crate::cookies::canonicalcookie::{BrowserCookie, CookieChange, SameSite};
use crate::cookies::psl::is_public_suffix;
use crate::cookies::source::{CookieSource, Listing};
use crate::LOG_TARGET;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use url::Url;

/// Buffered notifications per subscriber before it starts lagging.
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

type JarKey = (String, String, String, String);

/// Thread-safe cookie jar keyed by (store, domain, path, name).
#[derive(Clone)]
pub struct CookieJar {
    store: Arc<DashMap<JarKey, BrowserCookie>>,
    changes: broadcast::Sender<CookieChange>,
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieJar {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            store: Arc::new(DashMap::new()),
            changes,
        }
    }

    /// Receive every subsequent change.
    pub fn subscribe(&self) -> broadcast::Receiver<CookieChange> {
        self.changes.subscribe()
    }

    fn key(cookie: &BrowserCookie) -> JarKey {
        (
            cookie.store_id.clone(),
            cookie.domain.clone(),
            cookie.path.clone(),
            cookie.name.clone(),
        )
    }

    fn emit(&self, cookie: BrowserCookie, removed: bool, cause: &str) {
        // No subscribers is not an error.
        let _ = self.changes.send(CookieChange {
            cookie,
            removed,
            cause: Some(cause.to_string()),
        });
    }

    /// Insert or overwrite a cookie.
    ///
    /// Overwrites are reported the way browsers report them: a removal
    /// with cause `overwrite` followed by an `explicit` addition.
    pub fn set_cookie(&self, cookie: BrowserCookie) {
        let previous = self.store.insert(Self::key(&cookie), cookie.clone());
        if let Some(previous) = previous {
            self.emit(previous, true, "overwrite");
        }
        self.emit(cookie, false, "explicit");
    }

    /// Remove a cookie by identity. Returns the removed cookie, if any.
    pub fn remove_cookie(&self, store_id: &str, domain: &str, path: &str, name: &str) -> Option<BrowserCookie> {
        let key = (
            store_id.to_string(),
            domain.to_string(),
            path.to_string(),
            name.to_string(),
        );
        let (_, removed) = self.store.remove(&key)?;
        self.emit(removed.clone(), true, "explicit");
        Some(removed)
    }

    /// Remove every cookie whose expiration date lies before `now_secs`.
    pub fn purge_expired(&self, now_secs: f64) -> usize {
        let expired: Vec<JarKey> = self
            .store
            .iter()
            .filter(|e| e.value().expiration_date.is_some_and(|exp| exp < now_secs))
            .map(|e| e.key().clone())
            .collect();

        let mut count = 0;
        for key in expired {
            if let Some((_, cookie)) = self.store.remove(&key) {
                self.emit(cookie, true, "expired");
                count += 1;
            }
        }
        count
    }

    /// Parse a `Set-Cookie` line received from `url` and store it.
    ///
    /// Returns `false` when the line does not parse or its `Domain`
    /// attribute is not acceptable for the URL.
    pub fn parse_and_save_cookie(&self, url: &Url, cookie_line: &str, store_id: &str) -> bool {
        use cookie::Cookie;

        let Ok(parsed) = Cookie::parse(cookie_line) else {
            tracing::debug!(target: LOG_TARGET, line = %cookie_line, "failed to parse Set-Cookie line");
            return false;
        };
        let host = url.host_str().unwrap_or("").to_lowercase();

        let (domain, host_only) = match parsed.domain() {
            Some(d) => {
                let d = d.trim_start_matches('.').to_lowercase();
                if !is_valid_cookie_domain(&d, &host) {
                    return false;
                }
                (format!(".{}", d), false)
            }
            None => (host, true),
        };

        let same_site = match parsed.same_site() {
            Some(cookie::SameSite::Lax) => SameSite::Lax,
            Some(cookie::SameSite::Strict) => SameSite::Strict,
            Some(cookie::SameSite::None) => SameSite::NoRestriction,
            None => SameSite::Unspecified,
        };

        let expiration_date = parsed
            .expires()
            .and_then(|e| e.datetime())
            .map(|t| t.unix_timestamp() as f64);

        self.set_cookie(BrowserCookie {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain,
            path: parsed.path().unwrap_or("/").to_string(),
            store_id: store_id.to_string(),
            host_only,
            secure: parsed.secure().unwrap_or(false),
            http_only: parsed.http_only().unwrap_or(false),
            same_site,
            session: expiration_date.is_none(),
            expiration_date,
            partition_key: None,
        });
        true
    }

    /// Get total cookie count.
    pub fn total_cookie_count(&self) -> usize {
        self.store.len()
    }

    /// Snapshot of all cookies.
    pub fn all_cookies(&self) -> Vec<BrowserCookie> {
        self.store.iter().map(|e| e.value().clone()).collect()
    }
}

impl CookieSource for CookieJar {
    fn get_all(&self) -> Listing<'_> {
        let cookies = self.all_cookies();
        Box::pin(async move { Ok(cookies) })
    }
}

/// Check if a cookie domain is valid for a given URL host.
/// The cookie domain must not be a public suffix and the host must
/// domain-match it.
pub fn is_valid_cookie_domain(cookie_domain: &str, url_host: &str) -> bool {
    let cookie_domain = cookie_domain.strip_prefix('.').unwrap_or(cookie_domain).to_lowercase();
    let url_host = url_host.to_lowercase();

    if cookie_domain.is_empty() || is_public_suffix(&cookie_domain) {
        return false;
    }

    url_host == cookie_domain || url_host.ends_with(&format!(".{}", cookie_domain))
}
