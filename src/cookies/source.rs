//! The browser cookie store as seen by the monitor.

use crate::base::monitorerror::MonitorError;
use crate::cookies::canonicalcookie::BrowserCookie;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Alias for the `Future` returned by a cookie source.
pub type Listing<'a> = BoxFuture<'a, Result<Vec<BrowserCookie>, MonitorError>>;

/// Enumerates every cookie currently held by the browser.
///
/// Used for bulk hydration when no checkpoint is available.
pub trait CookieSource: Send + Sync {
    fn get_all(&self) -> Listing<'_>;
}

impl<S: CookieSource + ?Sized> CookieSource for Arc<S> {
    fn get_all(&self) -> Listing<'_> {
        (**self).get_all()
    }
}

/// A source with no cookies, for hosts that never hydrate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySource;

impl CookieSource for EmptySource {
    fn get_all(&self) -> Listing<'_> {
        Box::pin(async { Ok(Vec::new()) })
    }
}
