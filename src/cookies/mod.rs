//! Cookie-domain algorithms.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`psl`] | Registrable domain (eTLD+1) and third-party checks |
//! | [`identity`] | Value-independent identity hashes |
//! | [`classifier`] | Tracking-risk tiers |
//! | [`sanitize`] | Control-character stripping and HTML escaping |
//! | [`canonicalcookie`] | Browser cookie and change-notification shapes |
//! | [`event`] | The [`CookieEvent`](event::CookieEvent) record |
//! | [`jar`] | In-memory cookie store that broadcasts changes |
//! | [`source`] | The [`CookieSource`](source::CookieSource) seam used for hydration |
//!
//! # Example
//!
//! ```rust
//! use cookiewatch::cookies::psl::{is_third_party, registrable_domain};
//!
//! assert_eq!(registrable_domain("www.example.co.uk"), "example.co.uk");
//! assert!(is_third_party("doubleclick.net", "https://example.com/"));
//! ```

pub mod canonicalcookie;
pub mod classifier;
pub mod event;
pub mod identity;
pub mod jar;
pub mod psl;
pub mod sanitize;
pub mod source;

pub use canonicalcookie::{BrowserCookie, CookieChange, SameSite};
pub use classifier::RiskTier;
pub use event::{CookieAction, CookieEvent};
pub use jar::CookieJar;
