//! Registrable-domain (eTLD+1) resolution and third-party checks.
//!
//! Uses a small static list of multi-part public suffixes instead of the
//! full Public Suffix List. Hosts under suffixes missing from the list
//! resolve to their last two labels.

use url::Url;

/// Public suffixes recognised when computing the registrable domain.
static COMMON_SUFFIXES: &[&str] = &[
    "com", "org", "net", "edu", "gov", "mil", "int",
    "io", "co", "ai", "app", "dev",
    "co.uk", "ac.uk", "gov.uk", "org.uk",
    "co.jp", "ne.jp", "ac.jp", "go.jp",
    "com.au", "net.au", "org.au", "edu.au",
    "com.sg", "edu.sg", "org.sg", "net.sg",
    "co.kr", "ne.kr", "or.kr",
    "com.br", "gov.br",
    "co.in", "net.in",
    "co.nz", "org.nz",
    "github.io", "gitlab.io", "herokuapp.com",
    "azurewebsites.net", "vercel.app", "netlify.app",
];

/// Returned for an empty hostname.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// Check if `candidate` is in the static suffix list.
pub fn is_public_suffix(candidate: &str) -> bool {
    let lower = candidate.to_ascii_lowercase();
    COMMON_SUFFIXES.contains(&lower.as_str())
}

/// Get the registrable domain (eTLD+1) for a hostname.
///
/// For "www.example.co.uk", returns "example.co.uk".
/// For "a.b.example.com", returns "example.com".
/// Single-label hosts such as "localhost" are returned unchanged.
pub fn registrable_domain(hostname: &str) -> String {
    if hostname.is_empty() {
        return UNKNOWN_DOMAIN.to_string();
    }

    let host = hostname.strip_suffix('.').unwrap_or(hostname);
    let lower = host.to_ascii_lowercase();
    let parts: Vec<&str> = lower.split('.').collect();

    if parts.len() <= 1 {
        return host.to_string();
    }

    let tail = |n: usize| parts[parts.len().saturating_sub(n)..].join(".");

    if parts.len() >= 3 && is_public_suffix(&tail(3)) {
        return tail(4);
    }

    if is_public_suffix(&tail(2)) {
        return tail(3);
    }

    tail(2)
}

/// Check whether a cookie domain is cross-site relative to `reference_url`.
///
/// Non-http(s) contexts (`chrome://`, `about:`, extension pages) are never
/// third-party. A reference URL that fails to parse counts as third-party.
pub fn is_third_party(cookie_domain: &str, reference_url: &str) -> bool {
    let lower = reference_url.trim().to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return false;
    }

    let host = match Url::parse(reference_url) {
        Ok(url) => match url.host_str() {
            Some(host) => host.to_string(),
            None => return true,
        },
        Err(_) => return true,
    };

    let cookie_domain = cookie_domain.strip_prefix('.').unwrap_or(cookie_domain);
    if cookie_domain.is_empty() {
        return true;
    }

    registrable_domain(&host) != registrable_domain(cookie_domain)
}
