//! Stable identity keys for cookies.
//!
//! A cookie's identity is the 4-tuple (store id, domain, path, name); its
//! value is deliberately not part of the key, so overwriting a cookie maps
//! onto the same entry.

use crate::base::monitorerror::MonitorError;
use crate::cookies::canonicalcookie::BrowserCookie;
use boring::hash::{hash, MessageDigest};

/// Hex characters kept from the SHA-256 digest (128 bits).
pub const IDENTITY_HASH_HEX_LEN: usize = 32;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Compute the identity hash of a (store, domain, path, name) tuple.
///
/// Each field is length-prefixed before hashing so that no two distinct
/// tuples share an encoding, e.g. `("a|b", "c")` and `("a", "b|c")`.
pub fn identity_hash(
    store_id: &str,
    domain: &str,
    path: &str,
    name: &str,
) -> Result<String, MonitorError> {
    let mut encoded = String::with_capacity(store_id.len() + domain.len() + path.len() + name.len() + 24);
    for field in [store_id, domain, path, name] {
        encoded.push_str(&field.len().to_string());
        encoded.push(':');
        encoded.push_str(field);
        encoded.push(';');
    }

    let digest = hash(MessageDigest::sha256(), encoded.as_bytes())?;

    let mut hex = String::with_capacity(IDENTITY_HASH_HEX_LEN);
    for byte in digest.iter().take(IDENTITY_HASH_HEX_LEN / 2) {
        hex.push(HEX[(byte >> 4) as usize] as char);
        hex.push(HEX[(byte & 0x0f) as usize] as char);
    }
    Ok(hex)
}

/// Identity hash of a browser cookie.
pub fn identity_hash_for(cookie: &BrowserCookie) -> Result<String, MonitorError> {
    identity_hash(&cookie.store_id, &cookie.domain, &cookie.path, &cookie.name)
}
