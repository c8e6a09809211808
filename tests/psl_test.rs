//! Registrable-domain and third-party integration tests.

use cookiewatch::cookies::psl::{is_public_suffix, is_third_party, registrable_domain, UNKNOWN_DOMAIN};

#[test]
fn test_tld_is_public_suffix() {
    assert!(is_public_suffix("com"));
    assert!(is_public_suffix("org"));
    assert!(is_public_suffix("net"));
    assert!(is_public_suffix("co.uk"));
    assert!(is_public_suffix("com.au"));
}

#[test]
fn test_domain_not_public_suffix() {
    assert!(!is_public_suffix("example.com"));
    assert!(!is_public_suffix("google.com"));
    assert!(!is_public_suffix("bbc.co.uk"));
}

#[test]
fn test_registrable_domain_extraction() {
    assert_eq!(registrable_domain("www.example.co.uk"), "example.co.uk");
    assert_eq!(registrable_domain("a.b.example.com"), "example.com");
    assert_eq!(registrable_domain("localhost"), "localhost");
    assert_eq!(registrable_domain("www.bbc.co.uk"), "bbc.co.uk");
    assert_eq!(registrable_domain("user.github.io"), "user.github.io");
}

#[test]
fn test_registrable_domain_normalizes() {
    assert_eq!(registrable_domain("WWW.Example.COM"), "example.com");
    assert_eq!(registrable_domain("www.example.com."), "example.com");
    assert_eq!(registrable_domain(""), UNKNOWN_DOMAIN);
}

#[test]
fn test_unlisted_suffix_falls_back_to_two_labels() {
    // "co.za" is not in the static list.
    assert_eq!(registrable_domain("shop.example.co.za"), "co.za");
}

#[test]
fn test_third_party() {
    assert!(is_third_party("doubleclick.net", "https://example.com/"));
    assert!(!is_third_party("example.com", "https://sub.example.com/"));
    assert!(!is_third_party(".example.com", "https://www.example.com/page"));
}

#[test]
fn test_non_web_contexts_are_first_party() {
    assert!(!is_third_party("doubleclick.net", "chrome://settings"));
    assert!(!is_third_party("doubleclick.net", "about:blank"));
    assert!(!is_third_party("doubleclick.net", "moz-extension://abc/popup.html"));
}

#[test]
fn test_unparseable_reference_is_third_party() {
    assert!(is_third_party("example.com", "https://"));
}
