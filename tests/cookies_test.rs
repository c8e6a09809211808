use cookiewatch::cookies::jar::is_valid_cookie_domain;
use cookiewatch::cookies::source::CookieSource;
use cookiewatch::cookies::{BrowserCookie, CookieJar, SameSite};
use url::Url;

#[tokio::test]
async fn test_parse_and_save() {
    let jar = CookieJar::new();
    let mut changes = jar.subscribe();
    let url = Url::parse("https://example.com/foo").unwrap();

    assert!(jar.parse_and_save_cookie(&url, "foo=bar; Path=/", "0"));

    let cookies = jar.all_cookies();
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name, "foo");
    assert_eq!(cookies[0].value, "bar");
    assert_eq!(cookies[0].path, "/");
    assert!(cookies[0].host_only);
    assert!(cookies[0].session);

    let change = changes.recv().await.unwrap();
    assert!(!change.removed);
    assert_eq!(change.cause.as_deref(), Some("explicit"));
}

#[test]
fn test_domain_attribute() {
    let jar = CookieJar::new();
    let url = Url::parse("https://a.example.com").unwrap();

    assert!(jar.parse_and_save_cookie(&url, "host=val", "0"));
    assert!(jar.parse_and_save_cookie(&url, "domain=val; Domain=example.com", "0"));
    assert!(!jar.parse_and_save_cookie(&url, "evil=val; Domain=com", "0"));
    assert!(!jar.parse_and_save_cookie(&url, "other=val; Domain=other.com", "0"));

    let cookies = jar.all_cookies();
    assert_eq!(cookies.len(), 2);
    let domain_cookie = cookies.iter().find(|c| c.name == "domain").unwrap();
    assert_eq!(domain_cookie.domain, ".example.com");
    assert!(!domain_cookie.host_only);
}

#[test]
fn test_secure_and_same_site_flags() {
    let jar = CookieJar::new();
    let url = Url::parse("https://example.com").unwrap();

    jar.parse_and_save_cookie(&url, "s=1; Secure; HttpOnly; SameSite=None", "0");

    let cookie = &jar.all_cookies()[0];
    assert!(cookie.secure);
    assert!(cookie.http_only);
    assert_eq!(cookie.same_site, SameSite::NoRestriction);
}

#[tokio::test]
async fn test_overwrite_reports_removal_then_addition() {
    let jar = CookieJar::new();
    let mut changes = jar.subscribe();

    jar.set_cookie(BrowserCookie::new("a", "1", "example.com"));
    jar.set_cookie(BrowserCookie::new("a", "2", "example.com"));

    let first = changes.recv().await.unwrap();
    let second = changes.recv().await.unwrap();
    let third = changes.recv().await.unwrap();

    assert!(!first.removed);
    assert!(second.removed);
    assert_eq!(second.cause.as_deref(), Some("overwrite"));
    assert_eq!(second.cookie.value, "1");
    assert!(!third.removed);
    assert_eq!(third.cookie.value, "2");
    assert_eq!(jar.total_cookie_count(), 1);
}

#[tokio::test]
async fn test_jar_lists_for_hydration() {
    let jar = CookieJar::new();
    jar.set_cookie(BrowserCookie::new("a", "1", "example.com"));
    jar.set_cookie(BrowserCookie::new("a", "1", "example.com").with_store("1"));

    let listed = jar.get_all().await.unwrap();
    assert_eq!(listed.len(), 2);
}

#[test]
fn test_cookie_domain_validation() {
    assert!(is_valid_cookie_domain("example.com", "example.com"));
    assert!(is_valid_cookie_domain("example.com", "sub.example.com"));
    assert!(!is_valid_cookie_domain(".com", "example.com"));
    assert!(!is_valid_cookie_domain("other.com", "example.com"));
    assert!(!is_valid_cookie_domain("example.co.uk", "co.uk"));
}
