//! Tracking-risk classification.
//!
//! Third-party status decides first; otherwise an ordered keyword rule
//! table is matched against the cookie's name and (length-capped) value.

use crate::cookies::canonicalcookie::BrowserCookie;
use crate::cookies::sanitize::{sanitize_input, truncate_chars};
use serde::{Deserialize, Serialize};

/// Characters of the cookie value inspected by the keyword rules.
pub const VALUE_INSPECT_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

/// A keyword set and the tier it assigns on a match.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub label: &'static str,
    pub keywords: &'static [&'static str],
    pub tier: RiskTier,
}

/// Keyword rules in priority order. The first matching rule wins.
pub static KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        label: "tracking",
        keywords: &[
            "_ga", "_gid", "_fbp", "_fbc", "utm_", "__utma", "__utmz",
            "doubleclick", "adsense", "adroll", "criteo", "_hjid",
            "optimizely", "mixpanel", "segment", "amplitude",
            "pixel", "tracker", "uuid",
        ],
        tier: RiskTier::Medium,
    },
    KeywordRule {
        label: "analytics",
        keywords: &[
            "analytics", "stats", "metrics", "_gat", "matomo", "piwik",
            "hotjar", "newrelic", "datadog", "sentry",
        ],
        tier: RiskTier::Medium,
    },
    KeywordRule {
        label: "functional",
        keywords: &[
            "session", "auth", "token", "csrf", "xsrf", "login",
            "user", "pref", "lang", "locale", "timezone", "theme",
            "cart", "checkout", "order", "payment",
        ],
        tier: RiskTier::Low,
    },
];

/// Cookie risk classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: &'static [KeywordRule],
    value_limit: usize,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            rules: KEYWORD_RULES,
            value_limit: VALUE_INSPECT_LIMIT,
        }
    }

    /// Use a different rule table.
    pub fn with_rules(mut self, rules: &'static [KeywordRule]) -> Self {
        self.rules = rules;
        self
    }

    /// Inspect at most `limit` characters of the value.
    pub fn with_value_limit(mut self, limit: usize) -> Self {
        self.value_limit = limit;
        self
    }

    /// Classify a cookie.
    ///
    /// 1. third-party, unpartitioned: `High`
    /// 2. third-party, partitioned: `Medium`
    /// 3. first keyword rule matching name or value
    /// 4. otherwise `Low`
    pub fn classify(&self, cookie: &BrowserCookie, third_party: bool) -> RiskTier {
        if third_party {
            return if cookie.is_partitioned() {
                RiskTier::Medium
            } else {
                RiskTier::High
            };
        }

        self.matching_rule(cookie)
            .map(|rule| rule.tier)
            .unwrap_or(RiskTier::Low)
    }

    /// The first rule whose keywords occur in the cookie's name or value.
    pub fn matching_rule(&self, cookie: &BrowserCookie) -> Option<&'static KeywordRule> {
        let name = sanitize_input(&cookie.name).to_lowercase();
        let value = sanitize_input(truncate_chars(&cookie.value, self.value_limit)).to_lowercase();

        self.rules.iter().find(|rule| {
            rule.keywords
                .iter()
                .any(|k| name.contains(k) || value.contains(k))
        })
    }
}

/// Classify with the default rule table.
pub fn classify_cookie(cookie: &BrowserCookie, third_party: bool) -> RiskTier {
    Classifier::new().classify(cookie, third_party)
}
