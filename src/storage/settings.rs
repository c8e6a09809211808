//! Persisted records owned by the history store.

use crate::base::clock::Millis;
use serde::{Deserialize, Serialize};

/// Schema version written to metadata and exports.
pub const STORAGE_VERSION: &str = "1.0.0";

/// User-facing toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Track cookies from private-browsing stores.
    pub incognito_enabled: bool,
    /// Enables export and value capture.
    pub developer_mode: bool,
    pub notifications_enabled: bool,
    /// Automatically mute well-known large tracking networks.
    pub auto_mute_big_tech: bool,
    pub theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            incognito_enabled: false,
            developer_mode: false,
            notifications_enabled: true,
            auto_mute_big_tech: false,
            theme: "auto".to_string(),
        }
    }
}

/// A partial settings update. Present fields overwrite, absent fields keep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incognito_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_mute_big_tech: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl Settings {
    /// Shallow merge of `patch` into `self`.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.incognito_enabled {
            self.incognito_enabled = v;
        }
        if let Some(v) = patch.developer_mode {
            self.developer_mode = v;
        }
        if let Some(v) = patch.notifications_enabled {
            self.notifications_enabled = v;
        }
        if let Some(v) = patch.auto_mute_big_tech {
            self.auto_mute_big_tech = v;
        }
        if let Some(v) = patch.theme {
            self.theme = v;
        }
    }
}

/// Registry entry for a muted registrable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutedDomainEntry {
    pub timestamp: Millis,
    /// `true` when the user muted the domain, `false` for automatic mutes.
    pub manual: bool,
}

/// Bookkeeping for the durable history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub version: String,
    pub total_events: u64,
    pub last_write: Option<Millis>,
    pub last_prune: Option<Millis>,
    pub pruned_count: u64,
    pub last_clear: Option<Millis>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            version: STORAGE_VERSION.to_string(),
            total_events: 0,
            last_write: None,
            last_prune: None,
            pruned_count: 0,
            last_clear: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(!s.incognito_enabled);
        assert!(!s.developer_mode);
        assert!(s.notifications_enabled);
        assert!(!s.auto_mute_big_tech);
        assert_eq!(s.theme, "auto");
    }

    #[test]
    fn test_patch_is_shallow_merge() {
        let mut s = Settings::default();
        s.apply(SettingsPatch {
            developer_mode: Some(true),
            theme: Some("dark".into()),
            ..Default::default()
        });

        assert!(s.developer_mode);
        assert_eq!(s.theme, "dark");
        assert!(s.notifications_enabled);
    }

    #[test]
    fn test_partial_stored_settings_fill_defaults() {
        let s: Settings = serde_json::from_str(r#"{"developerMode": true}"#).unwrap();
        assert!(s.developer_mode);
        assert!(s.notifications_enabled);
        assert_eq!(s.theme, "auto");
    }

    #[test]
    fn test_patch_from_json() {
        let p: SettingsPatch = serde_json::from_str(r#"{"incognitoEnabled": true}"#).unwrap();
        assert_eq!(p.incognito_enabled, Some(true));
        assert!(p.theme.is_none());
    }
}
