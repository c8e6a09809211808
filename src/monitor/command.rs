//! Request/response message API for the presentation layer.
//!
//! Commands arrive as JSON objects tagged by `type`:
//!
//! ```
//! use cookiewatch::monitor::command::Command;
//!
//! let cmd: Command = serde_json::from_str(r#"{"type": "GET_HISTORY", "limit": 10}"#).unwrap();
//! assert_eq!(cmd, Command::GetHistory { limit: Some(10) });
//! ```

use crate::cookies::event::CookieEvent;
use crate::storage::history::{ExportDocument, StorageStats};
use crate::storage::settings::{Settings, SettingsPatch};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Live index plus currently tripped domains.
    GetCookies,
    GetHistory {
        #[serde(default)]
        limit: Option<usize>,
    },
    MuteDomain {
        domain: String,
    },
    UnmuteDomain {
        domain: String,
    },
    GetSettings,
    UpdateSettings {
        #[serde(default)]
        settings: SettingsPatch,
    },
    ClearHistory,
    ExportData {
        #[serde(default, rename = "includeValues")]
        include_values: bool,
    },
    /// Synthesize a recognizable high-risk event and alert.
    TriggerTestNotification,
    GetStorageStats,
}

/// Response payloads. Serialized without a tag; each shape has a distinct
/// top-level field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Cookies {
        cookies: Vec<CookieEvent>,
        #[serde(rename = "circuitBreakers")]
        circuit_breakers: Vec<String>,
    },
    History {
        history: Vec<CookieEvent>,
    },
    Settings {
        settings: Settings,
    },
    Export {
        data: ExportDocument,
    },
    Stats {
        stats: StorageStats,
    },
    Success {
        success: bool,
    },
    Error {
        error: String,
    },
}

impl Response {
    pub fn success() -> Self {
        Response::Success { success: true }
    }

    pub fn error(message: impl ToString) -> Self {
        Response::Error {
            error: message.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}
