use thiserror::Error;

/// Errors surfaced by the monitoring pipeline.
///
/// Variants follow how far a failure is allowed to propagate:
///
/// | Variant | Scope |
/// |---------|-------|
/// | [`StorageInit`](MonitorError::StorageInit) | fatal for startup |
/// | [`Storage`](MonitorError::Storage) | transient, logged by callers that can fall back |
/// | [`Digest`](MonitorError::Digest) | fatal for the single event being processed |
/// | [`DeveloperModeRequired`](MonitorError::DeveloperModeRequired) | user visible |
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MonitorError {
    #[error("Durable storage unavailable at startup: {message}")]
    StorageInit { message: String },
    #[error("Storage operation on '{key}' failed: {message}")]
    Storage { key: String, message: String },
    #[error("Identity digest unavailable: {0}")]
    Digest(String),
    #[error("Developer mode required for export")]
    DeveloperModeRequired,
    #[error("Serialization failed: {message}")]
    Serialization { message: String },
    #[error("Invalid command: {message}")]
    InvalidCommand { message: String },
    #[error("Cookie source unavailable: {message}")]
    SourceUnavailable { message: String },
}

impl MonitorError {
    /// Create a transient storage error for `key`.
    pub fn storage(key: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MonitorError::Storage {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create a startup failure.
    pub fn storage_init(message: impl std::fmt::Display) -> Self {
        MonitorError::StorageInit {
            message: message.to_string(),
        }
    }

    /// Create a cookie source failure.
    pub fn source_unavailable(message: impl std::fmt::Display) -> Self {
        MonitorError::SourceUnavailable {
            message: message.to_string(),
        }
    }

    /// Whether the error must stop the caller instead of degrading to a default.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MonitorError::StorageInit { .. })
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for MonitorError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ffi::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ffi::ErrorCode::DatabaseLocked =>
            {
                MonitorError::storage("sqlite", "database is locked")
            }
            _ => MonitorError::storage("sqlite", err),
        }
    }
}

impl From<boring::error::ErrorStack> for MonitorError {
    fn from(err: boring::error::ErrorStack) -> Self {
        MonitorError::Digest(err.to_string())
    }
}
