//! Ergonomic error context helpers.
//!
//! Provides extension traits for attaching storage keys to failures and
//! for degrading transient failures into logged defaults.

use crate::base::monitorerror::MonitorError;
use crate::LOG_TARGET;

/// Extension trait for adding storage context to results.
pub trait StorageResultExt<T> {
    /// Attach the storage key that was being read or written.
    ///
    /// # Example
    /// ```ignore
    /// use cookiewatch::base::context::StorageResultExt;
    ///
    /// let settings: Settings = serde_json::from_value(raw).storage_context("cw_settings")?;
    /// // Error: "Storage operation on 'cw_settings' failed: invalid type ..."
    /// ```
    fn storage_context(self, key: &str) -> Result<T, MonitorError>;
}

impl<T, E: std::fmt::Display> StorageResultExt<T> for Result<T, E> {
    fn storage_context(self, key: &str) -> Result<T, MonitorError> {
        self.map_err(|e| MonitorError::storage(key, e))
    }
}

/// Extension trait for treating a failed operation as a no-op.
pub trait DegradeExt<T> {
    /// Log the error under the crate tag and return `T::default()` instead.
    fn log_or_default(self, operation: &str) -> T
    where
        T: Default;

    /// Log the error under the crate tag and return `fallback` instead.
    fn log_or(self, operation: &str, fallback: T) -> T;
}

impl<T> DegradeExt<T> for Result<T, MonitorError> {
    fn log_or_default(self, operation: &str) -> T
    where
        T: Default,
    {
        self.log_or(operation, T::default())
    }

    fn log_or(self, operation: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(target: LOG_TARGET, operation, error = %e, "operation failed, using default");
                fallback
            }
        }
    }
}
