//! Base types and error handling.
//!
//! - [`MonitorError`](monitorerror::MonitorError): the error taxonomy of the pipeline
//! - [`Clock`](clock::Clock): injected time source
//! - [`context`]: result extensions for storage context and logged fallbacks

pub mod clock;
pub mod context;
pub mod monitorerror;
