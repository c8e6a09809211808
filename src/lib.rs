//! # cookiewatch
//!
//! An event-driven cookie monitoring pipeline.
//!
//! `cookiewatch` consumes browser cookie change notifications, resolves
//! each cookie to its registrable domain, assigns a tracking-risk tier,
//! de-duplicates changes by cookie identity and keeps both a checkpointed
//! live index and a bounded durable history.
//!
//! ## Features
//!
//! - **Registrable domains**: eTLD+1 over a static multi-part suffix list
//! - **Risk tiers**: third-party and keyword rules, first match wins
//! - **Circuit breaking**: noisy domains are dropped for a cooldown
//! - **Identity**: value-independent SHA-256 identity keys
//! - **Persistence**: debounced checkpoints, batched history with pruning
//! - **Message API**: tagged JSON commands for a presentation layer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cookiewatch::cookies::CookieJar;
//! use cookiewatch::monitor::CookieMonitor;
//! use cookiewatch::storage::file::JsonFileStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cookiewatch::MonitorError> {
//!     let jar = Arc::new(CookieJar::new());
//!     let store = JsonFileStore::open("cookiewatch.json").await?;
//!
//!     let monitor = CookieMonitor::builder(Arc::new(store))
//!         .source(jar.clone())
//!         .build();
//!     monitor.init().await?;
//!     monitor.listen(jar.subscribe());
//!
//!     let reply = monitor
//!         .handle_message(serde_json::json!({"type": "GET_COOKIES"}))
//!         .await;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error taxonomy, clocks and result helpers
//! - [`cookies`] - Domain resolution, identity, classification, cookie jar
//! - [`storage`] - Key-value backends and the durable history store
//! - [`monitor`] - The orchestrator, timers, alerts and message API
//!
//! ## Logging
//!
//! Every log line is emitted through `tracing` under the `cookiewatch`
//! target; install any subscriber to see them.

pub mod base;
pub mod cookies;
pub mod monitor;
pub mod storage;

/// `tracing` target shared by every log line of the crate.
pub(crate) const LOG_TARGET: &str = "cookiewatch";

pub use base::monitorerror::MonitorError;
pub use monitor::command::{Command, Response};
pub use monitor::config::MonitorConfig;
pub use monitor::CookieMonitor;
