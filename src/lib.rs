//! Sluice - Shared in-process broker for rate-limited upstream web APIs
//!
//! Independent callers submit web-API calls against named brokers; each
//! broker serializes its jobs through one worker with a fixed pacing gap
//! so the process as a whole respects the upstream's rate limit. Results
//! are retrievable exactly once by job id, cached on disk across broker
//! and process lifetimes, and optionally pushed to registered clients.
//!
//! # Example
//!
//! ```rust,no_run
//! use sluice::{JobRequest, PollStatus, Sluice};
//!
//! #[tokio::main]
//! async fn main() -> sluice::Result<()> {
//!     let engine = Sluice::builder()
//!         .default_rate(2.0)
//!         .credential("admin-token")
//!         .build()?;
//!
//!     let admin = engine.admin();
//!     let broker = admin.create_broker(
//!         Some("admin-token"),
//!         &["https://api.example.com/v1/search".to_string()],
//!     )?;
//!
//!     let ticket = admin.submit(
//!         Some("admin-token"),
//!         &broker,
//!         JobRequest::new("https://api.example.com/v1/search")
//!             .payload(serde_json::json!({"q": "term"})),
//!     )?;
//!
//!     loop {
//!         match admin.poll(Some("admin-token"), ticket.job_id.as_str())? {
//!             PollStatus::Complete { outcome } => {
//!                 println!("{outcome:?}");
//!                 break;
//!             }
//!             PollStatus::Pending => {
//!                 tokio::time::sleep(std::time::Duration::from_millis(250)).await;
//!             }
//!             PollStatus::NotFound => break,
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod broker;
pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod notify;
pub mod registry;
pub mod resilience;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use admin::{AdminApi, Health, IntrospectReport};
pub use builder::{Engine, Sluice, SluiceBuilder};
pub use cache::{CacheConfig, CacheStore};
pub use config::Config;
pub use error::{Result, SluiceError};
pub use notify::{ClientHub, CompletionEvent, CompletionStream};
pub use registry::BrokerRegistry;
pub use resilience::{AlertMonitor, AlertThresholds, MetricsSnapshot, RetryConfig};

// Re-export the wire types
pub use types::{CallMethod, CallResult, JobId, JobOutcome, JobRequest, JobTicket, PollStatus};
