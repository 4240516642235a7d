//! Client-side resiliency: retry, input validation, call metrics, and
//! threshold alerting.

pub mod alerts;
pub mod metrics;
pub mod retry;
pub mod validation;

pub use alerts::{Alert, AlertKind, AlertMonitor, AlertThresholds};
pub use metrics::{MetricsHub, MetricsSnapshot};
pub use retry::{RetryConfig, RetryingDispatcher, with_retry};
