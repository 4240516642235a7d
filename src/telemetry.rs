//! Telemetry metric name constants.
//!
//! Centralised metric names for sluice operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `sluice_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation` — named operation being measured (e.g. "broker.dispatch")
//! - `status` — outcome: "ok" or "error"
//! - `broker` — shortened broker pattern key

/// Total upstream requests dispatched by workers.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "sluice_requests_total";

/// Upstream request duration in seconds.
///
/// Labels: `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "sluice_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "sluice_retries_total";

/// Total cache hits against the shared response cache.
pub const CACHE_HITS_TOTAL: &str = "sluice_cache_hits_total";

/// Total cache misses against the shared response cache.
pub const CACHE_MISSES_TOTAL: &str = "sluice_cache_misses_total";

/// Jobs waiting in a broker queue (excluding the one in flight).
///
/// Labels: `broker`.
pub const QUEUE_DEPTH: &str = "sluice_queue_depth";

/// Total jobs accepted into a broker queue.
///
/// Labels: `broker`.
pub const JOBS_ENQUEUED_TOTAL: &str = "sluice_jobs_enqueued_total";

/// Total jobs finished with a success outcome.
///
/// Labels: `broker`.
pub const JOBS_COMPLETED_TOTAL: &str = "sluice_jobs_completed_total";

/// Total jobs finished with a failure outcome.
///
/// Labels: `broker`.
pub const JOBS_FAILED_TOTAL: &str = "sluice_jobs_failed_total";

/// Total completion events delivered to a registered client channel.
pub const NOTIFICATIONS_PUSHED_TOTAL: &str = "sluice_notifications_pushed_total";

/// Total completion events dropped (client unknown, disconnected, or slow).
pub const NOTIFICATIONS_DROPPED_TOTAL: &str = "sluice_notifications_dropped_total";
