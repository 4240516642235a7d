//! In-process call statistics.
//!
//! [`MetricsHub`] keeps per-operation counters and a bounded latency
//! window, and mirrors each recording into the `metrics` facade so an
//! exporter installed by the host picks them up. The hub itself is the
//! data source for alert evaluation and admin introspection.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;

use crate::telemetry;

/// Latencies kept per operation for mean computation.
const LATENCY_WINDOW: usize = 1000;

#[derive(Debug, Default)]
struct OperationMetrics {
    total_calls: u64,
    total_failures: u64,
    latencies: VecDeque<Duration>,
    failure_kinds: HashMap<String, u64>,
    last_failure: Option<String>,
}

impl OperationMetrics {
    fn record_latency(&mut self, latency: Duration) {
        if self.latencies.len() == LATENCY_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency);
    }

    fn mean_latency_ms(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        let total: Duration = self.latencies.iter().sum();
        total.as_secs_f64() * 1000.0 / self.latencies.len() as f64
    }

    fn error_rate_percent(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.total_failures as f64 * 100.0 / self.total_calls as f64
    }
}

/// Aggregated view of one operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationSnapshot {
    pub total_calls: u64,
    pub total_failures: u64,
    pub error_rate_percent: f64,
    pub mean_latency_ms: f64,
    pub failure_kinds: BTreeMap<String, u64>,
    pub last_failure: Option<String>,
}

/// Point-in-time view across all operations.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub total_calls: u64,
    pub total_successes: u64,
    pub success_rate_percent: f64,
    pub operations: BTreeMap<String, OperationSnapshot>,
}

/// Shared recorder of operation outcomes.
pub struct MetricsHub {
    operations: Mutex<HashMap<String, OperationMetrics>>,
    started: Instant,
}

impl MetricsHub {
    pub(crate) fn new() -> Self {
        Self {
            operations: Mutex::new(HashMap::new()),
            started: Instant::now(),
        }
    }

    pub fn record_success(&self, operation: &str, latency: Duration) {
        let mut operations = self.operations.lock().expect("metrics hub poisoned");
        let entry = operations.entry(operation.to_string()).or_default();
        entry.total_calls += 1;
        entry.record_latency(latency);
        drop(operations);

        counter!(telemetry::REQUESTS_TOTAL, "operation" => operation.to_string(), "status" => "ok")
            .increment(1);
        histogram!(telemetry::REQUEST_DURATION_SECONDS, "operation" => operation.to_string())
            .record(latency.as_secs_f64());
    }

    pub fn record_failure(&self, operation: &str, kind: &str, latency: Duration) {
        let mut operations = self.operations.lock().expect("metrics hub poisoned");
        let entry = operations.entry(operation.to_string()).or_default();
        entry.total_calls += 1;
        entry.total_failures += 1;
        entry.record_latency(latency);
        *entry.failure_kinds.entry(kind.to_string()).or_insert(0) += 1;
        entry.last_failure = Some(kind.to_string());
        drop(operations);

        counter!(telemetry::REQUESTS_TOTAL, "operation" => operation.to_string(), "status" => "error")
            .increment(1);
        histogram!(telemetry::REQUEST_DURATION_SECONDS, "operation" => operation.to_string())
            .record(latency.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let operations = self.operations.lock().expect("metrics hub poisoned");
        let mut out = BTreeMap::new();
        let mut total_calls = 0u64;
        let mut total_failures = 0u64;
        for (name, op) in operations.iter() {
            total_calls += op.total_calls;
            total_failures += op.total_failures;
            out.insert(
                name.clone(),
                OperationSnapshot {
                    total_calls: op.total_calls,
                    total_failures: op.total_failures,
                    error_rate_percent: op.error_rate_percent(),
                    mean_latency_ms: op.mean_latency_ms(),
                    failure_kinds: op.failure_kinds.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                    last_failure: op.last_failure.clone(),
                },
            );
        }
        let total_successes = total_calls - total_failures;
        MetricsSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            total_calls,
            total_successes,
            success_rate_percent: if total_calls == 0 {
                100.0
            } else {
                total_successes as f64 * 100.0 / total_calls as f64
            },
            operations: out,
        }
    }
}
