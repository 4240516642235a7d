//! Threshold alerting over the metrics hub.
//!
//! Alerts are evaluated from [`MetricsHub`] snapshots and logged at
//! `warn`; repeated findings of the same kind are suppressed for a
//! cooldown window so a sustained condition produces one alert per
//! window instead of one per check.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::warn;

use crate::resilience::metrics::MetricsHub;

/// What kind of condition an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighErrorRate,
    SlowOperation,
}

/// One raised finding.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub operation: String,
    pub message: String,
}

/// Limits above which alerts fire.
#[derive(Debug, Clone)]
pub struct AlertThresholds {
    /// Ceiling on the error rate across all operations combined.
    pub max_error_rate_percent: f64,
    /// Ceiling on any single operation's mean latency.
    pub max_mean_latency_ms: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_error_rate_percent: 15.0,
            max_mean_latency_ms: 3000.0,
        }
    }
}

impl AlertThresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_error_rate_percent(mut self, percent: f64) -> Self {
        self.max_error_rate_percent = percent;
        self
    }

    pub fn max_mean_latency_ms(mut self, millis: f64) -> Self {
        self.max_mean_latency_ms = millis;
        self
    }
}

/// Periodic evaluator of alert conditions.
pub struct AlertMonitor {
    hub: Arc<MetricsHub>,
    thresholds: AlertThresholds,
    cooldown: Duration,
    last_fired: Mutex<HashMap<AlertKind, Instant>>,
}

impl AlertMonitor {
    pub fn new(hub: Arc<MetricsHub>, thresholds: AlertThresholds) -> Self {
        Self {
            hub,
            thresholds,
            cooldown: Duration::from_secs(300),
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Evaluate thresholds once. Returns the alerts raised by this
    /// check; kinds still in cooldown are omitted.
    ///
    /// The error rate is judged across all operations combined, so a
    /// small flaky operation cannot trip the alarm while the process as
    /// a whole is healthy. Latency is judged per operation.
    pub fn check(&self) -> Vec<Alert> {
        let snapshot = self.hub.snapshot();
        let mut raised = Vec::new();

        // With no calls recorded there is nothing to judge.
        if snapshot.total_calls > 0 {
            let global_error_rate = 100.0 - snapshot.success_rate_percent;
            if global_error_rate > self.thresholds.max_error_rate_percent {
                raised.push(Alert {
                    kind: AlertKind::HighErrorRate,
                    operation: "global".to_string(),
                    message: format!(
                        "error rate {:.1}% exceeds {:.1}% over {} calls",
                        global_error_rate,
                        self.thresholds.max_error_rate_percent,
                        snapshot.total_calls
                    ),
                });
            }
        }

        for (name, op) in &snapshot.operations {
            if op.total_calls == 0 {
                continue;
            }
            if op.mean_latency_ms > self.thresholds.max_mean_latency_ms {
                raised.push(Alert {
                    kind: AlertKind::SlowOperation,
                    operation: name.clone(),
                    message: format!(
                        "mean latency {:.0}ms exceeds {:.0}ms",
                        op.mean_latency_ms, self.thresholds.max_mean_latency_ms
                    ),
                });
            }
        }

        let now = Instant::now();
        let mut last_fired = self.last_fired.lock().expect("alert monitor poisoned");
        raised.retain(|alert| match last_fired.get(&alert.kind) {
            Some(at) if now.duration_since(*at) < self.cooldown => false,
            _ => {
                last_fired.insert(alert.kind, now);
                true
            }
        });
        drop(last_fired);

        for alert in &raised {
            warn!(
                kind = ?alert.kind,
                operation = %alert.operation,
                "{}", alert.message
            );
        }
        raised
    }

    /// Spawn a background task that runs [`check`](Self::check) on a
    /// fixed interval until the monitor is dropped by its last holder.
    pub fn spawn(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.check();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hub: &MetricsHub, operation: &str, failures: u32, successes: u32) {
        for _ in 0..successes {
            hub.record_success(operation, Duration::from_millis(10));
        }
        for _ in 0..failures {
            hub.record_failure(operation, "timeout", Duration::from_millis(10));
        }
    }

    fn hub_with_failures(failures: u32, successes: u32) -> Arc<MetricsHub> {
        let hub = Arc::new(MetricsHub::new());
        record(&hub, "fetch", failures, successes);
        hub
    }

    #[test]
    fn error_rate_alert_fires_above_threshold() {
        let monitor = AlertMonitor::new(hub_with_failures(2, 8), AlertThresholds::default());
        let alerts = monitor.check();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::HighErrorRate);
        assert_eq!(alerts[0].operation, "global");
    }

    #[test]
    fn healthy_operations_raise_nothing() {
        let monitor = AlertMonitor::new(hub_with_failures(1, 99), AlertThresholds::default());
        assert!(monitor.check().is_empty());
    }

    #[test]
    fn error_rate_is_judged_across_all_operations() {
        // One small flaky operation at 50% inside a healthy process:
        // 5 failures out of 110 calls is 4.5% overall, under the 15%
        // ceiling, so no alarm.
        let hub = Arc::new(MetricsHub::new());
        record(&hub, "healthy", 0, 100);
        record(&hub, "flaky", 5, 5);
        let monitor = AlertMonitor::new(Arc::clone(&hub), AlertThresholds::default());
        assert!(monitor.check().is_empty());

        // Push the combined rate over the ceiling and it fires once,
        // reported globally rather than against any one operation.
        record(&hub, "flaky", 30, 0);
        let alerts = monitor.check();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::HighErrorRate);
        assert_eq!(alerts[0].operation, "global");
    }

    #[test]
    fn no_calls_means_no_alerts() {
        let hub = Arc::new(MetricsHub::new());
        let monitor = AlertMonitor::new(hub, AlertThresholds::default());
        assert!(monitor.check().is_empty());
    }

    #[test]
    fn cooldown_suppresses_repeat_findings() {
        let monitor = AlertMonitor::new(hub_with_failures(5, 5), AlertThresholds::default());
        assert_eq!(monitor.check().len(), 1);
        assert!(monitor.check().is_empty());
    }

    #[test]
    fn slow_operation_alert() {
        let hub = Arc::new(MetricsHub::new());
        hub.record_success("fetch", Duration::from_secs(5));
        let monitor = AlertMonitor::new(hub, AlertThresholds::default());
        let alerts = monitor.check();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::SlowOperation);
    }
}
