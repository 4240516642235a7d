//! Builder for assembling a broker engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::Result;
use crate::admin::AdminApi;
use crate::broker::dispatch::{CallDispatcher, HttpDispatcher};
use crate::cache::{CacheConfig, CacheStore};
use crate::config::Config;
use crate::notify::{ClientHub, CompletionStream};
use crate::registry::BrokerRegistry;
use crate::resilience::metrics::{MetricsHub, MetricsSnapshot};
use crate::resilience::validation::validate_rate;
use crate::resilience::{AlertMonitor, AlertThresholds, RetryConfig, RetryingDispatcher};
/// Main entry point for creating broker engines.
pub struct Sluice;

impl Sluice {
    /// Create a new builder.
    pub fn builder() -> SluiceBuilder {
        SluiceBuilder::new()
    }
}

/// Builder for configuring an [`Engine`].
pub struct SluiceBuilder {
    cache_dir: Option<PathBuf>,
    max_memory_entries: Option<u64>,
    default_calls_per_second: f64,
    request_timeout_secs: u64,
    notify_buffer: usize,
    credential: Option<String>,
    retry: Option<RetryConfig>,
    alert_thresholds: AlertThresholds,
    alert_cooldown: Duration,
    dispatcher: Option<Arc<dyn CallDispatcher>>,
}

impl SluiceBuilder {
    pub fn new() -> Self {
        Self {
            cache_dir: None,
            max_memory_entries: None,
            default_calls_per_second: 1.0,
            request_timeout_secs: 30,
            notify_buffer: 64,
            credential: None,
            retry: None,
            alert_thresholds: AlertThresholds::default(),
            alert_cooldown: Duration::from_secs(300),
            dispatcher: None,
        }
    }

    /// Populate the builder from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::new();
        builder.cache_dir = config.cache.dir.clone();
        builder.max_memory_entries = Some(config.cache.max_memory_entries);
        builder.default_calls_per_second = config.broker.default_calls_per_second;
        builder.request_timeout_secs = config.broker.request_timeout_secs;
        builder.notify_buffer = config.broker.notify_buffer;
        builder.credential = config.admin.bearer.clone();
        builder.retry = Some(config.retry.to_retry_config());
        builder.alert_thresholds = config.alerts.to_thresholds();
        builder.alert_cooldown = Duration::from_secs(config.alerts.cooldown_secs);
        builder
    }

    /// Directory for the shared disk cache (default: `~/.sluice/cache`).
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Rate applied to newly created brokers.
    pub fn default_rate(mut self, calls_per_second: f64) -> Self {
        self.default_calls_per_second = calls_per_second;
        self
    }

    /// Upstream request timeout (seconds).
    pub fn timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Per-client push channel capacity.
    pub fn notify_buffer(mut self, capacity: usize) -> Self {
        self.notify_buffer = capacity;
        self
    }

    /// Bearer credential required by mutating admin operations.
    pub fn credential(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(token.into());
        self
    }

    /// Wrap dispatch in a retry layer.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    /// Alerting thresholds for the monitor returned by
    /// [`Engine::alert_monitor`].
    pub fn alert_thresholds(mut self, thresholds: AlertThresholds) -> Self {
        self.alert_thresholds = thresholds;
        self
    }

    /// Minimum gap between repeated alerts of one kind.
    pub fn alert_cooldown(mut self, cooldown: Duration) -> Self {
        self.alert_cooldown = cooldown;
        self
    }

    /// Replace the HTTP dispatcher. Mainly for tests and embedding.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn CallDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<Engine> {
        validate_rate(self.default_calls_per_second)?;

        let mut cache_config = match self.cache_dir {
            Some(dir) => CacheConfig::new(dir),
            None => CacheConfig::default(),
        };
        if let Some(entries) = self.max_memory_entries {
            cache_config = cache_config.max_memory_entries(entries);
        }
        let cache = Arc::new(CacheStore::open(&cache_config)?);

        let base: Arc<dyn CallDispatcher> = match self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => Arc::new(HttpDispatcher::new(Duration::from_secs(
                self.request_timeout_secs,
            ))?),
        };
        let dispatcher: Arc<dyn CallDispatcher> = match self.retry {
            Some(config) => Arc::new(RetryingDispatcher::new(base, config)),
            None => base,
        };

        let hub = Arc::new(ClientHub::new(self.notify_buffer));
        let metrics = Arc::new(MetricsHub::new());
        let registry = Arc::new(BrokerRegistry::new(
            Arc::clone(&cache),
            Arc::clone(&hub),
            dispatcher,
            Arc::clone(&metrics),
            self.default_calls_per_second,
        ));
        let admin = AdminApi::new(
            Arc::clone(&registry),
            Arc::clone(&hub),
            self.credential,
        );
        let alerts = Arc::new(
            AlertMonitor::new(Arc::clone(&metrics), self.alert_thresholds)
                .cooldown(self.alert_cooldown),
        );

        Ok(Engine {
            registry,
            hub,
            metrics,
            admin,
            alerts,
        })
    }
}

impl Default for SluiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A fully wired broker engine.
pub struct Engine {
    registry: Arc<BrokerRegistry>,
    hub: Arc<ClientHub>,
    metrics: Arc<MetricsHub>,
    admin: AdminApi,
    alerts: Arc<AlertMonitor>,
}

impl Engine {
    /// The administrative surface an embedding transport would mount.
    pub fn admin(&self) -> &AdminApi {
        &self.admin
    }

    /// Direct registry access for in-process embedding.
    pub fn registry(&self) -> &Arc<BrokerRegistry> {
        &self.registry
    }

    /// Open a completion push stream for a client id.
    pub fn subscribe(&self, client_id: &str) -> CompletionStream {
        self.hub.register(client_id)
    }

    /// Close a client's push stream.
    pub fn unsubscribe(&self, client_id: &str) {
        self.hub.unregister(client_id);
    }

    /// Point-in-time call statistics.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The alert monitor, for manual checks or spawning periodic
    /// evaluation.
    pub fn alert_monitor(&self) -> Arc<AlertMonitor> {
        Arc::clone(&self.alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_rejects_invalid_default_rate() {
        let dir = tempfile::tempdir().unwrap();
        let result = Sluice::builder()
            .cache_dir(dir.path())
            .default_rate(0.0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn build_wires_engine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Sluice::builder()
            .cache_dir(dir.path())
            .default_rate(2.0)
            .credential("token")
            .build()
            .unwrap();
        assert_eq!(engine.admin().health().broker_count, 0);
    }
}
