//! Broker instance registry.
//!
//! An explicit object owning the `pattern set → instance` map: idempotent
//! construction without ambient process-global state. Repeated
//! [`create_broker`](BrokerRegistry::create_broker) calls for the same
//! normalized pattern set return the same underlying instance under a
//! fresh public id each time — ids may alias one instance, which is the
//! intended mechanism for independent callers to share one rate-limited
//! pipe without coordinating.

mod pattern;

pub use pattern::{TargetPattern, normalize_set};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::broker::BrokerInstance;
use crate::broker::dispatch::CallDispatcher;
use crate::cache::CacheStore;
use crate::notify::ClientHub;
use crate::resilience::metrics::MetricsHub;
use crate::types::PollStatus;
use crate::{Result, SluiceError};

#[derive(Default)]
struct RegistryInner {
    /// Normalized pattern-set key → the single instance for that set.
    by_patterns: HashMap<String, Arc<BrokerInstance>>,
    /// Public broker id → instance. Several ids may alias one instance.
    by_id: HashMap<String, Arc<BrokerInstance>>,
}

/// Owns all broker instances in the process.
pub struct BrokerRegistry {
    inner: Mutex<RegistryInner>,
    cache: Arc<CacheStore>,
    hub: Arc<ClientHub>,
    dispatcher: Arc<dyn CallDispatcher>,
    metrics: Arc<MetricsHub>,
    default_rate: f64,
}

impl BrokerRegistry {
    pub(crate) fn new(
        cache: Arc<CacheStore>,
        hub: Arc<ClientHub>,
        dispatcher: Arc<dyn CallDispatcher>,
        metrics: Arc<MetricsHub>,
        default_rate: f64,
    ) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            cache,
            hub,
            dispatcher,
            metrics,
            default_rate,
        }
    }

    /// Create (or reconnect to) the broker for a pattern set.
    ///
    /// Returns a fresh public id. When the normalized set already has an
    /// instance, the id aliases it; otherwise a new instance is spawned
    /// at the default rate.
    pub fn create_broker(&self, patterns: &[String]) -> Result<String> {
        let (key, compiled) = normalize_set(patterns)?;
        let mut inner = self.inner.lock().expect("registry poisoned");
        let instance = match inner.by_patterns.get(&key) {
            Some(existing) => {
                debug!(pattern_key = %key, "aliasing existing broker instance");
                Arc::clone(existing)
            }
            None => {
                info!(pattern_key = %key, rate = self.default_rate, "spawning broker instance");
                let instance = BrokerInstance::spawn(
                    key.clone(),
                    compiled,
                    self.default_rate,
                    Arc::clone(&self.cache),
                    Arc::clone(&self.hub),
                    Arc::clone(&self.dispatcher),
                    Arc::clone(&self.metrics),
                );
                inner.by_patterns.insert(key, Arc::clone(&instance));
                instance
            }
        };
        let id = uuid::Uuid::new_v4().to_string();
        inner.by_id.insert(id.clone(), instance);
        Ok(id)
    }

    /// Look up an instance by public id.
    pub fn get(&self, broker_id: &str) -> Result<Arc<BrokerInstance>> {
        self.inner
            .lock()
            .expect("registry poisoned")
            .by_id
            .get(broker_id)
            .cloned()
            .ok_or_else(|| SluiceError::BrokerNotFound(broker_id.to_string()))
    }

    /// Update the rate limit of the instance behind an id.
    pub fn set_rate_limit(&self, broker_id: &str, calls_per_second: f64) -> Result<()> {
        self.get(broker_id)?.set_rate_limit(calls_per_second)
    }

    /// Remove a public id. The pattern-set entry is dropped with the last
    /// alias; the instance's worker is never cancelled, so in-flight jobs
    /// still run — their results just become unreachable.
    pub fn delete_broker(&self, broker_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("registry poisoned");
        let instance = inner
            .by_id
            .remove(broker_id)
            .ok_or_else(|| SluiceError::BrokerNotFound(broker_id.to_string()))?;

        let still_aliased = inner
            .by_id
            .values()
            .any(|other| Arc::ptr_eq(other, &instance));
        if !still_aliased {
            inner.by_patterns.remove(instance.pattern_key());
            info!(pattern_key = instance.pattern_key(), "broker instance dropped from registry");
        }
        Ok(())
    }

    /// Poll a job id across every instance (the status surface does not
    /// know which broker owns a job).
    pub fn poll_any(&self, job_id: &str) -> PollStatus {
        for instance in self.instances() {
            if instance.knows(job_id) {
                return instance.poll(job_id);
            }
        }
        PollStatus::NotFound
    }

    /// Number of distinct underlying instances.
    pub fn broker_count(&self) -> usize {
        self.instances().len()
    }

    /// Snapshot of distinct instances (aliases deduplicated).
    pub fn instances(&self) -> Vec<Arc<BrokerInstance>> {
        let inner = self.inner.lock().expect("registry poisoned");
        let mut seen: Vec<Arc<BrokerInstance>> = Vec::new();
        for instance in inner.by_patterns.values().chain(inner.by_id.values()) {
            if !seen.iter().any(|s| Arc::ptr_eq(s, instance)) {
                seen.push(Arc::clone(instance));
            }
        }
        seen
    }
}
