//! Transport-agnostic administrative facade.
//!
//! Everything an embedding HTTP layer would mount lives here as plain
//! methods. Mutating operations require an opaque bearer credential;
//! introspection and health are open. No method ever exposes payload
//! bodies or internals, only stable error codes and summaries.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::notify::ClientHub;
use crate::registry::BrokerRegistry;
use crate::resilience::validation::validate_request;
use crate::types::{JobRequest, JobTicket, PollStatus};
use crate::{Result, SluiceError};

/// Per-broker summary for [`AdminApi::introspect`]. Job ids only,
/// never request or response bodies.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerIntrospect {
    pub broker_key: String,
    pub calls_per_second: f64,
    pub pending_jobs: Vec<String>,
    pub ready_jobs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntrospectReport {
    pub broker_count: usize,
    pub brokers: Vec<BrokerIntrospect>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub broker_count: usize,
    pub connected_channels: usize,
}

/// The administrative surface.
#[derive(Clone)]
pub struct AdminApi {
    registry: Arc<BrokerRegistry>,
    hub: Arc<ClientHub>,
    credential: Option<String>,
}

impl AdminApi {
    pub(crate) fn new(
        registry: Arc<BrokerRegistry>,
        hub: Arc<ClientHub>,
        credential: Option<String>,
    ) -> Self {
        Self {
            registry,
            hub,
            credential,
        }
    }

    /// With no credential configured, every token (including none) is
    /// accepted. Comparison is exact.
    fn authorize(&self, token: Option<&str>) -> Result<()> {
        match &self.credential {
            None => Ok(()),
            Some(expected) if token == Some(expected.as_str()) => Ok(()),
            Some(_) => Err(SluiceError::Unauthorized),
        }
    }

    pub fn create_broker(&self, token: Option<&str>, patterns: &[String]) -> Result<String> {
        self.authorize(token)?;
        let id = self.registry.create_broker(patterns)?;
        info!(broker_id = %id, "broker created");
        Ok(id)
    }

    pub fn set_rate_limit(
        &self,
        token: Option<&str>,
        broker_id: &str,
        calls_per_second: f64,
    ) -> Result<()> {
        self.authorize(token)?;
        self.registry.set_rate_limit(broker_id, calls_per_second)?;
        info!(broker_id, calls_per_second, "rate limit updated");
        Ok(())
    }

    /// Validate, check the target against the broker's pattern set,
    /// then enqueue.
    pub fn submit(
        &self,
        token: Option<&str>,
        broker_id: &str,
        request: JobRequest,
    ) -> Result<JobTicket> {
        self.authorize(token)?;
        let validated = validate_request(&request)?;
        self.registry.get(broker_id)?.enqueue(validated)
    }

    /// One-shot status lookup across every broker. `Complete` removes
    /// the stored result.
    pub fn poll(&self, token: Option<&str>, job_id: &str) -> Result<PollStatus> {
        self.authorize(token)?;
        Ok(self.registry.poll_any(job_id))
    }

    pub fn delete_broker(&self, token: Option<&str>, broker_id: &str) -> Result<()> {
        self.authorize(token)?;
        self.registry.delete_broker(broker_id)?;
        info!(broker_id, "broker deleted");
        Ok(())
    }

    /// Open introspection: queue shapes without payloads.
    pub fn introspect(&self) -> IntrospectReport {
        let instances = self.registry.instances();
        let brokers = instances
            .iter()
            .map(|instance| BrokerIntrospect {
                broker_key: instance.pattern_key().to_string(),
                calls_per_second: 1.0 / instance.interval().as_secs_f64().max(f64::EPSILON),
                pending_jobs: instance.pending_ids(),
                ready_jobs: instance.ready_ids(),
            })
            .collect();
        IntrospectReport {
            broker_count: instances.len(),
            brokers,
        }
    }

    /// Open liveness summary.
    pub fn health(&self) -> Health {
        Health {
            status: "ok",
            broker_count: self.registry.broker_count(),
            connected_channels: self.hub.connected_count(),
        }
    }
}
