//! Broker instances: one rate-limited, cached pipe per pattern set.
//!
//! A [`BrokerInstance`] owns an unbounded FIFO queue and exactly one
//! worker task, spawned in the constructor, which drains the queue one
//! job at a time. Serial execution is what makes the rate limit
//! meaningful: the worker sleeps a fixed `1 / calls_per_second` gap
//! before every upstream call, so throughput is capped while the queue
//! is non-empty and bursts are smoothed rather than rejected.
//!
//! The worker is long-lived for the process lifetime. Deleting an
//! instance from the registry does not cancel its worker; in-flight jobs
//! still complete, their results just become unreachable once the last
//! alias id is gone.

pub mod dispatch;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::fingerprint::fingerprint;
use crate::notify::{ClientHub, CompletionEvent};
use crate::registry::TargetPattern;
use crate::resilience::metrics::MetricsHub;
use crate::telemetry;
use crate::types::{JobId, JobOutcome, JobRequest, JobTicket, PollStatus};
use crate::{Result, SluiceError};

use dispatch::CallDispatcher;

/// Metrics operation name for worker upstream dispatch.
pub const DISPATCH_OPERATION: &str = "broker.dispatch";

struct QueuedJob {
    id: JobId,
    request: JobRequest,
}

/// Shared mutable job state, guarded by one mutex per instance.
#[derive(Default)]
struct JobTable {
    pending: HashSet<String>,
    results: HashMap<String, JobOutcome>,
}

/// One rate-limited, cached pipe to a whitelisted set of upstream targets.
///
/// Identity is the normalized, sorted pattern set; the registry hands the
/// same instance back for repeated creations with an equal set.
pub struct BrokerInstance {
    key: String,
    patterns: Vec<TargetPattern>,
    interval_ms: AtomicU64,
    depth: AtomicUsize,
    table: Mutex<JobTable>,
    tx: mpsc::UnboundedSender<QueuedJob>,
    cache: Arc<CacheStore>,
    hub: Arc<ClientHub>,
    dispatcher: Arc<dyn CallDispatcher>,
    metrics: Arc<MetricsHub>,
}

impl BrokerInstance {
    /// Create the instance and spawn its worker task.
    ///
    /// Must be called within a tokio runtime context.
    pub(crate) fn spawn(
        key: String,
        patterns: Vec<TargetPattern>,
        calls_per_second: f64,
        cache: Arc<CacheStore>,
        hub: Arc<ClientHub>,
        dispatcher: Arc<dyn CallDispatcher>,
        metrics: Arc<MetricsHub>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let instance = Arc::new(Self {
            key,
            patterns,
            interval_ms: AtomicU64::new(interval_ms_for(calls_per_second)),
            depth: AtomicUsize::new(0),
            table: Mutex::new(JobTable::default()),
            tx,
            cache,
            hub,
            dispatcher,
            metrics,
        });
        tokio::spawn(worker_loop(Arc::clone(&instance), rx));
        instance
    }

    /// Whether a target URL matches at least one configured pattern.
    pub fn accepts(&self, target: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(target))
    }

    /// Queue a job, returning its id and a point-in-time delay estimate
    /// (queue depth at submission × call interval; later rate-limit
    /// changes do not correct it).
    ///
    /// Fails fast with [`SluiceError::TargetNotAllowed`] before anything
    /// is enqueued when the target matches no pattern.
    pub fn enqueue(&self, request: JobRequest) -> Result<JobTicket> {
        if !self.accepts(&request.url) {
            return Err(SluiceError::TargetNotAllowed {
                url: request.url.clone(),
            });
        }

        let id = JobId::generate();
        self.table
            .lock()
            .expect("job table poisoned")
            .pending
            .insert(id.as_str().to_string());

        let depth_before = self.depth.fetch_add(1, Ordering::SeqCst);
        let estimated_delay_secs = depth_before as f64 * self.interval().as_secs_f64();

        debug!(
            job_id = id.short(),
            url = %request.url,
            method = %request.method,
            queue_depth = depth_before,
            "job enqueued"
        );
        metrics::counter!(telemetry::JOBS_ENQUEUED_TOTAL, "broker" => self.key.clone())
            .increment(1);
        metrics::gauge!(telemetry::QUEUE_DEPTH, "broker" => self.key.clone())
            .set((depth_before + 1) as f64);

        if self.tx.send(QueuedJob {
            id: id.clone(),
            request,
        })
        .is_err()
        {
            // Worker gone — only possible if its task was torn down with
            // the runtime. Roll back so the id does not dangle as pending.
            self.table
                .lock()
                .expect("job table poisoned")
                .pending
                .remove(id.as_str());
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(SluiceError::internal("broker worker is not running"));
        }

        Ok(JobTicket {
            status_ref: format!("/api/status/{id}"),
            job_id: id,
            estimated_delay_secs,
        })
    }

    /// One-shot poll. `Complete` removes the stored outcome; a second
    /// poll for the same id returns `NotFound`.
    pub fn poll(&self, job_id: &str) -> PollStatus {
        let mut table = self.table.lock().expect("job table poisoned");
        if let Some(outcome) = table.results.remove(job_id) {
            debug!(job_id = &job_id[..8.min(job_id.len())], "result retrieved");
            PollStatus::Complete { outcome }
        } else if table.pending.contains(job_id) {
            PollStatus::Pending
        } else {
            PollStatus::NotFound
        }
    }

    /// Whether the job id is known (pending or completed-unretrieved).
    pub fn knows(&self, job_id: &str) -> bool {
        let table = self.table.lock().expect("job table poisoned");
        table.pending.contains(job_id) || table.results.contains_key(job_id)
    }

    /// Update the rate limit. Takes effect for jobs not yet paced;
    /// already-issued delay estimates are not corrected.
    pub fn set_rate_limit(&self, calls_per_second: f64) -> Result<()> {
        crate::resilience::validation::validate_rate(calls_per_second)?;
        self.interval_ms
            .store(interval_ms_for(calls_per_second), Ordering::SeqCst);
        Ok(())
    }

    /// The fixed pre-call pacing gap.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::SeqCst))
    }

    /// Normalized pattern-set key identifying this instance.
    pub fn pattern_key(&self) -> &str {
        &self.key
    }

    /// Jobs submitted but not yet completed. Ids only, no payloads.
    pub fn pending_ids(&self) -> Vec<String> {
        let table = self.table.lock().expect("job table poisoned");
        table.pending.iter().cloned().collect()
    }

    /// Completed jobs whose results have not been retrieved. Ids only.
    pub fn ready_ids(&self) -> Vec<String> {
        let table = self.table.lock().expect("job table poisoned");
        table.results.keys().cloned().collect()
    }

    /// Jobs currently queued (excluding the one in flight).
    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Run one job to its terminal outcome. Never returns an error and
    /// never panics on job failure — a failed call becomes a `Failed`
    /// outcome delivered through the same path as success.
    async fn process(&self, job: QueuedJob) {
        let request = &job.request;
        let fp = fingerprint(&request.url, request.payload.as_ref(), &request.headers);

        if let Some(hit) = self.cache.lookup(&fp, request.cache_duration) {
            debug!(job_id = job.id.short(), "served from cache");
            self.complete(
                &job,
                JobOutcome::Success { response: hit },
                true,
            );
            return;
        }

        // Fixed inter-call gap, not measured against prior call duration.
        tokio::time::sleep(self.interval()).await;

        let started = Instant::now();
        let outcome = match self.dispatcher.dispatch(request).await {
            Ok(response) => {
                self.metrics
                    .record_success(DISPATCH_OPERATION, started.elapsed());
                if !request.cache_duration.is_zero() {
                    self.cache.store(&fp, &response);
                }
                JobOutcome::Success { response }
            }
            Err(e) => {
                self.metrics
                    .record_failure(DISPATCH_OPERATION, e.code(), started.elapsed());
                warn!(job_id = job.id.short(), url = %request.url, error = %e, "job failed");
                JobOutcome::failed(&e)
            }
        };
        self.complete(&job, outcome, false);
    }

    /// Move a job pending → complete (exactly once) and push the
    /// completion event if a client is bound.
    fn complete(&self, job: &QueuedJob, outcome: JobOutcome, from_cache: bool) {
        let counter = if outcome.is_success() {
            telemetry::JOBS_COMPLETED_TOTAL
        } else {
            telemetry::JOBS_FAILED_TOTAL
        };
        metrics::counter!(counter, "broker" => self.key.clone()).increment(1);

        {
            let mut table = self.table.lock().expect("job table poisoned");
            table.pending.remove(job.id.as_str());
            table.results.insert(job.id.as_str().to_string(), outcome.clone());
        }

        debug!(
            job_id = job.id.short(),
            success = outcome.is_success(),
            from_cache,
            "job complete"
        );

        if let Some(client_id) = &job.request.client_id {
            self.hub.push(
                client_id,
                CompletionEvent {
                    job_id: job.id.clone(),
                    outcome,
                },
            );
        }
    }
}

/// The per-instance worker: drains the queue strictly in FIFO order,
/// one job at a time, for the life of the process.
async fn worker_loop(instance: Arc<BrokerInstance>, mut rx: mpsc::UnboundedReceiver<QueuedJob>) {
    debug!(broker = instance.pattern_key(), "worker started");
    while let Some(job) = rx.recv().await {
        let depth = instance.depth.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::gauge!(telemetry::QUEUE_DEPTH, "broker" => instance.key.clone())
            .set(depth as f64);
        instance.process(job).await;
    }
    debug!(broker = instance.pattern_key(), "worker stopped");
}

fn interval_ms_for(calls_per_second: f64) -> u64 {
    (1000.0 / calls_per_second).round().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_from_rate() {
        assert_eq!(interval_ms_for(1.0), 1000);
        assert_eq!(interval_ms_for(2.0), 500);
        assert_eq!(interval_ms_for(0.5), 2000);
        assert_eq!(interval_ms_for(1000.0), 1);
    }
}
