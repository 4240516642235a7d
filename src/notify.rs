//! Best-effort completion push.
//!
//! Clients that register under an id receive [`CompletionEvent`]s for
//! jobs submitted with that id. Delivery is fire-and-forget: a full or
//! disconnected channel drops the event and the one-shot poll surface
//! remains the source of truth.

use std::collections::HashMap;
use std::sync::Mutex;

use metrics::counter;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::telemetry;
use crate::types::{JobId, JobOutcome};

/// Pushed to a registered client when one of its jobs finishes.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionEvent {
    pub job_id: JobId,
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

/// Stream of completion events handed to a registered client.
pub type CompletionStream = ReceiverStream<CompletionEvent>;

/// Registry of connected push channels, keyed by client id.
pub struct ClientHub {
    clients: Mutex<HashMap<String, mpsc::Sender<CompletionEvent>>>,
    buffer: usize,
}

impl ClientHub {
    pub(crate) fn new(buffer: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Open a push channel for `client_id`.
    ///
    /// A second registration under the same id supersedes the first:
    /// the old sender is dropped and its stream ends.
    pub fn register(&self, client_id: &str) -> ReceiverStream<CompletionEvent> {
        let (tx, rx) = mpsc::channel(self.buffer);
        let previous = self
            .clients
            .lock()
            .expect("client hub poisoned")
            .insert(client_id.to_string(), tx);
        if previous.is_some() {
            debug!(client_id, "push channel superseded");
        }
        ReceiverStream::new(rx)
    }

    /// Drop the channel for `client_id`, if any.
    pub fn unregister(&self, client_id: &str) {
        self.clients
            .lock()
            .expect("client hub poisoned")
            .remove(client_id);
    }

    /// Attempt delivery. Returns whether the event was accepted by a
    /// live channel; `false` covers unknown ids, full buffers, and
    /// receivers that have gone away.
    pub(crate) fn push(&self, client_id: &str, event: CompletionEvent) -> bool {
        let sender = self
            .clients
            .lock()
            .expect("client hub poisoned")
            .get(client_id)
            .cloned();
        let delivered = match sender {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        };
        if delivered {
            counter!(telemetry::NOTIFICATIONS_PUSHED_TOTAL).increment(1);
        } else {
            debug!(client_id, "completion event dropped");
            counter!(telemetry::NOTIFICATIONS_DROPPED_TOTAL).increment(1);
        }
        delivered
    }

    /// Number of currently registered channels.
    pub fn connected_count(&self) -> usize {
        self.clients.lock().expect("client hub poisoned").len()
    }
}
