//! Event recorder — durable queue plus batch sync
//!
//! `record` is fire-and-forget: queue persistence failures are logged and
//! the in-memory copy carries on. `sync` returns an explicit result so
//! callers and tests can observe outcomes, but a failed sync leaves the
//! queue untouched for the next attempt.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::queue::EventQueue;
use super::sink::{EventSink, SinkError};
use super::AnalyticsEvent;
use crate::kv::KvStore;
use crate::state::EngineKind;

/// Error type for sync attempts.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Outcome of one successful sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Events in the attempted batch.
    pub attempted: usize,
    /// Events the sink acknowledged.
    pub acknowledged: usize,
    /// Events still awaiting sync after trimming.
    pub remaining_unsynced: usize,
}

/// Recorder tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Queue capacity (N); drop-oldest beyond this.
    pub capacity: usize,
    /// Maximum events per sync batch (M ≤ N).
    pub batch_size: usize,
    /// Synced events retained after trim as the dedup window (K).
    pub synced_tail: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            batch_size: 50,
            synced_tail: 25,
        }
    }
}

/// Append-only, size-bounded event recorder with remote sync.
pub struct EventRecorder {
    kind: EngineKind,
    config: RecorderConfig,
    queue: Mutex<EventQueue>,
    kv: Arc<dyn KvStore>,
    sink: Arc<dyn EventSink>,
}

impl EventRecorder {
    /// Create a recorder, restoring any persisted queue blob.
    pub async fn open(
        kind: EngineKind,
        config: RecorderConfig,
        kv: Arc<dyn KvStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let key = Self::queue_key(kind);
        let queue = match kv.get(&key).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(key, error = %e, "event queue blob corrupt; starting fresh");
                EventQueue::new(config.capacity)
            }),
            Ok(None) => EventQueue::new(config.capacity),
            Err(e) => {
                warn!(key, error = %e, "failed to load event queue; starting fresh");
                EventQueue::new(config.capacity)
            }
        };
        Self {
            kind,
            config,
            queue: Mutex::new(queue),
            kv,
            sink,
        }
    }

    fn queue_key(kind: EngineKind) -> String {
        format!("events:queue:{}", kind)
    }

    /// Append an event. Never fails the caller; persistence problems are
    /// logged and the in-memory queue stays authoritative until the next
    /// successful write.
    pub async fn record(&self, event: AnalyticsEvent) {
        let mut queue = self.queue.lock().await;
        if let Some(dropped) = queue.push(event) {
            debug!(
                kind = %self.kind,
                dropped_id = %dropped.id,
                "event queue full; dropped oldest event"
            );
        }
        self.persist(&queue).await;
    }

    /// Number of events awaiting sync.
    pub async fn pending(&self) -> usize {
        self.queue.lock().await.unsynced_len()
    }

    /// Total queued events (synced tail included).
    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Send one bounded batch to the sink.
    ///
    /// Only acknowledged events are marked synced; the queue is then
    /// trimmed to `{unsynced} + {last synced_tail synced}`. On failure the
    /// queue is left untouched for retry.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let mut queue = self.queue.lock().await;

        let batch = queue.unsynced(self.config.batch_size);
        if batch.is_empty() {
            return Ok(SyncReport {
                attempted: 0,
                acknowledged: 0,
                remaining_unsynced: 0,
            });
        }

        let acked = self.sink.deliver(&batch).await?;
        queue.mark_synced(&acked);
        queue.trim(self.config.synced_tail);
        self.persist(&queue).await;

        let report = SyncReport {
            attempted: batch.len(),
            acknowledged: acked.len(),
            remaining_unsynced: queue.unsynced_len(),
        };
        info!(
            kind = %self.kind,
            attempted = report.attempted,
            acknowledged = report.acknowledged,
            remaining = report.remaining_unsynced,
            "event sync batch completed"
        );
        Ok(report)
    }

    /// Best-effort queue blob write.
    async fn persist(&self, queue: &EventQueue) {
        let key = Self::queue_key(self.kind);
        match serde_json::to_string(queue) {
            Ok(json) => {
                if let Err(e) = self.kv.set(&key, &json).await {
                    warn!(key, error = %e, "failed to persist event queue");
                }
            }
            Err(e) => warn!(key, error = %e, "failed to serialize event queue"),
        }
    }
}
