//! Remote analytics sink
//!
//! A sink accepts a batch of events and returns the subset of event ids it
//! durably accepted. Partial acknowledgement is legal; unacknowledged
//! events stay queued for the next sync.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::AnalyticsEvent;

/// Error type for sink delivery.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("sink rejected batch: {0}")]
    Rejected(String),
}

/// Result type for sink delivery.
pub type SinkResult<T> = Result<T, SinkError>;

/// Remote destination for analytics batches.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver a batch; returns the ids the sink acknowledged.
    async fn deliver(&self, batch: &[AnalyticsEvent]) -> SinkResult<Vec<String>>;
}

/// HTTP sink posting JSON batches to a collector endpoint.
///
/// The endpoint replies `{"accepted": ["id", ...]}`; a missing body is
/// treated as a full acknowledgement of the batch.
pub struct HttpEventSink {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct AckResponse {
    accepted: Vec<String>,
}

impl HttpEventSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn deliver(&self, batch: &[AnalyticsEvent]) -> SinkResult<Vec<String>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&batch)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected(format!("HTTP {}", status)));
        }

        let acked = match response.json::<AckResponse>().await {
            Ok(ack) => ack.accepted,
            // Collectors without per-event acks accept the whole batch.
            Err(_) => batch.iter().map(|e| e.id.clone()).collect(),
        };
        debug!(batch = batch.len(), acked = acked.len(), "delivered event batch");
        Ok(acked)
    }
}

pub mod testing {
    //! Scriptable in-memory sink for tests.

    use super::*;
    use std::sync::{Mutex, MutexGuard};

    /// Sink that records delivered batches and can be told to fail or
    /// acknowledge only a prefix of each batch.
    #[derive(Default)]
    pub struct MockSink {
        delivered: Mutex<Vec<Vec<AnalyticsEvent>>>,
        fail_next: Mutex<bool>,
        ack_limit: Mutex<Option<usize>>,
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    impl MockSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next delivery attempt.
        pub fn fail_next(&self) {
            *lock(&self.fail_next) = true;
        }

        /// Acknowledge only the first `n` events of each batch.
        pub fn ack_only_first(&self, n: usize) {
            *lock(&self.ack_limit) = Some(n);
        }

        /// Batches successfully delivered so far.
        pub fn delivered(&self) -> Vec<Vec<AnalyticsEvent>> {
            lock(&self.delivered).clone()
        }
    }

    #[async_trait]
    impl EventSink for MockSink {
        async fn deliver(&self, batch: &[AnalyticsEvent]) -> SinkResult<Vec<String>> {
            if std::mem::take(&mut *lock(&self.fail_next)) {
                return Err(SinkError::Rejected("scripted failure".to_string()));
            }
            lock(&self.delivered).push(batch.to_vec());
            let limit = lock(&self.ack_limit).unwrap_or(batch.len());
            Ok(batch.iter().take(limit).map(|e| e.id.clone()).collect())
        }
    }
}
