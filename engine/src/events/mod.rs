//! Analytics event recording and batch sync
//!
//! Every decision transition produces an [`AnalyticsEvent`] appended to a
//! bounded local queue; a background-style [`sync`](recorder::EventRecorder::sync)
//! drains acknowledged batches to a remote sink. Recording never fails the
//! caller; sync returns an explicit `Result` callers may inspect or ignore.

pub mod queue;
pub mod recorder;
pub mod sink;

pub use queue::EventQueue;
pub use recorder::{EventRecorder, RecorderConfig, SyncError, SyncReport};
pub use sink::{EventSink, HttpEventSink, SinkError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of recordable transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A decision was evaluated and allowed.
    Allowed,
    /// A decision was evaluated and blocked.
    Blocked,
    /// An intervention was actually shown.
    Shown,
    /// The user dismissed an intervention.
    Dismissed,
    /// The user engaged (tapped/accepted).
    Engaged,
    /// A sync batch completed.
    SyncCompleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Blocked => "blocked",
            Self::Shown => "shown",
            Self::Dismissed => "dismissed",
            Self::Engaged => "engaged",
            Self::SyncCompleted => "sync_completed",
        }
    }
}

/// One recorded transition, queued locally until synced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    /// Unique event id (dedup key on the remote side).
    pub id: String,
    /// What happened.
    pub event_type: EventKind,
    /// Friction/behavior tag that triggered the evaluation, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    /// Assigned experiment variant in effect, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// When the transition occurred.
    pub timestamp: DateTime<Utc>,
    /// Free-form structured detail (blocked gate, reason, counters).
    #[serde(default)]
    pub metadata: Value,
    /// Whether the remote sink has acknowledged this event.
    pub synced: bool,
}

impl AnalyticsEvent {
    /// Build an event with a fresh id, unsynced.
    pub fn new(event_type: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            signal: None,
            variant: None,
            timestamp,
            metadata: Value::Null,
            synced: false,
        }
    }

    pub fn with_signal(mut self, signal: impl Into<String>) -> Self {
        self.signal = Some(signal.into());
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
