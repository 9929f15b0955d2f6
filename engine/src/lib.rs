//! Intervention gate engine
//!
//! A deterministic decision layer answering one question: given what we
//! know about this user right now, may an intervention be surfaced?
//!
//! Two engine instances share every mechanism here — a behavioral engine
//! gating micro-interventions and an upgrade engine gating commercial
//! prompts — differing only in configuration and one extra gate.
//!
//! Core pieces:
//! - **Gate pipeline**: an ordered, short-circuiting list of pure
//!   predicates over immutable state snapshots ([`gates`]).
//! - **Deterministic experiments**: stable hash bucketing assigns users to
//!   variants once, immutably ([`hashing`], [`catalog`], [`assignment`]).
//! - **Rate-limit state**: per-user counters with lazy window
//!   reconciliation, persisted through a pluggable key-value store
//!   ([`state`], [`kv`]).
//! - **Analytics**: a bounded local event queue with batch sync to a
//!   remote sink ([`events`]).
//!
//! The [`InterventionEngine`] ties these together: evaluation never
//! mutates, the applier methods mutate in single read-modify-writes, and
//! infrastructure failures fail the decision closed without failing the
//! caller.

pub mod assignment;
pub mod catalog;
pub mod engine;
pub mod events;
pub mod gates;
pub mod hashing;
pub mod kv;
pub mod state;

pub use assignment::{UserExperimentAssignment, VariantAssigner};
pub use catalog::{
    ActivationWindow, CatalogError, CatalogResult, Experiment, ExperimentCatalog, Variant,
    VariantConfig,
};
pub use engine::{alternate_content, EngineError, EngineResult, InterventionEngine};
pub use events::{
    AnalyticsEvent, EventKind, EventRecorder, EventSink, HttpEventSink, RecorderConfig, SinkError,
    SyncError, SyncReport,
};
pub use gates::{
    DecisionContext, DecisionResult, Gate, GateConfig, GateId, GateInput, GatePipeline,
    SubjectFacts, SubjectTier,
};
pub use hashing::{bucket, hash32};
pub use kv::{JsonFileKvStore, KvError, KvResult, KvStore, MemoryKvStore, SharedKvStore};
pub use state::{
    EngineKind, EngineState, EngineStateStore, StateStoreError, StateStoreResult, WindowPolicy,
};
