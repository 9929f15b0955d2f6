//! Intervention engine — evaluation surface and decision applier
//!
//! One [`InterventionEngine`] instance per concrete engine (behavioral or
//! upgrade). Evaluation is a read path: it triggers lazy experiment
//! assignment, loads a per-user state snapshot, and runs the gate pipeline
//! without writing anything. All state mutation happens in the applier
//! methods (`record_shown` / `record_dismissed` / `record_engaged`), each a
//! single read-modify-write.
//!
//! Failure principle: fail closed for the decision (don't show), fail open
//! for the application (never crash the caller).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::assignment::{UserExperimentAssignment, VariantAssigner};
use crate::catalog::{CatalogError, ExperimentCatalog, VariantConfig};
use crate::events::{
    AnalyticsEvent, EventKind, EventRecorder, EventSink, RecorderConfig, SyncError, SyncReport,
};
use crate::gates::{DecisionContext, DecisionResult, GateConfig, GateInput, GatePipeline};
use crate::kv::KvStore;
use crate::state::{EngineKind, EngineStateStore, StateStoreError};

/// Error type for engine applier operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("state error: {0}")]
    State(#[from] StateStoreError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// The intervention gate engine.
pub struct InterventionEngine {
    kind: EngineKind,
    config: GateConfig,
    pipeline: GatePipeline,
    assigner: VariantAssigner,
    states: EngineStateStore,
    recorder: EventRecorder,
}

impl InterventionEngine {
    /// Construct an engine over a durable key-value store and a remote
    /// analytics sink. The catalog is validated here — a malformed catalog
    /// is a configuration error and fails fast.
    pub async fn new(
        kind: EngineKind,
        config: GateConfig,
        catalog: ExperimentCatalog,
        kv: Arc<dyn KvStore>,
        sink: Arc<dyn EventSink>,
    ) -> EngineResult<Self> {
        catalog.validate()?;
        let catalog = Arc::new(catalog);
        let recorder =
            EventRecorder::open(kind, RecorderConfig::default(), kv.clone(), sink).await;
        Ok(Self {
            kind,
            config,
            pipeline: GatePipeline::standard(kind),
            assigner: VariantAssigner::new(catalog, kv.clone()),
            states: EngineStateStore::new(kind, kv),
            recorder,
        })
    }

    /// Which engine instance this is.
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Active gate configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    // =========================================================================
    // Read path
    // =========================================================================

    /// Evaluate whether an intervention may be surfaced right now.
    pub async fn evaluate(&self, ctx: &DecisionContext) -> DecisionResult {
        self.evaluate_at(ctx, Utc::now()).await
    }

    /// Evaluation with an explicit clock, for deterministic tests.
    ///
    /// Ensures experiment assignments exist (best effort), loads the user's
    /// state snapshot, and runs the pipeline. Never writes counters; never
    /// returns an error — an unreadable state store fails the decision
    /// closed instead.
    pub async fn evaluate_at(&self, ctx: &DecisionContext, now: DateTime<Utc>) -> DecisionResult {
        let assignments = self
            .assigner
            .get_or_create_assignments(&ctx.user_id, now)
            .await;

        // First sight of a user creates their state record, anchored at
        // the caller-supplied signup time when one is known.
        let signup_at = ctx.facts.signup_at.unwrap_or(now);
        let state = match self.states.load_or_create(&ctx.user_id, signup_at).await {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    user_id = %ctx.user_id,
                    kind = %self.kind,
                    error = %e,
                    "engine state unavailable; failing decision closed"
                );
                let result = DecisionResult::fail_closed("engine state unavailable");
                self.record_decision(ctx, &result, &assignments, now).await;
                return result;
            }
        };

        let result = self.pipeline.evaluate(&GateInput {
            ctx,
            state: &state,
            config: &self.config,
            now,
        });

        debug!(
            user_id = %ctx.user_id,
            kind = %self.kind,
            signal = %ctx.signal,
            allowed = result.allowed,
            blocked_by = ?result.blocked_by,
            "evaluated decision"
        );
        self.record_decision(ctx, &result, &assignments, now).await;
        result
    }

    /// Content config for the variant this user is assigned to, if any.
    pub async fn variant_config(
        &self,
        user_id: &str,
        experiment_id: &str,
    ) -> Option<VariantConfig> {
        self.assigner.variant_config(user_id, experiment_id).await
    }

    // =========================================================================
    // Decision applier (write path)
    // =========================================================================

    /// Record that an intervention was shown.
    pub async fn record_shown(&self, user_id: &str) -> EngineResult<()> {
        self.record_shown_at(user_id, None, Utc::now()).await
    }

    /// `record_shown` with an explicit clock and the content kind chosen
    /// by the caller (stored for last-shown alternation).
    pub async fn record_shown_at(
        &self,
        user_id: &str,
        content_kind: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let mut state = self.states.load_or_create(user_id, now).await?;

        // Single read-modify-write: reconcile stale windows, then count
        // this show in the fresh ones.
        state.roll_daily_window(now, self.config.daily_policy);
        state.roll_weekly_window(now, self.config.weekly_policy);
        state.daily_count += 1;
        state.weekly_count += 1;
        state.last_shown_at = Some(now);
        if let Some(kind) = content_kind {
            state.last_content_kind = Some(kind.to_string());
        }
        self.states.save(user_id, &state).await?;

        self.recorder
            .record(AnalyticsEvent::new(EventKind::Shown, now).with_metadata(json!({
                "user_id": user_id,
                "daily_count": state.daily_count,
                "weekly_count": state.weekly_count,
            })))
            .await;
        Ok(())
    }

    /// Record that the user dismissed an intervention, folding the
    /// dismissal into escalation state.
    pub async fn record_dismissed(&self, user_id: &str) -> EngineResult<()> {
        self.record_dismissed_at(user_id, Utc::now()).await
    }

    pub async fn record_dismissed_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let mut state = self.states.load_or_create(user_id, now).await?;

        state.dismiss_count += 1;
        state.last_dismissed_at = Some(now);

        if state.dismiss_count >= self.config.lifetime_dismiss_cap {
            if !state.permanently_silenced {
                info!(
                    user_id,
                    kind = %self.kind,
                    dismissals = state.dismiss_count,
                    "lifetime dismiss cap reached; permanently silencing"
                );
            }
            state.permanently_silenced = true;
        } else if state.dismiss_count >= self.config.escalation_threshold {
            let until = now + self.config.escalation_silence();
            state.silence_until = Some(until);
            info!(
                user_id,
                kind = %self.kind,
                dismissals = state.dismiss_count,
                until = %until,
                "escalation threshold crossed; silencing"
            );
        }
        self.states.save(user_id, &state).await?;

        self.recorder
            .record(
                AnalyticsEvent::new(EventKind::Dismissed, now).with_metadata(json!({
                    "user_id": user_id,
                    "dismiss_count": state.dismiss_count,
                    "permanently_silenced": state.permanently_silenced,
                })),
            )
            .await;
        Ok(())
    }

    /// Record that the user engaged with an intervention. Engagement never
    /// affects cooldowns.
    pub async fn record_engaged(&self, user_id: &str) -> EngineResult<()> {
        self.record_engaged_at(user_id, Utc::now()).await
    }

    pub async fn record_engaged_at(&self, user_id: &str, now: DateTime<Utc>) -> EngineResult<()> {
        let mut state = self.states.load_or_create(user_id, now).await?;
        state.engage_count += 1;
        self.states.save(user_id, &state).await?;

        self.recorder
            .record(AnalyticsEvent::new(EventKind::Engaged, now).with_metadata(json!({
                "user_id": user_id,
                "engage_count": state.engage_count,
            })))
            .await;
        Ok(())
    }

    /// Explicit per-user data reset: engine state and assignments.
    pub async fn clear_user(&self, user_id: &str) -> EngineResult<()> {
        self.states.clear(user_id).await?;
        if let Err(e) = self.assigner.clear_user(user_id).await {
            warn!(user_id, error = %e, "failed to clear assignments");
        }
        Ok(())
    }

    // =========================================================================
    // Content selection
    // =========================================================================

    /// Pick a content kind for an allowed decision, avoiding repeating the
    /// last one shown. Pure selection; persist the choice by passing it to
    /// [`record_shown_at`](Self::record_shown_at).
    pub async fn choose_content<'a>(
        &self,
        user_id: &str,
        candidates: &'a [&'a str],
    ) -> Option<&'a str> {
        let last = match self.states.load(user_id).await {
            Ok(Some(state)) => state.last_content_kind,
            _ => None,
        };
        alternate_content(last.as_deref(), candidates)
    }

    // =========================================================================
    // Event sync
    // =========================================================================

    /// Push one batch of queued analytics events to the remote sink.
    pub async fn sync_events(&self) -> Result<SyncReport, SyncError> {
        self.recorder.sync().await
    }

    /// Events queued and awaiting sync.
    pub async fn pending_events(&self) -> usize {
        self.recorder.pending().await
    }

    async fn record_decision(
        &self,
        ctx: &DecisionContext,
        result: &DecisionResult,
        assignments: &[UserExperimentAssignment],
        now: DateTime<Utc>,
    ) {
        let kind = if result.allowed {
            EventKind::Allowed
        } else {
            EventKind::Blocked
        };
        let variant = assignments
            .iter()
            .find_map(|a| a.variant_id.clone());
        let mut event = AnalyticsEvent::new(kind, now)
            .with_signal(ctx.signal.clone())
            .with_metadata(json!({
                "user_id": ctx.user_id,
                "blocked_by": result.blocked_by.map(|g| g.as_str()),
                "reason": result.reason,
                "confidence": ctx.confidence,
            }));
        if let Some(variant) = variant {
            event = event.with_variant(variant);
        }
        self.recorder.record(event).await;
    }
}

/// Last-shown alternation: prefer the first candidate that differs from
/// what was shown last; fall back to the first candidate.
pub fn alternate_content<'a>(last: Option<&str>, candidates: &'a [&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .find(|c| Some(**c) != last)
        .or_else(|| candidates.first())
        .copied()
}
