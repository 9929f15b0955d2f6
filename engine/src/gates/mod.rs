//! Gate pipeline — ordered, short-circuiting decision predicates
//!
//! The pipeline is an explicit ordered list of pure [`Gate`] values rather
//! than nested conditionals: each gate is tagged with an id, can be unit
//! tested in isolation, and can be reordered or inserted without touching
//! control flow. Evaluation stops at the first blocking gate; later gates
//! never un-block an earlier block, and no gate mutates state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{EngineKind, EngineState, WindowPolicy};

/// Subscription tier of the subject under evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectTier {
    Free,
    Trial,
    Paying,
}

/// Caller-supplied facts about the subject at this instant.
///
/// The engine never queries these itself — they arrive fully resolved in
/// the decision context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectFacts {
    /// Current subscription tier.
    pub tier: SubjectTier,
    /// Whether the user has interventions enabled at all.
    pub interventions_enabled: bool,
    /// Whether a qualifying behavioral/friction signal is currently active.
    pub has_active_signal: bool,
    /// Moment-detection verdict from the caller's detector, when the
    /// engine requires one (behavioral engine only).
    pub moment_detected: Option<bool>,
    /// Real account signup time. Used when this user's state record is
    /// first created; absent, the first evaluation instant stands in,
    /// which makes long-standing accounts look brand new to the
    /// account-age gate.
    #[serde(default)]
    pub signup_at: Option<DateTime<Utc>>,
}

impl Default for SubjectFacts {
    fn default() -> Self {
        Self {
            tier: SubjectTier::Free,
            interventions_enabled: true,
            has_active_signal: true,
            moment_detected: None,
            signup_at: None,
        }
    }
}

/// Ephemeral per-call evaluation input. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    /// Subject id.
    pub user_id: String,
    /// Friction/behavior tag identifying which signal triggered this
    /// evaluation (e.g., "overspend_streak", "trial_expiring").
    pub signal: String,
    /// Signal confidence in [0, 1].
    pub confidence: f64,
    /// Resolved subject facts.
    pub facts: SubjectFacts,
}

impl DecisionContext {
    pub fn new(user_id: impl Into<String>, signal: impl Into<String>, confidence: f64) -> Self {
        Self {
            user_id: user_id.into(),
            signal: signal.into(),
            confidence,
            facts: SubjectFacts::default(),
        }
    }

    pub fn with_facts(mut self, facts: SubjectFacts) -> Self {
        self.facts = facts;
        self
    }
}

/// Stable identifier of the gate that blocked a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateId {
    Eligibility,
    TierExclusion,
    DismissTracking,
    Cooldown,
    DailyLimit,
    WeeklyLimit,
    ConfidenceThreshold,
    ContextRelevance,
    MomentPrecision,
}

impl GateId {
    /// Wire name, used in decision results and analytics events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eligibility => "ELIGIBILITY",
            Self::TierExclusion => "TIER_EXCLUSION",
            Self::DismissTracking => "DISMISS_TRACKING",
            Self::Cooldown => "COOLDOWN",
            Self::DailyLimit => "DAILY_LIMIT",
            Self::WeeklyLimit => "WEEKLY_LIMIT",
            Self::ConfidenceThreshold => "CONFIDENCE_THRESHOLD",
            Self::ContextRelevance => "CONTEXT_RELEVANCE",
            Self::MomentPrecision => "MOMENT_PRECISION",
        }
    }
}

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    /// Whether the intervention may be surfaced.
    pub allowed: bool,
    /// Gate that blocked, when blocked. `None` only on the fail-closed
    /// infrastructure path (state unreadable — don't show, don't crash).
    pub blocked_by: Option<GateId>,
    /// Human-readable reason.
    pub reason: String,
}

impl DecisionResult {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            blocked_by: None,
            reason: reason.into(),
        }
    }

    pub fn block(gate: GateId, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            blocked_by: Some(gate),
            reason: reason.into(),
        }
    }

    /// Fail-closed result for infrastructure failures: the decision is
    /// "don't show" but no gate produced it.
    pub fn fail_closed(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            blocked_by: None,
            reason: reason.into(),
        }
    }
}

/// Thresholds and policies for one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Minimum account age before any intervention is considered.
    pub min_account_age_hours: i64,
    /// Exclude paying subjects entirely (upgrade engine).
    pub exclude_paying_tier: bool,
    /// Cooldown after a plain show.
    pub cooldown_after_show_minutes: i64,
    /// Longer cooldown after a dismissal.
    pub cooldown_after_dismiss_minutes: i64,
    /// Maximum shows per daily window.
    pub daily_cap: u32,
    /// Maximum shows per weekly window.
    pub weekly_cap: u32,
    /// Dismiss count at which an escalating silence window starts.
    pub escalation_threshold: u32,
    /// Length of the escalating silence window.
    pub escalation_silence_days: i64,
    /// Lifetime dismiss count that permanently silences the engine.
    pub lifetime_dismiss_cap: u32,
    /// Minimum signal confidence.
    pub min_confidence: f64,
    /// Signals only relevant to trial-tier subjects.
    pub trial_only_signals: Vec<String>,
    /// Reset semantics for the daily window.
    pub daily_policy: WindowPolicy,
    /// Reset semantics for the weekly window.
    pub weekly_policy: WindowPolicy,
}

impl GateConfig {
    /// Preset for the behavioral micro-intervention engine.
    pub fn behavioral() -> Self {
        Self {
            min_account_age_hours: 48,
            exclude_paying_tier: false,
            cooldown_after_show_minutes: 4 * 60,
            cooldown_after_dismiss_minutes: 24 * 60,
            daily_cap: 2,
            weekly_cap: 6,
            escalation_threshold: 5,
            escalation_silence_days: 7,
            lifetime_dismiss_cap: 20,
            min_confidence: 0.6,
            trial_only_signals: Vec::new(),
            daily_policy: WindowPolicy::CalendarUtc,
            weekly_policy: WindowPolicy::Rolling,
        }
    }

    /// Preset for the upgrade/paywall prompt engine.
    pub fn upgrade() -> Self {
        Self {
            min_account_age_hours: 7 * 24,
            exclude_paying_tier: true,
            cooldown_after_show_minutes: 24 * 60,
            cooldown_after_dismiss_minutes: 3 * 24 * 60,
            daily_cap: 1,
            weekly_cap: 3,
            escalation_threshold: 5,
            escalation_silence_days: 14,
            lifetime_dismiss_cap: 20,
            min_confidence: 0.6,
            trial_only_signals: vec!["trial_expiring".to_string()],
            daily_policy: WindowPolicy::CalendarUtc,
            weekly_policy: WindowPolicy::Rolling,
        }
    }

    /// Escalation silence window as a chrono duration.
    pub fn escalation_silence(&self) -> Duration {
        Duration::days(self.escalation_silence_days)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::behavioral()
    }
}

/// Read-only input to every gate predicate.
pub struct GateInput<'a> {
    pub ctx: &'a DecisionContext,
    pub state: &'a EngineState,
    pub config: &'a GateConfig,
    pub now: DateTime<Utc>,
}

/// One pure predicate in the pipeline: `Some(reason)` blocks.
pub struct Gate {
    pub id: GateId,
    check: Box<dyn Fn(&GateInput<'_>) -> Option<String> + Send + Sync>,
}

impl Gate {
    pub fn new<F>(id: GateId, check: F) -> Self
    where
        F: Fn(&GateInput<'_>) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            id,
            check: Box::new(check),
        }
    }

    /// Run this gate against the input.
    pub fn check(&self, input: &GateInput<'_>) -> Option<String> {
        (self.check)(input)
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate").field("id", &self.id).finish()
    }
}

/// Ordered gate list with short-circuit evaluation.
pub struct GatePipeline {
    gates: Vec<Gate>,
}

impl GatePipeline {
    /// Build the canonical pipeline for an engine instance. The behavioral
    /// engine carries an extra moment-precision gate at the end.
    pub fn standard(kind: EngineKind) -> Self {
        let mut gates = vec![
            Gate::new(GateId::Eligibility, eligibility),
            Gate::new(GateId::TierExclusion, tier_exclusion),
            Gate::new(GateId::DismissTracking, permanent_silence),
            Gate::new(GateId::Cooldown, cooldown),
            Gate::new(GateId::DailyLimit, daily_limit),
            Gate::new(GateId::WeeklyLimit, weekly_limit),
            Gate::new(GateId::DismissTracking, lifetime_dismiss_cap),
            Gate::new(GateId::ConfidenceThreshold, signal_confidence),
            Gate::new(GateId::ContextRelevance, context_relevance),
        ];
        if kind == EngineKind::Behavioral {
            gates.push(Gate::new(GateId::MomentPrecision, moment_precision));
        }
        Self { gates }
    }

    /// Build a pipeline from an explicit gate list (tests, custom engines).
    pub fn from_gates(gates: Vec<Gate>) -> Self {
        Self { gates }
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Evaluate gates in order, stopping at the first block.
    pub fn evaluate(&self, input: &GateInput<'_>) -> DecisionResult {
        for gate in &self.gates {
            if let Some(reason) = gate.check(input) {
                return DecisionResult::block(gate.id, reason);
            }
        }
        DecisionResult::allow("all gates passed")
    }
}

// ---------------------------------------------------------------------------
// Gate predicates
// ---------------------------------------------------------------------------

/// Gate 1: interventions enabled and account old enough.
fn eligibility(input: &GateInput<'_>) -> Option<String> {
    if !input.ctx.facts.interventions_enabled {
        return Some("interventions disabled for this user".to_string());
    }
    let age = input.now - input.state.signup_at;
    let min_age = Duration::hours(input.config.min_account_age_hours);
    if age < min_age {
        return Some(format!(
            "account age {}h below minimum {}h",
            age.num_hours(),
            input.config.min_account_age_hours
        ));
    }
    None
}

/// Gate 2: contractually exempt tiers never see prompts.
fn tier_exclusion(input: &GateInput<'_>) -> Option<String> {
    if input.config.exclude_paying_tier && input.ctx.facts.tier == SubjectTier::Paying {
        return Some("paying subscribers are excluded".to_string());
    }
    None
}

/// Gate 3: permanent silence. Reported as DISMISS_TRACKING — the flag only
/// ever originates from the lifetime dismiss ceiling.
fn permanent_silence(input: &GateInput<'_>) -> Option<String> {
    if input.state.permanently_silenced {
        return Some("permanently silenced after repeated dismissals".to_string());
    }
    None
}

/// Gate 4: silence window and show cooldown. The cooldown length depends on
/// whether the last event was a dismissal.
fn cooldown(input: &GateInput<'_>) -> Option<String> {
    if let Some(until) = input.state.silence_until {
        if input.now < until {
            return Some(format!("silenced until {}", until.to_rfc3339()));
        }
    }
    if let Some(last_shown) = input.state.last_shown_at {
        let minutes = if input.state.last_event_was_dismissal() {
            input.config.cooldown_after_dismiss_minutes
        } else {
            input.config.cooldown_after_show_minutes
        };
        let window = Duration::minutes(minutes);
        if input.now - last_shown < window {
            return Some(format!("within {}-minute cooldown of last show", minutes));
        }
    }
    None
}

/// Gate 5: reconciled daily count against the per-day cap. Stale windows
/// read as zero; the reset itself happens only in the applier.
fn daily_limit(input: &GateInput<'_>) -> Option<String> {
    let count = input
        .state
        .effective_daily_count(input.now, input.config.daily_policy);
    if count >= input.config.daily_cap {
        return Some(format!(
            "daily cap reached ({}/{})",
            count, input.config.daily_cap
        ));
    }
    None
}

/// Gate 6: reconciled weekly count against the per-week cap.
fn weekly_limit(input: &GateInput<'_>) -> Option<String> {
    let count = input
        .state
        .effective_weekly_count(input.now, input.config.weekly_policy);
    if count >= input.config.weekly_cap {
        return Some(format!(
            "weekly cap reached ({}/{})",
            count, input.config.weekly_cap
        ));
    }
    None
}

/// Gate 7: lifetime dismiss ceiling. The `permanently_silenced` flip lives
/// in the decision applier; this gate stays pure and also covers the edge
/// where the flag write has not landed yet.
fn lifetime_dismiss_cap(input: &GateInput<'_>) -> Option<String> {
    if input.state.dismiss_count >= input.config.lifetime_dismiss_cap {
        return Some(format!(
            "lifetime dismiss cap reached ({}/{})",
            input.state.dismiss_count, input.config.lifetime_dismiss_cap
        ));
    }
    None
}

/// Gate 8: a qualifying signal must be active and confident enough.
fn signal_confidence(input: &GateInput<'_>) -> Option<String> {
    if !input.ctx.facts.has_active_signal {
        return Some("no qualifying active signal".to_string());
    }
    if input.ctx.confidence < input.config.min_confidence {
        return Some(format!(
            "confidence {:.2} below threshold {:.2}",
            input.ctx.confidence, input.config.min_confidence
        ));
    }
    None
}

/// Gate 9: domain fit — trial-only signals require a trial-tier subject.
fn context_relevance(input: &GateInput<'_>) -> Option<String> {
    if input.config.trial_only_signals.contains(&input.ctx.signal)
        && input.ctx.facts.tier != SubjectTier::Trial
    {
        return Some(format!(
            "signal '{}' is irrelevant outside a trial",
            input.ctx.signal
        ));
    }
    None
}

/// Gate 10 (behavioral only): the current instant must be an appropriate
/// one for interruption, per the caller's moment detector.
fn moment_precision(input: &GateInput<'_>) -> Option<String> {
    match input.ctx.facts.moment_detected {
        Some(true) => None,
        Some(false) => Some("moment detector rejected this instant".to_string()),
        None => Some("no moment-detection signal supplied".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, h, 0, 0).unwrap()
    }

    /// Seasoned state that sails through every gate at t(10, 12).
    fn clean_state() -> EngineState {
        EngineState::new(t(1, 0))
    }

    fn ctx() -> DecisionContext {
        DecisionContext::new("u1", "overspend_streak", 0.9).with_facts(SubjectFacts {
            tier: SubjectTier::Free,
            interventions_enabled: true,
            has_active_signal: true,
            moment_detected: Some(true),
            signup_at: None,
        })
    }

    fn eval(
        pipeline: &GatePipeline,
        ctx: &DecisionContext,
        state: &EngineState,
        config: &GateConfig,
        now: DateTime<Utc>,
    ) -> DecisionResult {
        pipeline.evaluate(&GateInput {
            ctx,
            state,
            config,
            now,
        })
    }

    #[test]
    fn test_clean_state_allows() {
        let pipeline = GatePipeline::standard(EngineKind::Behavioral);
        let result = eval(
            &pipeline,
            &ctx(),
            &clean_state(),
            &GateConfig::behavioral(),
            t(10, 12),
        );
        assert!(result.allowed, "blocked: {}", result.reason);
    }

    #[test]
    fn test_interventions_disabled_blocks() {
        let pipeline = GatePipeline::standard(EngineKind::Behavioral);
        let mut ctx = ctx();
        ctx.facts.interventions_enabled = false;
        let result = eval(
            &pipeline,
            &ctx,
            &clean_state(),
            &GateConfig::behavioral(),
            t(10, 12),
        );
        assert_eq!(result.blocked_by, Some(GateId::Eligibility));
    }

    #[test]
    fn test_young_account_blocks() {
        let pipeline = GatePipeline::standard(EngineKind::Behavioral);
        let state = EngineState::new(t(10, 0));
        let result = eval(
            &pipeline,
            &ctx(),
            &state,
            &GateConfig::behavioral(),
            t(10, 12),
        );
        assert_eq!(result.blocked_by, Some(GateId::Eligibility));
    }

    #[test]
    fn test_paying_tier_excluded_on_upgrade_engine() {
        let pipeline = GatePipeline::standard(EngineKind::Upgrade);
        let mut ctx = ctx();
        ctx.facts.tier = SubjectTier::Paying;
        let result = eval(
            &pipeline,
            &ctx,
            &clean_state(),
            &GateConfig::upgrade(),
            t(10, 12),
        );
        assert_eq!(result.blocked_by, Some(GateId::TierExclusion));
    }

    #[test]
    fn test_paying_tier_allowed_on_behavioral_engine() {
        let pipeline = GatePipeline::standard(EngineKind::Behavioral);
        let mut ctx = ctx();
        ctx.facts.tier = SubjectTier::Paying;
        let result = eval(
            &pipeline,
            &ctx,
            &clean_state(),
            &GateConfig::behavioral(),
            t(10, 12),
        );
        assert!(result.allowed);
    }

    #[test]
    fn test_permanent_silence_reports_dismiss_tracking() {
        let pipeline = GatePipeline::standard(EngineKind::Behavioral);
        let mut state = clean_state();
        state.permanently_silenced = true;
        let result = eval(
            &pipeline,
            &ctx(),
            &state,
            &GateConfig::behavioral(),
            t(10, 12),
        );
        assert_eq!(result.blocked_by, Some(GateId::DismissTracking));
    }

    #[test]
    fn test_silence_window_blocks() {
        let pipeline = GatePipeline::standard(EngineKind::Behavioral);
        let mut state = clean_state();
        state.silence_until = Some(t(12, 0));
        let result = eval(
            &pipeline,
            &ctx(),
            &state,
            &GateConfig::behavioral(),
            t(10, 12),
        );
        assert_eq!(result.blocked_by, Some(GateId::Cooldown));

        // Window elapsed — no longer blocks.
        let result = eval(
            &pipeline,
            &ctx(),
            &state,
            &GateConfig::behavioral(),
            t(12, 1),
        );
        assert!(result.allowed);
    }

    #[test]
    fn test_cooldown_depends_on_last_event() {
        let pipeline = GatePipeline::standard(EngineKind::Behavioral);
        let config = GateConfig::behavioral(); // 4h show / 24h dismiss
        let mut state = clean_state();
        state.last_shown_at = Some(t(10, 0));

        // 5h after a plain show: past the 4h cooldown.
        assert!(eval(&pipeline, &ctx(), &state, &config, t(10, 5)).allowed);

        // Same delta, but the show was dismissed: 24h cooldown applies.
        state.last_dismissed_at = Some(t(10, 0));
        let result = eval(&pipeline, &ctx(), &state, &config, t(10, 5));
        assert_eq!(result.blocked_by, Some(GateId::Cooldown));
        assert!(eval(&pipeline, &ctx(), &state, &config, t(11, 1)).allowed);
    }

    #[test]
    fn test_daily_limit_blocks_and_resets() {
        let pipeline = GatePipeline::standard(EngineKind::Behavioral);
        let mut config = GateConfig::behavioral();
        config.daily_cap = 1;
        config.cooldown_after_show_minutes = 0;

        let mut state = clean_state();
        state.last_shown_at = Some(t(10, 9));
        state.daily_count = 1;
        state.daily_marker = Some(t(10, 9));

        let result = eval(&pipeline, &ctx(), &state, &config, t(10, 12));
        assert_eq!(result.blocked_by, Some(GateId::DailyLimit));

        // New calendar day — stale window reads as zero, no reset call needed.
        assert!(eval(&pipeline, &ctx(), &state, &config, t(11, 0)).allowed);
    }

    #[test]
    fn test_weekly_limit_blocks_and_resets() {
        let pipeline = GatePipeline::standard(EngineKind::Behavioral);
        let mut config = GateConfig::behavioral();
        config.weekly_cap = 3;
        config.cooldown_after_show_minutes = 0;

        let mut state = clean_state();
        state.weekly_count = 3;
        state.weekly_marker = Some(t(5, 0));

        let result = eval(&pipeline, &ctx(), &state, &config, t(10, 12));
        assert_eq!(result.blocked_by, Some(GateId::WeeklyLimit));

        // >= 7 days after the marker the rolling window is stale.
        assert!(eval(&pipeline, &ctx(), &state, &config, t(12, 1)).allowed);
    }

    #[test]
    fn test_lifetime_dismiss_cap_blocks() {
        let pipeline = GatePipeline::standard(EngineKind::Behavioral);
        let mut state = clean_state();
        state.dismiss_count = 20;
        let result = eval(
            &pipeline,
            &ctx(),
            &state,
            &GateConfig::behavioral(),
            t(10, 12),
        );
        assert_eq!(result.blocked_by, Some(GateId::DismissTracking));
    }

    #[test]
    fn test_low_confidence_blocks() {
        let pipeline = GatePipeline::standard(EngineKind::Behavioral);
        let mut ctx = ctx();
        ctx.confidence = 0.5;
        let result = eval(
            &pipeline,
            &ctx,
            &clean_state(),
            &GateConfig::behavioral(),
            t(10, 12),
        );
        assert_eq!(result.blocked_by, Some(GateId::ConfidenceThreshold));
    }

    #[test]
    fn test_missing_signal_blocks() {
        let pipeline = GatePipeline::standard(EngineKind::Behavioral);
        let mut ctx = ctx();
        ctx.facts.has_active_signal = false;
        let result = eval(
            &pipeline,
            &ctx,
            &clean_state(),
            &GateConfig::behavioral(),
            t(10, 12),
        );
        assert_eq!(result.blocked_by, Some(GateId::ConfidenceThreshold));
    }

    #[test]
    fn test_trial_only_signal_irrelevant_to_free_user() {
        let pipeline = GatePipeline::standard(EngineKind::Upgrade);
        let mut ctx = ctx();
        ctx.signal = "trial_expiring".to_string();
        let result = eval(
            &pipeline,
            &ctx,
            &clean_state(),
            &GateConfig::upgrade(),
            t(10, 12),
        );
        assert_eq!(result.blocked_by, Some(GateId::ContextRelevance));

        ctx.facts.tier = SubjectTier::Trial;
        assert!(eval(&pipeline, &ctx, &clean_state(), &GateConfig::upgrade(), t(10, 12)).allowed);
    }

    #[test]
    fn test_moment_gate_behavioral_only() {
        let mut ctx = ctx();
        ctx.facts.moment_detected = Some(false);

        let behavioral = GatePipeline::standard(EngineKind::Behavioral);
        let result = eval(
            &behavioral,
            &ctx,
            &clean_state(),
            &GateConfig::behavioral(),
            t(10, 12),
        );
        assert_eq!(result.blocked_by, Some(GateId::MomentPrecision));

        // The upgrade pipeline has no moment gate at all.
        let upgrade = GatePipeline::standard(EngineKind::Upgrade);
        assert!(eval(&upgrade, &ctx, &clean_state(), &GateConfig::upgrade(), t(10, 12)).allowed);
        assert_eq!(behavioral.len(), upgrade.len() + 1);
    }

    #[test]
    fn test_short_circuit_stops_at_first_block() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let hits = Arc::new(AtomicUsize::new(0));
        let make_gate = |id: GateId, blocks: bool, hits: Arc<AtomicUsize>| {
            Gate::new(id, move |_input| {
                hits.fetch_add(1, Ordering::SeqCst);
                blocks.then(|| "instrumented block".to_string())
            })
        };

        let pipeline = GatePipeline::from_gates(vec![
            make_gate(GateId::Eligibility, false, hits.clone()),
            make_gate(GateId::DailyLimit, true, hits.clone()),
            make_gate(GateId::WeeklyLimit, false, hits.clone()),
            make_gate(GateId::ConfidenceThreshold, false, hits.clone()),
        ]);

        let result = eval(
            &pipeline,
            &ctx(),
            &clean_state(),
            &GateConfig::behavioral(),
            t(10, 12),
        );

        assert_eq!(result.blocked_by, Some(GateId::DailyLimit));
        // Gates after the blocking one were never invoked.
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_gate_id_wire_names() {
        assert_eq!(GateId::DailyLimit.as_str(), "DAILY_LIMIT");
        assert_eq!(GateId::ConfidenceThreshold.as_str(), "CONFIDENCE_THRESHOLD");
        assert_eq!(GateId::DismissTracking.as_str(), "DISMISS_TRACKING");
        assert_eq!(GateId::Cooldown.as_str(), "COOLDOWN");
    }
}
