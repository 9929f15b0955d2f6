//! Per-user mutable engine state and rate-limit window reconciliation
//!
//! One [`EngineState`] record exists per (user, engine instance). Gates read
//! a reconciled view of the counters; only the decision applier mutates and
//! persists them.

pub mod store;

pub use store::{EngineStateStore, StateStoreError, StateStoreResult};

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Which of the two concrete engines a state record belongs to.
///
/// The behavioral engine gates micro-interventions, the upgrade engine
/// gates commercial prompts. Each keeps fully independent per-user state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Behavioral,
    Upgrade,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Behavioral => write!(f, "behavioral"),
            Self::Upgrade => write!(f, "upgrade"),
        }
    }
}

/// Reset semantics for a rate-limit window.
///
/// The two concrete engines historically disagreed on this (calendar-day
/// boundary vs rolling window), so the policy is a configuration choice
/// per window rather than a single hardcoded rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Window expires when the UTC calendar unit changes (new day for the
    /// daily window, new ISO week for the weekly window).
    CalendarUtc,
    /// Window expires once a full unit (24h / 7d) has elapsed since the
    /// marker timestamp.
    Rolling,
}

impl WindowPolicy {
    /// Whether a daily window anchored at `marker` is stale at `now`.
    pub fn daily_expired(self, marker: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Self::CalendarUtc => now.date_naive() != marker.date_naive(),
            Self::Rolling => now - marker >= Duration::hours(24),
        }
    }

    /// Whether a weekly window anchored at `marker` is stale at `now`.
    pub fn weekly_expired(self, marker: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Self::CalendarUtc => {
                let (a, b) = (now.iso_week(), marker.iso_week());
                (a.year(), a.week()) != (b.year(), b.week())
            }
            Self::Rolling => now - marker >= Duration::days(7),
        }
    }
}

/// Mutable per-user engine state.
///
/// Counters are only meaningful relative to their window markers; read
/// paths must go through [`EngineState::effective_daily_count`] /
/// [`EngineState::effective_weekly_count`] so a stale window reads as zero
/// without mutating anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    /// When this user signed up (drives the minimum-account-age gate).
    pub signup_at: DateTime<Utc>,
    /// Last time an intervention was shown.
    pub last_shown_at: Option<DateTime<Utc>>,
    /// Last time the user dismissed an intervention.
    pub last_dismissed_at: Option<DateTime<Utc>>,
    /// Lifetime dismiss count (monotonic, never reset).
    pub dismiss_count: u32,
    /// Lifetime engagement count (taps/accepts; monotonic).
    pub engage_count: u32,
    /// Shows counted inside the current daily window.
    pub daily_count: u32,
    /// Anchor of the current daily window.
    pub daily_marker: Option<DateTime<Utc>>,
    /// Shows counted inside the current weekly window.
    pub weekly_count: u32,
    /// Anchor of the current weekly window.
    pub weekly_marker: Option<DateTime<Utc>>,
    /// All evaluations blocked until this instant, if set.
    pub silence_until: Option<DateTime<Utc>>,
    /// Set once the lifetime dismiss ceiling is reached; never unset
    /// except by an explicit data reset.
    pub permanently_silenced: bool,
    /// Content kind delivered on the last allow, for alternation.
    pub last_content_kind: Option<String>,
}

impl EngineState {
    /// Fresh state for a user who signed up at `signup_at`.
    pub fn new(signup_at: DateTime<Utc>) -> Self {
        Self {
            signup_at,
            last_shown_at: None,
            last_dismissed_at: None,
            dismiss_count: 0,
            engage_count: 0,
            daily_count: 0,
            daily_marker: None,
            weekly_count: 0,
            weekly_marker: None,
            silence_until: None,
            permanently_silenced: false,
            last_content_kind: None,
        }
    }

    /// Daily count as the gates should see it at `now`: zero when the
    /// window marker is missing or stale. Read-only.
    pub fn effective_daily_count(&self, now: DateTime<Utc>, policy: WindowPolicy) -> u32 {
        match self.daily_marker {
            Some(marker) if !policy.daily_expired(marker, now) => self.daily_count,
            _ => 0,
        }
    }

    /// Weekly count as the gates should see it at `now`. Read-only.
    pub fn effective_weekly_count(&self, now: DateTime<Utc>, policy: WindowPolicy) -> u32 {
        match self.weekly_marker {
            Some(marker) if !policy.weekly_expired(marker, now) => self.weekly_count,
            _ => 0,
        }
    }

    /// Reset-and-persist half of reconciliation: roll a stale daily window
    /// forward so the next increment lands in a fresh window. Called only
    /// from the decision applier.
    pub fn roll_daily_window(&mut self, now: DateTime<Utc>, policy: WindowPolicy) {
        let stale = match self.daily_marker {
            Some(marker) => policy.daily_expired(marker, now),
            None => true,
        };
        if stale {
            self.daily_count = 0;
            self.daily_marker = Some(now);
        }
    }

    /// Roll a stale weekly window forward. Called only from the applier.
    pub fn roll_weekly_window(&mut self, now: DateTime<Utc>, policy: WindowPolicy) {
        let stale = match self.weekly_marker {
            Some(marker) => policy.weekly_expired(marker, now),
            None => true,
        };
        if stale {
            self.weekly_count = 0;
            self.weekly_marker = Some(now);
        }
    }

    /// Whether the most recent terminal event for this user was a
    /// dismissal (selects the longer cooldown).
    pub fn last_event_was_dismissal(&self) -> bool {
        match (self.last_dismissed_at, self.last_shown_at) {
            (Some(dismissed), Some(shown)) => dismissed >= shown,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// One-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "daily={} weekly={} dismissals={} engaged={} silenced={}",
            self.daily_count,
            self.weekly_count,
            self.dismiss_count,
            self.engage_count,
            self.permanently_silenced,
        )
    }
}
