//! Durability across process restarts: state, assignments, and the event
//! queue all survive rebuilding the engine over the same file store.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use intervention_gate::events::sink::testing::MockSink;
use intervention_gate::{
    ActivationWindow, DecisionContext, EngineKind, Experiment, ExperimentCatalog, GateConfig,
    GateId, InterventionEngine, JsonFileKvStore, SubjectFacts, SubjectTier, Variant,
    VariantConfig,
};
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
}

fn t(d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, d, h, 0, 0).unwrap()
}

fn ctx(user: &str) -> DecisionContext {
    DecisionContext::new(user, "overspend_streak", 0.9).with_facts(SubjectFacts {
        tier: SubjectTier::Free,
        interventions_enabled: true,
        has_active_signal: true,
        moment_detected: Some(true),
        signup_at: None,
    })
}

fn catalog() -> ExperimentCatalog {
    ExperimentCatalog {
        experiments: vec![Experiment {
            id: "nudge-copy".to_string(),
            name: "Nudge copy test".to_string(),
            variants: vec![
                Variant {
                    id: "control".to_string(),
                    weight: 1,
                    config: VariantConfig::default(),
                },
                Variant {
                    id: "urgent".to_string(),
                    weight: 1,
                    config: VariantConfig {
                        headline: Some("Don't lose your streak".to_string()),
                        ..VariantConfig::default()
                    },
                },
            ],
            window: ActivationWindow {
                start: t(1, 0),
                end: None,
            },
            is_active: true,
            allocation_percentage: 100,
        }],
    }
}

async fn open_engine(root: &std::path::Path) -> InterventionEngine {
    init_tracing();
    let kv = JsonFileKvStore::open(root).unwrap().shared();
    InterventionEngine::new(
        EngineKind::Behavioral,
        GateConfig::behavioral(),
        catalog(),
        kv,
        Arc::new(MockSink::new()),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_rate_limit_state_survives_restart() {
    let dir = tempdir().unwrap();

    {
        let e = open_engine(dir.path()).await;
        e.evaluate_at(&ctx("u1"), t(1, 0)).await; // creates state
        let result = e.evaluate_at(&ctx("u1"), t(10, 12)).await;
        assert!(result.allowed, "blocked: {}", result.reason);
        e.record_shown_at("u1", None, t(10, 12)).await.unwrap();
    }

    // A fresh process sees the same cooldown.
    let e = open_engine(dir.path()).await;
    let result = e.evaluate_at(&ctx("u1"), t(10, 13)).await;
    assert_eq!(result.blocked_by, Some(GateId::Cooldown));
}

#[tokio::test]
async fn test_variant_assignment_survives_restart() {
    let dir = tempdir().unwrap();

    let before = {
        let e = open_engine(dir.path()).await;
        e.evaluate_at(&ctx("u1"), t(10, 12)).await;
        e.variant_config("u1", "nudge-copy").await
    };
    assert!(before.is_some());

    let e = open_engine(dir.path()).await;
    e.evaluate_at(&ctx("u1"), t(12, 12)).await;
    let after = e.variant_config("u1", "nudge-copy").await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_event_queue_survives_restart() {
    let dir = tempdir().unwrap();

    {
        let e = open_engine(dir.path()).await;
        e.evaluate_at(&ctx("u1"), t(10, 12)).await;
        e.record_shown_at("u1", None, t(10, 12)).await.unwrap();
        assert_eq!(e.pending_events().await, 2);
        // No sync before "shutdown".
    }

    let e = open_engine(dir.path()).await;
    assert_eq!(e.pending_events().await, 2);
    let report = e.sync_events().await.unwrap();
    assert_eq!(report.acknowledged, 2);
}

#[tokio::test]
async fn test_users_with_similar_ids_keep_separate_state() {
    let dir = tempdir().unwrap();
    let e = open_engine(dir.path()).await;

    // "a_b" and "a:b" sanitize to the same filename stem in the file
    // store; their records must stay independent regardless.
    e.evaluate_at(&ctx("a_b"), t(1, 0)).await;
    e.evaluate_at(&ctx("a:b"), t(1, 0)).await;
    e.record_shown_at("a:b", None, t(10, 12)).await.unwrap();

    // Only the user who was shown is in cooldown.
    let cooling = e.evaluate_at(&ctx("a:b"), t(10, 13)).await;
    assert_eq!(cooling.blocked_by, Some(GateId::Cooldown));
    let open = e.evaluate_at(&ctx("a_b"), t(10, 13)).await;
    assert!(open.allowed, "blocked: {}", open.reason);

    // Clearing one user leaves the other's records intact.
    e.clear_user("a:b").await.unwrap();
    assert!(e.variant_config("a_b", "nudge-copy").await.is_some());
}

#[tokio::test]
async fn test_permanent_silence_survives_restart() {
    let dir = tempdir().unwrap();

    {
        let e = open_engine(dir.path()).await;
        e.evaluate_at(&ctx("u1"), t(1, 0)).await;
        for i in 0..20 {
            e.record_dismissed_at("u1", t(10, i % 24)).await.unwrap();
        }
    }

    let e = open_engine(dir.path()).await;
    let result = e.evaluate_at(&ctx("u1"), t(28, 0)).await;
    assert_eq!(result.blocked_by, Some(GateId::DismissTracking));
}

#[tokio::test]
async fn test_clear_user_wipes_durable_records() {
    let dir = tempdir().unwrap();

    let e = open_engine(dir.path()).await;
    e.evaluate_at(&ctx("u1"), t(1, 0)).await;
    e.record_shown_at("u1", None, t(10, 12)).await.unwrap();
    assert!(e.variant_config("u1", "nudge-copy").await.is_some());

    e.clear_user("u1").await.unwrap();

    // Restart to prove the wipe is durable, not in-memory.
    drop(e);
    let e = open_engine(dir.path()).await;
    assert!(e.variant_config("u1", "nudge-copy").await.is_none());
    let result = e.evaluate_at(&ctx("u1"), t(28, 0)).await;
    assert_eq!(result.blocked_by, Some(GateId::Eligibility));
}
