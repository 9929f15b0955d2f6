//! Deterministic experiment assignment
//!
//! Assigns users to experiment variants via stable hashing and persists the
//! result. Assignment is immutable once created: weight changes never
//! reassign existing users, and persistence failures degrade to
//! previously-known assignments instead of failing the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{Experiment, ExperimentCatalog, Variant, VariantConfig};
use crate::hashing::bucket;
use crate::kv::KvStore;

/// A persisted (user, experiment) → variant record.
///
/// `variant_id: None` means the user fell outside the experiment's
/// allocation percentage. Persisting the exclusion keeps assignment
/// immutable even if the allocation percentage is later raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserExperimentAssignment {
    pub user_id: String,
    pub experiment_id: String,
    pub variant_id: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

/// Assigns variants and manages persisted assignment records.
pub struct VariantAssigner {
    catalog: Arc<ExperimentCatalog>,
    kv: Arc<dyn KvStore>,
}

impl VariantAssigner {
    pub fn new(catalog: Arc<ExperimentCatalog>, kv: Arc<dyn KvStore>) -> Self {
        Self { catalog, kv }
    }

    fn key(user_id: &str, experiment_id: &str) -> String {
        format!("assign:{}:{}", user_id, experiment_id)
    }

    /// Deterministically assign a variant for one experiment, or `None`
    /// when the user falls outside the allocation percentage.
    ///
    /// Pure: same `(user_id, experiment.id)` always yields the same result
    /// for a fixed catalog, across calls and process restarts.
    pub fn assign<'a>(&self, user_id: &str, experiment: &'a Experiment) -> Option<&'a Variant> {
        let allocation_seed = format!("{}_allocation_{}", user_id, experiment.id);
        let allocation_bucket = bucket(&allocation_seed, 100);
        if allocation_bucket >= u32::from(experiment.allocation_percentage) {
            return None;
        }

        let variant_seed = format!("{}_variant_{}", user_id, experiment.id);
        let mut remaining = bucket(&variant_seed, experiment.total_weight()) as i64;
        for variant in &experiment.variants {
            remaining -= i64::from(variant.weight);
            if remaining < 0 {
                return Some(variant);
            }
        }
        // Unreachable when weights sum to the modulus, but never return
        // no-variant once allocation has passed.
        experiment.variants.first()
    }

    /// Ensure an assignment record exists for every live experiment.
    ///
    /// Idempotent and safe to call on every decision request: existing
    /// records are never re-evaluated or overwritten. Storage errors are
    /// logged and the method degrades to returning whatever is already
    /// known — experiment assignment must never block the gate pipeline.
    pub async fn get_or_create_assignments(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<UserExperimentAssignment> {
        let mut assignments = Vec::new();

        for experiment in self.catalog.active_experiments(now) {
            match self.load(user_id, &experiment.id).await {
                Ok(Some(existing)) => {
                    assignments.push(existing);
                }
                Ok(None) => {
                    let assignment = UserExperimentAssignment {
                        user_id: user_id.to_string(),
                        experiment_id: experiment.id.clone(),
                        variant_id: self.assign(user_id, experiment).map(|v| v.id.clone()),
                        assigned_at: now,
                    };
                    if let Err(e) = self.persist(&assignment).await {
                        warn!(
                            user_id,
                            experiment = %experiment.id,
                            error = %e,
                            "failed to persist experiment assignment; skipping this call"
                        );
                        continue;
                    }
                    debug!(
                        user_id,
                        experiment = %experiment.id,
                        variant = ?assignment.variant_id,
                        "created experiment assignment"
                    );
                    assignments.push(assignment);
                }
                Err(e) => {
                    warn!(
                        user_id,
                        experiment = %experiment.id,
                        error = %e,
                        "failed to read experiment assignment"
                    );
                }
            }
        }

        assignments
    }

    /// Resolve a stored assignment to its variant's content config.
    ///
    /// `None` when the user has no assignment, was excluded at allocation,
    /// or the assigned variant no longer exists in the catalog.
    pub async fn variant_config(
        &self,
        user_id: &str,
        experiment_id: &str,
    ) -> Option<VariantConfig> {
        let assignment = match self.load(user_id, experiment_id).await {
            Ok(found) => found?,
            Err(e) => {
                warn!(user_id, experiment_id, error = %e, "failed to read assignment");
                return None;
            }
        };
        let variant_id = assignment.variant_id?;
        self.catalog
            .experiment(experiment_id)?
            .variant(&variant_id)
            .map(|v| v.config.clone())
    }

    /// Remove all assignment records for a user (explicit data reset).
    ///
    /// The key prefix alone is ambiguous when one user id extends another
    /// (`a` vs `a:b`), so each record's stored `user_id` is checked before
    /// deletion.
    pub async fn clear_user(&self, user_id: &str) -> Result<(), crate::kv::KvError> {
        let prefix = format!("assign:{}:", user_id);
        for key in self.kv.list_keys(&prefix).await? {
            let owned = match self.kv.get(&key).await? {
                Some(json) => serde_json::from_str::<UserExperimentAssignment>(&json)
                    .map(|a| a.user_id == user_id)
                    .unwrap_or(true),
                None => false,
            };
            if owned {
                self.kv.delete(&key).await?;
            }
        }
        Ok(())
    }

    async fn load(
        &self,
        user_id: &str,
        experiment_id: &str,
    ) -> Result<Option<UserExperimentAssignment>, crate::kv::KvError> {
        let json = self.kv.get(&Self::key(user_id, experiment_id)).await?;
        Ok(json.and_then(|j| serde_json::from_str(&j).ok()))
    }

    async fn persist(
        &self,
        assignment: &UserExperimentAssignment,
    ) -> Result<(), crate::kv::KvError> {
        let key = Self::key(&assignment.user_id, &assignment.experiment_id);
        let json = serde_json::to_string(assignment)
            .map_err(|e| crate::kv::KvError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        self.kv.set(&key, &json).await
    }
}
