//! Persistence for per-user engine state
//!
//! JSON records over the key-value trait, one per (user, engine kind).
//! Writes are single round-trips (no multi-step transactions), so an
//! abandoned future never leaves state partially written.

use std::sync::Arc;

use tracing::debug;

use super::{EngineKind, EngineState};
use crate::kv::{KvError, KvStore};
use chrono::{DateTime, Utc};

/// Error type for state store operations.
#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("store error: {0}")]
    Kv(#[from] KvError),

    #[error("state record corrupt for key '{key}': {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(serde_json::Error),
}

/// Result type for state store operations.
pub type StateStoreResult<T> = Result<T, StateStoreError>;

/// Loads and saves [`EngineState`] records for one engine instance.
pub struct EngineStateStore {
    kind: EngineKind,
    kv: Arc<dyn KvStore>,
}

impl EngineStateStore {
    pub fn new(kind: EngineKind, kv: Arc<dyn KvStore>) -> Self {
        Self { kind, kv }
    }

    /// Which engine instance this store belongs to.
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    fn key(&self, user_id: &str) -> String {
        format!("state:{}:{}", self.kind, user_id)
    }

    /// Load the state record for `user_id`, if one exists.
    pub async fn load(&self, user_id: &str) -> StateStoreResult<Option<EngineState>> {
        let key = self.key(user_id);
        match self.kv.get(&key).await? {
            Some(json) => {
                let state = serde_json::from_str(&json)
                    .map_err(|source| StateStoreError::Corrupt { key, source })?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Load existing state or create a fresh record anchored at
    /// `signup_at` (the caller's real signup time when known, otherwise
    /// the current instant). Creation is persisted immediately so the
    /// record exists from the first decision request onward.
    pub async fn load_or_create(
        &self,
        user_id: &str,
        signup_at: DateTime<Utc>,
    ) -> StateStoreResult<EngineState> {
        if let Some(state) = self.load(user_id).await? {
            return Ok(state);
        }
        let state = EngineState::new(signup_at);
        self.save(user_id, &state).await?;
        debug!(user_id, kind = %self.kind, "created engine state");
        Ok(state)
    }

    /// Persist a state record (last-writer-wins per user).
    pub async fn save(&self, user_id: &str, state: &EngineState) -> StateStoreResult<()> {
        let json = serde_json::to_string(state).map_err(StateStoreError::Serialization)?;
        self.kv.set(&self.key(user_id), &json).await?;
        Ok(())
    }

    /// Explicit data reset for one user.
    pub async fn clear(&self, user_id: &str) -> StateStoreResult<()> {
        self.kv.delete(&self.key(user_id)).await?;
        Ok(())
    }
}
