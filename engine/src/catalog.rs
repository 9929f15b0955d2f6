//! Experiment catalog — static experiment/variant definitions
//!
//! The catalog is immutable input supplied by the caller at engine
//! construction. Malformed catalogs are configuration errors and fail fast
//! at load time rather than silently defaulting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Error type for catalog loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("experiment '{0}' has no variants")]
    EmptyVariants(String),

    #[error("experiment '{0}' has zero total variant weight")]
    ZeroTotalWeight(String),

    #[error("duplicate experiment id '{0}'")]
    DuplicateExperimentId(String),

    #[error("experiment '{experiment}' has duplicate variant id '{variant}'")]
    DuplicateVariantId { experiment: String, variant: String },

    #[error("experiment '{0}' allocation percentage {1} exceeds 100")]
    AllocationOutOfRange(String, u8),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Typed content configuration for a variant.
///
/// Deliberately a closed record rather than an open map: the recognized
/// keys are enumerated here and unknown keys are rejected when the catalog
/// is loaded. Fields a variant does not use stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantConfig {
    /// Short headline shown on the card or sheet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    /// Longer body copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Call-to-action button label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_label: Option<String>,
    /// Rendering tone hint ("supportive", "urgent", "playful").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    /// Whether the prompt may be presented full-screen.
    #[serde(default)]
    pub full_screen: bool,
    /// Maximum seconds the prompt stays on screen before auto-dismissing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_display_seconds: Option<u32>,
}

/// One arm of an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Unique id within the experiment (e.g., "control", "urgent_copy").
    pub id: String,
    /// Relative assignment probability; must be positive to ever win.
    pub weight: u32,
    /// Content configuration delivered to the renderer.
    #[serde(default)]
    pub config: VariantConfig,
}

/// Time window during which an experiment accepts new assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationWindow {
    /// When the experiment opens.
    pub start: DateTime<Utc>,
    /// When it closes; `None` means open-ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl ActivationWindow {
    /// Whether `now` falls inside the window.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        if now < self.start {
            return false;
        }
        match self.end {
            Some(end) => now < end,
            None => true,
        }
    }
}

/// A single experiment definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    /// Unique experiment id (stable — hashed into bucket seeds).
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Ordered variant list; order matters for the weight walk.
    pub variants: Vec<Variant>,
    /// Activation window for new assignments.
    pub window: ActivationWindow,
    /// Kill switch independent of the window.
    pub is_active: bool,
    /// Fraction (0–100) of the population that enters the experiment at
    /// all; the remainder get no assignment and see the default experience.
    pub allocation_percentage: u8,
}

impl Experiment {
    /// Sum of variant weights. Validation guarantees this is positive.
    pub fn total_weight(&self) -> u32 {
        self.variants.iter().map(|v| v.weight).sum()
    }

    /// Whether the experiment accepts new assignments at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.window.contains(now)
    }

    /// Look up a variant by id.
    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }
}

/// The full experiment catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentCatalog {
    pub experiments: Vec<Experiment>,
}

impl ExperimentCatalog {
    /// Create an empty catalog (no experiments, control experience only).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse and validate a catalog from JSON. Fails fast on any
    /// configuration error.
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Validate catalog invariants: unique experiment ids, non-empty
    /// variant lists with unique ids and positive total weight, allocation
    /// percentage within 0–100.
    pub fn validate(&self) -> CatalogResult<()> {
        let mut seen = HashSet::new();
        for exp in &self.experiments {
            if !seen.insert(exp.id.as_str()) {
                return Err(CatalogError::DuplicateExperimentId(exp.id.clone()));
            }
            if exp.variants.is_empty() {
                return Err(CatalogError::EmptyVariants(exp.id.clone()));
            }
            let mut variant_ids = HashSet::new();
            for v in &exp.variants {
                if !variant_ids.insert(v.id.as_str()) {
                    return Err(CatalogError::DuplicateVariantId {
                        experiment: exp.id.clone(),
                        variant: v.id.clone(),
                    });
                }
            }
            if exp.total_weight() == 0 {
                return Err(CatalogError::ZeroTotalWeight(exp.id.clone()));
            }
            if exp.allocation_percentage > 100 {
                return Err(CatalogError::AllocationOutOfRange(
                    exp.id.clone(),
                    exp.allocation_percentage,
                ));
            }
        }
        Ok(())
    }

    /// Look up an experiment by id.
    pub fn experiment(&self, id: &str) -> Option<&Experiment> {
        self.experiments.iter().find(|e| e.id == id)
    }

    /// Experiments accepting new assignments at `now`.
    pub fn active_experiments(&self, now: DateTime<Utc>) -> Vec<&Experiment> {
        self.experiments.iter().filter(|e| e.is_live(now)).collect()
    }
}
