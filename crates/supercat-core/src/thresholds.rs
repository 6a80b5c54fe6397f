//! Tunable acceptance thresholds for brand matching and category mapping.
//!
//! Every value here is heuristic rather than derived from labelled data, so
//! each one is surfaced through [`crate::AppConfig`] and can be overridden per
//! deployment without a code change.

use serde::{Deserialize, Serialize};

/// Per-method acceptance thresholds for the brand matching cascade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrandThresholds {
    pub exact: f64,
    pub fuzzy: f64,
    pub keyword: f64,
    pub contextual: f64,
}

impl Default for BrandThresholds {
    fn default() -> Self {
        Self {
            exact: 0.95,
            fuzzy: 0.85,
            keyword: 0.75,
            contextual: 0.65,
        }
    }
}

/// Behaviour knobs for the category mapper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryMapperSettings {
    /// Minimum combined score for a fuzzy master-category match.
    pub fuzzy_threshold: f64,
    /// Maximum number of ranked suggestions attached to a pending result.
    pub max_suggestions: usize,
    /// Minimum combined score for a master category to qualify as a suggestion.
    pub min_suggestion_score: f64,
    /// Whether the synonym step also searches the full parent path.
    pub hierarchy_search: bool,
}

impl Default for CategoryMapperSettings {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.8,
            max_suggestions: 5,
            min_suggestion_score: 0.5,
            hierarchy_search: true,
        }
    }
}
