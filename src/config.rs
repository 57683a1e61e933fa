//! Configuration for disjunction scoring and term-dictionary merging.
//!
//! Both configs deserialize from JSON and are validated on load:
//!
//! ```
//! use lexmerge::config::DisjunctionConfig;
//!
//! let config = DisjunctionConfig::from_json_str(r#"{"tie_breaker_multiplier": 0.1}"#).unwrap();
//! assert_eq!(config.tie_breaker_multiplier, 0.1);
//!
//! assert!(DisjunctionConfig::from_json_str(r#"{"tie_breaker_multiplier": 1.5}"#).is_err());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{LexMergeError, Result};

/// Configuration for [`DisjunctionMerger`](crate::disjunction::DisjunctionMerger).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisjunctionConfig {
    /// Weight in `[0, 1]` applied to every matching sub-score except the best
    /// one. `0.0` scores a document by its best sub-query alone, `1.0` sums
    /// all matching sub-queries.
    pub tie_breaker_multiplier: f32,
}

impl Default for DisjunctionConfig {
    fn default() -> Self {
        DisjunctionConfig {
            tie_breaker_multiplier: 0.0,
        }
    }
}

impl DisjunctionConfig {
    /// Create a config with the given tie-breaker multiplier.
    pub fn new(tie_breaker_multiplier: f32) -> Self {
        DisjunctionConfig {
            tie_breaker_multiplier,
        }
    }

    /// Check that the tie-breaker is a finite weight in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        let m = self.tie_breaker_multiplier;
        if !m.is_finite() || !(0.0..=1.0).contains(&m) {
            return Err(LexMergeError::invalid_config(format!(
                "tie_breaker_multiplier must be within [0, 1], got {m}"
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DisjunctionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Configuration for [`TermMerger`](crate::term_merge::TermMerger).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermMergeConfig {
    /// Fail the merge if the queue ever yields a term that does not sort
    /// strictly after the previous one.
    pub verify_term_order: bool,

    /// Skip terms whose merged document frequency is zero.
    pub drop_empty_terms: bool,
}

impl Default for TermMergeConfig {
    fn default() -> Self {
        TermMergeConfig {
            verify_term_order: true,
            drop_empty_terms: true,
        }
    }
}

impl TermMergeConfig {
    /// Parse a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
