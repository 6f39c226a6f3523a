//! Track finding configuration
//!
//! All options can be deserialized (for example from a JSON or TOML job
//! description); missing fields fall back to their defaults.

use serde::{Deserialize, Serialize};

use crate::{CkfError, Result};

/// Options recognized by the combinatorial Kalman filter search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindingConfig {
    /// Maximum number of navigation steps (layers) a candidate may take
    pub max_steps: usize,
    /// Maximum number of branches a seed may ever spawn.
    ///
    /// The count accumulates over the whole search; every appended link,
    /// measurement or hole, consumes one branch of its seed.
    pub max_branches_per_seed: usize,
    /// Maximum number of holes a candidate may carry
    pub max_holes_per_candidate: usize,
    /// Minimum number of measurements for a terminated candidate to become a tip
    pub min_candidate_length: usize,
    /// Upper bound (exclusive) on the chi-square of an accepted extension
    pub chi2_max: f64,
    /// Number of slots processed cooperatively by one load-balancing group
    pub group_width: usize,
}

impl Default for FindingConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            max_branches_per_seed: 64,
            max_holes_per_candidate: 3,
            min_candidate_length: 3,
            chi2_max: 30.0,
            group_width: 64,
        }
    }
}

impl FindingConfig {
    /// Sets the maximum number of steps.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the per-seed branch budget.
    pub fn with_max_branches_per_seed(mut self, max_branches: usize) -> Self {
        self.max_branches_per_seed = max_branches;
        self
    }

    /// Sets the per-candidate hole budget.
    pub fn with_max_holes_per_candidate(mut self, max_holes: usize) -> Self {
        self.max_holes_per_candidate = max_holes;
        self
    }

    /// Sets the minimum candidate length.
    pub fn with_min_candidate_length(mut self, min_length: usize) -> Self {
        self.min_candidate_length = min_length;
        self
    }

    /// Sets the chi-square acceptance bound.
    pub fn with_chi2_max(mut self, chi2_max: f64) -> Self {
        self.chi2_max = chi2_max;
        self
    }

    /// Sets the load-balancing group width.
    pub fn with_group_width(mut self, group_width: usize) -> Self {
        self.group_width = group_width;
        self
    }

    /// Checks that every option is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(CkfError::InvalidConfig("max_steps must be at least 1".into()));
        }
        if self.max_branches_per_seed == 0 {
            return Err(CkfError::InvalidConfig(
                "max_branches_per_seed must be at least 1".into(),
            ));
        }
        if self.max_branches_per_seed > u32::MAX as usize {
            return Err(CkfError::InvalidConfig(format!(
                "max_branches_per_seed must not exceed {}",
                u32::MAX
            )));
        }
        if self.group_width == 0 {
            return Err(CkfError::InvalidConfig("group_width must be at least 1".into()));
        }
        if !self.chi2_max.is_finite() || self.chi2_max <= 0.0 {
            return Err(CkfError::InvalidConfig(format!(
                "chi2_max must be positive and finite, got {}",
                self.chi2_max
            )));
        }
        Ok(())
    }
}
