//! Multi-step search state
//!
//! [`CkfSearch`] owns the link table, the tip collector and the seed
//! branch counters for the whole search. The caller drives it one
//! navigation step at a time, handing over the predictions of the live
//! candidates and receiving the candidates that continue.

use super::budget::SeedBranchCounter;
use super::expander::{expand_step, Candidate, Slot, StepContext, StepSummary};
use super::links::{LinkTable, TipCollector};
use crate::config::FindingConfig;
use crate::models::MeasurementUpdater;
use crate::types::measurement::MeasurementIndex;
use crate::types::TrackScalar;
use crate::{CkfError, Result};

/// State of one combinatorial Kalman filter search.
#[derive(Debug)]
pub struct CkfSearch<T: TrackScalar> {
    config: FindingConfig,
    chi2_max: T,
    links: LinkTable<T>,
    tips: TipCollector,
    branches: SeedBranchCounter,
    step: usize,
}

impl<T: TrackScalar> CkfSearch<T> {
    /// Creates a search for `n_seeds` seeds with worst-case capacities.
    ///
    /// Every appended link consumes one branch of its seed and every tip
    /// names a distinct link, so `n_seeds * max_branches_per_seed` bounds
    /// both the link table and the tip collector.
    pub fn new(config: FindingConfig, n_seeds: usize) -> Result<Self> {
        config.validate()?;
        let capacity = n_seeds.checked_mul(config.max_branches_per_seed).ok_or_else(|| {
            CkfError::InvalidConfig(format!(
                "{n_seeds} seeds x {} branches overflows the link table size",
                config.max_branches_per_seed
            ))
        })?;
        Self::with_capacity(config, n_seeds, capacity, capacity)
    }

    /// Creates a search with explicit link table and tip capacities.
    pub fn with_capacity(
        config: FindingConfig,
        n_seeds: usize,
        link_capacity: usize,
        tip_capacity: usize,
    ) -> Result<Self> {
        config.validate()?;
        let chi2_max = T::from_f64(config.chi2_max).ok_or_else(|| {
            CkfError::InvalidConfig(format!(
                "chi2_max {} not representable in the scalar type",
                config.chi2_max
            ))
        })?;
        // validate() bounds the branch count by u32::MAX
        let max_branches = config.max_branches_per_seed as u32;

        Ok(Self {
            chi2_max,
            links: LinkTable::with_capacity(link_capacity),
            tips: TipCollector::with_capacity(tip_capacity),
            branches: SeedBranchCounter::new(n_seeds, max_branches),
            step: 0,
            config,
        })
    }

    /// Runs one navigation step.
    ///
    /// At step 0 the batch holds one slot per seed, slot `i` being seed
    /// `i`. Later batches hold the propagated survivors of the previous
    /// step. Dead slots (`None`) are skipped.
    ///
    /// Returns the candidates that continue to the next step; after the
    /// last step this is always empty, the finished candidates having
    /// become tips.
    ///
    /// # Panics
    /// Panics if a step-0 batch holds more slots than seeds or a slot with
    /// a link, or if a later batch holds a slot without one.
    pub fn expand<U: MeasurementUpdater<T>>(
        &mut self,
        batch: &[Option<Slot<T>>],
        measurements: &MeasurementIndex<T>,
        updater: &U,
    ) -> Result<Vec<Candidate<T>>> {
        if self.is_complete() {
            return Err(CkfError::StepLimitReached {
                max_steps: self.config.max_steps,
            });
        }
        if self.step == 0 {
            assert!(
                batch.len() <= self.branches.n_seeds(),
                "step-0 batch of {} slots for {} seeds",
                batch.len(),
                self.branches.n_seeds()
            );
            assert!(
                batch.iter().flatten().all(|slot| slot.link.is_none()),
                "step-0 batch continues an existing link"
            );
        } else {
            // Only step 0 may hang links directly off a seed
            assert!(
                batch.iter().flatten().all(|slot| slot.link.is_some()),
                "seed slot in the batch of step {}",
                self.step
            );
        }

        let ctx = StepContext {
            links: &self.links,
            tips: &self.tips,
            branches: &self.branches,
            measurements,
            updater,
            step: self.step,
            last_step: self.step + 1 == self.config.max_steps,
            chi2_max: self.chi2_max,
            max_holes: self.config.max_holes_per_candidate,
            min_length: self.config.min_candidate_length,
        };
        let (survivors, summary) = expand_step(&ctx, batch, self.config.group_width)?;
        self.log_step(&summary);

        self.step += 1;
        Ok(survivors)
    }

    fn log_step(&self, summary: &StepSummary) {
        tracing::debug!(
            step = self.step,
            live_slots = summary.live_slots,
            accepted = summary.accepted,
            holes = summary.holes,
            survivors = summary.survivors,
            links = self.links.len(),
            tips = self.tips.len(),
            "expanded step"
        );
    }

    /// Ends a candidate that left the detector before the last step.
    ///
    /// Its link becomes a tip if the chain is long enough; returns whether
    /// it did.
    pub fn terminate(&self, link: usize) -> Result<bool> {
        let candidate = self.links.link(link);
        if candidate.chain_length() >= self.config.min_candidate_length {
            self.tips.push(link)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Index of the next step to run.
    #[inline]
    pub fn step(&self) -> usize {
        self.step
    }

    /// Returns true once `max_steps` steps have run.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.step >= self.config.max_steps
    }

    /// The configuration in use.
    #[inline]
    pub fn config(&self) -> &FindingConfig {
        &self.config
    }

    /// Links appended so far.
    #[inline]
    pub fn links(&self) -> &LinkTable<T> {
        &self.links
    }

    /// Tips recorded so far.
    #[inline]
    pub fn tips(&self) -> &TipCollector {
        &self.tips
    }

    /// Seed branch counters.
    #[inline]
    pub fn branches(&self) -> &SeedBranchCounter {
        &self.branches
    }

    /// Ends the search, handing over the link table and tips.
    pub fn finish(self) -> (LinkTable<T>, TipCollector) {
        (self.links, self.tips)
    }
}
