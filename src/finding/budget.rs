//! Per-seed branch budget
//!
//! Each seed may spawn at most `max_branches_per_seed` links over the whole
//! search. The counters are plain atomics indexed by seed and are only ever
//! incremented, never past the cap.

use core::sync::atomic::{AtomicU32, Ordering};

/// Branch counters, one per seed.
///
/// When several workers race for the last branches of a seed, the ones
/// whose increment lands first win. Which worker that is depends on thread
/// scheduling and is not reproducible across runs; only the totals are.
#[derive(Debug)]
pub struct SeedBranchCounter {
    counts: Box<[AtomicU32]>,
    max: u32,
}

impl SeedBranchCounter {
    /// Creates zeroed counters for `n_seeds` seeds.
    pub fn new(n_seeds: usize, max_branches: u32) -> Self {
        Self {
            counts: (0..n_seeds).map(|_| AtomicU32::new(0)).collect(),
            max: max_branches,
        }
    }

    fn counter(&self, seed: usize) -> &AtomicU32 {
        match self.counts.get(seed) {
            Some(counter) => counter,
            None => panic!(
                "seed index {seed} outside the branch counters ({} seeds)",
                self.counts.len()
            ),
        }
    }

    /// Returns true once the seed has used its whole budget.
    #[inline]
    pub fn is_saturated(&self, seed: usize) -> bool {
        self.counter(seed).load(Ordering::Acquire) >= self.max
    }

    /// Claims one branch for the seed.
    ///
    /// Returns false, leaving the counter untouched, if the budget is spent.
    pub fn try_reserve(&self, seed: usize) -> bool {
        self.counter(seed)
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < self.max).then_some(count + 1)
            })
            .is_ok()
    }

    /// Branches claimed so far by the seed.
    #[inline]
    pub fn count(&self, seed: usize) -> u32 {
        self.counter(seed).load(Ordering::Acquire)
    }

    /// Branch budget per seed.
    #[inline]
    pub fn max_branches(&self) -> u32 {
        self.max
    }

    /// Number of seeds tracked.
    #[inline]
    pub fn n_seeds(&self) -> usize {
        self.counts.len()
    }
}
